//! Environment parser: an environment block's verbatim body → a fixed-shape
//! node per kind.
//!
//! The body is a sequence of clauses, each starting on its own line:
//!
//! ```text
//! $style[width:50%;]
//! $content[width:100%]{images/a.png}
//! $caption(Fig.)[font-style:oblique;]{caption text}
//! ```
//!
//! A clause is `$name`, an optional `(label)`, an optional `[inline style]`
//! and an optional `{body}`; bodies may span lines and nest braces. Inline
//! styles are attached to the clause they appear on and never touch the
//! theme registry.

use crate::error::{Location, ParseError};
use crate::id::ElementId;
use crate::region::{EnvironmentBlock, EnvironmentKind, Region, Splitter};
use crate::theme::SlidePart;
use serde::Serialize;
use smallvec::SmallVec;
use winnow::ascii::space0;
use winnow::combinator::{delimited, opt};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

// ─── Nodes ───────────────────────────────────────────────────────────────

/// One `property:value` pair of an inline style fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

/// Ordered inline style declarations.
pub type Declarations = SmallVec<[Declaration; 4]>;

/// The `$content` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentClause {
    /// `(label)`: the language of a code block.
    pub label: Option<String>,
    /// Asset path for figures, markdown for boxes and tables, source for code.
    pub body: String,
    pub style: Declarations,
}

/// The `$caption` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caption {
    pub label: Option<String>,
    pub body: String,
    pub style: Declarations,
}

/// Shape shared by figures, boxes and tables: optional container style,
/// required content, optional caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Framed {
    pub style: Declarations,
    pub content: ContentClause,
    pub caption: Option<Caption>,
}

/// One entry of a content area, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentItem {
    Prose(String),
    /// A heading that opens no structure: h4–h6 in a slide, any level in a
    /// title page or a column.
    Heading { level: u8, title: String },
    Environment(Environment),
}

/// One column of a `$columns` environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Inline style from the `$column[...]` marker.
    pub style: Declarations,
    pub items: Vec<ContentItem>,
}

/// A parsed environment, one variant per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EnvironmentNode {
    Figure(Framed),
    Box(Framed),
    Table(Framed),
    Note { content: ContentClause },
    Code { content: ContentClause },
    Columns { columns: Vec<Column> },
    /// Header, footer or sidebar placed explicitly on a slide.
    Component {
        part: SlidePart,
        style: Declarations,
        content: ContentClause,
    },
}

impl EnvironmentNode {
    pub fn kind(&self) -> EnvironmentKind {
        match self {
            EnvironmentNode::Figure(_) => EnvironmentKind::Figure,
            EnvironmentNode::Box(_) => EnvironmentKind::Box,
            EnvironmentNode::Table(_) => EnvironmentKind::Table,
            EnvironmentNode::Note { .. } => EnvironmentKind::Note,
            EnvironmentNode::Code { .. } => EnvironmentKind::Code,
            EnvironmentNode::Columns { .. } => EnvironmentKind::Columns,
            EnvironmentNode::Component { part, .. } => match part {
                SlidePart::Footer(_) => EnvironmentKind::Footer,
                SlidePart::Sidebar(..) => EnvironmentKind::Sidebar,
                _ => EnvironmentKind::Header,
            },
        }
    }

    /// The container-level inline style (`$style[...]`), empty for kinds
    /// that take none.
    pub fn style(&self) -> &[Declaration] {
        match self {
            EnvironmentNode::Figure(framed)
            | EnvironmentNode::Box(framed)
            | EnvironmentNode::Table(framed) => &framed.style,
            EnvironmentNode::Component { style, .. } => style,
            EnvironmentNode::Note { .. }
            | EnvironmentNode::Code { .. }
            | EnvironmentNode::Columns { .. } => &[],
        }
    }
}

/// An environment with its selector and position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub node: EnvironmentNode,
    /// Custom selector named by the marker qualifier (`$box_callout`).
    pub selector: Option<ElementId>,
    #[serde(skip)]
    pub location: Location,
}

// ─── Clauses ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClauseKind {
    Style,
    Content,
    Caption,
}

impl ClauseKind {
    fn as_str(self) -> &'static str {
        match self {
            ClauseKind::Style => "style",
            ClauseKind::Content => "content",
            ClauseKind::Caption => "caption",
        }
    }
}

#[derive(Debug, Clone)]
struct Clause {
    kind: ClauseKind,
    label: Option<String>,
    style: Declarations,
    body: Option<String>,
    line: usize,
}

/// Builds `MalformedEnvironment` errors for one block.
struct Reporter<'a> {
    block: &'a EnvironmentBlock,
    origin: Option<ElementId>,
}

impl Reporter<'_> {
    fn error(&self, clause: &str, reason: impl Into<String>, line: usize) -> ParseError {
        ParseError::MalformedEnvironment {
            kind: self.block.kind.as_str().to_string(),
            clause: clause.to_string(),
            reason: reason.into(),
            location: Location::new(self.origin, line),
        }
    }
}

/// `$name(label)[style]`: everything of a clause before its body.
fn clause_head<'a>(
    input: &mut &'a str,
) -> ModalResult<(&'a str, Option<&'a str>, Option<&'a str>)> {
    let _ = '$'.parse_next(input)?;
    let name = take_while(1.., |c: char| c.is_ascii_alphabetic()).parse_next(input)?;
    let label = opt(delimited('(', take_till(0.., ')'), ')')).parse_next(input)?;
    let style = opt(delimited('[', take_till(0.., ']'), ']')).parse_next(input)?;
    Ok((name, label, style))
}

/// Split a `{...}` body off the front of `input`, honouring nested braces.
/// `\{`, `\}` and `\\` stand for the literal character and lose their
/// backslash; any other backslash is kept. Returns `None` when the braces
/// never balance.
fn take_braced<'a>(input: &mut &'a str) -> Option<String> {
    let text: &'a str = *input;
    let mut body = String::new();
    let mut depth = 0usize;
    let mut chars = text.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped @ ('{' | '}' | '\\'))) => body.push(escaped),
                Some((_, other)) => {
                    body.push('\\');
                    body.push(other);
                }
                None => body.push('\\'),
            },
            '{' => {
                if depth > 0 {
                    body.push(c);
                }
                depth += 1;
            }
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    *input = &text[i + 1..];
                    return Some(body);
                }
                body.push(c);
            }
            _ => body.push(c),
        }
    }
    None
}

fn declaration(input: &mut &str) -> ModalResult<Declaration> {
    let _ = space0.parse_next(input)?;
    let property: &str =
        take_while(1.., |c: char| c.is_alphanumeric() || c == '-' || c == '_').parse_next(input)?;
    let _ = space0.parse_next(input)?;
    let _ = ':'.parse_next(input)?;
    let value: &str = take_till(0.., ';').parse_next(input)?;
    let _ = opt(';').parse_next(input)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    Ok(Declaration::new(property, value))
}

fn declarations(input: &mut &str) -> ModalResult<Declarations> {
    let mut out = Declarations::new();
    loop {
        *input = input.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
        if input.is_empty() {
            return Ok(out);
        }
        out.push(declaration.parse_next(input)?);
    }
}

/// Parse an inline style fragment (`width:50%; color: red`).
pub fn parse_declarations(text: &str) -> Result<Declarations, String> {
    declarations
        .parse(text)
        .map_err(|_| format!("invalid inline style `{text}`"))
}

fn parse_clauses(rep: &Reporter<'_>) -> Result<Vec<Clause>, ParseError> {
    let body = rep.block.body.as_str();
    let mut input = body;
    let mut clauses = Vec::new();
    loop {
        input = input.trim_start();
        if input.is_empty() {
            return Ok(clauses);
        }
        let offset = body.len() - input.len();
        let line = rep.block.body_line + body[..offset].matches('\n').count();

        let Ok((name, label, style)) = clause_head.parse_next(&mut input) else {
            let text: String = input.lines().next().unwrap_or_default().chars().take(40).collect();
            return Err(rep.error(&text, "expected a `$style`, `$content` or `$caption` clause", line));
        };
        let kind = match name {
            "style" => ClauseKind::Style,
            "content" => ClauseKind::Content,
            "caption" => ClauseKind::Caption,
            other => return Err(rep.error(other, "unknown clause", line)),
        };
        let style = match style {
            Some(text) => parse_declarations(text).map_err(|reason| rep.error(name, reason, line))?,
            None => Declarations::new(),
        };
        let body = if input.starts_with('{') {
            let text = take_braced(&mut input)
                .ok_or_else(|| rep.error(name, "unclosed `{` body", line))?;
            Some(text.trim_matches(|c| c == '\n' || c == '\r').to_string())
        } else {
            None
        };

        let trailing = input.split('\n').next().unwrap_or_default();
        if !trailing.trim().is_empty() {
            return Err(rep.error(name, format!("unexpected text `{}`", trailing.trim()), line));
        }

        clauses.push(Clause {
            kind,
            label: label.map(|l| l.trim().to_string()),
            style,
            body,
            line,
        });
    }
}

// ─── Columns ─────────────────────────────────────────────────────────────

/// `$column` or `$column[style]`, alone on its line.
fn column_marker<'a>(input: &mut &'a str) -> ModalResult<Option<&'a str>> {
    let _ = "$column".parse_next(input)?;
    let style = opt(delimited('[', take_till(0.., ']'), ']')).parse_next(input)?;
    let _ = space0.parse_next(input)?;
    Ok(style)
}

/// Split a `$columns` body at its `$column` markers and parse each column
/// like slide content.
fn parse_columns(rep: &Reporter<'_>) -> Result<Vec<Column>, ParseError> {
    let body = rep.block.body.as_str();
    // Style, first body line and byte range of each column.
    let mut spans = Vec::new();
    let mut offset = 0;
    for (index, text) in body.split_inclusive('\n').enumerate() {
        let line = rep.block.body_line + index;
        let end = offset + text.len();
        match column_marker.parse(text.trim()) {
            Ok(style) => {
                let style = match style {
                    Some(style) => {
                        parse_declarations(style).map_err(|reason| rep.error("column", reason, line))?
                    }
                    None => Declarations::new(),
                };
                spans.push((style, line + 1, end..end));
            }
            Err(_) => match spans.last_mut() {
                Some((_, _, range)) => range.end = end,
                None if text.trim().is_empty() => {}
                None => return Err(rep.error("column", "expected `$column` before content", line)),
            },
        }
        offset = end;
    }
    if spans.is_empty() {
        return Err(rep.error(
            "column",
            "missing required clause",
            rep.block.body_line.saturating_sub(1),
        ));
    }
    spans
        .into_iter()
        .map(|(style, line, range)| {
            Ok(Column {
                style,
                items: column_items(rep, &body[range], line)?,
            })
        })
        .collect()
}

fn column_items(
    rep: &Reporter<'_>,
    text: &str,
    first_line: usize,
) -> Result<Vec<ContentItem>, ParseError> {
    let mut items = Vec::new();
    for item in Splitter::with_origin(text, rep.origin, first_line) {
        let region = item.map_err(|err| {
            let line = err.location().line;
            rep.error("column", err.to_string(), line)
        })?;
        let line = region.line;
        let what = match region.value {
            Region::Prose(text) => {
                if !text.trim().is_empty() {
                    items.push(ContentItem::Prose(text));
                }
                continue;
            }
            Region::Heading { level, title, .. } => {
                items.push(ContentItem::Heading { level, title });
                continue;
            }
            Region::Environment(block) if !block.kind.is_component() => {
                items.push(ContentItem::Environment(parse_environment(&block, rep.origin)?));
                continue;
            }
            Region::Environment(block) => format!("`${}`", block.kind.as_str()),
            Region::ThemeBlock(_) | Region::SlideTheme(_) => "theme blocks".to_string(),
            Region::Metadata(_) => "metadata".to_string(),
            Region::TitlePage { .. } => "a title page".to_string(),
            Region::Include(_) => "`$include`".to_string(),
        };
        return Err(rep.error("column", format!("{what} not allowed inside a column"), line));
    }
    Ok(items)
}

// ─── Shapes ──────────────────────────────────────────────────────────────

/// The clauses of one block, sorted into slots.
struct Slots<'a> {
    rep: &'a Reporter<'a>,
    style: Option<Clause>,
    content: Option<Clause>,
    caption: Option<Clause>,
}

impl<'a> Slots<'a> {
    fn fill(rep: &'a Reporter<'a>, clauses: Vec<Clause>, allowed: &[ClauseKind]) -> Result<Self, ParseError> {
        let mut slots = Slots {
            rep,
            style: None,
            content: None,
            caption: None,
        };
        for clause in clauses {
            let name = clause.kind.as_str();
            if !allowed.contains(&clause.kind) {
                return Err(rep.error(
                    name,
                    format!("not allowed in `{}`", rep.block.kind.as_str()),
                    clause.line,
                ));
            }
            let slot = match clause.kind {
                ClauseKind::Style => &mut slots.style,
                ClauseKind::Content => &mut slots.content,
                ClauseKind::Caption => &mut slots.caption,
            };
            if slot.is_some() {
                return Err(rep.error(name, "duplicate clause", clause.line));
            }
            *slot = Some(clause);
        }
        Ok(slots)
    }

    fn style(&mut self) -> Result<Declarations, ParseError> {
        match self.style.take() {
            None => Ok(Declarations::new()),
            Some(clause) if clause.body.is_some() || clause.label.is_some() => Err(self.rep.error(
                "style",
                "takes only an inline `[...]` fragment",
                clause.line,
            )),
            Some(clause) => Ok(clause.style),
        }
    }

    fn content(&mut self) -> Result<ContentClause, ParseError> {
        let rep = self.rep;
        let clause = self
            .content
            .take()
            .ok_or_else(|| rep.error("content", "missing required clause", rep.block.body_line))?;
        let body = clause
            .body
            .ok_or_else(|| rep.error("content", "missing `{...}` body", clause.line))?;
        Ok(ContentClause {
            label: clause.label,
            body,
            style: clause.style,
        })
    }

    fn caption(&mut self) -> Option<Caption> {
        self.caption.take().map(|clause| Caption {
            label: clause.label,
            body: clause.body.unwrap_or_default(),
            style: clause.style,
        })
    }

    fn framed(&mut self) -> Result<Framed, ParseError> {
        Ok(Framed {
            style: self.style()?,
            content: self.content()?,
            caption: self.caption(),
        })
    }
}

const FRAMED: &[ClauseKind] = &[ClauseKind::Style, ClauseKind::Content, ClauseKind::Caption];
const CONTENT_ONLY: &[ClauseKind] = &[ClauseKind::Content];
const COMPONENT: &[ClauseKind] = &[ClauseKind::Style, ClauseKind::Content];

/// Parse an environment block into its node.
///
/// # Errors
/// `MalformedEnvironment` for a missing required clause, an unexpected or
/// duplicate clause, an invalid inline style, an unclosed body, or a
/// component marker without a valid ordinal.
pub fn parse_environment(
    block: &EnvironmentBlock,
    origin: Option<ElementId>,
) -> Result<Environment, ParseError> {
    let rep = Reporter { block, origin };
    let open_line = block.body_line.saturating_sub(1);
    if block.kind == EnvironmentKind::Columns {
        return Ok(Environment {
            node: EnvironmentNode::Columns {
                columns: parse_columns(&rep)?,
            },
            selector: block.qualifier.as_deref().map(ElementId::intern),
            location: Location::new(origin, open_line),
        });
    }
    let clauses = parse_clauses(&rep)?;

    let mut selector = None;
    let node = match block.kind {
        EnvironmentKind::Header | EnvironmentKind::Footer | EnvironmentKind::Sidebar => {
            let name = format!(
                "{}_{}",
                block.kind.as_str(),
                block.qualifier.as_deref().unwrap_or_default()
            );
            let part = SlidePart::parse_component(&name).ok_or_else(|| {
                let hint = match block.kind {
                    EnvironmentKind::Sidebar => "`$sidebar_left_1`",
                    EnvironmentKind::Footer => "`$footer_1`",
                    _ => "`$header_1`",
                };
                rep.error("qualifier", format!("expected an ordinal as in {hint}"), open_line)
            })?;
            let mut slots = Slots::fill(&rep, clauses, COMPONENT)?;
            EnvironmentNode::Component {
                part,
                style: slots.style()?,
                content: slots.content()?,
            }
        }
        kind => {
            selector = block.qualifier.as_deref().map(ElementId::intern);
            match kind {
                EnvironmentKind::Figure => {
                    let mut slots = Slots::fill(&rep, clauses, FRAMED)?;
                    let content_line = slots.content.as_ref().map_or(open_line, |c| c.line);
                    let mut framed = slots.framed()?;
                    let path = framed.content.body.trim();
                    if path.is_empty() || path.contains('\n') {
                        return Err(rep.error("content", "expected a single asset path", content_line));
                    }
                    framed.content.body = path.to_string();
                    EnvironmentNode::Figure(framed)
                }
                EnvironmentKind::Box => EnvironmentNode::Box(Slots::fill(&rep, clauses, FRAMED)?.framed()?),
                EnvironmentKind::Table => {
                    EnvironmentNode::Table(Slots::fill(&rep, clauses, FRAMED)?.framed()?)
                }
                EnvironmentKind::Note => EnvironmentNode::Note {
                    content: Slots::fill(&rep, clauses, CONTENT_ONLY)?.content()?,
                },
                _ => EnvironmentNode::Code {
                    content: Slots::fill(&rep, clauses, CONTENT_ONLY)?.content()?,
                },
            }
        }
    };

    Ok(Environment {
        node,
        selector,
        location: Location::new(origin, open_line),
    })
}
