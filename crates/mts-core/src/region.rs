//! Lexical block splitter: raw document text → ordered typed regions.
//!
//! Blocks are recognized by line-start sentinels that cannot collide with
//! standard markdown: `---<kind>` for metadata, theme and title page blocks,
//! `$<kind>` for environments. A block opens on a line whose trimmed content
//! is exactly the marker and closes on the line equal to `---end<kind>` /
//! `$end<kind>` with the same qualifier. Everything else is prose or a
//! heading. Every region records the byte span of the lines it covers, so
//! concatenating the spans reproduces the source.

use crate::error::{Location, ParseError, ParseErrors};
use crate::id::ElementId;
use crate::theme::ScopeKey;
use serde::Serialize;
use std::collections::VecDeque;
use std::ops::Range;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{rest, take_till, take_while};

// ─── Regions ─────────────────────────────────────────────────────────────

/// A value with the source position it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    /// 1-based line of the first line of the region.
    pub line: usize,
    /// Byte range in the buffer the region was split from.
    pub span: Range<usize>,
    /// Included file the region came from; `None` for the root document.
    pub origin: Option<ElementId>,
}

impl<T> Spanned<T> {
    pub fn location(&self) -> Location {
        Location::new(self.origin, self.line)
    }
}

/// The custom environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    Figure,
    Box,
    Note,
    Code,
    Table,
    /// Side-by-side columns; each column holds prose and other environments.
    Columns,
    Header,
    Footer,
    Sidebar,
}

impl EnvironmentKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "figure" => EnvironmentKind::Figure,
            "box" => EnvironmentKind::Box,
            "note" => EnvironmentKind::Note,
            "code" => EnvironmentKind::Code,
            "table" => EnvironmentKind::Table,
            "columns" => EnvironmentKind::Columns,
            "header" => EnvironmentKind::Header,
            "footer" => EnvironmentKind::Footer,
            "sidebar" => EnvironmentKind::Sidebar,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnvironmentKind::Figure => "figure",
            EnvironmentKind::Box => "box",
            EnvironmentKind::Note => "note",
            EnvironmentKind::Code => "code",
            EnvironmentKind::Table => "table",
            EnvironmentKind::Columns => "columns",
            EnvironmentKind::Header => "header",
            EnvironmentKind::Footer => "footer",
            EnvironmentKind::Sidebar => "sidebar",
        }
    }

    /// Slide components rather than content.
    pub fn is_component(self) -> bool {
        matches!(
            self,
            EnvironmentKind::Header | EnvironmentKind::Footer | EnvironmentKind::Sidebar
        )
    }
}

/// An environment block as captured by the splitter: the body is verbatim
/// and parsed into clauses by [`crate::environment`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentBlock {
    pub kind: EnvironmentKind,
    /// Suffix after `_` in the marker: a selector name or a component ordinal.
    pub qualifier: Option<String>,
    pub body: String,
    /// 1-based line of the first body line.
    pub body_line: usize,
}

/// A theme-override block.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeBlock {
    pub key: ScopeKey,
    pub options: Vec<(String, String)>,
}

/// One typed region of the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// Plain markdown, handed to the prose converter unchanged.
    Prose(String),
    Heading {
        level: u8,
        title: String,
        /// Everything after the `#` run, untrimmed.
        raw: String,
    },
    ThemeBlock(ThemeBlock),
    /// `---slide` … `---endslide`: theme blocks local to the open slide.
    SlideTheme(Vec<ThemeBlock>),
    Environment(EnvironmentBlock),
    Metadata(Vec<(String, String)>),
    TitlePage {
        plain: bool,
        regions: Vec<Spanned<Region>>,
    },
    /// `$include(path)`, spliced by [`crate::include::expand_includes`].
    Include(String),
}

impl Region {
    /// Regions lifted out of the content flow.
    pub fn is_theme_or_metadata(&self) -> bool {
        matches!(
            self,
            Region::ThemeBlock(_) | Region::SlideTheme(_) | Region::Metadata(_)
        )
    }
}

// ─── Splitter ────────────────────────────────────────────────────────────

/// One step of the splitter: a region, or the error met in its place.
pub type SplitItem = Result<Spanned<Region>, ParseError>;

/// Lazy iterator over the regions of one buffer.
///
/// Stops after the first fatal error. [`Splitter::restart`] rewinds to the
/// beginning of the buffer.
#[derive(Debug, Clone)]
pub struct Splitter<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    first_line: usize,
    origin: Option<ElementId>,
    pending: VecDeque<SplitItem>,
    finished: bool,
}

impl<'a> Splitter<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_origin(source, None, 1)
    }

    /// Split a buffer whose first line is line `first_line` of `origin`.
    pub fn with_origin(source: &'a str, origin: Option<ElementId>, first_line: usize) -> Self {
        Self {
            source,
            pos: 0,
            line: first_line,
            first_line,
            origin,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    pub fn restart(&mut self) {
        self.pos = 0;
        self.line = self.first_line;
        self.pending.clear();
        self.finished = false;
    }

    /// The line starting at `pos`, without its terminator, and the offset
    /// just past the terminator.
    fn line_at(&self, pos: usize) -> Option<(&'a str, usize)> {
        if pos >= self.source.len() {
            return None;
        }
        let rest = &self.source[pos..];
        Some(match rest.find('\n') {
            Some(nl) => (rest[..nl].trim_end_matches('\r'), pos + nl + 1),
            None => (rest.trim_end_matches('\r'), self.source.len()),
        })
    }

    fn spanned(&self, value: Region, line: usize, span: Range<usize>) -> Spanned<Region> {
        Spanned {
            value,
            line,
            span,
            origin: self.origin,
        }
    }

    fn location(&self, line: usize) -> Location {
        Location::new(self.origin, line)
    }

    /// Consume lines up to and including the one equal to `close`.
    /// Returns the verbatim body between the marker lines.
    fn take_block(&mut self, label: &str, close: &str) -> Result<&'a str, ParseError> {
        let open_line = self.line - 1;
        let body_start = self.pos;
        let mut pos = self.pos;
        let mut line = self.line;
        while let Some((text, next)) = self.line_at(pos) {
            if text.trim() == close {
                self.pos = next;
                self.line = line + 1;
                return Ok(&self.source[body_start..pos]);
            }
            pos = next;
            line += 1;
        }
        self.finished = true;
        Err(ParseError::UnterminatedBlock {
            kind: label.to_string(),
            close: close.to_string(),
            location: self.location(open_line),
        })
    }

    fn split_block(&mut self, opener: Opener, start: usize, line: usize) -> SplitItem {
        let Opener { kind, label, close } = opener;
        let body_line = self.line;
        let body = self.take_block(&label, &close)?;
        let span = start..self.pos;
        let region = match kind {
            OpenerKind::Metadata => Region::Metadata(parse_options(body, &label)),
            OpenerKind::Theme(name) => match ScopeKey::parse(&name) {
                Some(key) => Region::ThemeBlock(ThemeBlock {
                    key,
                    options: parse_options(body, &label),
                }),
                None => {
                    return Err(ParseError::UnknownThemeScope {
                        name: label,
                        location: self.location(line),
                    });
                }
            },
            OpenerKind::SlideTheme => {
                let inner = Splitter::with_origin(body, self.origin, body_line);
                let (blocks, errors) = inner.local_theme_blocks();
                self.defer_errors(errors);
                Region::SlideTheme(blocks)
            }
            OpenerKind::TitlePage { plain } => {
                let mut regions = Vec::new();
                let mut errors = Vec::new();
                for item in Splitter::with_origin(body, self.origin, body_line) {
                    match item {
                        Ok(region) => regions.push(region),
                        Err(err) => errors.push(err),
                    }
                }
                self.defer_errors(errors);
                Region::TitlePage { plain, regions }
            }
            OpenerKind::Environment { kind, qualifier } => Region::Environment(EnvironmentBlock {
                kind,
                qualifier,
                body: body.to_string(),
                body_line,
            }),
        };
        log::debug!("{}: `{label}` block", self.location(line));
        Ok(self.spanned(region, line, span))
    }

    /// Queue errors from a nested block behind the block's own region.
    fn defer_errors(&mut self, errors: Vec<ParseError>) {
        if errors.iter().any(ParseError::is_fatal) {
            self.finished = true;
        }
        self.pending.extend(errors.into_iter().map(Err));
    }

    /// Theme blocks inside a `---slide` wrapper. Other non-blank lines are
    /// skipped.
    fn local_theme_blocks(mut self) -> (Vec<ThemeBlock>, Vec<ParseError>) {
        let mut blocks = Vec::new();
        let mut errors = Vec::new();
        while let Some((text, next)) = self.line_at(self.pos) {
            let line = self.line;
            self.pos = next;
            self.line += 1;
            match classify(text) {
                LineKind::Open(Opener {
                    kind: OpenerKind::Theme(name),
                    label,
                    close,
                }) => {
                    let body = match self.take_block(&label, &close) {
                        Ok(body) => body,
                        Err(err) => {
                            errors.push(err);
                            break;
                        }
                    };
                    match ScopeKey::parse(&name) {
                        Some(key) => {
                            let local = key.into_local();
                            if matches!(local, ScopeKey::Global(_)) {
                                log::warn!(
                                    "{}: `{label}` inside a slide wrapper applies globally",
                                    self.location(line)
                                );
                            }
                            blocks.push(ThemeBlock {
                                key: local,
                                options: parse_options(body, &label),
                            });
                        }
                        None => errors.push(ParseError::UnknownThemeScope {
                            name: label,
                            location: self.location(line),
                        }),
                    }
                }
                _ if text.trim().is_empty() => {}
                _ => log::warn!(
                    "{}: ignoring non-theme line inside a slide wrapper",
                    self.location(line)
                ),
            }
        }
        (blocks, errors)
    }

    /// Consume a run of prose lines starting at the current position.
    fn split_prose(&mut self) -> SplitItem {
        let start = self.pos;
        let line = self.line;
        let mut fence: Option<&'a str> = None;
        while let Some((text, next)) = self.line_at(self.pos) {
            let is_prose = match fence {
                Some(marker) => {
                    if text.trim_start().starts_with(marker) {
                        fence = None;
                    }
                    true
                }
                None => {
                    if self.pos > start && !matches!(classify(text), LineKind::Prose) {
                        false
                    } else {
                        fence = fence_marker(text);
                        true
                    }
                }
            };
            if !is_prose {
                break;
            }
            self.pos = next;
            self.line += 1;
        }
        let text = self.source[start..self.pos].to_string();
        Ok(self.spanned(Region::Prose(text), line, start..self.pos))
    }
}

impl Iterator for Splitter<'_> {
    type Item = SplitItem;

    fn next(&mut self) -> Option<SplitItem> {
        if let Some(item) = self.pending.pop_front() {
            return Some(item);
        }
        if self.finished {
            return None;
        }
        let (text, next) = self.line_at(self.pos)?;
        let start = self.pos;
        let line = self.line;
        let item = match classify(text) {
            LineKind::Prose => self.split_prose(),
            LineKind::Heading { level, title, raw } => {
                self.pos = next;
                self.line += 1;
                Ok(self.spanned(Region::Heading { level, title, raw }, line, start..next))
            }
            LineKind::Include(path) => {
                self.pos = next;
                self.line += 1;
                Ok(self.spanned(Region::Include(path), line, start..next))
            }
            LineKind::Open(opener) => {
                self.pos = next;
                self.line += 1;
                self.split_block(opener, start, line)
            }
        };
        Some(item)
    }
}

// ─── Line classification ─────────────────────────────────────────────────

#[derive(Debug)]
enum OpenerKind {
    Metadata,
    Theme(String),
    SlideTheme,
    TitlePage {
        plain: bool,
    },
    Environment {
        kind: EnvironmentKind,
        qualifier: Option<String>,
    },
}

#[derive(Debug)]
struct Opener {
    kind: OpenerKind,
    /// Marker name without sentinel: `theme_heading_2`, `figure`, `box_callout`.
    label: String,
    close: String,
}

#[derive(Debug)]
enum LineKind {
    Prose,
    Heading { level: u8, title: String, raw: String },
    Include(String),
    Open(Opener),
}

fn classify(line: &str) -> LineKind {
    let trimmed = line.trim();
    if let Some(name) = trimmed.strip_prefix("---") {
        if let Some(kind) = block_opener(name) {
            return LineKind::Open(Opener {
                kind,
                label: block_label(name),
                close: format!("---end{}", block_label(name)),
            });
        }
        return LineKind::Prose;
    }
    if let Some(name) = trimmed.strip_prefix('$') {
        if let Some(path) = name
            .strip_prefix("include(")
            .and_then(|p| p.strip_suffix(')'))
        {
            return LineKind::Include(path.trim().to_string());
        }
        let (kind, qualifier) = match name.split_once('_') {
            Some((kind, qualifier)) => (kind, Some(qualifier)),
            None => (name, None),
        };
        let valid_qualifier = qualifier.is_none_or(|q| {
            !q.is_empty() && q.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        });
        if let Some(kind) = EnvironmentKind::from_name(kind)
            && valid_qualifier
        {
            return LineKind::Open(Opener {
                kind: OpenerKind::Environment {
                    kind,
                    qualifier: qualifier.map(str::to_string),
                },
                label: name.to_string(),
                close: format!("$end{name}"),
            });
        }
        return LineKind::Prose;
    }
    match heading_line.parse(line) {
        Ok((level, title, raw)) => LineKind::Heading { level, title, raw },
        Err(_) => LineKind::Prose,
    }
}

fn block_opener(name: &str) -> Option<OpenerKind> {
    match name {
        "metadata" => Some(OpenerKind::Metadata),
        "slide" => Some(OpenerKind::SlideTheme),
        _ => {
            if let Some(scope) = name.strip_prefix("theme_") {
                return (!scope.is_empty()).then(|| OpenerKind::Theme(scope.to_string()));
            }
            let flag = name.strip_prefix("titlepage")?.trim();
            match flag {
                "" => Some(OpenerKind::TitlePage { plain: false }),
                "plain" | "[plain]" => Some(OpenerKind::TitlePage { plain: true }),
                _ => None,
            }
        }
    }
}

/// The label used in the close marker; title page flags are not repeated.
fn block_label(name: &str) -> String {
    if name.starts_with("titlepage") {
        "titlepage".to_string()
    } else {
        name.to_string()
    }
}

/// Opening fence (```` ``` ```` or `~~~`) of a markdown code block.
fn fence_marker(line: &str) -> Option<&'static str> {
    let t = line.trim_start();
    if t.starts_with("```") {
        Some("```")
    } else if t.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// ATX heading: up to three spaces, 1–6 `#`, then whitespace or end of line.
fn heading_line(input: &mut &str) -> ModalResult<(u8, String, String)> {
    let _ = take_while(0..=3, ' ').parse_next(input)?;
    let hashes: &str = take_while(1..=6, '#').parse_next(input)?;
    if !(input.is_empty() || input.starts_with([' ', '\t'])) {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    let raw: &str = rest.parse_next(input)?;
    Ok((hashes.len() as u8, atx_title(raw), raw.to_string()))
}

/// Trim a heading title and drop an optional closing `#` run.
fn atx_title(raw: &str) -> String {
    let t = raw.trim();
    let stripped = t.trim_end_matches('#');
    if stripped.is_empty() {
        String::new()
    } else if stripped.ends_with([' ', '\t']) {
        stripped.trim_end().to_string()
    } else {
        t.to_string()
    }
}

// ─── Option lines ────────────────────────────────────────────────────────

/// `key = value`; the value is everything after the first `=`.
fn option_line(input: &mut &str) -> ModalResult<(String, String)> {
    let key: &str = take_till(1.., '=').parse_next(input)?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    let _ = '='.parse_next(input)?;
    let value: &str = rest.parse_next(input)?;
    Ok((key.to_string(), value.trim().to_string()))
}

/// Parse the `option = value` lines of a theme or metadata block body.
pub fn parse_options(body: &str, block: &str) -> Vec<(String, String)> {
    let mut options = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match option_line.parse(line) {
            Ok(pair) => options.push(pair),
            Err(_) => log::warn!("`{block}` block: skipping line `{line}`"),
        }
    }
    options
}

// ─── Public API ──────────────────────────────────────────────────────────

/// Split a whole buffer, collecting every error.
pub fn split_regions(source: &str) -> Result<Vec<Spanned<Region>>, ParseErrors> {
    collect_regions(Splitter::new(source))
}

/// Drain a splitter into regions, or all errors it produced.
pub fn collect_regions(splitter: Splitter<'_>) -> Result<Vec<Spanned<Region>>, ParseErrors> {
    let mut regions = Vec::new();
    let mut errors = Vec::new();
    for item in splitter {
        match item {
            Ok(region) => regions.push(region),
            Err(err) => errors.push(err),
        }
    }
    if errors.is_empty() {
        Ok(regions)
    } else {
        Err(ParseErrors(errors))
    }
}

/// Concatenate the source text of every region that is not a theme or
/// metadata block.
#[must_use]
pub fn reassemble(source: &str, regions: &[Spanned<Region>]) -> String {
    regions
        .iter()
        .filter(|r| !r.value.is_theme_or_metadata())
        .map(|r| &source[r.span.clone()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{SlidePart, ThemeScope};
    use pretty_assertions::assert_eq;

    fn values(source: &str) -> Vec<Region> {
        split_regions(source)
            .expect("split failed")
            .into_iter()
            .map(|r| r.value)
            .collect()
    }

    #[test]
    fn prose_and_headings() {
        let regions = values("# One\ntext\nmore\n## Two\n");
        assert_eq!(
            regions,
            vec![
                Region::Heading {
                    level: 1,
                    title: "One".into(),
                    raw: " One".into()
                },
                Region::Prose("text\nmore\n".into()),
                Region::Heading {
                    level: 2,
                    title: "Two".into(),
                    raw: " Two".into()
                },
            ]
        );
    }

    #[test]
    fn hashtag_is_not_a_heading() {
        assert_eq!(values("#tag\n"), vec![Region::Prose("#tag\n".into())]);
        assert_eq!(
            values("####### seven\n"),
            vec![Region::Prose("####### seven\n".into())]
        );
    }

    #[test]
    fn closing_hashes_are_dropped() {
        let regions = values("### Slide ###\n");
        assert!(matches!(&regions[0], Region::Heading { title, .. } if title == "Slide"));
    }

    #[test]
    fn theme_block_options_in_order() {
        let regions = values("---theme_slide_global\nwidth = 800px\n\nbackground = green\n---endtheme_slide_global\n");
        assert_eq!(
            regions,
            vec![Region::ThemeBlock(ThemeBlock {
                key: ScopeKey::Global(ThemeScope::Slide(SlidePart::Container)),
                options: vec![
                    ("width".into(), "800px".into()),
                    ("background".into(), "green".into())
                ],
            })]
        );
    }

    #[test]
    fn slide_wrapper_blocks_are_local() {
        let src = "---slide\n---theme_slide_header_1\nheight = 5%\n---endtheme_slide_header_1\n---endslide\n";
        let regions = values(src);
        let Region::SlideTheme(blocks) = &regions[0] else {
            panic!("expected slide wrapper, got {regions:?}");
        };
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].key, ScopeKey::Local(SlidePart::Header(1)));
    }

    #[test]
    fn environment_body_is_verbatim() {
        let src = "$box_callout\n$content{\n# not a heading\n}\n$endbox_callout\n";
        let regions = split_regions(src).unwrap();
        let Region::Environment(env) = &regions[0].value else {
            panic!("expected environment");
        };
        assert_eq!(env.kind, EnvironmentKind::Box);
        assert_eq!(env.qualifier.as_deref(), Some("callout"));
        assert_eq!(env.body, "$content{\n# not a heading\n}\n");
        assert_eq!(env.body_line, 2);
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn fenced_code_is_prose() {
        let src = "```\n# comment\n$figure\n```\n# Real\n";
        let regions = values(src);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0], Region::Prose("```\n# comment\n$figure\n```\n".into()));
    }

    #[test]
    fn unterminated_figure_names_line_one() {
        let err = split_regions("$figure\n$content{a.png}\n").unwrap_err();
        assert_eq!(
            err.0,
            vec![ParseError::UnterminatedBlock {
                kind: "figure".into(),
                close: "$endfigure".into(),
                location: Location::root(1),
            }]
        );
    }

    #[test]
    fn mismatched_close_does_not_terminate() {
        let err = split_regions("---theme_heading_2\nfont-size = 1em\n---endtheme_heading_3\n")
            .unwrap_err();
        assert!(matches!(
            &err.0[0],
            ParseError::UnterminatedBlock { kind, .. } if kind == "theme_heading_2"
        ));
    }

    #[test]
    fn unknown_theme_scope_is_reported_and_skipped() {
        let src = "---theme_bogus\na = b\n---endtheme_bogus\n### Slide\n";
        let items: Vec<_> = Splitter::new(src).collect();
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Err(ParseError::UnknownThemeScope { .. })));
        assert!(items[1].is_ok());
    }

    #[test]
    fn title_page_regions_are_nested() {
        let src = "---titlepage plain\n# $title\n$note\n$content{hi}\n$endnote\n---endtitlepage\n";
        let regions = values(src);
        let Region::TitlePage { plain, regions } = &regions[0] else {
            panic!("expected title page");
        };
        assert!(*plain);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1].line, 3);
    }

    #[test]
    fn include_directive() {
        assert_eq!(
            values("$include(parts/intro.md)\n"),
            vec![Region::Include("parts/intro.md".into())]
        );
    }

    #[test]
    fn restart_replays_from_the_beginning() {
        let mut splitter = Splitter::new("# A\ntext\n");
        let first: Vec<_> = splitter.by_ref().collect();
        splitter.restart();
        let second: Vec<_> = splitter.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn reassemble_skips_theme_and_metadata() {
        let src = "---metadata\ntitle = T\n---endmetadata\n# A\n---theme_canvas\nbackground = red\n---endtheme_canvas\nbody\n";
        let regions = split_regions(src).unwrap();
        assert_eq!(reassemble(src, &regions), "# A\nbody\n");
    }
}
