//! The resolved presentation: the deck tree with a [`ResolvedStyle`] on
//! every element, ready for a renderer.

use crate::cascade::{
    ResolvedStyle, canvas_chain, clause_chain, component_chain, content_chain, environment_chain,
    heading_chain, resolve, selector_chain, slide_chain,
};
use crate::compile::CompileConfig;
use crate::defaults::ElementKind;
use crate::environment::{Declaration, Environment, EnvironmentNode};
use crate::id::ElementId;
use crate::layout::{SlidePlacer, SlidePosition, adjust_content_dims, overview_position};
use crate::metadata::{Metadata, SlideContext, expand_placeholders};
use crate::region::EnvironmentKind;
use crate::theme::{Side, SlidePart, ThemeScope};
use crate::tree::{ContentItem, Deck, Division, NodeKind, Slide, SlideKind};
use petgraph::graph::NodeIndex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// ─── Output model ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPresentation {
    pub metadata: Metadata,
    pub canvas: ResolvedStyle,
    /// Heading levels 1..=6, in order.
    pub headings: Vec<ResolvedStyle>,
    /// Every declared custom selector.
    pub selectors: BTreeMap<String, ResolvedStyle>,
    pub children: Vec<ResolvedNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResolvedNode {
    Section(ResolvedDivision),
    Subsection(ResolvedDivision),
    Slide(ResolvedSlide),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDivision {
    pub id: ElementId,
    pub number: u32,
    pub title: String,
    pub children: Vec<ResolvedNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSlide {
    pub id: ElementId,
    pub number: usize,
    pub local_number: usize,
    pub title: String,
    pub kind: SlideKind,
    pub style: ResolvedStyle,
    pub position: SlidePosition,
    pub headers: Vec<ResolvedComponent>,
    pub footers: Vec<ResolvedComponent>,
    pub sidebars_left: Vec<ResolvedComponent>,
    pub sidebars_right: Vec<ResolvedComponent>,
    pub content: ResolvedContent,
}

impl ResolvedSlide {
    /// Every component, in render order: headers, left sidebars, right
    /// sidebars, footers.
    pub fn components(&self) -> impl Iterator<Item = &ResolvedComponent> {
        self.headers
            .iter()
            .chain(&self.sidebars_left)
            .chain(&self.sidebars_right)
            .chain(&self.footers)
    }
}

/// A header, footer or sidebar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedComponent {
    pub id: ElementId,
    pub ordinal: u32,
    pub style: ResolvedStyle,
    /// Body of an explicit component environment, placeholders expanded.
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedContent {
    pub id: ElementId,
    pub style: ResolvedStyle,
    pub items: Vec<ResolvedItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResolvedItem {
    /// Markdown handed to the prose converter unchanged.
    Prose { text: String },
    Heading {
        level: u8,
        title: String,
        style: ResolvedStyle,
    },
    Environment(ResolvedEnvironment),
    Columns(ResolvedColumns),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedColumns {
    pub selector: Option<ElementId>,
    pub style: ResolvedStyle,
    pub columns: Vec<ResolvedColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedColumn {
    pub style: ResolvedStyle,
    pub items: Vec<ResolvedItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEnvironment {
    pub kind: EnvironmentKind,
    pub selector: Option<ElementId>,
    pub style: ResolvedStyle,
    pub content: ResolvedClause,
    pub caption: Option<ResolvedClause>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedClause {
    pub label: Option<String>,
    pub body: String,
    pub style: ResolvedStyle,
}

// ─── Resolution ──────────────────────────────────────────────────────────

/// Resolve every element of `deck`.
///
/// A pure read of the deck and its sealed registry: calling it twice, or
/// from several threads, yields equal results.
#[must_use]
pub fn resolve_deck(deck: &Deck, config: &CompileConfig) -> ResolvedPresentation {
    let reg = &deck.registry;
    let mut resolver = Resolver {
        deck,
        config,
        placer: SlidePlacer::new(),
    };
    ResolvedPresentation {
        metadata: deck.metadata.clone(),
        canvas: resolve(ElementKind::Canvas, &canvas_chain(), reg),
        headings: (1..=6)
            .map(|level| resolve(ElementKind::Heading(level), &heading_chain(level), reg))
            .collect(),
        selectors: reg
            .selectors()
            .into_iter()
            .map(|name| {
                let style = resolve(ElementKind::Selector, &selector_chain(name), reg);
                (name.as_str().to_string(), style)
            })
            .collect(),
        children: resolver.children(deck.root),
    }
}

struct Resolver<'d> {
    deck: &'d Deck,
    config: &'d CompileConfig,
    placer: SlidePlacer,
}

impl Resolver<'_> {
    fn children(&mut self, idx: NodeIndex) -> Vec<ResolvedNode> {
        let deck = self.deck;
        let mut out = Vec::new();
        for child in deck.children(idx) {
            let node = &deck.graph[child];
            let resolved = match &node.kind {
                NodeKind::Section(div) => ResolvedNode::Section(self.division(child, node.id, div)),
                NodeKind::Subsection(div) => {
                    ResolvedNode::Subsection(self.division(child, node.id, div))
                }
                NodeKind::Slide(slide) => ResolvedNode::Slide(self.slide(child, node.id, slide)),
                NodeKind::Presentation => continue,
            };
            out.push(resolved);
        }
        out
    }

    fn division(&mut self, idx: NodeIndex, id: ElementId, div: &Division) -> ResolvedDivision {
        ResolvedDivision {
            id,
            number: div.number,
            title: div.title.clone(),
            children: self.children(idx),
        }
    }

    fn slide(&mut self, idx: NodeIndex, id: ElementId, slide: &Slide) -> ResolvedSlide {
        let deck = self.deck;
        let reg = &deck.registry;
        let n = slide.number;
        let plain = slide.is_plain();
        let context = self.context(idx, slide);

        let style = resolve(ElementKind::Slide, &slide_chain(n, plain), reg);
        let position = if slide.kind == SlideKind::Overview {
            overview_position(&style)
        } else {
            self.placer
                .place(&style, reg.lookup(ThemeScope::SlideLocal(n, SlidePart::Container)))
        };

        let mut resolved = ResolvedSlide {
            id,
            number: n,
            local_number: slide.local_number,
            title: slide.title.clone(),
            kind: slide.kind,
            style,
            position,
            headers: Vec::new(),
            footers: Vec::new(),
            sidebars_left: Vec::new(),
            sidebars_right: Vec::new(),
            content: ResolvedContent {
                id: ElementId::child_of(id, "content"),
                style: resolve(ElementKind::Content, &content_chain(n, plain), reg),
                items: slide
                    .content
                    .iter()
                    .map(|item| self.item(item, &context))
                    .collect(),
            },
        };
        if slide.kind == SlideKind::Overview {
            return resolved;
        }

        let components: Vec<(SlidePart, ResolvedComponent)> = self
            .component_parts(slide)
            .into_iter()
            .map(|part| (part, self.component(part, id, slide, &context)))
            .collect();
        adjust_content_dims(
            &mut resolved.content.style,
            components.iter().map(|(part, c)| (*part, &c.style)),
        );
        for (part, component) in components {
            match part {
                SlidePart::Header(_) => resolved.headers.push(component),
                SlidePart::Footer(_) => resolved.footers.push(component),
                SlidePart::Sidebar(Side::Left, _) => resolved.sidebars_left.push(component),
                SlidePart::Sidebar(Side::Right, _) => resolved.sidebars_right.push(component),
                SlidePart::Container | SlidePart::Content => {}
            }
        }
        resolved
    }

    fn component(
        &self,
        part: SlidePart,
        slide_id: ElementId,
        slide: &Slide,
        context: &SlideContext,
    ) -> ResolvedComponent {
        let explicit = slide.components.get(&part);
        let inline: &[Declaration] = explicit.map_or(&[][..], |env| env.node.style());
        let (kind, ordinal) = match part {
            SlidePart::Header(o) => (ElementKind::Header, o),
            SlidePart::Footer(o) => (ElementKind::Footer, o),
            SlidePart::Sidebar(_, o) => (ElementKind::Sidebar, o),
            SlidePart::Container | SlidePart::Content => (ElementKind::Content, 0),
        };
        let body = explicit.and_then(|env| match &env.node {
            EnvironmentNode::Component { content, .. } => Some(self.expand(&content.body, context)),
            _ => None,
        });
        ResolvedComponent {
            id: ElementId::child_of(slide_id, &part.label()),
            ordinal,
            style: resolve(
                kind,
                &component_chain(part, slide.number, slide.is_plain(), inline),
                &self.deck.registry,
            ),
            body,
        }
    }

    /// Components present on a slide: declared by the theme (global and
    /// local) or placed explicitly. A plain title page only keeps its own.
    fn component_parts(&self, slide: &Slide) -> BTreeSet<SlidePart> {
        let reg = &self.deck.registry;
        let n = slide.number;
        let mut parts: BTreeSet<SlidePart> = reg
            .declared_components(Some(n))
            .into_iter()
            .filter(|part| !slide.is_plain() || reg.is_declared(ThemeScope::SlideLocal(n, *part)))
            .collect();
        parts.extend(slide.components.keys().copied());
        parts
    }

    fn context(&self, idx: NodeIndex, slide: &Slide) -> SlideContext {
        let mut ctx = SlideContext::default();
        ctx.set("slidetitle", slide.title.clone());
        ctx.set("slidenumber", slide.number.to_string());
        let (section, subsection) = self.deck.divisions(idx);
        if let Some(div) = section {
            ctx.set("sectiontitle", div.title.clone());
            ctx.set("sectionnumber", div.number.to_string());
        }
        if let Some(div) = subsection {
            ctx.set("subsectiontitle", div.title.clone());
            ctx.set("subsectionnumber", div.number.to_string());
        }
        ctx
    }

    fn expand(&self, text: &str, context: &SlideContext) -> String {
        if self.config.expand_placeholders {
            expand_placeholders(text, &self.deck.metadata, context)
        } else {
            text.to_string()
        }
    }

    fn item(&self, item: &ContentItem, context: &SlideContext) -> ResolvedItem {
        let reg = &self.deck.registry;
        match item {
            ContentItem::Prose(text) => ResolvedItem::Prose { text: text.clone() },
            ContentItem::Heading { level, title } => ResolvedItem::Heading {
                level: *level,
                title: title.clone(),
                style: resolve(ElementKind::Heading(*level), &heading_chain(*level), reg),
            },
            ContentItem::Environment(env) => match &env.node {
                EnvironmentNode::Columns { columns } => ResolvedItem::Columns(ResolvedColumns {
                    selector: env.selector,
                    style: resolve(
                        ElementKind::Environment(EnvironmentKind::Columns),
                        &environment_chain(env.selector, &[]),
                        reg,
                    ),
                    columns: columns
                        .iter()
                        .map(|column| ResolvedColumn {
                            style: resolve(ElementKind::Clause, &clause_chain(&column.style), reg),
                            items: column.items.iter().map(|item| self.item(item, context)).collect(),
                        })
                        .collect(),
                }),
                _ => ResolvedItem::Environment(self.environment(env, context)),
            },
        }
    }

    fn environment(&self, env: &Environment, context: &SlideContext) -> ResolvedEnvironment {
        let reg = &self.deck.registry;
        let kind = env.node.kind();
        let clause = |label: &Option<String>, body: String, style: &[Declaration]| ResolvedClause {
            label: label.clone(),
            body,
            style: resolve(ElementKind::Clause, &clause_chain(style), reg),
        };
        let (content, caption) = match &env.node {
            EnvironmentNode::Figure(framed)
            | EnvironmentNode::Box(framed)
            | EnvironmentNode::Table(framed) => {
                // Figure bodies are asset paths.
                let body = if kind == EnvironmentKind::Figure {
                    framed.content.body.clone()
                } else {
                    self.expand(&framed.content.body, context)
                };
                let caption = framed.caption.as_ref().map(|cap| {
                    clause(&cap.label, self.expand(&cap.body, context), &cap.style)
                });
                (
                    clause(&framed.content.label, body, &framed.content.style),
                    caption,
                )
            }
            EnvironmentNode::Columns { .. } => (clause(&None, String::new(), &[]), None),
            EnvironmentNode::Code { content } => {
                (clause(&content.label, content.body.clone(), &content.style), None)
            }
            EnvironmentNode::Note { content } | EnvironmentNode::Component { content, .. } => (
                clause(&content.label, self.expand(&content.body, context), &content.style),
                None,
            ),
        };
        ResolvedEnvironment {
            kind,
            selector: env.selector,
            style: resolve(
                ElementKind::Environment(kind),
                &environment_chain(env.selector, env.node.style()),
                reg,
            ),
            content,
            caption,
        }
    }
}
