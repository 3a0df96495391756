//! Document tree: the presentation hierarchy built from the region stream.
//!
//! Structure is driven by heading levels only: h1 opens a section, h2 a
//! subsection, h3 a slide. Everything else attaches to the innermost open
//! slide. Theme blocks are side-channelled into the [`ThemeRegistry`], which
//! is sealed when the tree is finished.

use crate::compile::{CompileConfig, PreamblePolicy};
pub use crate::environment::ContentItem;
use crate::environment::{Environment, EnvironmentNode, parse_environment};
use crate::error::{Location, ParseError, ParseErrors};
use crate::id::ElementId;
use crate::metadata::Metadata;
use crate::region::{Region, Spanned, ThemeBlock};
use crate::theme::{ScopeKey, SealedRegistry, SlidePart, ThemeRegistry};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

// ─── Nodes ───────────────────────────────────────────────────────────────

/// A numbered section or subsection heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Division {
    /// 1-based; subsections count within their section.
    pub number: u32,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideKind {
    Regular,
    /// Titled `$overview`: a zoomed-out view of the whole deck.
    Overview,
    /// `---titlepage`; a plain title page ignores the global slide theme.
    TitlePage { plain: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    /// Global number; the title page is 0.
    pub number: usize,
    /// Position among the slides of the same parent.
    pub local_number: usize,
    pub title: String,
    pub kind: SlideKind,
    /// Explicit header/footer/sidebar environments by part.
    pub components: BTreeMap<SlidePart, Environment>,
    pub content: Vec<ContentItem>,
}

impl Slide {
    pub fn is_plain(&self) -> bool {
        matches!(self.kind, SlideKind::TitlePage { plain: true })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Presentation,
    Section(Division),
    Subsection(Division),
    Slide(Slide),
}

/// A single node of the deck tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckNode {
    pub id: ElementId,
    pub kind: NodeKind,
    pub location: Location,
}

// ─── Deck ────────────────────────────────────────────────────────────────

/// The parsed presentation: an immutable tree plus the sealed theme
/// registry and metadata.
///
/// Edges go from parent → child.
#[derive(Debug, Clone)]
pub struct Deck {
    pub graph: StableDiGraph<DeckNode, ()>,
    pub root: NodeIndex,
    /// Index from ElementId → NodeIndex for fast lookup.
    pub id_index: HashMap<ElementId, NodeIndex>,
    pub title_page: Option<NodeIndex>,
    pub metadata: Metadata,
    pub registry: SealedRegistry,
}

impl Deck {
    /// Look up a node by its id (`slide-3`, `section-1`).
    pub fn get_by_id(&self, id: ElementId) -> Option<&DeckNode> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    /// Get the parent index of a node.
    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .next()
    }

    /// Get children of a node in document (insertion) order, with the title
    /// page first under the root.
    ///
    /// Sorts by `NodeIndex` so the result is deterministic regardless of
    /// how `petgraph` iterates its adjacency list.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .collect();
        children.sort_by_key(|child| (Some(*child) != self.title_page, *child));
        children
    }

    pub fn slide(&self, idx: NodeIndex) -> Option<&Slide> {
        match &self.graph[idx].kind {
            NodeKind::Slide(slide) => Some(slide),
            _ => None,
        }
    }

    /// Every slide in presentation order.
    pub fn slides(&self) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            if self.slide(idx).is_some() {
                out.push(idx);
            }
            stack.extend(self.children(idx).into_iter().rev());
        }
        out
    }

    /// The section and subsection enclosing `idx`.
    pub fn divisions(&self, idx: NodeIndex) -> (Option<&Division>, Option<&Division>) {
        let mut section = None;
        let mut subsection = None;
        let mut current = idx;
        while let Some(parent) = self.parent(current) {
            match &self.graph[parent].kind {
                NodeKind::Section(div) => section = Some(div),
                NodeKind::Subsection(div) => subsection = Some(div),
                _ => {}
            }
            current = parent;
        }
        (section, subsection)
    }
}

// ─── Builder ─────────────────────────────────────────────────────────────

/// Consumes regions in order and grows the deck tree.
pub struct DeckBuilder<'c> {
    config: &'c CompileConfig,
    graph: StableDiGraph<DeckNode, ()>,
    root: NodeIndex,
    id_index: HashMap<ElementId, NodeIndex>,
    /// Open sections and subsections, keyed by heading level.
    stack: Vec<(u8, NodeIndex)>,
    open_slide: Option<NodeIndex>,
    title_page: Option<NodeIndex>,
    sections: u32,
    slides: usize,
    /// Children counters per parent, for subsection and local slide numbers.
    subsections: HashMap<NodeIndex, u32>,
    local_slides: HashMap<NodeIndex, usize>,
    registry: ThemeRegistry,
    metadata: Metadata,
    errors: Vec<ParseError>,
}

impl<'c> DeckBuilder<'c> {
    pub fn new(config: &'c CompileConfig) -> Self {
        let mut graph = StableDiGraph::new();
        let id = ElementId::intern("presentation");
        let root = graph.add_node(DeckNode {
            id,
            kind: NodeKind::Presentation,
            location: Location::root(1),
        });
        Self {
            config,
            graph,
            root,
            id_index: HashMap::from([(id, root)]),
            stack: Vec::new(),
            open_slide: None,
            title_page: None,
            sections: 0,
            slides: 0,
            subsections: HashMap::new(),
            local_slides: HashMap::new(),
            registry: ThemeRegistry::new(),
            metadata: Metadata::new(),
            errors: Vec::new(),
        }
    }

    /// Record an error met by the splitter or include expansion.
    pub fn report(&mut self, err: ParseError) {
        self.errors.push(err);
    }

    /// Whether further regions are ignored.
    pub fn halted(&self) -> bool {
        self.errors.iter().any(ParseError::is_fatal) || (self.config.fail_fast && !self.errors.is_empty())
    }

    /// Attach one region.
    pub fn push(&mut self, region: Spanned<Region>) {
        if self.halted() {
            return;
        }
        let location = region.location();
        match region.value {
            Region::Prose(text) => {
                if text.trim().is_empty() {
                    return;
                }
                self.add_content(ContentItem::Prose(text), location);
            }
            Region::Heading { level: 1, title, .. } => self.open_section(title, location),
            Region::Heading { level: 2, title, .. } => self.open_subsection(title, location),
            Region::Heading { level: 3, title, .. } => {
                self.open_slide_node(title, location);
            }
            Region::Heading { level, title, .. } => {
                self.add_content(ContentItem::Heading { level, title }, location);
            }
            Region::ThemeBlock(block) => self.theme_block(block, location),
            Region::SlideTheme(blocks) => {
                for block in blocks {
                    self.theme_block(block, location);
                }
            }
            Region::Environment(block) => match parse_environment(&block, region.origin) {
                Ok(env) => self.add_environment(env),
                Err(err) => self.errors.push(err),
            },
            Region::Metadata(pairs) => self.metadata.apply(&pairs),
            Region::TitlePage { plain, regions } => self.title_page(plain, regions, location),
            Region::Include(path) => self.errors.push(ParseError::Include {
                path,
                reason: "no include loader configured".to_string(),
                location,
            }),
        }
    }

    /// Seal the registry and hand over the finished deck, or every error
    /// collected along the way.
    pub fn finish(self) -> Result<Deck, ParseErrors> {
        if !self.errors.is_empty() {
            return Err(ParseErrors(self.errors));
        }
        let mut metadata = self.metadata;
        if metadata.get("total_slides_number").is_none_or(str::is_empty) {
            metadata.set("total_slides_number", self.slides.to_string());
        }
        log::debug!(
            "deck built: {} section(s), {} slide(s)",
            self.sections,
            self.slides
        );
        Ok(Deck {
            graph: self.graph,
            root: self.root,
            id_index: self.id_index,
            title_page: self.title_page,
            metadata,
            registry: self.registry.seal(),
        })
    }

    fn add_node(&mut self, parent: NodeIndex, node: DeckNode) -> NodeIndex {
        let id = node.id;
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, ());
        self.id_index.insert(id, idx);
        idx
    }

    fn innermost(&self) -> NodeIndex {
        self.stack.last().map_or(self.root, |&(_, idx)| idx)
    }

    fn open_section(&mut self, title: String, location: Location) {
        self.stack.clear();
        self.open_slide = None;
        self.sections += 1;
        let idx = self.add_node(
            self.root,
            DeckNode {
                id: ElementId::section(self.sections),
                kind: NodeKind::Section(Division {
                    number: self.sections,
                    title,
                }),
                location,
            },
        );
        log::debug!("{location}: section {}", self.sections);
        self.stack.push((1, idx));
    }

    fn open_subsection(&mut self, title: String, location: Location) {
        self.open_slide = None;
        self.stack.retain(|&(level, _)| level < 2);
        let parent = match self.stack.last() {
            Some(&(1, idx)) => idx,
            _ => {
                self.errors.push(ParseError::OrphanHeading {
                    level: 2,
                    parent: 1,
                    title: title.clone(),
                    location,
                });
                self.root
            }
        };
        let section = match &self.graph[parent].kind {
            NodeKind::Section(div) => div.number,
            _ => 0,
        };
        let counter = self.subsections.entry(parent).or_insert(0);
        *counter += 1;
        let number = *counter;
        let idx = self.add_node(
            parent,
            DeckNode {
                id: ElementId::subsection(section, number),
                kind: NodeKind::Subsection(Division { number, title }),
                location,
            },
        );
        log::debug!("{location}: subsection {section}.{number}");
        self.stack.push((2, idx));
    }

    fn open_slide_node(&mut self, title: String, location: Location) -> NodeIndex {
        let parent = self.innermost();
        self.slides += 1;
        let number = self.slides;
        let local = self.local_slides.entry(parent).or_insert(0);
        *local += 1;
        let kind = if title.trim() == "$overview" {
            SlideKind::Overview
        } else {
            SlideKind::Regular
        };
        let slide = Slide {
            number,
            local_number: *local,
            title,
            kind,
            components: BTreeMap::new(),
            content: Vec::new(),
        };
        let idx = self.add_node(
            parent,
            DeckNode {
                id: ElementId::slide(number),
                kind: NodeKind::Slide(slide),
                location,
            },
        );
        log::debug!("{location}: slide {number}");
        self.open_slide = Some(idx);
        idx
    }

    /// The slide content attaches to, opening an implicit one when allowed.
    fn content_slide(&mut self, location: Location) -> Option<NodeIndex> {
        if let Some(idx) = self.open_slide {
            return Some(idx);
        }
        match self.config.preamble {
            PreamblePolicy::ImplicitSlide => {
                log::debug!("{location}: content outside any slide, opening an untitled one");
                Some(self.open_slide_node(String::new(), location))
            }
            PreamblePolicy::Reject => {
                self.errors
                    .push(ParseError::ContentBeforeStructure { location });
                None
            }
        }
    }

    fn slide_mut(&mut self, idx: NodeIndex) -> Option<&mut Slide> {
        match &mut self.graph[idx].kind {
            NodeKind::Slide(slide) => Some(slide),
            _ => None,
        }
    }

    fn add_content(&mut self, item: ContentItem, location: Location) {
        if let Some(idx) = self.content_slide(location)
            && let Some(slide) = self.slide_mut(idx)
        {
            slide.content.push(item);
        }
    }

    fn add_environment(&mut self, env: Environment) {
        let location = env.location;
        let Some(idx) = self.content_slide(location) else {
            return;
        };
        let Some(slide) = self.slide_mut(idx) else {
            return;
        };
        if let EnvironmentNode::Component { part, .. } = env.node {
            if slide.components.insert(part, env).is_some() {
                log::debug!("{location}: `{}` replaces an earlier one", part.label());
            }
        } else {
            slide.content.push(ContentItem::Environment(env));
        }
    }

    fn theme_block(&mut self, block: ThemeBlock, location: Location) {
        let scope = match block.key {
            ScopeKey::Global(scope) => scope,
            ScopeKey::Local(_) => {
                let Some(idx) = self.content_slide(location) else {
                    return;
                };
                let number = self.slide_mut(idx).map_or(0, |slide| slide.number);
                block.key.bind(number)
            }
        };
        self.registry.register_block(scope, &block.options);
    }

    fn title_page(&mut self, plain: bool, regions: Vec<Spanned<Region>>, location: Location) {
        if self.title_page.is_some() {
            log::warn!("{location}: ignoring a second title page");
            return;
        }
        let slide = Slide {
            number: 0,
            local_number: 0,
            title: String::new(),
            kind: SlideKind::TitlePage { plain },
            components: BTreeMap::new(),
            content: Vec::new(),
        };
        let idx = self.add_node(
            self.root,
            DeckNode {
                id: ElementId::slide(0),
                kind: NodeKind::Slide(slide),
                location,
            },
        );
        self.title_page = Some(idx);
        let previous = self.open_slide.replace(idx);
        // Headings inside a title page are content, never structure.
        for region in regions {
            let location = region.location();
            match region.value {
                Region::Heading { level, title, .. } => {
                    self.add_content(ContentItem::Heading { level, title }, location);
                }
                value => self.push(Spanned { value, ..region }),
            }
        }
        self.open_slide = previous;
    }
}
