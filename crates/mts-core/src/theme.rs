//! Theme scopes and the theme registry.
//!
//! Theme blocks are lifted out of the content flow and accumulated here by
//! scope. Population and querying are separate phases: the tree builder owns
//! a mutable [`ThemeRegistry`] while it walks the document and seals it into a
//! read-only [`SealedRegistry`] once the last region is consumed. Only the
//! sealed form is accepted by the cascade resolver.

use crate::id::ElementId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Option name → value for one scope, or a resolved style.
pub type OptionMap = BTreeMap<String, String>;

static EMPTY: OptionMap = BTreeMap::new();

// ─── Scopes ──────────────────────────────────────────────────────────────

/// Which side of the slide a sidebar sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// A themable part of a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SlidePart {
    /// The slide container itself.
    Container,
    /// The single content area.
    Content,
    Header(u32),
    Footer(u32),
    Sidebar(Side, u32),
}

impl SlidePart {
    /// Parse `header_N`, `footer_N`, `sidebar_left_N`, `sidebar_right_N`.
    pub fn parse_component(name: &str) -> Option<Self> {
        if let Some(n) = name.strip_prefix("header_") {
            return parse_ordinal(n).map(SlidePart::Header);
        }
        if let Some(n) = name.strip_prefix("footer_") {
            return parse_ordinal(n).map(SlidePart::Footer);
        }
        if let Some(rest) = name.strip_prefix("sidebar_") {
            let (side, n) = rest.split_once('_')?;
            let side = match side {
                "left" => Side::Left,
                "right" => Side::Right,
                _ => return None,
            };
            return parse_ordinal(n).map(|n| SlidePart::Sidebar(side, n));
        }
        None
    }

    /// Header, footer and sidebar parts.
    pub fn is_component(&self) -> bool {
        matches!(
            self,
            SlidePart::Header(_) | SlidePart::Footer(_) | SlidePart::Sidebar(..)
        )
    }

    /// Marker-style label: `header_1`, `sidebar_left_2`, `content`.
    pub fn label(&self) -> String {
        match self {
            SlidePart::Container => "container".to_string(),
            SlidePart::Content => "content".to_string(),
            SlidePart::Header(n) => format!("header_{n}"),
            SlidePart::Footer(n) => format!("footer_{n}"),
            SlidePart::Sidebar(side, n) => format!("sidebar_{}_{n}", side.as_str()),
        }
    }
}

fn parse_ordinal(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// A cascade target: a named bucket of theme options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThemeScope {
    /// The page behind all slides.
    Canvas,
    /// Heading level 1..=6.
    Heading(u8),
    /// A custom selector referenced by qualified environments.
    Selector(ElementId),
    /// Global slide theme for one slide part (`Slide(Container)` is slide-global).
    Slide(SlidePart),
    /// Override of one slide part for a single slide number.
    SlideLocal(usize, SlidePart),
}

impl fmt::Display for ThemeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeScope::Canvas => f.write_str("canvas"),
            ThemeScope::Heading(n) => write!(f, "heading[{n}]"),
            ThemeScope::Selector(name) => write!(f, "selector[{}]", name.as_str()),
            ThemeScope::Slide(SlidePart::Container) => f.write_str("slide-global"),
            ThemeScope::Slide(part) => write!(f, "{}", part.label()),
            ThemeScope::SlideLocal(slide, SlidePart::Container) => {
                write!(f, "slide-local[{slide}]")
            }
            ThemeScope::SlideLocal(slide, part) => {
                write!(f, "slide-local[{slide}].{}", part.label())
            }
        }
    }
}

/// The scope named by a theme block marker, before local blocks are bound
/// to a slide number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKey {
    Global(ThemeScope),
    /// Applies to the slide that is open where the block appears.
    Local(SlidePart),
}

impl ScopeKey {
    /// Parse the marker name after `---theme_` (`slide_header_2`, `heading_3`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "canvas" => return Some(ScopeKey::Global(ThemeScope::Canvas)),
            "slide_global" => return Some(ScopeKey::Global(ThemeScope::Slide(SlidePart::Container))),
            "slide_local" => return Some(ScopeKey::Local(SlidePart::Container)),
            "slide_content" => return Some(ScopeKey::Global(ThemeScope::Slide(SlidePart::Content))),
            _ => {}
        }
        if let Some(n) = name.strip_prefix("heading_") {
            return parse_ordinal(n)
                .filter(|n| (1..=6).contains(n))
                .map(|n| ScopeKey::Global(ThemeScope::Heading(n as u8)));
        }
        if let Some(selector) = name.strip_prefix("selector_") {
            let valid = !selector.is_empty()
                && selector
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
            return valid.then(|| ScopeKey::Global(ThemeScope::Selector(ElementId::intern(selector))));
        }
        if let Some(part) = name.strip_prefix("slide_") {
            return SlidePart::parse_component(part).map(|p| ScopeKey::Global(ThemeScope::Slide(p)));
        }
        None
    }

    /// Re-target a block found inside a `---slide` wrapper: slide parts
    /// become local, other scopes are returned unchanged.
    pub fn into_local(self) -> Self {
        match self {
            ScopeKey::Global(ThemeScope::Slide(part)) => ScopeKey::Local(part),
            other => other,
        }
    }

    /// Bind to a concrete scope given the slide that is currently open.
    pub fn bind(self, slide: usize) -> ThemeScope {
        match self {
            ScopeKey::Global(scope) => scope,
            ScopeKey::Local(part) => ThemeScope::SlideLocal(slide, part),
        }
    }
}

// ─── Registry ────────────────────────────────────────────────────────────

/// Mutable accumulator used while the document is being traversed.
#[derive(Debug, Default)]
pub struct ThemeRegistry {
    scopes: HashMap<ThemeScope, OptionMap>,
}

impl ThemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite one option. Later calls for the same
    /// `(scope, key)` win.
    pub fn register(&mut self, scope: ThemeScope, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let map = self.scopes.entry(scope).or_default();
        if let Some(previous) = map.insert(key.clone(), value) {
            log::trace!("{scope}: `{key}` overrides previous value `{previous}`");
        }
    }

    /// Register every pair of a theme block, in order.
    pub fn register_block(&mut self, scope: ThemeScope, options: &[(String, String)]) {
        log::debug!("theme block for {scope} with {} option(s)", options.len());
        // A declared but empty block still marks the scope as present.
        self.scopes.entry(scope).or_default();
        for (key, value) in options {
            self.register(scope, key.as_str(), value.as_str());
        }
    }

    /// Accumulated options for `scope`, empty if never declared.
    pub fn lookup(&self, scope: ThemeScope) -> &OptionMap {
        self.scopes.get(&scope).unwrap_or(&EMPTY)
    }

    /// End the population phase.
    pub(crate) fn seal(self) -> SealedRegistry {
        SealedRegistry {
            scopes: self.scopes,
        }
    }
}

/// Read-only registry, produced once the whole document has been traversed.
#[derive(Debug, Clone, Default)]
pub struct SealedRegistry {
    scopes: HashMap<ThemeScope, OptionMap>,
}

impl SealedRegistry {
    /// Accumulated options for `scope`, empty if never declared.
    pub fn lookup(&self, scope: ThemeScope) -> &OptionMap {
        self.scopes.get(&scope).unwrap_or(&EMPTY)
    }

    /// Whether a theme block ever named `scope`.
    pub fn is_declared(&self, scope: ThemeScope) -> bool {
        self.scopes.contains_key(&scope)
    }

    /// Every declared scope with its options, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (ThemeScope, &OptionMap)> {
        self.scopes.iter().map(|(scope, map)| (*scope, map))
    }

    /// All declared custom selectors, sorted by name.
    pub fn selectors(&self) -> Vec<ElementId> {
        let mut names: Vec<ElementId> = self
            .scopes
            .keys()
            .filter_map(|scope| match scope {
                ThemeScope::Selector(name) => Some(*name),
                _ => None,
            })
            .collect();
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        names
    }

    /// Header/footer/sidebar parts declared by the global slide theme and,
    /// when `slide` is given, by that slide's local overrides.
    pub fn declared_components(&self, slide: Option<usize>) -> BTreeSet<SlidePart> {
        self.scopes
            .keys()
            .filter_map(|scope| match *scope {
                ThemeScope::Slide(part) if part.is_component() => Some(part),
                ThemeScope::SlideLocal(n, part) if part.is_component() && Some(n) == slide => {
                    Some(part)
                }
                _ => None,
            })
            .collect()
    }
}
