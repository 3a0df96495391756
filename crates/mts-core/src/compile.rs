//! Compile pipeline: split → include → build → resolve.
//!
//! Combines the block splitter, include expansion, the tree builder and the
//! cascade resolver into a single entry point for hosts.

use crate::error::ParseErrors;
use crate::include::{IncludeLoader, expand_includes};
use crate::region::{SplitItem, Splitter};
use crate::resolved::{ResolvedPresentation, resolve_deck};
use crate::tree::{Deck, DeckBuilder};
use serde::{Deserialize, Serialize};

// ─── Config ──────────────────────────────────────────────────────────────

/// What to do with content that appears before any slide heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreamblePolicy {
    /// Wrap it in an untitled slide under the innermost open node.
    #[default]
    ImplicitSlide,
    /// Report `ContentBeforeStructure`.
    Reject,
}

/// Configuration for `compile` and `parse_document`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    pub preamble: PreamblePolicy,

    /// Maximum nesting of `$include` directives. Default: **8**.
    pub max_include_depth: usize,

    /// Expand `$title`, `$slidenumber`, ... in environment and component
    /// bodies. Default: **true**.
    pub expand_placeholders: bool,

    /// Stop at the first error instead of collecting them all.
    pub fail_fast: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            preamble: PreamblePolicy::default(),
            max_include_depth: 8,
            expand_placeholders: true,
            fail_fast: false,
        }
    }
}

// ─── Pipeline ────────────────────────────────────────────────────────────

/// Parse a document into its deck tree and sealed theme registry.
///
/// `$include` directives are spliced through `loader`; without one they are
/// reported as errors.
///
/// # Errors
/// Every error met, in source order. Fatal errors (unterminated blocks,
/// include cycles, include depth) stop the parse where they occur.
pub fn parse_document(
    source: &str,
    config: &CompileConfig,
    loader: Option<&dyn IncludeLoader>,
) -> Result<Deck, ParseErrors> {
    let mut items: Vec<SplitItem> = Splitter::new(source).collect();
    if let Some(loader) = loader {
        items = expand_includes(items, loader, config.max_include_depth);
    }

    let mut builder = DeckBuilder::new(config);
    for item in items {
        if builder.halted() {
            break;
        }
        match item {
            Ok(region) => builder.push(region),
            Err(err) => builder.report(err),
        }
    }
    builder.finish()
}

/// Parse a document and resolve the style of every element.
///
/// # Errors
/// See [`parse_document`]. Resolution itself never fails.
pub fn compile(
    source: &str,
    config: &CompileConfig,
    loader: Option<&dyn IncludeLoader>,
) -> Result<ResolvedPresentation, ParseErrors> {
    let deck = parse_document(source, config, loader)?;
    Ok(resolve_deck(&deck, config))
}

// ─── Tests ───────────────────────────────────────────────────────────────
