pub mod cascade;
pub mod compile;
pub mod defaults;
pub mod environment;
pub mod error;
pub mod id;
pub mod include;
pub mod layout;
pub mod lint;
pub mod metadata;
pub mod region;
pub mod resolved;
pub mod theme;
pub mod tree;

pub use cascade::{Layer, ResolvedStyle, resolve};
pub use compile::{CompileConfig, PreamblePolicy, compile, parse_document};
pub use defaults::ElementKind;
pub use environment::{
    Column, ContentItem, Declaration, Environment, EnvironmentNode, parse_environment,
};
pub use error::{Location, ParseError, ParseErrors};
pub use id::ElementId;
pub use include::{FsLoader, IncludeLoader, expand_includes};
pub use layout::{SlidePlacer, SlidePosition, Transition};
pub use lint::{LintDiagnostic, LintSeverity, lint_deck};
pub use metadata::Metadata;
pub use region::{Region, Spanned, Splitter, reassemble, split_regions};
pub use resolved::{ResolvedPresentation, resolve_deck};
pub use theme::{SealedRegistry, SlidePart, ThemeRegistry, ThemeScope};
pub use tree::{Deck, DeckBuilder};

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
