//! Parse errors.
//!
//! Every error carries a [`Location`] (optional included file + 1-based
//! line). The parser collects non-fatal errors and reports them together as
//! [`ParseErrors`], so authors can fix everything in one edit cycle.

use crate::id::ElementId;
use std::fmt;
use thiserror::Error;

/// Where in the source an error was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Included file the line belongs to; `None` for the root document.
    pub file: Option<ElementId>,
    /// 1-based line number.
    pub line: usize,
}

impl Location {
    pub fn new(file: Option<ElementId>, line: usize) -> Self {
        Self { file, line }
    }

    /// A line in the root document.
    pub fn root(line: usize) -> Self {
        Self { file: None, line }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.file {
            Some(file) => write!(f, "{}:{}", file.as_str(), self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

/// A single parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A block was opened and never closed. Fatal: the rest of the document
    /// cannot be structured.
    #[error("{location}: unterminated `{kind}` block (expected `{close}`)")]
    UnterminatedBlock {
        kind: String,
        close: String,
        location: Location,
    },

    /// An environment is missing a required clause or has an invalid one.
    #[error("{location}: malformed `{kind}` environment, clause `{clause}`: {reason}")]
    MalformedEnvironment {
        kind: String,
        clause: String,
        reason: String,
        location: Location,
    },

    /// Content appeared with no enclosing slide under `PreamblePolicy::Reject`.
    #[error("{location}: content outside of any slide")]
    ContentBeforeStructure { location: Location },

    /// A subsection heading with no open section.
    #[error("{location}: level-{level} heading `{title}` has no enclosing level-{parent} heading")]
    OrphanHeading {
        level: u8,
        parent: u8,
        title: String,
        location: Location,
    },

    /// `---theme_<name>` with a name that maps to no scope.
    #[error("{location}: unknown theme scope `{name}`")]
    UnknownThemeScope { name: String, location: Location },

    /// The include loader failed.
    #[error("{location}: cannot include `{path}`: {reason}")]
    Include {
        path: String,
        reason: String,
        location: Location,
    },

    #[error("{location}: circular include of `{path}`")]
    CircularInclude { path: String, location: Location },

    #[error("{location}: include of `{path}` exceeds the maximum depth of {max}")]
    IncludeDepth {
        path: String,
        max: usize,
        location: Location,
    },
}

impl ParseError {
    pub fn location(&self) -> Location {
        match self {
            ParseError::UnterminatedBlock { location, .. }
            | ParseError::MalformedEnvironment { location, .. }
            | ParseError::ContentBeforeStructure { location }
            | ParseError::OrphanHeading { location, .. }
            | ParseError::UnknownThemeScope { location, .. }
            | ParseError::Include { location, .. }
            | ParseError::CircularInclude { location, .. }
            | ParseError::IncludeDepth { location, .. } => *location,
        }
    }

    /// Whether the parse must stop at this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ParseError::UnterminatedBlock { .. }
                | ParseError::CircularInclude { .. }
                | ParseError::IncludeDepth { .. }
        )
    }
}

/// All errors found in one parse, in source order of detection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_list(.0))]
pub struct ParseErrors(pub Vec<ParseError>);

impl ParseErrors {
    pub fn iter(&self) -> std::slice::Iter<'_, ParseError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ParseError> for ParseErrors {
    fn from(err: ParseError) -> Self {
        ParseErrors(vec![err])
    }
}

impl IntoIterator for ParseErrors {
    type Item = ParseError;
    type IntoIter = std::vec::IntoIter<ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn render_list(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
