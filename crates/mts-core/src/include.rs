//! Include expansion: splices `$include(path)` directives in place.
//!
//! The splitter only records `Include` regions; it never reads files. File
//! I/O is handled by the caller through the [`IncludeLoader`] trait so the
//! parser stays pure and testable.

use crate::error::{Location, ParseError};
use crate::id::ElementId;
use crate::region::{Region, SplitItem, Spanned, Splitter};
use std::path::PathBuf;

// ─── Include Loader Trait ────────────────────────────────────────────────

/// Trait for loading included documents by path.
///
/// The CLI reads from disk ([`FsLoader`]); tests and embedders can serve
/// sources from memory.
pub trait IncludeLoader {
    /// Load the contents of the document at `path`.
    fn load(&self, path: &str) -> Result<String, String>;
}

/// Reads included files relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl IncludeLoader for FsLoader {
    fn load(&self, path: &str) -> Result<String, String> {
        std::fs::read_to_string(self.root.join(path)).map_err(|e| e.to_string())
    }
}

// ─── Expansion ───────────────────────────────────────────────────────────

/// Replace every `Include` region (title page bodies included) with the
/// items of the loaded document, recursively.
///
/// Errors stay in the stream at the position they were met, so the tree
/// builder sees them in source order. A failing load replaces the directive
/// with an `Include` error. Cycles and nesting beyond `max_depth` are fatal
/// and end the stream.
pub fn expand_includes(
    items: Vec<SplitItem>,
    loader: &dyn IncludeLoader,
    max_depth: usize,
) -> Vec<SplitItem> {
    let mut expander = Expander {
        loader,
        max_depth,
        stack: Vec::new(),
        halted: false,
    };
    expander.expand(items)
}

struct Expander<'l> {
    loader: &'l dyn IncludeLoader,
    max_depth: usize,
    /// Paths currently being expanded, outermost first.
    stack: Vec<String>,
    halted: bool,
}

impl Expander<'_> {
    fn expand(&mut self, items: Vec<SplitItem>) -> Vec<SplitItem> {
        let mut spliced = Vec::with_capacity(items.len());
        for item in items {
            if self.halted {
                break;
            }
            let region = match item {
                Ok(region) => region,
                Err(err) => {
                    spliced.push(Err(self.fail(err)));
                    continue;
                }
            };
            let Spanned {
                value,
                line,
                span,
                origin,
            } = region;
            match value {
                Region::Include(path) => {
                    spliced.extend(self.include(&path, Location::new(origin, line)));
                }
                Region::TitlePage { plain, regions } => {
                    let mut inner = Vec::new();
                    let mut errors = Vec::new();
                    for item in self.expand(regions.into_iter().map(Ok).collect()) {
                        match item {
                            Ok(region) => inner.push(region),
                            Err(err) => errors.push(Err(err)),
                        }
                    }
                    spliced.push(Ok(Spanned {
                        value: Region::TitlePage {
                            plain,
                            regions: inner,
                        },
                        line,
                        span,
                        origin,
                    }));
                    spliced.extend(errors);
                }
                value => spliced.push(Ok(Spanned {
                    value,
                    line,
                    span,
                    origin,
                })),
            }
        }
        spliced
    }

    fn fail(&mut self, err: ParseError) -> ParseError {
        if err.is_fatal() {
            self.halted = true;
        }
        err
    }

    fn include(&mut self, path: &str, location: Location) -> Vec<SplitItem> {
        if self.stack.iter().any(|p| p == path) {
            return vec![Err(self.fail(ParseError::CircularInclude {
                path: path.to_string(),
                location,
            }))];
        }
        if self.stack.len() >= self.max_depth {
            return vec![Err(self.fail(ParseError::IncludeDepth {
                path: path.to_string(),
                max: self.max_depth,
                location,
            }))];
        }
        let source = match self.loader.load(path) {
            Ok(source) => source,
            Err(reason) => {
                return vec![Err(ParseError::Include {
                    path: path.to_string(),
                    reason,
                    location,
                })];
            }
        };
        log::debug!("{location}: including `{path}`");

        let items: Vec<SplitItem> =
            Splitter::with_origin(&source, Some(ElementId::intern(path)), 1).collect();
        self.stack.push(path.to_string());
        let items = self.expand(items);
        self.stack.pop();
        items
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Simple in-memory loader for testing.
    struct MemoryLoader {
        files: HashMap<String, String>,
    }

    impl IncludeLoader for MemoryLoader {
        fn load(&self, path: &str) -> Result<String, String> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| format!("file not found: {path}"))
        }
    }

    fn loader(files: &[(&str, &str)]) -> MemoryLoader {
        MemoryLoader {
            files: files
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    fn expand(
        main: &str,
        loader: &MemoryLoader,
        max_depth: usize,
    ) -> (Vec<Spanned<Region>>, Vec<ParseError>) {
        let items: Vec<SplitItem> = Splitter::new(main).collect();
        let mut regions = Vec::new();
        let mut errors = Vec::new();
        for item in expand_includes(items, loader, max_depth) {
            match item {
                Ok(region) => regions.push(region),
                Err(err) => errors.push(err),
            }
        }
        (regions, errors)
    }

    #[test]
    fn include_is_spliced_in_place() {
        let main = "### One\n$include(part.md)\n### Three\n";
        let (regions, errors) = expand(main, &loader(&[("part.md", "### Two\nbody\n")]), 8);
        assert!(errors.is_empty());
        let titles: Vec<_> = regions
            .iter()
            .filter_map(|r| match &r.value {
                Region::Heading { title, .. } => Some(title.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(titles, vec!["One", "Two", "Three"]);
        let two = &regions[1];
        assert_eq!(two.origin, Some(ElementId::intern("part.md")));
        assert_eq!(two.line, 1);
    }

    #[test]
    fn missing_file_is_reported_and_skipped() {
        let (regions, errors) = expand("$include(missing.md)\n### Slide\n", &loader(&[]), 8);
        assert_eq!(regions.len(), 1);
        assert!(matches!(
            errors.as_slice(),
            [ParseError::Include { path, .. }] if path == "missing.md"
        ));
    }

    #[test]
    fn errors_keep_their_place_in_the_stream() {
        let main = "### One\n$include(missing.md)\n### Two\n";
        let items: Vec<SplitItem> = Splitter::new(main).collect();
        let out = expand_includes(items, &loader(&[]), 8);
        assert_eq!(out.len(), 3);
        assert!(matches!(&out[1], Err(ParseError::Include { location, .. }) if location.line == 2));
    }

    #[test]
    fn circular_include_is_fatal() {
        let loader = loader(&[("a.md", "$include(b.md)\n### After\n"), ("b.md", "$include(a.md)\n")]);
        let (regions, errors) = expand("$include(a.md)\n### Main\n", &loader, 8);
        assert!(regions.is_empty());
        assert!(matches!(
            errors.as_slice(),
            [ParseError::CircularInclude { path, location }]
                if path == "a.md" && location.file == Some(ElementId::intern("b.md"))
        ));
    }

    #[test]
    fn depth_limit_is_fatal() {
        let loader = loader(&[("a.md", "$include(b.md)\n"), ("b.md", "### Deep\n")]);
        let (_, errors) = expand("$include(a.md)\n", &loader, 1);
        assert!(matches!(
            errors.as_slice(),
            [ParseError::IncludeDepth { max: 1, .. }]
        ));
    }

    #[test]
    fn title_page_includes_are_spliced() {
        let loader = loader(&[("title.md", "# $title\n")]);
        let (regions, errors) = expand("---titlepage\n$include(title.md)\n---endtitlepage\n", &loader, 8);
        assert!(errors.is_empty());
        let [Spanned { value: Region::TitlePage { regions: inner, .. }, .. }] = regions.as_slice() else {
            panic!("expected a title page, got {regions:?}");
        };
        assert!(matches!(&inner[0].value, Region::Heading { level: 1, .. }));
    }
}
