use lasso::{Spur, ThreadedRodeo};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for element ids, selector names and include origins.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for presentation elements.
/// Internally a 4-byte `Spur` index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(Spur);

impl ElementId {
    /// Intern a new string as an ElementId, or return existing if already interned.
    pub fn intern(s: &str) -> Self {
        ElementId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Id of the `n`-th slide (`slide-3`). The title page is `slide-0`.
    pub fn slide(number: usize) -> Self {
        Self::intern(&format!("slide-{number}"))
    }

    /// Id of the `n`-th section (`section-2`).
    pub fn section(number: u32) -> Self {
        Self::intern(&format!("section-{number}"))
    }

    /// Id of subsection `sub` inside section `section` (`subsection-2-1`).
    /// Subsections outside any section use section number 0.
    pub fn subsection(section: u32, sub: u32) -> Self {
        Self::intern(&format!("subsection-{section}-{sub}"))
    }

    /// Id of a slide child element (`slide-3-header_1`).
    pub fn child_of(parent: ElementId, suffix: &str) -> Self {
        Self::intern(&format!("{}-{suffix}", parent.as_str()))
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ElementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = ElementId::intern("callout");
        let b = ElementId::intern("callout");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "callout");
    }

    #[test]
    fn structural_ids() {
        assert_eq!(ElementId::slide(4).as_str(), "slide-4");
        assert_eq!(ElementId::subsection(2, 1).as_str(), "subsection-2-1");
        let slide = ElementId::slide(1);
        assert_eq!(ElementId::child_of(slide, "content").as_str(), "slide-1-content");
    }
}
