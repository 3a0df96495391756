//! Built-in default option tables, the base of every cascade.

use crate::region::EnvironmentKind;
use crate::theme::OptionMap;
use serde::Serialize;

/// What kind of element a style is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Canvas,
    Slide,
    Content,
    Header,
    Footer,
    Sidebar,
    Heading(u8),
    Selector,
    Environment(EnvironmentKind),
    Clause,
}

const CANVAS: &[(&str, &str)] = &[(
    "background",
    "radial-gradient(rgb(240, 240, 240), rgb(190, 190, 190))",
)];

const SLIDE: &[(&str, &str)] = &[
    ("width", "900px"),
    ("height", "700px"),
    ("background", "white"),
    ("slide-transition", "horizontal"),
    ("data-scale", "1"),
    ("data-rotate", "0"),
    ("data-rotate-x", "0"),
    ("data-rotate-y", "0"),
    ("data-rotate-z", "0"),
    ("data-x", "0"),
    ("data-y", "0"),
    ("data-z", "0"),
];

const CONTENT: &[(&str, &str)] = &[("width", "100%"), ("height", "100%"), ("padding", "0")];

const HEADER_FOOTER: &[(&str, &str)] = &[("height", "0%")];

const SIDEBAR: &[(&str, &str)] = &[("width", "0%"), ("height", "100%")];

const HEADING: &[(&str, &str)] = &[
    ("font-family", "Open Sans, Arial, sans-serif"),
    ("background", "inherit"),
];

const HEADING_FONT_SIZE: [&str; 6] = ["220%", "200%", "180%", "160%", "140%", "120%"];

const SELECTOR: &[(&str, &str)] = &[
    ("background", "white"),
    ("color", "black"),
    ("overflow-x", "auto"),
];

/// The built-in option table for `kind`. Environments and clauses have
/// none of their own.
pub fn builtin(kind: ElementKind) -> OptionMap {
    let table: &[(&str, &str)] = match kind {
        ElementKind::Canvas => CANVAS,
        ElementKind::Slide => SLIDE,
        ElementKind::Content => CONTENT,
        ElementKind::Header | ElementKind::Footer => HEADER_FOOTER,
        ElementKind::Sidebar => SIDEBAR,
        ElementKind::Heading(_) => HEADING,
        ElementKind::Selector => SELECTOR,
        ElementKind::Environment(_) | ElementKind::Clause => &[],
    };
    let mut map: OptionMap = table
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    if let ElementKind::Heading(level) = kind {
        let index = usize::from(level.clamp(1, 6)) - 1;
        map.insert("font-size".to_string(), HEADING_FONT_SIZE[index].to_string());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_sizes_shrink_by_level() {
        let sizes: Vec<String> = (1..=6)
            .map(|n| builtin(ElementKind::Heading(n))["font-size"].clone())
            .collect();
        assert_eq!(sizes, ["220%", "200%", "180%", "160%", "140%", "120%"]);
        assert_eq!(
            builtin(ElementKind::Heading(3))["font-family"],
            "Open Sans, Arial, sans-serif"
        );
    }

    #[test]
    fn slide_geometry_defaults() {
        let slide = builtin(ElementKind::Slide);
        assert_eq!(slide["width"], "900px");
        assert_eq!(slide["height"], "700px");
        assert_eq!(slide["slide-transition"], "horizontal");
        assert_eq!(slide["data-scale"], "1");
        assert_eq!(slide["data-rotate-z"], "0");
    }

    #[test]
    fn environments_have_no_builtins() {
        assert!(builtin(ElementKind::Environment(EnvironmentKind::Figure)).is_empty());
        assert_eq!(builtin(ElementKind::Selector)["overflow-x"], "auto");
    }
}
