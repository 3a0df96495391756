//! Cascade resolution: built-in defaults folded with an ordered chain of
//! override layers.
//!
//! Resolution is a pure read of the [`SealedRegistry`]; it never fails and
//! never mutates. Precedence is positional: each layer overwrites the keys
//! it defines, later layers win. Unknown option names and geometric options
//! (`data-x`, `data-rotate-*`, ...) pass through unchanged.

use crate::defaults::{ElementKind, builtin};
use crate::environment::Declaration;
use crate::id::ElementId;
use crate::theme::{OptionMap, SealedRegistry, SlidePart, ThemeScope};
use serde::Serialize;

/// One source of overrides in a cascade chain.
#[derive(Debug, Clone, Copy)]
pub enum Layer<'a> {
    /// Options accumulated in the registry for a scope.
    Scope(ThemeScope),
    /// Another built-in table (selector defaults under a qualified box).
    Defaults(ElementKind),
    /// Inline `[...]` declarations, bypassing the registry.
    Inline(&'a [Declaration]),
}

/// A fully resolved, default-complete style.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ResolvedStyle(OptionMap);

impl ResolvedStyle {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &OptionMap {
        &self.0
    }

    pub(crate) fn set(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }
}

/// Left fold of `layers` over `base`, per-key overwrite.
pub fn fold_layers(mut base: OptionMap, layers: &[Layer<'_>], registry: &SealedRegistry) -> OptionMap {
    for layer in layers {
        match *layer {
            Layer::Scope(scope) => {
                let options = registry.lookup(scope);
                if !options.is_empty() {
                    log::trace!("fold {scope}: {} option(s)", options.len());
                }
                for (key, value) in options {
                    base.insert(key.clone(), value.clone());
                }
            }
            Layer::Defaults(kind) => base.extend(builtin(kind)),
            Layer::Inline(declarations) => {
                for decl in declarations {
                    base.insert(decl.property.clone(), decl.value.clone());
                }
            }
        }
    }
    base
}

/// Resolve the style of an element of `kind` through `chain`.
#[must_use]
pub fn resolve(kind: ElementKind, chain: &[Layer<'_>], registry: &SealedRegistry) -> ResolvedStyle {
    ResolvedStyle(fold_layers(builtin(kind), chain, registry))
}

// ─── Standard chains ─────────────────────────────────────────────────────

pub fn canvas_chain() -> Vec<Layer<'static>> {
    vec![Layer::Scope(ThemeScope::Canvas)]
}

/// Slide-global then slide-local; a plain title page skips the global theme.
pub fn slide_chain(slide: usize, plain: bool) -> Vec<Layer<'static>> {
    part_chain(SlidePart::Container, slide, plain)
}

pub fn content_chain(slide: usize, plain: bool) -> Vec<Layer<'static>> {
    part_chain(SlidePart::Content, slide, plain)
}

/// Header/footer/sidebar: global component theme, local override, then the
/// inline `$style` of an explicit component environment.
pub fn component_chain<'a>(
    part: SlidePart,
    slide: usize,
    plain: bool,
    inline: &'a [Declaration],
) -> Vec<Layer<'a>> {
    let mut chain = part_chain(part, slide, plain);
    if !inline.is_empty() {
        chain.push(Layer::Inline(inline));
    }
    chain
}

fn part_chain(part: SlidePart, slide: usize, plain: bool) -> Vec<Layer<'static>> {
    let mut chain = Vec::with_capacity(2);
    if !plain {
        chain.push(Layer::Scope(ThemeScope::Slide(part)));
    }
    chain.push(Layer::Scope(ThemeScope::SlideLocal(slide, part)));
    chain
}

pub fn heading_chain(level: u8) -> Vec<Layer<'static>> {
    vec![Layer::Scope(ThemeScope::Heading(level))]
}

pub fn selector_chain(name: ElementId) -> Vec<Layer<'static>> {
    vec![Layer::Scope(ThemeScope::Selector(name))]
}

/// Environment container: selector defaults and theme when qualified, then
/// the inline `$style`.
pub fn environment_chain(selector: Option<ElementId>, inline: &[Declaration]) -> Vec<Layer<'_>> {
    let mut chain = Vec::with_capacity(3);
    if let Some(name) = selector {
        chain.push(Layer::Defaults(ElementKind::Selector));
        chain.push(Layer::Scope(ThemeScope::Selector(name)));
    }
    chain.push(Layer::Inline(inline));
    chain
}

pub fn clause_chain(inline: &[Declaration]) -> Vec<Layer<'_>> {
    vec![Layer::Inline(inline)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeRegistry;

    fn registry(blocks: &[(ThemeScope, &[(&str, &str)])]) -> SealedRegistry {
        let mut reg = ThemeRegistry::new();
        for (scope, options) in blocks {
            for (k, v) in *options {
                reg.register(*scope, *k, *v);
            }
        }
        reg.seal()
    }

    #[test]
    fn local_overrides_global_overrides_defaults() {
        let reg = registry(&[
            (ThemeScope::Slide(SlidePart::Container), &[("background", "green")]),
            (ThemeScope::SlideLocal(2, SlidePart::Container), &[("background", "red")]),
        ]);
        let first = resolve(ElementKind::Slide, &slide_chain(1, false), &reg);
        let second = resolve(ElementKind::Slide, &slide_chain(2, false), &reg);
        assert_eq!(first.get("background"), Some("green"));
        assert_eq!(second.get("background"), Some("red"));
        assert_eq!(second.get("width"), Some("900px"));
    }

    #[test]
    fn plain_chain_ignores_global_theme() {
        let reg = registry(&[(ThemeScope::Slide(SlidePart::Container), &[("background", "green")])]);
        let style = resolve(ElementKind::Slide, &slide_chain(0, true), &reg);
        assert_eq!(style.get("background"), Some("white"));
    }

    #[test]
    fn inline_is_highest_precedence() {
        let reg = registry(&[(ThemeScope::Selector(ElementId::intern("callout")), &[("color", "navy")])]);
        let inline = [Declaration::new("color", "red")];
        let style = resolve(
            ElementKind::Environment(crate::region::EnvironmentKind::Box),
            &environment_chain(Some(ElementId::intern("callout")), &inline),
            &reg,
        );
        assert_eq!(style.get("color"), Some("red"));
        assert_eq!(style.get("overflow-x"), Some("auto"));
    }

    #[test]
    fn unknown_options_pass_through() {
        let reg = registry(&[(ThemeScope::Canvas, &[("x-custom", "1")])]);
        let style = resolve(ElementKind::Canvas, &canvas_chain(), &reg);
        assert_eq!(style.get("x-custom"), Some("1"));
        assert!(style.get("background").is_some());
    }

    #[test]
    fn resolution_is_idempotent() {
        let reg = registry(&[(ThemeScope::Heading(2), &[("color", "blue")])]);
        let a = resolve(ElementKind::Heading(2), &heading_chain(2), &reg);
        let b = resolve(ElementKind::Heading(2), &heading_chain(2), &reg);
        assert_eq!(a, b);
    }
}
