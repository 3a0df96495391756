//! Lint diagnostics for parsed decks.
//!
//! Reports theme and structure issues without modifying the deck. None of
//! these are parse errors: the deck still resolves.

use crate::cascade::{Layer, resolve};
use crate::defaults::ElementKind;
use crate::environment::{Environment, EnvironmentNode};
use crate::id::ElementId;
use crate::layout::Transition;
use crate::theme::{SlidePart, ThemeScope};
use crate::tree::{ContentItem, Deck, SlideKind};
use std::collections::BTreeSet;

// ─── Diagnostic types ────────────────────────────────────────────────────

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintSeverity {
    /// Likely a mistake.
    Warning,
    /// Style suggestion.
    Info,
}

/// A single lint diagnostic.
#[derive(Debug, Clone)]
pub struct LintDiagnostic {
    /// The element or selector this diagnostic refers to.
    pub element: ElementId,
    /// Human-readable message.
    pub message: String,
    /// Severity level.
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "unused-selector", "empty-slide").
    pub rule: &'static str,
}

const GEOMETRY: [&str; 3] = ["data-x", "data-y", "data-z"];

// ─── Public API ──────────────────────────────────────────────────────────

/// Run all lint rules over the deck and return diagnostics.
#[must_use]
pub fn lint_deck(deck: &Deck) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    lint_inert_geometry(deck, &mut diags);
    lint_selectors(deck, &mut diags);
    lint_empty_slides(deck, &mut diags);
    diags
}

// ─── Rules ───────────────────────────────────────────────────────────────

/// Coordinates in the global slide theme only matter in `absolute` mode;
/// coordinates on anything but a slide never matter.
fn lint_inert_geometry(deck: &Deck, diags: &mut Vec<LintDiagnostic>) {
    let reg = &deck.registry;
    let global = resolve(
        ElementKind::Slide,
        &[Layer::Scope(ThemeScope::Slide(SlidePart::Container))],
        reg,
    );
    let absolute = global
        .get("slide-transition")
        .and_then(Transition::parse)
        == Some(Transition::Absolute);

    let mut findings: Vec<(String, &str)> = Vec::new();
    for (scope, options) in reg.iter() {
        let applies = match scope {
            ThemeScope::Slide(SlidePart::Container) => absolute,
            ThemeScope::SlideLocal(_, SlidePart::Container) => true,
            _ => false,
        };
        if applies {
            continue;
        }
        for key in GEOMETRY {
            if options.contains_key(key) {
                findings.push((scope.to_string(), key));
            }
        }
    }
    findings.sort();
    for (scope, key) in findings {
        diags.push(LintDiagnostic {
            element: ElementId::intern(&scope),
            message: format!(
                "`{key}` on {scope} has no effect; slides are placed by `slide-transition` unless it is `absolute`."
            ),
            severity: LintSeverity::Warning,
            rule: "inert-geometry",
        });
    }
}

/// Every environment in `items`, including those nested in columns.
fn environments<'a>(items: &'a [ContentItem], out: &mut Vec<&'a Environment>) {
    for item in items {
        let ContentItem::Environment(env) = item else {
            continue;
        };
        out.push(env);
        if let EnvironmentNode::Columns { columns } = &env.node {
            for column in columns {
                environments(&column.items, out);
            }
        }
    }
}

/// Selectors declared but never used, and used but never declared.
fn lint_selectors(deck: &Deck, diags: &mut Vec<LintDiagnostic>) {
    let mut referenced: BTreeSet<ElementId> = BTreeSet::new();
    for idx in deck.slides() {
        let Some(slide) = deck.slide(idx) else {
            continue;
        };
        let mut envs = Vec::new();
        environments(&slide.content, &mut envs);
        for env in envs {
            let Some(name) = env.selector else {
                continue;
            };
            referenced.insert(name);
            if !deck.registry.is_declared(ThemeScope::Selector(name)) {
                diags.push(LintDiagnostic {
                    element: name,
                    message: format!(
                        "`${}_{}` on {} uses selector `{}` with no `---theme_selector_{}` block.",
                        env.node.kind().as_str(),
                        name,
                        deck.graph[idx].id,
                        name,
                        name
                    ),
                    severity: LintSeverity::Warning,
                    rule: "undefined-selector",
                });
            }
        }
    }

    for name in deck.registry.selectors() {
        if !referenced.contains(&name) {
            diags.push(LintDiagnostic {
                element: name,
                message: format!("Selector `{name}` is defined but never used."),
                severity: LintSeverity::Info,
                rule: "unused-selector",
            });
        }
    }
}

/// Regular slides with neither content nor components.
fn lint_empty_slides(deck: &Deck, diags: &mut Vec<LintDiagnostic>) {
    for idx in deck.slides() {
        let Some(slide) = deck.slide(idx) else {
            continue;
        };
        if slide.kind == SlideKind::Regular && slide.content.is_empty() && slide.components.is_empty() {
            let id = deck.graph[idx].id;
            diags.push(LintDiagnostic {
                element: id,
                message: format!("Slide `{id}` ({:?}) has no content.", slide.title),
                severity: LintSeverity::Info,
                rule: "empty-slide",
            });
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────
