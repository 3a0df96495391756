//! Block splitting over whole documents: every byte of the source lands in
//! exactly one region, and dropping theme/metadata blocks leaves the rest
//! untouched.

use mts_core::region::{Region, reassemble, split_regions};
use pretty_assertions::assert_eq;

// ─── Helpers ─────────────────────────────────────────────────────────────

fn concat_spans(source: &str) -> String {
    split_regions(source)
        .expect("split failed")
        .iter()
        .map(|r| &source[r.span.clone()])
        .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────

#[test]
fn spans_cover_the_lecture_fixture() {
    let source = include_str!("fixtures/lecture.md");
    assert_eq!(concat_spans(source), source);
}

#[test]
fn spans_cover_the_include_fixture() {
    let source = include_str!("fixtures/include_main.md");
    assert_eq!(concat_spans(source), source);
}

#[test]
fn reassemble_drops_theme_blocks_only() {
    let source = "### a\n---theme_canvas\nx = 1\n---endtheme_canvas\ntext\n";
    let regions = split_regions(source).expect("split failed");
    assert_eq!(reassemble(source, &regions), "### a\ntext\n");
}

#[test]
fn region_lines_are_one_based() {
    let source = include_str!("fixtures/lecture.md");
    let regions = split_regions(source).expect("split failed");
    let headings: Vec<(usize, &str)> = regions
        .iter()
        .filter_map(|r| match &r.value {
            Region::Heading { title, .. } => Some((r.line, title.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(
        headings,
        vec![
            (33, "Introduction"),
            (35, "Motivation"),
            (37, "Why bother"),
            (47, "Method"),
            (49, "Setup"),
            (63, "Results"),
        ]
    );
}
