//! Integration tests: source text → deck → resolved presentation.

use mts_core::compile::{CompileConfig, compile, parse_document};
use mts_core::error::ParseError;
use mts_core::include::FsLoader;
use mts_core::region::EnvironmentKind;
use mts_core::resolved::{
    ResolvedItem, ResolvedNode, ResolvedPresentation, ResolvedSlide, resolve_deck,
};
use mts_core::tree::SlideKind;
use pretty_assertions::assert_eq;

// ─── Helpers ─────────────────────────────────────────────────────────────

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn compile_default(source: &str) -> ResolvedPresentation {
    init_logging();
    compile(source, &CompileConfig::default(), None).expect("compile failed")
}

/// Every slide in presentation order.
fn slides(presentation: &ResolvedPresentation) -> Vec<&ResolvedSlide> {
    fn walk<'a>(nodes: &'a [ResolvedNode], out: &mut Vec<&'a ResolvedSlide>) {
        for node in nodes {
            match node {
                ResolvedNode::Section(div) | ResolvedNode::Subsection(div) => walk(&div.children, out),
                ResolvedNode::Slide(slide) => out.push(slide),
            }
        }
    }
    let mut out = Vec::new();
    walk(&presentation.children, &mut out);
    out
}

fn pairs(style: &mts_core::ResolvedStyle, keys: &[&str]) -> Vec<(String, String)> {
    keys.iter()
        .filter_map(|k| style.get(k).map(|v| ((*k).to_string(), v.to_string())))
        .collect()
}

// ─── Structure ───────────────────────────────────────────────────────────

#[test]
fn heading_levels_nest_sections_subsections_slides() {
    let p = compile_default("# A\n## A.1\n### s1\n## A.2\n### s2\n### s3\n");
    let [ResolvedNode::Section(section)] = p.children.as_slice() else {
        panic!("expected one section, got {:?}", p.children);
    };
    let counts: Vec<usize> = section
        .children
        .iter()
        .map(|child| match child {
            ResolvedNode::Subsection(sub) => sub
                .children
                .iter()
                .filter(|n| matches!(n, ResolvedNode::Slide(_)))
                .count(),
            other => panic!("expected subsection, got {other:?}"),
        })
        .collect();
    assert_eq!(counts, vec![1, 2]);
}

#[test]
fn lecture_fixture_structure() {
    let p = compile_default(include_str!("fixtures/lecture.md"));
    let ids: Vec<&str> = slides(&p).iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["slide-0", "slide-1", "slide-2", "slide-3"]);
    assert_eq!(slides(&p)[0].kind, SlideKind::TitlePage { plain: false });
    assert_eq!(p.metadata.get("total_slides_number"), Some("3"));
    assert_eq!(p.canvas.get("background"), Some("black"));
}

// ─── Cascade ─────────────────────────────────────────────────────────────

#[test]
fn global_green_local_red() {
    let p = compile_default(include_str!("fixtures/lecture.md"));
    let backgrounds: Vec<&str> = slides(&p)
        .iter()
        .map(|s| s.style.get("background").unwrap_or_default())
        .collect();
    assert_eq!(backgrounds, vec!["green", "green", "red", "green"]);
}

#[test]
fn figure_clauses_keep_their_inline_styles() {
    let p = compile_default(include_str!("fixtures/lecture.md"));
    let slide = slides(&p)[1];
    let figure = slide
        .content
        .items
        .iter()
        .find_map(|item| match item {
            ResolvedItem::Environment(env) if env.kind == EnvironmentKind::Figure => Some(env),
            _ => None,
        })
        .expect("figure missing");

    assert_eq!(pairs(&figure.style, &["width"]), vec![("width".into(), "50%".into())]);
    assert_eq!(figure.content.body, "images/a.png");
    assert_eq!(
        figure.content.style.iter().collect::<Vec<_>>(),
        vec![("width", "100%")]
    );
    let caption = figure.caption.as_ref().expect("caption missing");
    assert_eq!(caption.label.as_deref(), Some("Fig."));
    assert_eq!(caption.body, "caption text");
    assert_eq!(
        caption.style.iter().collect::<Vec<_>>(),
        vec![("font-style", "oblique")]
    );
}

#[test]
fn components_shrink_content_area() {
    let p = compile_default(include_str!("fixtures/lecture.md"));
    let all = slides(&p);

    let why = all[1];
    assert_eq!(why.headers.len(), 1);
    assert_eq!(why.headers[0].id.as_str(), "slide-1-header_1");
    assert_eq!(why.headers[0].style.get("background"), Some("navy"));
    assert_eq!(why.footers.len(), 1);
    assert_eq!(
        pairs(&why.content.style, &["width", "height"]),
        vec![
            ("width".into(), "100%".into()),
            ("height".into(), "85%".into())
        ]
    );

    let results = all[3];
    assert_eq!(results.sidebars_left.len(), 1);
    assert_eq!(results.sidebars_left[0].body.as_deref(), Some("Introduction"));
    assert_eq!(results.content.style.get("width"), Some("80%"));
}

#[test]
fn box_placeholders_and_selector() {
    let p = compile_default(include_str!("fixtures/lecture.md"));
    let setup = slides(&p)[2];
    let ResolvedItem::Environment(callout) = &setup.content.items[0] else {
        panic!("expected the callout box first");
    };
    assert_eq!(callout.kind, EnvironmentKind::Box);
    assert_eq!(
        callout.content.body,
        "Presented by Ada Lovelace, Grace Hopper on slide 2"
    );
    assert_eq!(
        pairs(&callout.style, &["background", "color", "overflow-x"]),
        vec![
            ("background".into(), "yellow".into()),
            ("color".into(), "black".into()),
            ("overflow-x".into(), "auto".into()),
        ]
    );
    assert!(p.selectors.contains_key("callout"));
}

#[test]
fn fenced_markers_stay_prose() {
    let p = compile_default(include_str!("fixtures/lecture.md"));
    let results = slides(&p)[3];
    let prose: Vec<&str> = results
        .content
        .items
        .iter()
        .filter_map(|item| match item {
            ResolvedItem::Prose { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert!(prose.iter().any(|t| t.contains("```rust\n$figure\n```")));
}

#[test]
fn every_style_carries_its_defaults() {
    let p = compile_default("### bare\ntext\n");
    let slide = slides(&p)[0];
    for key in [
        "width",
        "height",
        "background",
        "slide-transition",
        "data-scale",
        "data-rotate",
        "data-rotate-x",
        "data-rotate-y",
        "data-rotate-z",
        "data-x",
        "data-y",
        "data-z",
    ] {
        assert!(slide.style.get(key).is_some(), "slide style missing `{key}`");
    }
    assert_eq!(p.headings.len(), 6);
    assert_eq!(p.headings[5].get("font-size"), Some("120%"));
    assert_eq!(
        p.canvas.get("background"),
        Some("radial-gradient(rgb(240, 240, 240), rgb(190, 190, 190))")
    );
}

#[test]
fn last_theme_block_wins_per_key() {
    let source = "\
---theme_heading_1
color = red
font-size = 300%
---endtheme_heading_1
---theme_heading_1
color = blue
---endtheme_heading_1
### s
";
    let p = compile_default(source);
    assert_eq!(p.headings[0].get("color"), Some("blue"));
    assert_eq!(p.headings[0].get("font-size"), Some("300%"));
}

#[test]
fn slide_local_block_overrides_global() {
    let source = "\
---theme_slide_global
background = green
---endtheme_slide_global
### a
---theme_slide_local
background = red
---endtheme_slide_local
### b
";
    let p = compile_default(source);
    let backgrounds: Vec<&str> = slides(&p)
        .iter()
        .map(|s| s.style.get("background").unwrap_or_default())
        .collect();
    assert_eq!(backgrounds, vec!["red", "green"]);
}

#[test]
fn columns_resolve_each_column_and_nested_items() {
    let source = "\
---theme_selector_pair
gap = 2em
---endtheme_selector_pair
### Compare
$columns_pair
$column[width:40%]
$box
$content{Slide $slidenumber}
$endbox
$column
#### Right
$endcolumns_pair
";
    let p = compile_default(source);
    let slide = slides(&p)[0];
    let [ResolvedItem::Columns(columns)] = slide.content.items.as_slice() else {
        panic!("expected one columns item, got {:?}", slide.content.items);
    };
    assert_eq!(columns.selector.as_ref().map(mts_core::ElementId::as_str), Some("pair"));
    assert_eq!(columns.style.get("gap"), Some("2em"));
    assert_eq!(columns.columns.len(), 2);
    assert_eq!(columns.columns[0].style.get("width"), Some("40%"));

    let [ResolvedItem::Environment(inner)] = columns.columns[0].items.as_slice() else {
        panic!("expected the nested box");
    };
    assert_eq!(inner.kind, EnvironmentKind::Box);
    assert_eq!(inner.content.body, "Slide 1");

    let [ResolvedItem::Heading { level, title, .. }] = columns.columns[1].items.as_slice() else {
        panic!("expected the right-hand heading");
    };
    assert_eq!((*level, title.as_str()), (4, "Right"));
}

// ─── Positions ───────────────────────────────────────────────────────────

#[test]
fn slides_advance_horizontally() {
    let p = compile_default(include_str!("fixtures/lecture.md"));
    let xs: Vec<f64> = slides(&p).iter().map(|s| s.position.x).collect();
    assert_eq!(xs, vec![0.0, 900.0, 1800.0, 2700.0]);
}

#[test]
fn overview_sits_at_origin() {
    let p = compile_default("### one\n### two\n### $overview\n### three\n");
    let positions: Vec<(SlideKind, f64)> = slides(&p)
        .iter()
        .map(|s| (s.kind, s.position.x))
        .collect();
    assert_eq!(
        positions,
        vec![
            (SlideKind::Regular, 0.0),
            (SlideKind::Regular, 900.0),
            (SlideKind::Overview, 0.0),
            (SlideKind::Regular, 1800.0),
        ]
    );
}

// ─── Errors ──────────────────────────────────────────────────────────────

#[test]
fn unterminated_figure_names_line_one() {
    let err = compile("$figure\n$content{images/a.png}\n", &CompileConfig::default(), None)
        .unwrap_err();
    assert!(matches!(
        err.0.as_slice(),
        [ParseError::UnterminatedBlock { kind, location, .. }]
            if kind == "figure" && location.line == 1
    ));
}

#[test]
fn malformed_environment_names_kind_and_clause() {
    let err = compile(
        "### s\n\n$figure\n$caption{no content}\n$endfigure\n",
        &CompileConfig::default(),
        None,
    )
    .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("`figure`"), "{text}");
    assert!(text.contains("`content`"), "{text}");
}

// ─── Includes ────────────────────────────────────────────────────────────

#[test]
fn includes_are_read_relative_to_root() {
    init_logging();
    let loader = FsLoader::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"));
    let p = compile(
        include_str!("fixtures/include_main.md"),
        &CompileConfig::default(),
        Some(&loader),
    )
    .expect("compile failed");
    let titles: Vec<&str> = slides(&p).iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Opening", "Closing"]);
    let opening = slides(&p)[0];
    assert!(matches!(
        opening.content.items.as_slice(),
        [ResolvedItem::Heading { level: 4, .. }, ResolvedItem::Environment(_)]
    ));
    assert_eq!(p.headings[1].get("color"), Some("teal"));
}

#[test]
fn missing_include_is_an_error() {
    let loader = FsLoader::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"));
    let err = compile("$include(nope.md)\n", &CompileConfig::default(), Some(&loader))
        .unwrap_err();
    assert!(matches!(
        err.0.as_slice(),
        [ParseError::Include { path, .. }] if path == "nope.md"
    ));
}

// ─── Purity ──────────────────────────────────────────────────────────────

#[test]
fn resolution_is_idempotent_and_thread_safe() {
    let config = CompileConfig::default();
    let deck = parse_document(include_str!("fixtures/lecture.md"), &config, None)
        .expect("parse failed");
    let baseline = resolve_deck(&deck, &config);
    assert_eq!(resolve_deck(&deck, &config), baseline);

    let results: Vec<ResolvedPresentation> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| resolve_deck(&deck, &config)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("resolver thread panicked"))
            .collect()
    });
    for result in results {
        assert_eq!(result, baseline);
    }
}

#[test]
fn output_serializes_to_json() {
    let p = compile_default(include_str!("fixtures/lecture.md"));
    let json = serde_json::to_value(&p).expect("serialize failed");
    assert_eq!(json["children"][0]["type"], "slide");
    assert_eq!(json["children"][0]["id"], "slide-0");
    assert_eq!(json["children"][1]["type"], "section");
    assert_eq!(json["metadata"]["title"], "Numerical Methods");
    assert_eq!(json["selectors"]["callout"]["background"], "yellow");
    let slide = &json["children"][1]["children"][0]["children"][0];
    assert_eq!(slide["style"]["background"], "green");
    assert_eq!(slide["content"]["items"][1]["type"], "environment");
    assert_eq!(slide["content"]["items"][1]["kind"], "figure");
}
