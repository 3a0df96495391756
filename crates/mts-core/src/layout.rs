//! Slide geometry: content area dimensions and slide positions.
//!
//! Converts the declarative geometry options of resolved styles
//! (`slide-transition`, `data-x/y/z`, widths and heights) into concrete
//! numbers for the renderer. Nothing here runs an animation.

use crate::cascade::ResolvedStyle;
use crate::theme::{OptionMap, SlidePart};
use serde::Serialize;

// ─── Content dimensions ──────────────────────────────────────────────────

/// Shrink a `100%` content area by the components present on its slide:
/// width by the sidebar widths, height by the header and footer heights.
/// Only `%` values count.
pub fn adjust_content_dims<'a>(
    content: &mut ResolvedStyle,
    components: impl IntoIterator<Item = (SlidePart, &'a ResolvedStyle)>,
) {
    let mut width = 100.0;
    let mut height = 100.0;
    for (part, style) in components {
        match part {
            SlidePart::Sidebar(..) => width -= percent(style.get("width")),
            SlidePart::Header(_) | SlidePart::Footer(_) => height -= percent(style.get("height")),
            SlidePart::Container | SlidePart::Content => {}
        }
    }
    if content.get("width") == Some("100%") {
        content.set("width", format!("{}%", format_number(width)));
    }
    if content.get("height") == Some("100%") {
        content.set("height", format!("{}%", format_number(height)));
    }
}

fn percent(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.trim().strip_suffix('%'))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0.0)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ─── Positions ───────────────────────────────────────────────────────────

/// How a slide is placed relative to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    #[default]
    Horizontal,
    Vertical,
    Diagonal,
    Absolute,
}

impl Transition {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "horizontal" => Some(Transition::Horizontal),
            "vertical" => Some(Transition::Vertical),
            "diagonal" => Some(Transition::Diagonal),
            "absolute" => Some(Transition::Absolute),
            _ => None,
        }
    }
}

/// Where a slide sits in presentation space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SlidePosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub scale: f64,
    pub rotate: f64,
    pub rotate_x: f64,
    pub rotate_y: f64,
    pub rotate_z: f64,
}

const AXES: [&str; 3] = ["data-x", "data-y", "data-z"];

/// Places slides one after another in document order.
#[derive(Debug, Default)]
pub struct SlidePlacer {
    /// Origin, width and height of the previously placed slide.
    previous: Option<([f64; 3], f64, f64)>,
}

impl SlidePlacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position the next slide from its resolved style and the options of
    /// its local override. Coordinates declared locally pin the slide in the
    /// non-absolute modes; the sequence continues from the pinned origin.
    pub fn place(&mut self, style: &ResolvedStyle, local: &OptionMap) -> SlidePosition {
        let transition = style
            .get("slide-transition")
            .map(|value| {
                Transition::parse(value).unwrap_or_else(|| {
                    log::warn!("unknown slide-transition `{value}`, using horizontal");
                    Transition::Horizontal
                })
            })
            .unwrap_or_default();

        let mut origin = match (transition, self.previous) {
            (Transition::Absolute, _) => AXES.map(|axis| number(style.get(axis))),
            (_, None) => [0.0; 3],
            (transition, Some((mut origin, width, height))) => {
                if matches!(transition, Transition::Horizontal | Transition::Diagonal) {
                    origin[0] += width;
                }
                if matches!(transition, Transition::Vertical | Transition::Diagonal) {
                    origin[1] += height;
                }
                origin
            }
        };
        if transition != Transition::Absolute {
            for (i, axis) in AXES.iter().enumerate() {
                if let Some(value) = local.get(*axis) {
                    origin[i] = number(Some(value));
                }
            }
        }

        self.previous = Some((
            origin,
            number(style.get("width")),
            number(style.get("height")),
        ));
        let [x, y, z] = origin;
        SlidePosition {
            x,
            y,
            z,
            ..rotation_and_scale(style)
        }
    }
}

/// The overview step sits at the origin and does not advance the sequence.
pub fn overview_position(style: &ResolvedStyle) -> SlidePosition {
    rotation_and_scale(style)
}

fn rotation_and_scale(style: &ResolvedStyle) -> SlidePosition {
    SlidePosition {
        scale: style.get("data-scale").map_or(1.0, |v| number(Some(v))),
        rotate: number(style.get("data-rotate")),
        rotate_x: number(style.get("data-rotate-x")),
        rotate_y: number(style.get("data-rotate-y")),
        rotate_z: number(style.get("data-rotate-z")),
        ..SlidePosition::default()
    }
}

/// Leading number of a length (`900px` → 900); 0 when there is none.
fn number(value: Option<&str>) -> f64 {
    let Some(value) = value else {
        return 0.0;
    };
    let trimmed = value.trim();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map_or(trimmed.len(), |(i, _)| i);
    trimmed[..end].parse().unwrap_or_else(|_| {
        log::warn!("expected a number, found `{value}`");
        0.0
    })
}
