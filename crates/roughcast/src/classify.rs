//! Paint intent and rendering parameters for one primitive.

use crate::config::SketchOptions;
use crate::dom::{Document, Element, NodeId};
use crate::rough::RoughStyle;
use crate::shape::{GEOMETRY_ATTRS, PrimitiveKind};
use roughr::core::FillStyle;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleIntent {
    Hidden,
    Outline,
    Filled,
}

/// Effective paint of a primitive: explicit attribute first, then the cascaded value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paint {
    pub stroke: Option<String>,
    pub fill: Option<String>,
    pub stroke_width: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: StyleIntent,
    pub connector: bool,
    /// `None` exactly when the intent is [`StyleIntent::Hidden`].
    pub style: Option<RoughStyle>,
}

pub fn classify(
    doc: &Document,
    id: NodeId,
    surface: NodeId,
    kind: PrimitiveKind,
    options: &SketchOptions,
) -> Classification {
    let paint = resolve_paint(doc, id, surface);
    // The initial stroke is `none` unless a stylesheet could reach the element through a class.
    let stroke_visible = match paint.stroke.as_deref() {
        Some(stroke) => !is_transparent(stroke),
        None => has_class_up_to(doc, id, surface),
    };
    let has_fill = paint.fill.as_deref().is_some_and(|f| !is_transparent(f));

    if !stroke_visible && !has_fill {
        return Classification {
            intent: StyleIntent::Hidden,
            connector: false,
            style: None,
        };
    }

    let intent = semantic_intent(doc, id, surface, options).unwrap_or(
        if paint.fill.as_deref().is_some_and(|f| !is_default_fill(f)) {
            StyleIntent::Filled
        } else {
            StyleIntent::Outline
        },
    );
    let connector = is_connector(doc, id, surface, kind, has_fill, options);

    let resolved_stroke = paint.stroke.clone().filter(|_| stroke_visible);
    let (stroke, fill_style, fill) = match intent {
        StyleIntent::Filled => {
            let fill = paint
                .fill
                .clone()
                .filter(|_| has_fill)
                .or_else(|| resolved_stroke.clone())
                .unwrap_or_else(|| options.default_stroke.clone());
            (resolved_stroke, Some(FillStyle::Solid), Some(fill))
        }
        _ => {
            let stroke = resolved_stroke.unwrap_or_else(|| options.default_stroke.clone());
            if has_fill {
                (Some(stroke), Some(FillStyle::CrossHatch), paint.fill.clone())
            } else {
                (Some(stroke), None, None)
            }
        }
    };

    let (roughness, bowing) = if connector {
        (options.edge_roughness, options.edge_bowing)
    } else {
        (options.shape_roughness, options.shape_bowing)
    };

    let style = RoughStyle {
        roughness,
        bowing,
        stroke,
        stroke_width: paint.stroke_width.unwrap_or(1.0) as f32,
        fill_style,
        fill,
        fill_weight: options.fill_weight,
        hachure_gap: options.hachure_gap,
        seed: doc
            .element(id)
            .map(|el| element_seed(el, options.seed))
            .unwrap_or(1),
    };

    Classification {
        intent,
        connector,
        style: Some(style),
    }
}

pub fn resolve_paint(doc: &Document, id: NodeId, surface: NodeId) -> Paint {
    Paint {
        stroke: resolve_property(doc, id, surface, "stroke"),
        fill: resolve_property(doc, id, surface, "fill"),
        stroke_width: resolve_property(doc, id, surface, "stroke-width")
            .and_then(|w| parse_length(&w))
            .filter(|w| w.is_finite() && *w > 0.0),
    }
}

/// Looks up a presentation property on `id`, then on its ancestors up to `surface`.
pub fn resolve_property(doc: &Document, id: NodeId, surface: NodeId, name: &str) -> Option<String> {
    let own = doc.element(id).and_then(|el| own_property(el, name));
    if let Some(v) = own {
        return Some(v.to_string());
    }
    for a in doc.ancestors(id) {
        if let Some(v) = doc.element(a).and_then(|el| own_property(el, name)) {
            return Some(v.to_string());
        }
        if a == surface {
            break;
        }
    }
    None
}

/// Presentation attribute, falling back to the element's own `style` declaration. `inherit` and
/// empty values count as unset.
pub fn own_property<'a>(el: &'a Element, name: &str) -> Option<&'a str> {
    el.attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "inherit")
        .or_else(|| {
            el.attr("style")
                .and_then(|s| style_declaration(s, name))
                .filter(|v| !v.is_empty() && *v != "inherit")
        })
}

pub fn style_declaration<'a>(style: &'a str, name: &str) -> Option<&'a str> {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .filter(|(k, _)| k.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim().trim_end_matches("!important").trim())
        .last()
}

/// `none`, `transparent`, and colors with a zero alpha channel.
pub fn is_transparent(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    if v == "none" || v == "transparent" {
        return true;
    }
    if let Some(inner) = ["rgba(", "hsla(", "rgb(", "hsl("]
        .iter()
        .find_map(|p| v.strip_prefix(p))
        .and_then(|s| s.strip_suffix(')'))
    {
        let parts: Vec<&str> = inner.split([',', '/']).map(str::trim).collect();
        let has_alpha = inner.contains('/') || parts.len() == 4;
        return has_alpha && parts.last().and_then(|a| parse_alpha(a)) == Some(0.0);
    }
    if let Some(hex) = v.strip_prefix('#') {
        return (hex.len() == 8 && hex.ends_with("00")) || (hex.len() == 4 && hex.ends_with('0'));
    }
    false
}

fn parse_alpha(raw: &str) -> Option<f64> {
    match raw.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().ok().map(|p| p / 100.0),
        None => raw.parse::<f64>().ok(),
    }
}

/// Fill values that do not signal a deliberately filled shape.
pub fn is_default_fill(value: &str) -> bool {
    if is_transparent(value) {
        return true;
    }
    let v: String = value
        .trim()
        .to_ascii_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    matches!(
        v.as_str(),
        "white" | "#fff" | "#ffffff" | "#ffff" | "#ffffffff" | "rgb(255,255,255)"
    )
}

fn parse_length(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    raw.strip_suffix("px").unwrap_or(raw).trim().parse().ok()
}

fn has_class_up_to(doc: &Document, id: NodeId, surface: NodeId) -> bool {
    for node in std::iter::once(id).chain(doc.ancestors(id)) {
        if doc
            .element(node)
            .and_then(|el| el.attr("class"))
            .is_some_and(|c| !c.trim().is_empty())
        {
            return true;
        }
        if node == surface {
            break;
        }
    }
    false
}

/// Nearest marker class on the element or its ancestors (up to `surface`).
fn semantic_intent(
    doc: &Document,
    id: NodeId,
    surface: NodeId,
    options: &SketchOptions,
) -> Option<StyleIntent> {
    for node in std::iter::once(id).chain(doc.ancestors(id)) {
        if let Some(el) = doc.element(node) {
            if options.filled_classes.iter().any(|c| el.has_class(c)) {
                return Some(StyleIntent::Filled);
            }
            if options.outline_classes.iter().any(|c| el.has_class(c)) {
                return Some(StyleIntent::Outline);
            }
        }
        if node == surface {
            break;
        }
    }
    None
}

fn is_connector(
    doc: &Document,
    id: NodeId,
    surface: NodeId,
    kind: PrimitiveKind,
    has_fill: bool,
    options: &SketchOptions,
) -> bool {
    match kind {
        PrimitiveKind::Line | PrimitiveKind::Polyline => return true,
        PrimitiveKind::Path if !has_fill => {
            let closed = doc
                .element(id)
                .and_then(|el| el.attr("d"))
                .is_some_and(|d| d.contains(['z', 'Z']));
            if !closed {
                return true;
            }
        }
        _ => {}
    }
    for node in std::iter::once(id).chain(doc.ancestors(id)) {
        if let Some(el) = doc.element(node) {
            if options.edge_classes.iter().any(|c| el.has_class(c)) {
                return true;
            }
        }
        if node == surface {
            break;
        }
    }
    false
}

/// Deterministic, non-zero seed derived from the element's tag and geometry.
pub fn element_seed(el: &Element, base: u64) -> u64 {
    let mut hasher = FxHasher::default();
    el.local_name().hash(&mut hasher);
    for name in GEOMETRY_ATTRS {
        el.attr(name).hash(&mut hasher);
    }
    base.hash(&mut hasher);
    match hasher.finish() & 0x7fff_ffff {
        0 => 1,
        seed => seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_first(src: &str, tag: &str) -> Classification {
        let doc = Document::parse(src).unwrap();
        let svg = doc.root_element().unwrap();
        let id = doc
            .descendants(svg)
            .into_iter()
            .find(|&n| doc.element(n).is_some_and(|e| e.local_name() == tag))
            .unwrap();
        let kind = PrimitiveKind::from_tag(tag).unwrap();
        classify(&doc, id, svg, kind, &SketchOptions::default())
    }

    #[test]
    fn invisible_paint_is_hidden() {
        let c = classify_first(r#"<svg><rect stroke="none" width="5" height="5"/></svg>"#, "rect");
        assert_eq!(c.intent, StyleIntent::Hidden);
        assert!(c.style.is_none());

        let c = classify_first(
            r#"<svg><rect stroke="transparent" fill="none" width="5" height="5"/></svg>"#,
            "rect",
        );
        assert_eq!(c.intent, StyleIntent::Hidden);
    }

    #[test]
    fn unset_stroke_is_none_without_a_class() {
        let c = classify_first(r#"<svg><rect width="10" height="10" fill="none"/></svg>"#, "rect");
        assert_eq!(c.intent, StyleIntent::Hidden);

        let c = classify_first(
            r#"<svg><g class="node"><rect width="10" height="10" fill="none"/></g></svg>"#,
            "rect",
        );
        assert_eq!(c.intent, StyleIntent::Outline);
        assert_eq!(c.style.unwrap().stroke.as_deref(), Some("currentColor"));
    }

    #[test]
    fn non_default_fill_is_filled_and_solid() {
        let c = classify_first(
            r##"<svg><g fill="#336699"><rect stroke="black" width="5" height="5"/></g></svg>"##,
            "rect",
        );
        assert_eq!(c.intent, StyleIntent::Filled);
        let style = c.style.unwrap();
        assert_eq!(style.fill_style, Some(FillStyle::Solid));
        assert_eq!(style.fill.as_deref(), Some("#336699"));
    }

    #[test]
    fn outline_with_white_fill_cross_hatches() {
        let c = classify_first(
            r#"<svg><rect style="fill: white; stroke: #000" width="5" height="5"/></svg>"#,
            "rect",
        );
        assert_eq!(c.intent, StyleIntent::Outline);
        let style = c.style.unwrap();
        assert_eq!(style.fill_style, Some(FillStyle::CrossHatch));
        assert_eq!(style.stroke.as_deref(), Some("#000"));
    }

    #[test]
    fn marker_class_overrides_fill_heuristic() {
        let c = classify_first(
            r#"<svg><g class="outline"><rect fill="red" stroke="black" width="5" height="5"/></g></svg>"#,
            "rect",
        );
        assert_eq!(c.intent, StyleIntent::Outline);
    }

    #[test]
    fn connectors_are_calmer_than_shapes() {
        let edge = classify_first(
            r#"<svg><path d="M0 0 L10 10" stroke="black" fill="none"/></svg>"#,
            "path",
        );
        let node = classify_first(r#"<svg><rect stroke="black" width="5" height="5"/></svg>"#, "rect");
        assert!(edge.connector);
        assert!(!node.connector);
        assert!(edge.style.unwrap().roughness < node.style.unwrap().roughness);
    }

    #[test]
    fn zero_alpha_colors_are_transparent() {
        assert!(is_transparent("rgba(0, 0, 0, 0)"));
        assert!(is_transparent("rgb(0 0 0 / 0%)"));
        assert!(is_transparent("#ff000000"));
        assert!(!is_transparent("rgb(0, 0, 0)"));
        assert!(!is_transparent("black"));
    }

    #[test]
    fn seed_is_stable_and_never_zero() {
        let el = Element::new("rect").with_attr("width", "10");
        assert_eq!(element_seed(&el, 0), element_seed(&el, 0));
        assert_ne!(element_seed(&el, 0), 0);
    }
}
