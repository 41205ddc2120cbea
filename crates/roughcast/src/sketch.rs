//! Per-surface transform: sketch every visual primitive of one diagram root.

use crate::acquire::SOURCE_ATTR;
use crate::classify::{StyleIntent, classify, own_property};
use crate::config::{SketchOptions, SourcePolicy};
use crate::dom::{Document, Element, NodeId};
use crate::guard::{self, ProcessedSet, REPLACEMENT_ATTR};
use crate::rough::{HandDrawn, RoughStyle, Sketch};
use crate::shape::{GEOMETRY_ATTRS, PrimitiveKind, Shape};
use crate::{Error, Result};
use roughr::core::FillStyle;

/// Paint attributes re-derived by the classifier; never copied verbatim.
const PAINT_ATTRS: &[&str] = &["stroke", "fill", "stroke-width", "style"];

/// Stroke details that belong on the outline path rather than on the replacement group.
const STROKE_DETAIL_ATTRS: &[&str] = &[
    "stroke-dasharray",
    "stroke-dashoffset",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
    "stroke-opacity",
    "marker-start",
    "marker-mid",
    "marker-end",
    "vector-effect",
];

const FILL_DETAIL_ATTRS: &[&str] = &["fill-opacity", "fill-rule"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Inlined from an external file by acquisition.
    Fetched,
    /// Rendered into a designated container by the external diagramming library.
    LibraryInjected,
    /// Shipped inline in the page markup.
    Inline,
}

/// What to do with a crisp primitive after its sketch is in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    Hide,
    Remove,
}

impl Disposal {
    pub fn for_surface(policy: SourcePolicy, provenance: Provenance) -> Self {
        match (policy, provenance) {
            (SourcePolicy::Hide, _) => Self::Hide,
            (SourcePolicy::Remove, _) => Self::Remove,
            (SourcePolicy::ByProvenance, Provenance::LibraryInjected) => Self::Hide,
            (SourcePolicy::ByProvenance, _) => Self::Remove,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveOutcome {
    Sketched(NodeId),
    Hidden,
    Degenerate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceReport {
    pub surface: NodeId,
    pub provenance: Provenance,
    pub sketched: usize,
    pub hidden: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub fn provenance_of(doc: &Document, surface: NodeId, options: &SketchOptions) -> Provenance {
    if doc
        .element(surface)
        .is_some_and(|el| el.has_attr(SOURCE_ATTR))
    {
        return Provenance::Fetched;
    }
    let in_library_container = doc.ancestors(surface).any(|a| {
        doc.element(a).is_some_and(|el| {
            options
                .library_container_classes
                .iter()
                .any(|c| el.has_class(c))
        })
    });
    if in_library_container {
        Provenance::LibraryInjected
    } else {
        Provenance::Inline
    }
}

/// Primitives of `surface` eligible for sketching, in document order.
pub fn sketch_targets(doc: &Document, surface: NodeId) -> Vec<NodeId> {
    doc.descendants(surface)
        .into_iter()
        .filter(|&id| {
            doc.element(id).is_some_and(|el| {
                PrimitiveKind::from_tag(el.local_name()).is_some() && !el.has_attr(REPLACEMENT_ATTR)
            })
        })
        .filter(|&id| !guard::is_excluded(doc, id, surface))
        .collect()
}

/// Runs the full element pass over one diagram root.
///
/// Returns `None` when the guard has already seen `surface`. Failures are isolated per
/// primitive; the surface reaches `Processed` regardless.
pub fn sketch_surface<R: HandDrawn + ?Sized>(
    doc: &mut Document,
    surface: NodeId,
    processed: &mut ProcessedSet,
    options: &SketchOptions,
    renderer: &R,
) -> Option<SurfaceReport> {
    if !processed.begin(surface) {
        return None;
    }

    let provenance = provenance_of(doc, surface, options);
    let disposal = Disposal::for_surface(options.source_policy, provenance);
    let mut report = SurfaceReport {
        surface,
        provenance,
        sketched: 0,
        hidden: 0,
        skipped: 0,
        failed: 0,
    };

    for id in sketch_targets(doc, surface) {
        match sketch_primitive(doc, id, surface, options, renderer, disposal) {
            Ok(PrimitiveOutcome::Sketched(_)) => report.sketched += 1,
            Ok(PrimitiveOutcome::Hidden) => report.hidden += 1,
            Ok(PrimitiveOutcome::Degenerate) => report.skipped += 1,
            Err(err) => {
                tracing::warn!(surface = surface.index(), node = id.index(), %err, "leaving primitive crisp");
                report.failed += 1;
            }
        }
    }

    guard::mark_processed(doc, surface);
    processed.finish(surface);
    tracing::debug!(
        surface = surface.index(),
        ?provenance,
        sketched = report.sketched,
        hidden = report.hidden,
        skipped = report.skipped,
        failed = report.failed,
        "sketched diagram surface"
    );
    Some(report)
}

/// Classifies one primitive and swaps in its hand-drawn replacement.
///
/// The document is only touched once the replacement is fully built, so an error leaves the
/// primitive exactly as it was.
pub fn sketch_primitive<R: HandDrawn + ?Sized>(
    doc: &mut Document,
    id: NodeId,
    surface: NodeId,
    options: &SketchOptions,
    renderer: &R,
    disposal: Disposal,
) -> Result<PrimitiveOutcome> {
    let source = doc
        .element(id)
        .cloned()
        .ok_or_else(|| Error::tree("primitive is not an element"))?;
    let kind = PrimitiveKind::from_tag(source.local_name())
        .ok_or_else(|| Error::primitive(source.name.clone(), "not a geometric primitive"))?;

    let classification = classify(doc, id, surface, kind, options);
    let style = match (classification.intent, classification.style) {
        (StyleIntent::Hidden, _) | (_, None) => {
            hide(doc, id);
            return Ok(PrimitiveOutcome::Hidden);
        }
        (_, Some(style)) => style,
    };

    let Some(shape) = Shape::from_element(kind, &source) else {
        return Ok(PrimitiveOutcome::Degenerate);
    };
    let sketch = renderer.draw(&shape, &style)?;

    let group = doc.create_element(replacement_group(&source, disposal));
    for path in replacement_paths(&source, &sketch, &style) {
        let p = doc.create_element(path);
        doc.append_child(group, p)?;
    }
    doc.insert_before(group, id)?;

    match disposal {
        Disposal::Hide => hide(doc, id),
        Disposal::Remove => doc.detach(id),
    }
    Ok(PrimitiveOutcome::Sketched(group))
}

fn hide(doc: &mut Document, id: NodeId) {
    if let Some(el) = doc.element_mut(id) {
        el.set_attr("opacity", "0");
    }
}

fn sibling_name(source: &Element, local: &str) -> String {
    match source.name.rsplit_once(':') {
        Some((prefix, _)) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

fn is_consumed_attr(name: &str) -> bool {
    GEOMETRY_ATTRS.contains(&name)
        || PAINT_ATTRS.contains(&name)
        || STROKE_DETAIL_ATTRS.contains(&name)
        || FILL_DETAIL_ATTRS.contains(&name)
}

/// The `<g>` wrapper carrying the source's structural attributes.
fn replacement_group(source: &Element, disposal: Disposal) -> Element {
    let mut group = Element::new(sibling_name(source, "g"));
    for (name, value) in &source.attrs {
        if is_consumed_attr(name) {
            continue;
        }
        // Two live elements must not share an id.
        if name == "id" && disposal == Disposal::Hide {
            continue;
        }
        group.set_attr(name.clone(), value.clone());
    }
    group.set_attr(REPLACEMENT_ATTR, "true");
    group
}

fn replacement_paths(source: &Element, sketch: &Sketch, style: &RoughStyle) -> Vec<Element> {
    let path_name = sibling_name(source, "path");
    let mut out = Vec::with_capacity(2);

    if let (Some(d), Some(fill)) = (&sketch.fill, &style.fill) {
        let mut path = Element::new(path_name.clone()).with_attr("d", d.clone());
        if style.fill_style == Some(FillStyle::Solid) {
            path.set_attr("fill", fill.clone());
            path.set_attr("stroke", "none");
            for name in FILL_DETAIL_ATTRS {
                if let Some(v) = own_property(source, name) {
                    path.set_attr(*name, v);
                }
            }
        } else {
            path.set_attr("fill", "none");
            path.set_attr("stroke", fill.clone());
            path.set_attr("stroke-width", fmt_num(style.fill_weight as f64));
            if let Some(v) = own_property(source, "fill-opacity") {
                path.set_attr("stroke-opacity", v);
            }
        }
        out.push(path);
    }

    if let Some(stroke) = &style.stroke {
        if !sketch.outline.is_empty() {
            let mut path = Element::new(path_name)
                .with_attr("d", sketch.outline.clone())
                .with_attr("fill", "none")
                .with_attr("stroke", stroke.clone())
                .with_attr("stroke-width", fmt_num(style.stroke_width as f64));
            for name in STROKE_DETAIL_ATTRS {
                if let Some(v) = own_property(source, name) {
                    path.set_attr(*name, v);
                }
            }
            out.push(path);
        }
    }
    out
}

fn fmt_num(v: f64) -> String {
    let r = (v * 1000.0).round() / 1000.0;
    format!("{r}")
}
