//! Acquisition: inline `<img src="*.svg">` placeholders as live `<svg>` roots.

use crate::config::SketchOptions;
use crate::dom::{Document, Element, NodeId};
use crate::{Error, Result};
use futures::future::{BoxFuture, join_all};
use rustc_hash::FxHashMap;
use std::str::FromStr;
use svgtypes::LengthUnit;
use url::Url;

/// Records the resolved URL an inlined root was fetched from.
pub const SOURCE_ATTR: &str = "data-sketch-source";

pub trait Fetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// Reads `file://` URLs from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFetcher;

impl Fetcher for FsFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            if url.scheme() != "file" {
                return Err(Error::fetch(url.as_str(), "only file:// URLs are supported"));
            }
            let path = url
                .to_file_path()
                .map_err(|()| Error::fetch(url.as_str(), "not a local path"))?;
            std::fs::read(&path).map_err(|e| Error::fetch(url.as_str(), e))
        })
    }
}

/// Serves fixed bodies by URL; anything else is a fetch failure.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    bodies: FxHashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.bodies.insert(url.into(), body.into());
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.insert(url, body);
        self
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Vec<u8>>> {
        let found = self.bodies.get(url.as_str()).cloned();
        Box::pin(async move { found.ok_or_else(|| Error::fetch(url.as_str(), "not found")) })
    }
}

#[derive(Debug, Default)]
pub struct AcquireReport {
    pub inlined: Vec<NodeId>,
    /// `(src, error)` for every placeholder left untouched.
    pub failures: Vec<(String, Error)>,
}

/// `src` values that point at an SVG file. Query and fragment are ignored; data URLs are not
/// placeholders.
pub fn is_svg_reference(src: &str) -> bool {
    let src = src.trim();
    if src.get(..5).is_some_and(|s| s.eq_ignore_ascii_case("data:")) {
        return false;
    }
    let path = src.split(['?', '#']).next().unwrap_or_default();
    path.len() > 4
        && path
            .get(path.len() - 4..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(".svg"))
}

pub fn find_placeholders(doc: &Document) -> Vec<NodeId> {
    doc.elements()
        .into_iter()
        .filter(|&id| {
            doc.element(id).is_some_and(|el| {
                el.local_name().eq_ignore_ascii_case("img")
                    && el.attr("src").is_some_and(is_svg_reference)
            })
        })
        .collect()
}

/// Fetches every placeholder concurrently, then inlines the successes in document order.
pub async fn acquire<F: Fetcher + ?Sized>(
    doc: &mut Document,
    fetcher: &F,
    base: &Url,
    options: &SketchOptions,
) -> AcquireReport {
    let mut report = AcquireReport::default();
    let mut pending = Vec::new();
    for id in find_placeholders(doc) {
        let Some(src) = doc.element(id).and_then(|el| el.attr("src")).map(str::to_string) else {
            continue;
        };
        match base.join(src.trim()) {
            Ok(url) => pending.push((id, src, url)),
            Err(e) => {
                tracing::warn!(%src, %e, "unresolvable diagram reference");
                report.failures.push((src.clone(), Error::fetch(src, e)));
            }
        }
    }
    if pending.is_empty() {
        return report;
    }

    let bodies = join_all(pending.iter().map(|(_, _, url)| fetcher.fetch(url))).await;
    tracing::debug!(count = pending.len(), "fetched diagram references");

    for ((placeholder, src, url), body) in pending.into_iter().zip(bodies) {
        match body.and_then(|bytes| inline_one(doc, placeholder, &bytes, &url, options)) {
            Ok(root) => report.inlined.push(root),
            Err(err) => {
                tracing::warn!(%src, %err, "leaving diagram placeholder in place");
                report.failures.push((src, err));
            }
        }
    }
    report
}

fn inline_one(
    doc: &mut Document,
    placeholder: NodeId,
    bytes: &[u8],
    url: &Url,
    options: &SketchOptions,
) -> Result<NodeId> {
    let text = std::str::from_utf8(bytes).map_err(Error::markup)?;
    let fetched = Document::parse(text)?;
    let root = fetched
        .root_element()
        .ok_or_else(|| Error::markup("document has no root element"))?;
    if fetched.element(root).map(Element::local_name) != Some("svg") {
        return Err(Error::markup("root element is not <svg>"));
    }
    let source = doc
        .element(placeholder)
        .cloned()
        .ok_or_else(|| Error::tree("placeholder is not an element"))?;

    let svg = doc.import_subtree(&fetched, root)?;
    if let Some(el) = doc.element_mut(svg) {
        normalize_root(el, &source, url, options);
    }
    doc.replace(placeholder, svg)?;
    Ok(svg)
}

/// Carries the placeholder's sizing, classes and label over to the inlined root.
pub fn normalize_root(svg: &mut Element, placeholder: &Element, url: &Url, options: &SketchOptions) {
    for class in placeholder.class_tokens().map(str::to_string).collect::<Vec<_>>() {
        svg.add_class(&class);
    }

    let size: Vec<(&str, &str)> = ["width", "height"]
        .into_iter()
        .filter_map(|name| placeholder.attr(name).map(|v| (name, v.trim())))
        .collect();

    if size.iter().any(|(_, v)| is_relative_length(v)) {
        if !svg.has_attr("viewBox") {
            if let Some((w, h)) = intrinsic_size(svg) {
                svg.set_attr("viewBox", format!("0 0 {w} {h}"));
            }
        }
        svg.remove_attr("width");
        svg.remove_attr("height");
        // Relative values only mean something to CSS; fixed ones stay presentation attributes.
        let mut decls: Vec<String> = svg
            .attr("style")
            .map(|s| s.trim().trim_end_matches(';').to_string())
            .filter(|s| !s.is_empty())
            .into_iter()
            .collect();
        for (name, value) in &size {
            if is_relative_length(value) {
                decls.push(format!("{name}: {value}"));
            } else {
                svg.set_attr(*name, *value);
            }
        }
        svg.set_attr("style", decls.join("; "));
    } else {
        for (name, value) in &size {
            svg.set_attr(*name, *value);
        }
    }

    if let Some(alt) = placeholder.attr("alt").filter(|a| !a.trim().is_empty()) {
        svg.set_attr("role", "img");
        svg.set_attr("aria-label", alt);
    }
    svg.set_attr(options.opt_in_attribute.clone(), "true");
    svg.set_attr(SOURCE_ATTR, url.as_str());
}

fn is_relative_length(v: &str) -> bool {
    v.ends_with('%') || v.eq_ignore_ascii_case("auto")
}

fn intrinsic_size(svg: &Element) -> Option<(f64, f64)> {
    let read = |name: &str| svg.attr(name).and_then(absolute_px);
    Some((read("width")?, read("height")?))
}

/// Converts an absolute SVG length to CSS pixels (96 per inch). Font-relative and percentage
/// lengths have no intrinsic size.
fn absolute_px(raw: &str) -> Option<f64> {
    let length = svgtypes::Length::from_str(raw.trim()).ok()?;
    let scale = match length.unit {
        LengthUnit::None | LengthUnit::Px => 1.0,
        LengthUnit::In => 96.0,
        LengthUnit::Cm => 96.0 / 2.54,
        LengthUnit::Mm => 96.0 / 25.4,
        LengthUnit::Pt => 4.0 / 3.0,
        LengthUnit::Pc => 16.0,
        _ => return None,
    };
    Some(length.number * scale).filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svg_references_ignore_query_and_fragment() {
        assert!(is_svg_reference("diagrams/a.svg"));
        assert!(is_svg_reference("A.SVG?v=3#top"));
        assert!(!is_svg_reference("a.png"));
        assert!(!is_svg_reference("data:image/svg+xml;base64,AAAA.svg"));
        assert!(!is_svg_reference("svg"));
    }

    #[test]
    fn fixed_size_is_copied_verbatim() {
        let mut svg = Element::new("svg")
            .with_attr("width", "200")
            .with_attr("height", "100");
        let img = Element::new("img")
            .with_attr("width", "120")
            .with_attr("class", "figure wide")
            .with_attr("alt", "A circuit");
        let url = Url::parse("file:///tmp/a.svg").unwrap();
        normalize_root(&mut svg, &img, &url, &SketchOptions::default());
        assert_eq!(svg.attr("width"), Some("120"));
        assert_eq!(svg.attr("height"), Some("100"));
        assert!(svg.has_class("figure") && svg.has_class("wide"));
        assert_eq!(svg.attr("aria-label"), Some("A circuit"));
        assert_eq!(svg.attr("data-sketch"), Some("true"));
        assert_eq!(svg.attr(SOURCE_ATTR), Some("file:///tmp/a.svg"));
        assert!(!svg.has_attr("viewBox"));
    }

    #[test]
    fn existing_viewbox_is_kept_for_relative_sizing() {
        let mut svg = Element::new("svg")
            .with_attr("viewBox", "0 0 10 10")
            .with_attr("width", "200")
            .with_attr("height", "100");
        let img = Element::new("img").with_attr("height", "auto");
        let url = Url::parse("file:///tmp/a.svg").unwrap();
        normalize_root(&mut svg, &img, &url, &SketchOptions::default());
        assert_eq!(svg.attr("viewBox"), Some("0 0 10 10"));
        assert_eq!(svg.attr("style"), Some("height: auto"));
        assert!(!svg.has_attr("width"));
    }

    #[test]
    fn both_dimensions_transfer_when_one_is_relative() {
        let url = Url::parse("file:///tmp/a.svg").unwrap();
        let source = Element::new("svg")
            .with_attr("width", "200")
            .with_attr("height", "100");

        let mut svg = source.clone();
        let img = Element::new("img")
            .with_attr("width", "50%")
            .with_attr("height", "30%");
        normalize_root(&mut svg, &img, &url, &SketchOptions::default());
        assert_eq!(svg.attr("style"), Some("width: 50%; height: 30%"));
        assert_eq!(svg.attr("viewBox"), Some("0 0 200 100"));
        assert!(!svg.has_attr("width") && !svg.has_attr("height"));

        let mut svg = source.with_attr("style", "display: block;");
        let img = Element::new("img")
            .with_attr("width", "50%")
            .with_attr("height", "80");
        normalize_root(&mut svg, &img, &url, &SketchOptions::default());
        assert_eq!(svg.attr("style"), Some("display: block; width: 50%"));
        assert_eq!(svg.attr("height"), Some("80"));
        assert!(!svg.has_attr("width"));
    }

    #[test]
    fn absolute_units_size_the_synthesized_view_box() {
        let mut svg = Element::new("svg")
            .with_attr("width", "1in")
            .with_attr("height", "0.5in");
        let img = Element::new("img").with_attr("width", "100%");
        let url = Url::parse("file:///tmp/a.svg").unwrap();
        normalize_root(&mut svg, &img, &url, &SketchOptions::default());
        assert_eq!(svg.attr("viewBox"), Some("0 0 96 48"));

        assert_eq!(absolute_px("10px"), Some(10.0));
        assert_eq!(absolute_px("6pc"), Some(96.0));
        assert!((absolute_px("2.54cm").unwrap() - 96.0).abs() < 1e-9);
        assert!((absolute_px("25.4mm").unwrap() - 96.0).abs() < 1e-9);
        assert_eq!(absolute_px("2em"), None);
        assert_eq!(absolute_px("50%"), None);
        assert_eq!(absolute_px("wide"), None);
    }
}
