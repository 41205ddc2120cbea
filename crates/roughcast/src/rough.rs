//! Hand-drawn rendering capability (via `roughr`, a Rough.js port).
//!
//! The transformer only talks to [`HandDrawn`]; [`RoughrRenderer`] is the stock implementation.
//! Like Rough.js' generator, the outline is generated first (advancing the seeded PRNG) and the
//! fill second, while the fill is emitted first so the outline paints on top.

use crate::shape::{MAX_COORDINATE, Shape, is_drawable_number};
use crate::{Error, Result};
use euclid::default::Point2D;
use roughr::core::{FillStyle, OpSet, OpType, Options, OptionsBuilder};
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;

/// Style-options record handed to the rendering capability.
#[derive(Debug, Clone, PartialEq)]
pub struct RoughStyle {
    pub roughness: f32,
    pub bowing: f32,
    /// Boundary paint; `None` draws no boundary.
    pub stroke: Option<String>,
    pub stroke_width: f32,
    /// `None` draws no fill.
    pub fill_style: Option<FillStyle>,
    pub fill: Option<String>,
    pub fill_weight: f32,
    pub hachure_gap: f32,
    pub seed: u64,
}

/// Path data produced for one primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sketch {
    pub outline: String,
    pub fill: Option<String>,
}

pub trait HandDrawn {
    fn draw(&self, shape: &Shape, style: &RoughStyle) -> Result<Sketch>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoughrRenderer;

impl HandDrawn for RoughrRenderer {
    fn draw(&self, shape: &Shape, style: &RoughStyle) -> Result<Sketch> {
        let kind = shape.kind().tag();
        if !shape.is_finite() {
            return Err(Error::primitive(kind, "geometry is not finite"));
        }
        if let Shape::Path { d } = shape {
            validate_path_data(d).map_err(|e| Error::primitive(kind, e))?;
        }

        let opts = base_options(style).map_err(|e| Error::primitive(kind, e))?;
        // The generator asserts on degenerate float math; contain that to this primitive.
        let (outline, fill) = std::panic::catch_unwind(AssertUnwindSafe(|| {
            generate(shape, style.fill_style, opts)
        }))
        .map_err(|_| Error::primitive(kind, "rough generator panicked"))?;

        let outline = ops_to_svg_path_d(&outline);
        let fill = fill.map(|f| ops_to_svg_path_d(&f)).filter(|d| !d.is_empty());
        if outline.is_empty() && fill.is_none() {
            return Err(Error::primitive(kind, "renderer produced no geometry"));
        }
        Ok(Sketch { outline, fill })
    }
}

fn generate(
    shape: &Shape,
    fill_style: Option<FillStyle>,
    mut opts: Options,
) -> (OpSet<f64>, Option<OpSet<f64>>) {
    let outline = outline_ops(shape, &mut opts);
    let fill = match (fill_style, fill_polygons(shape, &opts)) {
        (Some(FillStyle::Solid), Some(polys)) => {
            Some(roughr::renderer::solid_fill_polygon(&polys, &mut opts))
        }
        (Some(_), Some(mut polys)) => Some(roughr::renderer::pattern_fill_polygons(
            &mut polys, &mut opts,
        )),
        _ => None,
    };
    (outline, fill)
}

fn base_options(style: &RoughStyle) -> std::result::Result<Options, String> {
    let mut builder = OptionsBuilder::default();
    builder
        .seed(style.seed)
        .roughness(style.roughness)
        .bowing(style.bowing)
        .stroke_width(style.stroke_width)
        .fill_weight(style.fill_weight)
        .hachure_gap(style.hachure_gap)
        .disable_multi_stroke(false)
        .disable_multi_stroke_fill(false);
    if let Some(fill_style) = style.fill_style {
        builder.fill_style(fill_style);
    }
    builder.build().map_err(|e| e.to_string())
}

fn outline_ops(shape: &Shape, opts: &mut Options) -> OpSet<f64> {
    match shape {
        Shape::Path { d } => roughr::renderer::svg_path::<f64>(d.clone(), opts),
        Shape::Circle { cx, cy, r } => {
            roughr::renderer::ellipse::<f64>(*cx, *cy, r * 2.0, r * 2.0, opts)
        }
        Shape::Ellipse { cx, cy, rx, ry } => {
            roughr::renderer::ellipse::<f64>(*cx, *cy, rx * 2.0, ry * 2.0, opts)
        }
        Shape::Rect {
            x,
            y,
            width,
            height,
            rx,
            ry,
        } => {
            if *rx > 0.0 && *ry > 0.0 {
                let d = rounded_rect_path(*x, *y, *width, *height, *rx, *ry);
                roughr::renderer::svg_path::<f64>(d, opts)
            } else {
                roughr::renderer::rectangle::<f64>(*x, *y, *width, *height, opts)
            }
        }
        Shape::Line { x1, y1, x2, y2 } => roughr::renderer::line::<f64>(*x1, *y1, *x2, *y2, opts),
        Shape::Polygon { points } => roughr::renderer::polygon::<f64>(&to_points(points), opts),
        Shape::Polyline { points } => {
            roughr::renderer::linear_path::<f64>(&to_points(points), false, opts)
        }
    }
}

/// Polygons covering the fillable area, or `None` for shapes without an interior.
fn fill_polygons(shape: &Shape, opts: &Options) -> Option<Vec<Vec<Point2D<f64>>>> {
    let polys = match shape {
        Shape::Line { .. } => return None,
        Shape::Polygon { points } | Shape::Polyline { points } => {
            if points.len() < 3 {
                return None;
            }
            vec![to_points(points)]
        }
        Shape::Rect {
            x,
            y,
            width,
            height,
            rx,
            ry,
        } => {
            if *rx > 0.0 && *ry > 0.0 {
                points_on_path(&rounded_rect_path(*x, *y, *width, *height, *rx, *ry), opts)
            } else {
                vec![vec![
                    Point2D::new(*x, *y),
                    Point2D::new(x + width, *y),
                    Point2D::new(x + width, y + height),
                    Point2D::new(*x, y + height),
                ]]
            }
        }
        Shape::Circle { cx, cy, r } => vec![ellipse_points(*cx, *cy, *r, *r)],
        Shape::Ellipse { cx, cy, rx, ry } => vec![ellipse_points(*cx, *cy, *rx, *ry)],
        Shape::Path { d } => points_on_path(d, opts),
    };
    let polys: Vec<_> = polys.into_iter().filter(|p| p.len() >= 3).collect();
    (!polys.is_empty()).then_some(polys)
}

fn points_on_path(d: &str, opts: &Options) -> Vec<Vec<Point2D<f64>>> {
    // Rough.js `generator.path(...)` samples with `distance = (1 + roughness) / 2`.
    let distance = (1.0 + opts.roughness.unwrap_or(1.0) as f64) / 2.0;
    roughr::points_on_path::points_on_path::<f64>(d.to_string(), Some(1.0), Some(distance))
}

fn ellipse_points(cx: f64, cy: f64, rx: f64, ry: f64) -> Vec<Point2D<f64>> {
    const STEPS: usize = 36;
    (0..STEPS)
        .map(|i| {
            let t = (i as f64) * std::f64::consts::TAU / (STEPS as f64);
            Point2D::new(cx + rx * t.cos(), cy + ry * t.sin())
        })
        .collect()
}

fn to_points(points: &[(f64, f64)]) -> Vec<Point2D<f64>> {
    points.iter().map(|&(x, y)| Point2D::new(x, y)).collect()
}

fn rounded_rect_path(x: f64, y: f64, w: f64, h: f64, rx: f64, ry: f64) -> String {
    format!(
        "M{} {} H{} A{rx} {ry} 0 0 1 {} {} V{} A{rx} {ry} 0 0 1 {} {} H{} A{rx} {ry} 0 0 1 {} {} V{} A{rx} {ry} 0 0 1 {} {} Z",
        x + rx,
        y,
        x + w - rx,
        x + w,
        y + ry,
        y + h - ry,
        x + w - rx,
        y + h,
        x + rx,
        x,
        y + h - ry,
        y + ry,
        x + rx,
        y,
    )
}

fn validate_path_data(d: &str) -> std::result::Result<(), String> {
    use svgtypes::{PathSegment, SimplePathSegment};

    let out_of_range = || format!("path data exceeds {MAX_COORDINATE:e}");
    let mut segments = 0usize;
    for segment in svgtypes::PathParser::from(d) {
        let segment = segment.map_err(|e| format!("invalid path data: {e}"))?;
        let numbers: Vec<f64> = match segment {
            PathSegment::MoveTo { x, y, .. }
            | PathSegment::LineTo { x, y, .. }
            | PathSegment::SmoothQuadratic { x, y, .. } => vec![x, y],
            PathSegment::HorizontalLineTo { x, .. } => vec![x],
            PathSegment::VerticalLineTo { y, .. } => vec![y],
            PathSegment::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
                ..
            } => vec![x1, y1, x2, y2, x, y],
            PathSegment::SmoothCurveTo { x2, y2, x, y, .. } => vec![x2, y2, x, y],
            PathSegment::Quadratic { x1, y1, x, y, .. } => vec![x1, y1, x, y],
            PathSegment::EllipticalArc {
                rx,
                ry,
                x_axis_rotation,
                x,
                y,
                ..
            } => vec![rx, ry, x_axis_rotation, x, y],
            PathSegment::ClosePath { .. } => vec![],
        };
        if !numbers.iter().all(|&n| is_drawable_number(n)) {
            return Err(out_of_range());
        }
        segments += 1;
    }
    if segments == 0 {
        return Err("path data has no segments".to_string());
    }

    // Relative commands can still walk out of range once resolved to absolute positions.
    for segment in svgtypes::SimplifyingPathParser::from(d) {
        let segment = segment.map_err(|e| format!("invalid path data: {e}"))?;
        let in_range = match segment {
            SimplePathSegment::MoveTo { x, y } | SimplePathSegment::LineTo { x, y } => {
                is_drawable_number(x) && is_drawable_number(y)
            }
            SimplePathSegment::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => [x1, y1, x2, y2, x, y].into_iter().all(is_drawable_number),
            SimplePathSegment::Quadratic { x1, y1, x, y } => {
                [x1, y1, x, y].into_iter().all(is_drawable_number)
            }
            SimplePathSegment::ClosePath => true,
        };
        if !in_range {
            return Err(out_of_range());
        }
    }
    Ok(())
}

// Rough.js' `opsToPath(...)` uses `Number.toString()` precision; keep full precision here too.
fn ops_to_svg_path_d(opset: &OpSet<f64>) -> String {
    let mut out = String::new();
    for op in &opset.ops {
        match op.op {
            OpType::Move => {
                let _ = write!(&mut out, "M{} {} ", op.data[0], op.data[1]);
            }
            OpType::BCurveTo => {
                let _ = write!(
                    &mut out,
                    "C{} {}, {} {}, {} {} ",
                    op.data[0], op.data[1], op.data[2], op.data[3], op.data[4], op.data[5]
                );
            }
            OpType::LineTo => {
                let _ = write!(&mut out, "L{} {} ", op.data[0], op.data[1]);
            }
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(fill_style: Option<FillStyle>) -> RoughStyle {
        RoughStyle {
            roughness: 1.0,
            bowing: 1.0,
            stroke: Some("black".to_string()),
            stroke_width: 1.0,
            fill_style,
            fill: fill_style.map(|_| "red".to_string()),
            fill_weight: 0.8,
            hachure_gap: 5.0,
            seed: 42,
        }
    }

    #[test]
    fn same_seed_draws_the_same_sketch() {
        let shape = Shape::Rect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 40.0,
            rx: 0.0,
            ry: 0.0,
        };
        let a = RoughrRenderer.draw(&shape, &style(None)).unwrap();
        let b = RoughrRenderer.draw(&shape, &style(None)).unwrap();
        assert_eq!(a, b);
        assert!(a.outline.starts_with('M'));
        assert!(a.fill.is_none());
    }

    #[test]
    fn line_has_no_fill_even_when_requested() {
        let shape = Shape::Line {
            x1: 0.0,
            y1: 0.0,
            x2: 50.0,
            y2: 0.0,
        };
        let sketch = RoughrRenderer
            .draw(&shape, &style(Some(FillStyle::Solid)))
            .unwrap();
        assert!(sketch.fill.is_none());
    }

    #[test]
    fn solid_fill_is_emitted_for_closed_shapes() {
        let shape = Shape::Circle {
            cx: 10.0,
            cy: 10.0,
            r: 8.0,
        };
        let sketch = RoughrRenderer
            .draw(&shape, &style(Some(FillStyle::Solid)))
            .unwrap();
        assert!(sketch.fill.is_some());
    }

    #[test]
    fn invalid_path_data_is_a_construction_failure() {
        let shape = Shape::Path {
            d: "M 10 10 L foo".to_string(),
        };
        let err = RoughrRenderer.draw(&shape, &style(None)).unwrap_err();
        assert!(matches!(err, Error::PrimitiveConstruction { ref kind, .. } if kind == "path"));
    }

    #[test]
    fn huge_path_coordinates_are_a_construction_failure() {
        for d in ["M0 0 L1e200 0 L0 1e200 Z", "m0 0 l9e14 0 l9e14 0 z"] {
            let shape = Shape::Path { d: d.to_string() };
            let err = RoughrRenderer
                .draw(&shape, &style(Some(FillStyle::Solid)))
                .unwrap_err();
            assert!(matches!(err, Error::PrimitiveConstruction { .. }), "{d}");
        }
    }

    #[test]
    fn non_finite_geometry_is_rejected() {
        let shape = Shape::Circle {
            cx: f64::NAN,
            cy: 0.0,
            r: 3.0,
        };
        assert!(RoughrRenderer.draw(&shape, &style(None)).is_err());
    }
}
