//! Geometry extraction for the closed set of drawable primitives.

use crate::dom::Element;

/// Attributes consumed as geometry; they never travel to a sketch replacement.
pub const GEOMETRY_ATTRS: &[&str] = &[
    "d", "x", "y", "width", "height", "cx", "cy", "r", "rx", "ry", "x1", "y1", "x2", "y2",
    "points", "pathLength",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Path,
    Circle,
    Rect,
    Ellipse,
    Line,
    Polygon,
    Polyline,
}

impl PrimitiveKind {
    pub fn from_tag(local_name: &str) -> Option<Self> {
        Some(match local_name {
            "path" => Self::Path,
            "circle" => Self::Circle,
            "rect" => Self::Rect,
            "ellipse" => Self::Ellipse,
            "line" => Self::Line,
            "polygon" => Self::Polygon,
            "polyline" => Self::Polyline,
            _ => return None,
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Circle => "circle",
            Self::Rect => "rect",
            Self::Ellipse => "ellipse",
            Self::Line => "line",
            Self::Polygon => "polygon",
            Self::Polyline => "polyline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    fn of_points(points: &[(f64, f64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut b = Bounds {
            min_x: x0,
            min_y: y0,
            max_x: x0,
            max_y: y0,
        };
        for &(x, y) in rest {
            b.min_x = b.min_x.min(x);
            b.min_y = b.min_y.min(y);
            b.max_x = b.max_x.max(x);
            b.max_y = b.max_y.max(y);
        }
        Some(b)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Path {
        d: String,
    },
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        rx: f64,
        ry: f64,
    },
    Ellipse {
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    Polygon {
        points: Vec<(f64, f64)>,
    },
    Polyline {
        points: Vec<(f64, f64)>,
    },
}

impl Shape {
    /// Reads the geometry of `el`. Returns `None` for degenerate geometry, which is skipped
    /// rather than treated as an error.
    pub fn from_element(kind: PrimitiveKind, el: &Element) -> Option<Self> {
        let num = |name: &str| number_attr(el, name);
        let shape = match kind {
            PrimitiveKind::Path => {
                let d = el.attr("d").unwrap_or_default().trim();
                if d.is_empty() {
                    return None;
                }
                Shape::Path { d: d.to_string() }
            }
            PrimitiveKind::Circle => {
                let r = num("r");
                if r <= 0.0 {
                    return None;
                }
                Shape::Circle {
                    cx: num("cx"),
                    cy: num("cy"),
                    r,
                }
            }
            PrimitiveKind::Rect => {
                let (width, height) = (num("width"), num("height"));
                if width <= 0.0 || height <= 0.0 {
                    return None;
                }
                // A missing radius mirrors the other one; both are clamped to half the side.
                let (rx, ry) = match (el.attr("rx"), el.attr("ry")) {
                    (None, None) => (0.0, 0.0),
                    (Some(_), None) => (num("rx"), num("rx")),
                    (None, Some(_)) => (num("ry"), num("ry")),
                    (Some(_), Some(_)) => (num("rx"), num("ry")),
                };
                Shape::Rect {
                    x: num("x"),
                    y: num("y"),
                    width,
                    height,
                    rx: rx.max(0.0).min(width / 2.0),
                    ry: ry.max(0.0).min(height / 2.0),
                }
            }
            PrimitiveKind::Ellipse => {
                let (rx, ry) = (num("rx"), num("ry"));
                if rx <= 0.0 || ry <= 0.0 {
                    return None;
                }
                Shape::Ellipse {
                    cx: num("cx"),
                    cy: num("cy"),
                    rx,
                    ry,
                }
            }
            PrimitiveKind::Line => {
                let (x1, y1, x2, y2) = (num("x1"), num("y1"), num("x2"), num("y2"));
                if x1 == x2 && y1 == y2 {
                    return None;
                }
                Shape::Line { x1, y1, x2, y2 }
            }
            PrimitiveKind::Polygon | PrimitiveKind::Polyline => {
                let points = parse_points(el.attr("points").unwrap_or_default());
                if points.len() < 2 {
                    return None;
                }
                if kind == PrimitiveKind::Polygon {
                    Shape::Polygon { points }
                } else {
                    Shape::Polyline { points }
                }
            }
        };
        Some(shape)
    }

    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Shape::Path { .. } => PrimitiveKind::Path,
            Shape::Circle { .. } => PrimitiveKind::Circle,
            Shape::Rect { .. } => PrimitiveKind::Rect,
            Shape::Ellipse { .. } => PrimitiveKind::Ellipse,
            Shape::Line { .. } => PrimitiveKind::Line,
            Shape::Polygon { .. } => PrimitiveKind::Polygon,
            Shape::Polyline { .. } => PrimitiveKind::Polyline,
        }
    }

    /// Axis-aligned bounds of the source geometry. Paths are not measured.
    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            Shape::Path { .. } => None,
            Shape::Circle { cx, cy, r } => Some(Bounds {
                min_x: cx - r,
                min_y: cy - r,
                max_x: cx + r,
                max_y: cy + r,
            }),
            Shape::Rect {
                x,
                y,
                width,
                height,
                ..
            } => Some(Bounds {
                min_x: *x,
                min_y: *y,
                max_x: x + width,
                max_y: y + height,
            }),
            Shape::Ellipse { cx, cy, rx, ry } => Some(Bounds {
                min_x: cx - rx,
                min_y: cy - ry,
                max_x: cx + rx,
                max_y: cy + ry,
            }),
            Shape::Line { x1, y1, x2, y2 } => Bounds::of_points(&[(*x1, *y1), (*x2, *y2)]),
            Shape::Polygon { points } | Shape::Polyline { points } => Bounds::of_points(points),
        }
    }

    /// Whether every number is finite and no larger than [`MAX_COORDINATE`]. Path data is
    /// checked separately, while it is parsed.
    pub fn is_finite(&self) -> bool {
        let all = |v: &[f64]| v.iter().all(|&n| is_drawable_number(n));
        match self {
            Shape::Path { .. } => true,
            Shape::Circle { cx, cy, r } => all(&[*cx, *cy, *r]),
            Shape::Rect {
                x,
                y,
                width,
                height,
                rx,
                ry,
            } => all(&[*x, *y, *width, *height, *rx, *ry]),
            Shape::Ellipse { cx, cy, rx, ry } => all(&[*cx, *cy, *rx, *ry]),
            Shape::Line { x1, y1, x2, y2 } => all(&[*x1, *y1, *x2, *y2]),
            Shape::Polygon { points } | Shape::Polyline { points } => {
                points.iter().all(|&(x, y)| is_drawable_number(x) && is_drawable_number(y))
            }
        }
    }
}

/// Largest coordinate magnitude handed to the renderer. Squared distances beyond this overflow
/// into infinities and NaN inside the rough generator.
pub const MAX_COORDINATE: f64 = 1e15;

pub fn is_drawable_number(n: f64) -> bool {
    n.is_finite() && n.abs() <= MAX_COORDINATE
}

/// Reads a numeric geometry attribute. Missing attributes are `0`; values that are present but
/// not plain user-space numbers (e.g. percentages) come back as NaN and are rejected later.
pub fn number_attr(el: &Element, name: &str) -> f64 {
    let Some(raw) = el.attr(name) else {
        return 0.0;
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }
    raw.strip_suffix("px")
        .unwrap_or(raw)
        .trim()
        .parse::<f64>()
        .unwrap_or(f64::NAN)
}

/// Parses an SVG `points` list into coordinate pairs.
///
/// Numbers follow the SVG number grammar, so `40-5` is two values. A trailing unpaired value is
/// dropped, and parsing stops at the first malformed number.
pub fn parse_points(raw: &str) -> Vec<(f64, f64)> {
    svgtypes::PointsParser::from(raw).collect()
}
