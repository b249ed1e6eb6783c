use crate::ir::NodeShape;

use super::types::{Point, PositionedNode};

/// Trims a finished polyline end to the true outline of the node it touches.
pub trait ShapeClipper {
    fn clip(&self, points: &[Point], node: &PositionedNode, is_source_end: bool) -> Vec<Point>;
}

/// Default clipper: polygons for angular shapes, ellipses for round ones,
/// box-like shapes untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryClipper;

enum Outline {
    Polygon(Vec<Point>),
    Ellipse { center: Point, rx: f64, ry: f64 },
}

fn outline(node: &PositionedNode) -> Option<Outline> {
    let (x, y, w, h) = (node.x, node.y, node.width, node.height);
    let cx = x + w / 2.0;
    let cy = y + h / 2.0;
    let polygon = match node.shape {
        NodeShape::Diamond => vec![
            Point::new(cx, y),
            Point::new(x + w, cy),
            Point::new(cx, y + h),
            Point::new(x, cy),
        ],
        NodeShape::Hexagon => {
            let inset = (h / 4.0).min(w / 4.0);
            vec![
                Point::new(x + inset, y),
                Point::new(x + w - inset, y),
                Point::new(x + w, cy),
                Point::new(x + w - inset, y + h),
                Point::new(x + inset, y + h),
                Point::new(x, cy),
            ]
        }
        NodeShape::Trapezoid => {
            let offset = w * 0.18;
            vec![
                Point::new(x + offset, y),
                Point::new(x + w - offset, y),
                Point::new(x + w, y + h),
                Point::new(x, y + h),
            ]
        }
        NodeShape::TrapezoidAlt => {
            let offset = w * 0.18;
            vec![
                Point::new(x, y),
                Point::new(x + w, y),
                Point::new(x + w - offset, y + h),
                Point::new(x + offset, y + h),
            ]
        }
        NodeShape::Asymmetric => {
            let notch = h / 2.0;
            vec![
                Point::new(x, y),
                Point::new(x + w, y),
                Point::new(x + w, y + h),
                Point::new(x, y + h),
                Point::new(x + notch, cy),
            ]
        }
        NodeShape::Circle | NodeShape::Doublecircle | NodeShape::StateStart | NodeShape::StateEnd => {
            return Some(Outline::Ellipse {
                center: Point::new(cx, cy),
                rx: w / 2.0,
                ry: h / 2.0,
            });
        }
        _ => return None,
    };
    Some(Outline::Polygon(polygon))
}

fn ray_polygon_intersection(origin: Point, dir: Point, poly: &[Point]) -> Option<Point> {
    if poly.len() < 2 {
        return None;
    }
    let mut best_t: Option<f64> = None;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        let sx = b.x - a.x;
        let sy = b.y - a.y;
        let qx = a.x - origin.x;
        let qy = a.y - origin.y;
        let denom = dir.x * sy - dir.y * sx;
        if denom.abs() < 1e-9 {
            continue;
        }
        let t = (qx * sy - qy * sx) / denom;
        let u = (qx * dir.y - qy * dir.x) / denom;
        if t >= 0.0 && (0.0..=1.0).contains(&u) && best_t.is_none_or(|best| t < best) {
            best_t = Some(t);
        }
    }
    best_t.map(|t| Point::new(origin.x + dir.x * t, origin.y + dir.y * t))
}

fn ray_ellipse_intersection(origin: Point, dir: Point, center: Point, rx: f64, ry: f64) -> Option<Point> {
    if rx <= 0.0 || ry <= 0.0 {
        return None;
    }
    let ox = origin.x - center.x;
    let oy = origin.y - center.y;
    let a = (dir.x * dir.x) / (rx * rx) + (dir.y * dir.y) / (ry * ry);
    let b = 2.0 * ((ox * dir.x) / (rx * rx) + (oy * dir.y) / (ry * ry));
    let c = (ox * ox) / (rx * rx) + (oy * oy) / (ry * ry) - 1.0;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 || a.abs() < 1e-12 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);
    let t = if t1 >= 0.0 {
        t1
    } else if t2 >= 0.0 {
        t2
    } else {
        return None;
    };
    Some(Point::new(origin.x + dir.x * t, origin.y + dir.y * t))
}

fn intersect(outline: &Outline, origin: Point, dir: Point) -> Option<Point> {
    match outline {
        Outline::Polygon(poly) => ray_polygon_intersection(origin, dir, poly),
        Outline::Ellipse { center, rx, ry } => ray_ellipse_intersection(origin, dir, *center, *rx, *ry),
    }
}

impl ShapeClipper for BoundaryClipper {
    fn clip(&self, points: &[Point], node: &PositionedNode, is_source_end: bool) -> Vec<Point> {
        let mut out = points.to_vec();
        if out.len() < 2 {
            return out;
        }
        let Some(shape) = outline(node) else {
            return out;
        };
        let (end_idx, near_idx) = if is_source_end {
            (0, 1)
        } else {
            (out.len() - 1, out.len() - 2)
        };
        let end = out[end_idx];
        let near = out[near_idx];
        let dir = Point::new(end.x - near.x, end.y - near.y);

        // Travel along the final leg into the node; fall back to a ray from the centre.
        let hit = if dir.x.abs() > 1e-9 || dir.y.abs() > 1e-9 {
            intersect(&shape, near, dir).filter(|hit| node.rect().contains(*hit))
        } else {
            None
        };
        let hit = hit.or_else(|| {
            let center = node.center();
            let outward = Point::new(end.x - center.x, end.y - center.y);
            if outward.x.abs() < 1e-9 && outward.y.abs() < 1e-9 {
                return None;
            }
            intersect(&shape, center, outward)
        });
        if let Some(hit) = hit {
            out[end_idx] = hit;
        }
        out
    }
}
