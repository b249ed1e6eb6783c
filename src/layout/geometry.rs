use crate::ir::Direction;

use super::types::{Point, Rect};

pub(super) fn path_length(points: &[Point]) -> f64 {
    let mut length = 0.0;
    for segment in points.windows(2) {
        length += segment[0].distance(segment[1]);
    }
    length
}

/// Point at half the cumulative arc length, interpolated within the straddling segment.
pub(super) fn arc_midpoint(points: &[Point]) -> Option<Point> {
    let first = *points.first()?;
    let total = path_length(points);
    if total <= 0.0 {
        return Some(first);
    }
    let half = total / 2.0;
    let mut walked = 0.0;
    for segment in points.windows(2) {
        let len = segment[0].distance(segment[1]);
        if len > 0.0 && walked + len >= half {
            let t = (half - walked) / len;
            return Some(Point::new(
                segment[0].x + (segment[1].x - segment[0].x) * t,
                segment[0].y + (segment[1].y - segment[0].y) * t,
            ));
        }
        walked += len;
    }
    points.last().copied()
}

pub(super) fn is_diagonal(a: Point, b: Point, tolerance: f64) -> bool {
    (b.x - a.x).abs() > tolerance && (b.y - a.y).abs() > tolerance
}

#[cfg(test)]
pub(super) fn is_orthogonal(points: &[Point], tolerance: f64) -> bool {
    points
        .windows(2)
        .all(|segment| !is_diagonal(segment[0], segment[1], tolerance))
}

/// Coordinate of `point` along the flow axis of `direction`.
pub(super) fn flow_coord(point: Point, direction: Direction) -> f64 {
    if direction.is_horizontal() { point.x } else { point.y }
}

pub(super) fn cross_coord(point: Point, direction: Direction) -> f64 {
    if direction.is_horizontal() { point.y } else { point.x }
}

/// Builds a point from flow-axis and cross-axis coordinates.
pub(super) fn from_axes(flow: f64, cross: f64, direction: Direction) -> Point {
    if direction.is_horizontal() {
        Point::new(flow, cross)
    } else {
        Point::new(cross, flow)
    }
}

/// Signed unit of forward progress along the flow axis.
pub(super) fn flow_sign(direction: Direction) -> f64 {
    if direction.is_reversed() { -1.0 } else { 1.0 }
}

/// Midpoint of the side of `rect` that faces downstream.
pub(super) fn exit_point(rect: &Rect, direction: Direction) -> Point {
    let center = rect.center();
    match direction {
        Direction::TD | Direction::TB => Point::new(center.x, rect.bottom()),
        Direction::BT => Point::new(center.x, rect.y),
        Direction::LR => Point::new(rect.right(), center.y),
        Direction::RL => Point::new(rect.x, center.y),
    }
}

/// Midpoint of the side of `rect` that faces upstream.
pub(super) fn entry_point(rect: &Rect, direction: Direction) -> Point {
    let center = rect.center();
    match direction {
        Direction::TD | Direction::TB => Point::new(center.x, rect.y),
        Direction::BT => Point::new(center.x, rect.bottom()),
        Direction::LR => Point::new(rect.x, center.y),
        Direction::RL => Point::new(rect.right(), center.y),
    }
}

/// Flow-axis extent of `rect` as (upstream edge, downstream edge).
pub(super) fn flow_span(rect: &Rect, direction: Direction) -> (f64, f64) {
    match direction {
        Direction::TD | Direction::TB => (rect.y, rect.bottom()),
        Direction::BT => (rect.bottom(), rect.y),
        Direction::LR => (rect.x, rect.right()),
        Direction::RL => (rect.right(), rect.x),
    }
}

pub(super) fn translate_points(points: &mut [Point], dx: f64, dy: f64) {
    for point in points {
        point.x += dx;
        point.y += dy;
    }
}

/// Drops consecutive duplicates.
pub(super) fn dedup_points(points: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for point in points {
        if out.last().is_some_and(|last| last.approx_eq(point)) {
            continue;
        }
        out.push(point);
    }
    out
}

/// Final cleanup of a routed path: zero-length legs go, both ends stay.
pub(super) fn tidy_polyline(points: Vec<Point>) -> Vec<Point> {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return points;
    };
    let out = dedup_points(points);
    if out.len() >= 2 { out } else { vec![first, last] }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f64, f64)]) -> Vec<Point> {
        raw.iter().map(|(x, y)| Point::new(*x, *y)).collect()
    }

    #[test]
    fn arc_midpoint_interpolates_within_segment() {
        let path = pts(&[(0.0, 0.0), (0.0, 10.0), (30.0, 10.0)]);
        let mid = arc_midpoint(&path).unwrap();
        assert!(mid.approx_eq(Point::new(10.0, 10.0)));
        assert!(arc_midpoint(&[]).is_none());
    }

    #[test]
    fn diagonal_needs_both_deltas_above_tolerance() {
        assert!(!is_diagonal(Point::new(0.0, 0.0), Point::new(0.5, 40.0), 1.0));
        assert!(is_diagonal(Point::new(0.0, 0.0), Point::new(2.0, 40.0), 1.0));
        assert!(is_orthogonal(&pts(&[(0.0, 0.0), (0.0, 5.0), (9.0, 5.0)]), 1.0));
    }

    #[test]
    fn tidy_polyline_drops_zero_length_legs() {
        let path = pts(&[(0.0, 0.0), (0.0, 10.0), (0.0, 10.0), (20.0, 10.0)]);
        assert_eq!(tidy_polyline(path), pts(&[(0.0, 0.0), (0.0, 10.0), (20.0, 10.0)]));
        let collapsed = pts(&[(5.0, 5.0), (5.0, 5.0)]);
        assert_eq!(tidy_polyline(collapsed.clone()), collapsed);
    }

    #[test]
    fn sides_follow_direction() {
        let rect = Rect::new(10.0, 20.0, 40.0, 20.0);
        assert!(exit_point(&rect, Direction::TD).approx_eq(Point::new(30.0, 40.0)));
        assert!(entry_point(&rect, Direction::BT).approx_eq(Point::new(30.0, 40.0)));
        assert!(exit_point(&rect, Direction::RL).approx_eq(Point::new(10.0, 30.0)));
        assert_eq!(flow_span(&rect, Direction::LR), (10.0, 50.0));
    }
}
