use crate::config::RoutingConfig;

use super::extract::EdgeSegments;
use super::geometry::{arc_midpoint, dedup_points, is_diagonal};
use super::types::{Point, PositionedGroup};

/// Joins an edge's segments in flow order: outgoing-internal, external,
/// incoming-internal. A segment's first point is dropped when it repeats
/// the previous segment's last point.
pub(super) fn join_segments(segments: &EdgeSegments) -> Vec<Point> {
    let mut points: Vec<Point> = Vec::new();
    let ordered = [&segments.outgoing, &segments.external, &segments.incoming];
    for segment in ordered.into_iter().flatten() {
        let mut rest = segment.points.as_slice();
        if let (Some(last), Some(first)) = (points.last(), rest.first()) {
            if last.approx_eq(*first) {
                rest = &rest[1..];
            }
        }
        points.extend_from_slice(rest);
    }
    points
}

/// The solver's inline label placement when the external segment carried
/// one, otherwise the arc-length midpoint.
pub(super) fn label_anchor(segments: &EdgeSegments, points: &[Point]) -> Option<Point> {
    segments
        .external
        .as_ref()
        .and_then(|segment| segment.label)
        .or_else(|| arc_midpoint(points))
}

/// Vertical lanes left and right of every group box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Margins {
    pub left: f64,
    pub right: f64,
}

impl Margins {
    pub fn around(groups: &[&PositionedGroup], gap: f64) -> Option<Self> {
        let mut iter = groups.iter();
        let first = iter.next()?;
        let mut left = first.x;
        let mut right = first.x + first.width;
        for group in iter {
            left = left.min(group.x);
            right = right.max(group.x + group.width);
        }
        Some(Self {
            left: left - gap,
            right: right + gap,
        })
    }
}

/// Inserts right-angle bends into diagonal segments. Repaired edges take the
/// left and right margin in turn; every second edge on a side moves one lane further out.
pub(super) struct OrthogonalRepair {
    margins: Option<Margins>,
    tolerance: f64,
    lane_spacing: f64,
    repaired: usize,
}

impl OrthogonalRepair {
    pub fn new(margins: Option<Margins>, routing: &RoutingConfig) -> Self {
        Self {
            margins,
            tolerance: routing.diagonal_tolerance,
            lane_spacing: routing.margin_spacing,
            repaired: 0,
        }
    }

    /// `None` when every segment is already horizontal or vertical.
    pub fn repair(&mut self, points: &[Point]) -> Option<Vec<Point>> {
        if !points
            .windows(2)
            .any(|pair| is_diagonal(pair[0], pair[1], self.tolerance))
        {
            return None;
        }

        let lane = self.margins.map(|margins| {
            let k = self.repaired;
            let offset = (k / 2) as f64 * self.lane_spacing;
            if k % 2 == 0 {
                margins.left - offset
            } else {
                margins.right + offset
            }
        });
        self.repaired += 1;

        let mut out: Vec<Point> = Vec::with_capacity(points.len() * 3);
        out.push(points[0]);
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if is_diagonal(a, b, self.tolerance) {
                match lane {
                    Some(x) => {
                        out.push(Point::new(x, a.y));
                        out.push(Point::new(x, b.y));
                    }
                    None => {
                        let mid_y = (a.y + b.y) / 2.0;
                        out.push(Point::new(a.x, mid_y));
                        out.push(Point::new(b.x, mid_y));
                    }
                }
            }
            out.push(b);
        }
        Some(dedup_points(out))
    }

    pub fn repaired_count(&self) -> usize {
        self.repaired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::extract::Segment;
    use crate::layout::geometry::is_orthogonal;

    fn seg(raw: &[(f64, f64)]) -> Option<Segment> {
        Some(Segment {
            points: raw.iter().map(|(x, y)| Point::new(*x, *y)).collect(),
            label: None,
        })
    }

    fn group(x: f64, width: f64) -> PositionedGroup {
        PositionedGroup {
            id: "g".to_string(),
            label: String::new(),
            x,
            y: 0.0,
            width,
            height: 50.0,
            children: Vec::new(),
        }
    }

    #[test]
    fn segments_join_in_order_without_duplicate_joints() {
        let segments = EdgeSegments {
            outgoing: seg(&[(0.0, 0.0), (0.0, 10.0)]),
            external: seg(&[(0.0, 10.0), (0.0, 30.0)]),
            incoming: seg(&[(0.0, 31.0), (0.0, 40.0)]),
        };
        let points = join_segments(&segments);
        assert_eq!(points.len(), 5);
        assert_eq!(points[1], Point::new(0.0, 10.0));
        assert_eq!(points[2], Point::new(0.0, 30.0));
    }

    #[test]
    fn label_anchor_prefers_solver_placement() {
        let mut segments = EdgeSegments {
            external: seg(&[(0.0, 0.0), (0.0, 100.0)]),
            ..Default::default()
        };
        let points = join_segments(&segments);
        assert_eq!(label_anchor(&segments, &points), Some(Point::new(0.0, 50.0)));
        if let Some(external) = segments.external.as_mut() {
            external.label = Some(Point::new(3.0, 4.0));
        }
        assert_eq!(label_anchor(&segments, &points), Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn orthogonal_paths_are_left_alone() {
        let mut repair = OrthogonalRepair::new(None, &RoutingConfig::default());
        let path = vec![Point::new(0.0, 0.0), Point::new(0.5, 20.0), Point::new(30.0, 20.0)];
        assert!(repair.repair(&path).is_none());
        assert_eq!(repair.repaired_count(), 0);
    }

    #[test]
    fn margin_lanes_alternate_and_spread() {
        let groups = [group(100.0, 200.0), group(50.0, 100.0)];
        let refs: Vec<&PositionedGroup> = groups.iter().collect();
        let margins = Margins::around(&refs, 20.0).unwrap();
        assert_eq!(margins, Margins { left: 30.0, right: 320.0 });

        let mut repair = OrthogonalRepair::new(Some(margins), &RoutingConfig::default());
        let diagonal = vec![Point::new(120.0, 10.0), Point::new(160.0, 90.0)];
        let first = repair.repair(&diagonal).unwrap();
        let second = repair.repair(&diagonal).unwrap();
        let third = repair.repair(&diagonal).unwrap();
        assert_eq!(first[1], Point::new(30.0, 10.0));
        assert_eq!(first[2], Point::new(30.0, 90.0));
        assert_eq!(second[1].x, 320.0);
        assert_eq!(third[1].x, 30.0 - 8.0);
        assert!(is_orthogonal(&first, 1.0));
    }

    #[test]
    fn zigzag_without_margins() {
        let mut repair = OrthogonalRepair::new(None, &RoutingConfig::default());
        let path = vec![Point::new(0.0, 0.0), Point::new(40.0, 60.0)];
        let fixed = repair.repair(&path).unwrap();
        assert_eq!(
            fixed,
            vec![
                Point::new(0.0, 0.0),
                Point::new(0.0, 30.0),
                Point::new(40.0, 30.0),
                Point::new(40.0, 60.0),
            ]
        );
    }
}
