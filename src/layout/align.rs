use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::ir::Direction;

use super::geometry::{cross_coord, flow_coord};
use super::types::{Point, PositionedEdge, PositionedNode};

const STRAIGHT_EPSILON: f64 = 1e-6;

/// Nodes snapped onto one shared flow-axis coordinate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedCluster {
    pub nodes: Vec<String>,
    pub coordinate: f64,
}

#[derive(Debug, Clone, Default)]
pub(super) struct Alignment {
    /// Signed flow-axis shift per moved node.
    pub shifts: HashMap<String, f64>,
    pub clusters: Vec<AlignedCluster>,
}

fn flow_center(node: &PositionedNode, direction: Direction) -> f64 {
    flow_coord(node.center(), direction)
}

/// Single-linkage clustering over flow-axis centres. A node joins the running
/// cluster when it sits within `threshold` of the node before it and has no
/// edge to any member.
pub(super) fn plan_alignment(
    nodes: &[PositionedNode],
    edges: &[PositionedEdge],
    direction: Direction,
    threshold: f64,
) -> Alignment {
    let mut connected: HashSet<(&str, &str)> = HashSet::new();
    for edge in edges {
        connected.insert((edge.source.as_str(), edge.target.as_str()));
        connected.insert((edge.target.as_str(), edge.source.as_str()));
    }

    let mut order: Vec<&PositionedNode> = nodes.iter().collect();
    order.sort_by(|a, b| flow_center(a, direction).total_cmp(&flow_center(b, direction)));

    let mut clusters: Vec<Vec<&PositionedNode>> = Vec::new();
    let mut previous: Option<f64> = None;
    for node in order {
        let coord = flow_center(node, direction);
        let joins = match (previous, clusters.last()) {
            (Some(prev), Some(cluster)) => {
                coord - prev <= threshold
                    && !cluster
                        .iter()
                        .any(|member| connected.contains(&(member.id.as_str(), node.id.as_str())))
            }
            _ => false,
        };
        if joins {
            if let Some(cluster) = clusters.last_mut() {
                cluster.push(node);
            }
        } else {
            clusters.push(vec![node]);
        }
        previous = Some(coord);
    }

    let mut alignment = Alignment::default();
    for cluster in clusters.into_iter().filter(|c| c.len() > 1) {
        let coords: Vec<f64> = cluster.iter().map(|n| flow_center(n, direction)).collect();
        let min = coords.iter().copied().fold(f64::INFINITY, f64::min);
        let max = coords.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let target = (min + max) / 2.0;
        for (node, coord) in cluster.iter().zip(coords) {
            let shift = target - coord;
            if shift != 0.0 {
                alignment.shifts.insert(node.id.clone(), shift);
            }
        }
        alignment.clusters.push(AlignedCluster {
            nodes: cluster.iter().map(|n| n.id.clone()).collect(),
            coordinate: target,
        });
    }
    alignment
}

pub(super) fn shift_node(node: &PositionedNode, shift: f64, direction: Direction) -> PositionedNode {
    let mut moved = node.clone();
    if direction.is_horizontal() {
        moved.x += shift;
    } else {
        moved.y += shift;
    }
    moved
}

/// Moves the endpoints of a shifted edge. The neighbouring interior point
/// moves with its endpoint when both shared the cross-axis coordinate.
pub(super) fn shift_edge_points(
    points: &[Point],
    source_shift: f64,
    target_shift: f64,
    direction: Direction,
) -> Vec<Point> {
    let mut out = points.to_vec();
    let len = out.len();
    if len < 2 {
        return out;
    }
    let delta = |shift: f64| -> (f64, f64) {
        if direction.is_horizontal() {
            (shift, 0.0)
        } else {
            (0.0, shift)
        }
    };

    if source_shift != 0.0 {
        let (dx, dy) = delta(source_shift);
        if len > 2 && straight_run(points[0], points[1], direction) {
            out[1] = points[1].offset(dx, dy);
        }
        out[0] = points[0].offset(dx, dy);
    }
    if target_shift != 0.0 {
        let (dx, dy) = delta(target_shift);
        let last = len - 1;
        if len > 2 && straight_run(points[last], points[last - 1], direction) {
            out[last - 1] = out[last - 1].offset(dx, dy);
        }
        out[last] = points[last].offset(dx, dy);
    }
    out
}

fn straight_run(endpoint: Point, neighbour: Point, direction: Direction) -> bool {
    (cross_coord(endpoint, direction) - cross_coord(neighbour, direction)).abs() < STRAIGHT_EPSILON
}
