use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;

use crate::ir::Direction;

use super::geometry::{cross_coord, entry_point, exit_point, flow_coord, flow_sign, flow_span, from_axes};
use super::types::{Point, PositionedEdge, PositionedGroup, PositionedNode, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BundleKind {
    FanOut,
    FanIn,
}

/// Edges drawn with one shared trunk at `node`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeBundle {
    pub kind: BundleKind,
    pub node: String,
    pub edges: Vec<usize>,
}

pub(super) struct Bundling {
    pub edges: Vec<PositionedEdge>,
    pub bundles: Vec<EdgeBundle>,
}

struct Context<'a> {
    nodes: HashMap<&'a str, &'a PositionedNode>,
    groups: &'a [&'a PositionedGroup],
    direction: Direction,
    boundary_gap: f64,
}

impl Context<'_> {
    fn rect(&self, id: &str) -> Option<Rect> {
        self.nodes.get(id).map(|node| node.rect())
    }

    /// Target strictly downstream of source along the flow.
    fn is_forward(&self, source: &Rect, target: &Rect) -> bool {
        let (_, source_down) = flow_span(source, self.direction);
        let (target_up, _) = flow_span(target, self.direction);
        flow_sign(self.direction) * (target_up - source_down) > 0.0
    }

    /// Moves a junction out of the outermost group box that contains it but
    /// not `anchor`, onto the box side facing `anchor`.
    fn adjust_junction(&self, junction: f64, cross: f64, anchor: &Rect, upstream: bool) -> f64 {
        let junction_point = from_axes(junction, cross, self.direction);
        let outermost = self
            .groups
            .iter()
            .filter(|group| {
                let rect = group.rect();
                rect.contains(junction_point) && !rect.contains_rect(anchor)
            })
            .max_by(|a, b| a.rect().area().total_cmp(&b.rect().area()));
        let Some(group) = outermost else {
            return junction;
        };
        let (up, down) = flow_span(&group.rect(), self.direction);
        let sign = flow_sign(self.direction);
        if upstream {
            up - sign * self.boundary_gap
        } else {
            down + sign * self.boundary_gap
        }
    }
}

fn qualifies(edges: &[PositionedEdge], members: &[usize]) -> bool {
    if members.len() < 2 {
        return false;
    }
    let style = edges[members[0]].style;
    members
        .iter()
        .all(|idx| edges[*idx].style == style && edges[*idx].label.is_none())
}

fn trunk_path(from: Point, junction: f64, to: Point, direction: Direction) -> Vec<Point> {
    vec![
        from,
        from_axes(junction, cross_coord(from, direction), direction),
        from_axes(junction, cross_coord(to, direction), direction),
        to,
    ]
}

/// Fan-out bundling by shared source, then fan-in by shared target over the
/// edges fan-out left alone. A group bundles only when every member has the
/// same style and no label, and at least two members run forward.
pub(super) fn bundle_edges(
    edges: &[PositionedEdge],
    nodes: &[PositionedNode],
    groups: &[&PositionedGroup],
    direction: Direction,
    boundary_gap: f64,
) -> Bundling {
    let ctx = Context {
        nodes: nodes.iter().map(|node| (node.id.as_str(), node)).collect(),
        groups,
        direction,
        boundary_gap,
    };
    let mut out: Vec<PositionedEdge> = edges.to_vec();
    let mut bundles = Vec::new();
    let mut touched: HashSet<usize> = HashSet::new();

    let mut by_source: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (idx, edge) in edges.iter().enumerate() {
        if edge.source != edge.target {
            by_source.entry(edge.source.as_str()).or_default().push(idx);
        }
    }
    for (source_id, members) in &by_source {
        if !qualifies(edges, members) {
            continue;
        }
        let Some(source) = ctx.rect(source_id) else {
            continue;
        };
        let forward: Vec<(usize, Rect)> = members
            .iter()
            .filter_map(|idx| ctx.rect(&edges[*idx].target).map(|rect| (*idx, rect)))
            .filter(|(_, target)| ctx.is_forward(&source, target))
            .collect();
        if forward.len() < 2 {
            continue;
        }
        let exit = exit_point(&source, direction);
        let exit_flow = flow_coord(exit, direction);
        let sign = flow_sign(direction);
        let nearest = forward
            .iter()
            .map(|(_, target)| flow_coord(entry_point(target, direction), direction))
            .min_by(|a, b| (sign * (a - exit_flow)).total_cmp(&(sign * (b - exit_flow))))
            .unwrap_or(exit_flow);
        let junction = ctx.adjust_junction(
            (exit_flow + nearest) / 2.0,
            cross_coord(exit, direction),
            &source,
            true,
        );
        for (idx, target) in &forward {
            out[*idx].points = trunk_path(exit, junction, entry_point(target, direction), direction);
            touched.insert(*idx);
        }
        bundles.push(EdgeBundle {
            kind: BundleKind::FanOut,
            node: source_id.to_string(),
            edges: forward.iter().map(|(idx, _)| *idx).collect(),
        });
    }

    let mut by_target: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (idx, edge) in edges.iter().enumerate() {
        if edge.source != edge.target && !touched.contains(&idx) {
            by_target.entry(edge.target.as_str()).or_default().push(idx);
        }
    }
    for (target_id, members) in &by_target {
        if !qualifies(edges, members) {
            continue;
        }
        let Some(target) = ctx.rect(target_id) else {
            continue;
        };
        let forward: Vec<(usize, Rect)> = members
            .iter()
            .filter_map(|idx| ctx.rect(&edges[*idx].source).map(|rect| (*idx, rect)))
            .filter(|(_, source)| ctx.is_forward(source, &target))
            .collect();
        if forward.len() < 2 {
            continue;
        }
        let entry = entry_point(&target, direction);
        let entry_flow = flow_coord(entry, direction);
        let sign = flow_sign(direction);
        let nearest = forward
            .iter()
            .map(|(_, source)| flow_coord(exit_point(source, direction), direction))
            .min_by(|a, b| (sign * (entry_flow - a)).total_cmp(&(sign * (entry_flow - b))))
            .unwrap_or(entry_flow);
        let junction = ctx.adjust_junction(
            (entry_flow + nearest) / 2.0,
            cross_coord(entry, direction),
            &target,
            false,
        );
        for (idx, source) in &forward {
            out[*idx].points = trunk_path(exit_point(source, direction), junction, entry, direction);
        }
        bundles.push(EdgeBundle {
            kind: BundleKind::FanIn,
            node: target_id.to_string(),
            edges: forward.iter().map(|(idx, _)| *idx).collect(),
        });
    }

    Bundling {
        edges: out,
        bundles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{EdgeStyle, NodeShape};

    fn node(id: &str, x: f64, y: f64) -> PositionedNode {
        PositionedNode {
            id: id.to_string(),
            label: id.to_string(),
            shape: NodeShape::Rectangle,
            x,
            y,
            width: 40.0,
            height: 20.0,
            inline_style: None,
        }
    }

    fn edge(source: &str, target: &str) -> PositionedEdge {
        PositionedEdge {
            source: source.to_string(),
            target: target.to_string(),
            label: None,
            style: EdgeStyle::Solid,
            has_arrow_start: false,
            has_arrow_end: true,
            points: vec![Point::new(0.0, 0.0), Point::new(0.0, 1.0)],
            label_position: None,
        }
    }

    fn fan_out_nodes() -> Vec<PositionedNode> {
        vec![node("A", 50.0, 0.0), node("B", 0.0, 100.0), node("C", 100.0, 100.0)]
    }

    #[test]
    fn fan_out_shares_the_trunk() {
        let nodes = fan_out_nodes();
        let edges = vec![edge("A", "B"), edge("A", "C")];
        let result = bundle_edges(&edges, &nodes, &[], Direction::TD, 10.0);
        assert_eq!(result.bundles.len(), 1);
        assert_eq!(result.bundles[0].kind, BundleKind::FanOut);
        let b = &result.edges[0].points;
        let c = &result.edges[1].points;
        assert_eq!(b[0], Point::new(70.0, 20.0));
        assert_eq!(b[0], c[0]);
        assert_eq!(b[1], c[1]);
        assert_eq!(b[1], Point::new(70.0, 60.0));
        assert_eq!(b[3], Point::new(20.0, 100.0));
        assert_eq!(c[3], Point::new(120.0, 100.0));
    }

    #[test]
    fn one_labeled_or_restyled_edge_disables_the_group() {
        let nodes = fan_out_nodes();
        let mut labeled = vec![edge("A", "B"), edge("A", "C")];
        labeled[1].label = Some("yes".to_string());
        assert!(bundle_edges(&labeled, &nodes, &[], Direction::TD, 10.0).bundles.is_empty());

        let mut styled = vec![edge("A", "B"), edge("A", "C")];
        styled[0].style = EdgeStyle::Dotted;
        let result = bundle_edges(&styled, &nodes, &[], Direction::TD, 10.0);
        assert!(result.bundles.is_empty());
        assert_eq!(result.edges, styled);
    }

    #[test]
    fn fan_in_mirrors_fan_out() {
        let nodes = vec![node("A", 0.0, 0.0), node("B", 100.0, 0.0), node("C", 50.0, 100.0)];
        let edges = vec![edge("A", "C"), edge("B", "C")];
        let result = bundle_edges(&edges, &nodes, &[], Direction::TD, 10.0);
        assert_eq!(result.bundles[0].kind, BundleKind::FanIn);
        let a = &result.edges[0].points;
        let b = &result.edges[1].points;
        assert_eq!(a[2], b[2]);
        assert_eq!(a[3], b[3]);
        assert_eq!(a[3], Point::new(70.0, 100.0));
        assert_eq!(a[2], Point::new(70.0, 60.0));
    }

    #[test]
    fn junction_leaves_foreign_group_boxes() {
        let nodes = fan_out_nodes();
        let edges = vec![edge("A", "B"), edge("A", "C")];
        let group = PositionedGroup {
            id: "G".to_string(),
            label: String::new(),
            x: -10.0,
            y: 50.0,
            width: 170.0,
            height: 80.0,
            children: Vec::new(),
        };
        let result = bundle_edges(&edges, &nodes, &[&group], Direction::TD, 10.0);
        assert_eq!(result.edges[0].points[1], Point::new(70.0, 40.0));
    }

    #[test]
    fn backward_targets_are_not_bundled() {
        let nodes = vec![node("A", 50.0, 100.0), node("B", 0.0, 0.0), node("C", 100.0, 200.0)];
        let edges = vec![edge("A", "B"), edge("A", "C")];
        assert!(bundle_edges(&edges, &nodes, &[], Direction::TD, 10.0).bundles.is_empty());
    }
}
