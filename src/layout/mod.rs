mod align;
mod assemble;
mod bundle;
mod clip;
mod extract;
mod geometry;
mod layered;
mod ranking;
mod sizing;
pub mod solver;
mod translate;
pub(crate) mod types;

pub use align::AlignedCluster;
pub use bundle::{BundleKind, EdgeBundle};
pub use clip::{BoundaryClipper, ShapeClipper};
pub use layered::LayeredSolver;
pub use solver::LayoutSolver;
pub use types::*;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::config::LayoutConfig;
use crate::error::LayoutError;
use crate::ir::Graph;
use crate::text_metrics::{HeuristicTextMetrics, TextMetrics, TextSize};

use assemble::{Margins, OrthogonalRepair, join_segments, label_anchor};
use geometry::arc_midpoint;

/// How cross-group edges reach the solver. Chosen once per call for the whole graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HierarchyMode {
    /// Each group is laid out on its own; cross-group edges are split at boundary ports.
    Separate,
    /// One nesting-aware pass; cross-group edges connect the real nodes.
    IncludeChildren,
}

impl HierarchyMode {
    pub fn for_graph(graph: &Graph) -> Self {
        if graph.has_direction_overrides() {
            Self::Separate
        } else {
            Self::IncludeChildren
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SegmentRole {
    OutgoingInternal,
    External,
    IncomingInternal,
}

/// Segment roles one original edge was assembled from, in path order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeTrace {
    pub index: usize,
    pub roles: Vec<SegmentRole>,
}

/// What the post-passes did during one layout call. Edge numbers are indices
/// into the input graph's edge list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutTrace {
    pub mode: HierarchyMode,
    pub edge_segments: Vec<EdgeTrace>,
    pub repaired: Vec<usize>,
    pub bundles: Vec<EdgeBundle>,
    pub aligned: Vec<AlignedCluster>,
    pub dropped: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOutcome {
    pub graph: PositionedGraph,
    pub trace: LayoutTrace,
}

static DEFAULT_SOLVER: LayeredSolver = LayeredSolver::new();

/// Collaborators a layout call delegates to.
#[derive(Clone, Copy)]
pub struct LayoutContext<'a> {
    pub solver: &'a dyn LayoutSolver,
    pub metrics: &'a dyn TextMetrics,
    pub clipper: &'a dyn ShapeClipper,
}

impl Default for LayoutContext<'static> {
    fn default() -> Self {
        Self {
            solver: &DEFAULT_SOLVER,
            metrics: &HeuristicTextMetrics,
            clipper: &BoundaryClipper,
        }
    }
}

pub fn compute_layout(graph: &Graph, config: &LayoutConfig) -> Result<PositionedGraph, LayoutError> {
    compute_layout_with(graph, config, &LayoutContext::default()).map(|outcome| outcome.graph)
}

pub fn compute_layout_with(
    graph: &Graph,
    config: &LayoutConfig,
    ctx: &LayoutContext<'_>,
) -> Result<LayoutOutcome, LayoutError> {
    let mode = HierarchyMode::for_graph(graph);
    debug!(?mode, nodes = graph.nodes.len(), edges = graph.edges.len(), "layout started");

    let translation = translate::translate(graph, config, ctx.metrics, mode);
    let solved = ctx.solver.solve(&translation.root)?;
    let extraction = extract::extract(
        &solved,
        graph,
        &translation.group_ids,
        &translation.port_ids,
    );

    let mut nodes = extraction.nodes;
    let mut groups = extraction.groups;
    let node_index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.id.as_str(), idx))
        .collect();

    let mut dropped = translation.dropped.clone();
    let dropped_set: HashSet<usize> = dropped.iter().copied().collect();
    let mut repair = OrthogonalRepair::new(
        Margins::around(&flatten_groups(&groups), config.routing.margin_gap),
        &config.routing,
    );

    // Assembly and orthogonal repair.
    let mut edges: Vec<PositionedEdge> = Vec::with_capacity(graph.edges.len());
    let mut origins: Vec<usize> = Vec::with_capacity(graph.edges.len());
    let mut label_sizes: Vec<Option<TextSize>> = Vec::with_capacity(graph.edges.len());
    let mut edge_segments = Vec::with_capacity(graph.edges.len());
    let mut repaired = Vec::new();
    for (index, edge) in graph.edges.iter().enumerate() {
        if dropped_set.contains(&index) {
            continue;
        }
        let (Some(&source), Some(&target)) = (
            node_index.get(edge.source.as_str()),
            node_index.get(edge.target.as_str()),
        ) else {
            dropped.push(index);
            continue;
        };
        let segments = extraction.segments.get(&index).cloned().unwrap_or_default();
        let mut points = join_segments(&segments);
        if points.len() < 2 {
            points = vec![nodes[source].center(), nodes[target].center()];
        }
        let labeled = edge.label.is_some();
        let mut label_position = if labeled {
            label_anchor(&segments, &points)
        } else {
            None
        };
        if let Some(fixed) = repair.repair(&points) {
            points = fixed;
            if labeled {
                label_position = arc_midpoint(&points);
            }
            repaired.push(index);
        }

        edge_segments.push(EdgeTrace {
            index,
            roles: segments.roles(),
        });
        label_sizes.push(
            edge.label
                .as_deref()
                .map(|text| sizing::edge_label_size(text, config, ctx.metrics)),
        );
        origins.push(index);
        edges.push(PositionedEdge {
            source: edge.source.clone(),
            target: edge.target.clone(),
            label: edge.label.clone(),
            style: edge.style,
            has_arrow_start: edge.has_arrow_start,
            has_arrow_end: edge.has_arrow_end,
            points,
            label_position,
        });
    }
    debug!(repaired = repair.repaired_count(), "assembled edges");

    // Same-layer alignment.
    let mut aligned = Vec::new();
    if config.alignment.enabled {
        let alignment = align::plan_alignment(
            &nodes,
            &edges,
            graph.direction,
            config.alignment_threshold(),
        );
        if !alignment.shifts.is_empty() {
            nodes = nodes
                .iter()
                .map(|node| match alignment.shifts.get(&node.id) {
                    Some(shift) => align::shift_node(node, *shift, graph.direction),
                    None => node.clone(),
                })
                .collect();
            edges = edges
                .into_iter()
                .map(|edge| {
                    let source_shift = alignment.shifts.get(&edge.source).copied().unwrap_or(0.0);
                    let target_shift = alignment.shifts.get(&edge.target).copied().unwrap_or(0.0);
                    if source_shift == 0.0 && target_shift == 0.0 {
                        return edge;
                    }
                    let points = align::shift_edge_points(
                        &edge.points,
                        source_shift,
                        target_shift,
                        graph.direction,
                    );
                    let label_position = if edge.label.is_some() && points != edge.points {
                        arc_midpoint(&points)
                    } else {
                        edge.label_position
                    };
                    PositionedEdge {
                        points,
                        label_position,
                        ..edge
                    }
                })
                .collect();
            let moved: HashSet<&str> = alignment.shifts.keys().map(String::as_str).collect();
            refit_groups(&mut groups, graph, &nodes, &moved, config, ctx.metrics);
        }
        debug!(clusters = alignment.clusters.len(), "aligned layers");
        aligned = alignment.clusters;
    }

    // Fan-out / fan-in bundling.
    let flat_groups = flatten_groups(&groups);
    let mut bundles = Vec::new();
    if config.bundling.enabled {
        let bundling = bundle::bundle_edges(
            &edges,
            &nodes,
            &flat_groups,
            graph.direction,
            config.bundling.boundary_gap,
        );
        edges = bundling.edges;
        bundles = bundling
            .bundles
            .into_iter()
            .map(|bundle| EdgeBundle {
                edges: bundle.edges.iter().map(|idx| origins[*idx]).collect(),
                ..bundle
            })
            .collect();
        debug!(bundles = bundles.len(), "bundled edges");
    }

    // Shape clipping runs last; earlier passes work on box-relative endpoints.
    let node_index: HashMap<&str, &PositionedNode> =
        nodes.iter().map(|node| (node.id.as_str(), node)).collect();
    let edges: Vec<PositionedEdge> = edges
        .into_iter()
        .map(|edge| {
            let mut points = edge.points.clone();
            if let Some(node) = node_index.get(edge.source.as_str()) {
                points = ctx.clipper.clip(&points, node, true);
            }
            if let Some(node) = node_index.get(edge.target.as_str()) {
                points = ctx.clipper.clip(&points, node, false);
            }
            let points = geometry::tidy_polyline(points);
            PositionedEdge { points, ..edge }
        })
        .collect();

    let positioned = PositionedGraph {
        width: extraction.width,
        height: extraction.height,
        nodes,
        edges,
        groups,
    };
    let positioned = normalize(positioned, &label_sizes, config.padding);
    let positioned = expand_bounds(positioned, &label_sizes, config);

    dropped.sort_unstable();
    Ok(LayoutOutcome {
        graph: positioned,
        trace: LayoutTrace {
            mode,
            edge_segments,
            repaired,
            bundles,
            aligned,
            dropped,
        },
    })
}

/// Grows the boxes of groups whose members alignment moved, innermost first.
/// Boxes never shrink.
fn refit_groups(
    groups: &mut [PositionedGroup],
    graph: &Graph,
    nodes: &[PositionedNode],
    moved: &HashSet<&str>,
    config: &LayoutConfig,
    metrics: &dyn TextMetrics,
) {
    let arena = translate::GroupArena::build(graph);
    let mut members: HashMap<&str, Vec<&PositionedNode>> = HashMap::new();
    for node in nodes {
        if let Some(idx) = arena.group_of(&node.id) {
            members
                .entry(arena.records[idx].subgraph.id.as_str())
                .or_default()
                .push(node);
        }
    }
    for group in groups.iter_mut() {
        refit_group(group, &members, moved, config, metrics);
    }
}

fn refit_group(
    group: &mut PositionedGroup,
    members: &HashMap<&str, Vec<&PositionedNode>>,
    moved: &HashSet<&str>,
    config: &LayoutConfig,
    metrics: &dyn TextMetrics,
) -> bool {
    let mut affected = false;
    for child in &mut group.children {
        affected |= refit_group(child, members, moved, config, metrics);
    }
    let direct = members
        .get(group.id.as_str())
        .map(Vec::as_slice)
        .unwrap_or_default();
    affected |= direct.iter().any(|node| moved.contains(node.id.as_str()));
    if !affected {
        return false;
    }

    let pad = config.group.padding;
    let header = sizing::group_header_size(&group.label, config, metrics);
    let top_inset = if header.height > 0.0 {
        pad + header.height + config.group.header_gap
    } else {
        pad
    };
    let mut left = group.x;
    let mut top = group.y;
    let mut right = group.x + group.width;
    let mut bottom = group.y + group.height;
    let member_boxes = direct.iter().map(|node| node.rect());
    let child_boxes = group.children.iter().map(PositionedGroup::rect);
    for rect in member_boxes.chain(child_boxes) {
        left = left.min(rect.x - pad);
        top = top.min(rect.y - top_inset);
        right = right.max(rect.right() + pad);
        bottom = bottom.max(rect.bottom() + pad);
    }
    group.x = left;
    group.y = top;
    group.width = right - left;
    group.height = bottom - top;
    true
}

fn translate_groups(groups: &mut [PositionedGroup], dx: f64, dy: f64) {
    let mut stack: Vec<&mut PositionedGroup> = groups.iter_mut().collect();
    while let Some(group) = stack.pop() {
        group.x += dx;
        group.y += dy;
        stack.extend(group.children.iter_mut());
    }
}

/// Shifts everything right/down when margin routing or bundling pushed
/// content past the outer padding.
fn normalize(mut graph: PositionedGraph, label_sizes: &[Option<TextSize>], padding: f64) -> PositionedGraph {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    for node in &graph.nodes {
        min_x = min_x.min(node.x);
        min_y = min_y.min(node.y);
    }
    for group in flatten_groups(&graph.groups) {
        min_x = min_x.min(group.x);
        min_y = min_y.min(group.y);
    }
    for (edge, label) in graph.edges.iter().zip(label_sizes) {
        for point in &edge.points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
        }
        if let (Some(anchor), Some(size)) = (edge.label_position, label) {
            min_x = min_x.min(anchor.x - size.width / 2.0);
            min_y = min_y.min(anchor.y - size.height / 2.0);
        }
    }

    let shift_x = if min_x.is_finite() && min_x < padding { padding - min_x } else { 0.0 };
    let shift_y = if min_y.is_finite() && min_y < padding { padding - min_y } else { 0.0 };
    if shift_x == 0.0 && shift_y == 0.0 {
        return graph;
    }

    for node in &mut graph.nodes {
        node.x += shift_x;
        node.y += shift_y;
    }
    translate_groups(&mut graph.groups, shift_x, shift_y);
    for edge in &mut graph.edges {
        geometry::translate_points(&mut edge.points, shift_x, shift_y);
        if let Some(anchor) = edge.label_position.as_mut() {
            *anchor = anchor.offset(shift_x, shift_y);
        }
    }
    graph.width += shift_x;
    graph.height += shift_y;
    graph
}

/// Grows (never shrinks) the canvas to hold every node, group, edge point
/// plus arrowhead, and label box, each with the outer padding.
fn expand_bounds(mut graph: PositionedGraph, label_sizes: &[Option<TextSize>], config: &LayoutConfig) -> PositionedGraph {
    let padding = config.padding;
    let arrow = config.routing.arrowhead_margin;
    let mut max_x = graph.width;
    let mut max_y = graph.height;
    for node in &graph.nodes {
        max_x = max_x.max(node.x + node.width + padding);
        max_y = max_y.max(node.y + node.height + padding);
    }
    for group in flatten_groups(&graph.groups) {
        max_x = max_x.max(group.x + group.width + padding);
        max_y = max_y.max(group.y + group.height + padding);
    }
    for (edge, label) in graph.edges.iter().zip(label_sizes) {
        for point in &edge.points {
            max_x = max_x.max(point.x + arrow + padding);
            max_y = max_y.max(point.y + arrow + padding);
        }
        if let Some(anchor) = edge.label_position {
            let size = label.unwrap_or_default();
            max_x = max_x.max(anchor.x + size.width / 2.0 + padding);
            max_y = max_y.max(anchor.y + size.height / 2.0 + padding);
        }
    }
    graph.width = max_x;
    graph.height = max_y;
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Direction, NodeShape, Subgraph};

    #[test]
    fn mode_follows_direction_overrides() {
        let mut graph = Graph::new();
        let mut group = Subgraph::new("G", "G");
        graph.subgraphs.push(group.clone());
        assert_eq!(HierarchyMode::for_graph(&graph), HierarchyMode::IncludeChildren);
        group.direction = Some(Direction::LR);
        graph.subgraphs = vec![group];
        assert_eq!(HierarchyMode::for_graph(&graph), HierarchyMode::Separate);
    }

    #[test]
    fn normalize_only_shifts_content_past_the_padding() {
        let node = PositionedNode {
            id: "A".to_string(),
            label: "A".to_string(),
            shape: NodeShape::Rectangle,
            x: 10.0,
            y: 50.0,
            width: 20.0,
            height: 20.0,
            inline_style: None,
        };
        let graph = PositionedGraph {
            width: 100.0,
            height: 100.0,
            nodes: vec![node],
            edges: Vec::new(),
            groups: Vec::new(),
        };
        let shifted = normalize(graph, &[], 40.0);
        assert_eq!(shifted.nodes[0].x, 40.0);
        assert_eq!(shifted.nodes[0].y, 50.0);
        assert_eq!(shifted.width, 130.0);
    }

    #[test]
    fn empty_graph_has_padding_only_canvas() {
        let graph = Graph::new();
        let positioned = compute_layout(&graph, &LayoutConfig::default()).unwrap();
        assert!(positioned.nodes.is_empty());
        assert_eq!(positioned.width, 80.0);
        assert_eq!(positioned.height, 80.0);
    }

    #[test]
    fn self_loops_keep_their_own_path() {
        let mut graph = Graph::new();
        graph.add_edge("A", "A");
        let positioned = compute_layout(&graph, &LayoutConfig::default()).unwrap();
        assert_eq!(positioned.edges.len(), 1);
        assert_eq!(positioned.edges[0].points.len(), 5);
    }

    fn rect_node(id: &str, x: f64, y: f64) -> PositionedNode {
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

    #[test]
    fn moved_members_grow_their_groups() {
        let mut graph = Graph::new();
        graph.ensure_node("A", None, None);
        graph.ensure_node("B", None, None);
        let mut outer = Subgraph::new("outer", "");
        let mut inner = Subgraph::new("inner", "");
        inner.node_ids.push("A".to_string());
        outer.children.push(inner);
        outer.node_ids.push("B".to_string());
        graph.subgraphs.push(outer);

        let inner_box = PositionedGroup {
            id: "inner".to_string(),
            label: String::new(),
            x: 84.0,
            y: 84.0,
            width: 72.0,
            height: 52.0,
            children: Vec::new(),
        };
        let mut groups = vec![PositionedGroup {
            id: "outer".to_string(),
            label: String::new(),
            x: 50.0,
            y: 50.0,
            width: 200.0,
            height: 200.0,
            children: vec![inner_box],
        }];
        // A was at (100, 100) and alignment pushed it 60 down, past both boxes.
        let nodes = vec![rect_node("A", 100.0, 260.0), rect_node("B", 180.0, 100.0)];
        let moved = HashSet::from(["A"]);
        let config = LayoutConfig::default();
        refit_groups(&mut groups, &graph, &nodes, &moved, &config, &HeuristicTextMetrics);

        let pad = config.group.padding;
        let inner = &groups[0].children[0];
        assert_eq!(inner.x, 84.0);
        assert_eq!(inner.y, 84.0);
        assert_eq!(inner.y + inner.height, 280.0 + pad);
        let outer = &groups[0];
        assert_eq!(outer.x, 50.0);
        assert_eq!(outer.y, 50.0);
        assert_eq!(outer.y + outer.height, inner.y + inner.height + pad);
        assert_eq!(outer.width, 200.0);
    }

    #[test]
    fn untouched_groups_keep_their_boxes() {
        let mut graph = Graph::new();
        graph.ensure_node("A", None, None);
        let mut group = Subgraph::new("G", "");
        group.node_ids.push("A".to_string());
        graph.subgraphs.push(group);
        let original = PositionedGroup {
            id: "G".to_string(),
            label: String::new(),
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            children: Vec::new(),
        };
        let mut groups = vec![original.clone()];
        let nodes = vec![rect_node("A", 100.0, 100.0)];
        let config = LayoutConfig::default();
        refit_groups(&mut groups, &graph, &nodes, &HashSet::new(), &config, &HeuristicTextMetrics);
        assert_eq!(groups[0], original);
    }
}
