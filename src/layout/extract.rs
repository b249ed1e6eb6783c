use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::trace;

use crate::ir::{Graph, Subgraph};

use super::SegmentRole;
use super::geometry::translate_points;
use super::solver::SolvedNode;
use super::types::{Point, PositionedGroup, PositionedNode};

/// One solver-level edge, in absolute coordinates.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Segment {
    pub points: Vec<Point>,
    pub label: Option<Point>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct EdgeSegments {
    pub outgoing: Option<Segment>,
    pub external: Option<Segment>,
    pub incoming: Option<Segment>,
}

impl EdgeSegments {
    pub fn roles(&self) -> Vec<SegmentRole> {
        let mut roles = Vec::with_capacity(3);
        if self.outgoing.is_some() {
            roles.push(SegmentRole::OutgoingInternal);
        }
        if self.external.is_some() {
            roles.push(SegmentRole::External);
        }
        if self.incoming.is_some() {
            roles.push(SegmentRole::IncomingInternal);
        }
        roles
    }
}

pub(super) struct Extraction {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<PositionedNode>,
    pub groups: Vec<PositionedGroup>,
    /// Keyed by the original edge index.
    pub segments: BTreeMap<usize, EdgeSegments>,
}

/// Splits a solver edge id into the original edge index and its role.
/// Internal sub-edges are told apart by which end names a synthetic port.
pub(super) fn parse_edge_id(
    id: &str,
    source: &str,
    port_ids: &HashSet<String>,
) -> Option<(usize, SegmentRole)> {
    let body = id.strip_prefix('e')?;
    if let Some(rest) = body.strip_suffix("_internal") {
        let (index, _) = rest.split_once('_')?;
        let role = if port_ids.contains(source) {
            SegmentRole::IncomingInternal
        } else {
            SegmentRole::OutgoingInternal
        };
        return index.parse().ok().map(|index| (index, role));
    }
    body.parse().ok().map(|index| (index, SegmentRole::External))
}

struct GroupSlot {
    group: PositionedGroup,
    children: Vec<usize>,
}

/// Flattens the solver's tree into absolute nodes, a nested group forest and
/// per-edge segments. Children whose ids name neither a group nor a node are skipped.
pub(super) fn extract(
    solved: &SolvedNode,
    graph: &Graph,
    group_ids: &HashSet<String>,
    port_ids: &HashSet<String>,
) -> Extraction {
    let labels = group_labels(&graph.subgraphs);
    let mut nodes: HashMap<&str, PositionedNode> = HashMap::new();
    let mut slots: Vec<GroupSlot> = Vec::new();
    let mut top_level: Vec<usize> = Vec::new();
    let mut segments: BTreeMap<usize, EdgeSegments> = BTreeMap::new();

    // (container, its absolute offset, its group slot)
    let mut stack: Vec<(&SolvedNode, f64, f64, Option<usize>)> =
        vec![(solved, solved.x, solved.y, None)];
    while let Some((container, ox, oy, slot)) = stack.pop() {
        for edge in &container.edges {
            let Some((index, role)) = parse_edge_id(&edge.id, &edge.source, port_ids) else {
                trace!(edge = %edge.id, "ignoring solver edge with a foreign id");
                continue;
            };
            let mut points = edge.points();
            translate_points(&mut points, ox, oy);
            let segment = Segment {
                points,
                label: edge.label.as_ref().map(|label| label.center().offset(ox, oy)),
            };
            let entry = segments.entry(index).or_default();
            match role {
                SegmentRole::OutgoingInternal => entry.outgoing = Some(segment),
                SegmentRole::External => entry.external = Some(segment),
                SegmentRole::IncomingInternal => entry.incoming = Some(segment),
            }
        }

        let mut nested: Vec<(&SolvedNode, f64, f64, usize)> = Vec::new();
        for child in &container.children {
            let x = ox + child.x;
            let y = oy + child.y;
            if group_ids.contains(&child.id) {
                let idx = slots.len();
                slots.push(GroupSlot {
                    group: PositionedGroup {
                        id: child.id.clone(),
                        label: labels.get(child.id.as_str()).copied().unwrap_or_default().to_string(),
                        x,
                        y,
                        width: child.width,
                        height: child.height,
                        children: Vec::new(),
                    },
                    children: Vec::new(),
                });
                match slot {
                    Some(parent) => slots[parent].children.push(idx),
                    None => top_level.push(idx),
                }
                nested.push((child, x, y, idx));
                continue;
            }
            let Some(node) = graph.nodes.get(&child.id) else {
                continue;
            };
            nodes.insert(
                node.id.as_str(),
                PositionedNode {
                    id: node.id.clone(),
                    label: node.label.clone(),
                    shape: node.shape,
                    x,
                    y,
                    width: child.width,
                    height: child.height,
                    inline_style: graph.resolve_node_style(&node.id),
                },
            );
        }
        for (child, x, y, idx) in nested.into_iter().rev() {
            stack.push((child, x, y, Some(idx)));
        }
    }

    Extraction {
        width: solved.width,
        height: solved.height,
        nodes: graph
            .nodes
            .keys()
            .filter_map(|id| nodes.remove(id.as_str()))
            .collect(),
        groups: assemble_groups(slots, &top_level),
        segments,
    }
}

fn group_labels(subgraphs: &[Subgraph]) -> HashMap<&str, &str> {
    let mut labels = HashMap::new();
    let mut stack: Vec<&Subgraph> = subgraphs.iter().collect();
    while let Some(sub) = stack.pop() {
        labels.insert(sub.id.as_str(), sub.label.as_str());
        stack.extend(sub.children.iter());
    }
    labels
}

/// Children always sit at higher slot indices than their parent, so a
/// reverse sweep completes every subtree before its parent takes it.
fn assemble_groups(slots: Vec<GroupSlot>, top_level: &[usize]) -> Vec<PositionedGroup> {
    let mut built: Vec<Option<PositionedGroup>> = Vec::with_capacity(slots.len());
    let mut child_lists: Vec<Vec<usize>> = Vec::with_capacity(slots.len());
    for slot in slots {
        built.push(Some(slot.group));
        child_lists.push(slot.children);
    }
    for idx in (0..built.len()).rev() {
        let children: Vec<PositionedGroup> = child_lists[idx]
            .iter()
            .filter_map(|child| built[*child].take())
            .collect();
        if let Some(group) = built[idx].as_mut() {
            group.children = children;
        }
    }
    top_level
        .iter()
        .filter_map(|idx| built[*idx].take())
        .collect()
}
