use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::config::LayoutConfig;
use crate::ir::{Graph, Subgraph};
use crate::text_metrics::TextMetrics;

use super::HierarchyMode;
use super::sizing::{edge_label_size, group_header_size, node_size};
use super::solver::{ContainerOptions, Padding, PortFlow, SolverEdge, SolverNode, SolverPort};

/// Id of the synthetic container holding every ungrouped node and top-level group.
pub(super) const ROOT_ID: &str = "__root__";

pub(super) fn external_edge_id(index: usize) -> String {
    format!("e{index}")
}

pub(super) fn outgoing_edge_id(index: usize) -> String {
    format!("e{index}_src_internal")
}

pub(super) fn incoming_edge_id(index: usize) -> String {
    format!("e{index}_tgt_internal")
}

pub(super) fn exit_port_id(index: usize) -> String {
    format!("port_e{index}_out")
}

pub(super) fn entry_port_id(index: usize) -> String {
    format!("port_e{index}_in")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum EdgeClass {
    /// Both endpoints owned by the same innermost group.
    Internal(usize),
    /// Neither endpoint grouped.
    Root,
    CrossHierarchy,
}

/// Group forest flattened parents-first, with parent/child indices.
pub(super) struct GroupArena<'g> {
    pub records: Vec<GroupRecord<'g>>,
    /// Innermost owning group per node id.
    pub owner: HashMap<&'g str, usize>,
}

pub(super) struct GroupRecord<'g> {
    pub subgraph: &'g Subgraph,
    pub parent: Option<usize>,
    pub depth: usize,
    pub children: Vec<usize>,
}

impl<'g> GroupArena<'g> {
    pub fn build(graph: &'g Graph) -> Self {
        let mut records: Vec<GroupRecord<'g>> = Vec::new();
        let mut stack: Vec<(&'g Subgraph, Option<usize>, usize)> =
            graph.subgraphs.iter().rev().map(|s| (s, None, 0)).collect();
        while let Some((subgraph, parent, depth)) = stack.pop() {
            let idx = records.len();
            records.push(GroupRecord {
                subgraph,
                parent,
                depth,
                children: Vec::new(),
            });
            if let Some(parent) = parent {
                records[parent].children.push(idx);
            }
            for child in subgraph.children.iter().rev() {
                stack.push((child, Some(idx), depth + 1));
            }
        }

        let mut owner: HashMap<&'g str, usize> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            for node_id in &record.subgraph.node_ids {
                let deeper = owner
                    .get(node_id.as_str())
                    .is_none_or(|current| records[*current].depth < record.depth);
                if deeper {
                    owner.insert(node_id.as_str(), idx);
                }
            }
        }
        Self { records, owner }
    }

    pub fn group_of(&self, node_id: &str) -> Option<usize> {
        self.owner.get(node_id).copied()
    }

    pub fn classify(&self, source: &str, target: &str) -> EdgeClass {
        match (self.group_of(source), self.group_of(target)) {
            (None, None) => EdgeClass::Root,
            (Some(a), Some(b)) if a == b => EdgeClass::Internal(a),
            _ => EdgeClass::CrossHierarchy,
        }
    }

    /// Lowest common ancestor of two containers; `None` is the root.
    pub fn common_container(&self, a: Option<usize>, b: Option<usize>) -> Option<usize> {
        let mut ancestors: HashSet<usize> = HashSet::new();
        let mut cursor = a;
        while let Some(idx) = cursor {
            ancestors.insert(idx);
            cursor = self.records[idx].parent;
        }
        let mut cursor = b;
        while let Some(idx) = cursor {
            if ancestors.contains(&idx) {
                return Some(idx);
            }
            cursor = self.records[idx].parent;
        }
        None
    }
}

pub(super) struct Translation {
    pub root: SolverNode,
    pub mode: HierarchyMode,
    pub group_ids: HashSet<String>,
    pub port_ids: HashSet<String>,
    /// Edge indices skipped because an endpoint names no node.
    pub dropped: Vec<usize>,
}

pub(super) fn translate(
    graph: &Graph,
    config: &LayoutConfig,
    metrics: &dyn TextMetrics,
    mode: HierarchyMode,
) -> Translation {
    let arena = GroupArena::build(graph);
    let group_count = arena.records.len();

    let mut group_edges: Vec<Vec<SolverEdge>> = vec![Vec::new(); group_count];
    let mut group_ports: Vec<Vec<SolverPort>> = vec![Vec::new(); group_count];
    let mut root_edges: Vec<SolverEdge> = Vec::new();
    let mut port_ids: HashSet<String> = HashSet::new();
    let mut dropped = Vec::new();

    for (index, edge) in graph.edges.iter().enumerate() {
        let source_known = graph.nodes.contains_key(&edge.source);
        let target_known = graph.nodes.contains_key(&edge.target);
        if !source_known || !target_known {
            warn!(
                edge = index,
                source = %edge.source,
                target = %edge.target,
                "dropping edge with an endpoint that names no node"
            );
            dropped.push(index);
            continue;
        }

        let label = edge
            .label
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .map(|text| edge_label_size(text, config, metrics));

        let mut push = |container: Option<usize>, solver_edge: SolverEdge| match container {
            Some(group) => group_edges[group].push(solver_edge),
            None => root_edges.push(solver_edge),
        };

        match arena.classify(&edge.source, &edge.target) {
            EdgeClass::Root => push(
                None,
                SolverEdge {
                    id: external_edge_id(index),
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    label,
                },
            ),
            EdgeClass::Internal(group) => push(
                Some(group),
                SolverEdge {
                    id: external_edge_id(index),
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    label,
                },
            ),
            EdgeClass::CrossHierarchy => {
                let source_group = arena.group_of(&edge.source);
                let target_group = arena.group_of(&edge.target);
                match mode {
                    HierarchyMode::IncludeChildren => {
                        let container = arena.common_container(source_group, target_group);
                        push(
                            container,
                            SolverEdge {
                                id: external_edge_id(index),
                                source: edge.source.clone(),
                                target: edge.target.clone(),
                                label,
                            },
                        );
                    }
                    HierarchyMode::Separate => {
                        let mut external_source = edge.source.clone();
                        let mut external_target = edge.target.clone();
                        if let Some(group) = source_group {
                            let port = exit_port_id(index);
                            group_ports[group].push(SolverPort {
                                id: port.clone(),
                                flow: PortFlow::Out,
                            });
                            push(
                                Some(group),
                                SolverEdge {
                                    id: outgoing_edge_id(index),
                                    source: edge.source.clone(),
                                    target: port.clone(),
                                    label: None,
                                },
                            );
                            port_ids.insert(port.clone());
                            external_source = port;
                        }
                        if let Some(group) = target_group {
                            let port = entry_port_id(index);
                            group_ports[group].push(SolverPort {
                                id: port.clone(),
                                flow: PortFlow::In,
                            });
                            push(
                                Some(group),
                                SolverEdge {
                                    id: incoming_edge_id(index),
                                    source: port.clone(),
                                    target: edge.target.clone(),
                                    label: None,
                                },
                            );
                            port_ids.insert(port.clone());
                            external_target = port;
                        }
                        // Ports are visible from the owning group's parent upwards.
                        let source_anchor = source_group.and_then(|g| arena.records[g].parent);
                        let target_anchor = target_group.and_then(|g| arena.records[g].parent);
                        push(
                            arena.common_container(source_anchor, target_anchor),
                            SolverEdge {
                                id: external_edge_id(index),
                                source: external_source,
                                target: external_target,
                                label,
                            },
                        );
                    }
                }
            }
        }
    }

    // Members of each container, in declaration order.
    let mut root_members: Vec<SolverNode> = Vec::new();
    let mut group_members: Vec<Vec<SolverNode>> = vec![Vec::new(); group_count];
    let mut placed: HashSet<&str> = HashSet::new();
    for (idx, record) in arena.records.iter().enumerate() {
        for node_id in &record.subgraph.node_ids {
            if arena.group_of(node_id) != Some(idx) || !placed.insert(node_id.as_str()) {
                continue;
            }
            if let Some(node) = graph.nodes.get(node_id) {
                let size = node_size(node.shape, &node.label, config, metrics);
                group_members[idx].push(SolverNode::leaf(&node.id, size.width, size.height));
            }
        }
    }
    for node in graph.nodes.values() {
        if arena.group_of(&node.id).is_none() {
            let size = node_size(node.shape, &node.label, config, metrics);
            root_members.push(SolverNode::leaf(&node.id, size.width, size.height));
        }
    }

    // Children before parents so each container can take its nested containers.
    let mut built: Vec<Option<SolverNode>> = vec![None; group_count];
    for idx in (0..group_count).rev() {
        let record = &arena.records[idx];
        let header = group_header_size(&record.subgraph.label, config, metrics);
        let pad = config.group.padding;
        let top = if header.height > 0.0 {
            pad + header.height + config.group.header_gap
        } else {
            pad
        };
        let mut container = SolverNode::container(
            &record.subgraph.id,
            ContainerOptions {
                direction: record.subgraph.direction,
                padding: Some(Padding {
                    top,
                    right: pad,
                    bottom: pad,
                    left: pad,
                }),
                ..Default::default()
            },
        );
        container.width = header.width + pad * 2.0;
        container.height = top + pad;
        container.children = std::mem::take(&mut group_members[idx]);
        for child in &record.children {
            if let Some(child_node) = built[*child].take() {
                container.children.push(child_node);
            }
        }
        container.ports = std::mem::take(&mut group_ports[idx]);
        container.edges = std::mem::take(&mut group_edges[idx]);
        built[idx] = Some(container);
    }

    let mut root = SolverNode::container(
        ROOT_ID,
        ContainerOptions {
            direction: Some(graph.direction),
            padding: Some(Padding::uniform(config.padding)),
            node_spacing: Some(config.node_spacing),
            layer_spacing: Some(config.layer_spacing),
            component_spacing: Some(config.component_spacing),
        },
    );
    root.children = root_members;
    for (idx, record) in arena.records.iter().enumerate() {
        if record.parent.is_none() {
            if let Some(group) = built[idx].take() {
                root.children.push(group);
            }
        }
    }
    root.edges = root_edges;

    debug!(
        ?mode,
        groups = group_count,
        ports = port_ids.len(),
        dropped = dropped.len(),
        "translated graph for solver"
    );

    Translation {
        root,
        mode,
        group_ids: arena
            .records
            .iter()
            .map(|record| record.subgraph.id.clone())
            .collect(),
        port_ids,
        dropped,
    }
}
