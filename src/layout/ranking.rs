use std::collections::{HashMap, HashSet};

use dagre_rust::{
    GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
    layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};

use crate::ir::Direction;

use super::types::Point;

/// A directed dependency between two members of one container, already lifted
/// to the container's direct children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RankLink {
    pub from: String,
    pub to: String,
}

impl RankLink {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// A box handed to dagre.
#[derive(Debug, Clone, Copy)]
pub(super) struct RankMember<'a> {
    pub id: &'a str,
    pub width: f64,
    pub height: f64,
}

fn dagre_rankdir(direction: Direction) -> &'static str {
    match direction {
        Direction::TD | Direction::TB => "tb",
        Direction::BT => "bt",
        Direction::LR => "lr",
        Direction::RL => "rl",
    }
}

/// Ranks, orders and positions one connected set of members with dagre.
/// Returns top-left corners shifted so the set starts at the origin.
pub(super) fn place_members(
    members: &[RankMember<'_>],
    links: &[RankLink],
    direction: Direction,
    node_spacing: f64,
    rank_spacing: f64,
) -> HashMap<String, Point> {
    let mut placed: HashMap<String, Point> = HashMap::new();
    if members.is_empty() {
        return placed;
    }

    let mut dagre_graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
        DagreGraph::new(Some(GraphOption {
            directed: Some(true),
            multigraph: Some(false),
            compound: Some(false),
        }));

    let mut graph_config = DagreConfig::default();
    graph_config.rankdir = Some(dagre_rankdir(direction).to_string());
    graph_config.nodesep = Some(node_spacing as f32);
    graph_config.ranksep = Some(rank_spacing as f32);
    graph_config.marginx = Some(0.0);
    graph_config.marginy = Some(0.0);
    dagre_graph.set_graph(graph_config);

    let mut member_set: HashSet<&str> = HashSet::new();
    for (order, member) in members.iter().enumerate() {
        let mut node = DagreNode::default();
        node.width = member.width as f32;
        node.height = member.height as f32;
        node.order = Some(order);
        dagre_graph.set_node(member.id.to_string(), Some(node));
        member_set.insert(member.id);
    }

    let mut edge_set: HashSet<(String, String)> = HashSet::new();
    for link in links {
        if link.from == link.to
            || !member_set.contains(link.from.as_str())
            || !member_set.contains(link.to.as_str())
        {
            continue;
        }
        let from = link.from.clone();
        let to = link.to.clone();
        if !edge_set.insert((from.clone(), to.clone())) {
            continue;
        }
        let edge_label = DagreEdge::default();
        let _ = dagre_graph.set_edge(&from, &to, Some(edge_label), None);
    }

    dagre_layout::run_layout(&mut dagre_graph);

    for member in members {
        let id = member.id.to_string();
        let Some(dagre_node) = dagre_graph.node(&id) else {
            continue;
        };
        let x = f64::from(dagre_node.x) - member.width / 2.0;
        let y = f64::from(dagre_node.y) - member.height / 2.0;
        placed.insert(id, Point::new(x, y));
    }

    let min_x = placed.values().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let min_y = placed.values().map(|p| p.y).fold(f64::INFINITY, f64::min);
    if min_x.is_finite() && min_y.is_finite() {
        for point in placed.values_mut() {
            point.x -= min_x;
            point.y -= min_y;
        }
    }
    placed
}

/// Weakly connected components in declaration order of their first member.
pub(super) fn connected_components(node_ids: &[String], links: &[RankLink]) -> Vec<Vec<String>> {
    let index: HashMap<&str, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();
    let mut parent: Vec<usize> = (0..node_ids.len()).collect();

    fn find(parent: &mut [usize], mut idx: usize) -> usize {
        while parent[idx] != idx {
            parent[idx] = parent[parent[idx]];
            idx = parent[idx];
        }
        idx
    }

    for link in links {
        let (Some(&a), Some(&b)) = (index.get(link.from.as_str()), index.get(link.to.as_str()))
        else {
            continue;
        };
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            parent[hi] = lo;
        }
    }

    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut slot: HashMap<usize, usize> = HashMap::new();
    for (idx, id) in node_ids.iter().enumerate() {
        let root = find(&mut parent, idx);
        let group = *slot.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(id.clone());
    }
    groups
}
