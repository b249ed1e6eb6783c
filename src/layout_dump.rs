use crate::ir::Graph;
use crate::layout::{
    AlignedCluster, EdgeBundle, HierarchyMode, LayoutOutcome, Point, PositionedGroup, SegmentRole,
};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub mode: HierarchyMode,
    pub direction: String,
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
    pub groups: Vec<GroupDump>,
    pub bundles: Vec<EdgeBundle>,
    pub aligned: Vec<AlignedCluster>,
    pub dropped: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub shape: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub index: usize,
    pub from: String,
    pub to: String,
    pub segments: Vec<SegmentRole>,
    pub repaired: bool,
    pub points: Vec<[f64; 2]>,
    pub label_position: Option<[f64; 2]>,
}

#[derive(Debug, Serialize)]
pub struct GroupDump {
    pub id: String,
    pub label: String,
    pub depth: usize,
    pub parent: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

fn pair(point: Point) -> [f64; 2] {
    [point.x, point.y]
}

impl LayoutDump {
    pub fn from_outcome(outcome: &LayoutOutcome, graph: &Graph) -> Self {
        let layout = &outcome.graph;
        let trace = &outcome.trace;

        let nodes = layout
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                shape: format!("{:?}", node.shape),
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
            })
            .collect();

        // Positioned edges and their traces are emitted in the same order.
        let edges = layout
            .edges
            .iter()
            .zip(&trace.edge_segments)
            .map(|(edge, segments)| EdgeDump {
                index: segments.index,
                from: edge.source.clone(),
                to: edge.target.clone(),
                segments: segments.roles.clone(),
                repaired: trace.repaired.contains(&segments.index),
                points: edge.points.iter().copied().map(pair).collect(),
                label_position: edge.label_position.map(pair),
            })
            .collect();

        let mut groups = Vec::new();
        let mut stack: Vec<(&PositionedGroup, usize, Option<&str>)> =
            layout.groups.iter().rev().map(|group| (group, 0, None)).collect();
        while let Some((group, depth, parent)) = stack.pop() {
            groups.push(GroupDump {
                id: group.id.clone(),
                label: group.label.clone(),
                depth,
                parent: parent.map(str::to_string),
                x: group.x,
                y: group.y,
                width: group.width,
                height: group.height,
            });
            for child in group.children.iter().rev() {
                stack.push((child, depth + 1, Some(group.id.as_str())));
            }
        }

        LayoutDump {
            mode: trace.mode,
            direction: format!("{:?}", graph.direction),
            width: layout.width,
            height: layout.height,
            nodes,
            edges,
            groups,
            bundles: trace.bundles.clone(),
            aligned: trace.aligned.clone(),
            dropped: trace.dropped.clone(),
        }
    }
}

pub fn write_layout_dump(path: &Path, outcome: &LayoutOutcome, graph: &Graph) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_outcome(outcome, graph);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::Subgraph;
    use crate::layout::{LayoutContext, compute_layout_with};

    #[test]
    fn dump_lists_groups_preorder_with_parents() {
        let mut graph = Graph::new();
        graph.ensure_node("a", None, None);
        graph.ensure_node("b", None, None);
        graph.add_edge("a", "b");
        let mut outer = Subgraph::new("outer", "Outer");
        let mut inner = Subgraph::new("inner", "Inner");
        inner.node_ids.push("a".to_string());
        outer.children.push(inner);
        graph.subgraphs.push(outer);

        let outcome =
            compute_layout_with(&graph, &LayoutConfig::default(), &LayoutContext::default())
                .unwrap();
        let dump = LayoutDump::from_outcome(&outcome, &graph);
        let ids: Vec<&str> = dump.groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["outer", "inner"]);
        assert_eq!(dump.groups[1].parent.as_deref(), Some("outer"));
        assert_eq!(dump.groups[1].depth, 1);
        assert_eq!(dump.edges.len(), 1);
        assert_eq!(dump.edges[0].index, 0);
        assert_eq!(dump.edges[0].from, "a");
    }
}
