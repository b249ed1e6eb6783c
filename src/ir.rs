use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "TD")]
    TD,
    #[serde(rename = "TB")]
    TB,
    #[serde(rename = "LR")]
    LR,
    #[serde(rename = "BT")]
    BT,
    #[serde(rename = "RL")]
    RL,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "TD" => Some(Self::TD),
            "TB" => Some(Self::TB),
            "LR" => Some(Self::LR),
            "BT" => Some(Self::BT),
            "RL" => Some(Self::RL),
            _ => None,
        }
    }

    /// True when the flow axis is X.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LR | Self::RL)
    }

    /// True when the flow runs towards decreasing coordinates (bottom-to-top, right-to-left).
    pub fn is_reversed(self) -> bool {
        matches!(self, Self::BT | Self::RL)
    }

    /// TD and TB are the same flow.
    pub fn same_flow(self, other: Direction) -> bool {
        self.is_horizontal() == other.is_horizontal() && self.is_reversed() == other.is_reversed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeShape {
    Rectangle,
    Rounded,
    Diamond,
    Stadium,
    Circle,
    Subroutine,
    Doublecircle,
    Hexagon,
    Cylinder,
    Asymmetric,
    Trapezoid,
    #[serde(rename = "trapezoid-alt")]
    TrapezoidAlt,
    #[serde(rename = "state-start")]
    StateStart,
    #[serde(rename = "state-end")]
    StateEnd,
}

impl NodeShape {
    /// Start/end markers of state diagrams, sized as a fixed small square.
    pub fn is_pseudostate(self) -> bool {
        matches!(self, Self::StateStart | Self::StateEnd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    Solid,
    Dotted,
    Thick,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub style: EdgeStyle,
    pub has_arrow_start: bool,
    pub has_arrow_end: bool,
}

impl Edge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            label: None,
            style: EdgeStyle::Solid,
            has_arrow_start: false,
            has_arrow_end: true,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subgraph {
    pub id: String,
    pub label: String,
    pub node_ids: Vec<String>,
    pub children: Vec<Subgraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl Subgraph {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            node_ids: Vec::new(),
            children: Vec::new(),
            direction: None,
        }
    }
}

pub type StyleMap = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub direction: Direction,
    pub nodes: IndexMap<String, Node>,
    pub edges: Vec<Edge>,
    pub subgraphs: Vec<Subgraph>,
    pub class_defs: IndexMap<String, StyleMap>,
    pub class_assignments: IndexMap<String, String>,
    pub node_styles: IndexMap<String, StyleMap>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            direction: Direction::TD,
            nodes: IndexMap::new(),
            edges: Vec::new(),
            subgraphs: Vec::new(),
            class_defs: IndexMap::new(),
            class_assignments: IndexMap::new(),
            node_styles: IndexMap::new(),
        }
    }

    pub fn ensure_node(&mut self, id: &str, label: Option<String>, shape: Option<NodeShape>) {
        let entry = self.nodes.entry(id.to_string()).or_insert(Node {
            id: id.to_string(),
            label: id.to_string(),
            shape: NodeShape::Rectangle,
        });
        if let Some(label) = label {
            entry.label = label;
        }
        if let Some(shape) = shape {
            entry.shape = shape;
        }
    }

    pub fn add_edge(&mut self, source: &str, target: &str) -> &mut Edge {
        self.ensure_node(source, None, None);
        self.ensure_node(target, None, None);
        self.edges.push(Edge::new(source, target));
        let last = self.edges.len() - 1;
        &mut self.edges[last]
    }

    /// Class styles first (in assignment order), then the node's own inline styles.
    pub fn resolve_node_style(&self, node_id: &str) -> Option<StyleMap> {
        let mut style = StyleMap::new();
        if let Some(classes) = self.class_assignments.get(node_id) {
            for class_name in classes
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|name| !name.is_empty())
            {
                if let Some(class_style) = self.class_defs.get(class_name) {
                    for (key, value) in class_style {
                        style.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        if let Some(node_style) = self.node_styles.get(node_id) {
            for (key, value) in node_style {
                style.insert(key.clone(), value.clone());
            }
        }
        if style.is_empty() { None } else { Some(style) }
    }

    pub fn has_direction_overrides(&self) -> bool {
        let mut stack: Vec<&Subgraph> = self.subgraphs.iter().collect();
        while let Some(sub) = stack.pop() {
            if sub.direction.is_some() {
                return true;
            }
            stack.extend(sub.children.iter());
        }
        false
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyphenated_shape_literals_are_stable() {
        let literals = [
            (NodeShape::TrapezoidAlt, "\"trapezoid-alt\""),
            (NodeShape::StateStart, "\"state-start\""),
            (NodeShape::StateEnd, "\"state-end\""),
            (NodeShape::Doublecircle, "\"doublecircle\""),
        ];
        for (shape, literal) in literals {
            assert_eq!(serde_json::to_string(&shape).unwrap(), literal);
            let back: NodeShape = serde_json::from_str(literal).unwrap();
            assert_eq!(back, shape);
        }
    }

    #[test]
    fn class_styles_merge_before_node_styles() {
        let mut graph = Graph::new();
        graph.ensure_node("A", None, None);
        graph.class_defs.insert(
            "hot".to_string(),
            StyleMap::from([
                ("fill".to_string(), "#f00".to_string()),
                ("stroke".to_string(), "#900".to_string()),
            ]),
        );
        graph
            .class_assignments
            .insert("A".to_string(), "hot".to_string());
        graph.node_styles.insert(
            "A".to_string(),
            StyleMap::from([("fill".to_string(), "#0f0".to_string())]),
        );
        let style = graph.resolve_node_style("A").unwrap();
        assert_eq!(style.get("fill").map(String::as_str), Some("#0f0"));
        assert_eq!(style.get("stroke").map(String::as_str), Some("#900"));
        assert!(graph.resolve_node_style("missing").is_none());
    }

    #[test]
    fn direction_overrides_are_found_in_nested_groups() {
        let mut graph = Graph::new();
        let mut outer = Subgraph::new("outer", "Outer");
        let mut inner = Subgraph::new("inner", "Inner");
        assert!(!graph.has_direction_overrides());
        inner.direction = Some(Direction::LR);
        outer.children.push(inner);
        graph.subgraphs.push(outer);
        assert!(graph.has_direction_overrides());
    }
}
