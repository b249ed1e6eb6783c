//! Boundary between the pipeline and the layered layout engine.
//!
//! The pipeline hands a solver one hierarchical box/edge tree and expects every
//! box placed relative to its parent and every edge routed relative to the
//! container it was declared in. Engines that are asynchronous internally must
//! settle before `solve` returns.

use crate::error::SolverError;
use crate::ir::Direction;
use crate::text_metrics::TextSize;

use super::types::Point;

/// Layout options a container carries. `None` fields inherit from the parent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContainerOptions {
    pub direction: Option<Direction>,
    pub padding: Option<Padding>,
    pub node_spacing: Option<f64>,
    pub layer_spacing: Option<f64>,
    pub component_spacing: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Padding {
    pub fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortFlow {
    /// Edges enter the container through this port.
    In,
    /// Edges leave the container through this port.
    Out,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverPort {
    pub id: String,
    pub flow: PortFlow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: Option<TextSize>,
}

/// One box of the solver input. Leaves are plain nodes; boxes with children are containers.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverNode {
    pub id: String,
    pub width: f64,
    pub height: f64,
    pub children: Vec<SolverNode>,
    pub ports: Vec<SolverPort>,
    pub edges: Vec<SolverEdge>,
    pub options: Option<ContainerOptions>,
}

impl SolverNode {
    pub fn leaf(id: &str, width: f64, height: f64) -> Self {
        Self {
            id: id.to_string(),
            width,
            height,
            children: Vec::new(),
            ports: Vec::new(),
            edges: Vec::new(),
            options: None,
        }
    }

    pub fn container(id: &str, options: ContainerOptions) -> Self {
        Self {
            id: id.to_string(),
            width: 0.0,
            height: 0.0,
            children: Vec::new(),
            ports: Vec::new(),
            edges: Vec::new(),
            options: Some(options),
        }
    }

    pub fn is_container(&self) -> bool {
        !self.children.is_empty() || self.options.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedPort {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedLabel {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SolvedLabel {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSection {
    pub start: Point,
    pub bends: Vec<Point>,
    pub end: Point,
}

impl EdgeSection {
    pub fn points(&self) -> Vec<Point> {
        let mut points = Vec::with_capacity(self.bends.len() + 2);
        points.push(self.start);
        points.extend(self.bends.iter().copied());
        points.push(self.end);
        points
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub sections: Vec<EdgeSection>,
    pub label: Option<SolvedLabel>,
}

impl SolvedEdge {
    /// All sections flattened into one polyline, joints deduplicated.
    pub fn points(&self) -> Vec<Point> {
        let mut out: Vec<Point> = Vec::new();
        for section in &self.sections {
            for point in section.points() {
                if out.last().is_some_and(|last| last.approx_eq(point)) {
                    continue;
                }
                out.push(point);
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedNode {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub children: Vec<SolvedNode>,
    pub ports: Vec<SolvedPort>,
    pub edges: Vec<SolvedEdge>,
}

/// Synchronous, deterministic layered layout engine.
pub trait LayoutSolver {
    fn solve(&self, root: &SolverNode) -> Result<SolvedNode, SolverError>;
}
