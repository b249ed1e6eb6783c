use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::error::SolverError;
use crate::ir::Direction;

use super::geometry::{cross_coord, entry_point, exit_point, flow_coord, flow_sign, flow_span, from_axes};
use super::ranking::{RankLink, RankMember, connected_components, place_members};
use super::solver::{
    ContainerOptions, EdgeSection, LayoutSolver, Padding, PortFlow, SolvedEdge, SolvedLabel,
    SolvedNode, SolvedPort, SolverNode, SolverPort,
};
use super::types::{Point, Rect};

// ── Tuning ───────────────────────────────────────────────────────────

/// Coordinates closer than this count as aligned when choosing a straight route.
const AXIS_EPSILON: f64 = 0.5;
/// Self-loop clearance as a share of node spacing, with a floor.
const SELF_LOOP_PAD_RATIO: f64 = 0.6;
const SELF_LOOP_MIN_PAD: f64 = 16.0;

/// Built-in layered solver. Each container is solved bottom-up: dagre ranks and
/// places its direct members per connected component, then ports, orthogonal
/// connectors and inline labels are added around that placement.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredSolver;

impl LayeredSolver {
    pub const fn new() -> Self {
        Self
    }
}

impl LayoutSolver for LayeredSolver {
    fn solve(&self, root: &SolverNode) -> Result<SolvedNode, SolverError> {
        validate_tree(root)?;
        let settings = Settings::default().inherit(root.options.as_ref());
        let mut solved = self.solve_container(root, &settings, settings.direction)?;
        solved.x = 0.0;
        solved.y = 0.0;
        Ok(solved)
    }
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    direction: Direction,
    padding: Padding,
    node_spacing: f64,
    layer_spacing: f64,
    component_spacing: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            direction: Direction::TD,
            padding: Padding::default(),
            node_spacing: 24.0,
            layer_spacing: 40.0,
            component_spacing: 24.0,
        }
    }
}

impl Settings {
    /// Spacing and direction are inherited; padding is per container.
    fn inherit(&self, options: Option<&ContainerOptions>) -> Self {
        let Some(options) = options else {
            return Self {
                padding: Padding::default(),
                ..*self
            };
        };
        Self {
            direction: options.direction.unwrap_or(self.direction),
            padding: options.padding.unwrap_or_default(),
            node_spacing: options.node_spacing.unwrap_or(self.node_spacing),
            layer_spacing: options.layer_spacing.unwrap_or(self.layer_spacing),
            component_spacing: options.component_spacing.unwrap_or(self.component_spacing),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    OwnPort,
    Child(usize),
}

#[derive(Debug, Clone, Copy)]
enum Anchor {
    Box(Rect),
    Port(Point),
}

impl Anchor {
    fn flow_span(&self, direction: Direction) -> (f64, f64) {
        match self {
            Anchor::Box(rect) => flow_span(rect, direction),
            Anchor::Port(point) => {
                let flow = flow_coord(*point, direction);
                (flow, flow)
            }
        }
    }

    fn center(&self) -> Point {
        match self {
            Anchor::Box(rect) => rect.center(),
            Anchor::Port(point) => *point,
        }
    }

    fn exit(&self, direction: Direction) -> Point {
        match self {
            Anchor::Box(rect) => exit_point(rect, direction),
            Anchor::Port(point) => *point,
        }
    }

    fn entry(&self, direction: Direction) -> Point {
        match self {
            Anchor::Box(rect) => entry_point(rect, direction),
            Anchor::Port(point) => *point,
        }
    }

    /// Midpoint of the side facing increasing (`positive`) or decreasing cross coordinates.
    fn cross_side(&self, positive: bool, direction: Direction) -> Point {
        match self {
            Anchor::Box(rect) => {
                let center = rect.center();
                let flow = flow_coord(center, direction);
                let cross = match (direction.is_horizontal(), positive) {
                    (true, true) => rect.bottom(),
                    (true, false) => rect.y,
                    (false, true) => rect.right(),
                    (false, false) => rect.x,
                };
                from_axes(flow, cross, direction)
            }
            Anchor::Port(point) => *point,
        }
    }
}

impl LayeredSolver {
    fn solve_container(
        &self,
        container: &SolverNode,
        settings: &Settings,
        outer_direction: Direction,
    ) -> Result<SolvedNode, SolverError> {
        let direction = settings.direction;

        let mut children: Vec<SolvedNode> = Vec::with_capacity(container.children.len());
        for child in &container.children {
            if child.is_container() {
                let child_settings = settings.inherit(child.options.as_ref());
                children.push(self.solve_container(child, &child_settings, direction)?);
            } else {
                children.push(SolvedNode {
                    id: child.id.clone(),
                    x: 0.0,
                    y: 0.0,
                    width: child.width,
                    height: child.height,
                    children: Vec::new(),
                    ports: Vec::new(),
                    edges: Vec::new(),
                });
            }
        }

        // Every id nested under a direct child resolves to that child.
        let mut owner: HashMap<String, usize> = HashMap::new();
        for (idx, child) in children.iter().enumerate() {
            let mut stack: Vec<&SolvedNode> = vec![child];
            while let Some(node) = stack.pop() {
                owner.insert(node.id.clone(), idx);
                for port in &node.ports {
                    owner.insert(port.id.clone(), idx);
                }
                stack.extend(node.children.iter());
            }
        }
        let own_ports: HashSet<&str> = container.ports.iter().map(|p| p.id.as_str()).collect();

        let resolve = |edge_id: &str, endpoint: &str| -> Result<Endpoint, SolverError> {
            if own_ports.contains(endpoint) {
                return Ok(Endpoint::OwnPort);
            }
            owner
                .get(endpoint)
                .map(|idx| Endpoint::Child(*idx))
                .ok_or_else(|| SolverError::UnknownEndpoint {
                    edge: edge_id.to_string(),
                    endpoint: endpoint.to_string(),
                    container: container.id.clone(),
                })
        };

        let mut links: Vec<RankLink> = Vec::new();
        let mut labeled: Vec<(usize, f64)> = Vec::new();
        for edge in &container.edges {
            let source = resolve(&edge.id, &edge.source)?;
            let target = resolve(&edge.id, &edge.target)?;
            if let (Endpoint::Child(a), Endpoint::Child(b)) = (source, target) {
                if a == b {
                    continue;
                }
                links.push(RankLink::new(&children[a].id, &children[b].id));
                if let Some(size) = edge.label {
                    let extent = if direction.is_horizontal() {
                        size.width
                    } else {
                        size.height
                    };
                    labeled.push((a, extent));
                }
            }
        }

        let main_extent = |node: &SolvedNode| {
            if direction.is_horizontal() {
                node.width
            } else {
                node.height
            }
        };
        let cross_extent = |node: &SolvedNode| {
            if direction.is_horizontal() {
                node.height
            } else {
                node.width
            }
        };

        let ids: Vec<String> = children.iter().map(|c| c.id.clone()).collect();
        let index_of: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.as_str(), idx))
            .collect();
        let components = connected_components(&ids, &links);

        // Components are laid out one by one and packed side by side across the flow.
        let mut top_left = vec![Point::default(); children.len()];
        let mut content_main: f64 = 0.0;
        let mut cross_cursor = 0.0;
        for (component, members) in components.iter().enumerate() {
            let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();
            let component_links: Vec<RankLink> = links
                .iter()
                .filter(|link| member_set.contains(link.from.as_str()))
                .cloned()
                .collect();
            // Inline labels widen every rank gap of their component.
            let label_extent = labeled
                .iter()
                .filter(|(a, _)| member_set.contains(ids[*a].as_str()))
                .map(|(_, extent)| *extent)
                .fold(0.0, f64::max);
            let boxes: Vec<RankMember<'_>> = members
                .iter()
                .map(|id| {
                    let node = &children[index_of[id.as_str()]];
                    RankMember {
                        id: id.as_str(),
                        width: node.width,
                        height: node.height,
                    }
                })
                .collect();
            let placed = place_members(
                &boxes,
                &component_links,
                direction,
                settings.node_spacing,
                settings.layer_spacing + label_extent,
            );

            if component > 0 {
                cross_cursor += settings.component_spacing;
            }
            let mut component_cross: f64 = 0.0;
            for id in members {
                let idx = index_of[id.as_str()];
                let local = placed.get(id).copied().unwrap_or_default();
                let main = flow_coord(local, direction);
                let cross = cross_coord(local, direction);
                content_main = content_main.max(main + main_extent(&children[idx]));
                component_cross = component_cross.max(cross + cross_extent(&children[idx]));
                top_left[idx] = from_axes(main, cross_cursor + cross, direction);
            }
            cross_cursor += component_cross;
        }
        let content_cross = cross_cursor;
        for (node, corner) in children.iter_mut().zip(&top_left) {
            node.x = corner.x;
            node.y = corner.y;
        }

        let (content_w, content_h) = if direction.is_horizontal() {
            (content_main, content_cross)
        } else {
            (content_cross, content_main)
        };

        let pad = settings.padding;
        let width = (content_w + pad.left + pad.right).max(container.width);
        let height = (content_h + pad.top + pad.bottom).max(container.height);
        let offset_x = pad.left + (width - pad.left - pad.right - content_w) / 2.0;
        let offset_y = pad.top + (height - pad.top - pad.bottom - content_h) / 2.0;
        for node in &mut children {
            node.x += offset_x;
            node.y += offset_y;
        }

        let ports = place_ports(&container.ports, width, height, outer_direction);

        let mut anchors: HashMap<&str, Anchor> = HashMap::new();
        let mut stack: Vec<(&SolvedNode, f64, f64)> = children.iter().map(|c| (c, 0.0, 0.0)).collect();
        while let Some((node, ox, oy)) = stack.pop() {
            let x = ox + node.x;
            let y = oy + node.y;
            anchors.insert(node.id.as_str(), Anchor::Box(Rect::new(x, y, node.width, node.height)));
            for port in &node.ports {
                anchors.insert(port.id.as_str(), Anchor::Port(Point::new(x + port.x, y + port.y)));
            }
            stack.extend(node.children.iter().map(|c| (c, x, y)));
        }
        for port in &ports {
            anchors.insert(port.id.as_str(), Anchor::Port(Point::new(port.x, port.y)));
        }

        let mut edges: Vec<SolvedEdge> = Vec::with_capacity(container.edges.len());
        for edge in &container.edges {
            let (Some(source), Some(target)) = (
                anchors.get(edge.source.as_str()).copied(),
                anchors.get(edge.target.as_str()).copied(),
            ) else {
                return Err(SolverError::Internal(format!(
                    "edge {} lost an endpoint during placement",
                    edge.id
                )));
            };
            let points = if edge.source == edge.target {
                match source {
                    Anchor::Box(rect) => self_loop(&rect, direction, settings.node_spacing),
                    Anchor::Port(point) => vec![point, point],
                }
            } else if own_ports.contains(edge.source.as_str()) {
                vec![source.center(), facing_side(target, source.center())]
            } else if own_ports.contains(edge.target.as_str()) {
                vec![facing_side(source, target.center()), target.center()]
            } else {
                connect(source, target, direction)
            };
            let label = edge.label.map(|size| inline_label(&points, size.width, size.height));
            edges.push(SolvedEdge {
                id: edge.id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                sections: vec![section_from(&points)],
                label,
            });
        }

        trace!(
            container = %container.id,
            ?direction,
            components = components.len(),
            width,
            height,
            "solved container"
        );

        Ok(SolvedNode {
            id: container.id.clone(),
            x: 0.0,
            y: 0.0,
            width,
            height,
            children,
            ports,
            edges,
        })
    }
}

/// Input ids must be unique across the tree and leaf sizes finite and non-negative.
fn validate_tree(root: &SolverNode) -> Result<(), SolverError> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut edge_ids: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&SolverNode> = vec![root];
    while let Some(node) = stack.pop() {
        if !seen.insert(node.id.as_str()) {
            return Err(SolverError::DuplicateId(node.id.clone()));
        }
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if !valid(node.width) || !valid(node.height) {
            return Err(SolverError::InvalidSize {
                id: node.id.clone(),
                width: node.width,
                height: node.height,
            });
        }
        for port in &node.ports {
            if !seen.insert(port.id.as_str()) {
                return Err(SolverError::DuplicateId(port.id.clone()));
            }
        }
        for edge in &node.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(SolverError::DuplicateId(edge.id.clone()));
            }
        }
        stack.extend(node.children.iter());
    }
    Ok(())
}

/// Entry ports sit on the side facing upstream in the enclosing flow, exit
/// ports on the downstream side, each set spread evenly along its side.
fn place_ports(ports: &[SolverPort], width: f64, height: f64, outer: Direction) -> Vec<SolvedPort> {
    let mut placed = Vec::with_capacity(ports.len());
    for flow in [PortFlow::In, PortFlow::Out] {
        let group: Vec<&SolverPort> = ports.iter().filter(|p| p.flow == flow).collect();
        let count = group.len() as f64;
        let rect = Rect::new(0.0, 0.0, width, height);
        let side = match flow {
            PortFlow::In => entry_point(&rect, outer),
            PortFlow::Out => exit_point(&rect, outer),
        };
        for (idx, port) in group.into_iter().enumerate() {
            let t = (idx as f64 + 1.0) / (count + 1.0);
            let point = if outer.is_horizontal() {
                Point::new(side.x, height * t)
            } else {
                Point::new(width * t, side.y)
            };
            placed.push(SolvedPort {
                id: port.id.clone(),
                x: point.x,
                y: point.y,
            });
        }
    }
    placed
}

/// Orthogonal connector between two anchors of one container.
fn connect(source: Anchor, target: Anchor, direction: Direction) -> Vec<Point> {
    let sign = flow_sign(direction);
    let (_, source_down) = source.flow_span(direction);
    let (source_up, _) = source.flow_span(direction);
    let (target_up, target_down) = target.flow_span(direction);

    let forward = sign * (target_up - source_down) >= 0.0;
    let backward = sign * (source_up - target_down) >= 0.0;
    if forward || backward {
        let (start, end) = if forward {
            (source.exit(direction), target.entry(direction))
        } else {
            (source.entry(direction), target.exit(direction))
        };
        let start_cross = cross_coord(start, direction);
        let end_cross = cross_coord(end, direction);
        if (start_cross - end_cross).abs() <= AXIS_EPSILON {
            return vec![start, from_axes(flow_coord(end, direction), start_cross, direction)];
        }
        let mid = (flow_coord(start, direction) + flow_coord(end, direction)) / 2.0;
        return vec![
            start,
            from_axes(mid, start_cross, direction),
            from_axes(mid, end_cross, direction),
            end,
        ];
    }

    // Overlapping flow spans: leave through the facing cross-axis sides.
    let toward_positive =
        cross_coord(target.center(), direction) >= cross_coord(source.center(), direction);
    let start = source.cross_side(toward_positive, direction);
    let end = target.cross_side(!toward_positive, direction);
    let start_flow = flow_coord(start, direction);
    let end_flow = flow_coord(end, direction);
    if (start_flow - end_flow).abs() <= AXIS_EPSILON {
        return vec![start, from_axes(start_flow, cross_coord(end, direction), direction)];
    }
    let mid = (cross_coord(start, direction) + cross_coord(end, direction)) / 2.0;
    vec![
        start,
        from_axes(start_flow, mid, direction),
        from_axes(end_flow, mid, direction),
        end,
    ]
}

/// Midpoint of the side of `anchor` facing `toward`.
fn facing_side(anchor: Anchor, toward: Point) -> Point {
    let Anchor::Box(rect) = anchor else {
        return anchor.center();
    };
    let center = rect.center();
    if toward.y <= rect.y {
        Point::new(center.x, rect.y)
    } else if toward.y >= rect.bottom() {
        Point::new(center.x, rect.bottom())
    } else if toward.x <= rect.x {
        Point::new(rect.x, center.y)
    } else {
        Point::new(rect.right(), center.y)
    }
}

fn self_loop(rect: &Rect, direction: Direction, node_spacing: f64) -> Vec<Point> {
    let pad = node_spacing.max(SELF_LOOP_MIN_PAD) * SELF_LOOP_PAD_RATIO;
    let center = rect.center();
    if direction.is_horizontal() {
        vec![
            Point::new(rect.right(), center.y),
            Point::new(rect.right() + pad, center.y),
            Point::new(rect.right() + pad, rect.y - pad),
            Point::new(center.x, rect.y - pad),
            Point::new(center.x, rect.y),
        ]
    } else {
        vec![
            Point::new(center.x, rect.bottom()),
            Point::new(center.x, rect.bottom() + pad),
            Point::new(rect.right() + pad, rect.bottom() + pad),
            Point::new(rect.right() + pad, center.y),
            Point::new(rect.right(), center.y),
        ]
    }
}

/// Label box centred on the middle segment of the route.
fn inline_label(points: &[Point], width: f64, height: f64) -> SolvedLabel {
    let center = match points.len() {
        0 => Point::default(),
        1 => points[0],
        len => {
            let idx = (len - 1) / 2;
            let a = points[idx];
            let b = points[(idx + 1).min(len - 1)];
            Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
        }
    };
    SolvedLabel {
        x: center.x - width / 2.0,
        y: center.y - height / 2.0,
        width,
        height,
    }
}

fn section_from(points: &[Point]) -> EdgeSection {
    let start = points.first().copied().unwrap_or_default();
    let end = points.last().copied().unwrap_or(start);
    let bends = if points.len() > 2 {
        points[1..points.len() - 1].to_vec()
    } else {
        Vec::new()
    };
    EdgeSection { start, bends, end }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::solver::SolverEdge;
    use crate::text_metrics::TextSize;

    fn edge(id: &str, source: &str, target: &str) -> SolverEdge {
        SolverEdge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            label: None,
        }
    }

    fn root(direction: Direction) -> SolverNode {
        SolverNode::container(
            "root",
            ContainerOptions {
                direction: Some(direction),
                padding: Some(Padding::uniform(10.0)),
                ..Default::default()
            },
        )
    }

    fn find<'a>(node: &'a SolvedNode, id: &str) -> &'a SolvedNode {
        node.children.iter().find(|c| c.id == id).unwrap()
    }

    #[test]
    fn chain_is_stacked_along_flow() {
        let mut graph = root(Direction::TD);
        graph.children.push(SolverNode::leaf("A", 50.0, 30.0));
        graph.children.push(SolverNode::leaf("B", 50.0, 30.0));
        graph.edges.push(edge("e0", "A", "B"));
        let solved = LayeredSolver::new().solve(&graph).unwrap();
        let a = find(&solved, "A");
        let b = find(&solved, "B");
        assert!((a.y - 10.0).abs() < 1e-6);
        assert!((b.y - a.y - (30.0 + 40.0)).abs() < 0.5);
        assert!((a.x - b.x).abs() < 0.5);
        let points = solved.edges[0].points();
        assert_eq!(points.len(), 2);
        assert!((points[0].y - (a.y + 30.0)).abs() < 1e-6);
        assert!((points[1].y - b.y).abs() < 1e-6);
        assert!((solved.height - (10.0 + 30.0 + 40.0 + 30.0 + 10.0)).abs() < 0.5);
    }

    #[test]
    fn reversed_flow_mirrors_ranks() {
        let mut graph = root(Direction::BT);
        graph.children.push(SolverNode::leaf("A", 50.0, 30.0));
        graph.children.push(SolverNode::leaf("B", 50.0, 30.0));
        graph.edges.push(edge("e0", "A", "B"));
        let solved = LayeredSolver::new().solve(&graph).unwrap();
        assert!(find(&solved, "A").y > find(&solved, "B").y);
        let points = solved.edges[0].points();
        assert!(points[0].y > points[1].y);
    }

    #[test]
    fn labeled_edges_widen_the_layer_gap() {
        let gap = |label: Option<TextSize>| {
            let mut graph = root(Direction::LR);
            graph.children.push(SolverNode::leaf("A", 50.0, 30.0));
            graph.children.push(SolverNode::leaf("B", 50.0, 30.0));
            let mut link = edge("e0", "A", "B");
            link.label = label;
            graph.edges.push(link);
            let solved = LayeredSolver::new().solve(&graph).unwrap();
            let a_right = find(&solved, "A").x + 50.0;
            let gap = find(&solved, "B").x - a_right;
            let mid = find(&solved, "A").y + 15.0;
            (gap, solved.edges[0].label.clone(), mid)
        };
        let (plain, _, _) = gap(None);
        let (wide, label, mid) = gap(Some(TextSize {
            width: 30.0,
            height: 12.0,
        }));
        assert!(wide - plain > 29.0);
        let label = label.unwrap();
        assert!((label.center().y - mid).abs() < 0.5);
    }

    #[test]
    fn ports_sit_on_the_outer_flow_sides() {
        let mut graph = root(Direction::TD);
        let mut group = SolverNode::container(
            "G",
            ContainerOptions {
                direction: Some(Direction::LR),
                padding: Some(Padding::uniform(8.0)),
                ..Default::default()
            },
        );
        group.children.push(SolverNode::leaf("X", 40.0, 20.0));
        group.ports.push(SolverPort {
            id: "port_e0_in".to_string(),
            flow: PortFlow::In,
        });
        group.edges.push(edge("e0_tgt_internal", "port_e0_in", "X"));
        graph.children.push(SolverNode::leaf("O", 40.0, 20.0));
        graph.children.push(group);
        graph.edges.push(edge("e0", "O", "port_e0_in"));

        let solved = LayeredSolver::new().solve(&graph).unwrap();
        let group = find(&solved, "G");
        assert_eq!(group.ports[0].y, 0.0);
        assert_eq!(group.ports[0].x, group.width / 2.0);
        assert!(group.y > find(&solved, "O").y);
        let internal = group.edges[0].points();
        assert_eq!(internal[0], Point::new(group.ports[0].x, 0.0));
        let external = solved.edges[0].points();
        let port_abs = Point::new(group.x + group.ports[0].x, group.y);
        assert!(external.last().unwrap().approx_eq(port_abs));
    }

    #[test]
    fn unknown_endpoints_are_reported() {
        let mut graph = root(Direction::TD);
        graph.children.push(SolverNode::leaf("A", 10.0, 10.0));
        graph.edges.push(edge("e0", "A", "ghost"));
        let err = LayeredSolver::new().solve(&graph).unwrap_err();
        assert!(matches!(err, SolverError::UnknownEndpoint { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut graph = root(Direction::TD);
        graph.children.push(SolverNode::leaf("A", 10.0, 10.0));
        graph.children.push(SolverNode::leaf("A", 10.0, 10.0));
        assert_eq!(
            LayeredSolver::new().solve(&graph).unwrap_err(),
            SolverError::DuplicateId("A".to_string())
        );
    }

    #[test]
    fn disconnected_members_use_component_spacing() {
        let mut graph = root(Direction::TD);
        graph.children.push(SolverNode::leaf("A", 20.0, 20.0));
        graph.children.push(SolverNode::leaf("B", 20.0, 20.0));
        if let Some(options) = graph.options.as_mut() {
            options.component_spacing = Some(50.0);
        }
        let solved = LayeredSolver::new().solve(&graph).unwrap();
        assert_eq!(find(&solved, "B").x - find(&solved, "A").x, 70.0);
    }
}
