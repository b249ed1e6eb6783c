use mermaid_hier_layout::config::LayoutConfig;
use mermaid_hier_layout::error::ContractError;
use mermaid_hier_layout::interchange::{
    MAX_GROUP_DEPTH, adopt_graph, adopt_positioned, graph_from_json, graph_to_json,
    positioned_from_json, positioned_to_json,
};
use mermaid_hier_layout::ir::{Direction, Graph, NodeShape, StyleMap, Subgraph};
use mermaid_hier_layout::layout::compute_layout;

fn sample_graph() -> Graph {
    let mut graph = Graph::new();
    graph.direction = Direction::LR;
    graph.ensure_node("10", Some("Ten".to_string()), Some(NodeShape::Diamond));
    graph.ensure_node("2", Some("Two".to_string()), Some(NodeShape::Circle));
    graph.ensure_node("start", None, None);
    graph.add_edge("start", "10").label = Some("begin".to_string());
    graph.add_edge("10", "2");
    graph
        .class_assignments
        .insert("10".to_string(), "hot".to_string());
    graph.class_defs.insert(
        "hot".to_string(),
        StyleMap::from([("fill".to_string(), "#f00".to_string())]),
    );
    graph.node_styles.insert(
        "2".to_string(),
        StyleMap::from([
            ("stroke-width".to_string(), "3px".to_string()),
            ("color".to_string(), "#fff".to_string()),
        ]),
    );
    let mut outer = Subgraph::new("outer", "Outer");
    outer.node_ids.push("10".to_string());
    let mut inner = Subgraph::new("inner", "Inner");
    inner.node_ids.push("2".to_string());
    inner.direction = Some(Direction::TB);
    outer.children.push(inner);
    graph.subgraphs.push(outer);
    graph
}

#[test]
fn graph_survives_the_contract_with_order_intact() {
    let graph = sample_graph();
    let json = graph_to_json(&graph).unwrap();
    assert!(!json.contains("null"));
    let back = graph_from_json(&json).unwrap();
    assert_eq!(back, graph);
    let ids: Vec<&str> = back.nodes.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["10", "2", "start"]);
}

#[test]
fn positioned_graph_survives_the_contract() {
    let graph = sample_graph();
    let layout = compute_layout(&graph, &LayoutConfig::default()).unwrap();
    let json = positioned_to_json(&layout).unwrap();
    assert!(!json.contains("null"));
    assert!(json.contains("inlineStyleOrder"));
    let back = positioned_from_json(&json).unwrap();
    assert_eq!(back, layout);
}

fn nested_payload(depth: usize) -> String {
    let mut group = String::from(r#"{"id":"g","label":"g","nodeIds":[],"children":[]}"#);
    for _ in 1..depth {
        group = format!(r#"{{"id":"g","label":"g","nodeIds":[],"children":[{group}]}}"#);
    }
    format!(
        r#"{{"direction":"TD","nodes":{{}},"edges":[],"subgraphs":[{group}],
        "classDefs":{{}},"classAssignments":{{}},"nodeStyles":{{}}}}"#
    )
}

#[test]
fn group_depth_is_capped() {
    assert!(graph_from_json(&nested_payload(MAX_GROUP_DEPTH)).is_ok());
    assert!(matches!(
        graph_from_json(&nested_payload(MAX_GROUP_DEPTH + 1)),
        Err(ContractError::TooDeep { limit: MAX_GROUP_DEPTH })
    ));
}

#[test]
fn invalid_enum_values_are_refused() {
    let payload = r#"{"direction":"SIDEWAYS","nodes":{},"edges":[],"subgraphs":[],
        "classDefs":{},"classAssignments":{},"nodeStyles":{}}"#;
    assert!(matches!(graph_from_json(payload), Err(ContractError::Json(_))));
}

#[test]
fn refused_payloads_fall_back_to_the_reference() {
    let reference = sample_graph();
    let adoption = adopt_graph(r#"{"direction":"TD"}"#, reference.clone());
    assert!(!adoption.adopted());
    assert_eq!(adoption.value, reference);
    assert!(adoption.fallback_reason.is_some());

    let layout = compute_layout(&reference, &LayoutConfig::default()).unwrap();
    let good = positioned_to_json(&layout).unwrap();
    let adoption = adopt_positioned(&good, layout.clone());
    assert!(adoption.adopted());
    assert_eq!(adoption.value, layout);

    let adoption = adopt_positioned(&nested_payload(MAX_GROUP_DEPTH * 4), layout.clone());
    assert!(!adoption.adopted());
    assert_eq!(adoption.value, layout);
}
