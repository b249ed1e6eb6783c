//! Plain JSON form shared by independent implementations of the layout pipeline.
//!
//! Every map field travels with a sibling `<field>Order` list (and, for maps
//! of maps, a `<field>EntryOrder` object) so insertion order survives hosts
//! that reorder integer-like keys. Absent optional fields are omitted, never
//! `null`. Group trees deeper than [`MAX_GROUP_DEPTH`] are refused.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ContractError;
use crate::ir::Graph;
use crate::layout::PositionedGraph;

pub const MAX_GROUP_DEPTH: usize = 256;

/// Raw bracket nesting allowed before parsing: two levels per group plus the envelope.
const RAW_DEPTH_LIMIT: usize = MAX_GROUP_DEPTH * 2 + 8;

const MAP_FIELDS: [&str; 4] = ["nodes", "classDefs", "classAssignments", "nodeStyles"];
const NESTED_MAP_FIELDS: [&str; 2] = ["classDefs", "nodeStyles"];
const INLINE_STYLE: &str = "inlineStyle";

fn order_key(field: &str) -> String {
    format!("{field}Order")
}

fn entry_order_key(field: &str) -> String {
    format!("{field}EntryOrder")
}

fn keys_value(map: &Map<String, Value>) -> Value {
    Value::Array(map.keys().cloned().map(Value::String).collect())
}

pub fn graph_to_value(graph: &Graph) -> Result<Value, ContractError> {
    let mut value = serde_json::to_value(graph)?;
    if let Value::Object(root) = &mut value {
        for field in MAP_FIELDS {
            let Some(Value::Object(map)) = root.get(field) else {
                continue;
            };
            let order = keys_value(map);
            let entry_order = NESTED_MAP_FIELDS.contains(&field).then(|| {
                let mut entries = Map::new();
                for (key, inner) in map {
                    if let Value::Object(inner) = inner {
                        entries.insert(key.clone(), keys_value(inner));
                    }
                }
                Value::Object(entries)
            });
            root.insert(order_key(field), order);
            if let Some(entry_order) = entry_order {
                root.insert(entry_order_key(field), entry_order);
            }
        }
    }
    Ok(value)
}

pub fn positioned_to_value(graph: &PositionedGraph) -> Result<Value, ContractError> {
    let mut value = serde_json::to_value(graph)?;
    if let Some(Value::Array(nodes)) = value.get_mut("nodes") {
        for node in nodes.iter_mut().filter_map(Value::as_object_mut) {
            let Some(Value::Object(style)) = node.get(INLINE_STYLE) else {
                continue;
            };
            let order = keys_value(style);
            node.insert(order_key(INLINE_STYLE), order);
        }
    }
    Ok(value)
}

pub fn graph_to_json(graph: &Graph) -> Result<String, ContractError> {
    Ok(serde_json::to_string(&graph_to_value(graph)?)?)
}

pub fn positioned_to_json(graph: &PositionedGraph) -> Result<String, ContractError> {
    Ok(serde_json::to_string(&positioned_to_value(graph)?)?)
}

pub fn graph_from_json(payload: &str) -> Result<Graph, ContractError> {
    let mut value = parse_bounded(payload)?;
    reject_nulls(&value)?;
    check_group_depth(&value, "subgraphs")?;
    let Value::Object(root) = &mut value else {
        return Err(ContractError::Shape {
            path: "$".to_string(),
            reason: "expected an object".to_string(),
        });
    };
    for field in MAP_FIELDS {
        apply_order(root, field, field)?;
    }
    for field in NESTED_MAP_FIELDS {
        apply_entry_orders(root, field)?;
    }
    decode(value)
}

pub fn positioned_from_json(payload: &str) -> Result<PositionedGraph, ContractError> {
    let mut value = parse_bounded(payload)?;
    reject_nulls(&value)?;
    check_group_depth(&value, "groups")?;
    if let Some(Value::Array(nodes)) = value.get_mut("nodes") {
        for (idx, node) in nodes.iter_mut().enumerate() {
            if let Value::Object(node) = node {
                apply_order(node, INLINE_STYLE, &format!("nodes[{idx}].{INLINE_STYLE}"))?;
            }
        }
    }
    decode(value)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ContractError> {
    Ok(serde_json::from_value(value)?)
}

/// Bounds nesting lexically, then parses without serde_json's own recursion cap.
fn parse_bounded(payload: &str) -> Result<Value, ContractError> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for byte in payload.bytes() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                if depth > RAW_DEPTH_LIMIT {
                    return Err(ContractError::TooDeep {
                        limit: MAX_GROUP_DEPTH,
                    });
                }
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    let mut deserializer = serde_json::Deserializer::from_str(payload);
    deserializer.disable_recursion_limit();
    let value = Value::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(value)
}

fn reject_nulls(value: &Value) -> Result<(), ContractError> {
    let mut stack: Vec<(&Value, String)> = vec![(value, "$".to_string())];
    while let Some((current, path)) = stack.pop() {
        match current {
            Value::Null => return Err(ContractError::ExplicitNull { path }),
            Value::Array(items) => {
                for (idx, item) in items.iter().enumerate() {
                    stack.push((item, format!("{path}[{idx}]")));
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    stack.push((item, format!("{path}.{key}")));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_group_depth(value: &Value, top_field: &str) -> Result<(), ContractError> {
    let Some(Value::Array(top)) = value.get(top_field) else {
        return Ok(());
    };
    let mut stack: Vec<(&Value, usize)> = top.iter().map(|group| (group, 1)).collect();
    while let Some((group, depth)) = stack.pop() {
        if depth > MAX_GROUP_DEPTH {
            return Err(ContractError::TooDeep {
                limit: MAX_GROUP_DEPTH,
            });
        }
        if let Some(Value::Array(children)) = group.get("children") {
            stack.extend(children.iter().map(|child| (child, depth + 1)));
        }
    }
    Ok(())
}

/// Array-index-like keys are the ones some hosts hoist ahead of the rest.
fn is_integer_like(key: &str) -> bool {
    !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key.len() == 1 || !key.starts_with('0'))
}

fn order_list(value: Value, label: &str) -> Result<Vec<String>, ContractError> {
    let Value::Array(items) = value else {
        return Err(ContractError::Shape {
            path: order_key(label),
            reason: "order list must be an array of strings".to_string(),
        });
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(key) => Ok(key),
            _ => Err(ContractError::Shape {
                path: order_key(label),
                reason: "order list must be an array of strings".to_string(),
            }),
        })
        .collect()
}

/// Rebuilds `map` in `order`, which must name every key exactly once.
fn reorder(
    map: &mut Map<String, Value>,
    order: Option<Vec<String>>,
    label: &str,
) -> Result<(), ContractError> {
    let Some(order) = order else {
        if map.keys().any(|key| is_integer_like(key)) {
            return Err(ContractError::AmbiguousKeyOrder {
                field: label.to_string(),
            });
        }
        return Ok(());
    };
    if order.len() != map.len() {
        return Err(ContractError::OrderMismatch {
            field: label.to_string(),
        });
    }
    let mut rebuilt = Map::new();
    for key in order {
        let Some(item) = map.remove(&key) else {
            return Err(ContractError::OrderMismatch {
                field: label.to_string(),
            });
        };
        rebuilt.insert(key, item);
    }
    *map = rebuilt;
    Ok(())
}

fn apply_order(
    object: &mut Map<String, Value>,
    field: &str,
    label: &str,
) -> Result<(), ContractError> {
    let order = object
        .remove(&order_key(field))
        .map(|value| order_list(value, label))
        .transpose()?;
    match object.get_mut(field) {
        Some(Value::Object(map)) => reorder(map, order, label),
        Some(_) => Ok(()),
        None if order.is_some() => Err(ContractError::OrderMismatch {
            field: label.to_string(),
        }),
        None => Ok(()),
    }
}

fn apply_entry_orders(root: &mut Map<String, Value>, field: &str) -> Result<(), ContractError> {
    let entry_orders = match root.remove(&entry_order_key(field)) {
        Some(Value::Object(entries)) => entries,
        Some(_) => {
            return Err(ContractError::Shape {
                path: entry_order_key(field),
                reason: "entry order must be an object of order lists".to_string(),
            });
        }
        None => Map::new(),
    };
    let Some(Value::Object(outer)) = root.get_mut(field) else {
        return Ok(());
    };
    let mut entry_orders = entry_orders;
    for (key, inner) in outer.iter_mut() {
        let label = format!("{field}.{key}");
        let order = entry_orders
            .remove(key)
            .map(|value| order_list(value, &label))
            .transpose()?;
        if let Value::Object(inner) = inner {
            reorder(inner, order, &label)?;
        }
    }
    if let Some(stray) = entry_orders.keys().next() {
        return Err(ContractError::OrderMismatch {
            field: format!("{field}.{stray}"),
        });
    }
    Ok(())
}

/// A decoded payload, or the caller's own result when the payload was refused.
#[derive(Debug, Clone, PartialEq)]
pub struct Adoption<T> {
    pub value: T,
    pub fallback_reason: Option<String>,
}

impl<T> Adoption<T> {
    pub fn adopted(&self) -> bool {
        self.fallback_reason.is_none()
    }
}

fn adopt<T>(decoded: Result<T, ContractError>, reference: T, what: &str) -> Adoption<T> {
    match decoded {
        Ok(value) => Adoption {
            value,
            fallback_reason: None,
        },
        Err(err) => {
            warn!(payload = what, reason = %err, "refusing interchange payload; keeping reference result");
            Adoption {
                value: reference,
                fallback_reason: Some(err.to_string()),
            }
        }
    }
}

pub fn adopt_graph(payload: &str, reference: Graph) -> Adoption<Graph> {
    adopt(graph_from_json(payload), reference, "graph")
}

pub fn adopt_positioned(payload: &str, reference: PositionedGraph) -> Adoption<PositionedGraph> {
    adopt(positioned_from_json(payload), reference, "positioned graph")
}
