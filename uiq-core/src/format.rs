//! Diagnostic tree rendering.
//!
//! Renders host nodes as indented JSX-like markup:
//!
//! ```text
//! <View
//!   testID="root"
//! >
//!   <Text>
//!     Hello
//!   </Text>
//! </View>
//! ```
//!
//! Composite nodes are flattened away; text leaves under them are printed at
//! the level of the enclosing host node.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::a11y::flatten_style;
use crate::tree::{host_selves, Child, NodeRef, PropValue};

/// Prop filter applied before rendering.
pub type MapProps = Arc<dyn Fn(&Map<String, Value>) -> Map<String, Value> + Send + Sync>;

const INDENT: &str = "  ";

/// Props that always survive the default filter.
const KEPT_PROPS: &[&str] = &[
    "testID",
    "nativeID",
    "role",
    "accessibilityRole",
    "aria-label",
    "accessibilityLabel",
    "aria-labelledby",
    "accessibilityLabelledBy",
    "accessibilityHint",
    "accessibilityElementsHidden",
    "accessibilityViewIsModal",
    "importantForAccessibility",
    "aria-hidden",
    "aria-modal",
    "aria-busy",
    "aria-checked",
    "aria-disabled",
    "aria-expanded",
    "aria-selected",
    "aria-valuemax",
    "aria-valuemin",
    "aria-valuenow",
    "aria-valuetext",
    "placeholder",
    "value",
    "defaultValue",
    "title",
];

// ---------------------------------------------------------------------------
// Prop filtering
// ---------------------------------------------------------------------------

fn without_nulls(value: &Value) -> Option<Value> {
    let Value::Object(fields) = value else {
        return Some(value.clone());
    };
    let kept: Map<String, Value> = fields
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(Value::Object(kept))
    }
}

/// Keep identifiers, accessibility props and input values; reduce `style` to
/// `{"display": "none"}` when that is what it resolves to.
pub fn default_map_props(props: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in props {
        if KEPT_PROPS.contains(&key.as_str()) {
            out.insert(key.clone(), value.clone());
        }
    }
    for key in ["accessibilityState", "accessibilityValue"] {
        if let Some(cleaned) = props.get(key).and_then(without_nulls) {
            out.insert(key.to_owned(), cleaned);
        }
    }
    if let Some(style) = props.get("style") {
        if flatten_style(style).get("display") == Some(&Value::from("none")) {
            let mut hidden = Map::new();
            hidden.insert("display".to_owned(), Value::from("none"));
            out.insert("style".to_owned(), Value::Object(hidden));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Children of a host node as printed: composite levels expanded in place,
/// empty text leaves dropped.
fn rendered_children(node: &NodeRef) -> Vec<Child> {
    let mut result = Vec::new();
    let mut stack: Vec<Child> = node.children().into_iter().rev().collect();
    while let Some(child) = stack.pop() {
        match child {
            Child::Node(n) if !n.is_host() => stack.extend(n.children().into_iter().rev()),
            Child::Text(ref t) if t.is_empty() => {}
            other => result.push(other),
        }
    }
    result
}

fn data_props(node: &NodeRef) -> Map<String, Value> {
    node.props()
        .iter()
        .filter_map(|(k, v)| match v {
            PropValue::Data(data) if !data.is_null() => Some((k.clone(), data.clone())),
            _ => None,
        })
        .collect()
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(fields) => {
            let inner: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{k:?}: {}", format_value(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        other => other.to_string(),
    }
}

fn format_prop(key: &str, value: &Value) -> String {
    match value {
        Value::String(s) => format!("{key}={s:?}"),
        other => format!("{key}={{{}}}", format_value(other)),
    }
}

/// Render `nodes` (composites resolve to their host output) with `map_props`
/// (default: [`default_map_props`]).  Nodes are separated by newlines.
pub fn render_tree(nodes: &[NodeRef], map_props: Option<&MapProps>) -> String {
    enum Step {
        Open(NodeRef, usize),
        Close(String, usize),
        Text(String, usize),
    }

    let mut lines: Vec<String> = Vec::new();
    let mut stack: Vec<Step> = Vec::new();
    for node in nodes.iter().rev() {
        for host in host_selves(node).into_iter().rev() {
            stack.push(Step::Open(host, 0));
        }
    }

    while let Some(step) = stack.pop() {
        match step {
            Step::Text(text, depth) => lines.push(format!("{}{text}", INDENT.repeat(depth))),
            Step::Close(type_name, depth) => {
                lines.push(format!("{}</{type_name}>", INDENT.repeat(depth)))
            }
            Step::Open(node, depth) => {
                let pad = INDENT.repeat(depth);
                let raw = data_props(&node);
                let props = match map_props {
                    Some(f) => f(&raw),
                    None => default_map_props(&raw),
                };
                let children = rendered_children(&node);
                let type_name = node.type_name();

                if props.is_empty() {
                    lines.push(if children.is_empty() {
                        format!("{pad}<{type_name} />")
                    } else {
                        format!("{pad}<{type_name}>")
                    });
                } else {
                    lines.push(format!("{pad}<{type_name}"));
                    for (key, value) in &props {
                        lines.push(format!("{pad}{INDENT}{}", format_prop(key, value)));
                    }
                    lines.push(if children.is_empty() {
                        format!("{pad}/>")
                    } else {
                        format!("{pad}>")
                    });
                }

                if !children.is_empty() {
                    stack.push(Step::Close(type_name.to_owned(), depth));
                    for child in children.into_iter().rev() {
                        stack.push(match child {
                            Child::Node(n) => Step::Open(n, depth + 1),
                            Child::Text(t) => Step::Text(t, depth + 1),
                        });
                    }
                }
            }
        }
    }

    lines.join("\n")
}

/// Keep every data prop (handlers are never printed).
pub fn all_props() -> MapProps {
    Arc::new(|props: &Map<String, Value>| props.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
