//! JSON shape of an element tree.
//!
//! [`NodeSpec`] is the owned, serializable form of one node and its subtree.
//! It is what the renderer collaborator hands over (`Tree::from_json`) and
//! what [`crate::tree::Tree::to_json`] produces for host-only snapshots.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::{host_children, Child, NodeKind, NodeRef, PropValue, UiNode};

/// One node and its entire subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "is_host")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildSpec>,
}

/// A child entry: nested node, or a raw leaf.
///
/// Numbers render as their decimal text; booleans and `null` render nothing.
/// Any other value (including an object that is not a valid node) is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildSpec {
    Text(String),
    Number(Number),
    Node(NodeSpec),
    Empty(Option<bool>),
}

fn is_host(kind: &NodeKind) -> bool {
    *kind == NodeKind::Host
}

impl NodeSpec {
    /// Materialise a live node tree.
    pub fn build(&self) -> NodeRef {
        let mut builder = UiNode::builder(self.kind, self.type_name.clone());
        for (key, value) in &self.props {
            builder = builder.prop(key.clone(), value.clone());
        }
        for child in &self.children {
            builder = match child {
                ChildSpec::Text(text) => builder.text(text.clone()),
                ChildSpec::Number(number) => builder.text(number.to_string()),
                ChildSpec::Node(spec) => builder.child(spec.build()),
                ChildSpec::Empty(_) => builder,
            };
        }
        builder.build()
    }
}

/// Host-only JSON for `node`.  A composite yields the specs of the host
/// nodes it renders (zero, one or many); handler props are omitted.
pub fn to_specs(node: &NodeRef) -> Vec<NodeSpec> {
    if !node.is_host() {
        return host_children(node).iter().flat_map(to_specs).collect();
    }

    let props: Map<String, Value> = node
        .props()
        .iter()
        .filter_map(|(key, value)| match value {
            PropValue::Data(data) => Some((key.clone(), data.clone())),
            PropValue::Handler(_) => None,
        })
        .collect();

    let mut children = Vec::new();
    for child in node.children() {
        match child {
            Child::Text(text) => children.push(ChildSpec::Text(text)),
            Child::Node(child) => children.extend(to_specs(&child).into_iter().map(ChildSpec::Node)),
        }
    }

    vec![NodeSpec {
        type_name: node.type_name().to_owned(),
        kind: NodeKind::Host,
        props,
        children,
    }]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::text_content;

    #[test]
    fn test_build_from_json_leaves() {
        let spec: NodeSpec = serde_json::from_value(serde_json::json!({
            "type": "Text",
            "props": { "testID": "t" },
            "children": ["Count: ", 3, true, null]
        }))
        .unwrap();
        let node = spec.build();
        assert_eq!(node.type_name(), "Text");
        assert_eq!(node.prop_str("testID").as_deref(), Some("t"));
        assert_eq!(text_content(&node), "Count: 3");
    }

    #[test]
    fn test_malformed_child_object_is_rejected() {
        let err = crate::tree::Tree::from_json(
            r#"{"type": "View", "children": [{"typ": "Text", "props": {"testID": "lost"}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, crate::errors::QueryError::InvalidTree(_)));

        let bad_leaf = serde_json::from_value::<NodeSpec>(serde_json::json!({
            "type": "View",
            "children": [["nested", "array"]]
        }));
        assert!(bad_leaf.is_err());
    }

    #[test]
    fn test_composite_kind_parsed() {
        let spec: NodeSpec = serde_json::from_value(serde_json::json!({
            "type": "Card",
            "kind": "composite",
            "children": [{ "type": "View" }]
        }))
        .unwrap();
        assert_eq!(spec.kind, NodeKind::Composite);
        assert!(!spec.build().is_host());
    }

    #[test]
    fn test_to_specs_flattens_composites_and_drops_handlers() {
        let node = UiNode::composite("Card")
            .child(
                UiNode::host("View")
                    .prop("testID", "card")
                    .handler("onPress", |_| {})
                    .text("hi")
                    .build(),
            )
            .build();
        let specs = to_specs(&node);
        assert_eq!(specs.len(), 1);
        let json = serde_json::to_value(&specs[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "View", "props": { "testID": "card" }, "children": ["hi"] })
        );
    }
}
