//! Uniform view over renderer-produced element trees.
//!
//! [`UiNode`] is the live node type.  Nodes are shared as [`NodeRef`]
//! (`Arc<UiNode>`) and keep a *weak* back-reference to their parent, so the
//! parent relation never owns anything and cannot form reference cycles.
//! Props, children and the parent pointer sit behind `parking_lot` locks:
//! the renderer mutates them, the query engine only ever reads.
//!
//! All walks in this module use an explicit stack instead of recursion.
//!
//! # Host vs. composite
//!
//! A *host* node is a primitive renderable unit (`View`, `Text`, ...).  A
//! *composite* node is a user component wrapping a subtree.  Queries only
//! ever return host nodes; composites are flattened away by
//! [`host_children`] and [`host_descendants`].

pub mod element;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::errors::{QueryError, Result};

pub use element::{ChildSpec, NodeSpec};

/// Shared handle to a live node.
pub type NodeRef = Arc<UiNode>;

/// Function-typed prop (`onPress`, `onChangeText`, ...).
pub type EventHandler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Props keyed by name.  Sorted so diagnostic output is stable.
pub type Props = BTreeMap<String, PropValue>;

/// Type name of the composite node every [`Tree`] mounts its content under.
pub const CONTAINER_TYPE: &str = "Container";

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// Process-unique node identity, used as a cache key during a query pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Host,
    Composite,
}

/// A single prop value: plain data or an event handler.
#[derive(Clone)]
pub enum PropValue {
    Data(Value),
    Handler(EventHandler),
}

impl PropValue {
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            PropValue::Data(value) => Some(value),
            PropValue::Handler(_) => None,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Data(value) => write!(f, "{value}"),
            PropValue::Handler(_) => f.write_str("[Function]"),
        }
    }
}

/// One entry of a node's ordered child list.
#[derive(Debug, Clone)]
pub enum Child {
    Node(NodeRef),
    Text(String),
}

/// A node in the rendered tree.
pub struct UiNode {
    id: NodeId,
    kind: NodeKind,
    type_name: String,
    props: RwLock<Props>,
    children: RwLock<Vec<Child>>,
    parent: RwLock<Weak<UiNode>>,
}

impl fmt::Debug for UiNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Builder for a node and its initial children.
#[derive(Debug)]
pub struct NodeBuilder {
    kind: NodeKind,
    type_name: String,
    props: Props,
    children: Vec<Child>,
}

impl NodeBuilder {
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), PropValue::Data(value.into()));
        self
    }

    pub fn handler<F>(mut self, key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.props
            .insert(key.into(), PropValue::Handler(Arc::new(handler)));
        self
    }

    pub fn child(mut self, node: NodeRef) -> Self {
        self.children.push(Child::Node(node));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Child::Text(text.into()));
        self
    }

    pub fn build(self) -> NodeRef {
        let node = Arc::new(UiNode {
            id: NodeId::next(),
            kind: self.kind,
            type_name: self.type_name,
            props: RwLock::new(self.props),
            children: RwLock::new(Vec::new()),
            parent: RwLock::new(Weak::new()),
        });
        for child in self.children {
            node.push_child(child);
        }
        node
    }
}

impl UiNode {
    pub fn host(type_name: impl Into<String>) -> NodeBuilder {
        Self::builder(NodeKind::Host, type_name)
    }

    pub fn composite(type_name: impl Into<String>) -> NodeBuilder {
        Self::builder(NodeKind::Composite, type_name)
    }

    pub fn builder(kind: NodeKind, type_name: impl Into<String>) -> NodeBuilder {
        NodeBuilder {
            kind,
            type_name: type_name.into(),
            props: Props::new(),
            children: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_host(&self) -> bool {
        self.kind == NodeKind::Host
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn props(&self) -> RwLockReadGuard<'_, Props> {
        self.props.read()
    }

    /// Data prop by name.  Handler props and absent props yield `None`, as
    /// does an explicit JSON `null` (treated as "not set").
    pub fn prop(&self, key: &str) -> Option<Value> {
        match self.props.read().get(key) {
            Some(PropValue::Data(Value::Null)) | None => None,
            Some(PropValue::Data(value)) => Some(value.clone()),
            Some(PropValue::Handler(_)) => None,
        }
    }

    pub fn prop_str(&self, key: &str) -> Option<String> {
        match self.prop(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn prop_bool(&self, key: &str) -> Option<bool> {
        self.prop(key)?.as_bool()
    }

    pub fn handler(&self, key: &str) -> Option<EventHandler> {
        match self.props.read().get(key) {
            Some(PropValue::Handler(handler)) => Some(Arc::clone(handler)),
            _ => None,
        }
    }

    /// Ordered children, text leaves included.
    pub fn children(&self) -> Vec<Child> {
        self.children.read().clone()
    }

    /// Ordered child nodes, text leaves skipped.
    pub fn child_nodes(&self) -> Vec<NodeRef> {
        self.children
            .read()
            .iter()
            .filter_map(|child| match child {
                Child::Node(node) => Some(Arc::clone(node)),
                Child::Text(_) => None,
            })
            .collect()
    }

    /// Parent node, or `None` past the root (or once detached).
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.read().upgrade()
    }

    // -----------------------------------------------------------------------
    // Renderer-side mutation
    // -----------------------------------------------------------------------

    pub fn set_prop(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.props
            .write()
            .insert(key.into(), PropValue::Data(value.into()));
    }

    pub fn set_handler<F>(&self, key: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.props
            .write()
            .insert(key.into(), PropValue::Handler(Arc::new(handler)));
    }

    pub fn remove_prop(&self, key: &str) -> Option<PropValue> {
        self.props.write().remove(key)
    }

    pub fn append_child(self: &Arc<Self>, child: NodeRef) {
        self.push_child(Child::Node(child));
    }

    pub fn append_text(self: &Arc<Self>, text: impl Into<String>) {
        self.push_child(Child::Text(text.into()));
    }

    /// Detach `child` from this node.  Returns `false` when it was not a child.
    pub fn remove_child(&self, child: &NodeRef) -> bool {
        let mut children = self.children.write();
        let before = children.len();
        children.retain(|c| !matches!(c, Child::Node(n) if Arc::ptr_eq(n, child)));
        let removed = children.len() != before;
        if removed {
            *child.parent.write() = Weak::new();
        }
        removed
    }

    /// Drop every child (nodes and text).
    pub fn clear_children(&self) {
        let old = std::mem::take(&mut *self.children.write());
        for child in old {
            if let Child::Node(node) = child {
                *node.parent.write() = Weak::new();
            }
        }
    }

    fn push_child(self: &Arc<Self>, child: Child) {
        if let Child::Node(node) = &child {
            *node.parent.write() = Arc::downgrade(self);
        }
        self.children.write().push(child);
    }
}

// ---------------------------------------------------------------------------
// Traversal primitives
// ---------------------------------------------------------------------------

/// Nearest host ancestor, skipping composite wrapper levels.
pub fn host_parent(node: &UiNode) -> Option<NodeRef> {
    let mut current = node.parent();
    while let Some(candidate) = current {
        if candidate.is_host() {
            return Some(candidate);
        }
        current = candidate.parent();
    }
    None
}

/// Host nodes directly rendered by `node`: host children as-is, composite
/// children replaced by the host nodes they ultimately render.
pub fn host_children(node: &UiNode) -> Vec<NodeRef> {
    let mut result = Vec::new();
    let mut stack: Vec<NodeRef> = node.child_nodes().into_iter().rev().collect();
    while let Some(current) = stack.pop() {
        if current.is_host() {
            result.push(current);
        } else {
            stack.extend(current.child_nodes().into_iter().rev());
        }
    }
    result
}

/// Host nodes that represent `node`: itself when host, else its host children.
pub fn host_selves(node: &NodeRef) -> Vec<NodeRef> {
    if node.is_host() {
        vec![Arc::clone(node)]
    } else {
        host_children(node)
    }
}

/// Host siblings of `node` within its host parent (or the tree root level).
pub fn host_siblings(node: &NodeRef) -> Vec<NodeRef> {
    let parent = match host_parent(node) {
        Some(parent) => parent,
        None => {
            let root = container_of(node);
            if Arc::ptr_eq(&root, node) {
                return Vec::new();
            }
            root
        }
    };
    let selves = host_selves(node);
    host_children(&parent)
        .into_iter()
        .filter(|sibling| !selves.iter().any(|s| Arc::ptr_eq(s, sibling)))
        .collect()
}

/// All host descendants of `node` in document (pre-)order, `node` excluded.
pub fn host_descendants(node: &UiNode) -> Vec<NodeRef> {
    let mut result = Vec::new();
    let mut stack: Vec<NodeRef> = node.child_nodes().into_iter().rev().collect();
    while let Some(current) = stack.pop() {
        if current.is_host() {
            result.push(Arc::clone(&current));
        }
        stack.extend(current.child_nodes().into_iter().rev());
    }
    result
}

/// Topmost ancestor of `node` (the tree container while mounted).
pub fn container_of(node: &NodeRef) -> NodeRef {
    let mut current = Arc::clone(node);
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current
}

/// Concatenation of every text leaf under `node`, in order, no separators.
pub fn text_content(node: &UiNode) -> String {
    let mut out = String::new();
    let mut stack: Vec<Child> = node.children().into_iter().rev().collect();
    while let Some(child) = stack.pop() {
        match child {
            Child::Text(text) => out.push_str(&text),
            Child::Node(n) => stack.extend(n.children().into_iter().rev()),
        }
    }
    out
}

/// Resolve a text leaf owned by `owner` to the innermost enclosing host node
/// of type `text_type` (`owner` itself included).
pub fn nearest_text_container(owner: &NodeRef, text_type: &str) -> Option<NodeRef> {
    let mut current = Some(Arc::clone(owner));
    while let Some(node) = current {
        if node.is_host() && node.type_name() == text_type {
            return Some(node);
        }
        current = node.parent();
    }
    None
}

/// Every text leaf under `root` with the node whose child list holds it.
pub fn text_leaves(root: &NodeRef) -> Vec<(NodeRef, String)> {
    let mut result = Vec::new();
    let mut stack = vec![Arc::clone(root)];
    while let Some(node) = stack.pop() {
        let children = node.children();
        for child in children.iter() {
            if let Child::Text(text) = child {
                result.push((Arc::clone(&node), text.clone()));
            }
        }
        stack.extend(children.into_iter().rev().filter_map(|c| match c {
            Child::Node(n) => Some(n),
            Child::Text(_) => None,
        }));
    }
    result
}

/// Host nodes under `root` (itself included) satisfying `predicate`, in
/// document order.
///
/// With `deepest_only`, a matching node is dropped when any of its
/// descendants also matched.
pub fn find_all<P>(root: &NodeRef, mut predicate: P, deepest_only: bool) -> Vec<NodeRef>
where
    P: FnMut(&NodeRef) -> bool,
{
    enum Step {
        Enter(NodeRef),
        Exit(NodeRef, usize),
    }

    let mut results: Vec<NodeRef> = Vec::new();
    let mut stack = vec![Step::Enter(Arc::clone(root))];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(node) => {
                let mark = results.len();
                let children = node.child_nodes();
                stack.push(Step::Exit(node, mark));
                stack.extend(children.into_iter().rev().map(Step::Enter));
            }
            Step::Exit(node, mark) => {
                if !node.is_host() || (deepest_only && results.len() > mark) {
                    continue;
                }
                if predicate(&node) {
                    // Insert ahead of its descendants to keep pre-order.
                    results.insert(mark, node);
                }
            }
        }
    }

    results
}

// ---------------------------------------------------------------------------
// Tree container
// ---------------------------------------------------------------------------

/// A mounted tree: container node, flush boundary and detachment signal.
pub struct Tree {
    container: NodeRef,
    flush: RwLock<()>,
    detached: watch::Sender<bool>,
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("container", &self.container)
            .field("detached", &self.is_detached())
            .finish()
    }
}

impl Tree {
    /// Mount `root` under a fresh container.
    pub fn mount(root: NodeRef) -> Arc<Tree> {
        let container = UiNode::composite(CONTAINER_TYPE).child(root).build();
        Self::with_container(container)
    }

    /// Mount several top-level nodes under a fresh container.
    pub fn mount_all(roots: impl IntoIterator<Item = NodeRef>) -> Arc<Tree> {
        let container = roots
            .into_iter()
            .fold(UiNode::composite(CONTAINER_TYPE), |builder, root| {
                builder.child(root)
            })
            .build();
        Self::with_container(container)
    }

    fn with_container(container: NodeRef) -> Arc<Tree> {
        let (detached, _) = watch::channel(false);
        Arc::new(Tree {
            container,
            flush: RwLock::new(()),
            detached,
        })
    }

    /// Parse a JSON [`NodeSpec`] (or array of them) and mount it.
    pub fn from_json(json: &str) -> Result<Arc<Tree>> {
        let value: Value = serde_json::from_str(json)?;
        let specs: Vec<NodeSpec> = match value {
            Value::Array(_) => serde_json::from_value(value)?,
            other => vec![serde_json::from_value(other)?],
        };
        Ok(Self::mount_all(specs.iter().map(NodeSpec::build)))
    }

    pub fn container(&self) -> &NodeRef {
        &self.container
    }

    /// First host node rendered at the top level.
    pub fn root(&self) -> Option<NodeRef> {
        host_children(&self.container).into_iter().next()
    }

    /// Apply renderer mutations as one flush.  Queries never observe a
    /// half-applied batch.
    pub fn batch<R>(&self, f: impl FnOnce(&NodeRef) -> R) -> R {
        let _flush = self.flush.write();
        f(&self.container)
    }

    /// Read side of the flush boundary, held for one query pass.
    pub(crate) fn read_pass(&self) -> RwLockReadGuard<'_, ()> {
        self.flush.read()
    }

    /// Tear the tree down and wake every pending retry session.
    pub fn unmount(&self) {
        {
            let _flush = self.flush.write();
            self.container.clear_children();
        }
        self.detached.send_replace(true);
        log::debug!("tree unmounted");
    }

    pub fn is_detached(&self) -> bool {
        *self.detached.borrow()
    }

    pub fn subscribe_detached(&self) -> watch::Receiver<bool> {
        self.detached.subscribe()
    }

    /// Host-only JSON view of the whole tree.
    pub fn to_json(&self) -> Vec<NodeSpec> {
        let _pass = self.read_pass();
        host_children(&self.container)
            .iter()
            .flat_map(|node| element::to_specs(node))
            .collect()
    }

    /// Check that every raw text leaf sits inside a host node of type
    /// `text_type`.
    pub fn validate_text_leaves(&self, text_type: &str) -> Result<()> {
        let _pass = self.read_pass();
        for (owner, text) in text_leaves(&self.container) {
            if nearest_text_container(&owner, text_type).is_none() {
                let within = host_selves(&owner)
                    .first()
                    .map(|n| n.type_name().to_owned())
                    .unwrap_or_else(|| owner.type_name().to_owned());
                return Err(QueryError::InvalidTree(format!(
                    "Invariant Violation: Text strings must be rendered within a <{text_type}> \
                     component. Detected attempt to render \"{text}\" string within a <{within}> \
                     component."
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn text(label: &str) -> NodeRef {
        UiNode::host("Text").text(label).build()
    }

    #[test]
    fn test_parent_past_root_is_none() {
        let root = UiNode::host("View").build();
        assert!(root.parent().is_none());
        let tree = Tree::mount(Arc::clone(&root));
        let container = root.parent().unwrap();
        assert!(Arc::ptr_eq(&container, tree.container()));
        assert!(container.parent().is_none());
        assert!(host_parent(&root).is_none());
    }

    #[test]
    fn test_host_children_flatten_composites_in_order() {
        let a = text("a");
        let b = text("b");
        let c = text("c");
        let wrapper = UiNode::composite("Row")
            .child(Arc::clone(&b))
            .child(Arc::clone(&c))
            .build();
        let empty = UiNode::composite("Nothing").build();
        let root = UiNode::host("View")
            .child(Arc::clone(&a))
            .child(wrapper)
            .child(empty)
            .build();

        let children = host_children(&root);
        assert_eq!(children.len(), 3);
        assert!(Arc::ptr_eq(&children[0], &a));
        assert!(Arc::ptr_eq(&children[1], &b));
        assert!(Arc::ptr_eq(&children[2], &c));
        assert!(Arc::ptr_eq(&host_parent(&b).unwrap(), &root));
    }

    #[test]
    fn test_host_siblings_exclude_self() {
        let a = text("a");
        let b = text("b");
        let root = UiNode::host("View")
            .child(Arc::clone(&a))
            .child(Arc::clone(&b))
            .build();
        let siblings = host_siblings(&a);
        assert_eq!(siblings.len(), 1);
        assert!(Arc::ptr_eq(&siblings[0], &b));
        assert!(host_siblings(&root).is_empty());
    }

    #[test]
    fn test_host_descendants_pre_order() {
        let inner = text("inner");
        let mid = UiNode::host("View").child(Arc::clone(&inner)).build();
        let last = text("last");
        let root = UiNode::host("View")
            .child(Arc::clone(&mid))
            .child(Arc::clone(&last))
            .build();
        let ids: Vec<NodeId> = host_descendants(&root).iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec![mid.id(), inner.id(), last.id()]);
    }

    #[test]
    fn test_text_content_concatenates_without_separator() {
        let nested = UiNode::host("Text")
            .text("Hello ")
            .child(UiNode::host("Text").text("World").build())
            .text("!")
            .build();
        assert_eq!(text_content(&nested), "Hello World!");

        let adjacent = UiNode::host("Text").text("a").text("b").build();
        assert_eq!(text_content(&adjacent), "ab");
    }

    #[test]
    fn test_nearest_text_container_prefers_innermost() {
        let inner = UiNode::host("Text").text("leaf").build();
        let outer = UiNode::host("Text").child(Arc::clone(&inner)).build();
        let _view = UiNode::host("View").child(Arc::clone(&outer)).build();
        let found = nearest_text_container(&inner, "Text").unwrap();
        assert!(Arc::ptr_eq(&found, &inner));
    }

    #[test]
    fn test_nearest_text_container_climbs_through_composites() {
        let label = UiNode::composite("Label").text("leaf").build();
        let text_node = UiNode::host("Text").child(Arc::clone(&label)).build();
        let found = nearest_text_container(&label, "Text").unwrap();
        assert!(Arc::ptr_eq(&found, &text_node));
    }

    #[test]
    fn test_find_all_deepest_only() {
        let inner = UiNode::host("Text").text("World").build();
        let outer = UiNode::host("Text")
            .text("Hello ")
            .child(Arc::clone(&inner))
            .build();
        let root = UiNode::host("View").child(Arc::clone(&outer)).build();

        let all = find_all(&root, |n| n.type_name() == "Text", false);
        assert_eq!(all.len(), 2);
        assert!(Arc::ptr_eq(&all[0], &outer));
        assert!(Arc::ptr_eq(&all[1], &inner));

        let deepest = find_all(&root, |n| n.type_name() == "Text", true);
        assert_eq!(deepest.len(), 1);
        assert!(Arc::ptr_eq(&deepest[0], &inner));
    }

    #[test]
    fn test_find_all_includes_root_and_skips_composites() {
        let root = UiNode::host("View")
            .child(UiNode::composite("View").build())
            .build();
        let found = find_all(&root, |n| n.type_name() == "View", false);
        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(&found[0], &root));
    }

    #[test]
    fn test_remove_child_clears_parent() {
        let child = text("x");
        let root = UiNode::host("View").child(Arc::clone(&child)).build();
        assert!(root.remove_child(&child));
        assert!(child.parent().is_none());
        assert!(!root.remove_child(&child));
    }

    #[test]
    fn test_handler_props_are_not_data() {
        let node = UiNode::host("View")
            .prop("testID", "btn")
            .handler("onPress", |_| {})
            .build();
        assert_eq!(node.prop_str("testID").as_deref(), Some("btn"));
        assert!(node.prop("onPress").is_none());
        assert!(node.handler("onPress").is_some());
    }

    #[test]
    fn test_unmount_signals_detached() {
        let tree = Tree::mount(text("x"));
        let rx = tree.subscribe_detached();
        assert!(!tree.is_detached());
        tree.unmount();
        assert!(tree.is_detached());
        assert!(*rx.borrow());
        assert!(tree.root().is_none());
    }

    #[test]
    fn test_validate_text_leaves() {
        let ok = Tree::mount(UiNode::host("View").child(text("fine")).build());
        assert!(ok.validate_text_leaves("Text").is_ok());

        let bad = Tree::mount(UiNode::host("View").text("loose").build());
        let err = bad.validate_text_leaves("Text").unwrap_err();
        assert!(err.to_string().contains("\"loose\" string within a <View>"));
    }
}
