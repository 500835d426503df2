//! Accessibility semantics derived from node props.
//!
//! Every property is read from layered props with a fixed precedence: the
//! dedicated `aria-*` alias first, then the legacy `accessibility*` prop or the
//! unified `accessibilityState` / `accessibilityValue` object, then a
//! property-specific default.
//!
//! | Property | Sources, in order | Default |
//! |----------|-------------------|---------|
//! | role | `role`, `accessibilityRole`, host-type table | `"none"` |
//! | name | label, labelled-by target, descendant names, type fallback | `None` |
//! | disabled | read-only input, `aria-disabled`, `accessibilityState.disabled`, disabled ancestor | `false` |
//! | selected / busy | `aria-*`, `accessibilityState.*` | `false` |
//! | checked | switch `value`, `aria-checked`, `accessibilityState.checked` | unchecked for checkable roles, else `None` |
//! | expanded | `aria-expanded`, `accessibilityState.expanded` | `None` |
//!
//! Descriptors are computed on demand and never stored on the node.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::HostComponentNames;
use crate::matcher::{TextMatch, TextMatchOptions};
use crate::tree::{container_of, find_all, host_parent, host_siblings, text_content, Child, NodeId, NodeRef, UiNode};

/// Per-pass memo of "is this node's subtree inaccessible", keyed by node identity.
pub type HiddenCache = HashMap<NodeId, bool>;

/// Roles for which a `checked` state is meaningful.
const ROLES_SUPPORTING_CHECKED: &[&str] = &["checkbox", "radio", "switch"];

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// Tri-state `checked` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckedState {
    Checked,
    Unchecked,
    Mixed,
}

impl CheckedState {
    /// `true` / `false` / `"mixed"`; anything else is not a checked value.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(CheckedState::Checked),
            Value::Bool(false) => Some(CheckedState::Unchecked),
            Value::String(s) if s == "mixed" => Some(CheckedState::Mixed),
            _ => None,
        }
    }
}

impl From<bool> for CheckedState {
    fn from(checked: bool) -> Self {
        if checked {
            CheckedState::Checked
        } else {
            CheckedState::Unchecked
        }
    }
}

impl fmt::Display for CheckedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckedState::Checked => "true",
            CheckedState::Unchecked => "false",
            CheckedState::Mixed => "mixed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AccessibilityState {
    pub disabled: bool,
    pub selected: bool,
    pub checked: Option<CheckedState>,
    pub busy: bool,
    pub expanded: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AccessibilityValue {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub now: Option<f64>,
    pub text: Option<String>,
}

/// Everything the model derives for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessibilityDescriptor {
    pub role: String,
    pub name: Option<String>,
    pub state: AccessibilityState,
    pub value: AccessibilityValue,
}

// ---------------------------------------------------------------------------
// Host kinds
// ---------------------------------------------------------------------------

fn is_host_type(node: &UiNode, type_name: &str) -> bool {
    node.is_host() && node.type_name() == type_name
}

pub fn is_host_text(node: &UiNode, hosts: &HostComponentNames) -> bool {
    is_host_type(node, &hosts.text)
}

pub fn is_host_text_input(node: &UiNode, hosts: &HostComponentNames) -> bool {
    is_host_type(node, &hosts.text_input)
}

pub fn is_host_image(node: &UiNode, hosts: &HostComponentNames) -> bool {
    is_host_type(node, &hosts.image)
}

pub fn is_host_switch(node: &UiNode, hosts: &HostComponentNames) -> bool {
    is_host_type(node, &hosts.switch)
}

pub fn is_host_modal(node: &UiNode, hosts: &HostComponentNames) -> bool {
    is_host_type(node, &hosts.modal)
}

// ---------------------------------------------------------------------------
// Prop helpers
// ---------------------------------------------------------------------------

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn prop_truthy(node: &UiNode, key: &str) -> bool {
    node.prop(key).as_ref().is_some_and(is_truthy)
}

fn non_empty_str(node: &UiNode, key: &str) -> Option<String> {
    node.prop_str(key).filter(|s| !s.is_empty())
}

/// Field of an object-valued prop (`accessibilityState.disabled`, ...).
fn object_field(node: &UiNode, prop: &str, field: &str) -> Option<Value> {
    match node.prop(prop)? {
        Value::Object(mut map) => map.remove(field).filter(|v| !v.is_null()),
        _ => None,
    }
}

fn bool_state(node: &UiNode, alias: &str, field: &str) -> Option<bool> {
    node.prop_bool(alias)
        .or_else(|| object_field(node, "accessibilityState", field).and_then(|v| v.as_bool()))
}

/// Flatten a style prop: nested arrays of fragments, last fragment wins per
/// field.  Non-object fragments (`null`, `false`) are ignored.
pub fn flatten_style(style: &Value) -> Map<String, Value> {
    let mut flat = Map::new();
    let mut stack = vec![style];
    while let Some(fragment) = stack.pop() {
        match fragment {
            Value::Array(items) => stack.extend(items.iter().rev()),
            Value::Object(fields) => {
                for (key, value) in fields {
                    flat.insert(key.clone(), value.clone());
                }
            }
            _ => {}
        }
    }
    flat
}

fn has_display_none(node: &UiNode) -> bool {
    node.prop("style")
        .map(|style| flatten_style(&style).get("display") == Some(&Value::from("none")))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Hidden-from-accessibility predicate
// ---------------------------------------------------------------------------

pub fn compute_aria_modal(node: &UiNode) -> Option<bool> {
    node.prop_bool("aria-modal")
        .or_else(|| node.prop_bool("accessibilityViewIsModal"))
}

/// Does `node` itself hide its whole subtree?
pub fn is_subtree_inaccessible(node: &NodeRef) -> bool {
    if prop_truthy(node, "aria-hidden") || prop_truthy(node, "accessibilityElementsHidden") {
        return true;
    }
    if node.prop_str("importantForAccessibility").as_deref() == Some("no-hide-descendants") {
        return true;
    }
    if has_display_none(node) {
        return true;
    }
    host_siblings(node)
        .iter()
        .any(|sibling| compute_aria_modal(sibling) == Some(true))
}

/// True when `node` or any host ancestor hides it from assistive technology.
///
/// Pass a cache to share subtree results across the nodes of one query pass.
pub fn is_hidden_from_accessibility(node: &NodeRef, mut cache: Option<&mut HiddenCache>) -> bool {
    let mut current = Some(Arc::clone(node));
    while let Some(candidate) = current {
        let cached = cache
            .as_deref()
            .and_then(|c| c.get(&candidate.id()).copied());
        let inaccessible = match cached {
            Some(value) => value,
            None => {
                let value = is_subtree_inaccessible(&candidate);
                if let Some(c) = cache.as_deref_mut() {
                    c.insert(candidate.id(), value);
                }
                value
            }
        };
        if inaccessible {
            return true;
        }
        current = host_parent(&candidate);
    }
    false
}

/// On-screen visibility: accessible, no `display: none` or `opacity: 0` in
/// the flattened style, and not a closed host modal, for `node` and every
/// host ancestor.
pub fn is_element_visible(node: &NodeRef, hosts: &HostComponentNames, cache: Option<&mut HiddenCache>) -> bool {
    if is_hidden_from_accessibility(node, cache) {
        return false;
    }
    let mut current = Some(Arc::clone(node));
    while let Some(candidate) = current {
        if is_hidden_for_styles(&candidate) {
            return false;
        }
        if is_host_modal(&candidate, hosts) && candidate.prop_bool("visible") == Some(false) {
            return false;
        }
        current = host_parent(&candidate);
    }
    true
}

fn is_hidden_for_styles(node: &UiNode) -> bool {
    let Some(style) = node.prop("style") else {
        return false;
    };
    let flat = flatten_style(&style);
    flat.get("display") == Some(&Value::from("none"))
        || flat.get("opacity").and_then(Value::as_f64) == Some(0.0)
}

/// Is `node` a standalone element for assistive technology?
pub fn is_accessibility_element(node: &UiNode, hosts: &HostComponentNames) -> bool {
    if is_host_image(node, hosts) && node.prop("alt").is_some() {
        return true;
    }
    if let Some(accessible) = node.prop_bool("accessible") {
        return accessible;
    }
    is_host_text(node, hosts) || is_host_text_input(node, hosts) || is_host_switch(node, hosts)
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Resolve role synonyms to one spelling.
pub fn normalize_role(role: &str) -> &str {
    match role {
        "image" => "img",
        "presentation" => "none",
        other => other,
    }
}

pub fn compute_role(node: &UiNode, hosts: &HostComponentNames) -> String {
    if let Some(explicit) = non_empty_str(node, "role").or_else(|| non_empty_str(node, "accessibilityRole")) {
        return normalize_role(&explicit).to_owned();
    }
    if is_host_text(node, hosts) {
        return "text".to_owned();
    }
    if is_host_switch(node, hosts) {
        return "switch".to_owned();
    }
    "none".to_owned()
}

// ---------------------------------------------------------------------------
// Accessible name
// ---------------------------------------------------------------------------

pub fn explicit_label(node: &UiNode) -> Option<String> {
    non_empty_str(node, "aria-label").or_else(|| non_empty_str(node, "accessibilityLabel"))
}

pub fn labelled_by_ids(node: &UiNode) -> Vec<String> {
    let raw = node
        .prop("aria-labelledby")
        .or_else(|| node.prop("accessibilityLabelledBy"));
    match raw {
        Some(Value::String(id)) if !id.is_empty() => vec![id],
        Some(Value::Array(ids)) => ids
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .filter(|id| !id.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// First host node in document order whose `nativeID` equals `id`, searched
/// across the whole tree, hidden nodes included.
pub fn find_by_native_id(anchor: &NodeRef, id: &str) -> Option<NodeRef> {
    let root = container_of(anchor);
    find_all(&root, |n| n.prop_str("nativeID").as_deref() == Some(id), false)
        .into_iter()
        .next()
}

/// Text of the node(s) referenced through the labelled-by relation.
pub fn labelled_by_text(node: &NodeRef) -> Option<String> {
    let parts: Vec<String> = labelled_by_ids(node)
        .iter()
        .filter_map(|id| find_by_native_id(node, id))
        .map(|target| {
            let text = text_content(&target);
            if text.trim().is_empty() {
                explicit_label(&target).unwrap_or_default()
            } else {
                text
            }
        })
        .filter(|text| !text.trim().is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Name contributed by a node's content: text content for host text,
/// otherwise the space-joined contributions of its children.
///
/// A child contributes nothing when its subtree is hidden; a child with its
/// own label (or labelled-by target) contributes that label and is not
/// descended into.
pub fn aggregate_name(node: &NodeRef, hosts: &HostComponentNames) -> String {
    if is_host_text(node, hosts) {
        return text_content(node);
    }

    enum Step {
        Enter(NodeRef),
        Leaf(String),
        Join(usize),
    }

    let mut values: Vec<String> = Vec::new();
    let mut stack = vec![Step::Join(0)];
    push_children(&mut stack, node);

    fn push_children(stack: &mut Vec<Step>, node: &UiNode) {
        for child in node.children().into_iter().rev() {
            stack.push(match child {
                Child::Node(n) => Step::Enter(n),
                Child::Text(t) => Step::Leaf(t),
            });
        }
    }

    while let Some(step) = stack.pop() {
        match step {
            Step::Leaf(text) => values.push(text.trim().to_owned()),
            Step::Enter(child) => {
                if child.is_host() && is_subtree_inaccessible(&child) {
                    values.push(String::new());
                } else if let Some(label) = explicit_label(&child).or_else(|| labelled_by_text(&child)) {
                    values.push(label);
                } else if is_host_text(&child, hosts) {
                    values.push(text_content(&child).trim().to_owned());
                } else {
                    stack.push(Step::Join(values.len()));
                    push_children(&mut stack, &child);
                }
            }
            Step::Join(base) => {
                let joined = values
                    .drain(base..)
                    .filter(|v| !v.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                values.push(joined);
            }
        }
    }

    values.pop().unwrap_or_default()
}

/// Type-specific fallback name used only for the query target itself.
fn fallback_name(node: &UiNode, hosts: &HostComponentNames) -> Option<String> {
    if is_host_text_input(node, hosts) {
        return non_empty_str(node, "placeholder");
    }
    if is_host_image(node, hosts) {
        return non_empty_str(node, "alt");
    }
    None
}

/// Accessible name of `node`: explicit label, labelled-by target text,
/// descendant names, then type-specific fallback.
pub fn compute_name(node: &NodeRef, hosts: &HostComponentNames) -> Option<String> {
    if let Some(label) = explicit_label(node) {
        return Some(label);
    }
    if let Some(label) = labelled_by_text(node) {
        return Some(label);
    }
    let aggregated = aggregate_name(node, hosts);
    if !aggregated.trim().is_empty() {
        return Some(aggregated);
    }
    fallback_name(node, hosts)
}

// ---------------------------------------------------------------------------
// State and value
// ---------------------------------------------------------------------------

fn own_disabled(node: &UiNode) -> Option<bool> {
    bool_state(node, "aria-disabled", "disabled")
}

pub fn compute_disabled(node: &NodeRef, hosts: &HostComponentNames) -> bool {
    // A read-only input is disabled whatever its own flags say.
    if is_host_text_input(node, hosts) && node.prop_bool("editable") == Some(false) {
        return true;
    }
    if let Some(disabled) = own_disabled(node) {
        return disabled;
    }
    let mut ancestor = host_parent(node);
    while let Some(current) = ancestor {
        if own_disabled(&current) == Some(true) {
            return true;
        }
        ancestor = host_parent(&current);
    }
    false
}

pub fn compute_selected(node: &UiNode) -> bool {
    bool_state(node, "aria-selected", "selected").unwrap_or(false)
}

pub fn compute_busy(node: &UiNode) -> bool {
    bool_state(node, "aria-busy", "busy").unwrap_or(false)
}

pub fn compute_expanded(node: &UiNode) -> Option<bool> {
    bool_state(node, "aria-expanded", "expanded")
}

pub fn compute_checked(node: &UiNode, hosts: &HostComponentNames) -> Option<CheckedState> {
    if is_host_switch(node, hosts) {
        return Some(node.prop_bool("value").unwrap_or(false).into());
    }
    let role = compute_role(node, hosts);
    if !ROLES_SUPPORTING_CHECKED.contains(&role.as_str()) {
        return None;
    }
    node.prop("aria-checked")
        .as_ref()
        .and_then(CheckedState::from_value)
        .or_else(|| {
            object_field(node, "accessibilityState", "checked")
                .as_ref()
                .and_then(CheckedState::from_value)
        })
        .or(Some(CheckedState::Unchecked))
}

pub fn compute_state(node: &NodeRef, hosts: &HostComponentNames) -> AccessibilityState {
    AccessibilityState {
        disabled: compute_disabled(node, hosts),
        selected: compute_selected(node),
        checked: compute_checked(node, hosts),
        busy: compute_busy(node),
        expanded: compute_expanded(node),
    }
}

pub fn compute_value(node: &UiNode) -> AccessibilityValue {
    let number = |alias: &str, field: &str| {
        node.prop(alias)
            .and_then(|v| v.as_f64())
            .or_else(|| object_field(node, "accessibilityValue", field).and_then(|v| v.as_f64()))
    };
    let text = node.prop_str("aria-valuetext").or_else(|| {
        object_field(node, "accessibilityValue", "text").and_then(|v| v.as_str().map(str::to_owned))
    });
    AccessibilityValue {
        min: number("aria-valuemin", "min"),
        max: number("aria-valuemax", "max"),
        now: number("aria-valuenow", "now"),
        text,
    }
}

pub fn describe(node: &NodeRef, hosts: &HostComponentNames) -> AccessibilityDescriptor {
    AccessibilityDescriptor {
        role: compute_role(node, hosts),
        name: compute_name(node, hosts),
        state: compute_state(node, hosts),
        value: compute_value(node),
    }
}

// ---------------------------------------------------------------------------
// State / value matchers
// ---------------------------------------------------------------------------

/// Expected state; `None` fields are not checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMatcher {
    pub disabled: Option<bool>,
    pub selected: Option<bool>,
    pub checked: Option<CheckedState>,
    pub busy: Option<bool>,
    pub expanded: Option<bool>,
}

impl StateMatcher {
    pub fn is_empty(&self) -> bool {
        *self == StateMatcher::default()
    }

    pub fn matches(&self, state: &AccessibilityState) -> bool {
        self.disabled.map_or(true, |v| v == state.disabled)
            && self.selected.map_or(true, |v| v == state.selected)
            && self.checked.map_or(true, |v| Some(v) == state.checked)
            && self.busy.map_or(true, |v| v == state.busy)
            && self.expanded.map_or(true, |v| Some(v) == state.expanded)
    }

    /// `disabled state: true`, ... for each expected field.
    pub fn describe_parts(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(v) = self.disabled {
            parts.push(format!("disabled state: {v}"));
        }
        if let Some(v) = self.selected {
            parts.push(format!("selected state: {v}"));
        }
        if let Some(v) = self.checked {
            parts.push(format!("checked state: {v}"));
        }
        if let Some(v) = self.busy {
            parts.push(format!("busy state: {v}"));
        }
        if let Some(v) = self.expanded {
            parts.push(format!("expanded state: {v}"));
        }
        parts
    }
}

/// Expected value; `None` fields are not checked.
#[derive(Debug, Clone, Default)]
pub struct ValueMatcher {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub now: Option<f64>,
    pub text: Option<TextMatch>,
}

impl ValueMatcher {
    pub fn matches(&self, node: &UiNode, value: &AccessibilityValue) -> bool {
        let number = |expected: Option<f64>, actual: Option<f64>| {
            expected.map_or(true, |e| actual == Some(e))
        };
        number(self.min, value.min)
            && number(self.max, value.max)
            && number(self.now, value.now)
            && self.text.as_ref().map_or(true, |t| {
                t.matches(node, value.text.as_deref(), &TextMatchOptions::default())
            })
    }

    pub fn describe_parts(&self) -> Vec<String> {
        let mut parts = Vec::new();
        for (key, v) in [("min", self.min), ("max", self.max), ("now", self.now)] {
            if let Some(v) = v {
                parts.push(format!("{key} value: {v}"));
            }
        }
        if let Some(t) = &self.text {
            parts.push(format!("text value: {t}"));
        }
        parts
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
