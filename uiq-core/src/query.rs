//! Cardinality-bound queries over a mounted [`Tree`].
//!
//! Every query form is derived from a single [`Queries::query_all`]:
//!
//! | Form | 0 matches | 1 match | >1 matches |
//! |------|-----------|---------|------------|
//! | `query_single` | `None` | node | `AmbiguousMatch` |
//! | `get_single` | `NotFound` + snapshot | node | `AmbiguousMatch` |
//! | `get_all_required` | `NotFound` + snapshot | list | list |
//! | `query_all_optional` | `[]` | list | list |
//! | `find_single` / `find_all_required` | retried via [`crate::wait::wait_for`] | | |
//!
//! Results are live node references in document order.  Nodes hidden from
//! accessibility are dropped unless hidden elements are included (per call,
//! else the configured default).

use std::fmt;
use std::sync::Arc;

use crate::a11y::{
    compute_name, compute_role, compute_state, compute_value, explicit_label, find_by_native_id,
    is_accessibility_element, is_hidden_from_accessibility, is_host_image, is_host_text,
    is_host_text_input, normalize_role, HiddenCache, StateMatcher, ValueMatcher,
};
use crate::config::{self, Config, HostComponentNames};
use crate::errors::{QueryError, Result, DETACHED_NOTICE};
use crate::format::{render_tree, MapProps};
use crate::matcher::{Normalizer, TextMatch, TextMatchOptions};
use crate::tree::{find_all, text_content, NodeRef, Tree, UiNode};
use crate::wait::{wait_for, Clock, RealClock, WaitForOptions};

/// Arbitrary node predicate.
pub type NodePredicate = Arc<dyn Fn(&UiNode) -> bool + Send + Sync>;

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// Role criterion with optional name, state and value constraints.
#[derive(Debug, Clone)]
pub struct RoleQuery {
    pub role: TextMatch,
    pub name: Option<TextMatch>,
    pub state: StateMatcher,
    pub value: ValueMatcher,
}

impl RoleQuery {
    pub fn new(role: impl Into<TextMatch>) -> Self {
        RoleQuery {
            role: role.into(),
            name: None,
            state: StateMatcher::default(),
            value: ValueMatcher::default(),
        }
    }

    pub fn name(mut self, name: impl Into<TextMatch>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn state(mut self, state: StateMatcher) -> Self {
        self.state = state;
        self
    }

    pub fn value(mut self, value: ValueMatcher) -> Self {
        self.value = value;
        self
    }
}

impl fmt::Display for RoleQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![format!("role: {}", self.role)];
        if let Some(name) = &self.name {
            parts.push(format!("name: {name}"));
        }
        parts.extend(self.state.describe_parts());
        parts.extend(self.value.describe_parts());
        f.write_str(&parts.join(", "))
    }
}

/// What a query looks for.
#[derive(Clone)]
pub enum By {
    /// Host text nodes by text content; only the deepest matching node.
    Text(TextMatch),
    TestId(TextMatch),
    /// Explicit label, or the text of a labelled-by target.
    LabelText(TextMatch),
    HintText(TextMatch),
    PlaceholderText(TextMatch),
    /// Host text inputs by `value`, falling back to `defaultValue`.
    DisplayValue(TextMatch),
    AltText(TextMatch),
    Role(RoleQuery),
    State(StateMatcher),
    Value(ValueMatcher),
    Predicate(NodePredicate, String),
}

impl By {
    pub fn text(m: impl Into<TextMatch>) -> Self {
        By::Text(m.into())
    }

    pub fn test_id(m: impl Into<TextMatch>) -> Self {
        By::TestId(m.into())
    }

    pub fn label_text(m: impl Into<TextMatch>) -> Self {
        By::LabelText(m.into())
    }

    pub fn hint_text(m: impl Into<TextMatch>) -> Self {
        By::HintText(m.into())
    }

    pub fn placeholder_text(m: impl Into<TextMatch>) -> Self {
        By::PlaceholderText(m.into())
    }

    pub fn display_value(m: impl Into<TextMatch>) -> Self {
        By::DisplayValue(m.into())
    }

    pub fn alt_text(m: impl Into<TextMatch>) -> Self {
        By::AltText(m.into())
    }

    pub fn role(role: impl Into<TextMatch>) -> Self {
        By::Role(RoleQuery::new(role))
    }

    pub fn predicate<F>(f: F, description: impl Into<String>) -> Self
    where
        F: Fn(&UiNode) -> bool + Send + Sync + 'static,
    {
        By::Predicate(Arc::new(f), description.into())
    }

    fn deepest_only(&self) -> bool {
        matches!(self, By::Text(_) | By::AltText(_))
    }
}

impl From<RoleQuery> for By {
    fn from(query: RoleQuery) -> Self {
        By::Role(query)
    }
}

/// Criteria rendering used in error messages.
impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            By::Text(m) => write!(f, "text: {m}"),
            By::TestId(m) => write!(f, "testID: {m}"),
            By::LabelText(m) => write!(f, "label: {m}"),
            By::HintText(m) => write!(f, "hint: {m}"),
            By::PlaceholderText(m) => write!(f, "placeholder: {m}"),
            By::DisplayValue(m) => write!(f, "display value: {m}"),
            By::AltText(m) => write!(f, "alt text: {m}"),
            By::Role(q) => write!(f, "{q}"),
            By::State(s) => {
                let parts = s.describe_parts();
                if parts.is_empty() {
                    f.write_str("any state")
                } else {
                    f.write_str(&parts.join(", "))
                }
            }
            By::Value(v) => {
                let parts = v.describe_parts();
                if parts.is_empty() {
                    f.write_str("any value")
                } else {
                    f.write_str(&parts.join(", "))
                }
            }
            By::Predicate(_, description) => write!(f, "predicate: {description}"),
        }
    }
}

impl fmt::Debug for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "By({self})")
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub exact: Option<bool>,
    pub normalizer: Option<Normalizer>,
    pub include_hidden_elements: Option<bool>,
    /// Alias of `include_hidden_elements`; the canonical option wins.
    pub hidden: Option<bool>,
}

impl QueryOptions {
    pub fn include_hidden() -> Self {
        QueryOptions {
            include_hidden_elements: Some(true),
            ..Default::default()
        }
    }

    fn text_options(&self) -> TextMatchOptions {
        TextMatchOptions {
            exact: self.exact,
            normalizer: self.normalizer.clone(),
        }
    }

    fn includes_hidden(&self, config: &Config) -> bool {
        self.include_hidden_elements
            .or(self.hidden)
            .unwrap_or(config.default_include_hidden_elements)
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Query object bound to a tree, a search root, a config snapshot and a clock.
#[derive(Clone)]
pub struct Queries {
    tree: Arc<Tree>,
    root: NodeRef,
    config: Config,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Queries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queries")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Queries {
    /// Queries over the whole tree with the current process-wide config.
    pub fn new(tree: &Arc<Tree>) -> Self {
        Queries {
            tree: Arc::clone(tree),
            root: Arc::clone(tree.container()),
            config: config::get_config(),
            clock: Arc::new(RealClock::new()),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Same queries scoped to the subtree rooted at `node` (`node` included).
    pub fn within(&self, node: &NodeRef) -> Queries {
        Queries {
            root: Arc::clone(node),
            ..self.clone()
        }
    }

    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn host_names(&self) -> Result<HostComponentNames> {
        config::resolve_host_component_names(&self.config)
    }

    // -----------------------------------------------------------------------
    // Matching
    // -----------------------------------------------------------------------

    fn matches(&self, by: &By, node: &NodeRef, hosts: &HostComponentNames, text: &TextMatchOptions) -> bool {
        match by {
            By::Text(m) => is_host_text(node, hosts) && m.matches(node, Some(text_content(node).as_str()), text),
            By::TestId(m) => m.matches(node, node.prop_str("testID").as_deref(), text),
            By::LabelText(m) => matches_label(node, m, text),
            By::HintText(m) => m.matches(node, node.prop_str("accessibilityHint").as_deref(), text),
            By::PlaceholderText(m) => {
                is_host_text_input(node, hosts)
                    && m.matches(node, node.prop_str("placeholder").as_deref(), text)
            }
            By::DisplayValue(m) => {
                is_host_text_input(node, hosts) && {
                    let value = node.prop_str("value").or_else(|| node.prop_str("defaultValue"));
                    m.matches(node, value.as_deref(), text)
                }
            }
            By::AltText(m) => is_host_image(node, hosts) && m.matches(node, node.prop_str("alt").as_deref(), text),
            By::Role(q) => self.matches_role(q, node, hosts),
            By::State(s) => s.matches(&compute_state(node, hosts)),
            By::Value(v) => v.matches(node, &compute_value(node)),
            By::Predicate(f, _) => f(node.as_ref()),
        }
    }

    fn matches_role(&self, query: &RoleQuery, node: &NodeRef, hosts: &HostComponentNames) -> bool {
        if !is_accessibility_element(node, hosts) {
            return false;
        }
        let role = compute_role(node, hosts);
        let role_ok = match &query.role {
            TextMatch::Literal(expected) => normalize_role(expected) == role,
            other => other.matches(node, Some(role.as_str()), &TextMatchOptions::default()),
        };
        if !role_ok {
            return false;
        }
        if !query.state.is_empty() && !query.state.matches(&compute_state(node, hosts)) {
            return false;
        }
        if !query.value.matches(node, &compute_value(node)) {
            return false;
        }
        let Some(name) = &query.name else {
            return true;
        };
        let defaults = TextMatchOptions::default();
        if name.matches(node, compute_name(node, hosts).as_deref(), &defaults) {
            return true;
        }
        let nested = QueryOptions::default();
        !self.collect(node, &By::Text(name.clone()), &nested, hosts).is_empty()
            || !self.collect(node, &By::LabelText(name.clone()), &nested, hosts).is_empty()
    }

    /// Matching host nodes under `root`, without taking the flush lock.
    fn collect(&self, root: &NodeRef, by: &By, options: &QueryOptions, hosts: &HostComponentNames) -> Vec<NodeRef> {
        let text = options.text_options();
        let matched = find_all(root, |node| self.matches(by, node, hosts, &text), by.deepest_only());
        if options.includes_hidden(&self.config) {
            return matched;
        }
        let mut cache = HiddenCache::new();
        matched
            .into_iter()
            .filter(|node| !is_hidden_from_accessibility(node, Some(&mut cache)))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Error construction
    // -----------------------------------------------------------------------

    fn snapshot(&self) -> Option<String> {
        if self.tree.is_detached() {
            return Some(DETACHED_NOTICE.to_owned());
        }
        let rendered = render_tree(&[Arc::clone(self.tree.container())], None);
        (!rendered.is_empty()).then_some(rendered)
    }

    fn not_found(&self, by: &By, with_snapshot: bool) -> QueryError {
        QueryError::NotFound {
            message: format!("Unable to find an element with {by}"),
            snapshot: if with_snapshot { self.snapshot() } else { None },
        }
    }

    fn ambiguous(by: &By, count: usize) -> QueryError {
        QueryError::AmbiguousMatch {
            message: format!("Found multiple elements with {by}: {count}"),
            count,
        }
    }

    // -----------------------------------------------------------------------
    // Cardinality forms
    // -----------------------------------------------------------------------

    /// Every match in document order.  Fails only on configuration errors.
    pub fn query_all(&self, by: &By, options: &QueryOptions) -> Result<Vec<NodeRef>> {
        let hosts = self.host_names()?;
        let _pass = self.tree.read_pass();
        Ok(self.collect(&self.root, by, options, &hosts))
    }

    pub fn query_single(&self, by: &By, options: &QueryOptions) -> Result<Option<NodeRef>> {
        let mut results = self.query_all(by, options)?;
        match results.len() {
            0 => Ok(None),
            1 => Ok(results.pop()),
            n => Err(Self::ambiguous(by, n)),
        }
    }

    pub fn get_single(&self, by: &By, options: &QueryOptions) -> Result<NodeRef> {
        self.get_single_inner(by, options, true)
    }

    fn get_single_inner(&self, by: &By, options: &QueryOptions, with_snapshot: bool) -> Result<NodeRef> {
        let mut results = self.query_all(by, options)?;
        match results.len() {
            1 => results.pop().ok_or_else(|| self.not_found(by, with_snapshot)),
            0 => Err(self.not_found(by, with_snapshot)),
            n => Err(Self::ambiguous(by, n)),
        }
    }

    pub fn get_all_required(&self, by: &By, options: &QueryOptions) -> Result<Vec<NodeRef>> {
        self.get_all_required_inner(by, options, true)
    }

    fn get_all_required_inner(&self, by: &By, options: &QueryOptions, with_snapshot: bool) -> Result<Vec<NodeRef>> {
        let results = self.query_all(by, options)?;
        if results.is_empty() {
            return Err(self.not_found(by, with_snapshot));
        }
        Ok(results)
    }

    /// Never fails on zero matches.
    pub fn query_all_optional(&self, by: &By, options: &QueryOptions) -> Result<Vec<NodeRef>> {
        self.query_all(by, options)
    }

    fn wait_options(&self, wait: &WaitForOptions) -> WaitForOptions {
        WaitForOptions {
            timeout: Some(wait.timeout.unwrap_or(self.config.async_util_timeout)),
            ..wait.clone()
        }
    }

    /// `get_single`, retried until it succeeds.  Polls skip the tree snapshot.
    pub async fn find_single(&self, by: &By, options: &QueryOptions, wait: &WaitForOptions) -> Result<NodeRef> {
        let wait = self.wait_options(wait);
        wait_for(&self.tree, self.clock.as_ref(), &wait, || {
            self.get_single_inner(by, options, false)
        })
        .await
    }

    /// `get_all_required`, retried until it succeeds.
    pub async fn find_all_required(
        &self,
        by: &By,
        options: &QueryOptions,
        wait: &WaitForOptions,
    ) -> Result<Vec<NodeRef>> {
        let wait = self.wait_options(wait);
        wait_for(&self.tree, self.clock.as_ref(), &wait, || {
            self.get_all_required_inner(by, options, false)
        })
        .await
    }

    /// Wait until `by` no longer matches anything under the root.
    pub async fn wait_for_removal(&self, by: &By, options: &QueryOptions, wait: &WaitForOptions) -> Result<()> {
        let wait = self.wait_options(wait);
        crate::wait::wait_for_element_to_be_removed(&self.tree, self.clock.as_ref(), &wait, || {
            self.query_all(by, options)
        })
        .await
    }

    /// Diagnostic rendering of the search root.
    pub fn debug(&self) -> String {
        self.debug_with(None)
    }

    pub fn debug_with(&self, map_props: Option<&MapProps>) -> String {
        let _pass = self.tree.read_pass();
        render_tree(&[Arc::clone(&self.root)], map_props)
    }
}

fn matches_label(node: &NodeRef, m: &TextMatch, text: &TextMatchOptions) -> bool {
    if let Some(label) = explicit_label(node) {
        if m.matches(node, Some(label.as_str()), text) {
            return true;
        }
    }
    let ids = crate::a11y::labelled_by_ids(node);
    ids.iter()
        .filter_map(|id| find_by_native_id(node, id))
        .any(|target| {
            m.matches(&target, Some(text_content(&target).as_str()), text)
                || explicit_label(&target).is_some_and(|l| m.matches(&target, Some(l.as_str()), text))
        })
}

/// Queries for the subtree rooted at `node` in `tree`.
pub fn within(tree: &Arc<Tree>, node: &NodeRef) -> Queries {
    Queries::new(tree).within(node)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a11y::CheckedState;
    use crate::wait::SimulatedClock;
    use serde_json::json;
    use std::time::Duration;

    fn hosts() -> HostComponentNames {
        HostComponentNames {
            text: "Text".into(),
            text_input: "TextInput".into(),
            image: "Image".into(),
            switch: "RCTSwitch".into(),
            scroll_view: "RCTScrollView".into(),
            modal: "Modal".into(),
        }
    }

    fn config() -> Config {
        Config {
            host_component_names: Some(hosts()),
            ..Config::default()
        }
    }

    fn queries(tree: &Arc<Tree>) -> Queries {
        Queries::new(tree).with_config(config())
    }

    fn text(label: &str) -> NodeRef {
        UiNode::host("Text").text(label).build()
    }

    fn none() -> QueryOptions {
        QueryOptions::default()
    }

    #[test]
    fn test_cardinality_zero_matches() {
        let tree = Tree::mount(UiNode::host("View").child(text("a")).build());
        let q = queries(&tree);
        let by = By::test_id("missing");
        assert!(q.query_all(&by, &none()).unwrap().is_empty());
        assert!(q.query_single(&by, &none()).unwrap().is_none());
        assert!(q.query_all_optional(&by, &none()).unwrap().is_empty());

        let err = q.get_single(&by, &none()).unwrap_err();
        assert!(err.is_not_found());
        let message = err.to_string();
        assert!(message.starts_with("Unable to find an element with testID: \"missing\"\n\n<View>"));

        assert!(q.get_all_required(&by, &none()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_cardinality_single_match_same_reference() {
        let target = UiNode::host("View").prop("testID", "x").build();
        let tree = Tree::mount(UiNode::host("View").child(Arc::clone(&target)).build());
        let q = queries(&tree);
        let by = By::test_id("x");
        let got = q.get_single(&by, &none()).unwrap();
        let queried = q.query_single(&by, &none()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&got, &target));
        assert!(Arc::ptr_eq(&got, &queried));
    }

    #[test]
    fn test_two_save_labels_are_ambiguous() {
        let tree = Tree::mount(
            UiNode::host("View")
                .child(UiNode::host("View").prop("accessibilityLabel", "Save").build())
                .child(UiNode::host("View").prop("aria-label", "Save").build())
                .build(),
        );
        let q = queries(&tree);
        let by = By::label_text("Save");
        let err = q.get_single(&by, &none()).unwrap_err();
        assert!(matches!(err, QueryError::AmbiguousMatch { count: 2, .. }));
        assert_eq!(err.to_string(), "Found multiple elements with label: \"Save\": 2");
        assert!(matches!(
            q.query_single(&by, &none()).unwrap_err(),
            QueryError::AmbiguousMatch { count: 2, .. }
        ));
        assert_eq!(q.get_all_required(&by, &none()).unwrap().len(), 2);
    }

    #[test]
    fn test_hidden_ancestor_excluded_unless_included() {
        let target = UiNode::host("View").prop("testID", "x").build();
        let tree = Tree::mount(
            UiNode::host("View")
                .prop("style", json!({ "display": "none" }))
                .child(UiNode::host("View").child(Arc::clone(&target)).build())
                .build(),
        );
        let q = queries(&tree);
        let by = By::test_id("x");
        assert!(q.query_all(&by, &none()).unwrap().is_empty());
        assert_eq!(q.query_all(&by, &QueryOptions::include_hidden()).unwrap().len(), 1);
        let alias = QueryOptions {
            hidden: Some(true),
            ..Default::default()
        };
        assert_eq!(q.query_all(&by, &alias).unwrap().len(), 1);

        let configured = Queries::new(&tree).with_config(Config {
            default_include_hidden_elements: true,
            ..config()
        });
        assert_eq!(configured.query_all(&by, &none()).unwrap().len(), 1);
    }

    #[test]
    fn test_checked_state_query() {
        let checkbox = UiNode::host("View")
            .prop("role", "checkbox")
            .prop("accessibilityState", json!({ "checked": "mixed" }))
            .build();
        let tree = Tree::mount(UiNode::host("View").child(Arc::clone(&checkbox)).build());
        let q = queries(&tree);

        let checked = By::State(StateMatcher {
            checked: Some(CheckedState::Checked),
            ..Default::default()
        });
        assert!(q.query_all(&checked, &none()).unwrap().is_empty());

        let mixed = By::State(StateMatcher {
            checked: Some(CheckedState::Mixed),
            ..Default::default()
        });
        let found = q.query_all(&mixed, &none()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(&found[0], &checkbox));
    }

    #[test]
    fn test_text_query_deepest_only() {
        let inner = text("Hello");
        let tree = Tree::mount(
            UiNode::host("View")
                .child(UiNode::host("Text").child(Arc::clone(&inner)).build())
                .build(),
        );
        let q = queries(&tree);
        let found = q.query_all(&By::text("Hello"), &none()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(&found[0], &inner));

        let partial = QueryOptions {
            exact: Some(false),
            ..Default::default()
        };
        assert_eq!(q.query_all(&By::text("hell"), &partial).unwrap().len(), 1);
    }

    #[test]
    fn test_text_pattern_and_predicate() {
        let tree = Tree::mount(UiNode::host("View").child(text("Count: 3")).build());
        let q = queries(&tree);
        let pattern = By::Text(TextMatch::pattern(r"(?i)count: \d").unwrap());
        assert_eq!(q.query_all(&pattern, &none()).unwrap().len(), 1);
        assert_eq!(pattern.to_string(), "text: /count: \\d/i");

        let by = By::predicate(|n| n.type_name() == "Text", "is text");
        assert_eq!(q.query_all(&by, &none()).unwrap().len(), 1);
    }

    #[test]
    fn test_role_query_with_name_and_state() {
        let button = UiNode::host("View")
            .prop("accessible", true)
            .prop("role", "button")
            .prop("aria-disabled", true)
            .child(text("Save"))
            .build();
        let tree = Tree::mount(UiNode::host("View").child(Arc::clone(&button)).build());
        let q = queries(&tree);

        let by: By = RoleQuery::new("button")
            .name("Save")
            .state(StateMatcher {
                disabled: Some(true),
                ..Default::default()
            })
            .into();
        assert_eq!(by.to_string(), "role: \"button\", name: \"Save\", disabled state: true");
        assert!(Arc::ptr_eq(&q.get_single(&by, &none()).unwrap(), &button));

        let enabled: By = RoleQuery::new("button")
            .state(StateMatcher {
                disabled: Some(false),
                ..Default::default()
            })
            .into();
        assert!(q.query_all(&enabled, &none()).unwrap().is_empty());
    }

    #[test]
    fn test_role_requires_accessibility_element() {
        let tree = Tree::mount(
            UiNode::host("View")
                .child(UiNode::host("View").prop("role", "button").build())
                .build(),
        );
        assert!(queries(&tree).query_all(&By::role("button"), &none()).unwrap().is_empty());
    }

    #[test]
    fn test_role_name_falls_back_to_descendant_label() {
        let row = UiNode::host("View")
            .prop("accessible", true)
            .prop("role", "button")
            .prop("accessibilityLabel", "Row")
            .child(UiNode::host("View").prop("accessibilityLabel", "Delete").build())
            .build();
        let tree = Tree::mount(Arc::clone(&row));
        let q = queries(&tree);
        let by: By = RoleQuery::new("button").name("Delete").into();
        assert!(Arc::ptr_eq(&q.get_single(&by, &none()).unwrap(), &row));
    }

    #[test]
    fn test_role_value_and_image_synonym() {
        let slider = UiNode::host("View")
            .prop("accessible", true)
            .prop("role", "adjustable")
            .prop("accessibilityValue", json!({ "min": 0, "max": 10, "now": 5 }))
            .build();
        let image = UiNode::host("Image").prop("alt", "Logo").prop("role", "img").build();
        let tree = Tree::mount(UiNode::host("View").child(slider).child(image).build());
        let q = queries(&tree);

        let by: By = RoleQuery::new("adjustable")
            .value(ValueMatcher {
                now: Some(5.0),
                ..Default::default()
            })
            .into();
        assert_eq!(q.query_all(&by, &none()).unwrap().len(), 1);
        assert_eq!(by.to_string(), "role: \"adjustable\", now value: 5");
        assert_eq!(q.query_all(&By::role("image"), &none()).unwrap().len(), 1);
        assert_eq!(q.query_all(&By::alt_text("Logo"), &none()).unwrap().len(), 1);
    }

    #[test]
    fn test_input_queries() {
        let input = UiNode::host("TextInput")
            .prop("placeholder", "Email")
            .prop("defaultValue", "a@b.c")
            .build();
        let tree = Tree::mount(UiNode::host("View").child(Arc::clone(&input)).build());
        let q = queries(&tree);
        assert_eq!(q.query_all(&By::placeholder_text("Email"), &none()).unwrap().len(), 1);
        assert_eq!(q.query_all(&By::display_value("a@b.c"), &none()).unwrap().len(), 1);
        input.set_prop("value", "x@y.z");
        assert!(q.query_all(&By::display_value("a@b.c"), &none()).unwrap().is_empty());
    }

    #[test]
    fn test_label_text_via_labelled_by() {
        let field = UiNode::host("TextInput").prop("aria-labelledby", "email-label").build();
        let tree = Tree::mount(
            UiNode::host("View")
                .child(UiNode::host("Text").prop("nativeID", "email-label").text("Email").build())
                .child(Arc::clone(&field))
                .build(),
        );
        let q = queries(&tree);
        let found = q.get_single(&By::label_text("Email"), &none()).unwrap();
        assert!(Arc::ptr_eq(&found, &field));
    }

    #[test]
    fn test_hint_text() {
        let tree = Tree::mount(UiNode::host("View").prop("accessibilityHint", "Opens menu").build());
        assert_eq!(
            queries(&tree).query_all(&By::hint_text("Opens menu"), &none()).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_within_scopes_search_root() {
        let first = UiNode::host("View").child(text("Item")).build();
        let second = UiNode::host("View").child(text("Item")).build();
        let tree = Tree::mount(UiNode::host("View").child(Arc::clone(&first)).child(second).build());
        let q = queries(&tree);
        assert_eq!(q.query_all(&By::text("Item"), &none()).unwrap().len(), 2);
        assert_eq!(q.within(&first).query_all(&By::text("Item"), &none()).unwrap().len(), 1);
    }

    #[test]
    fn test_not_found_after_unmount_uses_detached_notice() {
        let tree = Tree::mount(text("x"));
        let q = queries(&tree);
        tree.unmount();
        let err = q.get_single(&By::text("x"), &none()).unwrap_err();
        assert!(err.to_string().ends_with(DETACHED_NOTICE));
    }

    #[test]
    fn test_debug_renders_root() {
        let tree = Tree::mount(UiNode::host("View").prop("testID", "root").build());
        assert_eq!(queries(&tree).debug(), "<View\n  testID=\"root\"\n/>");
    }

    #[tokio::test]
    async fn test_find_single_resolves_after_mutation() {
        let root = UiNode::host("View").build();
        let tree = Tree::mount(Arc::clone(&root));
        let clock = Arc::new(SimulatedClock::new());
        let q = queries(&tree).with_clock(clock.clone());
        let by = By::label_text("Loaded");
        let options = none();
        let wait = WaitForOptions::with_timeout(Duration::from_millis(1000));

        let find = q.find_single(&by, &options, &wait);
        let drive = async {
            tokio::task::yield_now().await;
            clock.advance(Duration::from_millis(20));
            tree.batch(|_| {
                root.append_child(UiNode::host("View").prop("accessibilityLabel", "Loaded").build())
            });
            clock.advance(Duration::from_millis(30));
        };
        let (found, ()) = tokio::join!(find, drive);
        let found = found.unwrap();
        assert_eq!(found.prop_str("accessibilityLabel").as_deref(), Some("Loaded"));
        assert!(clock.now() < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_find_single_times_out_with_not_found_message() {
        let tree = Tree::mount(UiNode::host("View").build());
        let clock = Arc::new(SimulatedClock::new());
        let q = queries(&tree).with_clock(clock.clone());
        let by = By::label_text("Never");
        let options = none();
        let wait = WaitForOptions::with_timeout(Duration::from_millis(200));

        let find = q.find_single(&by, &options, &wait);
        let drive = async {
            for _ in 0..8 {
                tokio::task::yield_now().await;
                clock.advance(Duration::from_millis(50));
            }
        };
        let (result, ()) = tokio::join!(find, drive);
        let err = result.unwrap_err();
        assert!(matches!(err, QueryError::Timeout { .. }));
        assert_eq!(err.to_string(), "Unable to find an element with label: \"Never\"");
    }

    #[tokio::test]
    async fn test_find_all_required_rejects_on_unmount() {
        let tree = Tree::mount(UiNode::host("View").build());
        let clock = Arc::new(SimulatedClock::new());
        let q = queries(&tree).with_clock(clock.clone());
        let by = By::text("Later");
        let options = none();
        let wait = WaitForOptions::with_timeout(Duration::from_secs(30));

        let find = q.find_all_required(&by, &options, &wait);
        let drive = async {
            tokio::task::yield_now().await;
            tree.unmount();
        };
        let (result, ()) = tokio::join!(find, drive);
        assert!(matches!(result.unwrap_err(), QueryError::DetachedTree));
    }

    #[tokio::test]
    async fn test_wait_for_removal() {
        let item = text("Bye");
        let root = UiNode::host("View").child(Arc::clone(&item)).build();
        let tree = Tree::mount(Arc::clone(&root));
        let clock = Arc::new(SimulatedClock::new());
        let q = queries(&tree).with_clock(clock.clone());

        let by = By::text("Bye");
        let options = none();
        let wait_options = WaitForOptions::default();
        let wait = q.wait_for_removal(&by, &options, &wait_options);
        let drive = async {
            tokio::task::yield_now().await;
            tree.batch(|_| root.remove_child(&item));
            clock.advance(Duration::from_millis(50));
        };
        let (result, _) = tokio::join!(wait, drive);
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_sessions_keep_their_own_deadlines() {
        let root = UiNode::host("View").build();
        let tree = Tree::mount(Arc::clone(&root));
        let clock = Arc::new(SimulatedClock::new());
        let q = queries(&tree).with_clock(clock.clone());
        let options = none();

        let ready = By::label_text("Ready");
        let ready_wait = WaitForOptions::with_timeout(Duration::from_millis(1000));
        let missing = By::label_text("Missing");
        let missing_wait = WaitForOptions::with_timeout(Duration::from_millis(100));

        let found = q.find_single(&ready, &options, &ready_wait);
        let timed_out = q.find_all_required(&missing, &options, &missing_wait);
        let drive = async {
            for step in 0..6 {
                tokio::task::yield_now().await;
                if step == 3 {
                    tree.batch(|_| {
                        root.append_child(UiNode::host("View").prop("accessibilityLabel", "Ready").build())
                    });
                }
                clock.advance(Duration::from_millis(50));
            }
        };
        let (found, timed_out, ()) = tokio::join!(found, timed_out, drive);

        assert_eq!(found.unwrap().prop_str("accessibilityLabel").as_deref(), Some("Ready"));
        assert!(matches!(timed_out.unwrap_err(), QueryError::Timeout { .. }));
        assert!(clock.now() < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_concurrent_sessions_all_reject_on_unmount() {
        let tree = Tree::mount(UiNode::host("View").build());
        let clock = Arc::new(SimulatedClock::new());
        let q = queries(&tree).with_clock(clock.clone());
        let options = none();
        let wait = WaitForOptions::with_timeout(Duration::from_secs(30));
        let first = By::text("One");
        let second = By::test_id("two");

        let a = q.find_single(&first, &options, &wait);
        let b = q.find_all_required(&second, &options, &wait);
        let drive = async {
            tokio::task::yield_now().await;
            tree.unmount();
        };
        let (a, b, ()) = tokio::join!(a, b, drive);
        assert!(matches!(a.unwrap_err(), QueryError::DetachedTree));
        assert!(matches!(b.unwrap_err(), QueryError::DetachedTree));
    }
}
