//! Wire form of a query, as read by the CLI tools and the worker.
//!
//! ```json
//! { "by": "role", "match": "button", "name": "Save",
//!   "state": { "disabled": true }, "cardinality": "getSingle" }
//! ```
//!
//! `match`, `name` and `value.text` accept a plain string or
//! `{ "pattern": "...", "flags": "i" }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::a11y::{CheckedState, StateMatcher, ValueMatcher};
use crate::errors::{QueryError, Result};
use crate::matcher::TextMatch;
use crate::query::{By, Queries, QueryOptions, RoleQuery};
use crate::tree::{element, NodeRef, NodeSpec};

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ByKind {
    #[default]
    Text,
    TestId,
    LabelText,
    HintText,
    PlaceholderText,
    DisplayValue,
    AltText,
    Role,
    State,
    Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    #[default]
    QueryAll,
    QuerySingle,
    GetSingle,
    GetAllRequired,
    QueryAllOptional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchSpec {
    Literal(String),
    Pattern {
        pattern: String,
        #[serde(default)]
        flags: String,
    },
}

impl MatchSpec {
    pub fn to_text_match(&self) -> Result<TextMatch> {
        match self {
            MatchSpec::Literal(text) => Ok(TextMatch::literal(text.clone())),
            MatchSpec::Pattern { pattern, flags } => {
                let source = if flags.contains('i') {
                    format!("(?i){pattern}")
                } else {
                    pattern.clone()
                };
                TextMatch::pattern(&source)
                    .map_err(|e| QueryError::InvalidRequest(format!("bad pattern /{pattern}/: {e}")))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    pub disabled: Option<bool>,
    pub selected: Option<bool>,
    /// `true`, `false` or `"mixed"`.
    pub checked: Option<Value>,
    pub busy: Option<bool>,
    pub expanded: Option<bool>,
}

impl StateSpec {
    pub fn to_matcher(&self) -> Result<StateMatcher> {
        let checked = match &self.checked {
            None | Some(Value::Null) => None,
            Some(raw) => Some(CheckedState::from_value(raw).ok_or_else(|| {
                QueryError::InvalidRequest(format!("checked must be true, false or \"mixed\", got {raw}"))
            })?),
        };
        Ok(StateMatcher {
            disabled: self.disabled,
            selected: self.selected,
            checked,
            busy: self.busy,
            expanded: self.expanded,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueSpec {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub now: Option<f64>,
    pub text: Option<MatchSpec>,
}

impl ValueSpec {
    pub fn to_matcher(&self) -> Result<ValueMatcher> {
        Ok(ValueMatcher {
            min: self.min,
            max: self.max,
            now: self.now,
            text: self.text.as_ref().map(MatchSpec::to_text_match).transpose()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub by: ByKind,
    #[serde(rename = "match")]
    pub matcher: Option<MatchSpec>,
    pub name: Option<MatchSpec>,
    pub state: Option<StateSpec>,
    pub value: Option<ValueSpec>,
    pub exact: Option<bool>,
    pub include_hidden_elements: Option<bool>,
    pub hidden: Option<bool>,
    #[serde(default)]
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub count: usize,
    pub nodes: Vec<NodeSpec>,
}

// ---------------------------------------------------------------------------
// Conversion and execution
// ---------------------------------------------------------------------------

impl QueryRequest {
    fn required_match(&self) -> Result<TextMatch> {
        self.matcher
            .as_ref()
            .ok_or_else(|| QueryError::InvalidRequest(format!("`match` is required for {:?} queries", self.by)))?
            .to_text_match()
    }

    pub fn to_by(&self) -> Result<By> {
        Ok(match self.by {
            ByKind::Text => By::Text(self.required_match()?),
            ByKind::TestId => By::TestId(self.required_match()?),
            ByKind::LabelText => By::LabelText(self.required_match()?),
            ByKind::HintText => By::HintText(self.required_match()?),
            ByKind::PlaceholderText => By::PlaceholderText(self.required_match()?),
            ByKind::DisplayValue => By::DisplayValue(self.required_match()?),
            ByKind::AltText => By::AltText(self.required_match()?),
            ByKind::Role => {
                let mut query = RoleQuery::new(self.required_match()?);
                if let Some(name) = &self.name {
                    query = query.name(name.to_text_match()?);
                }
                if let Some(state) = &self.state {
                    query = query.state(state.to_matcher()?);
                }
                if let Some(value) = &self.value {
                    query = query.value(value.to_matcher()?);
                }
                By::Role(query)
            }
            ByKind::State => By::State(
                self.state
                    .as_ref()
                    .ok_or_else(|| QueryError::InvalidRequest("`state` is required for state queries".into()))?
                    .to_matcher()?,
            ),
            ByKind::Value => By::Value(
                self.value
                    .as_ref()
                    .ok_or_else(|| QueryError::InvalidRequest("`value` is required for value queries".into()))?
                    .to_matcher()?,
            ),
        })
    }

    pub fn to_options(&self) -> QueryOptions {
        QueryOptions {
            exact: self.exact,
            normalizer: None,
            include_hidden_elements: self.include_hidden_elements,
            hidden: self.hidden,
        }
    }

    /// Run with the requested cardinality; live nodes.
    pub fn run(&self, queries: &Queries) -> Result<Vec<NodeRef>> {
        let by = self.to_by()?;
        let options = self.to_options();
        match self.cardinality {
            Cardinality::QueryAll => queries.query_all(&by, &options),
            Cardinality::QuerySingle => Ok(queries.query_single(&by, &options)?.into_iter().collect()),
            Cardinality::GetSingle => Ok(vec![queries.get_single(&by, &options)?]),
            Cardinality::GetAllRequired => queries.get_all_required(&by, &options),
            Cardinality::QueryAllOptional => queries.query_all_optional(&by, &options),
        }
    }

    /// Run and serialise the matched subtrees.
    pub fn execute(&self, queries: &Queries) -> Result<QueryResponse> {
        let nodes = self.run(queries)?;
        Ok(QueryResponse {
            count: nodes.len(),
            nodes: nodes.iter().flat_map(element::to_specs).collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
