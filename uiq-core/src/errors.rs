//! Error types for `uiq_core`.
//!
//! All query failures are funnelled through [`QueryError`], which uses
//! `thiserror` for `Display` and `Error` derives.  Each variant is an ordinary
//! value meant to fail the calling test; none of them are retried outside the
//! polling loop in [`crate::wait`].

use thiserror::Error;

/// Notice rendered in place of a tree snapshot once the tree has been unmounted.
pub const DETACHED_NOTICE: &str = "Screen is no longer attached. Check your test for \"find*\" or \
     \"wait_for\" calls that have not been awaited.";

/// Top-level error type for the `uiq_core` library.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Zero matches where at least one was required.
    ///
    /// `snapshot` holds the filtered tree rendering taken when the error was
    /// built; polling queries build this error without one.
    #[error("{}", join_snapshot(.message, .snapshot.as_deref()))]
    NotFound {
        message: String,
        snapshot: Option<String>,
    },

    /// More than one match where exactly one was required.
    #[error("{message}")]
    AmbiguousMatch { message: String, count: usize },

    /// An async query exhausted its deadline.  Displays the last error seen
    /// while polling.
    #[error("{}", timeout_message(.last.as_deref()))]
    Timeout { last: Option<Box<QueryError>> },

    /// The tree was unmounted while an async query was still pending.
    #[error("DetachedTreeError: the element tree was unmounted while a query was pending")]
    DetachedTree,

    /// Host component names are missing and could not be detected.
    #[error("ConfigurationError: {0}")]
    Configuration(String),

    /// The current-screen accessor was used before anything was rendered.
    #[error("`render` method has not been called")]
    ScreenNotRendered,

    /// Malformed tree input, or a text leaf outside any text container.
    #[error("InvalidTree: {0}")]
    InvalidTree(String),

    /// A wire-form query that cannot be turned into criteria.
    #[error("InvalidRequest: {0}")]
    InvalidRequest(String),

    /// Failure returned by a caller-supplied `wait_for` expectation.
    #[error("{0}")]
    Expectation(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;

impl QueryError {
    /// Message of the error without any attached tree snapshot.
    pub fn base_message(&self) -> String {
        match self {
            QueryError::NotFound { message, .. } => message.clone(),
            QueryError::Timeout { last: Some(last) } => last.base_message(),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryError::NotFound { .. })
    }
}

fn join_snapshot(message: &str, snapshot: Option<&str>) -> String {
    match snapshot {
        Some(tree) if !tree.is_empty() => format!("{message}\n\n{tree}"),
        _ => message.to_owned(),
    }
}

fn timeout_message(last: Option<&QueryError>) -> String {
    match last {
        Some(err) => err.to_string(),
        None => "Timed out in waitFor.".to_owned(),
    }
}

/// Malformed JSON tree input.
impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::InvalidTree(format!("invalid tree JSON: {err}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
