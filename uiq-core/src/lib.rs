//! `uiq_core` -- accessibility-aware queries over rendered UI element trees.
//!
//! The external renderer hands over a tree of host and composite nodes; this
//! crate finds nodes in it by accessible name, role, text, identifier or
//! predicate, under strict cardinality contracts, and explains failures with a
//! filtered tree rendering.  It can be consumed by:
//! - test harnesses embedding a renderer (through [`screen`] or [`Queries`])
//! - `uiq-cli` (standalone tools over JSON tree files)
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`errors`] | `QueryError` enum via `thiserror` |
//! | [`tree`] | Live node model, traversal primitives, flush boundary |
//! | [`a11y`] | Role, name, state, value and hidden-from-accessibility |
//! | [`matcher`] | Literal / pattern / predicate text matching |
//! | [`query`] | `By` criteria and the cardinality-bound `Queries` |
//! | [`wait`] | `Clock` capability and the polling retry loop |
//! | [`format`] | Diagnostic tree rendering |
//! | [`config`] | Process-wide options and host component names |
//! | [`screen`] | Current-screen render / cleanup lifecycle |
//! | [`request`] | Serde wire form of a query |
//! | [`batch`] | One query across many trees via Rayon |

pub mod a11y;
pub mod batch;
pub mod config;
pub mod errors;
pub mod format;
pub mod matcher;
pub mod query;
pub mod request;
pub mod screen;
pub mod tree;
pub mod wait;

pub use errors::{QueryError, Result};
pub use matcher::{Normalizer, TextMatch, TextMatchOptions};
pub use query::{By, Queries, QueryOptions, RoleQuery};
pub use tree::{NodeRef, Tree, UiNode};
pub use wait::{Clock, RealClock, SimulatedClock, WaitForOptions};

pub use a11y::is_hidden_from_accessibility as is_inaccessible;
pub use query::within as get_queries_for_element;
