//! One query against many trees.
//!
//! Trees are independent, so each one is queried on its own Rayon worker
//! with a shared config snapshot.  Results keep the input order.

use std::sync::Arc;

use rayon::prelude::*;

use crate::config::Config;
use crate::errors::Result;
use crate::query::Queries;
use crate::request::{QueryRequest, QueryResponse};
use crate::tree::Tree;

/// Run `request` against every tree in parallel.
pub fn query_trees(trees: &[Arc<Tree>], request: &QueryRequest, config: &Config) -> Vec<Result<QueryResponse>> {
    trees
        .par_iter()
        .map(|tree| request.execute(&Queries::new(tree).with_config(config.clone())))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
