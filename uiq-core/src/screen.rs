//! Current-screen context.
//!
//! One process-wide slot holds the most recently rendered [`Tree`].  Writes
//! happen only through [`render`] and [`cleanup`]; any call site may read
//! through [`screen`].

use std::sync::Arc;

use parking_lot::RwLock;

use crate::errors::{QueryError, Result};
use crate::query::Queries;
use crate::tree::{NodeRef, Tree};

static CURRENT: RwLock<Option<Arc<Tree>>> = RwLock::new(None);

/// Mount `root` and make it the current screen.
pub fn render(root: NodeRef) -> Arc<Tree> {
    set_current(Tree::mount(root))
}

/// Mount a JSON tree and make it the current screen.
pub fn render_json(json: &str) -> Result<Arc<Tree>> {
    Ok(set_current(Tree::from_json(json)?))
}

fn set_current(tree: Arc<Tree>) -> Arc<Tree> {
    if CURRENT.write().replace(Arc::clone(&tree)).is_some() {
        log::debug!("render replaced a screen that was never cleaned up");
    }
    tree
}

pub fn current_tree() -> Result<Arc<Tree>> {
    CURRENT.read().clone().ok_or(QueryError::ScreenNotRendered)
}

/// Queries bound to the current screen.
pub fn screen() -> Result<Queries> {
    Ok(Queries::new(&current_tree()?))
}

/// Unmount the current screen (waking pending retry sessions) and clear it.
pub fn cleanup() {
    let previous = CURRENT.write().take();
    if let Some(tree) = previous {
        tree.unmount();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
