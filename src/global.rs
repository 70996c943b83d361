//! Process-wide default builder
//!
//! A convenience layer over `Builder` for callers that do not want to carry
//! a builder around. Lifecycle:
//!
//! - declarations accumulate in the current default builder;
//! - `finalize` turns them into a tree handed to the caller, and installs a
//!   fresh empty builder;
//! - `materialize` does the same but keeps the tree in a process-wide
//!   registry, so fields placed through this module become usable without
//!   the caller owning the tree. It also runs on first use: accessing a
//!   field that is still pending in the default builder materializes it;
//! - `reset` discards pending declarations, `destroy_all` releases every
//!   registry tree.
//!
//! Node handles are tied to the builder that issued them, so handles taken
//! before a finalize or reset are rejected with `ForeignNode` afterwards.

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::axis::Axis;
use crate::builder::{Builder, NodeHandle};
use crate::error::LayoutResult;
use crate::field::Field;
use crate::tree::LayoutTree;

lazy_static! {
    static ref DEFAULT_BUILDER: Mutex<Builder> = Mutex::new(Builder::new());
    static ref MATERIALIZED: Mutex<Vec<LayoutTree>> = Mutex::new(Vec::new());
}

/// Root of the current default builder
pub fn root() -> NodeHandle {
    DEFAULT_BUILDER.lock().root()
}

pub fn declare_node(
    parent: NodeHandle,
    axes: &[Axis],
    extents: &[i64],
) -> LayoutResult<NodeHandle> {
    DEFAULT_BUILDER.lock().declare_node(parent, axes, extents)
}

pub fn place(node: NodeHandle, fields: &[&Field]) -> LayoutResult<()> {
    DEFAULT_BUILDER.lock().place(node, fields)
}

/// Whether `builder` is the current default builder
pub(crate) fn is_default_builder(builder: u64) -> bool {
    DEFAULT_BUILDER.lock().id() == builder
}

/// Whether the default builder holds declarations not yet finalized
pub fn pending() -> bool {
    !DEFAULT_BUILDER.lock().is_empty()
}

/// Finalize the default builder and start a new empty one.
/// On failure the pending declarations are kept.
pub fn finalize() -> LayoutResult<LayoutTree> {
    finalize_locked(&mut DEFAULT_BUILDER.lock())
}

fn finalize_locked(builder: &mut Builder) -> LayoutResult<LayoutTree> {
    let tree = builder.finalize()?;
    *builder = Builder::new();
    log::debug!("[Global] Default builder finalized into tree {}", tree.id());
    Ok(tree)
}

/// Finalize pending declarations into a registry-owned tree.
/// Returns the new tree id, or `None` when nothing was pending.
pub fn materialize() -> LayoutResult<Option<u64>> {
    let tree = {
        let mut builder = DEFAULT_BUILDER.lock();
        if builder.is_empty() {
            return Ok(None);
        }
        finalize_locked(&mut builder)?
    };
    let id = tree.id();
    MATERIALIZED.lock().push(tree);
    Ok(Some(id))
}

/// Drop pending declarations and start a new empty builder
pub fn reset() {
    let mut builder = DEFAULT_BUILDER.lock();
    if !builder.is_empty() {
        log::debug!(
            "[Global] Discarding {} pending nodes and {} fields",
            builder.node_count() - 1,
            builder.field_count()
        );
    }
    *builder = Builder::new();
}

/// Ids of the registry trees that are still alive
pub fn materialized_trees() -> Vec<u64> {
    MATERIALIZED
        .lock()
        .iter()
        .filter(|tree| tree.is_alive())
        .map(|tree| tree.id())
        .collect()
}

/// Destroy and forget every registry tree. Returns how many were destroyed.
pub fn destroy_all() -> LayoutResult<usize> {
    let trees: Vec<LayoutTree> = std::mem::take(&mut *MATERIALIZED.lock());
    let mut destroyed = 0;
    for tree in trees.iter().filter(|tree| tree.is_alive()) {
        tree.destroy()?;
        destroyed += 1;
    }
    Ok(destroyed)
}
