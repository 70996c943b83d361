//! Finalized layout trees
//!
//! A tree is produced by `Builder::finalize` and never changes shape
//! afterwards. Only the existence of its backing buffer changes, once, when
//! `destroy` is called.

pub mod address;
pub mod buffer;
pub mod layout_tree;
pub mod node;

pub use address::{AddressFn, AxisTerm, Indices};
pub use buffer::BackingBuffer;
pub use layout_tree::{LayoutTree, TreeStats};
pub use node::LayoutNode;

pub(crate) use layout_tree::{FieldSlot, TreePlan, TreeState};
