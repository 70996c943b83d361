//! Immutable layout trees and their backing buffers

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use super::address::AddressFn;
use super::buffer::BackingBuffer;
use super::node::LayoutNode;
use crate::config::LayoutConfig;
use crate::constants::memory::PADDING_WARN_RATIO;
use crate::error::{LayoutError, LayoutResult};
use crate::field::{Field, FieldBinding};
use crate::padding::PaddingPolicy;

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Address slot of one placed field
#[derive(Debug, Clone)]
pub(crate) struct FieldSlot {
    pub field: Field,
    pub leaf: usize,
    pub sub_offset: usize,
    pub address: AddressFn,
}

/// Output of planning, before any memory is allocated
#[derive(Debug)]
pub(crate) struct TreePlan {
    pub nodes: Vec<LayoutNode>,
    pub slots: Vec<FieldSlot>,
    pub total_size: usize,
}

/// Shared state behind a `LayoutTree` handle. Fields reach it through `Weak`.
pub(crate) struct TreeState {
    id: u64,
    nodes: Vec<LayoutNode>,
    slots: Vec<FieldSlot>,
    total_size: usize,
    config: LayoutConfig,
    alive: AtomicBool,
    buffer: RwLock<Option<BackingBuffer>>,
}

impl TreeState {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn ensure_alive(&self) -> LayoutResult<()> {
        if self.alive.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(LayoutError::UseAfterDestroy { tree: self.id })
        }
    }

    pub fn slot(&self, index: usize) -> &FieldSlot {
        &self.slots[index]
    }

    /// Run `f` over the buffer bytes under a shared lock
    pub fn with_buffer<R>(&self, f: impl FnOnce(&[u8]) -> R) -> LayoutResult<R> {
        let guard = self.buffer.read();
        match guard.as_ref() {
            Some(buffer) => Ok(f(buffer.as_slice())),
            None => Err(LayoutError::UseAfterDestroy { tree: self.id }),
        }
    }

    /// Run `f` over the buffer bytes under an exclusive lock
    pub fn with_buffer_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> LayoutResult<R> {
        let mut guard = self.buffer.write();
        match guard.as_mut() {
            Some(buffer) => Ok(f(buffer.as_mut_slice())),
            None => Err(LayoutError::UseAfterDestroy { tree: self.id }),
        }
    }
}

/// Memory accounting for one tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub total_bytes: usize,
    pub used_bytes: usize,
    pub padding_bytes: usize,
    pub node_count: usize,
    pub field_count: usize,
}

impl TreeStats {
    /// Share of the buffer not holding any logical element
    pub fn padding_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.padding_bytes as f64 / self.total_bytes as f64
        }
    }
}

/// Finalized, immutable layout with one backing buffer.
///
/// The tree owns the buffer exclusively. Fields placed in it hold weak
/// references, so destroying or dropping the tree invalidates them.
pub struct LayoutTree {
    state: Arc<TreeState>,
}

impl LayoutTree {
    /// Allocate the buffer for `plan` and bind every placed field to it
    pub(crate) fn materialize(plan: TreePlan, config: LayoutConfig) -> LayoutResult<Self> {
        if let Some(slot) = plan.slots.iter().find(|slot| slot.field.is_bound()) {
            return Err(LayoutError::DoublePlacement {
                field: slot.field.name().to_string(),
            });
        }

        let buffer = BackingBuffer::new(plan.total_size, config.buffer_alignment)?;
        let state = Arc::new(TreeState {
            id: NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed),
            nodes: plan.nodes,
            slots: plan.slots,
            total_size: plan.total_size,
            config,
            alive: AtomicBool::new(true),
            buffer: RwLock::new(Some(buffer)),
        });

        for (index, slot) in state.slots.iter().enumerate() {
            slot.field.bind(FieldBinding {
                tree_id: state.id,
                tree: Arc::downgrade(&state),
                slot: index,
            })?;
        }

        let tree = Self { state };
        let stats = tree.stats();
        log::info!(
            "[LayoutTree] Tree {} finalized: {} nodes, {} fields, {} bytes ({})",
            tree.id(),
            stats.node_count,
            stats.field_count,
            stats.total_bytes,
            tree.policy()
        );
        if stats.padding_ratio() > PADDING_WARN_RATIO {
            log::warn!(
                "[LayoutTree] Tree {} spends {:.0}% of its buffer on padding",
                tree.id(),
                stats.padding_ratio() * 100.0
            );
        }
        Ok(tree)
    }

    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Total buffer size in bytes
    pub fn total_size(&self) -> usize {
        self.state.total_size
    }

    pub fn policy(&self) -> PaddingPolicy {
        self.state.config.padding
    }

    pub fn alignment(&self) -> usize {
        self.state.config.buffer_alignment
    }

    pub fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::Acquire)
    }

    /// Finalized nodes in declaration order; index 0 is the root
    pub fn nodes(&self) -> &[LayoutNode] {
        &self.state.nodes
    }

    pub fn root(&self) -> &LayoutNode {
        &self.state.nodes[0]
    }

    /// Placed fields in tree order
    pub fn fields(&self) -> Vec<Field> {
        self.state.slots.iter().map(|slot| slot.field.clone()).collect()
    }

    pub fn field(&self, name: &str) -> Option<Field> {
        self.state
            .slots
            .iter()
            .find(|slot| slot.field.name() == name)
            .map(|slot| slot.field.clone())
    }

    fn slot_of(&self, field: &Field) -> LayoutResult<&FieldSlot> {
        self.state
            .slots
            .iter()
            .find(|slot| slot.field == *field)
            .ok_or_else(|| LayoutError::ForeignField {
                field: field.name().to_string(),
                tree: self.id(),
            })
    }

    /// Address function of a field placed in this tree
    pub fn address(&self, field: &Field) -> LayoutResult<&AddressFn> {
        self.state.ensure_alive()?;
        Ok(&self.slot_of(field)?.address)
    }

    /// Byte offset of `field[coords]` inside the buffer
    pub fn resolve(&self, field: &Field, coords: &[usize]) -> LayoutResult<usize> {
        self.state.ensure_alive()?;
        let slot = self.slot_of(field)?;
        let offset = slot.address.resolve(field.name(), coords)?;
        log::trace!("[LayoutTree] {}{:?} -> {}", field.name(), coords, offset);
        Ok(offset)
    }

    pub fn stats(&self) -> TreeStats {
        let used_bytes = self
            .state
            .slots
            .iter()
            .map(|slot| slot.address.len() * slot.address.element_size())
            .sum();
        TreeStats {
            total_bytes: self.state.total_size,
            used_bytes,
            padding_bytes: self.state.total_size.saturating_sub(used_bytes),
            node_count: self.state.nodes.len(),
            field_count: self.state.slots.len(),
        }
    }

    /// Copy of the raw buffer bytes
    pub fn snapshot(&self) -> LayoutResult<Vec<u8>> {
        self.state.ensure_alive()?;
        self.state.with_buffer(|bytes| bytes.to_vec())
    }

    /// Overwrite the raw buffer with bytes from an earlier snapshot
    pub fn restore(&self, bytes: &[u8]) -> LayoutResult<()> {
        self.state.ensure_alive()?;
        if bytes.len() != self.state.total_size {
            return Err(LayoutError::BufferSizeMismatch {
                expected: self.state.total_size,
                found: bytes.len(),
            });
        }
        self.state.with_buffer_mut(|buffer| buffer.copy_from_slice(bytes))
    }

    /// Release the backing buffer.
    ///
    /// Callers must make sure no other thread is accessing the tree. A
    /// second call fails with `UseAfterDestroy`, as does every later access
    /// through the tree or its fields.
    pub fn destroy(&self) -> LayoutResult<()> {
        self.state
            .alive
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LayoutError::UseAfterDestroy { tree: self.id() })?;

        let released = self.state.buffer.write().take();
        log::info!(
            "[LayoutTree] Tree {} destroyed, released {} bytes",
            self.id(),
            released.map(|buffer| buffer.len()).unwrap_or(0)
        );
        Ok(())
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, index: usize) -> fmt::Result {
        let node = &self.state.nodes[index];
        let indent = "  ".repeat(node.depth());
        write!(
            f,
            "{}{}  cell {} B, block {} B @{}",
            indent,
            node.shape_label(),
            node.cell_size(),
            node.container_size(),
            node.base_offset()
        )?;

        let placed: Vec<String> = self
            .state
            .slots
            .iter()
            .filter(|slot| slot.leaf == index)
            .map(|slot| {
                format!("{}: {} @{}", slot.field.name(), slot.field.dtype(), slot.sub_offset)
            })
            .collect();
        if !placed.is_empty() {
            write!(f, "  [{}]", placed.join(", "))?;
        }
        writeln!(f)?;

        for &child in node.children() {
            self.fmt_node(f, child)?;
        }
        Ok(())
    }
}

impl fmt::Display for LayoutTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "LayoutTree {} ({}, {} bytes{})",
            self.id(),
            self.policy(),
            self.total_size(),
            if self.is_alive() { "" } else { ", destroyed" }
        )?;
        self.fmt_node(f, 0)
    }
}

impl fmt::Debug for LayoutTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutTree")
            .field("id", &self.id())
            .field("total_size", &self.total_size())
            .field("policy", &self.policy())
            .field("alive", &self.is_alive())
            .finish()
    }
}
