//! Layout declaration
//!
//! A `Builder` holds an arena of node declarations (index 0 is the root).
//! Nodes are addressed by `NodeHandle`s, which are plain indices tagged with
//! the owning builder. `finalize` freezes the arena into a `LayoutTree` and
//! spends the builder.

mod finalize;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::axis::{Axis, AxisExtent};
use crate::config::{self, LayoutConfig};
use crate::error::{LayoutError, LayoutResult};
use crate::field::Field;
use crate::padding::PaddingPolicy;
use crate::tree::LayoutTree;

static NEXT_BUILDER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a node declared in a specific builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    builder: u64,
    index: usize,
}

impl NodeHandle {
    /// Arena index; root is 0. Matches `LayoutNode::index` after finalize.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn builder_id(&self) -> u64 {
        self.builder
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NodeDecl {
    pub parent: Option<usize>,
    pub block: Vec<AxisExtent>,
    pub children: Vec<usize>,
    pub fields: Vec<Field>,
}

impl NodeDecl {
    fn root() -> Self {
        Self {
            parent: None,
            block: Vec::new(),
            children: Vec::new(),
            fields: Vec::new(),
        }
    }
}

/// Mutable layout declaration. Single-threaded by construction.
#[derive(Debug)]
pub struct Builder {
    id: u64,
    nodes: Vec<NodeDecl>,
    placed: HashSet<u64>,
    config: Option<LayoutConfig>,
    padding: Option<PaddingPolicy>,
    spent: bool,
}

impl Builder {
    fn with_settings(config: Option<LayoutConfig>, padding: Option<PaddingPolicy>) -> Self {
        Self {
            id: NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed),
            nodes: vec![NodeDecl::root()],
            placed: HashSet::new(),
            config,
            padding,
            spent: false,
        }
    }

    /// Builder that uses the process-wide configuration at finalize time
    pub fn new() -> Self {
        Self::with_settings(None, None)
    }

    /// Builder with its own configuration, ignoring the process-wide one
    pub fn with_config(config: LayoutConfig) -> Self {
        Self::with_settings(Some(config), None)
    }

    /// Builder with its own padding policy. The rest of the configuration is
    /// still the process-wide one at finalize time.
    pub fn with_padding(padding: PaddingPolicy) -> Self {
        Self::with_settings(None, Some(padding))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn root(&self) -> NodeHandle {
        NodeHandle {
            builder: self.id,
            index: 0,
        }
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// Number of declared nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn field_count(&self) -> usize {
        self.placed.len()
    }

    /// No declarations beyond the root and no placed fields
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && self.placed.is_empty()
    }

    fn check_live(&self) -> LayoutResult<()> {
        if self.spent {
            return Err(LayoutError::UseAfterFinalize);
        }
        Ok(())
    }

    fn check_handle(&self, handle: NodeHandle) -> LayoutResult<usize> {
        if handle.builder != self.id || handle.index >= self.nodes.len() {
            return Err(LayoutError::ForeignNode {
                builder: self.id,
                handle_builder: handle.builder,
            });
        }
        Ok(handle.index)
    }

    /// Append a child block over `axes` with the given extents under `parent`.
    ///
    /// Extents are signed so that zero and negative declarations can be
    /// reported as `InvalidShape`. A rejected declaration changes nothing.
    pub fn declare_node(
        &mut self,
        parent: NodeHandle,
        axes: &[Axis],
        extents: &[i64],
    ) -> LayoutResult<NodeHandle> {
        self.check_live()?;
        let parent_index = self.check_handle(parent)?;
        let block = AxisExtent::zip(axes, extents)?;

        let index = self.nodes.len();
        log::debug!(
            "[Builder] Node {} declared under node {}: {:?}",
            index,
            parent_index,
            block.iter().map(|b| b.to_string()).collect::<Vec<_>>()
        );
        self.nodes.push(NodeDecl {
            parent: Some(parent_index),
            block,
            children: Vec::new(),
            fields: Vec::new(),
        });
        self.nodes[parent_index].children.push(index);

        Ok(NodeHandle {
            builder: self.id,
            index,
        })
    }

    /// Place fields on `node`. Fields placed on one node share its cell.
    ///
    /// Each field is reserved for this builder as it is placed. Fails
    /// without placing anything if any field is already placed in any
    /// builder, appears twice in `fields`, or is bound to a tree.
    pub fn place(&mut self, node: NodeHandle, fields: &[&Field]) -> LayoutResult<()> {
        self.check_live()?;
        let index = self.check_handle(node)?;

        let mut reserved: Vec<&Field> = Vec::with_capacity(fields.len());
        for field in fields {
            if field.is_bound() || !field.reserve(self.id) {
                for claimed in reserved {
                    claimed.release(self.id);
                }
                return Err(LayoutError::DoublePlacement {
                    field: field.name().to_string(),
                });
            }
            reserved.push(field);
        }

        for field in fields {
            log::debug!("[Builder] Field {} placed on node {}", field, index);
            self.placed.insert(field.id());
            self.nodes[index].fields.push((*field).clone());
        }
        Ok(())
    }

    /// Freeze the declarations into a `LayoutTree` and allocate its buffer.
    ///
    /// On success the builder is spent. On failure it is left unmodified and
    /// can be corrected and finalized again.
    pub fn finalize(&mut self) -> LayoutResult<LayoutTree> {
        self.check_live()?;
        let mut config = self.config.clone().unwrap_or_else(config::active);
        if let Some(padding) = self.padding {
            config.padding = padding;
        }
        config.validate()?;

        let plan = finalize::plan(&self.nodes, config.padding)?;
        let tree = LayoutTree::materialize(plan, config)?;

        self.spent = true;
        log::debug!("[Builder] Builder {} finalized into tree {}", self.id, tree.id());
        Ok(tree)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Builder {
    /// An unfinalized builder gives its fields back
    fn drop(&mut self) {
        if self.spent {
            return;
        }
        for field in self.nodes.iter().flat_map(|decl| &decl.fields) {
            field.release(self.id);
        }
    }
}
