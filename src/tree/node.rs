//! Finalized layout nodes

use crate::axis::AxisExtent;

/// One nesting level of a finalized tree.
///
/// A node is a block of `cell_count()` cells laid out row-major over its
/// padded extents. Each cell holds the fields placed on the node (in
/// placement order) followed by one container per child (in declaration
/// order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutNode {
    pub(crate) index: usize,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) block: Vec<AxisExtent>,
    pub(crate) padded: Vec<usize>,
    pub(crate) field_bytes: usize,
    pub(crate) cell_size: usize,
    pub(crate) container_size: usize,
    pub(crate) base_offset: usize,
    pub(crate) depth: usize,
}

impl LayoutNode {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Declared (axis, extent) pairs
    pub fn block(&self) -> &[AxisExtent] {
        &self.block
    }

    /// Allocated extent per declared axis
    pub fn padded_extents(&self) -> &[usize] {
        &self.padded
    }

    pub fn cell_count(&self) -> usize {
        self.padded.iter().product()
    }

    /// Bytes of placed fields at the start of every cell
    pub fn field_bytes(&self) -> usize {
        self.field_bytes
    }

    pub fn cell_size(&self) -> usize {
        self.cell_size
    }

    /// Bytes occupied by the whole block
    pub fn container_size(&self) -> usize {
        self.container_size
    }

    /// Offset of this block inside one cell of its parent
    pub fn base_offset(&self) -> usize {
        self.base_offset
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn shape_label(&self) -> String {
        if self.block.is_empty() {
            return "root".to_string();
        }
        let dims: Vec<String> = self
            .block
            .iter()
            .zip(&self.padded)
            .map(|(declared, &padded)| {
                if padded == declared.extent {
                    format!("{}: {}", declared.axis, declared.extent)
                } else {
                    format!("{}: {} -> {}", declared.axis, declared.extent, padded)
                }
            })
            .collect();
        format!("dense({})", dims.join(", "))
    }
}
