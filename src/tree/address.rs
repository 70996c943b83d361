//! Closed-form address functions
//!
//! Every placed field gets one `AddressFn`. A coordinate is split into one
//! local index per nesting level that binds its axis; each local index
//! contributes `local * byte_stride`, and the sum plus the field's constant
//! offset is the byte address inside the tree buffer.

use crate::axis::Axis;
use crate::error::{LayoutError, LayoutResult};

/// How a global coordinate is reduced to one level's local index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Split {
    /// divisor and extent are both powers of two
    Shift { shift: u32, mask: usize },
    Div { divisor: usize, extent: usize },
}

/// Contribution of one (node, axis) binding to an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisTerm {
    /// Position of the axis in the field's coordinate tuple
    coord: usize,
    /// Arena index of the node that binds the axis at this level
    node: usize,
    split: Split,
    byte_stride: usize,
}

impl AxisTerm {
    pub(crate) fn new(
        coord: usize,
        node: usize,
        divisor: usize,
        extent: usize,
        byte_stride: usize,
    ) -> Self {
        let split = if divisor.is_power_of_two() && extent.is_power_of_two() {
            Split::Shift {
                shift: divisor.trailing_zeros(),
                mask: extent - 1,
            }
        } else {
            Split::Div { divisor, extent }
        };
        Self {
            coord,
            node,
            split,
            byte_stride,
        }
    }

    #[inline(always)]
    fn local(&self, x: usize) -> usize {
        match self.split {
            Split::Shift { shift, mask } => (x >> shift) & mask,
            Split::Div { divisor, extent } => (x / divisor) % extent,
        }
    }

    pub fn coord(&self) -> usize {
        self.coord
    }

    pub fn node(&self) -> usize {
        self.node
    }

    pub fn byte_stride(&self) -> usize {
        self.byte_stride
    }
}

/// Coordinate tuple to byte offset mapping of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressFn {
    axes: Vec<Axis>,
    shape: Vec<usize>,
    constant: usize,
    terms: Vec<AxisTerm>,
    element_size: usize,
}

impl AddressFn {
    pub(crate) fn new(
        axes: Vec<Axis>,
        shape: Vec<usize>,
        constant: usize,
        terms: Vec<AxisTerm>,
        element_size: usize,
    ) -> Self {
        Self {
            axes,
            shape,
            constant,
            terms,
            element_size,
        }
    }

    /// Axes of the coordinate tuple, ascending
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Logical extent per coordinate
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Number of logical elements
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Offset of the element at the all-zero coordinate
    pub fn constant(&self) -> usize {
        self.constant
    }

    pub fn terms(&self) -> &[AxisTerm] {
        &self.terms
    }

    /// Byte offset of `coords`, with bounds checking
    pub fn resolve(&self, field: &str, coords: &[usize]) -> LayoutResult<usize> {
        if coords.len() != self.axes.len() {
            return Err(LayoutError::DimensionMismatch {
                field: field.to_string(),
                expected: self.axes.len(),
                found: coords.len(),
            });
        }
        for ((&index, &extent), &axis) in coords.iter().zip(&self.shape).zip(&self.axes) {
            if index >= extent {
                return Err(LayoutError::OutOfBounds { axis, index, extent });
            }
        }
        Ok(self.resolve_unchecked(coords))
    }

    /// Byte offset of `coords`. Coordinates must already be in bounds.
    #[inline]
    pub fn resolve_unchecked(&self, coords: &[usize]) -> usize {
        self.terms.iter().fold(self.constant, |offset, term| {
            offset + term.local(coords[term.coord]) * term.byte_stride
        })
    }

    /// Logical coordinates in row-major order (last axis fastest)
    pub fn indices(&self) -> Indices {
        Indices::new(self.shape.clone())
    }
}

/// Row-major iterator over every coordinate of a shape
#[derive(Debug, Clone)]
pub struct Indices {
    shape: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl Indices {
    pub fn new(shape: Vec<usize>) -> Self {
        let next = if shape.iter().any(|&extent| extent == 0) {
            None
        } else {
            Some(vec![0; shape.len()])
        };
        Self { shape, next }
    }
}

impl Iterator for Indices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;

        let mut advanced = current.clone();
        let mut carried = true;
        for dim in (0..advanced.len()).rev() {
            advanced[dim] += 1;
            if advanced[dim] < self.shape[dim] {
                carried = false;
                break;
            }
            advanced[dim] = 0;
        }
        if !carried {
            self.next = Some(advanced);
        }

        Some(current)
    }
}
