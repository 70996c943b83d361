//! Typed field handles
//!
//! A `Field` is created unbound, placed on a builder node, and bound to a
//! tree slot when the builder finalizes. Placing reserves the field for that
//! builder, so no other builder can take it until the reservation is
//! released by dropping the builder unfinalized. The field only holds a weak
//! reference to its tree, so access after `destroy` (or after the tree is
//! dropped) is reported as `UseAfterDestroy`.
//!
//! Fields still pending in the global default builder are materialized on
//! first access.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::axis::Axis;
use crate::dtype::{DataType, Element};
use crate::error::{LayoutError, LayoutResult};
use crate::global;
use crate::tree::{FieldSlot, TreeState};

static NEXT_FIELD_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct FieldBinding {
    pub tree_id: u64,
    pub tree: Weak<TreeState>,
    pub slot: usize,
}

struct FieldInner {
    id: u64,
    name: String,
    dtype: DataType,
    // id of the builder holding the placement, 0 when free
    owner: AtomicU64,
    binding: OnceLock<FieldBinding>,
}

/// Named, typed multi-dimensional array handle
#[derive(Clone)]
pub struct Field {
    inner: Arc<FieldInner>,
}

impl Field {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            inner: Arc::new(FieldInner {
                id: NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed),
                name: name.into(),
                dtype,
                owner: AtomicU64::new(0),
                binding: OnceLock::new(),
            }),
        }
    }

    /// Field storing the Rust scalar `T`
    pub fn of<T: Element>(name: impl Into<String>) -> Self {
        Self::new(name, T::DTYPE)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn dtype(&self) -> DataType {
        self.inner.dtype
    }

    pub fn element_size(&self) -> usize {
        self.inner.dtype.size()
    }

    /// Whether the field has been bound to a tree by `finalize`
    pub fn is_bound(&self) -> bool {
        self.inner.binding.get().is_some()
    }

    /// Id of the tree the field is bound to
    pub fn tree_id(&self) -> Option<u64> {
        self.inner.binding.get().map(|binding| binding.tree_id)
    }

    /// Placed on a builder node, whether or not that builder has finalized
    pub fn is_placed(&self) -> bool {
        self.owner().is_some()
    }

    /// Id of the builder the field was placed in
    pub fn owner(&self) -> Option<u64> {
        match self.inner.owner.load(Ordering::Acquire) {
            0 => None,
            builder => Some(builder),
        }
    }

    /// Bound to a tree that has not been destroyed
    pub fn is_live(&self) -> bool {
        self.bound_tree().is_ok()
    }

    /// Claim the field for `builder`. Fails if any builder already holds it.
    pub(crate) fn reserve(&self, builder: u64) -> bool {
        self.inner
            .owner
            .compare_exchange(0, builder, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Give up a reservation made by `builder`
    pub(crate) fn release(&self, builder: u64) {
        let _ = self
            .inner
            .owner
            .compare_exchange(builder, 0, Ordering::AcqRel, Ordering::Acquire);
    }

    pub(crate) fn bind(&self, binding: FieldBinding) -> LayoutResult<()> {
        self.inner
            .binding
            .set(binding)
            .map_err(|_| LayoutError::DoublePlacement {
                field: self.name().to_string(),
            })
    }

    fn attached(&self) -> LayoutResult<(Arc<TreeState>, usize)> {
        if !self.is_bound() {
            if let Some(builder) = self.owner() {
                if global::is_default_builder(builder) {
                    log::debug!("[Field] Materializing default builder for {}", self);
                    global::materialize()?;
                }
            }
        }
        self.bound_tree()
    }

    fn bound_tree(&self) -> LayoutResult<(Arc<TreeState>, usize)> {
        let binding = self.inner.binding.get().ok_or_else(|| LayoutError::Unbound {
            field: self.name().to_string(),
        })?;
        let tree = binding
            .tree
            .upgrade()
            .ok_or(LayoutError::UseAfterDestroy { tree: binding.tree_id })?;
        tree.ensure_alive()?;
        Ok((tree, binding.slot))
    }

    fn with_slot<R>(
        &self,
        f: impl FnOnce(&TreeState, &FieldSlot) -> LayoutResult<R>,
    ) -> LayoutResult<R> {
        let (tree, slot) = self.attached()?;
        f(&tree, tree.slot(slot))
    }

    fn check_type<T: Element>(&self) -> LayoutResult<()> {
        if T::DTYPE != self.dtype() {
            return Err(LayoutError::TypeMismatch {
                field: self.name().to_string(),
                stored: self.dtype(),
                requested: T::DTYPE,
            });
        }
        Ok(())
    }

    /// Logical extent per coordinate
    pub fn shape(&self) -> LayoutResult<Vec<usize>> {
        self.with_slot(|_, slot| Ok(slot.address.shape().to_vec()))
    }

    /// Axes of the coordinate tuple, ascending
    pub fn axes(&self) -> LayoutResult<Vec<Axis>> {
        self.with_slot(|_, slot| Ok(slot.address.axes().to_vec()))
    }

    pub fn ndim(&self) -> LayoutResult<usize> {
        self.with_slot(|_, slot| Ok(slot.address.ndim()))
    }

    /// Byte offset of `self[coords]` inside the tree buffer
    pub fn offset(&self, coords: &[usize]) -> LayoutResult<usize> {
        self.with_slot(|_, slot| slot.address.resolve(self.name(), coords))
    }

    pub fn get<T: Element>(&self, coords: &[usize]) -> LayoutResult<T> {
        self.check_type::<T>()?;
        self.with_slot(|tree, slot| {
            let offset = slot.address.resolve(self.name(), coords)?;
            tree.with_buffer(|bytes| read_at::<T>(bytes, offset))
        })
    }

    pub fn set<T: Element>(&self, coords: &[usize], value: T) -> LayoutResult<()> {
        self.check_type::<T>()?;
        self.with_slot(|tree, slot| {
            let offset = slot.address.resolve(self.name(), coords)?;
            tree.with_buffer_mut(|bytes| write_at(bytes, offset, value))
        })
    }

    /// Write `value` to every element
    pub fn fill<T: Element>(&self, value: T) -> LayoutResult<()> {
        self.check_type::<T>()?;
        self.with_slot(|tree, slot| {
            let address = &slot.address;
            tree.with_buffer_mut(|bytes| {
                for coords in address.indices() {
                    write_at(bytes, address.resolve_unchecked(&coords), value);
                }
            })
        })
    }

    /// All elements in logical row-major order
    pub fn to_vec<T: Element>(&self) -> LayoutResult<Vec<T>> {
        self.check_type::<T>()?;
        self.with_slot(|tree, slot| {
            let address = &slot.address;
            tree.with_buffer(|bytes| {
                address
                    .indices()
                    .map(|coords| read_at::<T>(bytes, address.resolve_unchecked(&coords)))
                    .collect()
            })
        })
    }

    /// Overwrite every element from `values`, given in logical row-major order
    pub fn copy_from_slice<T: Element>(&self, values: &[T]) -> LayoutResult<()> {
        self.check_type::<T>()?;
        self.with_slot(|tree, slot| {
            let address = &slot.address;
            if values.len() != address.len() {
                return Err(LayoutError::BufferSizeMismatch {
                    expected: address.len(),
                    found: values.len(),
                });
            }
            tree.with_buffer_mut(|bytes| {
                for (coords, &value) in address.indices().zip(values) {
                    write_at(bytes, address.resolve_unchecked(&coords), value);
                }
            })
        })
    }
}

#[inline]
fn read_at<T: Element>(bytes: &[u8], offset: usize) -> T {
    bytemuck::pod_read_unaligned(&bytes[offset..offset + std::mem::size_of::<T>()])
}

#[inline]
fn write_at<T: Element>(bytes: &mut [u8], offset: usize, value: T) {
    bytes[offset..offset + std::mem::size_of::<T>()].copy_from_slice(bytemuck::bytes_of(&value));
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Field {}

impl Hash for Field {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("dtype", &self.dtype())
            .field("tree", &self.tree_id())
            .finish()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.dtype())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_field_is_unbound() {
        let x = Field::of::<f32>("x");
        assert_eq!(x.dtype(), DataType::F32);
        assert_eq!(x.element_size(), 4);
        assert!(!x.is_bound());
        assert!(!x.is_placed());
        assert!(!x.is_live());
        assert_eq!(x.tree_id(), None);
        assert!(matches!(x.get::<f32>(&[0]), Err(LayoutError::Unbound { .. })));
        assert!(matches!(x.shape(), Err(LayoutError::Unbound { .. })));
    }

    #[test]
    fn test_identity_is_per_handle() {
        let x = Field::of::<i32>("x");
        let same = x.clone();
        let other = Field::of::<i32>("x");
        assert_eq!(x, same);
        assert_ne!(x, other);
    }

    #[test]
    fn test_type_checked_before_binding() {
        let x = Field::of::<u8>("mask");
        assert!(matches!(
            x.set::<f64>(&[0], 1.0),
            Err(LayoutError::TypeMismatch { stored: DataType::U8, requested: DataType::F64, .. })
        ));
    }

    #[test]
    fn test_reservation_is_exclusive() {
        let x = Field::of::<f32>("x");
        assert!(x.reserve(7));
        assert!(!x.reserve(8));
        assert_eq!(x.owner(), Some(7));

        // only the holder can release
        x.release(8);
        assert_eq!(x.owner(), Some(7));
        x.release(7);
        assert!(!x.is_placed());
        assert!(x.reserve(8));
    }

    #[test]
    fn test_unaligned_round_trip() {
        let mut bytes = vec![0u8; 16];
        write_at(&mut bytes, 3, 1.5f64);
        assert_eq!(read_at::<f64>(&bytes, 3), 1.5);
    }
}
