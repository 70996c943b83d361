//! Aligned, zero-initialised backing storage for one layout tree

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use crate::error::{allocation_error, LayoutResult};

/// Owned byte buffer with a caller-chosen alignment
pub struct BackingBuffer {
    ptr: NonNull<u8>,
    len: usize,
    // `None` for zero-sized buffers, which own no allocation
    layout: Option<Layout>,
}

impl BackingBuffer {
    pub fn new(len: usize, align: usize) -> LayoutResult<Self> {
        if len == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len: 0,
                layout: None,
            });
        }

        let layout = Layout::from_size_align(len, align).map_err(|e| allocation_error(len, e))?;

        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr =
            NonNull::new(raw).ok_or_else(|| allocation_error(len, "allocator returned null"))?;

        Ok(Self {
            ptr,
            len,
            layout: Some(layout),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len initialised bytes (zeroed at allocation)
        // or dangling with len 0.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for BackingBuffer {
    fn drop(&mut self) {
        if let Some(layout) = self.layout {
            // SAFETY: ptr was returned by alloc_zeroed with this layout.
            unsafe { dealloc(self.ptr.as_ptr(), layout) }
        }
    }
}

// Safety: BackingBuffer owns its allocation and only hands out borrows tied to &self/&mut self
unsafe impl Send for BackingBuffer {}
unsafe impl Sync for BackingBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_and_aligned() {
        let buffer = BackingBuffer::new(1000, 64).unwrap();
        assert_eq!(buffer.len(), 1000);
        assert_eq!(buffer.as_ptr() as usize % 64, 0);
        assert!(buffer.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_writes_are_visible() {
        let mut buffer = BackingBuffer::new(16, 8).unwrap();
        buffer.as_mut_slice()[3] = 0xAB;
        assert_eq!(buffer.as_slice()[3], 0xAB);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = BackingBuffer::new(0, 64).unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.as_slice().is_empty());
    }

    #[test]
    fn test_bad_alignment_is_reported() {
        assert!(BackingBuffer::new(16, 3).is_err());
    }
}
