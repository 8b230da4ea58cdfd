//! Execution-side views of backend storage.
//!
//! Inside a parallel region every unit of work may read any input array but
//! writes only its own index of an output array. Shared `&mut [T]` cannot
//! express that, so output arrays are handed to the region as a
//! [`WritePortal`]: a raw view whose writes are `unsafe` and carry the
//! disjointness contract. Only the runtime performs those writes, always at
//! the invocation's own index (or own chunk).

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::data::element::{Element, ValueType};

/// Disjoint-index writer over a backend buffer.
pub struct WritePortal<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: a portal is a `&mut [T]` split across units of work; each unit
// touches a distinct index, so sending/sharing it is as safe as sharing `T`.
unsafe impl<T: Send> Send for WritePortal<'_, T> {}
unsafe impl<T: Send + Sync> Sync for WritePortal<'_, T> {}

impl<'a, T: Element> WritePortal<'a, T> {
    pub fn new(slice: &'a mut [T]) -> Self {
        let len = slice.len();
        Self {
            ptr: NonNull::from(slice).cast(),
            len,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Write `value` at `index`.
    ///
    /// # Safety
    /// No other unit of work may read or write `index` during the current
    /// parallel region.
    ///
    /// # Panics
    /// Panics if `index >= len`.
    #[inline]
    pub unsafe fn set(&self, index: usize, value: T) {
        assert!(index < self.len, "portal write {index} out of bounds {}", self.len);
        // SAFETY: bounds checked above; exclusivity is the caller's contract.
        unsafe { self.ptr.as_ptr().add(index).write(value) }
    }

    /// Read the value at `index`.
    ///
    /// # Safety
    /// Same contract as [`WritePortal::set`].
    #[inline]
    pub unsafe fn get(&self, index: usize) -> T {
        assert!(index < self.len, "portal read {index} out of bounds {}", self.len);
        // SAFETY: bounds checked above; exclusivity is the caller's contract.
        unsafe { self.ptr.as_ptr().add(index).read() }
    }

    /// Write `values` into `[offset .. offset + values.len())`.
    ///
    /// # Safety
    /// The whole range must be owned by the calling unit of work.
    #[inline]
    pub unsafe fn set_range(&self, offset: usize, values: &[T]) {
        let end = offset + values.len();
        assert!(end <= self.len, "portal range {offset}..{end} out of bounds {}", self.len);
        // SAFETY: bounds checked above; source is a distinct borrow.
        unsafe {
            std::ptr::copy_nonoverlapping(values.as_ptr(), self.ptr.as_ptr().add(offset), values.len())
        }
    }
}

/// Type-erased portal bound to one worklet parameter.
///
/// Opaque outside the crate. Created from a typed slice or write portal;
/// typed access re-checks the element type so a mismatched request yields
/// `None` instead of a bad read.
#[derive(Clone, Copy)]
pub struct ErasedPortal<'a> {
    ptr: NonNull<u8>,
    len: usize,
    value_type: ValueType,
    writable: bool,
    _marker: PhantomData<&'a ()>,
}

// SAFETY: constructed only from `Element` (Send + Sync) buffers; mutable
// access follows the `WritePortal` disjointness contract.
unsafe impl Send for ErasedPortal<'_> {}
unsafe impl Sync for ErasedPortal<'_> {}

impl<'a> ErasedPortal<'a> {
    pub(crate) fn read_only<T: Element>(slice: &'a [T]) -> Self {
        Self {
            ptr: NonNull::from(slice).cast(),
            len: slice.len(),
            value_type: ValueType::of::<T>(),
            writable: false,
            _marker: PhantomData,
        }
    }

    pub(crate) fn writable<T: Element>(portal: WritePortal<'a, T>) -> Self {
        Self {
            ptr: portal.ptr.cast(),
            len: portal.len,
            value_type: ValueType::of::<T>(),
            writable: true,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn value_type(&self) -> ValueType {
        self.value_type
    }

    #[inline]
    pub(crate) fn is_writable(&self) -> bool {
        self.writable
    }

    /// Read `index` from a read-only portal.
    #[inline]
    pub(crate) fn get<T: Element>(&self, index: usize) -> Option<T> {
        if self.writable || !self.value_type.is::<T>() || index >= self.len {
            return None;
        }
        // SAFETY: type and bounds checked; read-only portals are never written
        // during the region.
        Some(unsafe { self.ptr.cast::<T>().as_ptr().add(index).read() })
    }

    /// Read `index` from a writable portal.
    ///
    /// # Safety
    /// `index` must be owned by the calling unit of work.
    #[inline]
    pub(crate) unsafe fn get_owned<T: Element>(&self, index: usize) -> Option<T> {
        if !self.writable || !self.value_type.is::<T>() || index >= self.len {
            return None;
        }
        // SAFETY: type and bounds checked; exclusivity is the caller's contract.
        Some(unsafe { self.ptr.cast::<T>().as_ptr().add(index).read() })
    }

    /// Write `value` at `index` of a writable portal. Returns `false` when
    /// the portal is read-only, the type differs, or `index` is out of range.
    ///
    /// # Safety
    /// `index` must be owned by the calling unit of work.
    #[inline]
    pub(crate) unsafe fn set<T: Element>(&self, index: usize, value: T) -> bool {
        if !self.writable || !self.value_type.is::<T>() || index >= self.len {
            return false;
        }
        // SAFETY: type and bounds checked; exclusivity is the caller's contract.
        unsafe { self.ptr.cast::<T>().as_ptr().add(index).write(value) };
        true
    }
}
