//! Pluggable backend-resident storage for array handles.
//!
//! A backend owns the layout of its buffers through [`Storage`]. The serial and
//! multi-core backends keep their buffers in host memory ([`VecStorage`]); a
//! device backend would implement the trait over its own allocation and stage
//! through host memory for `as_slice` access.

use core::fmt::{self, Debug};

use crate::data::element::Element;
use crate::mesh_error::MeshWorkletError;

/// Contiguous, indexable backend storage for `V` with slice access.
pub trait Storage<V: Element>: Debug + Send + Sync {
    /// Allocate a buffer of `len` default-initialised values.
    ///
    /// Fails with [`MeshWorkletError::Transfer`] instead of aborting when the
    /// allocation cannot be satisfied.
    fn try_with_len(len: usize) -> Result<Self, MeshWorkletError>
    where
        Self: Sized;

    /// Current length in elements.
    fn len(&self) -> usize;

    /// `true` when no elements are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reduce the logical length to `new_len` without reallocating.
    fn shrink(&mut self, new_len: usize) -> Result<(), MeshWorkletError>;

    /// Entire read-only buffer.
    fn as_slice(&self) -> &[V];

    /// Entire mutable buffer.
    fn as_mut_slice(&mut self) -> &mut [V];

    /// Copy `src` into the range `[offset .. offset + src.len())`.
    fn write_at(&mut self, offset: usize, src: &[V]) -> Result<(), MeshWorkletError> {
        let len = self.len();
        let end = offset
            .checked_add(src.len())
            .filter(|&end| end <= len)
            .ok_or(MeshWorkletError::LengthMismatch {
                expected: len,
                found: offset.saturating_add(src.len()),
            })?;
        self.as_mut_slice()[offset..end].copy_from_slice(src);
        Ok(())
    }
}

/// `Vec`-backed storage (default).
#[derive(Clone)]
pub struct VecStorage<V>(pub(crate) Vec<V>);

impl<V> Debug for VecStorage<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VecStorage")
            .field("len", &self.0.len())
            .finish()
    }
}

impl<V: Element> Storage<V> for VecStorage<V> {
    fn try_with_len(len: usize) -> Result<Self, MeshWorkletError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| MeshWorkletError::Transfer {
                what: "backend storage",
                len,
            })?;
        buf.resize(len, V::default());
        Ok(Self(buf))
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn shrink(&mut self, new_len: usize) -> Result<(), MeshWorkletError> {
        if new_len > self.0.len() {
            return Err(MeshWorkletError::ShrinkOutOfRange {
                requested: new_len,
                len: self.0.len(),
            });
        }
        self.0.truncate(new_len);
        Ok(())
    }

    fn as_slice(&self) -> &[V] {
        &self.0
    }

    fn as_mut_slice(&mut self) -> &mut [V] {
        &mut self.0
    }
}

impl<V> From<Vec<V>> for VecStorage<V> {
    fn from(v: Vec<V>) -> Self {
        Self(v)
    }
}

/// Copy `src` into a freshly reserved host vector, reporting allocation
/// failure as a transfer error.
pub(crate) fn try_to_host<V: Element>(src: &[V]) -> Result<Vec<V>, MeshWorkletError> {
    let mut out = Vec::new();
    out.try_reserve_exact(src.len())
        .map_err(|_| MeshWorkletError::Transfer {
            what: "host storage",
            len: src.len(),
        })?;
    out.extend_from_slice(src);
    Ok(out)
}
