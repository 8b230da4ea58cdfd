//! ArrayHandle: a logical array with host/backend residency tracking.
//!
//! A handle holds at most one host copy (`Vec<T>`) and at most one backend
//! copy (`B::Buffer<T>`). Reading one side when only the other is valid
//! transfers first; writing through one side drops the other.
//!
//! | state          | host   | backend |
//! |----------------|--------|---------|
//! | `Empty`        | –      | –       |
//! | `HostValid`    | valid  | –       |
//! | `BackendValid` | –      | valid   |
//! | `BothValid`    | valid  | valid   |

use log::debug;

use crate::algs::backend::Backend;
use crate::data::element::Element;
use crate::data::portal::WritePortal;
use crate::data::storage::{Storage, try_to_host};
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshWorkletError;

/// Where the authoritative copy of a handle's data currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Residency {
    Empty,
    HostValid,
    BackendValid,
    BothValid,
}

/// Owning handle to a typed array that may live on the host, on a backend,
/// or on both.
pub struct ArrayHandle<T: Element, B: Backend> {
    host: Option<Vec<T>>,
    exec: Option<B::Buffer<T>>,
    backend: B,
}

impl<T: Element, B: Backend> std::fmt::Debug for ArrayHandle<T, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayHandle")
            .field("len", &self.len())
            .field("residency", &self.residency())
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl<T: Element, B: Backend> ArrayHandle<T, B> {
    /// An empty handle bound to `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            host: None,
            exec: None,
            backend,
        }
    }

    /// Wrap an existing host vector without copying.
    pub fn from_host(values: Vec<T>, backend: B) -> Self {
        Self {
            host: Some(values),
            exec: None,
            backend,
        }
    }

    pub(crate) fn from_buffer(buffer: B::Buffer<T>, backend: B) -> Self {
        Self {
            host: None,
            exec: Some(buffer),
            backend,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn residency(&self) -> Residency {
        match (&self.host, &self.exec) {
            (None, None) => Residency::Empty,
            (Some(_), None) => Residency::HostValid,
            (None, Some(_)) => Residency::BackendValid,
            (Some(_), Some(_)) => Residency::BothValid,
        }
    }

    /// Logical length in elements.
    pub fn len(&self) -> usize {
        match (&self.exec, &self.host) {
            (Some(exec), _) => exec.len(),
            (None, Some(host)) => host.len(),
            (None, None) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make sure a backend copy exists, transferring from the host if needed.
    fn ensure_backend(&mut self) -> Result<&mut B::Buffer<T>, MeshWorkletError> {
        let buf = match self.exec.take() {
            Some(buf) => buf,
            None => {
                let host = self.host.as_deref().unwrap_or(&[]);
                let mut buf = self.backend.allocate::<T>(host.len())?;
                buf.write_at(0, host)?;
                if !host.is_empty() {
                    debug!(
                        "array handle: host -> {} ({} elements)",
                        self.backend.name(),
                        host.len()
                    );
                }
                buf
            }
        };
        Ok(self.exec.insert(buf))
    }

    /// Make sure a host copy exists, transferring from the backend if needed.
    fn ensure_host(&mut self) -> Result<&mut Vec<T>, MeshWorkletError> {
        let values = match self.host.take() {
            Some(values) => values,
            None => match &self.exec {
                Some(exec) => {
                    debug!(
                        "array handle: {} -> host ({} elements)",
                        self.backend.name(),
                        exec.len()
                    );
                    try_to_host(exec.as_slice())?
                }
                None => Vec::new(),
            },
        };
        Ok(self.host.insert(values))
    }

    /// Read-only backend view.
    ///
    /// Copies host data to the backend first when only the host copy is
    /// valid; an empty handle yields a zero-length input.
    pub fn prepare_for_input(&mut self) -> Result<&[T], MeshWorkletError> {
        Ok(self.ensure_backend()?.as_slice())
    }

    /// Fresh default-initialised backend storage for `n` elements.
    ///
    /// Nothing is copied and any host copy becomes stale.
    pub fn prepare_for_output(&mut self, n: usize) -> Result<WritePortal<'_, T>, MeshWorkletError> {
        Ok(WritePortal::new(self.output_slice(n)?))
    }

    /// Backend view that is read and then written.
    ///
    /// Transfers like [`prepare_for_input`](Self::prepare_for_input); the
    /// host copy is dropped.
    pub fn prepare_for_in_place(&mut self) -> Result<WritePortal<'_, T>, MeshWorkletError> {
        Ok(WritePortal::new(self.exec_mut()?))
    }

    pub(crate) fn output_slice(&mut self, n: usize) -> Result<&mut [T], MeshWorkletError> {
        // On failure the previous contents stay untouched.
        let buf = self.backend.allocate::<T>(n)?;
        self.host = None;
        Ok(self.exec.insert(buf).as_mut_slice())
    }

    pub(crate) fn exec_mut(&mut self) -> Result<&mut [T], MeshWorkletError> {
        self.ensure_backend()?;
        self.host = None;
        Ok(self.ensure_backend()?.as_mut_slice())
    }

    /// Copy the contents into `dst`, which must have the same length.
    pub fn copy_into(&mut self, dst: &mut [T]) -> Result<(), MeshWorkletError> {
        let len = self.len();
        if dst.len() != len {
            return Err(MeshWorkletError::LengthMismatch {
                expected: len,
                found: dst.len(),
            });
        }
        dst.copy_from_slice(self.host_slice()?);
        Ok(())
    }

    /// Host view of the contents, transferring from the backend if needed.
    pub fn host_slice(&mut self) -> Result<&[T], MeshWorkletError> {
        Ok(self.ensure_host()?.as_slice())
    }

    /// The host copy, if one is currently valid. Never transfers.
    pub fn host_view(&self) -> Option<&[T]> {
        self.host.as_deref()
    }

    /// Mutable host view; the backend copy is dropped.
    pub fn host_mut(&mut self) -> Result<&mut [T], MeshWorkletError> {
        self.ensure_host()?;
        self.exec = None;
        Ok(self.ensure_host()?.as_mut_slice())
    }

    pub fn to_vec(&mut self) -> Result<Vec<T>, MeshWorkletError> {
        Ok(self.host_slice()?.to_vec())
    }

    pub fn into_vec(mut self) -> Result<Vec<T>, MeshWorkletError> {
        self.ensure_host()?;
        Ok(self.host.take().unwrap_or_default())
    }

    /// Reduce the logical length to `n` without reallocating or moving data.
    pub fn shrink(&mut self, n: usize) -> Result<(), MeshWorkletError> {
        let len = self.len();
        if n > len {
            return Err(MeshWorkletError::ShrinkOutOfRange { requested: n, len });
        }
        if let Some(exec) = self.exec.as_mut() {
            exec.shrink(n)?;
        }
        if let Some(host) = self.host.as_mut() {
            host.truncate(n);
        }
        crate::debug_invariants!(self.validate_invariants(), "ArrayHandle::shrink");
        Ok(())
    }

    /// Free backend storage. A second call is a no-op.
    ///
    /// Data that only lived on the backend is brought back to the host first,
    /// so the handle ends `HostValid` (or `Empty` if it never held data).
    pub fn release_resources(&mut self) -> Result<(), MeshWorkletError> {
        if self.exec.is_some() {
            self.ensure_host()?;
            self.exec = None;
        }
        Ok(())
    }
}

impl<T: Element, B: Backend> DebugInvariants for ArrayHandle<T, B> {
    fn validate_invariants(&self) -> Result<(), MeshWorkletError> {
        if let (Some(host), Some(exec)) = (&self.host, &self.exec) {
            if host.len() != exec.len() {
                return Err(MeshWorkletError::LengthMismatch {
                    expected: exec.len(),
                    found: host.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::backend::SerialBackend;

    #[test]
    fn input_transfer_keeps_both_copies() {
        let mut h = ArrayHandle::from_host(vec![1u32, 2, 3], SerialBackend);
        assert_eq!(h.residency(), Residency::HostValid);
        assert_eq!(h.prepare_for_input().unwrap(), &[1, 2, 3]);
        assert_eq!(h.residency(), Residency::BothValid);
        h.validate_invariants().unwrap();
    }

    #[test]
    fn in_place_drops_host_copy() {
        let mut h = ArrayHandle::from_host(vec![1i64, 2], SerialBackend);
        {
            let portal = h.prepare_for_in_place().unwrap();
            unsafe { portal.set(0, portal.get(0) * 10) };
        }
        assert_eq!(h.residency(), Residency::BackendValid);
        assert_eq!(h.to_vec().unwrap(), vec![10, 2]);
        assert_eq!(h.residency(), Residency::BothValid);
    }

    #[test]
    fn host_write_invalidates_backend() {
        let mut h = ArrayHandle::from_host(vec![0u8; 3], SerialBackend);
        h.prepare_for_input().unwrap();
        h.host_mut().unwrap()[1] = 9;
        assert_eq!(h.residency(), Residency::HostValid);
        assert_eq!(h.prepare_for_input().unwrap(), &[0, 9, 0]);
    }

    #[test]
    fn empty_handle_is_zero_length_input() {
        let mut h = ArrayHandle::<f32, _>::new(SerialBackend);
        assert_eq!(h.residency(), Residency::Empty);
        assert!(h.prepare_for_input().unwrap().is_empty());
        assert!(h.is_empty());
    }

    #[test]
    fn copy_into_checks_length() {
        let mut h = ArrayHandle::from_host(vec![1u16, 2], SerialBackend);
        let mut dst = [0u16; 3];
        assert_eq!(
            h.copy_into(&mut dst),
            Err(MeshWorkletError::LengthMismatch {
                expected: 2,
                found: 3
            })
        );
    }
}
