//! Handle-level parallel primitives.
//!
//! Thin wrappers over [`Backend`] that prepare the right side of each array
//! handle (input, output or in-place) and run on the backend of the first
//! operand. These are the building blocks of the dispatchers and of the
//! generate-topology pipeline.

use num_traits::PrimInt;

use crate::algs::backend::Backend;
use crate::data::array_handle::ArrayHandle;
use crate::data::element::{Element, Id, Truthy};
use crate::data::portal::WritePortal;
use crate::data::storage::Storage;
use crate::mesh_error::MeshWorkletError;
use crate::worklet::error_buffer::ErrorMessageBuffer;

/// Run `functor(i, errors)` for every `i` in `[0, n)`, then report the first
/// error raised into `errors` as [`MeshWorkletError::WorkletRuntime`].
pub fn schedule<B, F>(backend: &B, n: Id, functor: F) -> Result<(), MeshWorkletError>
where
    B: Backend,
    F: Fn(Id, &ErrorMessageBuffer) + Send + Sync,
{
    let errors = ErrorMessageBuffer::new();
    backend.schedule(|i| functor(i, &errors), n);
    match errors.take() {
        Some(message) => Err(MeshWorkletError::WorkletRuntime(message)),
        None => Ok(()),
    }
}

/// Inclusive prefix sum of `input` into `output`; returns the total.
///
/// Fails with [`MeshWorkletError::Overflow`] rather than wrapping when a
/// partial sum does not fit in `T`.
pub fn inclusive_scan<T, B>(
    input: &mut ArrayHandle<T, B>,
    output: &mut ArrayHandle<T, B>,
) -> Result<T, MeshWorkletError>
where
    T: Element + PrimInt,
    B: Backend,
{
    let backend = input.backend().clone();
    let src = input.prepare_for_input()?;
    let dst = output.output_slice(src.len())?;
    backend.inclusive_scan(src, dst)
}

pub fn sort<T: Element + Ord, B: Backend>(values: &mut ArrayHandle<T, B>) -> Result<(), MeshWorkletError> {
    let backend = values.backend().clone();
    backend.sort(values.exec_mut()?);
    Ok(())
}

/// Remove adjacent duplicates and shrink the handle; returns the new length.
pub fn unique<T: Element + PartialEq, B: Backend>(values: &mut ArrayHandle<T, B>) -> Result<Id, MeshWorkletError> {
    let backend = values.backend().clone();
    let kept = backend.unique(values.exec_mut()?)?;
    values.shrink(kept)?;
    Ok(kept)
}

/// For each query, the first index of `sorted` not less than it.
pub fn lower_bounds<T: Element + Ord, B: Backend>(
    sorted: &mut ArrayHandle<T, B>,
    queries: &mut ArrayHandle<T, B>,
    output: &mut ArrayHandle<Id, B>,
) -> Result<(), MeshWorkletError> {
    let backend = sorted.backend().clone();
    let sorted = sorted.prepare_for_input()?;
    let queries = queries.prepare_for_input()?;
    let out = output.output_slice(queries.len())?;
    backend.lower_bounds(sorted, queries, out);
    Ok(())
}

/// Replace every id in `values` with its lower bound in `sorted`.
pub fn lower_bounds_in_place<B: Backend>(
    sorted: &mut ArrayHandle<Id, B>,
    values: &mut ArrayHandle<Id, B>,
) -> Result<(), MeshWorkletError> {
    let backend = sorted.backend().clone();
    let sorted = sorted.prepare_for_input()?;
    let values = values.exec_mut()?;
    let mut scratch = backend.allocate::<Id>(values.len())?;
    backend.lower_bounds(sorted, values, scratch.as_mut_slice());
    backend.copy(scratch.as_slice(), values);
    Ok(())
}

/// Duplicate `src` into `dst`, replacing `dst`'s contents.
pub fn copy<T: Element, B: Backend>(src: &mut ArrayHandle<T, B>, dst: &mut ArrayHandle<T, B>) -> Result<(), MeshWorkletError> {
    let backend = src.backend().clone();
    let from = src.prepare_for_input()?;
    let to = dst.output_slice(from.len())?;
    backend.copy(from, to);
    Ok(())
}

/// Keep `input[i]` wherever `stencil[i]` is truthy, in order.
pub fn stream_compact<T: Element, S: Truthy, B: Backend>(
    input: &mut ArrayHandle<T, B>,
    stencil: &mut ArrayHandle<S, B>,
) -> Result<ArrayHandle<T, B>, MeshWorkletError> {
    if input.len() != stencil.len() {
        return Err(MeshWorkletError::LengthMismatch {
            expected: input.len(),
            found: stencil.len(),
        });
    }
    let backend = input.backend().clone();
    let kept = backend.stream_compact(input.prepare_for_input()?, stencil.prepare_for_input()?)?;
    Ok(ArrayHandle::from_buffer(kept, backend))
}

/// `out[i] = values[indices[i]]`. Every index must be in range.
pub fn gather<T: Element, B: Backend>(
    values: &mut ArrayHandle<T, B>,
    indices: &mut ArrayHandle<Id, B>,
) -> Result<ArrayHandle<T, B>, MeshWorkletError> {
    let backend = values.backend().clone();
    let src = values.prepare_for_input()?;
    let idx = indices.prepare_for_input()?;
    if let Some(&bad) = idx.iter().find(|&&i| i >= src.len()) {
        return Err(MeshWorkletError::LengthMismatch {
            expected: src.len(),
            found: bad + 1,
        });
    }
    let mut out = ArrayHandle::new(backend.clone());
    {
        let portal = WritePortal::new(out.output_slice(idx.len())?);
        backend.schedule(
            |i| {
                // SAFETY: each unit writes only its own index.
                unsafe { portal.set(i, src[idx[i]]) };
            },
            idx.len(),
        );
    }
    Ok(out)
}

/// Handle holding `start, start + 1, .., start + n - 1`.
pub fn counting_sequence<B: Backend>(backend: &B, start: Id, n: Id) -> Result<ArrayHandle<Id, B>, MeshWorkletError> {
    let mut out = ArrayHandle::new(backend.clone());
    {
        let portal = out.prepare_for_output(n)?;
        backend.schedule(
            |i| {
                // SAFETY: each unit writes only its own index.
                unsafe { portal.set(i, start + i) };
            },
            n,
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::backend::SerialBackend;

    fn handle<T: Element>(v: Vec<T>) -> ArrayHandle<T, SerialBackend> {
        ArrayHandle::from_host(v, SerialBackend)
    }

    #[test]
    fn unique_shrinks_handle() {
        let mut h = handle(vec![3, 1, 3, 2, 1]);
        sort(&mut h).unwrap();
        assert_eq!(unique(&mut h).unwrap(), 3);
        assert_eq!(h.to_vec().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn lower_bounds_in_place_renumbers() {
        let mut sorted = handle(vec![2, 5, 9]);
        let mut ids = handle(vec![9, 2, 5, 5]);
        lower_bounds_in_place(&mut sorted, &mut ids).unwrap();
        assert_eq!(ids.to_vec().unwrap(), vec![2, 0, 1, 1]);
    }

    #[test]
    fn gather_rejects_out_of_range() {
        let mut values = handle(vec![10u8, 20, 30]);
        let mut idx = handle(vec![2, 0, 2]);
        assert_eq!(gather(&mut values, &mut idx).unwrap().to_vec().unwrap(), vec![30, 10, 30]);
        let mut bad = handle(vec![3]);
        assert!(gather(&mut values, &mut bad).is_err());
    }

    #[test]
    fn schedule_reports_raised_error() {
        let r = schedule(&SerialBackend, 4, |i, errors| {
            if i == 2 {
                errors.raise("boom");
            }
        });
        assert_eq!(r, Err(MeshWorkletError::WorkletRuntime("boom".into())));
    }

    #[test]
    fn counting_sequence_offsets() {
        let mut c = counting_sequence(&SerialBackend, 1, 3).unwrap();
        assert_eq!(c.to_vec().unwrap(), vec![1, 2, 3]);
    }
}
