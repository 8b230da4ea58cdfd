//! Execution backends: the fixed set of data-parallel primitives every
//! algorithm in this crate is built from.
//!
//! All primitives are synchronous parallel regions: a call returns only when
//! every unit of work has finished. Backends differ in how they decompose the
//! work, never in the results they produce. Primitives a backend cannot run
//! natively with identical results (`unique`, `stream_compact`) are emulated
//! from `inclusive_scan` + `schedule` by the trait's default methods.

use std::fmt::Debug;

use num_traits::PrimInt;

use crate::config::{BackendKind, RuntimeConfig};
use crate::data::element::{Element, Id, Truthy};
use crate::data::portal::WritePortal;
use crate::data::storage::{Storage, VecStorage};
use crate::mesh_error::MeshWorkletError;

/// A swappable implementation of the parallel primitives.
pub trait Backend: Clone + Debug + Send + Sync + 'static {
    /// Backend-resident buffer type.
    type Buffer<T: Element>: Storage<T>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Allocate `len` default-initialised elements of backend storage.
    fn allocate<T: Element>(&self, len: usize) -> Result<Self::Buffer<T>, MeshWorkletError> {
        <Self::Buffer<T> as Storage<T>>::try_with_len(len)
    }

    /// Invoke `functor(i)` for every `i` in `[0, n)` in no particular order.
    fn schedule<F>(&self, functor: F, n: Id)
    where
        F: Fn(Id) + Send + Sync;

    /// `output[i] = input[0] + .. + input[i]`; returns the grand total.
    ///
    /// `output.len()` must equal `input.len()`. Fails with
    /// [`MeshWorkletError::Overflow`] if any partial sum leaves the range of
    /// `T`; `output` is unspecified in that case.
    fn inclusive_scan<T>(&self, input: &[T], output: &mut [T]) -> Result<T, MeshWorkletError>
    where
        T: Element + PrimInt;

    /// Ascending sort in place (not necessarily stable).
    fn sort<T: Element + Ord>(&self, values: &mut [T]);

    /// For each query, the first index in `sorted` whose value is not less
    /// than the query.
    fn lower_bounds<T: Element + Ord>(&self, sorted: &[T], queries: &[T], output: &mut [Id]);

    /// Element-wise copy; `dst.len()` must equal `src.len()`.
    fn copy<T: Element>(&self, src: &[T], dst: &mut [T]) {
        dst.copy_from_slice(src);
    }

    /// Remove adjacent duplicates in place; returns the new logical length.
    fn unique<T: Element + PartialEq>(&self, values: &mut [T]) -> Result<usize, MeshWorkletError> {
        let n = values.len();
        let mut flags = self.allocate::<Id>(n)?;
        {
            let src: &[T] = values;
            let portal = WritePortal::new(flags.as_mut_slice());
            self.schedule(
                |i| {
                    let keep = i == 0 || src[i] != src[i - 1];
                    // SAFETY: each unit writes only its own index.
                    unsafe { portal.set(i, Id::from(keep)) };
                },
                n,
            );
        }
        let mut offsets = self.allocate::<Id>(n)?;
        let total = self.inclusive_scan(flags.as_slice(), offsets.as_mut_slice())?;
        let mut kept = self.allocate::<T>(total)?;
        scatter_kept(self, values, flags.as_slice(), offsets.as_slice(), kept.as_mut_slice());
        self.copy(kept.as_slice(), &mut values[..total]);
        Ok(total)
    }

    /// Keep `input[i]` wherever `stencil[i]` is truthy, preserving order.
    ///
    /// `stencil.len()` must equal `input.len()`.
    fn stream_compact<T: Element, S: Truthy>(
        &self,
        input: &[T],
        stencil: &[S],
    ) -> Result<Self::Buffer<T>, MeshWorkletError> {
        let n = input.len();
        let mut flags = self.allocate::<Id>(n)?;
        {
            let portal = WritePortal::new(flags.as_mut_slice());
            self.schedule(
                |i| {
                    // SAFETY: each unit writes only its own index.
                    unsafe { portal.set(i, Id::from(stencil[i].is_truthy())) };
                },
                n,
            );
        }
        let mut offsets = self.allocate::<Id>(n)?;
        let total = self.inclusive_scan(flags.as_slice(), offsets.as_mut_slice())?;
        let mut out = self.allocate::<T>(total)?;
        scatter_kept(self, input, flags.as_slice(), offsets.as_slice(), out.as_mut_slice());
        Ok(out)
    }
}

/// Write every flagged `input[i]` to `out[offsets[i] - 1]`.
fn scatter_kept<B: Backend, T: Element>(
    backend: &B,
    input: &[T],
    flags: &[Id],
    offsets: &[Id],
    out: &mut [T],
) {
    let portal = WritePortal::new(out);
    backend.schedule(
        |i| {
            if flags[i] != 0 {
                // SAFETY: inclusive offsets of a 0/1 flag array are distinct
                // for every flagged index.
                unsafe { portal.set(offsets[i] - 1, input[i]) };
            }
        },
        input.len(),
    );
}

/// Single-threaded reference backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialBackend;

impl Backend for SerialBackend {
    type Buffer<T: Element> = VecStorage<T>;

    fn name(&self) -> &'static str {
        "serial"
    }

    fn schedule<F>(&self, functor: F, n: Id)
    where
        F: Fn(Id) + Send + Sync,
    {
        for i in 0..n {
            functor(i);
        }
    }

    fn inclusive_scan<T>(&self, input: &[T], output: &mut [T]) -> Result<T, MeshWorkletError>
    where
        T: Element + PrimInt,
    {
        let mut acc = T::zero();
        for (dst, &src) in output.iter_mut().zip(input) {
            acc = acc.checked_add(&src).ok_or_else(MeshWorkletError::scan_overflow)?;
            *dst = acc;
        }
        Ok(acc)
    }

    fn sort<T: Element + Ord>(&self, values: &mut [T]) {
        values.sort_unstable();
    }

    fn lower_bounds<T: Element + Ord>(&self, sorted: &[T], queries: &[T], output: &mut [Id]) {
        for (dst, q) in output.iter_mut().zip(queries) {
            *dst = sorted.partition_point(|x| x < q);
        }
    }
}

#[cfg(feature = "rayon")]
mod rayon_backend {
    use super::*;
    use rayon::prelude::*;
    use std::fmt;
    use std::sync::Arc;

    /// Elements per work chunk for the blocked scan.
    const SCAN_CHUNK: usize = 4096;

    /// Multi-core backend on top of Rayon.
    ///
    /// Uses the global Rayon pool unless built with [`RayonBackend::with_threads`].
    #[derive(Clone, Default)]
    pub struct RayonBackend {
        pool: Option<Arc<rayon::ThreadPool>>,
    }

    impl fmt::Debug for RayonBackend {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("RayonBackend")
                .field("threads", &self.num_threads())
                .finish()
        }
    }

    impl RayonBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Build a backend with a dedicated pool of `threads` workers.
        pub fn with_threads(threads: usize) -> Result<Self, MeshWorkletError> {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| MeshWorkletError::ThreadPool(e.to_string()))?;
            Ok(Self {
                pool: Some(Arc::new(pool)),
            })
        }

        pub fn num_threads(&self) -> usize {
            match &self.pool {
                Some(pool) => pool.current_num_threads(),
                None => rayon::current_num_threads(),
            }
        }

        fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
            match &self.pool {
                Some(pool) => pool.install(op),
                None => op(),
            }
        }
    }

    impl Backend for RayonBackend {
        type Buffer<T: Element> = VecStorage<T>;

        fn name(&self) -> &'static str {
            "rayon"
        }

        fn schedule<F>(&self, functor: F, n: Id)
        where
            F: Fn(Id) + Send + Sync,
        {
            if n == 0 {
                return;
            }
            self.install(|| (0..n).into_par_iter().for_each(|i| functor(i)));
        }

        fn inclusive_scan<T>(&self, input: &[T], output: &mut [T]) -> Result<T, MeshWorkletError>
        where
            T: Element + PrimInt,
        {
            if input.is_empty() {
                return Ok(T::zero());
            }
            self.install(|| -> Result<(), MeshWorkletError> {
                // Local scan per chunk.
                output
                    .par_chunks_mut(SCAN_CHUNK)
                    .zip(input.par_chunks(SCAN_CHUNK))
                    .try_for_each(|(dst, src)| {
                        let mut acc = T::zero();
                        for (d, &s) in dst.iter_mut().zip(src) {
                            acc = acc.checked_add(&s).ok_or_else(MeshWorkletError::scan_overflow)?;
                            *d = acc;
                        }
                        Ok::<(), MeshWorkletError>(())
                    })?;
                // Exclusive prefix of chunk totals.
                let mut carry = T::zero();
                let mut carries = Vec::with_capacity(output.len().div_ceil(SCAN_CHUNK));
                for chunk in output.chunks(SCAN_CHUNK) {
                    carries.push(carry);
                    let last = chunk.last().copied().unwrap_or_else(T::zero);
                    carry = carry.checked_add(&last).ok_or_else(MeshWorkletError::scan_overflow)?;
                }
                // Signed inputs can overflow mid-chunk even when the total fits.
                output
                    .par_chunks_mut(SCAN_CHUNK)
                    .zip(carries.par_iter())
                    .skip(1)
                    .try_for_each(|(dst, &c)| {
                        dst.iter_mut().try_for_each(|v| {
                            *v = v.checked_add(&c).ok_or_else(MeshWorkletError::scan_overflow)?;
                            Ok(())
                        })
                    })
            })?;
            Ok(output[output.len() - 1])
        }

        fn sort<T: Element + Ord>(&self, values: &mut [T]) {
            self.install(|| values.par_sort_unstable());
        }

        fn lower_bounds<T: Element + Ord>(&self, sorted: &[T], queries: &[T], output: &mut [Id]) {
            self.install(|| {
                output
                    .par_iter_mut()
                    .zip(queries.par_iter())
                    .for_each(|(dst, q)| *dst = sorted.partition_point(|x| x < q));
            });
        }

        fn copy<T: Element>(&self, src: &[T], dst: &mut [T]) {
            self.install(|| {
                dst.par_iter_mut()
                    .zip(src.par_iter())
                    .for_each(|(d, s)| *d = *s);
            });
        }
    }
}

#[cfg(feature = "rayon")]
pub use rayon_backend::RayonBackend;

/// Backend chosen at runtime from a [`RuntimeConfig`].
#[derive(Clone, Debug)]
pub enum AnyBackend {
    Serial(SerialBackend),
    #[cfg(feature = "rayon")]
    Rayon(RayonBackend),
}

impl Default for AnyBackend {
    fn default() -> Self {
        AnyBackend::Serial(SerialBackend)
    }
}

impl AnyBackend {
    /// Build the backend described by `config`.
    ///
    /// Requesting [`BackendKind::Rayon`] without the `rayon` feature falls
    /// back to the serial backend with a warning.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, MeshWorkletError> {
        match config.backend {
            BackendKind::Serial => Ok(AnyBackend::Serial(SerialBackend)),
            #[cfg(feature = "rayon")]
            BackendKind::Rayon => {
                let backend = match config.num_threads {
                    Some(threads) => RayonBackend::with_threads(threads)?,
                    None => RayonBackend::new(),
                };
                Ok(AnyBackend::Rayon(backend))
            }
            #[cfg(not(feature = "rayon"))]
            BackendKind::Rayon => {
                log::warn!("rayon backend requested but the `rayon` feature is disabled; using serial");
                Ok(AnyBackend::Serial(SerialBackend))
            }
        }
    }

    /// Build the backend described by the process-wide default configuration.
    pub fn from_default() -> Result<Self, MeshWorkletError> {
        Self::from_config(&crate::config::default_config())
    }
}

macro_rules! delegate {
    ($self:ident, $b:ident => $call:expr) => {
        match $self {
            AnyBackend::Serial($b) => $call,
            #[cfg(feature = "rayon")]
            AnyBackend::Rayon($b) => $call,
        }
    };
}

impl Backend for AnyBackend {
    type Buffer<T: Element> = VecStorage<T>;

    fn name(&self) -> &'static str {
        delegate!(self, b => b.name())
    }

    fn schedule<F>(&self, functor: F, n: Id)
    where
        F: Fn(Id) + Send + Sync,
    {
        delegate!(self, b => b.schedule(functor, n))
    }

    fn inclusive_scan<T>(&self, input: &[T], output: &mut [T]) -> Result<T, MeshWorkletError>
    where
        T: Element + PrimInt,
    {
        delegate!(self, b => b.inclusive_scan(input, output))
    }

    fn sort<T: Element + Ord>(&self, values: &mut [T]) {
        delegate!(self, b => b.sort(values))
    }

    fn lower_bounds<T: Element + Ord>(&self, sorted: &[T], queries: &[T], output: &mut [Id]) {
        delegate!(self, b => b.lower_bounds(sorted, queries, output))
    }

    fn copy<T: Element>(&self, src: &[T], dst: &mut [T]) {
        delegate!(self, b => b.copy(src, dst))
    }
}

static_assertions::assert_impl_all!(SerialBackend: Send, Sync);
static_assertions::assert_impl_all!(AnyBackend: Send, Sync);
