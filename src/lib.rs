#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-worklet
//!
//! mesh-worklet is a data-parallel execution runtime for mesh algorithms. An
//! algorithm is written once as a small per-element *worklet*; the runtime
//! moves arrays between host and backend storage when needed, runs the
//! worklet once per element, cell or generated cell on the chosen backend,
//! and drives topology-changing algorithms whose output size is only known
//! after a classification pass.
//!
//! ## Features
//! - [`ArrayHandle`](data::ArrayHandle): typed arrays with host/backend residency tracking
//! - Swappable [`Backend`](algs::Backend)s (serial, Rayon) with identical
//!   results for schedule, scan, sort, unique, lower-bound, copy and stream compaction
//! - Worklet binding with bind-time signature checks and a first-writer-wins
//!   error buffer for failures inside parallel regions
//! - Map-field, map-cell, reduce-by-key and generate-topology dispatchers
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! mesh-worklet = "0.3"
//! # features = ["rayon"] (default)
//! ```
//!
//! ## Backend selection
//!
//! Backends are explicit values threaded through array handles and
//! dispatchers. A process-wide default can be set once at startup with
//! [`config::set_default`] (or from `MESH_WORKLET_BACKEND` /
//! `MESH_WORKLET_THREADS`) and materialised with
//! [`AnyBackend::from_default`](algs::AnyBackend::from_default).
//!
//! ## Determinism
//!
//! Scans are restricted to integer element types and `unique` /
//! `stream_compact` are built from scan + schedule on every backend, so
//! serial and multi-core runs produce bit-identical results.

pub mod algs;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod dispatch;
pub mod mesh_error;
pub mod topology;
pub mod worklet;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "rayon")]
    pub use crate::algs::RayonBackend;
    pub use crate::algs::primitives;
    pub use crate::algs::{
        AnyBackend, Backend, GenerateConfig, GenerateSummary, PointMap, SerialBackend,
    };
    pub use crate::config::{BackendKind, RuntimeConfig};
    pub use crate::data::{ArrayHandle, Element, Id, Mask, Residency, Scalar, Vector3};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::dispatch::{
        DispatcherGenerateTopology, DispatcherMapCell, DispatcherMapField,
        DispatcherReduceKeysValues,
    };
    pub use crate::mesh_error::MeshWorkletError;
    pub use crate::topology::{CellShape, CellValues, Grid, UniformGrid, UnstructuredGrid};
    pub use crate::worklet::{Arg, Association, Invocation, Role, Signature, Worklet};
}
