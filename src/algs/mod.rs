//! Execution backends, handle-level primitives and the generate-topology pipeline.

pub mod backend;
pub mod generate_topology;
pub mod primitives;

#[cfg(feature = "rayon")]
pub use backend::RayonBackend;
pub use backend::{AnyBackend, Backend, SerialBackend};
pub use generate_topology::{GenerateConfig, GenerateSummary, GenerateTopology, PointMap};
