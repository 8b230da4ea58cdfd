//! Dispatchers: bind a worklet to its arguments and drive the parallel region.
//!
//! | dispatcher                     | one invocation per            |
//! |--------------------------------|-------------------------------|
//! | [`DispatcherMapField`]         | element of the input fields   |
//! | [`DispatcherMapCell`]          | cell of the bound grid        |
//! | [`DispatcherGenerateTopology`] | generated output cell         |
//! | [`DispatcherReduceKeysValues`] | unique key                    |
//!
//! All of them validate the whole argument list before preparing any array,
//! reset the error buffer, run exactly one `schedule` and turn a raised
//! message into [`MeshWorkletError::WorkletRuntime`](crate::mesh_error::MeshWorkletError::WorkletRuntime).

pub(crate) mod binding;
pub mod generate;
pub mod map_cell;
pub mod map_field;
pub mod reduce_keys;

pub use generate::DispatcherGenerateTopology;
pub use map_cell::DispatcherMapCell;
pub use map_field::DispatcherMapField;
pub use reduce_keys::DispatcherReduceKeysValues;
