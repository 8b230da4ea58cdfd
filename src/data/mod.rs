//! Data module: elements, backend storage, portals and array handles

pub mod array_handle;
pub mod element;
pub mod portal;
pub mod storage;

pub use crate::debug_invariants::DebugInvariants;

pub use array_handle::{ArrayHandle, Residency};
pub use element::{Element, Id, Mask, Scalar, Truthy, ValueType, Vector3, lerp};
pub use portal::WritePortal;
pub use storage::{Storage, VecStorage};
