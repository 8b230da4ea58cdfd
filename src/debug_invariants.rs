//! Structural self-checks for array handles and grids.
//!
//! [`DebugInvariants::validate_invariants`] is always available and returns
//! the first broken invariant. [`DebugInvariants::debug_assert_invariants`]
//! panics on one, but only in debug builds or with the `strict-invariants`
//! feature; release builds compile it to nothing.

use crate::mesh_error::MeshWorkletError;

pub trait DebugInvariants {
    /// First broken invariant, if any.
    fn validate_invariants(&self) -> Result<(), MeshWorkletError>;

    /// Panic on a broken invariant in checked builds.
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), std::any::type_name::<Self>());
    }
}

/// Evaluate a `Result`-returning check and panic with `$what` as context,
/// in checked builds only.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $what:expr) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants"))]
        if let Err(e) = $check {
            panic!("[invariants] {}: {}", $what, e);
        }
    };
}
