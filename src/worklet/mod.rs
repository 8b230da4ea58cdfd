//! Worklets: per-element functions with a declared role signature.
//!
//! A worklet declares an ordered list of [`Param`]s. Dispatchers match that
//! list positionally against the caller's [`Arg`]s, check every pairing
//! before any parallel region runs, and then call
//! [`Worklet::execute`] once per index with an [`Invocation`] that reads and
//! writes the bound arrays by parameter slot.
//!
//! ```ignore
//! struct Square;
//! impl Worklet for Square {
//!     fn signature(&self) -> Signature {
//!         Signature::new().field_in::<f32>().field_out::<f32>()
//!     }
//!     fn execute(&self, inv: &Invocation<'_>) {
//!         let x: f32 = inv.field(0);
//!         inv.set(1, x * x);
//!     }
//! }
//! ```

pub mod arg;
pub mod error_buffer;
pub mod invocation;

pub use arg::{Arg, Constant, FieldArg};
pub use error_buffer::{ERROR_MESSAGE_CAPACITY, ErrorMessageBuffer};
pub use invocation::{Invocation, ValueGroup};

use crate::data::element::{Element, ValueType};

/// Which mesh entity a field input is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Association {
    /// Indexed like the dispatch domain.
    #[default]
    Any,
    /// One value per mesh point; read per cell with `point_field`.
    Point,
    /// One value per mesh cell.
    Cell,
}

/// Role of one worklet parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    FieldIn(Association),
    FieldOut,
    FieldInOut,
    TopologyIn,
    Key,
    Value,
}

impl Role {
    pub fn is_output(self) -> bool {
        matches!(self, Role::FieldOut | Role::FieldInOut)
    }
}

/// One declared parameter: a role plus the element type for field roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Param {
    pub role: Role,
    pub value_type: Option<ValueType>,
}

/// Ordered parameter list of a worklet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T: Element>(mut self, role: Role) -> Self {
        self.params.push(Param {
            role,
            value_type: Some(ValueType::of::<T>()),
        });
        self
    }

    pub fn field_in<T: Element>(self) -> Self {
        self.with::<T>(Role::FieldIn(Association::Any))
    }

    pub fn field_in_point<T: Element>(self) -> Self {
        self.with::<T>(Role::FieldIn(Association::Point))
    }

    pub fn field_in_cell<T: Element>(self) -> Self {
        self.with::<T>(Role::FieldIn(Association::Cell))
    }

    pub fn field_out<T: Element>(self) -> Self {
        self.with::<T>(Role::FieldOut)
    }

    pub fn field_in_out<T: Element>(self) -> Self {
        self.with::<T>(Role::FieldInOut)
    }

    pub fn topology(mut self) -> Self {
        self.params.push(Param {
            role: Role::TopologyIn,
            value_type: None,
        });
        self
    }

    pub fn key<T: Element>(self) -> Self {
        self.with::<T>(Role::Key)
    }

    pub fn value<T: Element>(self) -> Self {
        self.with::<T>(Role::Value)
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Slots holding `role`, in order.
    pub fn slots_with(&self, role: Role) -> impl Iterator<Item = usize> + '_ {
        self.params
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.role == role)
            .map(|(slot, _)| slot)
    }
}

/// A per-element function run by a dispatcher.
///
/// Worklets are shared by every unit of work of a parallel region, so any
/// configuration (an iso-value, a scale factor) lives in immutable fields.
pub trait Worklet: Sync {
    fn signature(&self) -> Signature;

    fn execute(&self, invocation: &Invocation<'_>);
}
