//! Arguments bound to worklet parameters.

use crate::algs::backend::Backend;
use crate::data::array_handle::ArrayHandle;
use crate::data::element::{Element, ValueType};
use crate::data::portal::ErasedPortal;
use crate::mesh_error::MeshWorkletError;
use crate::topology::Grid;

/// A field-like argument: something that can be prepared for input,
/// output or in-place access and handed to a parallel region.
///
/// Implemented by [`ArrayHandle`] and [`Constant`].
pub trait FieldArg<B: Backend> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn value_type(&self) -> ValueType;

    /// `true` when every index reads the same single value.
    fn is_constant(&self) -> bool {
        false
    }

    fn bind_input(&mut self) -> Result<ErasedPortal<'_>, MeshWorkletError>;

    fn bind_output(&mut self, n: usize) -> Result<ErasedPortal<'_>, MeshWorkletError>;

    fn bind_in_place(&mut self) -> Result<ErasedPortal<'_>, MeshWorkletError>;
}

impl<T: Element, B: Backend> FieldArg<B> for ArrayHandle<T, B> {
    fn len(&self) -> usize {
        ArrayHandle::len(self)
    }

    fn value_type(&self) -> ValueType {
        ValueType::of::<T>()
    }

    fn bind_input(&mut self) -> Result<ErasedPortal<'_>, MeshWorkletError> {
        Ok(ErasedPortal::read_only(self.prepare_for_input()?))
    }

    fn bind_output(&mut self, n: usize) -> Result<ErasedPortal<'_>, MeshWorkletError> {
        Ok(ErasedPortal::writable(self.prepare_for_output(n)?))
    }

    fn bind_in_place(&mut self) -> Result<ErasedPortal<'_>, MeshWorkletError> {
        Ok(ErasedPortal::writable(self.prepare_for_in_place()?))
    }
}

/// A single value broadcast to every invocation.
#[derive(Clone, Copy, Debug)]
pub struct Constant<T>(pub T);

impl<T: Element, B: Backend> FieldArg<B> for Constant<T> {
    fn len(&self) -> usize {
        1
    }

    fn value_type(&self) -> ValueType {
        ValueType::of::<T>()
    }

    fn is_constant(&self) -> bool {
        true
    }

    fn bind_input(&mut self) -> Result<ErasedPortal<'_>, MeshWorkletError> {
        Ok(ErasedPortal::read_only(std::slice::from_ref(&self.0)))
    }

    fn bind_output(&mut self, _n: usize) -> Result<ErasedPortal<'_>, MeshWorkletError> {
        Err(MeshWorkletError::mismatch(0, "a constant cannot be written"))
    }

    fn bind_in_place(&mut self) -> Result<ErasedPortal<'_>, MeshWorkletError> {
        Err(MeshWorkletError::mismatch(0, "a constant cannot be written"))
    }
}

/// One positional argument of a dispatch.
pub enum Arg<'h, B: Backend> {
    Field(&'h mut dyn FieldArg<B>),
    Constant(Box<dyn FieldArg<B>>),
    Topology(&'h mut dyn Grid<B>),
}

impl<'h, B: Backend> Arg<'h, B> {
    pub fn field<F: FieldArg<B> + 'h>(field: &'h mut F) -> Self {
        Arg::Field(field)
    }

    pub fn constant<T: Element>(value: T) -> Self {
        Arg::Constant(Box::new(Constant(value)))
    }

    pub fn topology<G: Grid<B> + 'h>(grid: &'h mut G) -> Self {
        Arg::Topology(grid)
    }

    /// Short-lived copy of this argument for composing argument lists.
    pub fn reborrow(&mut self) -> Arg<'_, B> {
        match self {
            Arg::Field(f) => Arg::Field(&mut **f),
            Arg::Constant(c) => Arg::Field(&mut **c),
            Arg::Topology(g) => Arg::Topology(&mut **g),
        }
    }

    pub(crate) fn as_field(&self) -> Option<&dyn FieldArg<B>> {
        match self {
            Arg::Field(f) => Some(&**f),
            Arg::Constant(c) => Some(&**c),
            Arg::Topology(_) => None,
        }
    }

    pub(crate) fn as_grid(&self) -> Option<&dyn Grid<B>> {
        match self {
            Arg::Topology(g) => Some(&**g),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Arg::Field(_) => "field",
            Arg::Constant(_) => "constant",
            Arg::Topology(_) => "topology",
        }
    }
}

impl<B: Backend> std::fmt::Debug for Arg<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_field() {
            Some(field) => f
                .debug_struct("Arg")
                .field("kind", &self.kind())
                .field("type", &field.value_type())
                .field("len", &field.len())
                .finish(),
            None => f.debug_struct("Arg").field("kind", &self.kind()).finish(),
        }
    }
}
