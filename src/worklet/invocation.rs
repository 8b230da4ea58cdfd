//! Per-index execution context handed to [`Worklet::execute`](super::Worklet::execute).
//!
//! Every accessor addresses a parameter by its slot in the signature. Misuse
//! (wrong slot, wrong element type, writing an input, asking for the cell of
//! a map-field dispatch) cannot fail the parallel region, so it raises into
//! the dispatch's [`ErrorMessageBuffer`] and returns a default value; the
//! dispatcher reports the message once the region has finished.

use std::marker::PhantomData;

use crate::data::element::{Element, Id, Vector3};
use crate::data::portal::{ErasedPortal, WritePortal};
use crate::topology::TopologyPortal;
use crate::topology::cell_shape::{CellPoints, CellValues};
use crate::worklet::error_buffer::ErrorMessageBuffer;

/// Which index a bound field is read at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReadAt {
    /// The invocation's own index (also the write index).
    Own,
    /// The input element the invocation was generated from.
    Source,
    /// Gathered through the points of the current cell.
    Points,
    /// Read as the value group of the current key.
    Group,
}

pub(crate) enum BoundSlot<'p> {
    Field {
        portal: ErasedPortal<'p>,
        broadcast: bool,
        read_at: ReadAt,
    },
    Topology,
}

/// Output-to-input mapping of a generate dispatch.
pub(crate) struct Scatter<'p> {
    pub(crate) source: &'p [Id],
    pub(crate) visit: &'p [Id],
}

/// Connectivity written by a generate dispatch.
pub(crate) struct CellsOut<'p> {
    pub(crate) connectivity: WritePortal<'p, Id>,
    pub(crate) points_per_cell: usize,
}

/// Value grouping of a reduce-by-key dispatch.
pub(crate) struct Groups<'p> {
    pub(crate) permutation: &'p [Id],
    pub(crate) starts: &'p [Id],
}

/// Everything a parallel region reads or writes, bound once per dispatch.
pub(crate) struct Bindings<'p> {
    pub(crate) slots: Vec<BoundSlot<'p>>,
    pub(crate) topology: Option<TopologyPortal<'p>>,
    pub(crate) scatter: Option<Scatter<'p>>,
    pub(crate) cells_out: Option<CellsOut<'p>>,
    pub(crate) groups: Option<Groups<'p>>,
    pub(crate) key_slot: Option<usize>,
    pub(crate) errors: &'p ErrorMessageBuffer,
}

/// Context of one unit of work.
pub struct Invocation<'r> {
    index: Id,
    source: Id,
    visit: Id,
    ctx: &'r Bindings<'r>,
}

impl<'r> Invocation<'r> {
    pub(crate) fn new(index: Id, ctx: &'r Bindings<'r>) -> Self {
        let (source, visit) = match &ctx.scatter {
            Some(s) => (s.source[index], s.visit[index]),
            None => (index, 0),
        };
        Self {
            index,
            source,
            visit,
            ctx,
        }
    }

    /// Index of this unit of work in the dispatch domain.
    pub fn index(&self) -> Id {
        self.index
    }

    /// Input cell this invocation works on; for a generate dispatch, the
    /// cell that produced the current output cell.
    pub fn cell_index(&self) -> Id {
        self.source
    }

    /// Input cell that produced the current output cell (generate dispatch).
    pub fn source_cell(&self) -> Id {
        self.source
    }

    /// Which of its source cell's outputs this invocation is (0-based).
    pub fn visit_index(&self) -> Id {
        self.visit
    }

    /// Record an error for the whole dispatch. Only the first one survives.
    pub fn raise_error(&self, message: &str) {
        self.ctx.errors.raise(message);
    }

    fn field_slot(&self, slot: usize) -> Option<(&ErasedPortal<'r>, bool, ReadAt)> {
        match self.ctx.slots.get(slot) {
            Some(BoundSlot::Field {
                portal,
                broadcast,
                read_at,
            }) => Some((portal, *broadcast, *read_at)),
            _ => {
                self.raise_error(&format!("parameter {slot} is not a bound field"));
                None
            }
        }
    }

    /// Value of field parameter `slot` for this invocation.
    pub fn field<T: Element>(&self, slot: usize) -> T {
        let Some((portal, broadcast, read_at)) = self.field_slot(slot) else {
            return T::default();
        };
        let at = match (broadcast, read_at) {
            (true, _) => 0,
            (false, ReadAt::Own) => self.index,
            (false, ReadAt::Source) => self.source,
            (false, ReadAt::Points) => {
                self.raise_error(&format!("parameter {slot} is point data; use point_field"));
                return T::default();
            }
            (false, ReadAt::Group) => {
                self.raise_error(&format!("parameter {slot} is grouped; use values"));
                return T::default();
            }
        };
        let value = if portal.is_writable() {
            // SAFETY: writable slots are read at the invocation's own index.
            unsafe { portal.get_owned::<T>(at) }
        } else {
            portal.get::<T>(at)
        };
        value.unwrap_or_else(|| {
            self.raise_error(&format!(
                "parameter {slot} holds {} values, not {}",
                portal.value_type().name(),
                std::any::type_name::<T>()
            ));
            T::default()
        })
    }

    /// Values of point field `slot` at each point of the current cell.
    pub fn point_field<T: Element>(&self, slot: usize) -> CellValues<T> {
        let mut out = CellValues::new();
        let Some((portal, broadcast, _)) = self.field_slot(slot) else {
            return out;
        };
        for &p in self.cell_points().iter() {
            match portal.get::<T>(if broadcast { 0 } else { p }) {
                Some(v) => out.push(v),
                None => {
                    self.raise_error(&format!("parameter {slot} cannot be read at point {p}"));
                    return CellValues::new();
                }
            }
        }
        out
    }

    /// Write `value` to output parameter `slot` at this invocation's index.
    pub fn set<T: Element>(&self, slot: usize, value: T) {
        let Some((portal, _, _)) = self.field_slot(slot) else {
            return;
        };
        // SAFETY: each unit of work writes only its own index.
        if !unsafe { portal.set(self.index, value) } {
            self.raise_error(&format!(
                "parameter {slot} is not a writable {} field",
                std::any::type_name::<T>()
            ));
        }
    }

    fn topology(&self) -> Option<&TopologyPortal<'r>> {
        if self.ctx.topology.is_none() {
            self.raise_error("no topology is bound to this dispatch");
        }
        self.ctx.topology.as_ref()
    }

    /// Point ids of the current cell.
    pub fn cell_points(&self) -> CellPoints {
        match self.topology() {
            Some(topo) if self.source < topo.number_of_cells() => topo.cell_points(self.source),
            Some(_) => {
                self.raise_error(&format!("cell {} is out of range", self.source));
                CellPoints::new()
            }
            None => CellPoints::new(),
        }
    }

    /// Coordinate of input point `point`.
    pub fn point_coordinates(&self, point: Id) -> Vector3 {
        match self.topology() {
            Some(topo) if point < topo.number_of_points() => topo.point_coordinate(point),
            Some(_) => {
                self.raise_error(&format!("point {point} is out of range"));
                Vector3::default()
            }
            None => Vector3::default(),
        }
    }

    /// Write the connectivity of the current output cell (generate dispatch).
    ///
    /// `points` are input point ids and must match the output shape size.
    pub fn set_cell_points(&self, points: &[Id]) {
        let Some(out) = &self.ctx.cells_out else {
            self.raise_error("this dispatch does not generate cells");
            return;
        };
        if points.len() != out.points_per_cell {
            self.raise_error(&format!(
                "output cells have {} points, got {}",
                out.points_per_cell,
                points.len()
            ));
            return;
        }
        let limit = self.ctx.topology.as_ref().map_or(0, |t| t.number_of_points());
        if let Some(bad) = points.iter().find(|&&p| p >= limit) {
            self.raise_error(&format!("generated point id {bad} is out of range"));
            return;
        }
        // SAFETY: the range belongs to this invocation's output cell.
        unsafe {
            out.connectivity
                .set_range(self.index * out.points_per_cell, points)
        };
    }

    /// Key of the current group (reduce-by-key dispatch).
    pub fn key<K: Element>(&self) -> K {
        match self.ctx.key_slot {
            Some(slot) => self.field(slot),
            None => {
                self.raise_error("this dispatch has no key");
                K::default()
            }
        }
    }

    /// Every value of parameter `slot` that shares the current key.
    pub fn values<T: Element>(&self, slot: usize) -> ValueGroup<'_, T> {
        let empty = ValueGroup {
            portal: None,
            members: &[],
            _marker: PhantomData,
        };
        let Some(groups) = &self.ctx.groups else {
            self.raise_error("this dispatch has no value groups");
            return empty;
        };
        let Some((portal, _, read_at)) = self.field_slot(slot) else {
            return empty;
        };
        if read_at != ReadAt::Group || !portal.value_type().is::<T>() {
            self.raise_error(&format!(
                "parameter {slot} is not a grouped {} value",
                std::any::type_name::<T>()
            ));
            return empty;
        }
        let start = groups.starts[self.index];
        let end = groups
            .starts
            .get(self.index + 1)
            .copied()
            .unwrap_or(groups.permutation.len());
        ValueGroup {
            portal: Some(*portal),
            members: &groups.permutation[start..end],
            _marker: PhantomData,
        }
    }
}

/// Values sharing one key, in their original index order.
pub struct ValueGroup<'a, T> {
    portal: Option<ErasedPortal<'a>>,
    members: &'a [Id],
    _marker: PhantomData<T>,
}

impl<T: Element> ValueGroup<'_, T> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, i: usize) -> T {
        match (&self.portal, self.members.get(i)) {
            (Some(portal), Some(&at)) => portal.get::<T>(at).unwrap_or_default(),
            _ => T::default(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}
