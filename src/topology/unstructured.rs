//! Irregular single-shape grid: explicit coordinates and connectivity.

use crate::algs::backend::Backend;
use crate::algs::primitives;
use crate::data::array_handle::ArrayHandle;
use crate::data::element::{Id, Vector3};
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshWorkletError;
use crate::topology::cell_shape::CellShape;
use crate::topology::{Grid, TopologyPortal};

/// Grid of cells of one [`CellShape`], stored as a point-coordinate array
/// and a flat connectivity array (`shape.num_points()` ids per cell).
#[derive(Debug)]
pub struct UnstructuredGrid<B: Backend> {
    shape: CellShape,
    coordinates: ArrayHandle<Vector3, B>,
    connectivity: ArrayHandle<Id, B>,
}

impl<B: Backend> UnstructuredGrid<B> {
    /// Empty grid whose cells will have `shape`.
    pub fn new(shape: CellShape, backend: B) -> Self {
        Self {
            shape,
            coordinates: ArrayHandle::new(backend.clone()),
            connectivity: ArrayHandle::new(backend),
        }
    }

    /// Grid over host data; validates the connectivity.
    pub fn from_host(
        shape: CellShape,
        coordinates: Vec<Vector3>,
        connectivity: Vec<Id>,
        backend: B,
    ) -> Result<Self, MeshWorkletError> {
        let grid = Self {
            shape,
            coordinates: ArrayHandle::from_host(coordinates, backend.clone()),
            connectivity: ArrayHandle::from_host(connectivity, backend),
        };
        grid.validate_invariants()?;
        Ok(grid)
    }

    pub fn shape(&self) -> CellShape {
        self.shape
    }

    pub fn coordinates(&mut self) -> &mut ArrayHandle<Vector3, B> {
        &mut self.coordinates
    }

    pub fn connectivity(&mut self) -> &mut ArrayHandle<Id, B> {
        &mut self.connectivity
    }

    pub fn set_point_coordinates(&mut self, coordinates: ArrayHandle<Vector3, B>) {
        self.coordinates = coordinates;
    }

    /// Replace the connectivity; its length must be a multiple of the shape size.
    pub fn set_cell_connectivity(&mut self, connectivity: ArrayHandle<Id, B>) -> Result<(), MeshWorkletError> {
        let per_cell = self.shape.num_points();
        if connectivity.len() % per_cell != 0 {
            return Err(MeshWorkletError::LengthMismatch {
                expected: connectivity.len().next_multiple_of(per_cell),
                found: connectivity.len(),
            });
        }
        self.connectivity = connectivity;
        self.debug_assert_invariants();
        Ok(())
    }

    /// Ids of cell `cell`, read on the host.
    pub fn cell_points(&mut self, cell: Id) -> Result<Vec<Id>, MeshWorkletError> {
        let per_cell = self.shape.num_points();
        let conn = self.connectivity.host_slice()?;
        conn.get(cell * per_cell..(cell + 1) * per_cell)
            .map(<[Id]>::to_vec)
            .ok_or(MeshWorkletError::LengthMismatch {
                expected: (cell + 1) * per_cell,
                found: conn.len(),
            })
    }
}

impl<B: Backend> Grid<B> for UnstructuredGrid<B> {
    fn number_of_points(&self) -> Id {
        self.coordinates.len()
    }

    fn number_of_cells(&self) -> Id {
        self.connectivity.len() / self.shape.num_points()
    }

    fn cell_shape(&self) -> CellShape {
        self.shape
    }

    fn prepare_topology(&mut self) -> Result<TopologyPortal<'_>, MeshWorkletError> {
        let connectivity = self.connectivity.prepare_for_input()?;
        let coordinates = self.coordinates.prepare_for_input()?;
        Ok(TopologyPortal::Explicit {
            shape: self.shape,
            connectivity,
            coordinates,
        })
    }

    fn point_coordinates(&mut self, backend: &B) -> Result<ArrayHandle<Vector3, B>, MeshWorkletError> {
        let mut out = ArrayHandle::new(backend.clone());
        primitives::copy(&mut self.coordinates, &mut out)?;
        Ok(out)
    }
}

impl<B: Backend> DebugInvariants for UnstructuredGrid<B> {
    /// Connectivity length is a multiple of the shape size and every id
    /// names an existing point. Ids are only checked while a host copy exists.
    fn validate_invariants(&self) -> Result<(), MeshWorkletError> {
        self.coordinates.validate_invariants()?;
        self.connectivity.validate_invariants()?;
        let per_cell = self.shape.num_points();
        let len = self.connectivity.len();
        if len % per_cell != 0 {
            return Err(MeshWorkletError::LengthMismatch {
                expected: len.next_multiple_of(per_cell),
                found: len,
            });
        }
        let points = self.coordinates.len();
        if let Some(bad) = self.connectivity.host_view().and_then(|c| c.iter().find(|&&id| id >= points)) {
            return Err(MeshWorkletError::LengthMismatch {
                expected: points,
                found: bad + 1,
            });
        }
        Ok(())
    }
}
