//! Mesh types consumed by the dispatchers.
//!
//! Dispatchers only see meshes through the [`Grid`] trait: point and cell
//! counts, the cell shape, a read-only execution view of the connectivity
//! ([`TopologyPortal`]) and a materialised coordinate array. Two concrete
//! grids are provided:
//! - [`UniformGrid`]: origin/spacing/extent, everything computed on the fly
//! - [`UnstructuredGrid`]: explicit coordinates and connectivity, written by
//!   the generate-topology pipeline

pub mod cell_shape;
pub mod uniform;
pub mod unstructured;

pub use cell_shape::{CellPoints, CellShape, CellValues, CellVec, MAX_CELL_POINTS};
pub use uniform::UniformGrid;
pub use unstructured::UnstructuredGrid;

use crate::algs::backend::Backend;
use crate::data::array_handle::ArrayHandle;
use crate::data::element::{Id, Vector3};
use crate::mesh_error::MeshWorkletError;

/// Mesh accessor bound to the `TopologyIn` role of a worklet.
pub trait Grid<B: Backend> {
    fn number_of_points(&self) -> Id;

    fn number_of_cells(&self) -> Id;

    fn cell_shape(&self) -> CellShape;

    /// Execution view of the connectivity and coordinates; transfers the
    /// underlying arrays to the backend if needed.
    fn prepare_topology(&mut self) -> Result<TopologyPortal<'_>, MeshWorkletError>;

    /// Point coordinates as a new array handle on `backend`.
    fn point_coordinates(&mut self, backend: &B) -> Result<ArrayHandle<Vector3, B>, MeshWorkletError>;
}

/// Read-only execution view of a mesh, shared by every unit of work.
#[derive(Clone, Copy, Debug)]
pub enum TopologyPortal<'a> {
    Uniform(UniformGrid),
    Explicit {
        shape: CellShape,
        connectivity: &'a [Id],
        coordinates: &'a [Vector3],
    },
}

impl TopologyPortal<'_> {
    pub fn number_of_points(&self) -> Id {
        match self {
            TopologyPortal::Uniform(g) => g.num_points(),
            TopologyPortal::Explicit { coordinates, .. } => coordinates.len(),
        }
    }

    pub fn number_of_cells(&self) -> Id {
        match self {
            TopologyPortal::Uniform(g) => g.num_cells(),
            TopologyPortal::Explicit {
                shape, connectivity, ..
            } => connectivity.len() / shape.num_points(),
        }
    }

    pub fn cell_shape(&self) -> CellShape {
        match self {
            TopologyPortal::Uniform(g) => g.shape(),
            TopologyPortal::Explicit { shape, .. } => *shape,
        }
    }

    /// Point ids of `cell`. The caller guarantees `cell < number_of_cells()`.
    pub fn cell_points(&self, cell: Id) -> CellPoints {
        match self {
            TopologyPortal::Uniform(g) => g.cell_points(cell),
            TopologyPortal::Explicit {
                shape, connectivity, ..
            } => {
                let n = shape.num_points();
                CellPoints::from_slice(&connectivity[cell * n..(cell + 1) * n])
            }
        }
    }

    /// Coordinate of `point`. The caller guarantees `point < number_of_points()`.
    pub fn point_coordinate(&self, point: Id) -> Vector3 {
        match self {
            TopologyPortal::Uniform(g) => g.point_coordinate(point),
            TopologyPortal::Explicit { coordinates, .. } => coordinates[point],
        }
    }
}
