//! Regular grid defined by origin, spacing and point extent.
//!
//! Coordinates and connectivity are computed on the fly; nothing is stored
//! per point or per cell. Axes with a single point are collapsed, so a
//! `[n, m, 1]` grid has quad cells and a `[n, 1, 1]` grid has line cells.

use crate::algs::backend::Backend;
use crate::data::array_handle::ArrayHandle;
use crate::data::element::{Id, Vector3};
use crate::data::portal::WritePortal;
use crate::mesh_error::MeshWorkletError;
use crate::topology::cell_shape::{CellPoints, CellShape};
use crate::topology::{Grid, TopologyPortal};

/// Corner offsets for quad, line and vertex cells: the first `2^k`
/// entries for `k` active axes, counter-clockwise.
const FACE_CORNERS: [[Id; 2]; 4] = [[0, 0], [1, 0], [1, 1], [0, 1]];

/// Voxel corner offsets, lexicographic with x fastest.
const VOXEL_CORNERS: [[Id; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformGrid {
    point_dims: [Id; 3],
    origin: Vector3,
    spacing: Vector3,
}

impl UniformGrid {
    /// Grid with `point_dims` points per axis (the inclusive extent plus one).
    ///
    /// Every axis needs at least one point.
    pub fn new(point_dims: [Id; 3], origin: Vector3, spacing: Vector3) -> Result<Self, MeshWorkletError> {
        if let Some(axis) = point_dims.iter().position(|&d| d == 0) {
            return Err(MeshWorkletError::LengthMismatch {
                expected: 1,
                found: point_dims[axis],
            });
        }
        Ok(Self {
            point_dims,
            origin,
            spacing,
        })
    }

    pub fn point_dims(&self) -> [Id; 3] {
        self.point_dims
    }

    pub fn cell_dims(&self) -> [Id; 3] {
        self.point_dims.map(|d| if d > 1 { d - 1 } else { 1 })
    }

    fn active_axes(&self) -> ([usize; 3], usize) {
        let mut axes = [0; 3];
        let mut k = 0;
        for (axis, &d) in self.point_dims.iter().enumerate() {
            if d > 1 {
                axes[k] = axis;
                k += 1;
            }
        }
        (axes, k)
    }

    pub fn shape(&self) -> CellShape {
        match self.active_axes().1 {
            3 => CellShape::Voxel,
            2 => CellShape::Quad,
            1 => CellShape::Line,
            _ => CellShape::Vertex,
        }
    }

    pub fn num_points(&self) -> Id {
        self.point_dims.iter().product()
    }

    pub fn num_cells(&self) -> Id {
        if self.active_axes().1 == 0 {
            return 1;
        }
        self.cell_dims().iter().product()
    }

    /// Flat point index of `(i, j, k)`.
    #[inline]
    pub fn point_index(&self, ijk: [Id; 3]) -> Id {
        let [nx, ny, _] = self.point_dims;
        ijk[0] + nx * (ijk[1] + ny * ijk[2])
    }

    #[inline]
    pub fn point_ijk(&self, index: Id) -> [Id; 3] {
        let [nx, ny, _] = self.point_dims;
        [index % nx, (index / nx) % ny, index / (nx * ny)]
    }

    #[inline]
    pub fn cell_ijk(&self, index: Id) -> [Id; 3] {
        let [cx, cy, _] = self.cell_dims();
        [index % cx, (index / cx) % cy, index / (cx * cy)]
    }

    pub fn point_coordinate(&self, index: Id) -> Vector3 {
        let ijk = self.point_ijk(index);
        [
            self.origin[0] + self.spacing[0] * ijk[0] as f32,
            self.origin[1] + self.spacing[1] * ijk[1] as f32,
            self.origin[2] + self.spacing[2] * ijk[2] as f32,
        ]
    }

    pub fn cell_points(&self, cell: Id) -> CellPoints {
        let base = self.cell_ijk(cell);
        let (axes, k) = self.active_axes();
        let mut out = CellPoints::new();
        let mut push = |corner: &[Id]| {
            let mut ijk = base;
            for (&axis, &offset) in axes[..k].iter().zip(corner) {
                ijk[axis] += offset;
            }
            out.push(self.point_index(ijk));
        };
        if k == 3 {
            VOXEL_CORNERS.iter().for_each(|c| push(&c[..]));
        } else {
            FACE_CORNERS[..1 << k].iter().for_each(|c| push(&c[..]));
        }
        out
    }
}

impl<B: Backend> Grid<B> for UniformGrid {
    fn number_of_points(&self) -> Id {
        self.num_points()
    }

    fn number_of_cells(&self) -> Id {
        self.num_cells()
    }

    fn cell_shape(&self) -> CellShape {
        self.shape()
    }

    fn prepare_topology(&mut self) -> Result<TopologyPortal<'_>, MeshWorkletError> {
        Ok(TopologyPortal::Uniform(*self))
    }

    fn point_coordinates(&mut self, backend: &B) -> Result<ArrayHandle<Vector3, B>, MeshWorkletError> {
        let n = self.num_points();
        let mut coords = ArrayHandle::new(backend.clone());
        {
            let out: WritePortal<'_, Vector3> = coords.prepare_for_output(n)?;
            let grid = *self;
            backend.schedule(
                |i| {
                    // SAFETY: each unit writes only its own index.
                    unsafe { out.set(i, grid.point_coordinate(i)) };
                },
                n,
            );
        }
        Ok(coords)
    }
}
