//! Cell shape metadata and small fixed-size per-cell value lists.

use std::ops::Deref;

use crate::data::element::{Element, Id};

/// Largest number of points of any supported cell shape.
pub const MAX_CELL_POINTS: usize = 8;

/// Supported cell shapes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum CellShape {
    /// 0D vertex.
    #[default]
    Vertex,
    /// 1D segment.
    Line,
    /// 2D simplex.
    Triangle,
    /// 2D tensor-product cell.
    Quad,
    /// 3D simplex.
    Tetra,
    /// Axis-aligned hexahedron with lexicographic point order.
    Voxel,
    /// 3D tensor-product cell.
    Hexahedron,
    /// 3D wedge/prism.
    Wedge,
    /// 3D pyramid.
    Pyramid,
}

impl CellShape {
    /// Number of points that define one cell.
    pub fn num_points(self) -> usize {
        match self {
            CellShape::Vertex => 1,
            CellShape::Line => 2,
            CellShape::Triangle => 3,
            CellShape::Quad | CellShape::Tetra => 4,
            CellShape::Pyramid => 5,
            CellShape::Wedge => 6,
            CellShape::Voxel | CellShape::Hexahedron => 8,
        }
    }

    /// Topological dimension of the cell.
    pub fn dimension(self) -> u8 {
        match self {
            CellShape::Vertex => 0,
            CellShape::Line => 1,
            CellShape::Triangle | CellShape::Quad => 2,
            CellShape::Tetra
            | CellShape::Voxel
            | CellShape::Hexahedron
            | CellShape::Wedge
            | CellShape::Pyramid => 3,
        }
    }
}

/// Up to [`MAX_CELL_POINTS`] values, one per point of a cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellVec<T> {
    values: [T; MAX_CELL_POINTS],
    len: usize,
}

/// Point indices of one cell.
pub type CellPoints = CellVec<Id>;

/// Per-point field values gathered for one cell.
pub type CellValues<T> = CellVec<T>;

impl<T: Element> CellVec<T> {
    pub fn new() -> Self {
        Self {
            values: [T::default(); MAX_CELL_POINTS],
            len: 0,
        }
    }

    /// Copy of the first `MAX_CELL_POINTS` values of `src`.
    pub fn from_slice(src: &[T]) -> Self {
        let mut out = Self::new();
        let len = src.len().min(MAX_CELL_POINTS);
        out.values[..len].copy_from_slice(&src[..len]);
        out.len = len;
        out
    }

    pub(crate) fn push(&mut self, value: T) {
        if self.len < MAX_CELL_POINTS {
            self.values[self.len] = value;
            self.len += 1;
        }
    }
}

impl<T: Element> Default for CellVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for CellVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.values[..self.len]
    }
}
