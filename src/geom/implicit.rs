//! Isosurface extraction from scalar fields.
//!
//! The zero level set of a field is polygonized cell by cell over a
//! [`GridBox`], either with marching cubes or with marching tetrahedra (six
//! tetrahedra per cube around the 0-6 diagonal, which has no ambiguous
//! cases but emits more triangles). A point is inside when the field is
//! `<= 0`. Normals come from a forward-difference gradient, so they point
//! toward increasing field values.

use super::core::{BBox, Point3, Vec3};
use super::format::PrimitiveMode;
use super::marching_tables::{
    CORNER_OFFSETS, CUBE_EDGE_FLAGS, CUBE_EDGES, CUBE_TRIANGLES, TETRA_EDGE_FLAGS, TETRA_EDGES,
    TETRA_TRIANGLES, TETRAHEDRA_IN_CUBE,
};
use super::mesh::{Mesh, MeshError};

/// A scalar field `f(x, y, z)`.
pub trait ScalarField {
    fn sample(&self, x: f64, y: f64, z: f64) -> f64;
}

impl<F> ScalarField for F
where
    F: Fn(f64, f64, f64) -> f64,
{
    fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        self(x, y, z)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImplicitSurfaceError {
    #[error("grid resolution {resolution:?} must be at least 1 cell per axis")]
    InvalidResolution { resolution: [usize; 3] },
    #[error("grid bounds must be finite with min < max on every axis")]
    InvalidBounds,
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MarchingAlgorithm {
    #[default]
    Cubes,
    Tetrahedra,
}

/// Axis-aligned box split into `resolution[0] x resolution[1] x resolution[2]` cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridBox {
    pub min: Point3,
    pub max: Point3,
    pub resolution: [usize; 3],
}

impl GridBox {
    #[must_use]
    pub const fn new(min: Point3, max: Point3, resolution: [usize; 3]) -> Self {
        Self { min, max, resolution }
    }

    /// Cube `[-half, half]^3` with `cells` cells per axis.
    #[must_use]
    pub const fn centered(half: f64, cells: usize) -> Self {
        Self {
            min: Point3::new(-half, -half, -half),
            max: Point3::new(half, half, half),
            resolution: [cells; 3],
        }
    }

    pub fn validate(&self) -> Result<(), ImplicitSurfaceError> {
        if self.resolution.contains(&0) {
            return Err(ImplicitSurfaceError::InvalidResolution {
                resolution: self.resolution,
            });
        }
        let min = self.min.to_array();
        let max = self.max.to_array();
        let valid = min
            .iter()
            .zip(&max)
            .all(|(lo, hi)| lo.is_finite() && hi.is_finite() && lo < hi);
        if !valid {
            return Err(ImplicitSurfaceError::InvalidBounds);
        }
        Ok(())
    }

    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.resolution[0] * self.resolution[1] * self.resolution[2]
    }

    /// Position of lattice point `index` on one axis. Shared corners of
    /// neighbouring cells come out bit-identical.
    fn coordinate(&self, axis: usize, index: usize) -> f64 {
        let lo = self.min.to_array()[axis];
        let hi = self.max.to_array()[axis];
        let cells = self.resolution[axis];
        if index >= cells {
            hi
        } else {
            lo + (hi - lo) * (index as f64 / cells as f64)
        }
    }

    fn lattice_point(&self, i: usize, j: usize, k: usize) -> Point3 {
        Point3::new(self.coordinate(0, i), self.coordinate(1, j), self.coordinate(2, k))
    }

    fn cells(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        let [nx, ny, nz] = self.resolution;
        (0..nz).flat_map(move |k| (0..ny).flat_map(move |j| (0..nx).map(move |i| [i, j, k])))
    }
}

/// Corner positions, corner offsets and field values of one grid cell.
struct Cell {
    offsets: [[usize; 3]; 8],
    positions: [Point3; 8],
    values: [f64; 8],
}

impl Cell {
    fn sample<F: ScalarField>(field: &F, grid: &GridBox, [i, j, k]: [usize; 3]) -> Self {
        let positions = CORNER_OFFSETS.map(|[dx, dy, dz]| grid.lattice_point(i + dx, j + dy, k + dz));
        let values = positions.map(|p| field.sample(p.x, p.y, p.z));
        Self {
            offsets: CORNER_OFFSETS,
            positions,
            values,
        }
    }

    /// Zero crossing on the edge between two corners, always interpolated
    /// from the corner with the smaller lattice offset.
    fn crossing(&self, a: usize, b: usize) -> Point3 {
        let (a, b) = if self.offsets[a] <= self.offsets[b] { (a, b) } else { (b, a) };
        let (v0, v1) = (self.values[a], self.values[b]);
        let delta = v0 - v1;
        let t = if delta == 0.0 { 0.5 } else { v0 / delta };
        self.positions[a].lerp(self.positions[b], t)
    }
}

fn case_index(values: impl IntoIterator<Item = f64>) -> usize {
    values
        .into_iter()
        .enumerate()
        .filter(|(_, v)| *v <= 0.0)
        .fold(0, |case, (corner, _)| case | (1 << corner))
}

pub struct ImplicitSurface<F> {
    field: F,
}

impl<F: ScalarField> ImplicitSurface<F> {
    /// Forward-difference step of the gradient normals.
    pub const GRADIENT_STEP: f64 = 0.001;

    #[must_use]
    pub const fn new(field: F) -> Self {
        Self { field }
    }

    #[must_use]
    pub const fn field(&self) -> &F {
        &self.field
    }

    /// Unit gradient of the field at `p`, or zero where it vanishes.
    #[must_use]
    pub fn normal_at(&self, p: Point3) -> Vec3 {
        let h = Self::GRADIENT_STEP;
        let f0 = self.field.sample(p.x, p.y, p.z);
        Vec3::new(
            self.field.sample(p.x + h, p.y, p.z) - f0,
            self.field.sample(p.x, p.y + h, p.z) - f0,
            self.field.sample(p.x, p.y, p.z + h) - f0,
        )
        .normalized_or_zero()
    }

    /// Polygonizes the zero level set inside `grid` into `mesh` as
    /// triangles with gradient normals. Returns the number of triangles the
    /// mesh gained; the mesh attribute state is left as it was.
    pub fn eval_surface(
        &self,
        mesh: &mut Mesh,
        grid: &GridBox,
        algorithm: MarchingAlgorithm,
    ) -> Result<usize, ImplicitSurfaceError> {
        grid.validate()?;
        let saved = mesh.attribute_state();
        let before = mesh.primitive_count();

        let mut active_cells = 0usize;
        let mut result = Ok(());
        for index in grid.cells() {
            let cell = Cell::sample(&self.field, grid, index);
            let case = case_index(cell.values);
            if case == 0 || case == 0xff {
                continue;
            }
            active_cells += 1;
            result = match algorithm {
                MarchingAlgorithm::Cubes => self.march_cube(mesh, &cell, case),
                MarchingAlgorithm::Tetrahedra => self.march_tetrahedra(mesh, &cell),
            };
            if result.is_err() {
                break;
            }
        }
        mesh.restore_attribute_state(saved);
        result?;

        let triangles = mesh.primitive_count() - before;
        log::debug!(
            "implicit surface: {:?} over {} cells, {} active, {} triangles",
            algorithm,
            grid.cell_count(),
            active_cells,
            triangles
        );
        Ok(triangles)
    }

    fn march_cube(&self, mesh: &mut Mesh, cell: &Cell, case: usize) -> Result<(), MeshError> {
        let flags = CUBE_EDGE_FLAGS[case];
        let mut points = [Point3::ORIGIN; 12];
        for (edge, [a, b]) in CUBE_EDGES.iter().copied().enumerate() {
            if flags & (1 << edge) != 0 {
                points[edge] = cell.crossing(a, b);
            }
        }

        mesh.mode(PrimitiveMode::Triangles);
        for &edge in CUBE_TRIANGLES[case].iter().take_while(|&&e| e >= 0) {
            self.emit(mesh, points[edge as usize])?;
        }
        Ok(())
    }

    fn march_tetrahedra(&self, mesh: &mut Mesh, cell: &Cell) -> Result<(), MeshError> {
        for corners in &TETRAHEDRA_IN_CUBE {
            let case = case_index(corners.map(|c| cell.values[c]));
            let flags = TETRA_EDGE_FLAGS[case];
            if flags == 0 {
                continue;
            }

            let mut points = [Point3::ORIGIN; 6];
            for (edge, [a, b]) in TETRA_EDGES.iter().copied().enumerate() {
                if flags & (1 << edge) != 0 {
                    points[edge] = cell.crossing(corners[a], corners[b]);
                }
            }

            mesh.mode(PrimitiveMode::Triangles);
            for &edge in TETRA_TRIANGLES[case].iter().take_while(|&&e| e >= 0) {
                self.emit(mesh, points[edge as usize])?;
            }
        }
        Ok(())
    }

    fn emit(&self, mesh: &mut Mesh, p: Point3) -> Result<(), MeshError> {
        let n = self.normal_at(p);
        mesh.normal3(n.x, n.y, n.z).vertex3(p.x, p.y, p.z)?;
        Ok(())
    }

    /// Coarse bounds of the region worth a full scan.
    ///
    /// Each cell is tested with only four samples: its origin corner and
    /// the three axis-adjacent corners. Thin features that cross only the
    /// other four corners are missed, so this is a heuristic, unlike
    /// [`eval_surface`](Self::eval_surface) which samples all eight.
    pub fn find_box(&self, grid: &GridBox) -> Result<Option<BBox>, ImplicitSurfaceError> {
        grid.validate()?;
        let found = grid
            .cells()
            .filter(|&[i, j, k]| self.is_on_surface(grid, i, j, k))
            .fold(BBox::EMPTY, |bbox, [i, j, k]| {
                bbox.expand_point(grid.lattice_point(i, j, k))
                    .expand_point(grid.lattice_point(i + 1, j + 1, k + 1))
            });
        Ok((!found.is_empty()).then_some(found))
    }

    fn is_on_surface(&self, grid: &GridBox, i: usize, j: usize, k: usize) -> bool {
        let samples = [
            grid.lattice_point(i, j, k),
            grid.lattice_point(i + 1, j, k),
            grid.lattice_point(i, j + 1, k),
            grid.lattice_point(i, j, k + 1),
        ]
        .map(|p| self.field.sample(p.x, p.y, p.z) <= 0.0);
        samples.iter().any(|&inside| inside) && samples.iter().any(|&inside| !inside)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_index_sets_inside_bits() {
        assert_eq!(case_index([1.0, -1.0, 0.0, 2.0]), 0b0110);
        assert_eq!(case_index([1.0; 8]), 0);
        assert_eq!(case_index([-1.0; 8]), 0xff);
    }

    #[test]
    fn crossing_interpolates_and_handles_equal_values() {
        let grid = GridBox::new(Point3::ORIGIN, Point3::new(1.0, 1.0, 1.0), [1, 1, 1]);
        let plane = |x: f64, _: f64, _: f64| x - 0.25;
        let cell = Cell::sample(&plane, &grid, [0, 0, 0]);
        let p = cell.crossing(1, 0);
        assert!((p.x - 0.25).abs() < 1e-12);

        let flat = Cell {
            values: [0.0; 8],
            ..cell
        };
        assert!((flat.crossing(0, 1).x - 0.5).abs() < 1e-12);
    }

    #[test]
    fn gradient_normal_points_outward() {
        let sphere = ImplicitSurface::new(|x: f64, y: f64, z: f64| x * x + y * y + z * z - 1.0);
        let n = sphere.normal_at(Point3::new(1.0, 0.0, 0.0));
        assert!(n.x > 0.99);
    }

    #[test]
    fn grid_validation() {
        assert!(GridBox::centered(1.0, 4).validate().is_ok());
        assert!(matches!(
            GridBox::centered(1.0, 0).validate(),
            Err(ImplicitSurfaceError::InvalidResolution { .. })
        ));
        assert!(matches!(
            GridBox::centered(-1.0, 4).validate(),
            Err(ImplicitSurfaceError::InvalidBounds)
        ));
    }
}
