//! Isosurface extraction with marching cubes.
//!
//! Every cell of eight neighbouring grid samples is classified by which
//! corners lie below the isovalue; the case index selects a triangle
//! pattern over the cut cell edges. Vertices are keyed by the grid edge
//! they lie on, so neighbouring cells share them and closed shapes come out
//! watertight.
//!
//! # Example
//!
//! ```
//! use atlasmesh::algo::marching_cubes::marching_cubes;
//! use ndarray::Array3;
//!
//! let mut mask = Array3::<u8>::zeros((5, 5, 5));
//! mask[[2, 2, 2]] = 1;
//!
//! let surface = marching_cubes(&mask, 0.5, [1.0, 1.0, 1.0]).unwrap();
//! assert_eq!(surface.vertices.len(), 6);
//! assert_eq!(surface.faces.len(), 8);
//! ```
//!
//! # References
//!
//! - Lorensen, W. & Cline, H. (1987). "Marching Cubes: A High Resolution 3D
//!   Surface Construction Algorithm." SIGGRAPH '87.
//! - Bourke, P. (1994). "Polygonising a scalar field."

mod tables;

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};
use ndarray::Array3;

use crate::error::ExtractError;
use crate::mesh::Mesh;

use tables::{CORNER_OFFSETS, EDGE_CORNERS, TRI_TABLE};

/// Output of [`marching_cubes`].
#[derive(Debug, Clone, Default)]
pub struct Isosurface {
    /// Vertex positions in physical units (grid index times spacing).
    pub vertices: Vec<Point3<f64>>,

    /// Triangles as indices into `vertices`, wound counter-clockwise when
    /// seen from outside.
    pub faces: Vec<[usize; 3]>,

    /// Unit normals, one per vertex, pointing towards lower values.
    pub normals: Vec<Vector3<f64>>,
}

impl Isosurface {
    /// Convert into a [`Mesh`].
    pub fn into_mesh(self) -> Mesh {
        Mesh {
            vertices: self.vertices,
            faces: self.faces,
            normals: self.normals,
        }
    }
}

impl From<Isosurface> for Mesh {
    fn from(surface: Isosurface) -> Self {
        surface.into_mesh()
    }
}

/// Extract the isosurface of `field` at `level`.
///
/// Samples sit on an integer grid; `spacing` scales each axis of the output
/// coordinates. The region with values at or above `level` is treated as
/// the inside, so normals point towards lower values.
///
/// # Errors
///
/// - [`ExtractError::GridTooSmall`] if any dimension is below 2.
/// - [`ExtractError::InvalidSpacing`] unless every spacing is positive.
/// - [`ExtractError::NoSurface`] if the field is constant or no cell is cut.
/// - [`ExtractError::InvalidLevel`] if `level` is outside the data range.
pub fn marching_cubes<T>(
    field: &Array3<T>,
    level: f64,
    spacing: [f64; 3],
) -> Result<Isosurface, ExtractError>
where
    T: Copy + Into<f64>,
{
    let (nx, ny, nz) = field.dim();
    if nx < 2 || ny < 2 || nz < 2 {
        return Err(ExtractError::GridTooSmall {
            shape: [nx, ny, nz],
        });
    }
    if spacing.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
        return Err(ExtractError::InvalidSpacing { spacing });
    }

    let (min, max) = field
        .iter()
        .map(|&v| v.into())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v: f64| {
            (lo.min(v), hi.max(v))
        });
    if min == max {
        return Err(ExtractError::NoSurface { level });
    }
    if !(level >= min && level <= max) {
        return Err(ExtractError::InvalidLevel { level, min, max });
    }

    let mut builder = SurfaceBuilder::new(field, level, spacing);
    for x in 0..nx - 1 {
        for y in 0..ny - 1 {
            for z in 0..nz - 1 {
                builder.polygonize([x, y, z]);
            }
        }
    }

    if builder.faces.is_empty() {
        return Err(ExtractError::NoSurface { level });
    }
    Ok(builder.finish())
}

/// Accumulates shared vertices and triangles cell by cell.
struct SurfaceBuilder<'a, T> {
    field: &'a Array3<T>,
    level: f64,
    spacing: [f64; 3],
    edge_vertices: HashMap<(usize, usize), usize>,
    vertices: Vec<Point3<f64>>,
    normals: Vec<Vector3<f64>>,
    faces: Vec<[usize; 3]>,
}

impl<'a, T: Copy + Into<f64>> SurfaceBuilder<'a, T> {
    fn new(field: &'a Array3<T>, level: f64, spacing: [f64; 3]) -> Self {
        Self {
            field,
            level,
            spacing,
            edge_vertices: HashMap::new(),
            vertices: Vec::new(),
            normals: Vec::new(),
            faces: Vec::new(),
        }
    }

    #[inline]
    fn value(&self, p: [usize; 3]) -> f64 {
        self.field[p].into()
    }

    fn polygonize(&mut self, cell: [usize; 3]) {
        let corners = CORNER_OFFSETS.map(|o| [cell[0] + o[0], cell[1] + o[1], cell[2] + o[2]]);

        let mut case = 0usize;
        for (i, &c) in corners.iter().enumerate() {
            if self.value(c) < self.level {
                case |= 1 << i;
            }
        }

        for &tri in TRI_TABLE[case] {
            let face = tri.map(|e| {
                let [a, b] = EDGE_CORNERS[e as usize];
                self.edge_vertex(corners[a], corners[b])
            });
            self.faces.push(face);
        }
    }

    /// Index of the vertex on the grid edge between two adjacent samples.
    fn edge_vertex(&mut self, a: [usize; 3], b: [usize; 3]) -> usize {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let axis = (0..3).find(|&i| lo[i] != hi[i]).unwrap_or(0);
        let (_, ny, nz) = self.field.dim();
        let key = ((lo[0] * ny + lo[1]) * nz + lo[2], axis);

        if let Some(&index) = self.edge_vertices.get(&key) {
            return index;
        }

        let va = self.value(lo);
        let vb = self.value(hi);
        let t = if vb != va {
            ((self.level - va) / (vb - va)).clamp(0.0, 1.0)
        } else {
            0.5
        };

        let mut position = Point3::origin();
        for i in 0..3 {
            let coord = lo[i] as f64 + t * (hi[i] as f64 - lo[i] as f64);
            position[i] = coord * self.spacing[i];
        }

        let gradient = self.gradient(lo) * (1.0 - t) + self.gradient(hi) * t;

        let index = self.vertices.len();
        self.vertices.push(position);
        self.normals.push(-gradient);
        self.edge_vertices.insert(key, index);
        index
    }

    /// Central-difference gradient in physical units, one-sided at borders.
    fn gradient(&self, p: [usize; 3]) -> Vector3<f64> {
        let (sx, sy, sz) = self.field.dim();
        let shape = [sx, sy, sz];
        let mut g = Vector3::zeros();
        for axis in 0..3 {
            let mut lo = p;
            let mut hi = p;
            if p[axis] > 0 {
                lo[axis] -= 1;
            }
            if p[axis] + 1 < shape[axis] {
                hi[axis] += 1;
            }
            let steps = (hi[axis] - lo[axis]) as f64;
            g[axis] = (self.value(hi) - self.value(lo)) / (steps * self.spacing[axis]);
        }
        g
    }

    fn finish(mut self) -> Isosurface {
        let mut face_normals = vec![Vector3::zeros(); self.vertices.len()];
        for face in &mut self.faces {
            let [a, b, c] = *face;
            let mut cross =
                (self.vertices[b] - self.vertices[a]).cross(&(self.vertices[c] - self.vertices[a]));
            let reference = self.normals[a] + self.normals[b] + self.normals[c];
            if cross.dot(&reference) < 0.0 {
                face.swap(1, 2);
                cross = -cross;
            }
            for &v in face.iter() {
                face_normals[v] += cross;
            }
        }

        for (n, fallback) in self.normals.iter_mut().zip(face_normals) {
            let len = n.norm();
            if len > 1e-12 {
                *n /= len;
            } else {
                let len = fallback.norm();
                *n = if len > 0.0 { fallback / len } else { Vector3::z() };
            }
        }

        Isosurface {
            vertices: self.vertices,
            faces: self.faces,
            normals: self.normals,
        }
    }
}
