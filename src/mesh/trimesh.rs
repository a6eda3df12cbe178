//! Face-vertex triangle mesh.
//!
//! [`Mesh`] is the flat representation handed between pipeline stages and
//! written to disk: an ordered vertex list, triangles as index triples into
//! it, and optional per-vertex normals.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// A triangle mesh with optional per-vertex normals.
///
/// Serializes as `{"vertices": [[x,y,z],…], "faces": [[i,j,k],…],
/// "normals": [[x,y,z],…]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "MeshRecord", into = "MeshRecord")]
pub struct Mesh {
    /// Vertex positions.
    pub vertices: Vec<Point3<f64>>,

    /// Triangles as indices into `vertices`.
    pub faces: Vec<[usize; 3]>,

    /// Per-vertex normals. Either empty or the same length as `vertices`.
    pub normals: Vec<Vector3<f64>>,
}

/// On-disk layout of a [`Mesh`].
#[derive(Serialize, Deserialize)]
struct MeshRecord {
    vertices: Vec<[f64; 3]>,
    faces: Vec<[usize; 3]>,
    #[serde(default)]
    normals: Vec<[f64; 3]>,
}

impl From<MeshRecord> for Mesh {
    fn from(record: MeshRecord) -> Self {
        Mesh {
            vertices: record.vertices.into_iter().map(Point3::from).collect(),
            faces: record.faces,
            normals: record.normals.into_iter().map(Vector3::from).collect(),
        }
    }
}

impl From<Mesh> for MeshRecord {
    fn from(mesh: Mesh) -> Self {
        MeshRecord {
            vertices: mesh.vertices.iter().map(|p| [p.x, p.y, p.z]).collect(),
            faces: mesh.faces,
            normals: mesh.normals.iter().map(|n| [n.x, n.y, n.z]).collect(),
        }
    }
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh without normals.
    pub fn from_triangles(vertices: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: Vec::new(),
        }
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Whether the mesh has no vertices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether per-vertex normals are present.
    #[inline]
    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    /// Check the index and normal-count invariants.
    pub fn validate(&self) -> Result<()> {
        let n = self.vertices.len();
        for (fi, face) in self.faces.iter().enumerate() {
            for &vi in face {
                if vi >= n {
                    return Err(AtlasError::InvalidVertexIndex { face: fi, vertex: vi });
                }
            }
        }
        if !self.normals.is_empty() && self.normals.len() != n {
            return Err(AtlasError::NormalCountMismatch {
                vertices: n,
                normals: self.normals.len(),
            });
        }
        Ok(())
    }

    /// Get the positions of the three corners of a face.
    pub fn face_positions(&self, f: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.faces[f];
        [self.vertices[a], self.vertices[b], self.vertices[c]]
    }

    /// Unnormalized face normal; its length is twice the face area.
    pub fn face_cross(&self, f: usize) -> Vector3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        (p1 - p0).cross(&(p2 - p0))
    }

    /// Compute the area of a face.
    pub fn face_area(&self, f: usize) -> f64 {
        0.5 * self.face_cross(f).norm()
    }

    /// Compute the total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        (0..self.faces.len()).map(|f| self.face_area(f)).sum()
    }

    /// Compute the bounding box of the mesh.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?;
        let mut min = *first;
        let mut max = *first;

        for p in &self.vertices {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }

        Some((min, max))
    }

    /// Area-weighted vertex normals computed from face winding.
    ///
    /// Vertices not referenced by any face get a zero vector.
    pub fn area_weighted_normals(&self) -> Vec<Vector3<f64>> {
        let mut normals = vec![Vector3::zeros(); self.vertices.len()];
        for (f, face) in self.faces.iter().enumerate() {
            let n = self.face_cross(f);
            for &v in face {
                normals[v] += n;
            }
        }
        for n in &mut normals {
            let len = n.norm();
            if len > 0.0 {
                *n /= len;
            }
        }
        normals
    }

    /// Replace the normals with area-weighted normals from face winding.
    pub fn recompute_normals(&mut self) {
        self.normals = self.area_weighted_normals();
    }
}
