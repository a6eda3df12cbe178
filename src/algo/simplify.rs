//! Stride-based vertex decimation for web display.
//!
//! Dense meshes keep every `S`-th vertex, where `S` is chosen so roughly
//! `target_vertices` remain. Faces survive only when all three corners were
//! kept; everything else is dropped, so the result is a sparse subset of
//! the original triangles rather than a re-triangulated surface. If no
//! face survives the original mesh is returned unchanged.
//!
//! # Example
//!
//! ```
//! use atlasmesh::algo::simplify::{simplify, SimplifyOptions};
//! use atlasmesh::mesh::Mesh;
//! use nalgebra::Point3;
//!
//! let vertices: Vec<_> = (0..3000).map(|i| Point3::new(i as f64, (i % 7) as f64, 0.0)).collect();
//! let faces: Vec<[usize; 3]> = (0..2988).step_by(6).map(|i| [i, i + 6, i + 12]).collect();
//! let mesh = Mesh::from_triangles(vertices, faces);
//!
//! let simplified = simplify(&mesh, &SimplifyOptions::default());
//! assert_eq!(simplified.num_vertices(), 500);
//! assert!(simplified.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::mesh::Mesh;

/// Options for [`simplify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyOptions {
    /// Meshes with at most this many vertices are left alone.
    pub vertex_threshold: usize,

    /// Approximate number of vertices to keep.
    pub target_vertices: usize,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            vertex_threshold: 1000,
            target_vertices: 500,
        }
    }
}

impl SimplifyOptions {
    /// Set the vertex count above which meshes are simplified.
    pub fn with_vertex_threshold(mut self, threshold: usize) -> Self {
        self.vertex_threshold = threshold;
        self
    }

    /// Set the approximate number of vertices to keep (at least 1).
    pub fn with_target_vertices(mut self, target: usize) -> Self {
        self.target_vertices = target.max(1);
        self
    }

    /// Stride for a mesh with `num_vertices` vertices.
    pub fn stride(&self, num_vertices: usize) -> usize {
        (num_vertices / self.target_vertices.max(1)).max(1)
    }
}

/// Simplify a mesh, falling back to a copy of the input when it is small
/// enough already or when decimation leaves no faces.
pub fn simplify(mesh: &Mesh, options: &SimplifyOptions) -> Mesh {
    try_simplify(mesh, options).unwrap_or_else(|| mesh.clone())
}

/// Simplify a mesh, or `None` when the input should be used as is.
///
/// The input is expected to be a triangulated surface. A mesh without faces
/// has nothing to decimate and is always returned as `None`, so the output
/// never gains faceless vertices that the input did not already have.
pub fn try_simplify(mesh: &Mesh, options: &SimplifyOptions) -> Option<Mesh> {
    let n = mesh.num_vertices();
    if n <= options.vertex_threshold {
        return None;
    }
    if mesh.faces.is_empty() {
        log::debug!("{} vertices but no faces; nothing to simplify", n);
        return None;
    }
    let stride = options.stride(n);
    let decimated = decimate_by_stride(mesh, stride);
    if decimated.faces.is_empty() {
        log::debug!(
            "stride {} kept no faces of {}; using the unsimplified mesh",
            stride,
            mesh.num_faces()
        );
        return None;
    }
    Some(decimated)
}

/// Keep vertices `0, stride, 2*stride, …` and the faces made only of them.
///
/// Normals are truncated to the kept vertex count by position when the
/// input has at least that many, otherwise dropped.
pub fn decimate_by_stride(mesh: &Mesh, stride: usize) -> Mesh {
    let stride = stride.max(1);
    let n = mesh.num_vertices();

    let mut remap = vec![usize::MAX; n];
    let mut vertices = Vec::with_capacity(n / stride + 1);
    for (new_index, old_index) in (0..n).step_by(stride).enumerate() {
        remap[old_index] = new_index;
        vertices.push(mesh.vertices[old_index]);
    }

    let faces = mesh
        .faces
        .iter()
        .filter_map(|face| {
            let mapped = face.map(|v| remap.get(v).copied().unwrap_or(usize::MAX));
            mapped.iter().all(|&v| v != usize::MAX).then_some(mapped)
        })
        .collect();

    let kept = vertices.len();
    let normals = if mesh.normals.len() >= kept {
        mesh.normals[..kept].to_vec()
    } else {
        Vec::new()
    };

    Mesh {
        vertices,
        faces,
        normals,
    }
}
