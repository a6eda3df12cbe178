//! Edge incidence analysis.
//!
//! Counts how many triangles share each undirected edge. A mesh whose edges
//! all have exactly two incident faces is closed (watertight).

use std::collections::HashMap;

use super::trimesh::Mesh;

/// Edge incidence summary for a triangle mesh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeTopology {
    /// Number of distinct undirected edges.
    pub num_edges: usize,
    /// Edges with exactly one incident face.
    pub boundary_edges: usize,
    /// Edges with more than two incident faces.
    pub non_manifold_edges: usize,
    /// Faces with a repeated vertex index.
    pub degenerate_faces: usize,
}

impl EdgeTopology {
    /// Analyze the edges of a mesh.
    pub fn of(mesh: &Mesh) -> Self {
        let counts = edge_face_counts(mesh);
        let degenerate_faces = mesh
            .faces
            .iter()
            .filter(|f| f[0] == f[1] || f[1] == f[2] || f[0] == f[2])
            .count();

        Self {
            num_edges: counts.len(),
            boundary_edges: counts.values().filter(|&&c| c == 1).count(),
            non_manifold_edges: counts.values().filter(|&&c| c > 2).count(),
            degenerate_faces,
        }
    }

    /// Every edge is shared by exactly two triangles.
    pub fn is_closed(&self) -> bool {
        self.num_edges > 0
            && self.boundary_edges == 0
            && self.non_manifold_edges == 0
            && self.degenerate_faces == 0
    }

    /// Euler characteristic `V - E + F` for the given mesh.
    pub fn euler_characteristic(&self, mesh: &Mesh) -> i64 {
        mesh.num_vertices() as i64 - self.num_edges as i64 + mesh.num_faces() as i64
    }
}

/// Map each undirected edge `(min, max)` to its number of incident faces.
pub fn edge_face_counts(mesh: &Mesh) -> HashMap<(usize, usize), usize> {
    let mut counts: HashMap<(usize, usize), usize> = HashMap::with_capacity(mesh.faces.len() * 2);
    for face in &mesh.faces {
        for i in 0..3 {
            let a = face[i];
            let b = face[(i + 1) % 3];
            if a == b {
                continue;
            }
            *counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
        }
    }
    counts
}

/// Convenience wrapper for [`EdgeTopology::is_closed`].
pub fn is_closed(mesh: &Mesh) -> bool {
    EdgeTopology::of(mesh).is_closed()
}
