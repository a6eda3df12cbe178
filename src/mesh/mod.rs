//! Core mesh data structures.
//!
//! # Overview
//!
//! The primary type is [`Mesh`], a face-vertex triangle mesh: an ordered list
//! of vertex positions, triangles as index triples into it, and optional
//! per-vertex normals. It is what surface extraction produces, what the
//! simplifier consumes, and what gets serialized for the web viewer.
//!
//! [`MeshCollection`] maps structure names to meshes and keeps insertion
//! order, so output files list structures in label table order.
//!
//! [`EdgeTopology`] summarizes edge incidence and answers whether a mesh is
//! closed.
//!
//! ```
//! use atlasmesh::mesh::{Mesh, EdgeTopology};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let mesh = Mesh::from_triangles(vertices, vec![[0, 1, 2]]);
//! assert!(mesh.validate().is_ok());
//! assert_eq!(EdgeTopology::of(&mesh).boundary_edges, 3);
//! ```

mod collection;
mod topology;
mod trimesh;

pub use collection::MeshCollection;
pub use topology::{edge_face_counts, is_closed, EdgeTopology};
pub use trimesh::Mesh;
