//! STL (stereolithography) format support.
//!
//! Used to export individual structures for 3D printing or for tools that do
//! not read the JSON collection. Binary STL is written; both binary and
//! ASCII are read.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use nalgebra::Point3;

use crate::error::{AtlasError, Result};
use crate::mesh::Mesh;

/// Load a mesh from an STL file.
///
/// STL stores corners per triangle; corners with identical coordinates are
/// merged so the result is an indexed mesh. Triangles that collapse after
/// merging are dropped. Normals are recomputed from the winding.
///
/// # Example
///
/// ```no_run
/// use atlasmesh::io::stl;
///
/// let mesh = stl::load("Left-Hippocampus.stl").unwrap();
/// println!("{} triangles", mesh.num_faces());
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    let stl = stl_io::read_stl(&mut file).map_err(|e| AtlasError::LoadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut index_of: HashMap<[u32; 3], usize> = HashMap::new();
    let mut vertices: Vec<Point3<f64>> = Vec::new();
    let mut vertex_index = |v: &stl_io::Vertex| -> usize {
        // Adding zero folds -0.0 into 0.0 so both hash alike.
        let key = [(v[0] + 0.0).to_bits(), (v[1] + 0.0).to_bits(), (v[2] + 0.0).to_bits()];
        *index_of.entry(key).or_insert_with(|| {
            vertices.push(Point3::new(v[0] as f64, v[1] as f64, v[2] as f64));
            vertices.len() - 1
        })
    };

    let mut faces: Vec<[usize; 3]> = Vec::with_capacity(stl.faces.len());
    for tri in &stl.faces {
        let face = tri.vertices.map(|i| vertex_index(&stl.vertices[i]));
        if face[0] != face[1] && face[1] != face[2] && face[0] != face[2] {
            faces.push(face);
        }
    }

    if faces.is_empty() {
        return Err(AtlasError::LoadError {
            path: path.to_path_buf(),
            message: "STL file contains no valid triangles".to_string(),
        });
    }

    let mut mesh = Mesh::from_triangles(vertices, faces);
    mesh.recompute_normals();
    Ok(mesh)
}

/// Save a mesh to a binary STL file.
///
/// Facet normals are computed from the winding; per-vertex normals are not
/// representable in STL and are dropped.
pub fn save<P: AsRef<Path>>(mesh: &Mesh, path: P) -> Result<()> {
    let path = path.as_ref();
    mesh.validate()?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let vertex = |p: &Point3<f64>| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32]);
    let triangles: Vec<stl_io::Triangle> = (0..mesh.num_faces())
        .map(|f| {
            let [p0, p1, p2] = mesh.face_positions(f);
            let n = mesh.face_cross(f);
            let n = if n.norm() > 0.0 { n.normalize() } else { n };

            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [vertex(&p0), vertex(&p1), vertex(&p2)],
            }
        })
        .collect();

    stl_io::write_stl(&mut writer, triangles.iter()).map_err(|e| AtlasError::SaveError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::sphere_mesh;

    #[test]
    fn test_roundtrip_merges_corners() {
        let mesh = Mesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
        );
        let path = std::env::temp_dir().join("atlasmesh_tetra.stl");
        save(&mesh, &path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.num_vertices(), 4);
        assert_eq!(loaded.num_faces(), 4);
        assert_eq!(loaded.normals.len(), 4);
        assert!((loaded.surface_area() - mesh.surface_area()).abs() < 1e-6);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_degenerate_faces_dropped() {
        // Pole triangles of a latitude/longitude sphere collapse on load.
        let mesh = sphere_mesh([0.0; 3], 1.0);
        let path = std::env::temp_dir().join("atlasmesh_sphere.stl");
        save(&mesh, &path).unwrap();

        let loaded = load(&path).unwrap();
        assert!(loaded.num_faces() < mesh.num_faces());
        assert!(loaded.num_vertices() < mesh.num_vertices());
        assert!(loaded.validate().is_ok());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_invalid_mesh_not_written() {
        let mesh = Mesh::from_triangles(vec![Point3::origin()], vec![[0, 1, 2]]);
        let path = std::env::temp_dir().join("atlasmesh_invalid.stl");
        assert!(matches!(
            save(&mesh, &path),
            Err(AtlasError::InvalidVertexIndex { .. })
        ));
        assert!(!path.exists());
    }
}
