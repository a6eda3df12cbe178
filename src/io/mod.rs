//! Mesh file I/O.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Notes |
//! |--------|-----------|------|------|-------|
//! | JSON | `.json` | ✓ | ✓ | Viewer format; single meshes or collections |
//! | STL | `.stl` | ✓ | ✓ | Binary written, binary and ASCII read |
//! | PLY | `.ply` | ✓ | ✓ | ASCII, keeps normals |
//!
//! # Usage
//!
//! ```no_run
//! use atlasmesh::io::{load, save};
//!
//! let mesh = load("Left-Thalamus.ply").unwrap();
//! save(&mesh, "Left-Thalamus.stl").unwrap();
//! ```
//!
//! Collections are always JSON:
//!
//! ```no_run
//! use atlasmesh::io::json;
//!
//! let meshes = json::load_collection("subcortical_meshes.json").unwrap();
//! for (name, mesh) in meshes.iter() {
//!     println!("{}: {} vertices", name, mesh.num_vertices());
//! }
//! ```

pub mod json;
pub mod ply;
pub mod stl;

use std::path::Path;

use crate::error::{AtlasError, Result};
use crate::mesh::Mesh;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON viewer format.
    Json,
    /// STL (stereolithography) format.
    Stl,
    /// PLY (Stanford polygon) format.
    Ply,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "json" => Some(Format::Json),
            "stl" => Some(Format::Stl),
            "ply" => Some(Format::Ply),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }

    /// Canonical file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Stl => "stl",
            Format::Ply => "ply",
        }
    }
}

fn detect(path: &Path) -> Result<Format> {
    Format::from_path(path).ok_or_else(|| AtlasError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a mesh from a file with automatic format detection.
///
/// The format is determined by the file extension.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Json => json::load(path),
        Format::Stl => stl::load(path),
        Format::Ply => ply::load(path),
    }
}

/// Save a mesh to a file with automatic format detection.
///
/// The format is determined by the file extension.
pub fn save<P: AsRef<Path>>(mesh: &Mesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Json => json::save(mesh, path),
        Format::Stl => stl::save(mesh, path),
        Format::Ply => ply::save(mesh, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::curved_mesh;

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path("a/b/Left-Thalamus.STL"), Some(Format::Stl));
        assert_eq!(Format::from_path("meshes.json"), Some(Format::Json));
        assert_eq!(Format::from_path("mesh.obj"), None);
        assert_eq!(Format::from_path("mesh"), None);
        assert_eq!(Format::Ply.extension(), "ply");
    }

    #[test]
    fn test_unsupported_extension() {
        let mesh = curved_mesh([0.0; 3], 1.0);
        match save(&mesh, std::env::temp_dir().join("atlasmesh_mesh.obj")) {
            Err(AtlasError::UnsupportedFormat { extension }) => assert_eq!(extension, "obj"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_json_dispatch() {
        let mesh = curved_mesh([0.0; 3], 1.0);
        let path = std::env::temp_dir().join("atlasmesh_single.json");
        save(&mesh, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.faces, mesh.faces);
        assert_eq!(loaded.normals.len(), mesh.num_vertices());
        std::fs::remove_file(&path).ok();
    }
}
