//! JSON mesh files for the web viewer.
//!
//! A collection file is one JSON object keyed by structure name:
//!
//! ```json
//! {
//!   "Left-Thalamus": {
//!     "vertices": [[x, y, z], ...],
//!     "faces": [[i, j, k], ...],
//!     "normals": [[x, y, z], ...]
//!   }
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{AtlasError, Result};
use crate::mesh::{Mesh, MeshCollection};

/// File name of the full-resolution collection.
pub const MESHES_FILE: &str = "subcortical_meshes.json";

/// File name of the simplified collection.
pub const SIMPLIFIED_FILE: &str = "subcortical_meshes_simplified.json";

/// File name of the built-in sample collection.
pub const SAMPLE_FILE: &str = "subcortical_meshes_sample.json";

fn write_pretty<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Write a collection as pretty-printed JSON.
pub fn save_collection<P: AsRef<Path>>(collection: &MeshCollection, path: P) -> Result<()> {
    let path = path.as_ref();
    for (name, mesh) in collection.iter() {
        mesh.validate().map_err(|e| AtlasError::SaveError {
            path: path.to_path_buf(),
            message: format!("{}: {}", name, e),
        })?;
    }
    write_pretty(collection, path)
}

/// Read a collection file, validating every mesh.
pub fn load_collection<P: AsRef<Path>>(path: P) -> Result<MeshCollection> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let collection: MeshCollection =
        serde_json::from_reader(reader).map_err(|e| AtlasError::LoadError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    for (name, mesh) in collection.iter() {
        mesh.validate().map_err(|e| AtlasError::LoadError {
            path: path.to_path_buf(),
            message: format!("{}: {}", name, e),
        })?;
    }
    Ok(collection)
}

/// Write a single mesh as JSON.
pub fn save<P: AsRef<Path>>(mesh: &Mesh, path: P) -> Result<()> {
    mesh.validate()?;
    write_pretty(mesh, path.as_ref())
}

/// Read a single mesh from JSON.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mesh: Mesh = serde_json::from_reader(reader).map_err(|e| AtlasError::LoadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    mesh.validate()?;
    Ok(mesh)
}

/// Write the full and simplified collections into `dir`, creating it if
/// needed. Returns the two file paths.
pub fn write_outputs<P: AsRef<Path>>(
    dir: P,
    full: &MeshCollection,
    simplified: &MeshCollection,
) -> Result<(PathBuf, PathBuf)> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let full_path = dir.join(MESHES_FILE);
    save_collection(full, &full_path)?;
    log::info!("Saved {} meshes to {}", full.len(), full_path.display());

    let simplified_path = dir.join(SIMPLIFIED_FILE);
    save_collection(simplified, &simplified_path)?;
    log::info!("Saved simplified meshes to {}", simplified_path.display());

    Ok((full_path, simplified_path))
}
