//! Error types for atlasmesh.
//!
//! [`AtlasError`] covers everything that can abort a run. Per-structure
//! surface extraction failures use the lighter [`ExtractError`], which the
//! pipeline recovers from locally by skipping the structure.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`AtlasError`].
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Errors that can occur while loading atlases or building meshes.
#[derive(Error, Debug)]
pub enum AtlasError {
    /// Every atlas resolution strategy was tried and none produced a file.
    #[error("no suitable atlas found (tried: {})", attempts.join("; "))]
    AtlasNotFound {
        /// One line per strategy describing why it failed.
        attempts: Vec<String>,
    },

    /// The volume could not be decoded as NIfTI.
    #[error("failed to read NIfTI volume {path}: {message}")]
    Nifti {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The volume does not have the expected dimensionality.
    #[error("expected a 3D volume, got {ndim}D")]
    InvalidDimensions {
        /// Number of dimensions found.
        ndim: usize,
    },

    /// Voxel axes are permuted relative to the renderer's convention.
    #[error("unsupported volume orientation {orientation} (target {target})")]
    UnsupportedOrientation {
        /// Orientation code of the volume, e.g. `PSR`.
        orientation: String,
        /// Orientation code the renderer expects.
        target: String,
    },

    /// Every structure in the label table was skipped.
    #[error("no meshes generated ({skipped} structures skipped)")]
    NoMeshesGenerated {
        /// Number of structures that were attempted and skipped.
        skipped: usize,
    },

    /// A mesh violates its index invariants.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// Normals exist but do not match the vertex count.
    #[error("mesh has {normals} normals for {vertices} vertices")]
    NormalCountMismatch {
        /// Number of vertices.
        vertices: usize,
        /// Number of normals.
        normals: usize,
    },

    /// Surface extraction failed outside the per-structure loop.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// A label table file could not be parsed.
    #[error("invalid label table {path}: {message}")]
    LabelTable {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error loading a mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving a mesh to file.
    #[error("failed to save mesh to {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl AtlasError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        AtlasError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

/// Reasons marching cubes can fail to produce a surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// No cell of the grid crosses the isovalue.
    #[error("no surface crosses level {level}")]
    NoSurface {
        /// The requested isovalue.
        level: f64,
    },

    /// At least one grid dimension is too small to hold a cell.
    #[error("grid {shape:?} is too small for surface extraction")]
    GridTooSmall {
        /// Shape of the grid.
        shape: [usize; 3],
    },

    /// The isovalue lies outside the range of the data.
    #[error("level {level} is outside the data range [{min}, {max}]")]
    InvalidLevel {
        /// The requested isovalue.
        level: f64,
        /// Smallest value in the grid.
        min: f64,
        /// Largest value in the grid.
        max: f64,
    },

    /// Grid spacing must be positive and finite.
    #[error("invalid grid spacing {spacing:?}")]
    InvalidSpacing {
        /// The offending spacing.
        spacing: [f64; 3],
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atlas_not_found_lists_attempts() {
        let err = AtlasError::AtlasNotFound {
            attempts: vec!["aseg: no match".to_string(), "dseg: empty".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("aseg: no match"));
        assert!(message.contains("dseg: empty"));
    }

    #[test]
    fn test_extract_error_converts() {
        let err: AtlasError = ExtractError::NoSurface { level: 0.5 }.into();
        assert_eq!(err.to_string(), "no surface crosses level 0.5");
    }

    #[test]
    fn test_invalid_param() {
        let err = AtlasError::invalid_param("target_vertices", 0, "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid parameter: target_vertices = 0 (must be positive)"
        );
    }
}
