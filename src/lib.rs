//! # atlasmesh
//!
//! Converts labelled neuroimaging atlas volumes into surface meshes for
//! web-based visualization.
//!
//! Each structure in a label table is selected from the volume, cleaned up
//! with binary morphology, turned into a triangle surface with marching
//! cubes, and moved into the viewer's centred coordinate system. Dense
//! meshes get a decimated companion for fast loading, and both sets are
//! written as JSON keyed by structure name.
//!
//! ## Features
//!
//! - **Volumes**: NIfTI-1 label volumes (`.nii`, `.nii.gz`) with spacing and
//!   orientation, or synthetic volumes built in code
//! - **Atlas resolution**: ordered local search strategies with a full list
//!   of attempts on failure
//! - **Label tables**: FreeSurfer subcortical defaults, JSON or colour LUT files
//! - **Meshes**: marching cubes, stride decimation, JSON/STL/PLY export
//! - **Sample data**: parametric stand-ins when no atlas is available
//!
//! ## Quick Start
//!
//! ```no_run
//! use atlasmesh::prelude::*;
//!
//! let volume = atlasmesh::volume::nifti::load("aseg.nii.gz").unwrap();
//! let table = LabelTable::freesurfer_subcortical();
//! let options = PipelineOptions::default();
//!
//! let output = build_meshes(&volume, &table, &options).unwrap();
//! let simplified = simplify_collection(&output.meshes, &options.simplify);
//! atlasmesh::io::json::write_outputs("subcortical_meshes", &output.meshes, &simplified).unwrap();
//! ```
//!
//! ## Building From an In-Memory Volume
//!
//! ```
//! use atlasmesh::prelude::*;
//!
//! let mut volume = Volume::zeros([24, 24, 24]);
//! volume.fill_box([9, 9, 9], [15, 15, 15], 17);
//!
//! let output = build_meshes(
//!     &volume,
//!     &LabelTable::freesurfer_subcortical(),
//!     &PipelineOptions::default(),
//! )
//! .unwrap();
//!
//! let hippocampus = output.meshes.get("Left-Hippocampus").unwrap();
//! assert!(is_closed(hippocampus));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod io;
pub mod labels;
pub mod mesh;
pub mod pipeline;
pub mod sample;
pub mod volume;

pub use error::{AtlasError, ExtractError, Result};

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use atlasmesh::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::simplify::{simplify, SimplifyOptions};
    pub use crate::error::{AtlasError, ExtractError, Result};
    pub use crate::labels::LabelTable;
    pub use crate::mesh::{is_closed, EdgeTopology, Mesh, MeshCollection};
    pub use crate::pipeline::{
        build_meshes, simplify_collection, PipelineOptions, PipelineOutput, PipelineReport,
    };
    pub use crate::volume::{Orientation, Volume};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_cube_end_to_end() {
        let mut volume = Volume::zeros([30, 30, 30]);
        volume.fill_box([10, 10, 10], [20, 20, 20], 49);

        let output = build_meshes(
            &volume,
            &LabelTable::freesurfer_subcortical(),
            &PipelineOptions::default(),
        )
        .unwrap();

        let mesh = output.meshes.get("Right-Thalamus").unwrap();
        assert!(mesh.validate().is_ok());
        assert!(is_closed(mesh));
        assert_eq!(mesh.normals.len(), mesh.num_vertices());

        // Centred on the grid and mirrored left-right, the cube spans the
        // same interval on every axis.
        let (min, max) = mesh.bounding_box().unwrap();
        for i in 0..3 {
            assert!(min[i] > -6.0 && max[i] < 6.0);
        }
    }
}
