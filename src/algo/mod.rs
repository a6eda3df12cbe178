//! Volume and mesh processing algorithms.
//!
//! The stages of the atlas pipeline, each usable on its own:
//!
//! - **Selection**: binary mask of one label ([`select`])
//! - **Morphology**: opening/closing with a 6-connected cross ([`morphology`])
//! - **Surface extraction**: marching cubes over a scalar grid ([`marching_cubes`])
//! - **Coordinate normalization**: centring and axis flips ([`transform`])
//! - **Simplification**: stride-based vertex decimation ([`simplify`])

pub mod marching_cubes;
pub mod morphology;
pub mod progress;
pub mod select;
pub mod simplify;
pub mod transform;

pub use progress::{Progress, ProgressEvent, Stage};
