//! Progress reporting for mesh building.
//!
//! The pipeline walks the label table one structure at a time and each
//! structure passes through the same [`Stage`]s. Callers that want feedback
//! pass a [`Progress`] to the `*_with_progress` variants and receive a
//! [`ProgressEvent`] whenever a structure enters a stage, plus one when the
//! run is finished.
//!
//! # Example
//!
//! ```no_run
//! use atlasmesh::algo::{Progress, ProgressEvent};
//! use atlasmesh::pipeline::{build_meshes_with_progress, PipelineOptions};
//! use atlasmesh::{labels::LabelTable, volume::nifti};
//!
//! let progress = Progress::new(|event| match event {
//!     ProgressEvent::Structure { name, stage, .. } => println!("{}: {}", name, stage),
//!     ProgressEvent::Finished { built, total } => println!("{} of {} built", built, total),
//! });
//!
//! let volume = nifti::load("aseg.nii.gz").unwrap();
//! let table = LabelTable::freesurfer_subcortical();
//! let output = build_meshes_with_progress(&volume, &table, &PipelineOptions::default(), &progress);
//! ```

use std::fmt;

/// Per-structure pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Building the binary mask and counting voxels.
    Select,
    /// Opening and closing the mask.
    Condition,
    /// Marching cubes.
    Extract,
    /// Mapping into viewer coordinates.
    Transform,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 4] = [Stage::Select, Stage::Condition, Stage::Extract, Stage::Transform];

    /// Position of this stage within a structure, `0..Stage::ALL.len()`.
    pub fn position(self) -> usize {
        match self {
            Stage::Select => 0,
            Stage::Condition => 1,
            Stage::Extract => 2,
            Stage::Transform => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Select => "selecting",
            Stage::Condition => "conditioning",
            Stage::Extract => "extracting",
            Stage::Transform => "transforming",
        };
        f.write_str(name)
    }
}

/// A single progress update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent<'a> {
    /// Structure `index` of `total` entered `stage`.
    Structure {
        /// Zero-based position in the label table.
        index: usize,
        /// Number of structures in the run.
        total: usize,
        /// Stage being entered.
        stage: Stage,
        /// Structure name.
        name: &'a str,
    },
    /// Every structure has been processed.
    Finished {
        /// Structures that produced a mesh.
        built: usize,
        /// Structures attempted.
        total: usize,
    },
}

impl ProgressEvent<'_> {
    /// Overall completion in `[0, 1]`, counting each stage as an equal
    /// share of its structure.
    pub fn fraction(&self) -> f64 {
        match *self {
            ProgressEvent::Structure {
                index,
                total,
                stage,
                ..
            } => {
                if total == 0 {
                    return 1.0;
                }
                let stages = Stage::ALL.len() as f64;
                ((index as f64 + stage.position() as f64 / stages) / total as f64).min(1.0)
            }
            ProgressEvent::Finished { .. } => 1.0,
        }
    }
}

/// Receives [`ProgressEvent`]s during mesh building.
pub struct Progress {
    callback: Box<dyn Fn(&ProgressEvent<'_>) + Send + Sync>,
}

impl Progress {
    /// Create a reporter from a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&ProgressEvent<'_>) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// A reporter that ignores every update.
    pub fn none() -> Self {
        Self::new(|_| {})
    }

    /// Structure `index` of `total` is entering `stage`.
    #[inline]
    pub fn structure(&self, index: usize, total: usize, stage: Stage, name: &str) {
        (self.callback)(&ProgressEvent::Structure {
            index,
            total,
            stage,
            name,
        });
    }

    /// The run is over; `built` of `total` structures produced meshes.
    #[inline]
    pub fn finished(&self, built: usize, total: usize) {
        (self.callback)(&ProgressEvent::Finished { built, total });
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_stage_fraction() {
        let event = ProgressEvent::Structure {
            index: 2,
            total: 10,
            stage: Stage::Condition,
            name: "Left-Putamen",
        };
        assert!((event.fraction() - 0.225).abs() < 1e-12);

        let last = ProgressEvent::Structure {
            index: 9,
            total: 10,
            stage: Stage::Transform,
            name: "Right-Accumbens",
        };
        assert!(last.fraction() < 1.0);
        assert_eq!(ProgressEvent::Finished { built: 3, total: 10 }.fraction(), 1.0);
    }

    #[test]
    fn test_stage_order() {
        let positions: Vec<usize> = Stage::ALL.iter().map(|s| s.position()).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
        assert_eq!(Stage::Extract.to_string(), "extracting");
    }

    #[test]
    fn test_callback_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |event| {
            let entry = match *event {
                ProgressEvent::Structure { name, stage, .. } => format!("{} {}", name, stage),
                ProgressEvent::Finished { built, total } => format!("{}/{}", built, total),
            };
            sink.lock().unwrap().push(entry);
        });

        progress.structure(0, 1, Stage::Select, "Left-Caudate");
        progress.finished(0, 1);

        assert_eq!(*seen.lock().unwrap(), vec!["Left-Caudate selecting", "0/1"]);
    }

    #[test]
    fn test_none_discards() {
        Progress::none().structure(0, 1, Stage::Select, "nothing");
        Progress::default().finished(0, 0);
    }
}
