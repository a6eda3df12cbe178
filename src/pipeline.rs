//! Volume-to-mesh pipeline.
//!
//! For each structure in the label table, in table order:
//!
//! 1. select the voxels carrying its label,
//! 2. skip it if fewer than `min_voxels` remain,
//! 3. open and close the mask to remove speckle,
//! 4. extract the isosurface with marching cubes,
//! 5. map vertices into centred viewer coordinates.
//!
//! Structures that fail any step are skipped with a warning and recorded in
//! the [`PipelineReport`]; the run only fails when nothing was produced.
//!
//! # Example
//!
//! ```
//! use atlasmesh::pipeline::{build_meshes, simplify_collection, PipelineOptions};
//! use atlasmesh::labels::LabelTable;
//! use atlasmesh::volume::Volume;
//!
//! let mut volume = Volume::zeros([16, 16, 16]);
//! volume.fill_box([6, 6, 6], [11, 11, 11], 10);
//!
//! let options = PipelineOptions::default();
//! let output = build_meshes(&volume, &LabelTable::freesurfer_subcortical(), &options).unwrap();
//! assert_eq!(output.meshes.len(), 1);
//! assert_eq!(output.report.skipped.len(), 13);
//!
//! let simplified = simplify_collection(&output.meshes, &options.simplify);
//! assert_eq!(simplified.len(), 1);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::algo::marching_cubes::marching_cubes;
use crate::algo::morphology::condition;
use crate::algo::select::{select_label, voxel_count};
use crate::algo::simplify::{try_simplify, SimplifyOptions};
use crate::algo::transform::CoordinateTransform;
use crate::algo::progress::{Progress, Stage};
use crate::error::{AtlasError, ExtractError, Result};
use crate::labels::LabelTable;
use crate::mesh::{Mesh, MeshCollection};
use crate::volume::{Orientation, Volume};

/// Options for [`build_meshes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Structures with fewer voxels than this are skipped.
    pub min_voxels: usize,

    /// Opening and closing steps applied to each mask. Zero disables
    /// conditioning.
    pub smoothing_iterations: usize,

    /// Isovalue for surface extraction on the binary mask.
    pub level: f64,

    /// Orientation of the viewer's coordinate system.
    pub target_orientation: Orientation,

    /// Settings for the simplified output.
    pub simplify: SimplifyOptions,

    /// When no table label occurs in the volume, mesh the labels that do
    /// occur instead, under placeholder names.
    pub fallback_to_present_labels: bool,

    /// Maximum number of placeholder structures for the fallback.
    pub max_fallback_labels: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            min_voxels: 10,
            smoothing_iterations: 2,
            level: 0.5,
            target_orientation: Orientation::LPS,
            simplify: SimplifyOptions::default(),
            fallback_to_present_labels: false,
            max_fallback_labels: 10,
        }
    }
}

impl PipelineOptions {
    /// Set the minimum voxel count per structure.
    pub fn with_min_voxels(mut self, min_voxels: usize) -> Self {
        self.min_voxels = min_voxels;
        self
    }

    /// Set the number of opening/closing steps.
    pub fn with_smoothing_iterations(mut self, iterations: usize) -> Self {
        self.smoothing_iterations = iterations;
        self
    }

    /// Set the viewer orientation.
    pub fn with_target_orientation(mut self, orientation: Orientation) -> Self {
        self.target_orientation = orientation;
        self
    }

    /// Set the simplification options.
    pub fn with_simplify(mut self, simplify: SimplifyOptions) -> Self {
        self.simplify = simplify;
        self
    }

    /// Enable or disable the present-label fallback.
    pub fn with_fallback_to_present_labels(mut self, enabled: bool) -> Self {
        self.fallback_to_present_labels = enabled;
        self
    }

    /// Check option ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.level > 0.0 && self.level < 1.0) {
            return Err(AtlasError::invalid_param(
                "level",
                self.level,
                "must lie strictly between 0 and 1 for binary masks",
            ));
        }
        if self.simplify.target_vertices == 0 {
            return Err(AtlasError::invalid_param(
                "simplify.target_vertices",
                0,
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Why a structure produced no mesh.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The label does not occur in the volume.
    NotFound,
    /// The label occurs, but too sparsely.
    TooFewVoxels {
        /// Voxels carrying the label.
        count: usize,
        /// Configured minimum.
        min: usize,
    },
    /// Surface extraction failed, usually because conditioning removed the
    /// whole structure.
    Extraction {
        /// Extraction error message.
        message: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "label not present in volume"),
            SkipReason::TooFewVoxels { count, min } => {
                write!(f, "only {} voxels (minimum {})", count, min)
            }
            SkipReason::Extraction { message } => write!(f, "{}", message),
        }
    }
}

impl From<ExtractError> for SkipReason {
    fn from(e: ExtractError) -> Self {
        SkipReason::Extraction {
            message: e.to_string(),
        }
    }
}

/// A structure that was meshed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltStructure {
    /// Structure name.
    pub name: String,
    /// Label id.
    pub label: i32,
    /// Voxels carrying the label before conditioning.
    pub voxels: usize,
    /// Vertex count of the mesh.
    pub vertices: usize,
    /// Face count of the mesh.
    pub faces: usize,
}

/// A structure that was skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedStructure {
    /// Structure name.
    pub name: String,
    /// Label id.
    pub label: i32,
    /// Why no mesh was produced.
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Per-structure outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    /// Structures that produced meshes, in table order.
    pub built: Vec<BuiltStructure>,
    /// Structures that were skipped, in table order.
    pub skipped: Vec<SkippedStructure>,
    /// Whether placeholder labels were used instead of the table.
    pub used_fallback_labels: bool,
}

/// Meshes produced by a run, with the report.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Meshes keyed by structure name, in table order.
    pub meshes: MeshCollection,
    /// What happened to each structure.
    pub report: PipelineReport,
}

/// Log shape and label statistics of a volume.
fn log_volume_stats(volume: &Volume) {
    let labels = volume.unique_labels();
    log::info!("Atlas shape: {:?}", volume.shape());
    log::info!("Unique labels found: {} labels", labels.len());
    if let (Some(first), Some(last)) = (labels.first(), labels.last()) {
        log::info!("Label range: {} to {}", first, last);
    }
    if labels.len() > 10 {
        log::debug!("Sample labels: {:?}...", &labels[..10]);
    } else {
        log::debug!("All labels: {:?}", labels);
    }
}

/// Build the mesh of a single label, in viewer coordinates.
///
/// Returns the mesh and the label's voxel count before conditioning.
pub fn mesh_for_label(
    volume: &Volume,
    label: i32,
    transform: &CoordinateTransform,
    options: &PipelineOptions,
) -> std::result::Result<(Mesh, usize), SkipReason> {
    mesh_for_label_with_progress(volume, label, transform, options, &mut |_: Stage| {})
}

fn mesh_for_label_with_progress(
    volume: &Volume,
    label: i32,
    transform: &CoordinateTransform,
    options: &PipelineOptions,
    enter: &mut dyn FnMut(Stage),
) -> std::result::Result<(Mesh, usize), SkipReason> {
    enter(Stage::Select);
    let mask = select_label(volume, label);
    let count = voxel_count(&mask);
    if count == 0 {
        return Err(SkipReason::NotFound);
    }
    if count < options.min_voxels {
        return Err(SkipReason::TooFewVoxels {
            count,
            min: options.min_voxels,
        });
    }

    enter(Stage::Condition);
    let mask = condition(&mask, options.smoothing_iterations);

    enter(Stage::Extract);
    let surface = marching_cubes(&mask, options.level, volume.spacing())?;

    enter(Stage::Transform);
    let mut mesh = surface.into_mesh();
    transform.apply_mesh(&mut mesh);
    Ok((mesh, count))
}

/// Build meshes for every structure in `labels`.
///
/// # Errors
///
/// - [`AtlasError::UnsupportedOrientation`] if the volume cannot be mapped
///   onto the target orientation.
/// - [`AtlasError::InvalidParameter`] if the options are out of range or two
///   labels share a structure name.
/// - [`AtlasError::NoMeshesGenerated`] if every structure was skipped.
pub fn build_meshes(
    volume: &Volume,
    labels: &LabelTable,
    options: &PipelineOptions,
) -> Result<PipelineOutput> {
    build_meshes_with_progress(volume, labels, options, &Progress::none())
}

/// Build meshes, reporting each [`Stage`] every structure enters.
pub fn build_meshes_with_progress(
    volume: &Volume,
    labels: &LabelTable,
    options: &PipelineOptions,
    progress: &Progress,
) -> Result<PipelineOutput> {
    options.validate()?;
    if let Some(name) = labels.duplicate_name() {
        return Err(AtlasError::invalid_param(
            "labels",
            name,
            "structure name is used by more than one label",
        ));
    }
    log_volume_stats(volume);

    let transform = CoordinateTransform::for_volume(volume, &options.target_orientation)?;
    log::debug!(
        "viewer transform: center {:?}, signs {:?} ({} -> {})",
        transform.center,
        transform.signs,
        volume.orientation(),
        options.target_orientation
    );

    let mut report = PipelineReport::default();
    let mut table = labels.clone();
    if options.fallback_to_present_labels
        && !labels.iter().any(|(id, _)| volume.count_label(id) > 0)
    {
        table = LabelTable::placeholders(volume.unique_labels(), options.max_fallback_labels);
        report.used_fallback_labels = true;
        log::warn!(
            "No expected structures found; using {} labels present in the volume",
            table.len()
        );
    }

    let total = table.len();
    let mut meshes = MeshCollection::new();
    for (i, (label, name)) in table.iter().enumerate() {
        log::info!("Processing {} (label {})...", name, label);

        let mut enter = |stage: Stage| progress.structure(i, total, stage, name);
        match mesh_for_label_with_progress(volume, label, &transform, options, &mut enter) {
            Ok((mesh, voxels)) => {
                log::info!(
                    "  Created mesh with {} vertices, {} faces",
                    mesh.num_vertices(),
                    mesh.num_faces()
                );
                report.built.push(BuiltStructure {
                    name: name.to_string(),
                    label,
                    voxels,
                    vertices: mesh.num_vertices(),
                    faces: mesh.num_faces(),
                });
                meshes.insert(name, mesh);
            }
            Err(reason) => {
                log::warn!("  Skipping {}: {}", name, reason);
                report.skipped.push(SkippedStructure {
                    name: name.to_string(),
                    label,
                    reason,
                });
            }
        }
    }
    progress.finished(meshes.len(), total);

    if meshes.is_empty() {
        return Err(AtlasError::NoMeshesGenerated {
            skipped: report.skipped.len(),
        });
    }
    log::info!("Built {} of {} structures", meshes.len(), total);

    Ok(PipelineOutput { meshes, report })
}

/// Simplified copy of a collection for fast loading.
///
/// Structures that are small already, or whose decimation would leave no
/// faces, are copied unchanged.
pub fn simplify_collection(meshes: &MeshCollection, options: &SimplifyOptions) -> MeshCollection {
    meshes.map(|name, mesh| match try_simplify(mesh, options) {
        Some(simplified) => {
            log::debug!(
                "{}: simplified {} -> {} vertices",
                name,
                mesh.num_vertices(),
                simplified.num_vertices()
            );
            simplified
        }
        None => mesh.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::progress::ProgressEvent;
    use crate::mesh::EdgeTopology;
    use nalgebra::Point3;
    use std::sync::{Arc, Mutex};

    fn cube_volume() -> Volume {
        let mut volume = Volume::zeros([20, 20, 20]);
        volume.fill_box([8, 8, 8], [13, 13, 13], 10);
        volume
    }

    #[test]
    fn test_single_structure() {
        let output = build_meshes(
            &cube_volume(),
            &LabelTable::freesurfer_subcortical(),
            &PipelineOptions::default(),
        )
        .unwrap();

        assert_eq!(output.meshes.len(), 1);
        let mesh = output.meshes.get("Left-Thalamus").unwrap();
        assert!(mesh.num_vertices() > 0);
        assert!(EdgeTopology::of(mesh).is_closed());
        assert_eq!(output.report.built[0].voxels, 125);
        assert!(output
            .report
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::NotFound));
    }

    #[test]
    fn test_mesh_is_centred_and_flipped() {
        let options = PipelineOptions::default().with_smoothing_iterations(0);
        let output = build_meshes(&cube_volume(), &LabelTable::freesurfer_subcortical(), &options)
            .unwrap();
        let mesh = output.meshes.get("Left-Thalamus").unwrap();
        let (min, max) = mesh.bounding_box().unwrap();

        // Voxels 8..=12 with centre 10: extent 7.5..12.5 in voxel space.
        assert_eq!(min, Point3::new(-2.5, -2.5, -2.5));
        assert_eq!(max, Point3::new(2.5, 2.5, 2.5));

        // Outward normals survive the axis flips.
        for (p, n) in mesh.vertices.iter().zip(&mesh.normals) {
            assert!(n.dot(&p.coords) > 0.0);
        }
    }

    #[test]
    fn test_small_structure_skipped() {
        let mut volume = cube_volume();
        volume.fill_box([1, 1, 1], [3, 3, 3], 11);
        let output = build_meshes(
            &volume,
            &LabelTable::freesurfer_subcortical(),
            &PipelineOptions::default(),
        )
        .unwrap();

        let caudate = output
            .report
            .skipped
            .iter()
            .find(|s| s.label == 11)
            .unwrap();
        assert_eq!(caudate.reason, SkipReason::TooFewVoxels { count: 8, min: 10 });
        assert!(output.meshes.get("Left-Caudate").is_none());
    }

    #[test]
    fn test_structure_removed_by_conditioning() {
        // A one-voxel-thick plate survives the voxel threshold but not the
        // opening.
        let mut volume = cube_volume();
        volume.fill_box([2, 2, 2], [3, 8, 8], 12);
        let output = build_meshes(
            &volume,
            &LabelTable::freesurfer_subcortical(),
            &PipelineOptions::default(),
        )
        .unwrap();

        let putamen = output.report.skipped.iter().find(|s| s.label == 12).unwrap();
        assert!(matches!(putamen.reason, SkipReason::Extraction { .. }));
    }

    #[test]
    fn test_no_meshes_generated() {
        let mut volume = Volume::zeros([10, 10, 10]);
        volume.fill_box([2, 2, 2], [7, 7, 7], 99);
        let result = build_meshes(
            &volume,
            &LabelTable::freesurfer_subcortical(),
            &PipelineOptions::default(),
        );
        assert!(matches!(
            result,
            Err(AtlasError::NoMeshesGenerated { skipped: 14 })
        ));
    }

    #[test]
    fn test_present_label_fallback() {
        let mut volume = Volume::zeros([12, 12, 12]);
        volume.fill_box([3, 3, 3], [9, 9, 9], 99);
        let options = PipelineOptions::default().with_fallback_to_present_labels(true);
        let output =
            build_meshes(&volume, &LabelTable::freesurfer_subcortical(), &options).unwrap();

        assert!(output.report.used_fallback_labels);
        assert!(output.meshes.get("Unknown_Structure_99").is_some());
    }

    #[test]
    fn test_progress_follows_stages() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let progress = Progress::new(move |event| {
            let entry = match *event {
                ProgressEvent::Structure { index, stage, .. } => (index, Some(stage)),
                ProgressEvent::Finished { built, .. } => (built, None),
            };
            sink.lock().unwrap().push(entry);
        });

        let table: LabelTable = vec![(10, "Left-Thalamus"), (11, "Left-Caudate")]
            .into_iter()
            .collect();
        build_meshes_with_progress(&cube_volume(), &table, &PipelineOptions::default(), &progress)
            .unwrap();

        // The thalamus passes every stage; the caudate is absent and stops
        // after selection. One mesh was built.
        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                (0, Some(Stage::Select)),
                (0, Some(Stage::Condition)),
                (0, Some(Stage::Extract)),
                (0, Some(Stage::Transform)),
                (1, Some(Stage::Select)),
                (1, None),
            ]
        );
    }

    #[test]
    fn test_duplicate_structure_names_rejected() {
        let mut volume = cube_volume();
        volume.fill_box([1, 1, 1], [5, 5, 5], 11);
        let table: LabelTable = vec![(10, "Thalamus"), (11, "Thalamus")].into_iter().collect();

        assert!(matches!(
            build_meshes(&volume, &table, &PipelineOptions::default()),
            Err(AtlasError::InvalidParameter { name: "labels", .. })
        ));
    }

    #[test]
    fn test_invalid_options() {
        let options = PipelineOptions {
            level: 1.0,
            ..PipelineOptions::default()
        };
        assert!(matches!(
            build_meshes(&cube_volume(), &LabelTable::freesurfer_subcortical(), &options),
            Err(AtlasError::InvalidParameter { name: "level", .. })
        ));
    }

    #[test]
    fn test_options_json() {
        let options: PipelineOptions = serde_json::from_str(
            r#"{"min_voxels": 50, "target_orientation": "RAS", "simplify": {"target_vertices": 100}}"#,
        )
        .unwrap();
        assert_eq!(options.min_voxels, 50);
        assert_eq!(options.target_orientation, Orientation::RAS);
        assert_eq!(options.simplify.target_vertices, 100);
        assert_eq!(options.smoothing_iterations, 2);
    }

    #[test]
    fn test_simplify_collection_keeps_small_meshes() {
        let output = build_meshes(
            &cube_volume(),
            &LabelTable::freesurfer_subcortical(),
            &PipelineOptions::default(),
        )
        .unwrap();
        let simplified = simplify_collection(&output.meshes, &SimplifyOptions::default());
        assert_eq!(simplified.get("Left-Thalamus"), output.meshes.get("Left-Thalamus"));
    }
}
