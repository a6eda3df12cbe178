//! Whole-pipeline tests: atlas files in, viewer JSON out.

use std::path::PathBuf;

use atlasmesh::io::json;
use atlasmesh::prelude::*;
use atlasmesh::sample::{synthetic_labels, synthetic_volume};
use atlasmesh::volume::nifti;
use nalgebra::Point3;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("atlasmesh_e2e_{}", name));
    std::fs::remove_dir_all(&dir).ok();
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn centred_cube_from_nifti_file() {
    let dir = scratch_dir("cube");
    let mut volume = Volume::zeros([21, 21, 21]);
    volume.fill_box([8, 8, 8], [13, 13, 13], 10);
    let atlas = dir.join("atlas.nii.gz");
    nifti::save(&volume, &atlas).unwrap();

    let loaded = nifti::load(&atlas).unwrap();
    let output = build_meshes(
        &loaded,
        &LabelTable::freesurfer_subcortical(),
        &PipelineOptions::default(),
    )
    .unwrap();

    assert_eq!(output.meshes.len(), 1);
    let thalamus = output.meshes.get("Left-Thalamus").unwrap();
    assert!(thalamus.num_vertices() > 0);
    assert!(is_closed(thalamus));
    assert_eq!(output.report.built.len(), 1);
    assert_eq!(output.report.built[0].voxels, 125);
    assert_eq!(output.report.skipped.len(), 13);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn no_matching_labels_is_fatal() {
    let mut volume = Volume::zeros([16, 16, 16]);
    volume.fill_box([4, 4, 4], [12, 12, 12], 1000);

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
fn dense_mesh_simplifies_to_target() {
    // 40 x 50 grid with a fine triangulation, plus a coarse one over every
    // fourth column.
    let (width, height) = (40, 50);
    let mut vertices = Vec::with_capacity(width * height);
    for j in 0..height {
        for i in 0..width {
            vertices.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }
    let mut faces = Vec::new();
    for j in 0..height - 1 {
        for i in 0..width - 1 {
            let v = j * width + i;
            faces.push([v, v + 1, v + width]);
            faces.push([v + 1, v + width + 1, v + width]);
        }
        for i in (0..width - 4).step_by(4) {
            let v = j * width + i;
            faces.push([v, v + 4, v + width]);
            faces.push([v + 4, v + width + 4, v + width]);
        }
    }
    let mut mesh = Mesh::from_triangles(vertices, faces);
    mesh.recompute_normals();
    assert_eq!(mesh.num_vertices(), 2000);

    let simplified = simplify(&mesh, &SimplifyOptions::default());
    assert_eq!(simplified.num_vertices(), 500);
    assert_eq!(simplified.num_faces(), 9 * 49 * 2);
    assert_eq!(simplified.normals.len(), 500);
    assert!(simplified.validate().is_ok());
    for face in &simplified.faces {
        assert!(face.iter().all(|&v| v < simplified.num_vertices()));
    }
}

#[test]
fn synthetic_atlas_to_json_outputs() {
    let dir = scratch_dir("synthetic");
    let volume = synthetic_volume([96, 96, 96]);
    let table = synthetic_labels();
    let options = PipelineOptions::default().with_simplify(
        SimplifyOptions::default()
            .with_vertex_threshold(200)
            .with_target_vertices(100),
    );

    let output = build_meshes(&volume, &table, &options).unwrap();
    assert_eq!(output.meshes.len(), 10);
    assert!(output.report.skipped.is_empty());
    assert!(!output.report.used_fallback_labels);

    let simplified = simplify_collection(&output.meshes, &options.simplify);
    let (full_path, simplified_path) = json::write_outputs(&dir, &output.meshes, &simplified).unwrap();

    let full = json::load_collection(&full_path).unwrap();
    let small = json::load_collection(&simplified_path).unwrap();
    assert_eq!(full.names().collect::<Vec<_>>(), small.names().collect::<Vec<_>>());
    assert!(small.total_vertices() <= full.total_vertices());

    for (name, mesh) in full.iter() {
        assert!(is_closed(mesh), "{} is not closed", name);
        assert_eq!(mesh.normals.len(), mesh.num_vertices());
    }

    // The atlas is RAS and the viewer LPS, so left structures land at +x.
    let left = full.get("Left-Putamen").unwrap().bounding_box().unwrap();
    let right = full.get("Right-Putamen").unwrap().bounding_box().unwrap();
    assert!(left.0.x > 0.0);
    assert!(right.1.x < 0.0);
    assert!((left.0.y - right.0.y).abs() < 1.0);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn present_label_fallback_builds_placeholders() {
    let mut volume = Volume::zeros([20, 20, 20]);
    volume.fill_box([3, 3, 3], [9, 9, 9], 7);
    volume.fill_box([11, 11, 11], [17, 17, 17], 8);

    let options = PipelineOptions::default().with_fallback_to_present_labels(true);
    let output = build_meshes(&volume, &LabelTable::freesurfer_subcortical(), &options).unwrap();

    assert!(output.report.used_fallback_labels);
    assert_eq!(output.meshes.len(), 2);
    assert!(output.meshes.names().all(|name| name.starts_with("Unknown_Structure_")));
}
