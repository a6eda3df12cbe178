//! Built-in sample data.
//!
//! Used when no atlas is available: small parametric meshes standing in for
//! subcortical structures, and a synthetic label volume that exercises the
//! full extraction pipeline without any input files.

use std::f64::consts::PI;

use nalgebra::Point3;

use crate::labels::LabelTable;
use crate::mesh::{Mesh, MeshCollection};
use crate::volume::Volume;

/// Triangulate a `rows` x `cols` vertex grid stored row-major.
///
/// Each quad `(i, j)` becomes two triangles wound so that the normal
/// follows `d/d(row) x d/d(col)`.
fn grid_faces(rows: usize, cols: usize) -> Vec<[usize; 3]> {
    let mut faces = Vec::with_capacity(2 * rows.saturating_sub(1) * cols.saturating_sub(1));
    for i in 0..rows.saturating_sub(1) {
        for j in 0..cols.saturating_sub(1) {
            let v1 = i * cols + j;
            let v2 = v1 + 1;
            let v3 = v1 + cols;
            let v4 = v3 + 1;
            faces.push([v1, v3, v2]);
            faces.push([v2, v3, v4]);
        }
    }
    faces
}

fn finish(vertices: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Mesh {
    let mut mesh = Mesh::from_triangles(vertices, faces);
    mesh.recompute_normals();
    mesh
}

/// Latitude/longitude ellipsoid with `rings` latitude rows and `segments`
/// longitude columns. The seam and poles carry duplicate vertices.
pub fn ellipsoid_mesh(center: [f64; 3], radii: [f64; 3], rings: usize, segments: usize) -> Mesh {
    let rings = rings.max(2);
    let segments = segments.max(2);
    let mut vertices = Vec::with_capacity(rings * segments);
    for i in 0..rings {
        let theta = PI * i as f64 / (rings - 1) as f64;
        for j in 0..segments {
            let phi = 2.0 * PI * j as f64 / (segments - 1) as f64;
            vertices.push(Point3::new(
                radii[0] * theta.sin() * phi.cos() + center[0],
                radii[1] * theta.sin() * phi.sin() + center[1],
                radii[2] * theta.cos() + center[2],
            ));
        }
    }
    finish(vertices, grid_faces(rings, segments))
}

/// Thalamus-like blob: a sphere of radius `scale`.
pub fn sphere_mesh(center: [f64; 3], scale: f64) -> Mesh {
    ellipsoid_mesh(center, [scale; 3], 15, 20)
}

/// Hippocampus-like curved sheet swept along a bent path.
pub fn curved_mesh(center: [f64; 3], scale: f64) -> Mesh {
    let (steps, samples) = (30, 10);
    let mut vertices = Vec::with_capacity(steps * samples);
    for i in 0..steps {
        let t = 2.0 * PI * i as f64 / (steps - 1) as f64;
        for j in 0..samples {
            let s = j as f64 / (samples - 1) as f64;
            vertices.push(Point3::new(
                scale * (2.0 * s - 1.0) * (t * 0.5).cos() + center[0],
                scale * 0.3 * t.sin() + center[1],
                scale * s * 2.0 + center[2],
            ));
        }
    }
    finish(vertices, grid_faces(steps, samples))
}

/// Amygdala-like almond: an ellipsoid elongated front to back and tapered
/// towards its anterior tip.
pub fn almond_mesh(center: [f64; 3], scale: f64) -> Mesh {
    let mut mesh = ellipsoid_mesh([0.0; 3], [0.8 * scale, 1.3 * scale, 0.9 * scale], 15, 20);
    let half_length = 1.3 * scale;
    for p in &mut mesh.vertices {
        // Narrow x and z linearly from full width at the back to 60% at the front.
        let taper = 1.0 - 0.2 * (p.y / half_length + 1.0);
        p.x = p.x * taper + center[0];
        p.z = p.z * taper + center[2];
        p.y += center[1];
    }
    mesh.recompute_normals();
    mesh
}

/// The six-structure sample collection written when no atlas is available.
pub fn sample_collection() -> MeshCollection {
    let mut collection = MeshCollection::new();
    collection.insert("Left-Hippocampus", curved_mesh([-25.0, -15.0, -10.0], 0.8));
    collection.insert("Right-Hippocampus", curved_mesh([25.0, -15.0, -10.0], 0.8));
    collection.insert("Left-Amygdala", almond_mesh([-20.0, -5.0, -25.0], 0.6));
    collection.insert("Right-Amygdala", almond_mesh([20.0, -5.0, -25.0], 0.6));
    collection.insert("Left-Thalamus", sphere_mesh([-8.0, -3.0, -2.0], 0.7));
    collection.insert("Right-Thalamus", sphere_mesh([8.0, -3.0, -2.0], 0.7));
    collection
}

/// Placement of a synthetic structure as fractions of the grid size.
struct Blob {
    label: i32,
    center: [f64; 3],
    radii: [f64; 3],
}

const LEFT_BLOBS: [Blob; 5] = [
    Blob { label: 10, center: [0.40, 0.45, 0.55], radii: [0.06, 0.10, 0.07] },
    Blob { label: 11, center: [0.38, 0.62, 0.62], radii: [0.04, 0.08, 0.05] },
    Blob { label: 12, center: [0.30, 0.55, 0.50], radii: [0.04, 0.09, 0.07] },
    Blob { label: 17, center: [0.33, 0.35, 0.38], radii: [0.04, 0.11, 0.04] },
    Blob { label: 18, center: [0.33, 0.52, 0.34], radii: [0.05, 0.05, 0.05] },
];

/// Offset between FreeSurfer left and right subcortical labels for the
/// structures in [`LEFT_BLOBS`].
fn right_label(left: i32) -> i32 {
    match left {
        10 => 49,
        11 => 50,
        12 => 51,
        17 => 53,
        18 => 54,
        other => other,
    }
}

/// A label volume with ellipsoidal left/right thalamus, caudate, putamen,
/// hippocampus and amygdala, using FreeSurfer label ids.
///
/// Left structures sit at low `x`, mirrored to the right; the volume is
/// stored `RAS`, like a NIfTI template.
pub fn synthetic_volume(shape: [usize; 3]) -> Volume {
    let mut volume = Volume::zeros(shape);
    let size = shape.map(|n| n as f64);
    for blob in &LEFT_BLOBS {
        let radii = [
            (blob.radii[0] * size[0]).max(1.5),
            (blob.radii[1] * size[1]).max(1.5),
            (blob.radii[2] * size[2]).max(1.5),
        ];
        let left = [
            blob.center[0] * size[0],
            blob.center[1] * size[1],
            blob.center[2] * size[2],
        ];
        let right = [size[0] - 1.0 - left[0], left[1], left[2]];
        volume.fill_ellipsoid(left, radii, blob.label);
        volume.fill_ellipsoid(right, radii, right_label(blob.label));
    }
    volume
}

/// Labels written by [`synthetic_volume`], named as in the FreeSurfer table.
pub fn synthetic_labels() -> LabelTable {
    let names = LabelTable::freesurfer_subcortical();
    let ids: Vec<i32> = LEFT_BLOBS
        .iter()
        .flat_map(|b| [b.label, right_label(b.label)])
        .collect();
    names.filtered(|id| ids.contains(&id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_volume(mesh: &Mesh) -> f64 {
        mesh.faces
            .iter()
            .map(|&[a, b, c]| {
                let p0 = mesh.vertices[a].coords;
                p0.dot(&mesh.vertices[b].coords.cross(&mesh.vertices[c].coords)) / 6.0
            })
            .sum()
    }

    #[test]
    fn test_ellipsoid_counts_and_extent() {
        let mesh = ellipsoid_mesh([1.0, 2.0, 3.0], [2.0, 3.0, 4.0], 15, 20);
        assert_eq!(mesh.num_vertices(), 300);
        assert_eq!(mesh.num_faces(), 2 * 14 * 19);
        assert!(mesh.validate().is_ok());

        let (min, max) = mesh.bounding_box().unwrap();
        assert!((max.z - 7.0).abs() < 1e-9);
        assert!((min.z + 1.0).abs() < 1e-9);
        assert!((max.x - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ellipsoid_wound_outward() {
        let mesh = ellipsoid_mesh([0.0; 3], [1.0; 3], 15, 20);
        assert!(signed_volume(&mesh) > 0.0);
    }

    #[test]
    fn test_almond_is_tapered() {
        let mesh = almond_mesh([0.0; 3], 1.0);
        let (min, max) = mesh.bounding_box().unwrap();
        assert!(max.y - min.y > max.x - min.x);
        let width_at = |target: f64| {
            mesh.vertices
                .iter()
                .filter(|p| (p.y - target).abs() < 0.3)
                .map(|p| p.x.abs())
                .fold(0.0, f64::max)
        };
        assert!(width_at(0.8) < width_at(-0.8));
    }

    #[test]
    fn test_sample_collection() {
        let collection = sample_collection();
        let names: Vec<&str> = collection.names().collect();
        assert_eq!(
            names,
            [
                "Left-Hippocampus",
                "Right-Hippocampus",
                "Left-Amygdala",
                "Right-Amygdala",
                "Left-Thalamus",
                "Right-Thalamus"
            ]
        );
        for (_, mesh) in collection.iter() {
            assert!(mesh.validate().is_ok());
            assert!(mesh.num_faces() > 0);
            assert_eq!(mesh.normals.len(), mesh.num_vertices());
        }
        assert_eq!(collection.get("Left-Hippocampus").unwrap().num_vertices(), 300);
    }

    #[test]
    fn test_synthetic_volume_labels() {
        let volume = synthetic_volume([64, 64, 64]);
        let table = synthetic_labels();
        assert_eq!(table.len(), 10);
        for (id, _) in table.iter() {
            assert!(volume.count_label(id) >= 10, "label {} too small", id);
        }
        assert_eq!(volume.count_label(10), volume.count_label(49));
    }
}
