//! Voxel-to-viewer coordinate normalization.
//!
//! Extracted vertices are in physical units relative to the first voxel.
//! The viewer expects meshes centred on the volume and expressed in its own
//! anatomical orientation, so each vertex is shifted by the volume centre
//! and each axis flipped where the storage orientation disagrees with the
//! viewer's.

use nalgebra::{Point3, Vector3};

use crate::error::Result;
use crate::mesh::Mesh;
use crate::volume::{Orientation, Volume};

/// Affine map `q = (p - center) * signs`, applied per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    /// Offset subtracted from every point.
    pub center: [f64; 3],
    /// Per-axis sign, `1.0` or `-1.0`.
    pub signs: [f64; 3],
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl CoordinateTransform {
    /// Create a transform from an explicit centre and signs.
    pub fn new(center: [f64; 3], signs: [f64; 3]) -> Self {
        Self { center, signs }
    }

    /// Leave coordinates unchanged.
    pub fn identity() -> Self {
        Self::new([0.0; 3], [1.0; 3])
    }

    /// Transform for a volume rendered in `target` orientation.
    ///
    /// The centre is half the physical extent of the grid; the signs come
    /// from comparing the volume's orientation with `target`.
    ///
    /// # Errors
    ///
    /// [`AtlasError::UnsupportedOrientation`](crate::AtlasError::UnsupportedOrientation)
    /// when the voxel axes are permuted relative to `target`.
    pub fn for_volume(volume: &Volume, target: &Orientation) -> Result<Self> {
        let shape = volume.shape();
        let spacing = volume.spacing();
        let mut center = [0.0; 3];
        for i in 0..3 {
            center[i] = shape[i] as f64 / 2.0 * spacing[i];
        }
        let signs = volume.orientation().signs_to(target)?;
        Ok(Self::new(center, signs))
    }

    /// Map a point into viewer space.
    #[inline]
    pub fn apply(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::new(
            (p.x - self.center[0]) * self.signs[0],
            (p.y - self.center[1]) * self.signs[1],
            (p.z - self.center[2]) * self.signs[2],
        )
    }

    /// Map a viewer-space point back to volume space.
    #[inline]
    pub fn inverse(&self, q: &Point3<f64>) -> Point3<f64> {
        Point3::new(
            q.x * self.signs[0] + self.center[0],
            q.y * self.signs[1] + self.center[1],
            q.z * self.signs[2] + self.center[2],
        )
    }

    /// Map a direction; only the signs apply.
    #[inline]
    pub fn apply_normal(&self, n: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            n.x * self.signs[0],
            n.y * self.signs[1],
            n.z * self.signs[2],
        )
    }

    /// Whether an odd number of axes is flipped, which mirrors the surface.
    pub fn is_mirroring(&self) -> bool {
        self.signs.iter().filter(|&&s| s < 0.0).count() % 2 == 1
    }

    /// Transform every vertex and normal of a mesh in place.
    ///
    /// A mirroring transform would turn outward winding inward, so faces are
    /// re-wound to stay consistent with the mapped normals.
    pub fn apply_mesh(&self, mesh: &mut Mesh) {
        for p in &mut mesh.vertices {
            *p = self.apply(p);
        }
        for n in &mut mesh.normals {
            *n = self.apply_normal(n);
        }
        if self.is_mirroring() {
            for face in &mut mesh.faces {
                face.swap(1, 2);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_template() {
        let volume = Volume::zeros([182, 218, 182]);
        let transform = CoordinateTransform::for_volume(&volume, &Orientation::LPS).unwrap();
        assert_eq!(transform.center, [91.0, 109.0, 91.0]);
        assert_eq!(transform.signs, [-1.0, -1.0, 1.0]);
        assert!(!transform.is_mirroring());

        let q = transform.apply(&Point3::new(100.0, 100.0, 100.0));
        assert_eq!(q, Point3::new(-9.0, 9.0, 9.0));
    }

    #[test]
    fn test_spacing_scales_center() {
        let volume = Volume::zeros([10, 20, 30]).with_spacing([2.0, 1.0, 0.5]);
        let transform = CoordinateTransform::for_volume(&volume, &Orientation::RAS).unwrap();
        assert_eq!(transform.center, [10.0, 10.0, 7.5]);
        assert_eq!(transform.signs, [1.0; 3]);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let transform = CoordinateTransform::new([91.0, 109.0, 91.0], [-1.0, -1.0, 1.0]);
        for p in [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(12.25, -3.5, 180.0),
            Point3::new(-1e3, 4e-3, 91.0),
        ] {
            let back = transform.inverse(&transform.apply(&p));
            assert!((back - p).norm() < 1e-9);
        }
    }

    #[test]
    fn test_permuted_orientation_rejected() {
        let orientation: Orientation = "ASR".parse().unwrap();
        let volume = Volume::zeros([4, 4, 4]).with_orientation(orientation);
        assert!(matches!(
            CoordinateTransform::for_volume(&volume, &Orientation::LPS),
            Err(crate::AtlasError::UnsupportedOrientation { .. })
        ));
    }

    #[test]
    fn test_mirroring_rewinds_faces() {
        let mut mesh = Mesh {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            faces: vec![[0, 1, 2]],
            normals: vec![Vector3::z(); 3],
        };
        let transform = CoordinateTransform::new([0.0; 3], [-1.0, 1.0, 1.0]);
        transform.apply_mesh(&mut mesh);

        assert_eq!(mesh.faces, vec![[0, 2, 1]]);
        assert_eq!(mesh.vertices[1], Point3::new(-1.0, 0.0, 0.0));
        // Winding and normals still agree after the flip.
        assert!(mesh.face_cross(0).dot(&Vector3::z()) > 0.0);
    }
}
