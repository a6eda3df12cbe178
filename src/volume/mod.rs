//! Labelled atlas volumes.
//!
//! A [`Volume`] is a 3D grid of integer labels indexed `[x, y, z]`, together
//! with its voxel spacing and the anatomical direction each voxel axis points
//! to ([`Orientation`]). Volumes come from NIfTI files ([`nifti`]), located
//! through an ordered list of strategies ([`source`]), or are built in code.
//!
//! ```
//! use atlasmesh::volume::{Orientation, Volume};
//!
//! let mut volume = Volume::zeros([20, 20, 20]);
//! volume.fill_box([8, 8, 8], [13, 13, 13], 10);
//! assert_eq!(volume.count_label(10), 125);
//! assert_eq!(volume.orientation(), Orientation::RAS);
//! ```

pub mod nifti;
pub mod source;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array3, ShapeBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// Direction a voxel axis points to in anatomical space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisDirection {
    /// Towards the subject's right.
    Right,
    /// Towards the subject's left.
    Left,
    /// Towards the front.
    Anterior,
    /// Towards the back.
    Posterior,
    /// Towards the top of the head.
    Superior,
    /// Towards the feet.
    Inferior,
}

impl AxisDirection {
    /// Single-letter code (`R`, `L`, `A`, `P`, `S`, `I`).
    pub fn code(self) -> char {
        match self {
            AxisDirection::Right => 'R',
            AxisDirection::Left => 'L',
            AxisDirection::Anterior => 'A',
            AxisDirection::Posterior => 'P',
            AxisDirection::Superior => 'S',
            AxisDirection::Inferior => 'I',
        }
    }

    /// Parse a single-letter code, case-insensitive.
    pub fn from_code(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'R' => Some(AxisDirection::Right),
            'L' => Some(AxisDirection::Left),
            'A' => Some(AxisDirection::Anterior),
            'P' => Some(AxisDirection::Posterior),
            'S' => Some(AxisDirection::Superior),
            'I' => Some(AxisDirection::Inferior),
            _ => None,
        }
    }

    /// Anatomical axis: 0 = left/right, 1 = anterior/posterior, 2 = superior/inferior.
    pub fn axis(self) -> usize {
        match self {
            AxisDirection::Right | AxisDirection::Left => 0,
            AxisDirection::Anterior | AxisDirection::Posterior => 1,
            AxisDirection::Superior | AxisDirection::Inferior => 2,
        }
    }

    /// Whether this is the positive direction of RAS+ world space.
    pub fn is_ras_positive(self) -> bool {
        matches!(
            self,
            AxisDirection::Right | AxisDirection::Anterior | AxisDirection::Superior
        )
    }

    fn from_world_axis(axis: usize, positive: bool) -> Self {
        match (axis, positive) {
            (0, true) => AxisDirection::Right,
            (0, false) => AxisDirection::Left,
            (1, true) => AxisDirection::Anterior,
            (1, false) => AxisDirection::Posterior,
            (_, true) => AxisDirection::Superior,
            (_, false) => AxisDirection::Inferior,
        }
    }
}

/// Anatomical direction of each voxel axis, e.g. `RAS` or `LPS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Orientation(pub [AxisDirection; 3]);

impl Orientation {
    /// x→Right, y→Anterior, z→Superior. The NIfTI world convention.
    pub const RAS: Orientation = Orientation([
        AxisDirection::Right,
        AxisDirection::Anterior,
        AxisDirection::Superior,
    ]);

    /// x→Left, y→Posterior, z→Superior.
    pub const LPS: Orientation = Orientation([
        AxisDirection::Left,
        AxisDirection::Posterior,
        AxisDirection::Superior,
    ]);

    /// Three-letter orientation code.
    pub fn code(&self) -> String {
        self.0.iter().map(|d| d.code()).collect()
    }

    /// Derive voxel axis directions from the rotation/scale part of a
    /// voxel-to-world (RAS+) affine, given as its first three rows.
    ///
    /// Each voxel axis is assigned the world axis its column is most aligned
    /// with.
    pub fn from_affine(rows: &[[f64; 4]; 3]) -> Self {
        let mut dirs = [AxisDirection::Right; 3];
        for (col, dir) in dirs.iter_mut().enumerate() {
            let mut best = 0;
            for row in 1..3 {
                if rows[row][col].abs() > rows[best][col].abs() {
                    best = row;
                }
            }
            *dir = AxisDirection::from_world_axis(best, rows[best][col] >= 0.0);
        }
        Orientation(dirs)
    }

    /// Per-axis sign that maps coordinates along this orientation onto
    /// `target`: `+1` when both agree, `-1` when they point opposite ways.
    ///
    /// Fails when a voxel axis lies on a different anatomical axis than the
    /// target's (permuted storage).
    pub fn signs_to(&self, target: &Orientation) -> Result<[f64; 3]> {
        let mut signs = [1.0; 3];
        for i in 0..3 {
            if self.0[i].axis() != target.0[i].axis() {
                return Err(AtlasError::UnsupportedOrientation {
                    orientation: self.code(),
                    target: target.code(),
                });
            }
            if self.0[i] != target.0[i] {
                signs[i] = -1.0;
            }
        }
        Ok(signs)
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::RAS
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl FromStr for Orientation {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self> {
        let chars: Vec<char> = s.trim().chars().collect();
        if chars.len() != 3 {
            return Err(AtlasError::invalid_param("orientation", s, "expected three letters"));
        }
        let mut dirs = [AxisDirection::Right; 3];
        for (dir, &c) in dirs.iter_mut().zip(&chars) {
            *dir = AxisDirection::from_code(c).ok_or_else(|| {
                AtlasError::invalid_param("orientation", s, "letters must be R, L, A, P, S or I")
            })?;
        }
        let mut seen = [false; 3];
        for d in &dirs {
            if std::mem::replace(&mut seen[d.axis()], true) {
                return Err(AtlasError::invalid_param(
                    "orientation",
                    s,
                    "each anatomical axis must appear once",
                ));
            }
        }
        Ok(Orientation(dirs))
    }
}

impl TryFrom<String> for Orientation {
    type Error = AtlasError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Orientation> for String {
    fn from(o: Orientation) -> String {
        o.code()
    }
}

/// A 3D grid of integer labels with spacing and orientation metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: Array3<i32>,
    spacing: [f64; 3],
    orientation: Orientation,
}

impl Volume {
    /// Wrap a label array with unit spacing and `RAS` orientation.
    pub fn new(data: Array3<i32>) -> Self {
        Self {
            data,
            spacing: [1.0; 3],
            orientation: Orientation::RAS,
        }
    }

    /// An all-background volume of the given shape.
    pub fn zeros(shape: [usize; 3]) -> Self {
        Self::new(Array3::zeros((shape[0], shape[1], shape[2])))
    }

    /// Build a volume from labels stored x-fastest (NIfTI order):
    /// `index = x + y*nx + z*nx*ny`.
    pub fn from_fortran_vec(shape: [usize; 3], labels: Vec<i32>) -> Result<Self> {
        let expected = shape[0] * shape[1] * shape[2];
        if labels.len() != expected {
            return Err(AtlasError::invalid_param(
                "labels",
                labels.len(),
                "length must equal nx*ny*nz",
            ));
        }
        let data = Array3::from_shape_vec((shape[0], shape[1], shape[2]).f(), labels)
            .map_err(|e| AtlasError::InvalidParameter {
                name: "labels",
                value: e.to_string(),
                reason: "shape mismatch",
            })?;
        Ok(Self::new(data))
    }

    /// Set the voxel spacing in millimetres.
    pub fn with_spacing(mut self, spacing: [f64; 3]) -> Self {
        self.spacing = spacing;
        self
    }

    /// Set the voxel axis orientation.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// The label array, indexed `[x, y, z]`.
    #[inline]
    pub fn data(&self) -> &Array3<i32> {
        &self.data
    }

    /// Grid dimensions `[nx, ny, nz]`.
    pub fn shape(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.data.dim();
        [nx, ny, nz]
    }

    /// Voxel spacing in millimetres.
    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// Voxel axis orientation.
    #[inline]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Label at a voxel, or `None` outside the grid.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<i32> {
        self.data.get((x, y, z)).copied()
    }

    /// Set every voxel in the half-open box `[min, max)` to `label`.
    /// The box is clipped to the grid.
    pub fn fill_box(&mut self, min: [usize; 3], max: [usize; 3], label: i32) {
        let shape = self.shape();
        for x in min[0]..max[0].min(shape[0]) {
            for y in min[1]..max[1].min(shape[1]) {
                for z in min[2]..max[2].min(shape[2]) {
                    self.data[[x, y, z]] = label;
                }
            }
        }
    }

    /// Set every voxel whose centre lies inside an axis-aligned ellipsoid.
    pub fn fill_ellipsoid(&mut self, center: [f64; 3], radii: [f64; 3], label: i32) {
        for ((x, y, z), v) in self.data.indexed_iter_mut() {
            let d = [
                (x as f64 - center[0]) / radii[0],
                (y as f64 - center[1]) / radii[1],
                (z as f64 - center[2]) / radii[2],
            ];
            if d[0] * d[0] + d[1] * d[1] + d[2] * d[2] <= 1.0 {
                *v = label;
            }
        }
    }

    /// Number of voxels carrying `label`.
    pub fn count_label(&self, label: i32) -> usize {
        self.data.iter().filter(|&&v| v == label).count()
    }

    /// Voxel count per label, ascending by label.
    pub fn label_counts(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for &v in self.data.iter() {
            *counts.entry(v).or_insert(0) += 1;
        }
        counts
    }

    /// Distinct labels present, ascending.
    pub fn unique_labels(&self) -> Vec<i32> {
        self.label_counts().into_keys().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_parse_and_display() {
        let o: Orientation = "lps".parse().unwrap();
        assert_eq!(o, Orientation::LPS);
        assert_eq!(o.to_string(), "LPS");
        assert!("RRS".parse::<Orientation>().is_err());
        assert!("RA".parse::<Orientation>().is_err());
        assert!("RAX".parse::<Orientation>().is_err());
    }

    #[test]
    fn test_signs_ras_to_lps() {
        let signs = Orientation::RAS.signs_to(&Orientation::LPS).unwrap();
        assert_eq!(signs, [-1.0, -1.0, 1.0]);
        let same = Orientation::LPS.signs_to(&Orientation::LPS).unwrap();
        assert_eq!(same, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_signs_rejects_permuted_axes() {
        let permuted: Orientation = "ARS".parse().unwrap();
        assert!(matches!(
            permuted.signs_to(&Orientation::LPS),
            Err(AtlasError::UnsupportedOrientation { .. })
        ));
    }

    #[test]
    fn test_orientation_from_affine() {
        let ras = [
            [1.0, 0.0, 0.0, -96.0],
            [0.0, 1.0, 0.0, -132.0],
            [0.0, 0.0, 1.0, -78.0],
        ];
        assert_eq!(Orientation::from_affine(&ras), Orientation::RAS);

        let radiological = [
            [-2.0, 0.0, 0.0, 90.0],
            [0.0, 2.0, 0.1, -126.0],
            [0.0, -0.1, 2.0, -72.0],
        ];
        assert_eq!(Orientation::from_affine(&radiological).code(), "LAS");
    }

    #[test]
    fn test_fortran_order() {
        let labels: Vec<i32> = (0..24).collect();
        let volume = Volume::from_fortran_vec([2, 3, 4], labels).unwrap();
        assert_eq!(volume.shape(), [2, 3, 4]);
        // index = x + y*nx + z*nx*ny
        assert_eq!(volume.get(1, 0, 0), Some(1));
        assert_eq!(volume.get(0, 1, 0), Some(2));
        assert_eq!(volume.get(0, 0, 1), Some(6));
        assert_eq!(volume.get(1, 2, 3), Some(23));
        assert!(Volume::from_fortran_vec([2, 2, 2], vec![0; 7]).is_err());
    }

    #[test]
    fn test_label_counts() {
        let mut volume = Volume::zeros([10, 10, 10]);
        volume.fill_box([0, 0, 0], [2, 2, 2], 10);
        volume.fill_box([5, 5, 5], [8, 8, 8], 49);
        let counts = volume.label_counts();
        assert_eq!(counts[&10], 8);
        assert_eq!(counts[&49], 27);
        assert_eq!(counts[&0], 1000 - 35);
        assert_eq!(volume.unique_labels(), vec![0, 10, 49]);
    }

    #[test]
    fn test_fill_box_clipped() {
        let mut volume = Volume::zeros([4, 4, 4]);
        volume.fill_box([2, 2, 2], [10, 10, 10], 3);
        assert_eq!(volume.count_label(3), 8);
    }

    #[test]
    fn test_fill_ellipsoid() {
        let mut volume = Volume::zeros([11, 11, 11]);
        volume.fill_ellipsoid([5.0, 5.0, 5.0], [1.0, 1.0, 1.0], 7);
        // Centre plus its six face neighbours.
        assert_eq!(volume.count_label(7), 7);
    }
}
