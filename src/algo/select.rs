//! Binary mask selection from a label volume.

use ndarray::Array3;

use crate::volume::Volume;

/// Binary occupancy mask: `1` where the volume carries `label`, `0`
/// elsewhere. Same shape as the volume.
pub fn select_label(volume: &Volume, label: i32) -> Array3<u8> {
    volume.data().mapv(|v| u8::from(v == label))
}

/// Number of set voxels in a mask.
pub fn voxel_count(mask: &Array3<u8>) -> usize {
    mask.iter().filter(|&&v| v != 0).count()
}
