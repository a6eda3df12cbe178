//! Binary morphology on 3D masks.
//!
//! All operations use the 6-connected cross (a voxel and its face
//! neighbours) as structuring element, and treat voxels outside the grid
//! as background for both erosion and dilation.
//!
//! [`condition`] is the noise-removal step applied to each structure before
//! surface extraction: an opening followed by a closing.
//!
//! ```
//! use atlasmesh::algo::morphology::{condition, opening};
//! use ndarray::Array3;
//!
//! let mut mask = Array3::<u8>::zeros((7, 7, 7));
//! mask[[3, 3, 3]] = 1; // isolated speck
//! assert!(opening(&mask, 1).iter().all(|&v| v == 0));
//! assert_eq!(condition(&mask, 0), mask);
//! ```

use ndarray::Array3;

const NEIGHBOURS: [[isize; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

/// Value of the face neighbour in direction `d`, or 0 outside the grid.
#[inline]
fn neighbour(mask: &Array3<u8>, x: usize, y: usize, z: usize, d: [isize; 3]) -> u8 {
    let nx = x.checked_add_signed(d[0]);
    let ny = y.checked_add_signed(d[1]);
    let nz = z.checked_add_signed(d[2]);
    match (nx, ny, nz) {
        (Some(nx), Some(ny), Some(nz)) => mask.get((nx, ny, nz)).copied().unwrap_or(0),
        _ => 0,
    }
}

/// One erosion step: a voxel stays set only if it and all six face
/// neighbours are set.
pub fn erode(mask: &Array3<u8>) -> Array3<u8> {
    Array3::from_shape_fn(mask.dim(), |(x, y, z)| {
        let keep = mask[[x, y, z]] != 0
            && NEIGHBOURS
                .iter()
                .all(|&d| neighbour(mask, x, y, z, d) != 0);
        u8::from(keep)
    })
}

/// One dilation step: a voxel becomes set if it or any face neighbour is set.
pub fn dilate(mask: &Array3<u8>) -> Array3<u8> {
    Array3::from_shape_fn(mask.dim(), |(x, y, z)| {
        let set = mask[[x, y, z]] != 0
            || NEIGHBOURS
                .iter()
                .any(|&d| neighbour(mask, x, y, z, d) != 0);
        u8::from(set)
    })
}

fn repeat(mask: &Array3<u8>, steps: usize, op: fn(&Array3<u8>) -> Array3<u8>) -> Array3<u8> {
    let mut out = mask.clone();
    for _ in 0..steps {
        out = op(&out);
    }
    out
}

/// `iterations` erosions followed by `iterations` dilations.
///
/// Removes features thinner than the structuring element allows.
pub fn opening(mask: &Array3<u8>, iterations: usize) -> Array3<u8> {
    repeat(&repeat(mask, iterations, erode), iterations, dilate)
}

/// `iterations` dilations followed by `iterations` erosions.
///
/// Fills small holes and gaps.
pub fn closing(mask: &Array3<u8>, iterations: usize) -> Array3<u8> {
    repeat(&repeat(mask, iterations, dilate), iterations, erode)
}

/// Opening then closing, each with `iterations` steps.
///
/// With `iterations == 0` the result is an exact copy of the input.
pub fn condition(mask: &Array3<u8>, iterations: usize) -> Array3<u8> {
    if iterations == 0 {
        return mask.clone();
    }
    closing(&opening(mask, iterations), iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::select::voxel_count;

    fn box_mask(shape: (usize, usize, usize), lo: [usize; 3], hi: [usize; 3]) -> Array3<u8> {
        Array3::from_shape_fn(shape, |(x, y, z)| {
            let p = [x, y, z];
            u8::from((0..3).all(|i| p[i] >= lo[i] && p[i] < hi[i]))
        })
    }

    #[test]
    fn test_zero_iterations_is_identity() {
        let mut mask = box_mask((6, 6, 6), [1, 1, 1], [4, 5, 3]);
        mask[[5, 5, 5]] = 1;
        assert_eq!(condition(&mask, 0), mask);
        assert_eq!(opening(&mask, 0), mask);
        assert_eq!(closing(&mask, 0), mask);
    }

    #[test]
    fn test_erode_dilate_single_voxel() {
        let mut mask = Array3::<u8>::zeros((5, 5, 5));
        mask[[2, 2, 2]] = 1;

        assert_eq!(voxel_count(&erode(&mask)), 0);
        let grown = dilate(&mask);
        assert_eq!(voxel_count(&grown), 7);
        assert_eq!(grown[[2, 2, 3]], 1);
        assert_eq!(grown[[3, 3, 2]], 0);
    }

    #[test]
    fn test_border_counts_as_background() {
        let full = Array3::<u8>::ones((3, 3, 3));
        let eroded = erode(&full);
        assert_eq!(voxel_count(&eroded), 1);
        assert_eq!(eroded[[1, 1, 1]], 1);
    }

    #[test]
    fn test_opening_removes_noise() {
        let mut mask = box_mask((12, 12, 12), [2, 2, 2], [9, 9, 9]);
        mask[[11, 0, 0]] = 1;
        mask[[0, 11, 5]] = 1;

        let opened = opening(&mask, 1);
        assert_eq!(opened[[11, 0, 0]], 0);
        assert_eq!(opened[[0, 11, 5]], 0);
        assert_eq!(opened[[5, 5, 5]], 1);
    }

    #[test]
    fn test_closing_fills_hole() {
        let mut mask = box_mask((9, 9, 9), [1, 1, 1], [8, 8, 8]);
        mask[[4, 4, 4]] = 0;

        let closed = closing(&mask, 1);
        assert_eq!(closed[[4, 4, 4]], 1);
        assert_eq!(closed, box_mask((9, 9, 9), [1, 1, 1], [8, 8, 8]));
    }

    #[test]
    fn test_condition_keeps_shape() {
        let mask = box_mask((10, 11, 12), [2, 3, 2], [8, 9, 10]);
        let conditioned = condition(&mask, 2);
        assert_eq!(conditioned.dim(), mask.dim());
        // A box survives opening by the cross unchanged except for its edges.
        assert_eq!(conditioned[[5, 6, 6]], 1);
        assert_eq!(conditioned[[0, 0, 0]], 0);
    }
}
