//! NIfTI-1 label volume I/O.
//!
//! Reads `.nii` and `.nii.gz` files (gzip is detected from the magic bytes,
//! not the extension) into a [`Volume`], and writes label volumes back as
//! 32-bit integer NIfTI-1 single files.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{Array, Array3, IxDyn};
use nifti::volume::ndarray::IntoNdArray;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};

use super::{Orientation, Volume};
use crate::error::{AtlasError, Result};

/// Check if bytes are gzip compressed.
fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// First three rows of the voxel-to-world affine.
///
/// Follows the header's own priority: the sform when `sform_code > 0`, then
/// the quaternion qform when `qform_code > 0`, otherwise a diagonal built
/// from the voxel sizes.
pub fn header_affine(header: &NiftiHeader) -> [[f64; 4]; 3] {
    if header.sform_code > 0 {
        let row = |r: &[f32; 4]| [r[0] as f64, r[1] as f64, r[2] as f64, r[3] as f64];
        [row(&header.srow_x), row(&header.srow_y), row(&header.srow_z)]
    } else if header.qform_code > 0 {
        qform_affine(header)
    } else {
        let s = header_spacing(header);
        [
            [s[0], 0.0, 0.0, 0.0],
            [0.0, s[1], 0.0, 0.0],
            [0.0, 0.0, s[2], 0.0],
        ]
    }
}

/// Affine from the qform quaternion, voxel sizes and `qfac`.
///
/// `a` is recovered from `b`, `c`, `d`; slightly non-unit quaternions are
/// renormalised instead of rejected.
fn qform_affine(header: &NiftiHeader) -> [[f64; 4]; 3] {
    let mut b = header.quatern_b as f64;
    let mut c = header.quatern_c as f64;
    let mut d = header.quatern_d as f64;
    let mut a = 1.0 - (b * b + c * c + d * d);
    if a < 1e-7 {
        let norm = (b * b + c * c + d * d).sqrt();
        if norm > 0.0 {
            b /= norm;
            c /= norm;
            d /= norm;
        }
        a = 0.0;
    } else {
        a = a.sqrt();
    }

    let rotation = [
        [a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d), 2.0 * (b * d + a * c)],
        [2.0 * (b * c + a * d), a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b)],
        [2.0 * (b * d - a * c), 2.0 * (c * d + a * b), a * a + d * d - b * b - c * c],
    ];

    let s = header_spacing(header);
    // qfac lives in pixdim[0]; anything but a negative value means +1.
    let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
    let scale = [s[0], s[1], qfac * s[2]];
    let offset = [
        header.quatern_x as f64,
        header.quatern_y as f64,
        header.quatern_z as f64,
    ];

    let mut rows = [[0.0; 4]; 3];
    for (r, row) in rows.iter_mut().enumerate() {
        for col in 0..3 {
            row[col] = rotation[r][col] * scale[col];
        }
        row[3] = offset[r];
    }
    rows
}

/// Voxel sizes from `pixdim`, with zero or missing sizes treated as 1 mm.
fn header_spacing(header: &NiftiHeader) -> [f64; 3] {
    let mut spacing = [1.0; 3];
    for (i, s) in spacing.iter_mut().enumerate() {
        let v = (header.pixdim[i + 1] as f64).abs();
        if v > 0.0 && v.is_finite() {
            *s = v;
        }
    }
    spacing
}

/// Decode a NIfTI volume from memory.
///
/// Values are rounded to the nearest integer label. For 4D inputs the first
/// volume is used.
pub fn load_nifti_bytes(bytes: &[u8], origin: &Path) -> Result<Volume> {
    let read_err = |message: String| AtlasError::Nifti {
        path: origin.to_path_buf(),
        message,
    };

    let obj: InMemNiftiObject = if is_gzip(bytes) {
        InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes)))
            .map_err(|e| read_err(format!("failed to read gzipped NIfTI: {}", e)))?
    } else {
        InMemNiftiObject::from_reader(Cursor::new(bytes))
            .map_err(|e| read_err(format!("failed to read NIfTI: {}", e)))?
    };

    let header = obj.header().clone();
    let ndim = header.dim[0] as usize;
    if ndim < 3 {
        return Err(AtlasError::InvalidDimensions { ndim });
    }

    let spacing = header_spacing(&header);
    let orientation = Orientation::from_affine(&header_affine(&header));

    let array: Array<f64, IxDyn> = obj
        .into_volume()
        .into_ndarray()
        .map_err(|e| read_err(format!("failed to convert to ndarray: {}", e)))?;

    let shape = array.shape().to_vec();
    if shape.len() < 3 {
        return Err(AtlasError::InvalidDimensions { ndim: shape.len() });
    }

    let (nx, ny, nz) = (shape[0], shape[1], shape[2]);
    let data = if shape.len() == 3 {
        Array3::from_shape_fn((nx, ny, nz), |(i, j, k)| array[[i, j, k]].round() as i32)
    } else {
        // Remaining axes beyond the fourth are singleton in label atlases.
        let mut index = vec![0usize; shape.len()];
        Array3::from_shape_fn((nx, ny, nz), |(i, j, k)| {
            index[0] = i;
            index[1] = j;
            index[2] = k;
            array[IxDyn(&index)].round() as i32
        })
    };

    log::debug!(
        "decoded {}: shape {:?}, spacing {:?}, orientation {}",
        origin.display(),
        [nx, ny, nz],
        spacing,
        orientation
    );

    Ok(Volume::new(data)
        .with_spacing(spacing)
        .with_orientation(orientation))
}

/// Read a NIfTI volume from a `.nii` or `.nii.gz` file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Volume> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    load_nifti_bytes(&bytes, path)
}

/// Encode a label volume as an uncompressed NIfTI-1 file (`n+1`, INT32).
///
/// The sform is a diagonal affine whose signs follow the volume's
/// orientation and whose origin puts the grid centre at world zero.
pub fn to_nifti_bytes(volume: &Volume) -> Result<Vec<u8>> {
    let [nx, ny, nz] = volume.shape();
    for &n in &[nx, ny, nz] {
        if n > i16::MAX as usize {
            return Err(AtlasError::invalid_param("shape", n, "exceeds NIfTI-1 dimension limit"));
        }
    }
    let spacing = volume.spacing();
    let orientation = volume.orientation();

    // Affine rows are indexed by world axis; each voxel axis contributes one column.
    let mut rows = [[0.0f32; 4]; 3];
    for (col, dir) in orientation.0.iter().enumerate() {
        let sign = if dir.is_ras_positive() { 1.0 } else { -1.0 };
        let n = [nx, ny, nz][col] as f64;
        rows[dir.axis()][col] = (sign * spacing[col]) as f32;
        rows[dir.axis()][3] = (-sign * spacing[col] * n / 2.0) as f32;
    }

    let mut header = [0u8; 348];

    // sizeof_hdr = 348
    header[0..4].copy_from_slice(&348i32.to_le_bytes());

    // dim[0..7]
    let dim: [i16; 8] = [3, nx as i16, ny as i16, nz as i16, 1, 1, 1, 1];
    for (i, &d) in dim.iter().enumerate() {
        let offset = 40 + i * 2;
        header[offset..offset + 2].copy_from_slice(&d.to_le_bytes());
    }

    // datatype = 8 (INT32), bitpix = 32
    header[70..72].copy_from_slice(&8i16.to_le_bytes());
    header[72..74].copy_from_slice(&32i16.to_le_bytes());

    // pixdim[0..7]
    let pixdim: [f32; 8] = [
        1.0,
        spacing[0] as f32,
        spacing[1] as f32,
        spacing[2] as f32,
        1.0,
        1.0,
        1.0,
        1.0,
    ];
    for (i, &p) in pixdim.iter().enumerate() {
        let offset = 76 + i * 4;
        header[offset..offset + 4].copy_from_slice(&p.to_le_bytes());
    }

    // vox_offset = 352 (header + 4 byte extension flag)
    header[108..112].copy_from_slice(&352.0f32.to_le_bytes());

    // scl_slope = 1.0, scl_inter = 0.0
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    header[116..120].copy_from_slice(&0.0f32.to_le_bytes());

    // xyzt_units = mm
    header[123] = 2;

    // sform_code = 1 (scanner anat)
    header[254..256].copy_from_slice(&1i16.to_le_bytes());

    for (r, row) in rows.iter().enumerate() {
        for (i, v) in row.iter().enumerate() {
            let offset = 280 + r * 16 + i * 4;
            header[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
        }
    }

    header[344..348].copy_from_slice(b"n+1\0");

    let mut buffer = Vec::with_capacity(352 + nx * ny * nz * 4);
    buffer.write_all(&header)?;
    buffer.write_all(&[0u8; 4])?;

    let data = volume.data();
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                buffer.write_all(&data[[i, j, k]].to_le_bytes())?;
            }
        }
    }

    Ok(buffer)
}

/// Write a label volume to disk.
///
/// Paths ending in `.nii.gz` are gzip compressed.
pub fn save<P: AsRef<Path>>(volume: &Volume, path: P) -> Result<()> {
    let path = path.as_ref();
    let raw = to_nifti_bytes(volume)?;

    let bytes = if path.to_string_lossy().ends_with(".nii.gz") {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        encoder.finish()?
    } else {
        raw
    };

    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled_volume() -> Volume {
        let mut volume = Volume::zeros([6, 7, 8]);
        volume.fill_box([1, 1, 1], [4, 4, 4], 10);
        volume.fill_box([4, 5, 6], [6, 7, 8], 49);
        volume
    }

    #[test]
    fn test_is_gzip() {
        assert!(is_gzip(&[0x1f, 0x8b, 0x08]));
        assert!(!is_gzip(b"n+1"));
        assert!(!is_gzip(&[0x1f]));
    }

    #[test]
    fn test_affine_fallback() {
        let mut header = NiftiHeader::default();
        header.pixdim[1] = 1.0;
        header.pixdim[2] = 2.0;
        header.pixdim[3] = 3.0;
        header.sform_code = 0;
        header.qform_code = 0;

        let affine = header_affine(&header);
        assert_eq!(affine[0][0], 1.0);
        assert_eq!(affine[1][1], 2.0);
        assert_eq!(affine[2][2], 3.0);
    }

    /// Rewrite an encoded header so only the qform describes orientation.
    fn qform_only(mut bytes: Vec<u8>, quaternion: [f32; 3], qfac: f32) -> Vec<u8> {
        bytes[76..80].copy_from_slice(&qfac.to_le_bytes());
        bytes[252..254].copy_from_slice(&1i16.to_le_bytes());
        bytes[254..256].copy_from_slice(&0i16.to_le_bytes());
        for (i, q) in quaternion.iter().enumerate() {
            let offset = 256 + i * 4;
            bytes[offset..offset + 4].copy_from_slice(&q.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_qform_identity_is_ras() {
        let mut header = NiftiHeader::default();
        header.sform_code = 0;
        header.qform_code = 1;
        header.pixdim = [1.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0];
        header.quatern_x = -10.0;

        let affine = header_affine(&header);
        assert_eq!(affine[0], [2.0, 0.0, 0.0, -10.0]);
        assert_eq!(affine[1], [0.0, 2.0, 0.0, 0.0]);
        assert_eq!(affine[2], [0.0, 0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_qform_only_lps_file() {
        // A half turn about z: voxel x points left, voxel y posterior.
        let bytes = to_nifti_bytes(&labelled_volume()).unwrap();
        let bytes = qform_only(bytes, [0.0, 0.0, 1.0], 1.0);

        let loaded = load_nifti_bytes(&bytes, Path::new("qform_lps.nii")).unwrap();
        assert_eq!(loaded.orientation(), Orientation::LPS);
        assert_eq!(loaded.count_label(10), 27);
    }

    #[test]
    fn test_qform_negative_qfac_flips_z() {
        let bytes = to_nifti_bytes(&labelled_volume()).unwrap();
        let bytes = qform_only(bytes, [0.0, 0.0, 0.0], -1.0);

        let loaded = load_nifti_bytes(&bytes, Path::new("qform_rai.nii")).unwrap();
        assert_eq!(loaded.orientation().code(), "RAI");
    }

    #[test]
    fn test_roundtrip_uncompressed() {
        let volume = labelled_volume().with_spacing([1.0, 1.5, 2.0]);
        let tmp_path = std::env::temp_dir().join("atlasmesh_roundtrip.nii");

        save(&volume, &tmp_path).unwrap();
        let loaded = load(&tmp_path).unwrap();

        assert_eq!(loaded.shape(), [6, 7, 8]);
        assert_eq!(loaded.data(), volume.data());
        assert!((loaded.spacing()[1] - 1.5).abs() < 1e-6);
        assert!((loaded.spacing()[2] - 2.0).abs() < 1e-6);
        assert_eq!(loaded.orientation(), Orientation::RAS);

        std::fs::remove_file(&tmp_path).ok();
    }

    #[test]
    fn test_roundtrip_gzip_keeps_orientation() {
        let volume = labelled_volume().with_orientation(Orientation::LPS);
        let tmp_path = std::env::temp_dir().join("atlasmesh_roundtrip_lps.nii.gz");

        save(&volume, &tmp_path).unwrap();
        let bytes = std::fs::read(&tmp_path).unwrap();
        assert!(is_gzip(&bytes));

        let loaded = load(&tmp_path).unwrap();
        assert_eq!(loaded.orientation(), Orientation::LPS);
        assert_eq!(loaded.count_label(10), 27);
        assert_eq!(loaded.count_label(49), 8);

        std::fs::remove_file(&tmp_path).ok();
    }

    #[test]
    fn test_garbage_is_an_error() {
        let result = load_nifti_bytes(b"definitely not a nifti file", Path::new("bad.nii"));
        assert!(matches!(result, Err(AtlasError::Nifti { .. })));
    }
}
