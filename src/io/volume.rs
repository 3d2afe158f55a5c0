//! Read-only NIfTI volumes sampled at world coordinates
//!
//! Used for the non-cortex mask and the optional T1-weighted background
//! image. Both `.nii` and gzip-compressed `.nii.gz` are accepted; gzip is
//! detected from the magic bytes, not the extension.

use super::{IoError, IoResult};
use crate::float_types::Real;
use flate2::read::GzDecoder;
use nalgebra::{Matrix4, Point3};
use ndarray::{Array, Array3, Axis, Ix3, IxDyn};
use nifti::volume::ndarray::IntoNdArray;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// A scalar 3D image with its voxel-to-world affine.
#[derive(Debug, Clone)]
pub struct VolumeImage {
    data: Array3<Real>,
    affine: Matrix4<Real>,
    world_to_voxel: Matrix4<Real>,
}

impl VolumeImage {
    /// Wrap voxel data indexed `[i, j, k]`. Fails if `affine` is singular.
    pub fn new(data: Array3<Real>, affine: Matrix4<Real>) -> Option<Self> {
        let world_to_voxel = affine.try_inverse()?;
        Some(Self {
            data,
            affine,
            world_to_voxel,
        })
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub const fn affine(&self) -> &Matrix4<Real> {
        &self.affine
    }

    pub fn data(&self) -> &Array3<Real> {
        &self.data
    }

    /// Voxel holding world point `p` (nearest neighbor), if inside the grid
    pub fn voxel_of(&self, p: &Point3<Real>) -> Option<[usize; 3]> {
        let v = self.world_to_voxel.transform_point(p);
        let (nx, ny, nz) = self.dims();
        let index = |c: Real, n: usize| {
            let r = c.round();
            (r >= 0.0 && r < n as Real).then_some(r as usize)
        };
        Some([index(v.x, nx)?, index(v.y, ny)?, index(v.z, nz)?])
    }

    /// Intensity at world point `p`, `None` outside the grid
    pub fn sample_world(&self, p: &Point3<Real>) -> Option<Real> {
        self.voxel_of(p).map(|idx| self.data[idx])
    }
}

/// Check if bytes are gzip compressed
fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Voxel-to-world affine, preferring the sform rows and falling back to
/// plain voxel scaling.
#[rustfmt::skip]
fn header_affine(header: &NiftiHeader) -> Matrix4<Real> {
    if header.sform_code > 0 {
        let (s, t, u) = (&header.srow_x, &header.srow_y, &header.srow_z);
        Matrix4::new(
            s[0] as Real, s[1] as Real, s[2] as Real, s[3] as Real,
            t[0] as Real, t[1] as Real, t[2] as Real, t[3] as Real,
            u[0] as Real, u[1] as Real, u[2] as Real, u[3] as Real,
            0.0, 0.0, 0.0, 1.0,
        )
    } else {
        let scale = |d: f32| if d > 0.0 { d as Real } else { 1.0 };
        Matrix4::new_nonuniform_scaling(&nalgebra::Vector3::new(
            scale(header.pixdim[1]),
            scale(header.pixdim[2]),
            scale(header.pixdim[3]),
        ))
    }
}

/// Parse a NIfTI image held in memory. 4D images contribute their first
/// volume.
pub fn load_volume(bytes: &[u8], path: &Path) -> IoResult<VolumeImage> {
    let obj = if is_gzip(bytes) {
        InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes)))?
    } else {
        InMemNiftiObject::from_reader(Cursor::new(bytes))?
    };

    let affine = header_affine(obj.header());
    let array: Array<f64, IxDyn> = obj.into_volume().into_ndarray()?;
    debug!("NIfTI {} has shape {:?}", path.display(), array.shape());

    let array = match array.ndim() {
        3 => array,
        n if n > 3 => {
            let mut a = array;
            while a.ndim() > 3 {
                a = a.index_axis_move(Axis(3), 0);
            }
            a
        },
        n => {
            return Err(IoError::malformed(
                path,
                format!("expected at least a 3D volume, got {n}D"),
            ));
        },
    };
    let data = array
        .into_dimensionality::<Ix3>()
        .map_err(|e| IoError::malformed(path, e.to_string()))?
        .mapv(|v| v as Real);

    VolumeImage::new(data, affine)
        .ok_or_else(|| IoError::malformed(path, "voxel-to-world affine is singular"))
}

/// Read a NIfTI file from a filesystem path
pub fn read_volume(path: impl AsRef<Path>) -> IoResult<VolumeImage> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| IoError::file(path, e))?;
    load_volume(&bytes, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn ramp() -> VolumeImage {
        let data = Array3::from_shape_fn((4, 4, 4), |(i, j, k)| (i + 10 * j + 100 * k) as Real);
        // 2 mm voxels, origin shifted to (-4, -4, -4)
        let affine = Matrix4::new_translation(&Vector3::new(-4.0, -4.0, -4.0))
            * Matrix4::new_scaling(2.0);
        VolumeImage::new(data, affine).unwrap()
    }

    #[test]
    fn samples_nearest_voxel() {
        let img = ramp();
        assert_eq!(img.dims(), (4, 4, 4));
        assert_eq!(img.voxel_of(&Point3::new(-4.0, -4.0, -4.0)), Some([0, 0, 0]));
        // (0.9, -1.2, 2.1) -> voxel (2.45, 1.4, 3.05) -> (2, 1, 3)
        assert_eq!(img.sample_world(&Point3::new(0.9, -1.2, 2.1)), Some(312.0));
    }

    #[test]
    fn outside_the_grid_is_none() {
        let img = ramp();
        assert_eq!(img.sample_world(&Point3::new(-6.0, 0.0, 0.0)), None);
        assert_eq!(img.sample_world(&Point3::new(0.0, 0.0, 3.5)), None);
    }

    #[test]
    fn singular_affine_is_rejected() {
        let data = Array3::zeros((2, 2, 2));
        assert!(VolumeImage::new(data, Matrix4::zeros()).is_none());
    }

    #[test]
    fn gzip_detection() {
        assert!(is_gzip(&[0x1f, 0x8b, 0x00]));
        assert!(!is_gzip(&[0x00, 0x00, 0x00]));
        assert!(!is_gzip(&[0x1f]));
    }
}
