//! Test support library
//! Provides surface fixtures, a NIfTI writer and comparison helpers for tests.

#![allow(dead_code)]

use cortex_smooth::{Surface, SurfacePair, float_types::Real};
use nalgebra::{Point3, Vector3};
use std::io::Write;

/// Two parallel `n x n` grids with unit spacing, the pial sheet `gap` above
/// the white one.
pub fn planes(n: usize, gap: Real) -> SurfacePair {
    let white = Surface::grid_plane(n, 1.0);
    let pial = white.translated(Vector3::new(0.0, 0.0, gap));
    SurfacePair::new(white, pial).unwrap()
}

/// Deterministic offset in `[-amplitude, amplitude]` for vertex `v`
pub fn jitter(v: usize, amplitude: Real) -> Real {
    let h = (v.wrapping_mul(7919) ^ (v >> 3)) % 101;
    (h as Real / 50.0 - 1.0) * amplitude
}

/// Like [`planes`], with every vertex moved along z by up to `noise`
pub fn noisy_planes(n: usize, gap: Real, noise: Real) -> SurfacePair {
    let white = Surface::grid_plane(n, 1.0);
    let mut pial = white.translated(Vector3::new(0.0, 0.0, gap));
    let mut white = white;
    for v in 0..white.vertex_count() {
        let p = white.position(v);
        white.set_position(v, p + Vector3::z() * jitter(v, noise));
        let q = pial.position(v);
        pial.set_position(v, q + Vector3::z() * jitter(v + 1000, noise));
    }
    SurfacePair::new(white, pial).unwrap()
}

pub fn mean_z(points: &[Point3<Real>]) -> Real {
    points.iter().map(|p| p.z).sum::<Real>() / points.len() as Real
}

/// Mean pial-minus-white height of a plane pair
pub fn separation(pair: &SurfacePair) -> Real {
    mean_z(pair.pial().positions()) - mean_z(pair.white().positions())
}

/// Asserts that two reals are approximately equal within `eps`
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

/// Uncompressed single-file NIfTI-1 image with float32 voxels, x fastest,
/// and an sform built from `affine` (row-major, top three rows used).
pub fn nifti_bytes(data: &[f32], dims: (usize, usize, usize), affine: &[f32; 16]) -> Vec<u8> {
    let (nx, ny, nz) = dims;
    assert_eq!(data.len(), nx * ny * nz);
    let mut header = [0u8; 348];

    header[0..4].copy_from_slice(&348i32.to_le_bytes());
    let dim: [i16; 8] = [3, nx as i16, ny as i16, nz as i16, 1, 1, 1, 1];
    for (i, d) in dim.iter().enumerate() {
        header[40 + 2 * i..42 + 2 * i].copy_from_slice(&d.to_le_bytes());
    }
    // FLOAT32
    header[70..72].copy_from_slice(&16i16.to_le_bytes());
    header[72..74].copy_from_slice(&32i16.to_le_bytes());
    let pixdim: [f32; 8] = [1.0, affine[0], affine[5], affine[10], 1.0, 1.0, 1.0, 1.0];
    for (i, p) in pixdim.iter().enumerate() {
        header[76 + 4 * i..80 + 4 * i].copy_from_slice(&p.to_le_bytes());
    }
    header[108..112].copy_from_slice(&352.0f32.to_le_bytes());
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    // sform_code = 1
    header[254..256].copy_from_slice(&1i16.to_le_bytes());
    for row in 0..3 {
        for col in 0..4 {
            let offset = 280 + 16 * row + 4 * col;
            header[offset..offset + 4].copy_from_slice(&affine[4 * row + col].to_le_bytes());
        }
    }
    header[344..348].copy_from_slice(b"n+1\0");

    let mut buffer = Vec::with_capacity(352 + 4 * data.len());
    buffer.extend_from_slice(&header);
    buffer.extend_from_slice(&[0u8; 4]);
    for v in data {
        buffer.extend_from_slice(&v.to_le_bytes());
    }
    buffer
}

/// Gzip-compressed variant of [`nifti_bytes`]
pub fn nifti_gz_bytes(data: &[f32], dims: (usize, usize, usize), affine: &[f32; 16]) -> Vec<u8> {
    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&nifti_bytes(data, dims, affine)).unwrap();
    encoder.finish().unwrap()
}

pub const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];
