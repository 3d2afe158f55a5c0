mod support;

use cortex_smooth::{
    NonCortexMask, Rgb, Surface,
    io::{self, IoError},
};
use nalgebra::Point3;
use std::fs;
use tempfile::TempDir;

fn ramp(dims: (usize, usize, usize)) -> Vec<f32> {
    let (nx, ny, nz) = dims;
    let mut data = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                data.push((i + 10 * j + 100 * k) as f32);
            }
        }
    }
    data
}

#[test]
fn off_and_ply_files_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut surface = Surface::icosphere(5.0, 2);
    surface.add_comment("lh white");
    surface.paint(Rgb::YELLOW);

    for name in ["lh.white.off", "lh.white.ply"] {
        let path = dir.path().join(name);
        io::write_surface(&path, &surface).unwrap();
        let back = io::read_surface(&path).unwrap();

        assert_eq!(back.positions(), surface.positions(), "{name}");
        assert_eq!(back.faces(), surface.faces(), "{name}");
        assert_eq!(back.comments, surface.comments, "{name}");
        assert_eq!(back.colors.as_ref().map(Vec::len), Some(surface.vertex_count()));
    }
}

#[test]
fn missing_and_broken_files_are_errors() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.off");
    assert!(matches!(io::read_surface(&missing), Err(IoError::File { .. })));

    let broken = dir.path().join("broken.off");
    fs::write(&broken, "OFF\n3 1 0\n0 0 0\n1 0 0\n").unwrap();
    assert!(matches!(io::read_surface(&broken), Err(IoError::MalformedInput { .. })));

    let err = io::read_volume(dir.path().join("nope.nii")).unwrap_err();
    assert!(err.to_string().contains("nope.nii"));
}

#[test]
fn nifti_volume_is_sampled_through_its_affine() {
    let dir = TempDir::new().unwrap();
    let dims = (4, 4, 2);
    // 2 mm voxels shifted by (-1, 0, 3)
    let affine: [f32; 16] = [
        2.0, 0.0, 0.0, -1.0, //
        0.0, 2.0, 0.0, 0.0, //
        0.0, 0.0, 2.0, 3.0, //
        0.0, 0.0, 0.0, 1.0,
    ];
    let path = dir.path().join("t1w.nii");
    fs::write(&path, support::nifti_bytes(&ramp(dims), dims, &affine)).unwrap();

    let volume = io::read_volume(&path).unwrap();
    assert_eq!(volume.dims(), dims);
    // voxel (1, 2, 1)
    assert_eq!(volume.sample_world(&Point3::new(1.0, 4.0, 5.0)), Some(121.0));
    assert_eq!(volume.sample_world(&Point3::new(-1.0, 0.0, 3.0)), Some(0.0));
    assert_eq!(volume.sample_world(&Point3::new(-5.0, 0.0, 3.0)), None);
}

#[test]
fn gzipped_mask_labels_surface_vertices() {
    let dir = TempDir::new().unwrap();
    let dims = (4, 4, 1);
    let data: Vec<f32> = ramp(dims)
        .into_iter()
        .map(|v| if (v as usize) % 10 >= 2 { 1.0 } else { 0.0 })
        .collect();
    let path = dir.path().join("nonctx.nii.gz");
    fs::write(&path, support::nifti_gz_bytes(&data, dims, &support::IDENTITY)).unwrap();

    let volume = io::read_volume(&path).unwrap();
    let grid = Surface::grid_plane(5, 1.0);
    let mask = NonCortexMask::from_volume(&volume, &grid);

    assert_eq!(mask.len(), grid.vertex_count());
    // x in {2, 3} and y in 0..4; the x = 4 and y = 4 rows are outside the image
    assert_eq!(mask.masked_count(), 8);
    for (v, p) in grid.positions().iter().enumerate() {
        assert_eq!(mask.is_masked(v), (2.0..4.0).contains(&p.x) && p.y < 4.0);
    }
}
