mod support;

use cortex_smooth::{Rgb, Surface, io};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cortex_smooth"))
}

/// Writes a noisy plane pair and returns (white_in, pial_in, white_out, pial_out)
fn inputs(dir: &Path) -> [PathBuf; 4] {
    let (white, pial) = support::noisy_planes(8, 2.0, 0.05).into_surfaces();
    let paths = ["white.off", "pial.off", "white.out.off", "pial.out.ply"].map(|n| dir.join(n));
    io::write_surface(&paths[0], &white).unwrap();
    io::write_surface(&paths[1], &pial).unwrap();
    paths
}

#[test]
fn three_positionals_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let [white, pial, white_out, pial_out] = inputs(dir.path());

    let status = bin().args([&white, &pial, &white_out]).status().unwrap();
    assert!(!status.success());
    assert!(!white_out.exists());
    assert!(!pial_out.exists());
}

#[test]
fn vertex_count_mismatch_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let [white, pial, white_out, pial_out] = inputs(dir.path());
    io::write_surface(&pial, &Surface::grid_plane(9, 1.0)).unwrap();

    let output = bin().args([&white, &pial, &white_out, &pial_out]).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("vertex count mismatch"), "{stderr}");
    assert!(!white_out.exists());
    assert!(!pial_out.exists());
}

#[test]
fn conflicting_selections_are_rejected() {
    let dir = TempDir::new().unwrap();
    let [white, pial, white_out, pial_out] = inputs(dir.path());
    let status = bin()
        .args([&white, &pial, &white_out, &pial_out])
        .args(["--white-only", "--pial-only"])
        .status()
        .unwrap();
    assert!(!status.success());
    assert!(!white_out.exists());
}

#[test]
fn out_of_range_trace_vertex_fails() {
    let dir = TempDir::new().unwrap();
    let [white, pial, white_out, pial_out] = inputs(dir.path());
    let status = bin()
        .args([&white, &pial, &white_out, &pial_out])
        .args(["--trace-vertex", "64"])
        .status()
        .unwrap();
    assert!(!status.success());
    assert!(!white_out.exists());
}

#[test]
fn successful_run_writes_tagged_outputs_and_trace() {
    let dir = TempDir::new().unwrap();
    let [white, pial, white_out, pial_out] = inputs(dir.path());
    let trace = dir.path().join("trace.tsv");

    let output = bin()
        .args([&white, &pial, &white_out, &pial_out])
        .args(["--lambda", "0.33", "0.33", "--mju", "-0.34", "-0.34", "--iter", "20"])
        .arg("--trace-vertex")
        .arg("27")
        .arg("--trace-out")
        .arg(&trace)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let smoothed_white = io::read_surface(&white_out).unwrap();
    let smoothed_pial = io::read_surface(&pial_out).unwrap();
    assert_eq!(smoothed_white.vertex_count(), 64);
    assert_eq!(smoothed_pial.vertex_count(), 64);
    assert!(smoothed_white.colors.unwrap().iter().all(|c| *c == Rgb::YELLOW));
    assert!(smoothed_pial.colors.unwrap().iter().all(|c| *c == Rgb::RED));
    assert!(smoothed_white.comments.iter().any(|c| c.starts_with("cortex-smooth")));

    let rows = std::fs::read_to_string(&trace).unwrap();
    assert!(rows.lines().count() >= 2);
    assert!(rows.starts_with("iteration\t"));
}

#[test]
fn failed_pial_write_leaves_no_white_output() {
    let dir = TempDir::new().unwrap();
    let [white, pial, white_out, _] = inputs(dir.path());
    let pial_out = dir.path().join("missing").join("pial.out.off");

    let output = bin()
        .args([&white, &pial, &white_out, &pial_out])
        .args(["--iter", "2"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("writing pial surface"), "{stderr}");
    assert!(!white_out.exists());
    // Only the two inputs are left behind
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}
