//! Two-pass Taubin λ/μ smoothing displacement
//!
//! Pass 1 moves every vertex toward the centroid of its one-ring by `λ`;
//! pass 2 applies the same umbrella operator to the pass-1 result with the
//! negative factor `μ`, undoing the shrinkage of a plain Laplacian. Each pass
//! reads only the positions produced before it started.

use super::{DefaultForceOps, ForceOps};
use crate::config::SmoothingWeights;
use crate::float_types::Real;
use crate::surface::Surface;
use nalgebra::{Point3, Vector3};

/// One umbrella step of `vertex` read from `positions`. Isolated vertices,
/// and boundary vertices when `hold_boundary` is set, stay where they are.
#[inline]
pub(crate) fn relax_vertex(
    surface: &Surface,
    positions: &[Point3<Real>],
    vertex: usize,
    factor: Real,
    hold_boundary: bool,
) -> Point3<Real> {
    let p = positions[vertex];
    if hold_boundary && surface.connectivity().boundary[vertex] {
        return p;
    }
    match surface.umbrella(positions, vertex) {
        Some(u) => p + u * factor,
        None => p,
    }
}

/// Taubin displacement of every vertex of `surface` (start-to-end of both
/// passes). The surface itself is left untouched.
pub fn compute(surface: &Surface, lambda: Real, mu: Real) -> Vec<Vector3<Real>> {
    DefaultForceOps::new().smoothing(surface, SmoothingWeights { lambda, mu }, false)
}

/// Same as [`compute`] but boundary vertices of open meshes are held fixed
pub fn compute_preserving_boundary(
    surface: &Surface,
    lambda: Real,
    mu: Real,
) -> Vec<Vector3<Real>> {
    DefaultForceOps::new().smoothing(surface, SmoothingWeights { lambda, mu }, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float_types::{TAUBIN_LAMBDA, TAUBIN_MU};

    fn apply(surface: &mut Surface, displacement: &[Vector3<Real>]) {
        for (v, d) in displacement.iter().enumerate() {
            let p = surface.position(v);
            surface.set_position(v, p + d);
        }
    }

    #[test]
    fn flat_grid_interior_is_a_fixed_point() {
        let grid = Surface::grid_plane(6, 1.0);
        let disp = compute_preserving_boundary(&grid, TAUBIN_LAMBDA, TAUBIN_MU);
        assert!(disp.iter().all(|d| d.norm() < 1e-12));
    }

    #[test]
    fn boundary_is_held_only_on_request() {
        let mut grid = Surface::grid_plane(5, 1.0);
        // Lift one interior vertex and one corner
        grid.set_position(12, Point3::new(2.0, 2.0, 0.5));
        grid.set_position(0, Point3::new(0.0, 0.0, 0.5));

        let held = compute_preserving_boundary(&grid, TAUBIN_LAMBDA, TAUBIN_MU);
        let boundary = &grid.connectivity().boundary;
        for (v, d) in held.iter().enumerate() {
            if boundary[v] {
                assert_eq!(*d, Vector3::zeros());
            }
        }
        assert!(held[12].z < 0.0);

        let free = compute(&grid, TAUBIN_LAMBDA, TAUBIN_MU);
        assert!(free[0].norm() > 0.0);
    }

    #[test]
    fn isolated_vertex_gets_zero() {
        let mut vertices: Vec<Point3<Real>> = Surface::grid_plane(3, 1.0).positions().to_vec();
        let faces = Surface::grid_plane(3, 1.0).faces().to_vec();
        vertices.push(Point3::new(10.0, 10.0, 10.0));
        let s = Surface::new(vertices, faces).unwrap();
        let disp = compute(&s, TAUBIN_LAMBDA, TAUBIN_MU);
        assert_eq!(disp[9], Vector3::zeros());
    }

    #[test]
    fn taubin_preserves_volume_where_laplacian_shrinks() {
        let reference = Surface::icosphere(1.0, 3);
        let v0 = reference.volume();

        let mut taubin = reference.clone();
        let mut laplacian = reference.clone();
        for _ in 0..10 {
            let d = compute(&taubin, TAUBIN_LAMBDA, TAUBIN_MU);
            apply(&mut taubin, &d);
            let d = compute(&laplacian, TAUBIN_LAMBDA, 0.0);
            apply(&mut laplacian, &d);
        }

        let taubin_change = (taubin.volume() - v0) / v0;
        let laplacian_change = (laplacian.volume() - v0) / v0;
        assert!(taubin_change.abs() < 0.01, "taubin changed volume by {taubin_change}");
        assert!(laplacian_change < -0.05, "laplacian changed volume by {laplacian_change}");
    }

    #[test]
    fn passes_read_their_own_snapshot() {
        // A single lifted vertex: after the λ pass its neighbors have moved
        // up, so the μ pass sees a smaller bump than the original.
        let mut grid = Surface::grid_plane(5, 1.0);
        grid.set_position(12, Point3::new(2.0, 2.0, 1.0));
        let disp = compute(&grid, 0.5, -0.5);

        let after_lambda = 1.0 - 0.5;
        let ring_after_lambda = 0.5 / 6.0;
        let expected = after_lambda - 0.5 * (ring_after_lambda - after_lambda) - 1.0;
        assert!((disp[12].z - expected).abs() < 1e-12, "{} vs {expected}", disp[12].z);
    }
}
