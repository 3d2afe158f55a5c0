//! Parallel implementations of the force computers.

use super::proximity::ProximityProbe;
use super::smoothing::relax_vertex;
use super::thickness::{column_correction, measure};
use super::traits::ForceOps;
use crate::config::{SmoothingWeights, ThicknessBounds};
use crate::float_types::Real;
use crate::surface::{Cortex, Surface, SurfacePair, SurfaceSelection};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

/// Parallel implementation of `ForceOps`.
#[derive(Debug, Clone, Copy)]
pub struct ParallelForceOps;

impl Default for ParallelForceOps {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelForceOps {
    pub const fn new() -> Self {
        Self
    }
}

impl ForceOps for ParallelForceOps {
    fn smoothing(
        &self,
        surface: &Surface,
        weights: SmoothingWeights,
        hold_boundary: bool,
    ) -> Vec<Vector3<Real>> {
        let start = surface.positions();
        let n = surface.vertex_count();
        // Build adjacency before fanning out
        surface.connectivity();

        // --- Lambda (shrinking) pass ---
        let shrunk: Vec<Point3<Real>> = (0..n)
            .into_par_iter()
            .map(|v| relax_vertex(surface, start, v, weights.lambda, hold_boundary))
            .collect();

        // --- Mu (inflating) pass ---
        (0..n)
            .into_par_iter()
            .map(|v| relax_vertex(surface, &shrunk, v, weights.mu, hold_boundary) - start[v])
            .collect()
    }

    fn proximity(
        &self,
        probe: &ProximityProbe<'_>,
        selection: SurfaceSelection,
    ) -> [Vec<Vector3<Real>>; 2] {
        let n = probe.pair().vertex_count();
        Cortex::ALL.map(|cortex| {
            if !selection.includes(cortex) {
                return vec![Vector3::zeros(); n];
            }
            probe.pair().surface(cortex).connectivity();
            (0..n)
                .into_par_iter()
                .map(|v| probe.correction(cortex, v))
                .collect()
        })
    }

    fn violations(&self, probe: &ProximityProbe<'_>) -> usize {
        let n = probe.pair().vertex_count();
        Cortex::ALL
            .into_iter()
            .map(|cortex| {
                (0..n)
                    .into_par_iter()
                    .filter(|&v| probe.is_violating(cortex, v))
                    .count()
            })
            .sum()
    }

    fn thickness(
        &self,
        pair: &SurfacePair,
        bounds: &ThicknessBounds,
        selection: SurfaceSelection,
    ) -> [Vec<Vector3<Real>>; 2] {
        let [wn, pn] = Cortex::ALL.map(|c| pair.surface(c).vertex_normals());
        let (white, pial) = (pair.white().positions(), pair.pial().positions());

        let (w, p): (Vec<_>, Vec<_>) = (0..white.len())
            .into_par_iter()
            .map(|v| {
                let [w, p] = measure(&white[v], &pial[v], &wn[v], &pn[v])
                    .map_or([Vector3::zeros(); 2], |column| {
                        column_correction(column, bounds, selection)
                    });
                (w, p)
            })
            .unzip();
        [w, p]
    }

    fn admit(
        &self,
        probe: &ProximityProbe<'_>,
        cortex: Cortex,
        steps: Vec<Vector3<Real>>,
    ) -> Vec<Vector3<Real>> {
        steps
            .into_par_iter()
            .enumerate()
            .map(|(v, step)| probe.admit(cortex, v, step))
            .collect()
    }
}
