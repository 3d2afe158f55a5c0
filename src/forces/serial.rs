//! Serial implementations of the force computers.

use super::proximity::ProximityProbe;
use super::smoothing::relax_vertex;
use super::thickness::{column_correction, measure};
use super::traits::ForceOps;
use crate::config::{SmoothingWeights, ThicknessBounds};
use crate::float_types::Real;
use crate::surface::{Cortex, Surface, SurfacePair, SurfaceSelection};
use nalgebra::{Point3, Vector3};

/// Serial implementation of `ForceOps`.
#[derive(Debug, Clone, Copy)]
pub struct SerialForceOps;

impl Default for SerialForceOps {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialForceOps {
    pub const fn new() -> Self {
        Self
    }
}

impl ForceOps for SerialForceOps {
    fn smoothing(
        &self,
        surface: &Surface,
        weights: SmoothingWeights,
        hold_boundary: bool,
    ) -> Vec<Vector3<Real>> {
        let start = surface.positions();
        let n = surface.vertex_count();

        // --- Lambda (shrinking) pass ---
        let shrunk: Vec<Point3<Real>> = (0..n)
            .map(|v| relax_vertex(surface, start, v, weights.lambda, hold_boundary))
            .collect();

        // --- Mu (inflating) pass ---
        (0..n)
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
            (0..n).map(|v| probe.correction(cortex, v)).collect()
        })
    }

    fn violations(&self, probe: &ProximityProbe<'_>) -> usize {
        let n = probe.pair().vertex_count();
        Cortex::ALL
            .into_iter()
            .map(|cortex| (0..n).filter(|&v| probe.is_violating(cortex, v)).count())
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

        let mut out = [
            Vec::with_capacity(white.len()),
            Vec::with_capacity(pial.len()),
        ];
        for v in 0..white.len() {
            let [w, p] = measure(&white[v], &pial[v], &wn[v], &pn[v])
                .map_or([Vector3::zeros(); 2], |column| {
                    column_correction(column, bounds, selection)
                });
            out[0].push(w);
            out[1].push(p);
        }
        out
    }

    fn admit(
        &self,
        probe: &ProximityProbe<'_>,
        cortex: Cortex,
        steps: Vec<Vector3<Real>>,
    ) -> Vec<Vector3<Real>> {
        steps
            .into_iter()
            .enumerate()
            .map(|(v, step)| probe.admit(cortex, v, step))
            .collect()
    }
}
