//! Traits for the per-vertex force computers.

use super::proximity::ProximityProbe;
use crate::config::{SmoothingWeights, ThicknessBounds};
use crate::float_types::Real;
use crate::surface::{Cortex, Surface, SurfacePair, SurfaceSelection};
use nalgebra::Vector3;

/// Per-vertex force evaluation over a surface pair.
///
/// Every method reads the current positions and returns displacements in
/// vertex order; none of them mutates the surfaces.
pub trait ForceOps {
    /// Taubin λ/μ displacement of every vertex of `surface`.
    fn smoothing(
        &self,
        surface: &Surface,
        weights: SmoothingWeights,
        hold_boundary: bool,
    ) -> Vec<Vector3<Real>>;

    /// Proximity correction for the surfaces in `selection`, white first.
    /// Unselected surfaces get zeros.
    fn proximity(
        &self,
        probe: &ProximityProbe<'_>,
        selection: SurfaceSelection,
    ) -> [Vec<Vector3<Real>>; 2];

    /// Number of vertices of both surfaces violating the minimum distance.
    fn violations(&self, probe: &ProximityProbe<'_>) -> usize;

    /// Thickness correction, white first.
    fn thickness(
        &self,
        pair: &SurfacePair,
        bounds: &ThicknessBounds,
        selection: SurfaceSelection,
    ) -> [Vec<Vector3<Real>>; 2];

    /// Shrink every step of `cortex` that would worsen its vertex's proximity.
    fn admit(
        &self,
        probe: &ProximityProbe<'_>,
        cortex: Cortex,
        steps: Vec<Vector3<Real>>,
    ) -> Vec<Vector3<Real>>;
}
