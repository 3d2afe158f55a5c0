//! Immutable deformation parameters
//!
//! A [`DeformConfig`] is built once before a run and passed by reference to
//! every component; nothing reads parameters from shared mutable state.

use crate::errors::{DeformError, DeformResult};
use crate::float_types::{Real, TAUBIN_LAMBDA, TAUBIN_MU};
use crate::spatial::DEFAULT_DEPTH;
use crate::surface::{Cortex, SurfaceSelection};

/// λ/μ pair for the two Taubin passes of one surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingWeights {
    /// Positive, shrinking pass factor
    pub lambda: Real,
    /// Negative, inflating pass factor
    pub mu: Real,
}

impl Default for SmoothingWeights {
    fn default() -> Self {
        Self {
            lambda: TAUBIN_LAMBDA,
            mu: TAUBIN_MU,
        }
    }
}

/// Linear weights used to combine the three per-vertex terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceWeights {
    pub smoothing: Real,
    pub proximity: Real,
    pub thickness: Real,
}

impl Default for ForceWeights {
    fn default() -> Self {
        Self {
            smoothing: 1.0,
            proximity: 1.0,
            thickness: 1.0,
        }
    }
}

/// Soft bounds on signed white-to-pial separation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThicknessBounds {
    /// Below this the surfaces are pushed apart; 0 only forbids crossing
    pub min: Real,
    /// Above this the surfaces are pulled together
    pub max: Option<Real>,
    /// Thickness a crossed column is pushed back to when `min` is smaller
    pub clearance: Real,
}

impl Default for ThicknessBounds {
    fn default() -> Self {
        Self { min: 0.0, max: None, clearance: 0.0 }
    }
}

impl ThicknessBounds {
    pub const fn new(min: Real, max: Option<Real>) -> Self {
        Self { min, max, clearance: 0.0 }
    }

    pub const fn with_clearance(mut self, clearance: Real) -> Self {
        self.clearance = clearance;
        self
    }
}

/// Parameter set of one deformation run.
#[derive(Debug, Clone, PartialEq)]
pub struct DeformConfig {
    /// Taubin weights, indexed by [`Cortex::index`]
    pub smoothing: [SmoothingWeights; 2],
    /// Time-step of the relaxation
    pub delta: Real,
    /// Damping applied to every step, composes multiplicatively with `delta`
    pub apply_step: Real,
    /// Minimum allowed distance to any non-local face
    pub proximity_min_distance: Real,
    /// Maximum octree depth
    pub index_depth: usize,
    /// Outer iteration budget
    pub max_iterations: usize,
    /// Sub-iterations per outer iteration
    pub max_sub_iterations: usize,
    /// Mean displacement per outer iteration under which the run converged
    pub tolerance: Real,
    pub selection: SurfaceSelection,
    pub weights: ForceWeights,
    pub thickness: ThicknessBounds,
    /// Hold vertices on open-mesh boundaries in place while smoothing
    pub preserve_boundaries: bool,
    /// Refit the spatial index between sub-iterations instead of rebuilding
    pub refit_index: bool,
}

impl Default for DeformConfig {
    fn default() -> Self {
        Self {
            smoothing: [SmoothingWeights::default(); 2],
            delta: 0.5,
            apply_step: 0.2,
            proximity_min_distance: 0.6,
            index_depth: DEFAULT_DEPTH,
            max_iterations: 100,
            max_sub_iterations: 5,
            tolerance: 1e-3,
            selection: SurfaceSelection::Both,
            weights: ForceWeights::default(),
            thickness: ThicknessBounds::default(),
            preserve_boundaries: true,
            refit_index: false,
        }
    }
}

impl DeformConfig {
    pub const fn with_selection(mut self, selection: SurfaceSelection) -> Self {
        self.selection = selection;
        self
    }

    pub const fn with_smoothing(mut self, cortex: Cortex, weights: SmoothingWeights) -> Self {
        self.smoothing[cortex.index()] = weights;
        self
    }

    pub const fn with_step(mut self, delta: Real, apply_step: Real) -> Self {
        self.delta = delta;
        self.apply_step = apply_step;
        self
    }

    pub const fn with_proximity(mut self, min_distance: Real) -> Self {
        self.proximity_min_distance = min_distance;
        self
    }

    pub const fn with_index_depth(mut self, depth: usize) -> Self {
        self.index_depth = depth;
        self
    }

    pub const fn with_iterations(mut self, outer: usize, inner: usize) -> Self {
        self.max_iterations = outer;
        self.max_sub_iterations = inner;
        self
    }

    pub const fn with_tolerance(mut self, tolerance: Real) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub const fn with_weights(mut self, weights: ForceWeights) -> Self {
        self.weights = weights;
        self
    }

    pub const fn with_thickness(mut self, bounds: ThicknessBounds) -> Self {
        self.thickness = bounds;
        self
    }

    pub const fn with_refit(mut self, refit: bool) -> Self {
        self.refit_index = refit;
        self
    }

    pub const fn with_preserve_boundaries(mut self, preserve: bool) -> Self {
        self.preserve_boundaries = preserve;
        self
    }

    #[inline]
    pub const fn smoothing_for(&self, cortex: Cortex) -> SmoothingWeights {
        self.smoothing[cortex.index()]
    }

    /// Scale applied to the combined displacement: `delta * apply_step`
    #[inline]
    pub fn step_scale(&self) -> Real {
        self.delta * self.apply_step
    }

    /// Largest displacement a vertex may take in one sub-iteration. Moving
    /// less than half the proximity distance cannot tunnel through a face
    /// that was at least that far away.
    #[inline]
    pub fn max_step(&self) -> Real {
        if self.proximity_min_distance > 0.0 {
            0.5 * self.proximity_min_distance
        } else {
            Real::INFINITY
        }
    }

    /// Reject values outside their admissible ranges
    pub fn validate(&self) -> DeformResult<()> {
        let finite = |name, v: Real| {
            if v.is_finite() {
                Ok(())
            } else {
                Err(DeformError::invalid(name, v, "must be finite"))
            }
        };

        for w in &self.smoothing {
            finite("lambda", w.lambda)?;
            finite("mu", w.mu)?;
        }
        finite("delta", self.delta)?;
        if self.delta <= 0.0 {
            return Err(DeformError::invalid("delta", self.delta, "must be positive"));
        }
        if !(self.apply_step > 0.0 && self.apply_step <= 1.0) {
            return Err(DeformError::invalid(
                "apply_step",
                self.apply_step,
                "must lie in (0, 1]",
            ));
        }
        if !(self.proximity_min_distance >= 0.0) || !self.proximity_min_distance.is_finite() {
            return Err(DeformError::invalid(
                "proximity_min_distance",
                self.proximity_min_distance,
                "must be a non-negative distance",
            ));
        }
        if self.index_depth == 0 {
            return Err(DeformError::invalid("index_depth", 0.0, "must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(DeformError::invalid("max_iterations", 0.0, "must be at least 1"));
        }
        if self.max_sub_iterations == 0 {
            return Err(DeformError::invalid(
                "max_sub_iterations",
                0.0,
                "must be at least 1",
            ));
        }
        if !(self.tolerance > 0.0) {
            return Err(DeformError::invalid("tolerance", self.tolerance, "must be positive"));
        }
        for (name, w) in [
            ("smoothing weight", self.weights.smoothing),
            ("proximity weight", self.weights.proximity),
            ("thickness weight", self.weights.thickness),
        ] {
            finite(name, w)?;
            if w < 0.0 {
                return Err(DeformError::invalid(name, w, "must not be negative"));
            }
        }
        finite("thickness min", self.thickness.min)?;
        if !(self.thickness.clearance >= 0.0) || !self.thickness.clearance.is_finite() {
            return Err(DeformError::invalid(
                "thickness clearance",
                self.thickness.clearance,
                "must be a non-negative distance",
            ));
        }
        if let Some(max) = self.thickness.max {
            if !(max > self.thickness.min) {
                return Err(DeformError::invalid(
                    "thickness max",
                    max,
                    "must exceed the minimum thickness",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = DeformConfig::default();
        assert_eq!(cfg.smoothing_for(Cortex::White).lambda, 0.33);
        assert_eq!(cfg.smoothing_for(Cortex::Pial).mu, -0.34);
        assert_eq!(cfg.proximity_min_distance, 0.6);
        assert_eq!(cfg.index_depth, 7);
        assert_eq!((cfg.max_iterations, cfg.max_sub_iterations), (100, 5));
        assert_eq!(cfg.selection, SurfaceSelection::Both);
        assert!((cfg.step_scale() - 0.1).abs() < 1e-12);
        assert!((cfg.max_step() - 0.3).abs() < 1e-12);
        cfg.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = [
            DeformConfig::default().with_step(0.0, 0.2),
            DeformConfig::default().with_step(0.5, 1.5),
            DeformConfig::default().with_proximity(-1.0),
            DeformConfig::default().with_index_depth(0),
            DeformConfig::default().with_iterations(0, 5),
            DeformConfig::default().with_iterations(10, 0),
            DeformConfig::default().with_tolerance(0.0),
            DeformConfig::default().with_thickness(ThicknessBounds::new(2.0, Some(1.0))),
            DeformConfig::default()
                .with_thickness(ThicknessBounds::new(0.0, None).with_clearance(-0.5)),
            DeformConfig::default().with_smoothing(
                Cortex::Pial,
                SmoothingWeights { lambda: Real::NAN, mu: -0.34 },
            ),
        ];
        for cfg in bad {
            assert!(
                matches!(cfg.validate(), Err(DeformError::InvalidParameter { .. })),
                "{cfg:?} should be rejected"
            );
        }
    }
}
