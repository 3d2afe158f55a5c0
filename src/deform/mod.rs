//! Deformation loop
//!
//! The integrator drives the outer and inner iterations. Every sub-iteration
//! refreshes the spatial index, asks the force computers for their terms,
//! combines them with the configured weights and applies a bounded,
//! admissibility-checked step through a double buffer.
//!
//! ```text
//! Initializing -> Iterating -> Converged ------------> Finalizing
//!                          \-> MaxIterationsReached -/
//! ```

pub mod observer;

pub use observer::{DeformObserver, NoopObserver, TracePoint, VertexTracer};

use crate::config::{DeformConfig, ThicknessBounds};
use crate::errors::{DeformError, DeformResult};
use crate::float_types::{Real, tolerance};
use crate::forces::{DefaultForceOps, ForceOps, ProximityProbe, thickness};
use crate::mask::NonCortexMask;
use crate::spatial::SpatialIndex;
use crate::surface::{Cortex, SurfacePair};
use nalgebra::{Point3, Vector3};
use std::fmt;
use tracing::{debug, info, warn};

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeformState {
    Initializing,
    Iterating,
    Converged,
    MaxIterationsReached,
    Finalizing,
}

impl DeformState {
    fn enter(self, next: DeformState) -> DeformState {
        debug!("deformation state {self:?} -> {next:?}");
        next
    }
}

/// How the loop ended. Both are normal terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Residual dropped below the tolerance with no proximity violation or
    /// crossed column left
    Converged,
    /// Iteration budget exhausted first
    MaxIterationsReached,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Converged => write!(f, "converged"),
            Termination::MaxIterationsReached => write!(f, "maximum iterations reached"),
        }
    }
}

/// Summary of one outer iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    /// 1-based outer iteration number
    pub iteration: usize,
    /// Mean displacement of the moving vertices over the iteration
    pub residual: Real,
    /// Largest single-vertex displacement over the iteration
    pub max_displacement: Real,
    /// Proximity violations left after the iteration
    pub violations: usize,
    /// Columns whose pial vertex lies inside the white one
    pub crossed: usize,
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct DeformReport {
    pub termination: Termination,
    pub iterations: usize,
    /// Residual of the last outer iteration
    pub residual: Real,
    pub violations: usize,
    pub crossed: usize,
    pub history: Vec<IterationReport>,
}

impl DeformReport {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Drives a [`DeformConfig`] over a surface pair.
#[derive(Debug, Clone)]
pub struct Deformer<O: ForceOps = DefaultForceOps> {
    config: DeformConfig,
    ops: O,
}

impl Deformer {
    pub fn new(config: DeformConfig) -> Self {
        Self::with_ops(config, DefaultForceOps::new())
    }
}

impl<O: ForceOps> Deformer<O> {
    /// Use a specific serial or parallel force implementation
    pub const fn with_ops(config: DeformConfig, ops: O) -> Self {
        Self { config, ops }
    }

    pub const fn config(&self) -> &DeformConfig {
        &self.config
    }

    /// Deform `pair` in place.
    ///
    /// Fails before touching the pair when the configuration is invalid or
    /// the mask does not match the vertex count. Hitting the iteration
    /// budget is reported, not an error.
    pub fn run(
        &self,
        pair: &mut SurfacePair,
        mask: Option<&NonCortexMask>,
        observer: &mut dyn DeformObserver,
    ) -> DeformResult<DeformReport> {
        let cfg = &self.config;
        let mut state = DeformState::Initializing;

        cfg.validate()?;
        let (white, pial) = (pair.white().vertex_count(), pair.pial().vertex_count());
        if white != pial {
            return Err(DeformError::VertexCountMismatch { white, pial });
        }
        if let Some(mask) = mask {
            mask.check_len(pair.vertex_count())?;
        }
        log_parameters(cfg, pair, mask);

        state = state.enter(DeformState::Iterating);
        let moving = cfg.selection.cortices().count() * pair.vertex_count();
        let bounds = cfg.thickness.with_clearance(
            cfg.thickness.clearance.max(cfg.proximity_min_distance),
        );
        // A crossed column only blocks convergence when something can undo it
        let must_uncross = cfg.weights.thickness > 0.0 && cfg.thickness.min >= 0.0;
        let mut index = SpatialIndex::from_pair(pair, cfg.index_depth);
        let mut history = Vec::new();
        let mut termination = Termination::MaxIterationsReached;

        for iteration in 1..=cfg.max_iterations {
            let start: [Vec<Point3<Real>>; 2] =
                Cortex::ALL.map(|c| pair.surface(c).positions().to_vec());

            let mut vetoed = 0;
            for _ in 0..cfg.max_sub_iterations {
                vetoed += self.sub_iteration(pair, &index, &bounds, mask);
                if cfg.refit_index {
                    index.refit(pair);
                } else {
                    index = SpatialIndex::from_pair(pair, cfg.index_depth);
                }
            }

            let (total, max_displacement) = cfg
                .selection
                .cortices()
                .flat_map(|c| {
                    start[c.index()]
                        .iter()
                        .zip(pair.surface(c).positions())
                        .map(|(a, b)| (b - a).norm())
                })
                .fold((0.0, 0.0 as Real), |(sum, max), d| (sum + d, max.max(d)));
            let residual = if moving == 0 { 0.0 } else { total / moving as Real };

            let violations = if cfg.proximity_min_distance > 0.0 {
                let probe =
                    ProximityProbe::new(pair, &index, cfg.proximity_min_distance, mask);
                self.ops.violations(&probe)
            } else {
                0
            };

            let crossed = thickness::signed_thickness(pair)
                .into_iter()
                .filter(|t| t.is_some_and(|t| t < -tolerance()))
                .count();

            let report = IterationReport {
                iteration,
                residual,
                max_displacement,
                violations,
                crossed,
            };
            debug!(
                iteration,
                residual, max_displacement, violations, crossed, vetoed, "outer iteration finished"
            );
            observer.on_iteration(pair, &report);
            history.push(report);

            if residual < cfg.tolerance {
                if violations == 0 && (crossed == 0 || !must_uncross) {
                    termination = Termination::Converged;
                    break;
                }
                debug!(
                    "residual below tolerance with {violations} violations and {crossed} \
                     crossed columns left, {vetoed} steps vetoed"
                );
            }
        }

        state = state.enter(match termination {
            Termination::Converged => DeformState::Converged,
            Termination::MaxIterationsReached => DeformState::MaxIterationsReached,
        });
        let last = history.last().copied();
        if state == DeformState::MaxIterationsReached {
            warn!(
                "no convergence after {} iterations (residual {:.3e}, tolerance {:.3e}, {} violations, {} crossed columns)",
                history.len(),
                last.map_or(0.0, |r| r.residual),
                cfg.tolerance,
                last.map_or(0, |r| r.violations),
                last.map_or(0, |r| r.crossed)
            );
        }

        state.enter(DeformState::Finalizing);
        let report = DeformReport {
            termination,
            iterations: history.len(),
            residual: last.map_or(0.0, |r| r.residual),
            violations: last.map_or(0, |r| r.violations),
            crossed: last.map_or(0, |r| r.crossed),
            history,
        };
        info!(
            "{} after {} iterations, residual {:.3e}, {} proximity violations",
            report.termination, report.iterations, report.residual, report.violations
        );
        Ok(report)
    }

    /// One combined, bounded and admissibility-checked step for every
    /// selected surface. `index` must reflect the current positions.
    /// Returns how many non-zero steps admissibility dropped entirely.
    fn sub_iteration(
        &self,
        pair: &mut SurfacePair,
        index: &SpatialIndex,
        bounds: &ThicknessBounds,
        mask: Option<&NonCortexMask>,
    ) -> usize {
        let cfg = &self.config;
        let n = pair.vertex_count();
        let zeros = || [vec![Vector3::zeros(); n], vec![Vector3::zeros(); n]];
        let scale = cfg.step_scale();
        let max_step = cfg.max_step();

        let probe = ProximityProbe::new(pair, index, cfg.proximity_min_distance, mask);
        let proximity = if cfg.weights.proximity > 0.0 {
            self.ops.proximity(&probe, cfg.selection)
        } else {
            zeros()
        };
        let thickness = if cfg.weights.thickness > 0.0 {
            self.ops.thickness(pair, bounds, cfg.selection)
        } else {
            zeros()
        };

        let mut next_positions = Vec::with_capacity(2);
        let mut vetoed = 0;
        for cortex in cfg.selection.cortices() {
            let surface = pair.surface(cortex);
            let smoothing = if cfg.weights.smoothing > 0.0 {
                self.ops.smoothing(surface, cfg.smoothing_for(cortex), cfg.preserve_boundaries)
            } else {
                vec![Vector3::zeros(); n]
            };
            let (prox, thick) = (&proximity[cortex.index()], &thickness[cortex.index()]);

            let steps: Vec<Vector3<Real>> = (0..n)
                .map(|v| {
                    let combined = smoothing[v] * cfg.weights.smoothing
                        + prox[v] * cfg.weights.proximity
                        + thick[v] * cfg.weights.thickness;
                    bounded_step(combined * scale, max_step)
                })
                .collect();
            let proposed = steps.iter().filter(|s| **s != Vector3::zeros()).count();
            let steps = self.ops.admit(&probe, cortex, steps);
            vetoed += proposed - steps.iter().filter(|s| **s != Vector3::zeros()).count();

            let next: Vec<Point3<Real>> = surface
                .positions()
                .iter()
                .zip(&steps)
                .map(|(p, s)| p + s)
                .collect();
            next_positions.push((cortex, next));
        }

        // Swap barrier: every step above was computed from the same snapshot
        for (cortex, mut next) in next_positions {
            pair.surface_mut(cortex).swap_positions(&mut next);
        }
        vetoed
    }
}

/// Clamp `step` to `max_len`; non-finite steps become zero.
fn bounded_step(step: Vector3<Real>, max_len: Real) -> Vector3<Real> {
    if !step.iter().all(|c| c.is_finite()) {
        return Vector3::zeros();
    }
    let len = step.norm();
    if len > max_len { step * (max_len / len) } else { step }
}

fn log_parameters(cfg: &DeformConfig, pair: &SurfacePair, mask: Option<&NonCortexMask>) {
    for cortex in Cortex::ALL {
        let s = pair.surface(cortex);
        let bounds = s.bounding_box();
        info!(
            "{cortex} surface: {} vertices, {} faces, {} edges, mean edge {:.3}",
            s.vertex_count(),
            s.face_count(),
            s.edge_count(),
            s.mean_edge_length()
        );
        let curvature = s.mean_curvature_proxy();
        let mean_curvature = if curvature.is_empty() {
            0.0
        } else {
            curvature.iter().sum::<Real>() / curvature.len() as Real
        };
        debug!(
            "{cortex} bounds: [{:.2}, {:.2}, {:.2}] to [{:.2}, {:.2}, {:.2}], mean curvature {:.4}",
            bounds.mins.x,
            bounds.mins.y,
            bounds.mins.z,
            bounds.maxs.x,
            bounds.maxs.y,
            bounds.maxs.z,
            mean_curvature
        );
    }
    info!("moving the {}", cfg.selection);
    info!(
        "step: delta {} x apply {} (bounded to {})",
        cfg.delta,
        cfg.apply_step,
        cfg.max_step()
    );
    for cortex in Cortex::ALL {
        let w = cfg.smoothing_for(cortex);
        info!("{cortex} smoothing: lambda {} mu {}", w.lambda, w.mu);
    }
    info!(
        "iterations: {} outer x {} inner, tolerance {}",
        cfg.max_iterations, cfg.max_sub_iterations, cfg.tolerance
    );
    info!(
        "proximity: min distance {}, index depth {}{}",
        cfg.proximity_min_distance,
        cfg.index_depth,
        if cfg.refit_index { " (refit)" } else { "" }
    );
    info!(
        "thickness bounds: min {}, max {}",
        cfg.thickness.min,
        cfg.thickness
            .max
            .map_or_else(|| "none".to_string(), |m| m.to_string())
    );
    info!(
        "weights: smoothing {}, proximity {}, thickness {}",
        cfg.weights.smoothing, cfg.weights.proximity, cfg.weights.thickness
    );
    info!(
        "non-cortex mask: {}",
        mask.map_or_else(
            || "none".to_string(),
            |m| format!("{} of {} vertices", m.masked_count(), m.len())
        )
    );
}
