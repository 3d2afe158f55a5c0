//! Constrained **Taubin smoothing** of coupled cortical surfaces.
//!
//! A white (inner) and a pial (outer) triangulated surface that share a 1:1
//! vertex correspondence are relaxed together: every vertex is pulled by a
//! two-pass λ/μ umbrella filter, pushed away from faces that come closer
//! than a minimum distance (found through an [octree](spatial) over both
//! surfaces), and kept within soft white-to-pial thickness bounds.
//!
//! ```no_run
//! use cortex_smooth::{DeformConfig, Deformer, NoopObserver, SurfacePair, io};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let white = io::read_surface("lh.white.off")?;
//! let pial = io::read_surface("lh.pial.off")?;
//! let mut pair = SurfacePair::new(white, pial)?;
//! let report = Deformer::new(DeformConfig::default()).run(&mut pair, None, &mut NoopObserver)?;
//! println!("{} after {} iterations", report.termination, report.iterations);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//! #### Default
//! - **f64**: use f64 as Real
//!
//! #### Optional
//! - **f32**: use f32 as Real, this conflicts with f64
//! - **parallel**: use rayon for multithreading

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod config;
pub mod deform;
pub mod errors;
pub mod float_types;
pub mod forces;
pub mod io;
pub mod mask;
pub mod spatial;
pub mod surface;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use config::{DeformConfig, ForceWeights, SmoothingWeights, ThicknessBounds};
pub use deform::{
    DeformObserver, DeformReport, Deformer, IterationReport, NoopObserver, Termination,
    TracePoint, VertexTracer,
};
pub use errors::{DeformError, DeformResult};
pub use mask::NonCortexMask;
pub use spatial::SpatialIndex;
pub use surface::{Cortex, Rgb, Surface, SurfacePair, SurfaceSelection};
