//! Per-vertex force computers: Taubin smoothing, proximity repulsion and
//! thickness bounds.
//!
//! The computers share one [`ForceOps`] trait with a serial and a
//! rayon-backed implementation; [`DefaultForceOps`] is whichever the
//! `parallel` feature selects.

pub mod proximity;
pub mod serial;
pub mod smoothing;
pub mod thickness;
pub mod traits;

#[cfg(feature = "parallel")]
pub mod parallel;

pub use proximity::ProximityProbe;
pub use serial::SerialForceOps;
pub use traits::ForceOps;

#[cfg(feature = "parallel")]
pub use parallel::ParallelForceOps;

#[cfg(not(feature = "parallel"))]
pub type DefaultForceOps = SerialForceOps;

#[cfg(feature = "parallel")]
pub type DefaultForceOps = ParallelForceOps;
