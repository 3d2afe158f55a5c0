// Re-export parry for the appropriate float size
#[cfg(feature = "f64")]
pub use parry3d_f64 as parry3d;

#[cfg(feature = "f32")]
pub use parry3d;

// Our Real scalar type:
#[cfg(feature = "f32")]
pub type Real = f32;
#[cfg(feature = "f64")]
pub type Real = f64;

use core::str::FromStr;
use std::sync::OnceLock;

/// A small epsilon for degenerate-geometry tests (zero-length normals,
/// coincident points).
#[cfg(feature = "f32")]
pub const EPSILON: Real = 1e-5;
/// A small epsilon for degenerate-geometry tests (zero-length normals,
/// coincident points).
#[cfg(feature = "f64")]
pub const EPSILON: Real = 1e-9;

/// Lazily-initialized tolerance used when comparing distances.
/// Defaults depend on precision (`f32` vs `f64`), but can be overridden:
///  1) **Build-time**: set env var `CORTEX_SMOOTH_TOLERANCE`
///  2) **Runtime**: call [`set_tolerance`] once before using the library
static TOLERANCE_CELL: OnceLock<Real> = OnceLock::new();

#[inline]
fn default_tolerance() -> Real {
    #[cfg(feature = "f32")]
    {
        1e-4
    }
    #[cfg(feature = "f64")]
    {
        1e-6
    }
}

/// Returns the current distance tolerance.
/// If not set yet, it tries `CORTEX_SMOOTH_TOLERANCE` (parsed as the active
/// `Real`) and falls back to a sensible default.
pub fn tolerance() -> Real {
    *TOLERANCE_CELL.get_or_init(|| {
        if let Some(environment_variable) = option_env!("CORTEX_SMOOTH_TOLERANCE") {
            if let Ok(value) = Real::from_str(environment_variable) {
                return value.max(Real::EPSILON);
            }
        }
        default_tolerance()
    })
}

/// Set the tolerance programmatically once (subsequent calls are ignored).
pub fn set_tolerance(value: Real) {
    let _ = TOLERANCE_CELL.set(value.max(Real::EPSILON));
}

/// Taubin's positive (shrinking) pass factor.
pub const TAUBIN_LAMBDA: Real = 0.33;
/// Taubin's negative (inflating) pass factor.
pub const TAUBIN_MU: Real = -0.34;
