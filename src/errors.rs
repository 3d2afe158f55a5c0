//! Precondition and configuration errors

use crate::float_types::Real;
use crate::surface::Cortex;

/// Result alias for deformation operations.
pub type DeformResult<T> = Result<T, DeformError>;

/// Everything that can stop a deformation before the first iteration.
///
/// Numerical anomalies inside the loop never surface here: they are
/// neutralised per vertex.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeformError {
    /// The two surfaces do not share a vertex correspondence
    #[error("vertex count mismatch: white surface has {white} vertices, pial surface has {pial}")]
    VertexCountMismatch { white: usize, pial: usize },

    /// A surface with no vertices or no faces
    #[error("{0} surface is empty")]
    EmptySurface(Cortex),

    /// A face references a vertex that does not exist
    #[error("face {face} references vertex {vertex}, but the surface has {count} vertices")]
    FaceIndexOutOfRange { face: usize, vertex: usize, count: usize },

    /// A face repeats one of its vertex ids
    #[error("face {0} is degenerate (repeated vertex id)")]
    DegenerateFace(usize),

    /// A vertex coordinate is NaN or infinite
    #[error("vertex {0} has a NaN or infinite coordinate")]
    InvalidCoordinate(usize),

    /// Surface selection id outside 1 (white), 2 (pial), 3 (both)
    #[error("unknown surface selection {0:?} (expected white, pial or both)")]
    UnknownSelection(String),

    /// The non-cortex mask does not cover the surface vertices
    #[error("non-cortex mask has {mask} entries, surfaces have {vertices} vertices")]
    MaskLengthMismatch { mask: usize, vertices: usize },

    /// A configuration value outside its admissible range
    #[error("invalid configuration: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: Real,
        reason: &'static str,
    },
}

impl DeformError {
    pub(crate) const fn invalid(name: &'static str, value: Real, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}
