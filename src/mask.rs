//! Per-vertex non-cortex labels
//!
//! Vertices in non-cortical territory (midline, brain stem) are allowed to
//! come close to other faces: the proximity constraint skips them.

use crate::errors::{DeformError, DeformResult};
use crate::float_types::Real;
use crate::io::VolumeImage;
use crate::surface::Surface;

/// Mask voxels above this value are non-cortex
pub const MASK_THRESHOLD: Real = 0.5;

/// Boolean label per vertex index of a surface pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NonCortexMask {
    labels: Vec<bool>,
}

impl NonCortexMask {
    pub fn from_labels(labels: Vec<bool>) -> Self {
        Self { labels }
    }

    /// Label every vertex of `surface` by sampling `volume` at its position.
    /// Vertices outside the image are treated as cortex.
    pub fn from_volume(volume: &VolumeImage, surface: &Surface) -> Self {
        let labels = surface
            .positions()
            .iter()
            .map(|p| volume.sample_world(p).is_some_and(|v| v > MASK_THRESHOLD))
            .collect();
        Self { labels }
    }

    #[inline]
    pub fn is_masked(&self, vertex: usize) -> bool {
        self.labels.get(vertex).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn masked_count(&self) -> usize {
        self.labels.iter().filter(|&&m| m).count()
    }

    pub fn labels(&self) -> &[bool] {
        &self.labels
    }

    /// Fail unless the mask has exactly one label per vertex
    pub fn check_len(&self, vertices: usize) -> DeformResult<()> {
        if self.labels.len() == vertices {
            Ok(())
        } else {
            Err(DeformError::MaskLengthMismatch {
                mask: self.labels.len(),
                vertices,
            })
        }
    }
}
