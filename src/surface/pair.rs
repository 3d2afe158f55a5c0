//! White/pial surface pair with a fixed 1:1 vertex correspondence

use super::{Cortex, Surface};
use crate::errors::{DeformError, DeformResult};
use crate::float_types::Real;
use std::{fmt, str::FromStr};

/// Which surfaces a deformation is allowed to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceSelection {
    WhiteOnly,
    PialOnly,
    #[default]
    Both,
}

impl SurfaceSelection {
    /// Map the numeric cortex id used on the command line of the older
    /// tooling: 1 = white, 2 = pial, 3 = both.
    pub fn from_id(id: u8) -> DeformResult<Self> {
        match id {
            1 => Ok(Self::WhiteOnly),
            2 => Ok(Self::PialOnly),
            3 => Ok(Self::Both),
            other => Err(DeformError::UnknownSelection(other.to_string())),
        }
    }

    #[inline]
    pub const fn includes(self, cortex: Cortex) -> bool {
        matches!(
            (self, cortex),
            (Self::Both, _) | (Self::WhiteOnly, Cortex::White) | (Self::PialOnly, Cortex::Pial)
        )
    }

    /// The surfaces this selection moves, white first
    pub fn cortices(self) -> impl Iterator<Item = Cortex> {
        Cortex::ALL.into_iter().filter(move |&c| self.includes(c))
    }
}

impl FromStr for SurfaceSelection {
    type Err = DeformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" | "white-only" | "1" => Ok(Self::WhiteOnly),
            "pial" | "pial-only" | "2" => Ok(Self::PialOnly),
            "both" | "3" => Ok(Self::Both),
            _ => Err(DeformError::UnknownSelection(s.to_string())),
        }
    }
}

impl fmt::Display for SurfaceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WhiteOnly => write!(f, "white surface"),
            Self::PialOnly => write!(f, "pial surface"),
            Self::Both => write!(f, "white and pial surfaces"),
        }
    }
}

/// Inner and outer cortical surfaces. Vertex `i` of one surface and vertex
/// `i` of the other describe the same cortical column.
#[derive(Debug, Clone)]
pub struct SurfacePair {
    surfaces: [Surface; 2],
}

impl SurfacePair {
    /// Pair two surfaces, failing if either is empty or their vertex counts
    /// differ.
    pub fn new(white: Surface, pial: Surface) -> DeformResult<Self> {
        if white.is_empty() {
            return Err(DeformError::EmptySurface(Cortex::White));
        }
        if pial.is_empty() {
            return Err(DeformError::EmptySurface(Cortex::Pial));
        }
        if white.vertex_count() != pial.vertex_count() {
            return Err(DeformError::VertexCountMismatch {
                white: white.vertex_count(),
                pial: pial.vertex_count(),
            });
        }
        Ok(Self {
            surfaces: [white, pial],
        })
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.surfaces[0].vertex_count()
    }

    #[inline]
    pub fn surface(&self, cortex: Cortex) -> &Surface {
        &self.surfaces[cortex.index()]
    }

    #[inline]
    pub fn surface_mut(&mut self, cortex: Cortex) -> &mut Surface {
        &mut self.surfaces[cortex.index()]
    }

    pub fn white(&self) -> &Surface {
        self.surface(Cortex::White)
    }

    pub fn pial(&self) -> &Surface {
        self.surface(Cortex::Pial)
    }

    pub fn into_surfaces(self) -> (Surface, Surface) {
        let [white, pial] = self.surfaces;
        (white, pial)
    }

    /// Euclidean distance between corresponding white and pial vertices
    pub fn thickness(&self) -> Vec<Real> {
        self.white()
            .positions()
            .iter()
            .zip(self.pial().positions())
            .map(|(w, p)| (p - w).norm())
            .collect()
    }

    /// Total number of faces across both surfaces
    pub fn face_count(&self) -> usize {
        self.surfaces.iter().map(Surface::face_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn selection_from_id() {
        assert_eq!(SurfaceSelection::from_id(1).unwrap(), SurfaceSelection::WhiteOnly);
        assert_eq!(SurfaceSelection::from_id(3).unwrap(), SurfaceSelection::Both);
        assert!(matches!(
            SurfaceSelection::from_id(4),
            Err(DeformError::UnknownSelection(_))
        ));
        assert!("sideways".parse::<SurfaceSelection>().is_err());
        assert_eq!("Pial".parse::<SurfaceSelection>().unwrap(), SurfaceSelection::PialOnly);
    }

    #[test]
    fn selection_cortices() {
        let both: Vec<_> = SurfaceSelection::Both.cortices().collect();
        assert_eq!(both, vec![Cortex::White, Cortex::Pial]);
        let pial: Vec<_> = SurfaceSelection::PialOnly.cortices().collect();
        assert_eq!(pial, vec![Cortex::Pial]);
    }

    #[test]
    fn pair_thickness() {
        let white = Surface::grid_plane(3, 1.0);
        let pial = white.translated(Vector3::new(0.0, 0.0, 2.5));
        let pair = SurfacePair::new(white, pial).unwrap();
        assert!(pair.thickness().iter().all(|t| (t - 2.5).abs() < 1e-12));
        assert_eq!(pair.face_count(), 16);
    }

    #[test]
    fn pair_rejects_empty_surface() {
        let white = Surface::grid_plane(3, 1.0);
        let empty = Surface::new(Vec::new(), Vec::new()).unwrap();
        assert_eq!(
            SurfacePair::new(white, empty).unwrap_err(),
            DeformError::EmptySurface(Cortex::Pial)
        );
    }
}
