//! Proximity constraint: keep every vertex at least a minimum distance away
//! from faces of either surface that are not part of its own neighborhood.
//!
//! While a column is crossed its partner's neighborhood on the other surface
//! is treated as local as well, so the thickness term can pull the column
//! back through without being vetoed here.

use super::thickness::{is_crossed, measure};
use super::{DefaultForceOps, ForceOps};
use crate::float_types::{EPSILON, Real, tolerance};
use crate::mask::NonCortexMask;
use crate::spatial::{IndexedFace, NearestFace, SpatialIndex};
use crate::surface::{Cortex, SurfacePair};
use nalgebra::{Point3, Vector3};

/// Times a correction is halved before it is dropped
const SHRINK_ATTEMPTS: usize = 4;

/// Read-only view used to answer per-vertex proximity questions during one
/// sub-iteration.
pub struct ProximityProbe<'a> {
    pair: &'a SurfacePair,
    index: &'a SpatialIndex,
    min_distance: Real,
    mask: Option<&'a NonCortexMask>,
    normals: [Vec<Vector3<Real>>; 2],
    crossed: Vec<bool>,
}

impl<'a> ProximityProbe<'a> {
    pub fn new(
        pair: &'a SurfacePair,
        index: &'a SpatialIndex,
        min_distance: Real,
        mask: Option<&'a NonCortexMask>,
    ) -> Self {
        let normals = Cortex::ALL.map(|c| pair.surface(c).vertex_normals());
        let crossed = pair
            .white()
            .positions()
            .iter()
            .zip(pair.pial().positions())
            .enumerate()
            .map(|(v, (w, p))| {
                measure(w, p, &normals[0][v], &normals[1][v]).is_some_and(|c| is_crossed(&c))
            })
            .collect();
        Self {
            pair,
            index,
            min_distance,
            mask,
            normals,
            crossed,
        }
    }

    #[inline]
    pub const fn pair(&self) -> &SurfacePair {
        self.pair
    }

    #[inline]
    pub const fn min_distance(&self) -> Real {
        self.min_distance
    }

    /// Whether the column of `vertex` is crossed in the snapshot
    #[inline]
    pub fn is_crossed(&self, vertex: usize) -> bool {
        self.crossed[vertex]
    }

    /// Whether the constraint applies at all to `vertex`
    #[inline]
    pub fn is_exempt(&self, vertex: usize) -> bool {
        self.min_distance <= 0.0 || self.mask.is_some_and(|m| m.is_masked(vertex))
    }

    /// Closest non-local face to `at` closer than the minimum distance, as
    /// seen from `vertex` of `cortex`.
    pub fn worst(&self, cortex: Cortex, vertex: usize, at: &Point3<Real>) -> Option<NearestFace> {
        let own = self.pair.surface(cortex).connectivity();
        let partner = self.pair.surface(cortex.other()).connectivity();
        let crossed = self.crossed[vertex];
        let local = |face: &IndexedFace| {
            if face.id.cortex == cortex {
                own.is_local_face(vertex, &face.vertices)
            } else {
                crossed && partner.is_local_face(vertex, &face.vertices)
            }
        };
        self.index
            .nearest(at, self.min_distance, |face| !local(face))
            .filter(|hit| hit.distance < self.min_distance - tolerance())
    }

    pub fn is_violating(&self, cortex: Cortex, vertex: usize) -> bool {
        !self.is_exempt(vertex)
            && self
                .worst(cortex, vertex, &self.pair.surface(cortex).position(vertex))
                .is_some()
    }

    /// Displacement along the vertex normal, away from the worst offending
    /// face, that restores the minimum distance. Zero when there is no
    /// violation, the vertex is masked, or its normal is degenerate.
    pub fn correction(&self, cortex: Cortex, vertex: usize) -> Vector3<Real> {
        if self.is_exempt(vertex) {
            return Vector3::zeros();
        }
        let p = self.pair.surface(cortex).position(vertex);
        let Some(hit) = self.worst(cortex, vertex, &p) else {
            return Vector3::zeros();
        };
        let normal = self.normals[cortex.index()][vertex];
        if normal.norm_squared() < EPSILON {
            return Vector3::zeros();
        }

        let offset = p - hit.closest;
        let dir = if offset.norm() > EPSILON {
            if offset.dot(&normal) >= 0.0 { normal } else { -normal }
        } else {
            // Touching: white retreats inward, pial advances outward
            match cortex {
                Cortex::White => -normal,
                Cortex::Pial => normal,
            }
        };

        // Split the offset into its component along the move and the rest;
        // moving by t along `dir` gives distance sqrt((h + t)^2 + tau^2).
        let h = offset.dot(&dir).max(0.0);
        let tau_sq = (offset.norm_squared() - h * h).max(0.0);
        let reach_sq = self.min_distance * self.min_distance - tau_sq;
        if reach_sq <= 0.0 {
            return Vector3::zeros();
        }
        let mut t = (reach_sq.sqrt() - h).clamp(0.0, self.min_distance);

        for _ in 0..=SHRINK_ATTEMPTS {
            let moved = p + dir * t;
            match self.worst(cortex, vertex, &moved) {
                Some(next) if next.distance < hit.distance => t *= 0.5,
                _ => return dir * t,
            }
        }
        Vector3::zeros()
    }

    /// Shrink `step` until applying it does not make this vertex's proximity
    /// worse than it already is. Halved a few times, then dropped.
    pub fn admit(&self, cortex: Cortex, vertex: usize, step: Vector3<Real>) -> Vector3<Real> {
        if self.is_exempt(vertex) || step.norm_squared() == 0.0 {
            return step;
        }
        let p = self.pair.surface(cortex).position(vertex);
        let floor = self
            .worst(cortex, vertex, &p)
            .map_or(self.min_distance, |hit| hit.distance);

        let mut step = step;
        for _ in 0..=SHRINK_ATTEMPTS {
            match self.worst(cortex, vertex, &(p + step)) {
                Some(next) if next.distance < floor => step *= 0.5,
                _ => return step,
            }
        }
        Vector3::zeros()
    }
}

/// Per-vertex proximity correction for both surfaces, white first.
/// Masked vertices get exactly zero.
pub fn compute(
    pair: &SurfacePair,
    index: &SpatialIndex,
    min_distance: Real,
    mask: Option<&NonCortexMask>,
) -> [Vec<Vector3<Real>>; 2] {
    let probe = ProximityProbe::new(pair, index, min_distance, mask);
    DefaultForceOps::new().proximity(&probe, Default::default())
}

/// Number of non-masked vertices, over both surfaces, closer than
/// `min_distance` to a non-local face.
pub fn count_violations(
    pair: &SurfacePair,
    index: &SpatialIndex,
    min_distance: Real,
    mask: Option<&NonCortexMask>,
) -> usize {
    let probe = ProximityProbe::new(pair, index, min_distance, mask);
    DefaultForceOps::new().violations(&probe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::DEFAULT_DEPTH;
    use crate::surface::Surface;

    fn planes(gap: Real) -> SurfacePair {
        let white = Surface::grid_plane(5, 1.0);
        let pial = white.translated(Vector3::new(0.0, 0.0, gap));
        SurfacePair::new(white, pial).unwrap()
    }

    /// Two unconnected 5x5 sheets in one surface, the first at `first`, the
    /// second at `second`
    fn two_sheets(first: Real, second: Real) -> Surface {
        let grid = Surface::grid_plane(5, 1.0);
        let mut vertices = grid.translated(Vector3::new(0.0, 0.0, first)).positions().to_vec();
        vertices.extend(grid.translated(Vector3::new(0.0, 0.0, second)).positions());
        let mut faces = grid.faces().to_vec();
        faces.extend(grid.faces().iter().map(|f| f.map(|v| v + 25)));
        Surface::new(vertices, faces).unwrap()
    }

    #[test]
    fn separated_planes_need_no_correction() {
        let pair = planes(2.0);
        let index = SpatialIndex::from_pair(&pair, DEFAULT_DEPTH);
        let [white, pial] = compute(&pair, &index, 0.6, None);
        assert!(white.iter().chain(&pial).all(|d| *d == Vector3::zeros()));
        assert_eq!(count_violations(&pair, &index, 0.6, None), 0);
    }

    #[test]
    fn close_planes_are_pushed_apart() {
        let pair = planes(0.3);
        let index = SpatialIndex::from_pair(&pair, DEFAULT_DEPTH);
        assert_eq!(count_violations(&pair, &index, 0.6, None), 2 * 25);

        let [white, pial] = compute(&pair, &index, 0.6, None);
        for (w, p) in white.iter().zip(&pial) {
            assert!((w.z + 0.3).abs() < 1e-9, "white moved {w:?}");
            assert!((p.z - 0.3).abs() < 1e-9, "pial moved {p:?}");
            assert!(w.x.abs() < 1e-12 && w.y.abs() < 1e-12);
        }
    }

    #[test]
    fn own_sheet_is_never_a_violation() {
        // A fine grid: the nearest faces are all within the one-ring
        let white = Surface::grid_plane(8, 0.5);
        let pial = white.translated(Vector3::new(0.0, 0.0, 5.0));
        let pair = SurfacePair::new(white, pial).unwrap();
        let index = SpatialIndex::from_pair(&pair, DEFAULT_DEPTH);
        assert_eq!(count_violations(&pair, &index, 0.6, None), 0);
    }

    #[test]
    fn masked_vertices_are_exempt() {
        let pair = planes(0.3);
        let index = SpatialIndex::from_pair(&pair, DEFAULT_DEPTH);
        let mask = NonCortexMask::from_labels((0..25).map(|v| v % 2 == 0).collect());
        let [white, _] = compute(&pair, &index, 0.6, Some(&mask));
        for (v, d) in white.iter().enumerate() {
            assert_eq!(*d == Vector3::zeros(), v % 2 == 0);
        }
        assert_eq!(count_violations(&pair, &index, 0.6, Some(&mask)), 2 * 12);
    }

    #[test]
    fn correction_is_halved_when_it_would_hit_another_sheet() {
        // White sheet at 0 with a second white sheet 0.5 below it and the pial
        // sheet 0.3 above. The full retreat of 0.3 would leave 0.2 to the lower
        // sheet, so it is halved once.
        let white = two_sheets(0.0, -0.5);
        let pial = two_sheets(0.3, 10.0);
        let pair = SurfacePair::new(white, pial).unwrap();
        let index = SpatialIndex::from_pair(&pair, DEFAULT_DEPTH);
        let probe = ProximityProbe::new(&pair, &index, 0.6, None);

        let hit = probe.worst(Cortex::White, 12, &pair.white().position(12)).unwrap();
        assert!((hit.distance - 0.3).abs() < 1e-12);
        let d = probe.correction(Cortex::White, 12);
        assert!((d.z + 0.15).abs() < 1e-12, "correction {d:?}");
        assert!(d.x.abs() < 1e-12 && d.y.abs() < 1e-12);
    }

    #[test]
    fn crossed_columns_may_pass_back_through_their_partner() {
        // Pial below white: every column is crossed
        let pair = planes(-0.3);
        let index = SpatialIndex::from_pair(&pair, DEFAULT_DEPTH);
        let probe = ProximityProbe::new(&pair, &index, 0.6, None);
        assert!((0..25).all(|v| probe.is_crossed(v)));
        assert_eq!(count_violations(&pair, &index, 0.6, None), 0);

        // Moving white straight down through its own pial neighborhood is allowed
        let down = Vector3::new(0.0, 0.0, -0.6);
        assert_eq!(probe.admit(Cortex::White, 12, down), down);
        assert_eq!(probe.correction(Cortex::White, 12), Vector3::zeros());
    }

    #[test]
    fn admit_shrinks_steps_into_a_face() {
        let pair = planes(1.0);
        let index = SpatialIndex::from_pair(&pair, DEFAULT_DEPTH);
        let probe = ProximityProbe::new(&pair, &index, 0.6, None);
        // 0.8 up would leave 0.2 to the pial plane; halving once leaves 0.6
        let step = probe.admit(Cortex::White, 12, Vector3::new(0.0, 0.0, 0.8));
        assert!((step.z - 0.4).abs() < 1e-12);
        // Moving away is always fine
        let away = Vector3::new(0.0, 0.0, -0.8);
        assert_eq!(probe.admit(Cortex::White, 12, away), away);
    }
}
