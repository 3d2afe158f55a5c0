//! Soft bounds on the separation of corresponding white and pial vertices

use super::{DefaultForceOps, ForceOps};
use crate::config::ThicknessBounds;
use crate::float_types::{EPSILON, Real};
use crate::surface::{Cortex, SurfacePair, SurfaceSelection};
use nalgebra::{Point3, Vector3};

/// Signed white-to-pial thickness of one column and the axis it was
/// measured along. Positive when the pial vertex lies outside the white one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnThickness {
    pub value: Real,
    pub axis: Vector3<Real>,
}

/// Measure one column. The axis is the averaged outward normal; when the two
/// normals cancel out the raw white-to-pial direction is used instead, and a
/// column with neither is skipped.
pub fn measure(
    white: &Point3<Real>,
    pial: &Point3<Real>,
    white_normal: &Vector3<Real>,
    pial_normal: &Vector3<Real>,
) -> Option<ColumnThickness> {
    let offset = pial - white;
    if let Some(axis) = (white_normal + pial_normal).try_normalize(EPSILON) {
        return Some(ColumnThickness {
            value: offset.dot(&axis),
            axis,
        });
    }
    offset.try_normalize(EPSILON).map(|axis| ColumnThickness {
        value: offset.norm(),
        axis,
    })
}

/// Whether the pial vertex of a column lies inside its white vertex
#[inline]
pub fn is_crossed(column: &ColumnThickness) -> bool {
    column.value < 0.0
}

/// Correction for one column, white first. The full violation is taken by
/// the movable surface, or shared equally when both move. A crossed column
/// is pushed back to `max(min, clearance)` unless `min` itself allows
/// crossing.
pub(crate) fn column_correction(
    column: ColumnThickness,
    bounds: &ThicknessBounds,
    selection: SurfaceSelection,
) -> [Vector3<Real>; 2] {
    // Positive: surfaces must separate; negative: they must approach
    let violation = if is_crossed(&column) && bounds.min >= 0.0 {
        bounds.min.max(bounds.clearance) - column.value
    } else if column.value < bounds.min {
        bounds.min - column.value
    } else if let Some(max) = bounds.max.filter(|&max| column.value > max) {
        max - column.value
    } else {
        return [Vector3::zeros(); 2];
    };

    let (white_share, pial_share) = match selection {
        SurfaceSelection::Both => (0.5, 0.5),
        SurfaceSelection::WhiteOnly => (1.0, 0.0),
        SurfaceSelection::PialOnly => (0.0, 1.0),
    };
    [
        -column.axis * (violation * white_share),
        column.axis * (violation * pial_share),
    ]
}

/// Per-vertex thickness correction for both surfaces, white first.
/// Surfaces outside `selection` get zero.
pub fn compute(
    pair: &SurfacePair,
    bounds: &ThicknessBounds,
    selection: SurfaceSelection,
) -> [Vec<Vector3<Real>>; 2] {
    DefaultForceOps::new().thickness(pair, bounds, selection)
}

/// Signed thickness of every column; `None` where it cannot be measured
pub fn signed_thickness(pair: &SurfacePair) -> Vec<Option<Real>> {
    let normals = Cortex::ALL.map(|c| pair.surface(c).vertex_normals());
    pair.white()
        .positions()
        .iter()
        .zip(pair.pial().positions())
        .enumerate()
        .map(|(v, (w, p))| measure(w, p, &normals[0][v], &normals[1][v]).map(|c| c.value))
        .collect()
}
