//! Per-iteration observers: the hook the integrator calls once per outer
//! iteration, and a vertex tracer built on it.

use super::IterationReport;
use crate::float_types::Real;
use crate::io::VolumeImage;
use crate::surface::SurfacePair;
use nalgebra::Point3;
use std::io::Write;
use tracing::trace;

/// Receives the pair and a summary after every outer iteration.
pub trait DeformObserver {
    fn on_iteration(&mut self, pair: &SurfacePair, report: &IterationReport);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DeformObserver for NoopObserver {
    fn on_iteration(&mut self, _pair: &SurfacePair, _report: &IterationReport) {}
}

impl<F> DeformObserver for F
where
    F: FnMut(&SurfacePair, &IterationReport),
{
    fn on_iteration(&mut self, pair: &SurfacePair, report: &IterationReport) {
        self(pair, report)
    }
}

/// One traced sample of a cortical column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracePoint {
    pub white: Point3<Real>,
    pub pial: Point3<Real>,
    /// Euclidean white-to-pial distance
    pub thickness: Real,
    /// Background intensity at the white vertex, when an image is attached
    pub background: Option<Real>,
    /// Residual of the outer iteration that produced this sample
    pub residual: Real,
}

impl TracePoint {
    pub const FIELDS: [&'static str; 9] = [
        "white_x", "white_y", "white_z", "pial_x", "pial_y", "pial_z", "thickness", "background",
        "residual",
    ];

    /// The nine values in column order; a missing background reads NaN
    pub fn to_array(&self) -> [Real; 9] {
        [
            self.white.x,
            self.white.y,
            self.white.z,
            self.pial.x,
            self.pial.y,
            self.pial.z,
            self.thickness,
            self.background.unwrap_or(Real::NAN),
            self.residual,
        ]
    }
}

/// Records a [`TracePoint`] for one vertex every outer iteration.
#[derive(Debug, Clone)]
pub struct VertexTracer {
    vertex: usize,
    background: Option<VolumeImage>,
    points: Vec<TracePoint>,
}

impl VertexTracer {
    pub fn new(vertex: usize) -> Self {
        Self {
            vertex,
            background: None,
            points: Vec::new(),
        }
    }

    /// Sample `image` at the white vertex for the background column
    pub fn with_background(mut self, image: VolumeImage) -> Self {
        self.background = Some(image);
        self
    }

    pub const fn vertex(&self) -> usize {
        self.vertex
    }

    pub fn points(&self) -> &[TracePoint] {
        &self.points
    }

    /// Write the samples as tab separated values with a header row
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "iteration\t{}", TracePoint::FIELDS.join("\t"))?;
        for (i, point) in self.points.iter().enumerate() {
            let values: Vec<String> = point.to_array().iter().map(Real::to_string).collect();
            writeln!(writer, "{}\t{}", i + 1, values.join("\t"))?;
        }
        Ok(())
    }
}

impl DeformObserver for VertexTracer {
    fn on_iteration(&mut self, pair: &SurfacePair, report: &IterationReport) {
        let (Some(&white), Some(&pial)) = (
            pair.white().positions().get(self.vertex),
            pair.pial().positions().get(self.vertex),
        ) else {
            return;
        };
        let point = TracePoint {
            white,
            pial,
            thickness: (pial - white).norm(),
            background: self.background.as_ref().and_then(|img| img.sample_world(&white)),
            residual: report.residual,
        };
        trace!(vertex = self.vertex, values = ?point.to_array(), "trace point");
        self.points.push(point);
    }
}
