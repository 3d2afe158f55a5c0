//! Triangulated cortical surfaces and the white/pial pair that shares their
//! vertex correspondence.

use crate::errors::{DeformError, DeformResult};
use crate::float_types::{EPSILON, Real, parry3d::bounding_volume::Aabb};
use nalgebra::{Point3, Vector3};
use std::{fmt, sync::OnceLock};

pub mod connectivity;
pub mod pair;
pub mod shapes;

pub use connectivity::Connectivity;
pub use pair::{SurfacePair, SurfaceSelection};

/// Which of the two cortical boundaries a surface represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cortex {
    /// Inner boundary, gray/white matter interface
    White = 0,
    /// Outer boundary, gray matter/CSF interface
    Pial = 1,
}

impl Cortex {
    pub const ALL: [Cortex; 2] = [Cortex::White, Cortex::Pial];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn other(self) -> Cortex {
        match self {
            Cortex::White => Cortex::Pial,
            Cortex::Pial => Cortex::White,
        }
    }
}

impl fmt::Display for Cortex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cortex::White => write!(f, "white"),
            Cortex::Pial => write!(f, "pial"),
        }
    }
}

/// RGB color in `[0, 1]`, carried as display metadata only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: Real,
    pub g: Real,
    pub b: Real,
}

impl Rgb {
    pub const fn new(r: Real, g: Real, b: Real) -> Self {
        Self { r, g, b }
    }

    /// Conventional white-surface tag
    pub const YELLOW: Rgb = Rgb::new(0.8, 0.8, 0.0);
    /// Conventional pial-surface tag
    pub const RED: Rgb = Rgb::new(1.0, 0.2, 0.2);
}

/// A triangulated surface whose face set is fixed at construction.
///
/// Only vertex positions change during a deformation. Adjacency is derived
/// lazily from the faces and cached for the lifetime of the surface.
#[derive(Debug, Clone)]
pub struct Surface {
    vertices: Vec<Point3<Real>>,
    faces: Vec<[usize; 3]>,

    /// Free-text comments carried through file I/O
    pub comments: Vec<String>,

    /// Optional per-vertex color
    pub colors: Option<Vec<Rgb>>,

    connectivity: OnceLock<Connectivity>,
}

impl Surface {
    /// Build a surface, rejecting faces that reference missing vertices,
    /// repeat a vertex, or vertices that are not finite.
    pub fn new(vertices: Vec<Point3<Real>>, faces: Vec<[usize; 3]>) -> DeformResult<Self> {
        if let Some(idx) = vertices
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
        {
            return Err(DeformError::InvalidCoordinate(idx));
        }
        for (face_idx, face) in faces.iter().enumerate() {
            if let Some(&v) = face.iter().find(|&&v| v >= vertices.len()) {
                return Err(DeformError::FaceIndexOutOfRange {
                    face: face_idx,
                    vertex: v,
                    count: vertices.len(),
                });
            }
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                return Err(DeformError::DegenerateFace(face_idx));
            }
        }
        Ok(Self::from_parts(vertices, faces))
    }

    pub(crate) fn from_parts(vertices: Vec<Point3<Real>>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            comments: Vec::new(),
            colors: None,
            connectivity: OnceLock::new(),
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    #[inline]
    pub fn positions(&self) -> &[Point3<Real>] {
        &self.vertices
    }

    #[inline]
    pub fn position(&self, vertex: usize) -> Point3<Real> {
        self.vertices[vertex]
    }

    pub fn set_position(&mut self, vertex: usize, position: Point3<Real>) {
        self.vertices[vertex] = position;
    }

    /// Exchange the position array with `buffer` (same length).
    ///
    /// This is the swap barrier of the double-buffered update: callers fill
    /// `buffer` from a read-only snapshot, then swap it in whole.
    pub(crate) fn swap_positions(&mut self, buffer: &mut Vec<Point3<Real>>) {
        debug_assert_eq!(buffer.len(), self.vertices.len());
        std::mem::swap(&mut self.vertices, buffer);
    }

    #[inline]
    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// Cached adjacency (built on first use).
    pub fn connectivity(&self) -> &Connectivity {
        self.connectivity
            .get_or_init(|| Connectivity::build(self.vertices.len(), &self.faces))
    }

    #[inline]
    pub fn neighbors(&self, vertex: usize) -> &[usize] {
        &self.connectivity().neighbors[vertex]
    }

    pub fn edge_count(&self) -> usize {
        self.connectivity().edge_count
    }

    #[inline]
    pub fn triangle(&self, face: usize) -> [Point3<Real>; 3] {
        let [a, b, c] = self.faces[face];
        [self.vertices[a], self.vertices[b], self.vertices[c]]
    }

    /// Unit normal of `face`, `None` for a zero-area triangle.
    pub fn face_normal(&self, face: usize) -> Option<Vector3<Real>> {
        let [a, b, c] = self.triangle(face);
        (b - a).cross(&(c - a)).try_normalize(EPSILON)
    }

    /// Area-weighted vertex normals. Vertices with no non-degenerate incident
    /// face get a zero vector.
    pub fn vertex_normals(&self) -> Vec<Vector3<Real>> {
        let mut normals = vec![Vector3::zeros(); self.vertices.len()];
        for face in &self.faces {
            let [a, b, c] = [self.vertices[face[0]], self.vertices[face[1]], self.vertices[face[2]]];
            // Unnormalised cross product weights by twice the area
            let n = (b - a).cross(&(c - a));
            for &v in face {
                normals[v] += n;
            }
        }
        for n in &mut normals {
            *n = n.try_normalize(EPSILON).unwrap_or_else(Vector3::zeros);
        }
        normals
    }

    /// Umbrella operator: offset from `vertex` to the centroid of its
    /// one-ring, read from `positions`. `None` for isolated vertices.
    #[inline]
    pub fn umbrella(&self, positions: &[Point3<Real>], vertex: usize) -> Option<Vector3<Real>> {
        let ring = self.neighbors(vertex);
        if ring.is_empty() {
            return None;
        }
        let sum = ring
            .iter()
            .fold(Vector3::zeros(), |acc, &n| acc + positions[n].coords);
        Some(sum / ring.len() as Real - positions[vertex].coords)
    }

    /// Discrete mean-curvature proxy per vertex: the umbrella vector projected
    /// on the outward normal, normalised by the mean squared ring radius so a
    /// sphere of radius `R` reads roughly `1/R`. Positive on convex regions.
    pub fn mean_curvature_proxy(&self) -> Vec<Real> {
        let normals = self.vertex_normals();
        (0..self.vertices.len())
            .map(|v| {
                let Some(lap) = self.umbrella(&self.vertices, v) else {
                    return 0.0;
                };
                let ring = self.neighbors(v);
                let mean_sq = ring
                    .iter()
                    .map(|&n| (self.vertices[n] - self.vertices[v]).norm_squared())
                    .sum::<Real>()
                    / ring.len() as Real;
                if mean_sq <= EPSILON {
                    0.0
                } else {
                    -2.0 * lap.dot(&normals[v]) / mean_sq
                }
            })
            .collect()
    }

    /// Enclosed volume by the divergence theorem. Meaningful for closed,
    /// consistently oriented surfaces.
    pub fn volume(&self) -> Real {
        let signed: Real = self
            .faces
            .iter()
            .map(|f| {
                let (a, b, c) = (self.vertices[f[0]], self.vertices[f[1]], self.vertices[f[2]]);
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum();
        signed.abs()
    }

    pub fn mean_edge_length(&self) -> Real {
        let conn = self.connectivity();
        let (sum, count) = conn
            .neighbors
            .iter()
            .enumerate()
            .flat_map(|(v, ring)| ring.iter().filter(move |&&n| n > v).map(move |&n| (v, n)))
            .fold((0.0, 0usize), |(s, c), (a, b)| {
                (s + (self.vertices[a] - self.vertices[b]).norm(), c + 1)
            });
        if count == 0 { 0.0 } else { sum / count as Real }
    }

    /// Axis-aligned bounding box of all vertices
    pub fn bounding_box(&self) -> Aabb {
        let mut aabb = Aabb::new_invalid();
        for p in &self.vertices {
            aabb.take_point(*p);
        }
        aabb
    }

    /// Copy of this surface with every vertex shifted by `offset`
    pub fn translated(&self, offset: Vector3<Real>) -> Surface {
        let mut out = self.clone();
        for p in &mut out.vertices {
            *p += offset;
        }
        out
    }

    /// Tag every vertex with the same color
    pub fn paint(&mut self, color: Rgb) {
        self.colors = Some(vec![color; self.vertices.len()]);
    }

    pub fn add_comment(&mut self, comment: impl Into<String>) {
        self.comments.push(comment.into());
    }
}
