//! Depth-bounded octree over the faces of both cortical surfaces
//!
//! The index is a disposable view of the current geometry: it is rebuilt
//! (or refit) every sub-iteration and answers the proximity queries the
//! constraint computers issue once per vertex.

pub mod node;

pub use node::{Node, NodeKind};

use crate::float_types::{
    Real,
    parry3d::{
        bounding_volume::{Aabb, BoundingVolume},
        query::PointQuery,
        shape::Triangle,
    },
};
use crate::surface::{Cortex, SurfacePair};
use nalgebra::Point3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Default maximum tree depth
pub const DEFAULT_DEPTH: usize = 7;

/// Leaves holding at most this many faces are not split further
pub const LEAF_CAPACITY: usize = 16;

/// Identifies one face of one surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceRef {
    pub cortex: Cortex,
    pub face: usize,
}

/// A face snapshot stored in the index: geometry is copied at build time so
/// queries never touch the (possibly moving) surfaces.
#[derive(Debug, Clone)]
pub struct IndexedFace {
    pub id: FaceRef,
    pub vertices: [usize; 3],
    pub triangle: [Point3<Real>; 3],
    pub bounds: Aabb,
}

impl IndexedFace {
    pub fn new(id: FaceRef, vertices: [usize; 3], triangle: [Point3<Real>; 3]) -> Self {
        let mut bounds = Aabb::new_invalid();
        for p in triangle {
            bounds.take_point(p);
        }
        Self {
            id,
            vertices,
            triangle,
            bounds,
        }
    }

    /// Closest point of the triangle to `point`
    #[inline]
    pub fn closest_point(&self, point: &Point3<Real>) -> Point3<Real> {
        let [a, b, c] = self.triangle;
        Triangle::new(a, b, c).project_local_point(point, true).point
    }

    #[inline]
    pub fn distance(&self, point: &Point3<Real>) -> Real {
        (self.closest_point(point) - point).norm()
    }
}

/// Result of a nearest-feature query.
#[derive(Debug, Clone, Copy)]
pub struct NearestFace {
    pub id: FaceRef,
    pub distance: Real,
    pub closest: Point3<Real>,
}

/// Octree spatial index over mesh faces.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    faces: Vec<IndexedFace>,
    root: Option<Node>,
    max_depth: usize,
}

impl SpatialIndex {
    /// Partition `faces` recursively into octants until a leaf holds at most
    /// [`LEAF_CAPACITY`] faces or `max_depth` is reached.
    pub fn build(faces: Vec<IndexedFace>, max_depth: usize) -> Self {
        let root = if faces.is_empty() {
            None
        } else {
            let ids: Vec<usize> = (0..faces.len()).collect();
            Some(build_node(&faces, ids, 0, max_depth))
        };
        Self {
            faces,
            root,
            max_depth,
        }
    }

    /// Index every face of both surfaces in their current position
    pub fn from_pair(pair: &SurfacePair, max_depth: usize) -> Self {
        Self::build(snapshot_faces(pair), max_depth)
    }

    /// Refresh face geometry from `pair` and refit node boxes without
    /// re-partitioning. Falls back to a full rebuild if the face set changed.
    pub fn refit(&mut self, pair: &SurfacePair) {
        if pair.face_count() != self.faces.len() {
            *self = Self::from_pair(pair, self.max_depth);
            return;
        }
        for face in &mut self.faces {
            let surface = pair.surface(face.id.cortex);
            *face = IndexedFace::new(face.id, face.vertices, surface.triangle(face.id.face));
        }
        let bounds: Vec<Aabb> = self.faces.iter().map(|f| f.bounds).collect();
        if let Some(root) = &mut self.root {
            root.refit(&bounds);
        }
    }

    #[inline]
    pub fn faces(&self) -> &[IndexedFace] {
        &self.faces
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub const fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    /// Actual depth of the built tree
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, Node::depth)
    }

    /// Number of leaves and size of the largest one
    pub fn leaf_stats(&self) -> (usize, usize) {
        let (mut count, mut largest) = (0, 0);
        if let Some(root) = &self.root {
            root.for_each_leaf(&mut |faces| {
                count += 1;
                largest = largest.max(faces.len());
            });
        }
        (count, largest)
    }

    /// Call `f` for every face whose box lies within `radius` of `point`.
    ///
    /// Only nodes whose box is within `radius` are descended; leaves are
    /// scanned linearly.
    pub fn for_each_nearby<'a>(
        &'a self,
        point: &Point3<Real>,
        radius: Real,
        mut f: impl FnMut(&'a IndexedFace),
    ) {
        let Some(root) = &self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.bounds.distance_to_local_point(point, true) > radius {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(ids) => {
                    for &id in ids {
                        let face = &self.faces[id];
                        if face.bounds.distance_to_local_point(point, true) <= radius {
                            f(face);
                        }
                    }
                },
                NodeKind::Branch(children) => stack.extend(children.iter()),
            }
        }
    }

    /// Candidate faces whose box lies within `radius` of `point`.
    /// Candidates still need an exact distance test.
    pub fn query_nearby(&self, point: &Point3<Real>, radius: Real) -> Vec<&IndexedFace> {
        let mut out = Vec::new();
        self.for_each_nearby(point, radius, |face| out.push(face));
        out
    }

    /// Closest face within `radius` among those accepted by `filter`
    pub fn nearest(
        &self,
        point: &Point3<Real>,
        radius: Real,
        mut filter: impl FnMut(&IndexedFace) -> bool,
    ) -> Option<NearestFace> {
        let mut best: Option<NearestFace> = None;
        self.for_each_nearby(point, radius, |face| {
            if !filter(face) {
                return;
            }
            let closest = face.closest_point(point);
            let distance = (closest - point).norm();
            if distance <= radius && best.is_none_or(|b| distance < b.distance) {
                best = Some(NearestFace {
                    id: face.id,
                    distance,
                    closest,
                });
            }
        });
        best
    }
}

/// Copy every face of both surfaces, white first
pub fn snapshot_faces(pair: &SurfacePair) -> Vec<IndexedFace> {
    let mut faces = Vec::with_capacity(pair.face_count());
    for cortex in Cortex::ALL {
        let surface = pair.surface(cortex);
        for (face, &vertices) in surface.faces().iter().enumerate() {
            faces.push(IndexedFace::new(
                FaceRef { cortex, face },
                vertices,
                surface.triangle(face),
            ));
        }
    }
    faces
}

fn bounds_of(faces: &[IndexedFace], ids: &[usize]) -> Aabb {
    ids.iter()
        .fold(Aabb::new_invalid(), |acc, &id| acc.merged(&faces[id].bounds))
}

fn build_node(faces: &[IndexedFace], ids: Vec<usize>, depth: usize, max_depth: usize) -> Node {
    let bounds = bounds_of(faces, &ids);
    if ids.len() <= LEAF_CAPACITY || depth >= max_depth {
        return Node::leaf(bounds, ids);
    }

    // Faces go to the octant holding their box centre, so every face lives
    // in exactly one leaf and child boxes may overlap.
    let center = bounds.center();
    let mut octants: [Vec<usize>; 8] = Default::default();
    for id in ids {
        let c = faces[id].bounds.center();
        let octant = usize::from(c.x > center.x)
            | (usize::from(c.y > center.y) << 1)
            | (usize::from(c.z > center.z) << 2);
        octants[octant].push(id);
    }

    let occupied: Vec<Vec<usize>> = octants.into_iter().filter(|o| !o.is_empty()).collect();
    if occupied.len() == 1 {
        // Clustered centres: no split makes progress
        let ids = occupied.into_iter().flatten().collect();
        return Node::leaf(bounds, ids);
    }

    #[cfg(feature = "parallel")]
    let children: Vec<Node> = occupied
        .into_par_iter()
        .map(|ids| build_node(faces, ids, depth + 1, max_depth))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let children: Vec<Node> = occupied
        .into_iter()
        .map(|ids| build_node(faces, ids, depth + 1, max_depth))
        .collect();

    Node::branch(bounds, children)
}
