//! Vertex adjacency derived from an immutable face list

use hashbrown::HashMap;

/// One-ring neighborhoods and boundary flags.
///
/// Built once per surface; the face set never changes during a deformation
/// so the result stays valid while vertex positions move.
#[derive(Debug, Clone, Default)]
pub struct Connectivity {
    /// Sorted, deduplicated one-ring neighbor ids per vertex
    pub neighbors: Vec<Vec<usize>>,

    /// `true` for vertices lying on an edge used by a single face
    pub boundary: Vec<bool>,

    /// Number of unique undirected edges
    pub edge_count: usize,
}

impl Connectivity {
    pub fn build(vertex_count: usize, faces: &[[usize; 3]]) -> Self {
        let mut neighbors = vec![Vec::new(); vertex_count];
        let mut edge_use: HashMap<(usize, usize), u32> = HashMap::with_capacity(faces.len() * 2);

        for face in faces {
            for k in 0..3 {
                let a = face[k];
                let b = face[(k + 1) % 3];
                neighbors[a].push(b);
                neighbors[b].push(a);
                *edge_use.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }

        for ring in &mut neighbors {
            ring.sort_unstable();
            ring.dedup();
        }

        let mut boundary = vec![false; vertex_count];
        for (&(a, b), &uses) in &edge_use {
            if uses == 1 {
                boundary[a] = true;
                boundary[b] = true;
            }
        }

        Self {
            neighbors,
            boundary,
            edge_count: edge_use.len(),
        }
    }

    /// Whether `face` touches `vertex` or one of its one-ring neighbors.
    ///
    /// Such faces are part of the vertex's own sheet and never count as a
    /// proximity violation.
    #[inline]
    pub fn is_local_face(&self, vertex: usize, face: &[usize; 3]) -> bool {
        let ring = &self.neighbors[vertex];
        face.iter()
            .any(|&v| v == vertex || ring.binary_search(&v).is_ok())
    }

    pub fn boundary_count(&self) -> usize {
        self.boundary.iter().filter(|&&b| b).count()
    }
}
