//! Octree node data structure

use crate::float_types::parry3d::bounding_volume::{Aabb, BoundingVolume};

/// Payload of an octree node: either face slots or up to eight children.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Indices into the index's face table
    Leaf(Vec<usize>),
    /// Non-empty octants only
    Branch(Vec<Node>),
}

/// An octree node: a box that encloses every face stored beneath it.
#[derive(Debug, Clone)]
pub struct Node {
    pub bounds: Aabb,
    pub kind: NodeKind,
}

impl Node {
    pub fn leaf(bounds: Aabb, faces: Vec<usize>) -> Self {
        Self {
            bounds,
            kind: NodeKind::Leaf(faces),
        }
    }

    pub fn branch(bounds: Aabb, children: Vec<Node>) -> Self {
        Self {
            bounds,
            kind: NodeKind::Branch(children),
        }
    }

    /// Depth of the subtree rooted here (a lone leaf has depth 0)
    pub fn depth(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(_) => 0,
            NodeKind::Branch(children) => {
                1 + children.iter().map(Node::depth).max().unwrap_or(0)
            },
        }
    }

    /// Visit every leaf payload in the subtree
    pub fn for_each_leaf(&self, f: &mut impl FnMut(&[usize])) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match &node.kind {
                NodeKind::Leaf(faces) => f(faces),
                NodeKind::Branch(children) => stack.extend(children.iter()),
            }
        }
    }

    /// Recompute boxes bottom-up from refreshed face boxes, keeping the
    /// partition untouched.
    pub fn refit(&mut self, face_bounds: &[Aabb]) {
        self.bounds = match &mut self.kind {
            NodeKind::Leaf(faces) => faces.iter().fold(Aabb::new_invalid(), |acc, &f| {
                acc.merged(&face_bounds[f])
            }),
            NodeKind::Branch(children) => {
                let mut acc = Aabb::new_invalid();
                for child in children.iter_mut() {
                    child.refit(face_bounds);
                    acc.merge(&child.bounds);
                }
                acc
            },
        };
    }
}
