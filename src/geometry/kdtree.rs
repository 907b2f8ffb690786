//! Static kd-tree for k-nearest-neighbour queries over 3D sample points.
//!
//! Results are the `k` smallest `(squared distance, insertion index)` pairs in
//! lexicographic order, so equidistant samples always resolve to the lowest
//! index no matter how the tree was split.

use super::{Point, distance_squared};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Default number of points stored per leaf.
pub const DEFAULT_LEAF_SIZE: usize = 10;

/// One query hit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// Index of the sample in the slice the tree was built from.
    pub index: usize,
    pub distance_squared: f64,
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_squared
            .total_cmp(&other.distance_squared)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Debug)]
enum Node {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

/// Immutable kd-tree over a point set.
#[derive(Clone, Debug)]
pub struct KdTree {
    points: Vec<Point>,
    /// Permutation of point indices; leaves own contiguous ranges.
    order: Vec<usize>,
    nodes: Vec<Node>,
    leaf_size: usize,
}

impl KdTree {
    pub fn new(points: Vec<Point>) -> Self {
        Self::with_leaf_size(points, DEFAULT_LEAF_SIZE)
    }

    pub fn with_leaf_size(points: Vec<Point>, leaf_size: usize) -> Self {
        let leaf_size = leaf_size.max(1);
        let mut tree = Self {
            order: (0..points.len()).collect(),
            points,
            nodes: Vec::new(),
            leaf_size,
        };
        if !tree.points.is_empty() {
            tree.build(0, tree.points.len());
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    fn build(&mut self, start: usize, end: usize) -> usize {
        let id = self.nodes.len();
        if end - start <= self.leaf_size {
            self.nodes.push(Node::Leaf { start, end });
            return id;
        }
        let axis = self.widest_axis(start, end);
        let points = &self.points;
        self.order[start..end].sort_by(|&a, &b| {
            points[a][axis]
                .total_cmp(&points[b][axis])
                .then(a.cmp(&b))
        });
        let mid = start + (end - start) / 2;
        let value = self.points[self.order[mid]][axis];
        // Placeholder, patched once the children exist.
        self.nodes.push(Node::Leaf { start, end });
        let left = self.build(start, mid);
        let right = self.build(mid, end);
        self.nodes[id] = Node::Split {
            axis,
            value,
            left,
            right,
        };
        id
    }

    fn widest_axis(&self, start: usize, end: usize) -> usize {
        let mut lo = [f64::MAX; 3];
        let mut hi = [f64::MIN; 3];
        for &i in &self.order[start..end] {
            for a in 0..3 {
                lo[a] = lo[a].min(self.points[i][a]);
                hi[a] = hi[a].max(self.points[i][a]);
            }
        }
        (0..3)
            .max_by(|&a, &b| (hi[a] - lo[a]).total_cmp(&(hi[b] - lo[b])).then(b.cmp(&a)))
            .unwrap_or(0)
    }

    /// The `k` nearest samples to `query`, closest first.
    pub fn nearest(&self, query: &Point, k: usize) -> Vec<Neighbor> {
        if k == 0 || self.nodes.is_empty() {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.search(0, query, k, &mut heap);
        heap.into_sorted_vec()
    }

    fn search(&self, node: usize, query: &Point, k: usize, heap: &mut BinaryHeap<Neighbor>) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &index in &self.order[start..end] {
                    let candidate = Neighbor {
                        index,
                        distance_squared: distance_squared(query, &self.points[index]),
                    };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                self.search(near, query, k, heap);
                // Equal-distance samples on the far side may still win on index.
                let worst = heap.peek().map(|n| n.distance_squared);
                if heap.len() < k || worst.is_some_and(|w| diff * diff <= w) {
                    self.search(far, query, k, heap);
                }
            }
        }
    }
}
