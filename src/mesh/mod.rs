//! In-memory unstructured mesh: nodes, typed elements, subdomain blocks and
//! named boundary node sets.
//!
//! A [`Mesh`] is one rank's piece of a problem. Coordinates are stored in the
//! problem's local frame; the transfer engine applies the problem transform.

pub mod generation;

use crate::geometry::cell::{self, ElemType};
use crate::geometry::{BoundingBox, Point, average};
use crate::transfer_error::TransferError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Subdomain ("block") identifier carried by every element.
pub type BlockId = u32;

/// Index of a node in its mesh.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(pub usize);

/// Index of an element in its mesh.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ElemId(pub usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl ElemId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}

impl fmt::Display for ElemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element {}", self.0)
    }
}

/// One element: shape, block and vertex connectivity.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub elem_type: ElemType,
    pub block: BlockId,
    pub nodes: Vec<NodeId>,
}

impl Element {
    pub fn new(elem_type: ElemType, nodes: Vec<NodeId>) -> Self {
        Self {
            elem_type,
            block: 0,
            nodes,
        }
    }

    pub fn in_block(mut self, block: BlockId) -> Self {
        self.block = block;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    nodes: Vec<Point>,
    elements: Vec<Element>,
    boundaries: BTreeMap<String, BTreeSet<NodeId>>,
    node_elems: Vec<Vec<ElemId>>,
}

impl Mesh {
    /// Build a mesh, checking connectivity against the node list.
    pub fn new(nodes: Vec<Point>, elements: Vec<Element>) -> Result<Self, TransferError> {
        let mut node_elems = vec![Vec::new(); nodes.len()];
        for (e, elem) in elements.iter().enumerate() {
            if elem.nodes.len() != elem.elem_type.n_vertices() {
                return Err(TransferError::InvalidGeometry(format!(
                    "element {e} ({:?}) has {} nodes, expected {}",
                    elem.elem_type,
                    elem.nodes.len(),
                    elem.elem_type.n_vertices()
                )));
            }
            for n in &elem.nodes {
                let adj = node_elems.get_mut(n.index()).ok_or_else(|| {
                    TransferError::InvalidGeometry(format!(
                        "element {e} references missing {n}"
                    ))
                })?;
                adj.push(ElemId(e));
            }
        }
        Ok(Self {
            nodes,
            elements,
            boundaries: BTreeMap::new(),
            node_elems,
        })
    }

    /// Register (or extend) a named boundary node set.
    pub fn add_boundary(
        &mut self,
        name: impl Into<String>,
        nodes: impl IntoIterator<Item = NodeId>,
    ) -> Result<(), TransferError> {
        let name = name.into();
        let set = self.boundaries.entry(name.clone()).or_default();
        for n in nodes {
            if n.index() >= self.nodes.len() {
                return Err(TransferError::InvalidGeometry(format!(
                    "boundary `{name}` references missing {n}"
                )));
            }
            set.insert(n);
        }
        Ok(())
    }

    /// Reassign element blocks from a function of the element's vertex average.
    pub fn assign_blocks(&mut self, block_of: impl Fn(&Point) -> BlockId) {
        for e in 0..self.elements.len() {
            let c = self.vertex_average(ElemId(e));
            self.elements[e].block = block_of(&c);
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn node(&self, n: NodeId) -> &Point {
        &self.nodes[n.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Point)> {
        self.nodes.iter().enumerate().map(|(i, p)| (NodeId(i), p))
    }

    pub fn element(&self, e: ElemId) -> &Element {
        &self.elements[e.index()]
    }

    pub fn elements(&self) -> impl Iterator<Item = (ElemId, &Element)> {
        self.elements.iter().enumerate().map(|(i, el)| (ElemId(i), el))
    }

    pub fn elements_of_node(&self, n: NodeId) -> &[ElemId] {
        &self.node_elems[n.index()]
    }

    pub fn boundary_names(&self) -> impl Iterator<Item = &str> {
        self.boundaries.keys().map(String::as_str)
    }

    pub fn boundary(&self, name: &str) -> Option<&BTreeSet<NodeId>> {
        self.boundaries.get(name)
    }

    pub fn element_vertices(&self, e: ElemId) -> Vec<Point> {
        self.elements[e.index()]
            .nodes
            .iter()
            .map(|n| self.nodes[n.index()])
            .collect()
    }

    /// Mean of the element's vertices; used as the element's sampling point.
    pub fn vertex_average(&self, e: ElemId) -> Point {
        average(self.element_vertices(e)).unwrap_or_default()
    }

    /// Highest element dimension present, 0 for an element-free mesh.
    pub fn dimension(&self) -> usize {
        self.elements
            .iter()
            .map(|e| e.elem_type.dimension())
            .max()
            .unwrap_or(0)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.nodes.iter().copied())
    }

    /// `true` when `blocks` is empty or the element belongs to one of them.
    pub fn element_in_blocks(&self, e: ElemId, blocks: &[BlockId]) -> bool {
        blocks.is_empty() || blocks.contains(&self.elements[e.index()].block)
    }

    /// `true` when `blocks` is empty or some element touching the node is
    /// in one of them.
    pub fn node_in_blocks(&self, n: NodeId, blocks: &[BlockId]) -> bool {
        blocks.is_empty()
            || self.node_elems[n.index()]
                .iter()
                .any(|&e| self.element_in_blocks(e, blocks))
    }

    /// `true` when `boundaries` is empty or the node lies in one of them.
    /// Unknown boundary names match nothing.
    pub fn node_on_boundaries(&self, n: NodeId, boundaries: &[String]) -> bool {
        boundaries.is_empty()
            || boundaries
                .iter()
                .any(|b| self.boundaries.get(b).is_some_and(|s| s.contains(&n)))
    }

    /// An element is on a boundary when any of its nodes is.
    pub fn element_on_boundaries(&self, e: ElemId, boundaries: &[String]) -> bool {
        boundaries.is_empty()
            || self.elements[e.index()]
                .nodes
                .iter()
                .any(|&n| self.node_on_boundaries(n, boundaries))
    }

    /// First element (lowest id) restricted to `blocks` that contains `p`,
    /// with the reference coordinates of `p` inside it.
    pub fn locate_element(
        &self,
        p: &Point,
        blocks: &[BlockId],
    ) -> Result<Option<(ElemId, Vec<f64>)>, TransferError> {
        for (e, elem) in self.elements() {
            if !self.element_in_blocks(e, blocks) {
                continue;
            }
            let vertices = self.element_vertices(e);
            if !BoundingBox::from_points(vertices.iter().copied()).contains(p) {
                continue;
            }
            if let Some(xi) = cell::locate_in_element(elem.elem_type, &vertices, p)? {
                return Ok(Some((e, xi)));
            }
        }
        Ok(None)
    }

    pub fn contains_point(&self, p: &Point, blocks: &[BlockId]) -> Result<bool, TransferError> {
        Ok(self.locate_element(p, blocks)?.is_some())
    }

    /// Sub-mesh made of the elements accepted by `keep`, with nodes
    /// renumbered in their original order and boundary sets carried over.
    pub fn extract_elements(
        &self,
        keep: impl Fn(ElemId, &Element) -> bool,
    ) -> Result<Self, TransferError> {
        let kept: Vec<_> = self.elements().filter(|(e, el)| keep(*e, el)).collect();
        let used: BTreeSet<NodeId> = kept
            .iter()
            .flat_map(|(_, el)| el.nodes.iter().copied())
            .collect();
        let renumber: BTreeMap<NodeId, NodeId> = used
            .iter()
            .enumerate()
            .map(|(i, &old)| (old, NodeId(i)))
            .collect();
        let nodes = used.iter().map(|n| self.nodes[n.index()]).collect();
        let elements = kept
            .iter()
            .map(|(_, el)| Element {
                elem_type: el.elem_type,
                block: el.block,
                nodes: el.nodes.iter().map(|n| renumber[n]).collect(),
            })
            .collect();
        let mut mesh = Self::new(nodes, elements)?;
        for (name, set) in &self.boundaries {
            let carried: BTreeSet<NodeId> =
                set.iter().filter_map(|n| renumber.get(n).copied()).collect();
            mesh.boundaries.insert(name.clone(), carried);
        }
        Ok(mesh)
    }
}
