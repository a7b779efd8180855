//! Quadtree cells.
//!
//! A [`Node`] is one of:
//! - EMPTY    mass is zero, the cell is scaffolding only
//! - LEAF     positive mass and no child carrying mass, i.e. a single body
//! - INTERNAL some child carries mass, `position` is the centroid of the subtree
//!
//! The kind is never stored, it is derived from the masses so that a cell
//! whose children are materialized but all empty still acts as a leaf.
//!
//! Mass and centroid are only ever adjusted incrementally through
//! [`Node::increment_com`], [`Node::decrement_com`] and [`Node::shift_com`].

use generational_arena::Index;

use crate::simulation::states::{Bounds, Resident, NVec2, MASS_EPSILON};

/// Handle of a node inside the tree arena.
///
/// Generational, so a handle to a freed node never aliases a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Index);

impl From<Index> for NodeId {
    fn from(index: Index) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for Index {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Empty,
    Leaf,
    Internal,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) position: NVec2, // body position if leaf, centroid otherwise
    pub(crate) mass: f64,
    pub(crate) bounds: Bounds,
    pub(crate) children: [Option<NodeId>; 4],
    pub(crate) parent: Option<NodeId>, // non-owning
    pub(crate) depth: u32,
    pub(crate) body: Option<Resident>, // only while this is the leaf of a live body
}

impl Node {
    pub(crate) fn new(bounds: Bounds, parent: Option<NodeId>, depth: u32) -> Self {
        Self {
            position: bounds.center(),
            mass: 0.0,
            bounds,
            children: [None; 4],
            parent,
            depth,
            body: None,
        }
    }

    pub fn position(&self) -> NVec2 {
        self.position
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn body(&self) -> Option<&Resident> {
        self.body.as_ref()
    }

    /// Materialized children, in quadrant order. Empty scaffolds included.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().flatten().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.mass <= 0.0
    }

    /// Fold an incoming body into the centroid and mass.
    pub(crate) fn increment_com(&mut self, p: NVec2, m: f64) {
        if self.mass == 0.0 {
            self.position = p;
            self.mass = m;
            return;
        }
        let total = self.mass + m;
        self.position += (p - self.position) * (m / total);
        self.mass = total;
    }

    /// Remove a departing body from the centroid and mass.
    ///
    /// Returns `true` when the remaining mass had drifted to a small nonzero
    /// value and was snapped to exactly zero.
    pub(crate) fn decrement_com(&mut self, p: NVec2, m: f64) -> bool {
        let remaining = self.mass - m;
        if remaining < MASS_EPSILON {
            let drifted = remaining != 0.0;
            self.mass = 0.0;
            self.position = self.bounds.center();
            return drifted;
        }
        let moment = self.position * self.mass - p * m;
        self.position = moment / remaining;
        self.mass = remaining;
        false
    }

    /// A body of mass `m` below this node moved by `delta`.
    pub(crate) fn shift_com(&mut self, delta: NVec2, m: f64) {
        if self.mass > 0.0 {
            self.position += delta * (m / self.mass);
        }
    }

    /// Turn this cell into the leaf of `resident`.
    pub(crate) fn occupy(&mut self, p: NVec2, m: f64, resident: Resident) {
        self.position = p;
        self.mass = m;
        self.body = Some(resident);
    }

    /// Forget the body and mass, keeping bounds and scaffold children.
    pub(crate) fn vacate(&mut self) -> Option<Resident> {
        self.mass = 0.0;
        self.position = self.bounds.center();
        self.body.take()
    }
}
