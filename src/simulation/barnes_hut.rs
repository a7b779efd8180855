//! # Barnes–Hut Quadtree (2D)
//!
//! This module implements the **incrementally maintained quadtree** the
//! simulation runs on. Unlike a tree rebuilt from scratch every step, the
//! nodes here live for as long as the simulation does: bodies are inserted
//! once, then moved, migrated between quadrants, or removed, and every
//! ancestor's mass and center of mass (COM) is patched on the way.
//!
//! ## Core Concepts
//!
//! - Space is recursively subdivided into 4 quadrants.
//! - Each region is a [`Node`] stored in a generational arena owned by
//!   [`SpatialTree`]. Children are arena handles, the parent link is a
//!   non-owning handle that is never used to free anything.
//! - A node holding a single body is a leaf. Any node whose children carry
//!   mass is internal and stores the total mass and COM of its subtree.
//! - Children are created lazily and survive as zero-mass scaffolding once
//!   their body leaves, unless the body departs the universe for good.
//!
//! ## Operations
//!
//! - [`SpatialTree::insert`]: place a body below a node, pushing an existing
//!   resident one level deeper whenever two bodies share a quadrant.
//! - [`SpatialTree::relocate`]: after a body moved, shift, migrate or remove it.
//! - [`SpatialTree::accumulate_force`]: opening-angle walk giving the
//!   acceleration on a single body.
//! - [`SpatialTree::traverse`]: read-only depth-first walk for callers.
//!
//! Both insertion and the force walk run on explicit stacks, so tightly
//! clustered bodies cannot exhaust the call stack.

use generational_arena::Arena;
use log::{debug, warn};

use crate::simulation::body_table::BodyIndexTable;
use crate::simulation::errors::TreeError;
use crate::simulation::forces::GravityLaw;
use crate::simulation::node::{Node, NodeId, NodeKind};
use crate::simulation::states::{Body, BodyHandle, Bounds, NVec2, Resident, MASS_EPSILON};

/// Deepest level a node may be created at. Two bodies closer than
/// `root width / 2^MAX_DEPTH` cannot be separated and the newcomer is dropped.
pub const MAX_DEPTH: u32 = 64;

/// One unit of work for [`SpatialTree::insert`]: put `body` somewhere below `node`.
struct Pending {
    node: NodeId,
    body: Body,
    affect_com: bool,
}

/// Outcome of [`SpatialTree::relocate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Relocation {
    /// Still inside its leaf quadrant, ancestors' COM shifted.
    Shifted,
    /// Left its quadrant and was reinserted from the root at a new leaf.
    Migrated(NodeId),
    /// Left the root bounds and was removed for good.
    Departed,
    /// Left its quadrant but could not be reinserted.
    Dropped(TreeError),
    /// The leaf no longer exists or holds no body.
    Missing,
}

/// Borrowed view of a node handed to traversal visitors.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    id: NodeId,
    node: &'a Node,
    leaf: bool,
}

impl<'a> NodeView<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &'a Node {
        self.node
    }

    pub fn position(&self) -> NVec2 {
        self.node.position
    }

    pub fn mass(&self) -> f64 {
        self.node.mass
    }

    pub fn bounds(&self) -> Bounds {
        self.node.bounds
    }

    pub fn depth(&self) -> u32 {
        self.node.depth
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    /// Handle of the body this node is the leaf of, if any.
    pub fn handle(&self) -> Option<BodyHandle> {
        self.node.body.map(|b| b.handle)
    }
}

/// Quadtree over a fixed root region.
pub struct SpatialTree {
    nodes: Arena<Node>,
    root: NodeId,
    mass_clamps: u64, // times a drifting mass was snapped to zero
}

impl SpatialTree {
    /// Create a tree whose root covers `bounds`. The root never holds a body
    /// itself, bodies always live in one of its descendants.
    pub fn new(bounds: Bounds) -> Self {
        let mut nodes = Arena::new();
        let root = NodeId::from(nodes.insert(Node::new(bounds, None, 0)));
        Self {
            nodes,
            root,
            mass_clamps: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> &Node {
        &self.nodes[self.root.into()]
    }

    pub fn bounds(&self) -> Bounds {
        self.root_node().bounds
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.into())
    }

    /// Dynamic state of the body living in `leaf`.
    pub(crate) fn resident_mut(&mut self, leaf: NodeId) -> Option<&mut Resident> {
        self.nodes.get_mut(leaf.into()).and_then(|n| n.body.as_mut())
    }

    /// Number of materialized nodes, scaffolding included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn mass_clamps(&self) -> u64 {
        self.mass_clamps
    }

    /// True while no child of `id` carries mass.
    ///
    /// Materialized children with zero mass do not count, so a cell that was
    /// once subdivided and later emptied is a leaf again.
    pub fn is_leaf(&self, id: NodeId) -> bool {
        match self.node(id) {
            Some(node) => !node
                .children()
                .any(|c| self.node(c).map_or(false, |child| child.mass > MASS_EPSILON)),
            None => false,
        }
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        let node = self.node(id)?;
        Some(if node.mass <= 0.0 {
            NodeKind::Empty
        } else if self.is_leaf(id) {
            NodeKind::Leaf
        } else {
            NodeKind::Internal
        })
    }

    /// Child `index` of `id`, without materializing it.
    pub fn child(&self, id: NodeId, index: usize) -> Result<Option<NodeId>, TreeError> {
        if index >= 4 {
            warn!("requested child {index} of a quadtree node");
            return Err(TreeError::InvalidChildIndex(index));
        }
        Ok(self.node(id).and_then(|n| n.children[index]))
    }

    /// Child `index` of `id`, creating the empty quadrant on first access.
    fn child_or_create(&mut self, id: NodeId, index: usize) -> Result<NodeId, TreeError> {
        if let Some(existing) = self.child(id, index)? {
            return Ok(existing);
        }
        let parent = &self.nodes[id.into()];
        let child = Node::new(parent.bounds.quadrant(index), Some(id), parent.depth + 1);
        let child_id = NodeId::from(self.nodes.insert(child));
        self.nodes[id.into()].children[index] = Some(child_id);
        Ok(child_id)
    }

    /// Insert `body` below `target`.
    ///
    /// With `affect_com` the target's own mass and COM take the body in; pass
    /// `false` when the body is already accounted for there (a resident being
    /// pushed one level deeper). Every level below the target always takes it.
    ///
    /// The body table is pointed at every leaf a body lands in, including
    /// residents displaced along the way. On failure the body is dropped,
    /// every COM update made for it is undone, and the tree is unchanged
    /// apart from scaffolding and residents that were pushed deeper.
    pub fn insert(
        &mut self,
        target: NodeId,
        body: Body,
        affect_com: bool,
        table: &mut BodyIndexTable,
    ) -> Result<NodeId, TreeError> {
        let incoming = body.resident.handle;
        let mut work = vec![Pending {
            node: target,
            body,
            affect_com,
        }];
        let mut counted: Vec<NodeId> = Vec::new(); // nodes whose COM includes `body`

        while let Some(job) = work.pop() {
            let Some(node) = self.node(job.node) else {
                return Err(self.abort_insert(&body, &counted, 0));
            };
            let depth = node.depth;
            let bounds = node.bounds;

            let Some(quadrant) = (0..4).find(|&i| bounds.quadrant(i).contains(&job.body.x)) else {
                if job.body.resident.handle != incoming {
                    // only a resident lying outside its own leaf ends up here
                    self.restore_resident(job.node, job.body, table);
                }
                return Err(self.abort_insert(&body, &counted, depth));
            };
            let child = self.child_or_create(job.node, quadrant)?;

            if job.affect_com {
                self.nodes[job.node.into()].increment_com(job.body.x, job.body.m);
                counted.push(job.node);
            }

            let (child_empty, child_depth, child_x, child_m) = {
                let c = &self.nodes[child.into()];
                (c.is_empty(), c.depth, c.position, c.mass)
            };

            if child_empty {
                self.nodes[child.into()].occupy(job.body.x, job.body.m, job.body.resident);
                table.assign(job.body.resident.handle, child);
                if job.body.resident.handle == incoming {
                    return Ok(child);
                }
                continue;
            }

            if self.is_leaf(child) {
                if child_depth + 1 > MAX_DEPTH {
                    return Err(self.abort_insert(&body, &counted, child_depth));
                }
                // Resident goes first (LIFO), its mass is already in `child`
                let evicted = self.nodes[child.into()].body.take();
                work.push(Pending {
                    node: child,
                    body: job.body,
                    affect_com: true,
                });
                match evicted {
                    Some(resident) => work.push(Pending {
                        node: child,
                        body: Body {
                            x: child_x,
                            m: child_m,
                            resident,
                        },
                        affect_com: false,
                    }),
                    None => warn!("leaf at depth {child_depth} carries mass but no body"),
                }
            } else {
                work.push(Pending {
                    node: child,
                    body: job.body,
                    affect_com: true,
                });
            }
        }

        Err(self.abort_insert(&body, &counted, 0))
    }

    // Put a resident back into the node it was evicted from.
    fn restore_resident(&mut self, id: NodeId, body: Body, table: &mut BodyIndexTable) {
        self.nodes[id.into()].body = Some(body.resident);
        table.assign(body.resident.handle, id);
    }

    // Undo the COM contributions of a body that could not be placed.
    fn abort_insert(&mut self, body: &Body, counted: &[NodeId], depth: u32) -> TreeError {
        for &id in counted.iter().rev() {
            if self.nodes[id.into()].decrement_com(body.x, body.m) {
                self.mass_clamps += 1;
            }
        }
        warn!(
            "body {} at ({}, {}) could not be inserted below depth {}, dropping it",
            body.resident.handle, body.x.x, body.x.y, depth
        );
        TreeError::InsertionFailure {
            x: body.x.x,
            y: body.x.y,
            depth,
        }
    }

    /// Take the body out of `leaf`, leaving the cell as empty scaffolding.
    /// [`SpatialTree::remove`] also frees that scaffolding.
    ///
    /// Every ancestor's mass and COM lose the body and the table entry is
    /// cleared in the same call.
    pub fn detach(&mut self, leaf: NodeId, table: &mut BodyIndexTable) -> Option<Body> {
        let node = self.nodes.get_mut(leaf.into())?;
        node.body?;
        let (x, m) = (node.position, node.mass);
        let resident = node.vacate()?;
        let parent = node.parent;

        table.clear(resident.handle);
        self.propagate_removal(parent, x, m);
        Some(Body { x, m, resident })
    }

    /// Detach the body in `leaf`, then free the leaf and every ancestor below
    /// the root whose mass dropped to zero.
    pub fn remove(&mut self, leaf: NodeId, table: &mut BodyIndexTable) -> Option<Body> {
        if leaf == self.root {
            return None;
        }
        let body = self.detach(leaf, table)?;
        self.prune(leaf);
        Some(body)
    }

    // Free the emptied `leaf` together with every ancestor left without mass,
    // stopping below the root.
    fn prune(&mut self, leaf: NodeId) {
        let mut top = leaf;
        while let Some(parent) = self.node(top).and_then(|n| n.parent) {
            if parent == self.root || !self.nodes[parent.into()].is_empty() {
                break;
            }
            top = parent;
        }
        if top != self.root {
            self.free_subtree(top);
        }
    }

    // Walk to the root, taking (x, m) out of every ancestor.
    fn propagate_removal(&mut self, mut cursor: Option<NodeId>, x: NVec2, m: f64) {
        while let Some(id) = cursor {
            let node = &mut self.nodes[id.into()];
            if node.decrement_com(x, m) {
                self.mass_clamps += 1;
                debug!("mass of node at depth {} drifted below {MASS_EPSILON}, clamped to 0", node.depth);
            }
            cursor = node.parent;
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).and_then(|n| n.parent) {
            let parent = &mut self.nodes[parent.into()];
            for slot in parent.children.iter_mut() {
                if *slot == Some(id) {
                    *slot = None;
                }
            }
        }

        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(next.into()) {
                stack.extend(node.children());
            }
        }
    }

    /// Move the body in `leaf` to `to` inside the same quadrant.
    fn shift(&mut self, leaf: NodeId, to: NVec2) {
        let node = &mut self.nodes[leaf.into()];
        let delta = to - node.position;
        let m = node.mass;
        node.position = to;

        let mut cursor = node.parent;
        while let Some(id) = cursor {
            let ancestor = &mut self.nodes[id.into()];
            ancestor.shift_com(delta, m);
            cursor = ancestor.parent;
        }
    }

    /// Bring the tree in line with a body that moved to `moved.x`.
    ///
    /// - outside the root: removed for good, table entry cleared
    /// - outside its leaf but inside the root: detached and reinserted from the root
    /// - still inside its leaf: ancestors' COM shifted by the displacement
    ///
    /// `moved` carries the body's new position and dynamic state, its mass
    /// must equal the mass stored in the leaf.
    pub fn relocate(&mut self, leaf: NodeId, moved: Body, table: &mut BodyIndexTable) -> Relocation {
        let Some(node) = self.node(leaf) else {
            return Relocation::Missing;
        };
        if node.body.is_none() {
            return Relocation::Missing;
        }
        let leaf_bounds = node.bounds;

        if !self.bounds().contains(&moved.x) {
            self.remove(leaf, table);
            return Relocation::Departed;
        }

        if leaf_bounds.contains(&moved.x) {
            self.shift(leaf, moved.x);
            self.nodes[leaf.into()].body = Some(moved.resident);
            return Relocation::Shifted;
        }

        self.detach(leaf, table);
        self.prune(leaf);
        match self.insert(self.root, moved, true, table) {
            Ok(new_leaf) => Relocation::Migrated(new_leaf),
            Err(e) => Relocation::Dropped(e),
        }
    }

    /// Barnes–Hut acceleration on the body `handle` located at `at`.
    ///
    /// - leaves are applied exactly, the body's own leaf is skipped by handle
    /// - an internal node with `size / distance < delta` is applied as one mass
    ///   at its COM, unless it encloses `at`
    /// - otherwise its children are visited
    ///
    /// `delta = 0` visits every leaf and matches direct summation.
    pub fn accumulate_force(&self, handle: BodyHandle, at: NVec2, law: &GravityLaw, delta: f64) -> NVec2 {
        let mut acc = NVec2::zeros();
        let mut stack = vec![self.root];

        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            if node.mass <= 0.0 {
                continue;
            }

            if self.is_leaf(id) {
                if node.body.map(|b| b.handle) != Some(handle) {
                    acc += law.accel_toward(at, node.position, node.mass);
                }
                continue;
            }

            let d = (node.position - at).norm();
            let far = d > 0.0 && node.bounds.size() / d < delta && !node.bounds.contains(&at);
            if far {
                acc += law.accel_toward(at, node.position, node.mass);
            } else {
                stack.extend(node.children());
            }
        }

        acc
    }

    /// Depth-first pre-order walk over every node with mass.
    ///
    /// The visitor returns whether to descend below the node it was given;
    /// `false` skips that subtree and the walk continues with its siblings.
    pub fn traverse<F>(&self, mut visitor: F)
    where
        F: FnMut(&NodeView<'_>, u32) -> bool,
    {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            if node.mass <= 0.0 {
                continue;
            }
            let view = NodeView {
                id,
                node,
                leaf: self.is_leaf(id),
            };
            if !visitor(&view, node.depth) {
                continue;
            }
            // reversed so quadrant 0 is popped first
            stack.extend(node.children.iter().rev().flatten().copied());
        }
    }

    /// Check every structural invariant, returning a description of each
    /// violation. Aggregates are recomputed from the leaves, so this is
    /// meant for tests and debugging, never for the step loop.
    pub fn validate(&self, table: &BodyIndexTable, tolerance: f64) -> Vec<String> {
        let mut problems = Vec::new();

        for (index, node) in self.nodes.iter() {
            let id = NodeId::from(index);
            for (q, child) in node.children.iter().enumerate() {
                let Some(child) = child else { continue };
                match self.node(*child) {
                    Some(c) => {
                        if c.parent != Some(id) {
                            problems.push(format!("child {q} at depth {} has a foreign parent", c.depth));
                        }
                        if c.bounds != node.bounds.quadrant(q) {
                            problems.push(format!("child {q} at depth {} is not its quadrant", c.depth));
                        }
                    }
                    None => problems.push(format!("dangling child {q} at depth {}", node.depth + 1)),
                }
            }

            if node.mass > 0.0 && !self.is_leaf(id) {
                let (mass, moment) = self.aggregate(id);
                let scale = mass.max(1.0);
                if (mass - node.mass).abs() > tolerance * scale {
                    problems.push(format!("depth {}: mass {} but leaves sum to {}", node.depth, node.mass, mass));
                }
                let com = moment / mass;
                if (com - node.position).norm() > tolerance * node.bounds.size().max(1.0) {
                    problems.push(format!("depth {}: COM {:?} but leaves give {:?}", node.depth, node.position, com));
                }
            }

            if let Some(resident) = node.body {
                if table.lookup(resident.handle) != Some(id) {
                    problems.push(format!("body {} is not indexed at its leaf", resident.handle));
                }
                if !node.bounds.contains(&node.position) {
                    problems.push(format!("body {} lies outside its leaf", resident.handle));
                }
            }
        }

        for (handle, leaf) in table.live() {
            match self.node(leaf).and_then(|n| n.body) {
                Some(resident) if resident.handle == handle => {}
                _ => problems.push(format!("table entry {handle} points at a node without that body")),
            }
        }

        problems
    }

    // Sum mass and moment over all bodies below `id`.
    fn aggregate(&self, id: NodeId) -> (f64, NVec2) {
        let mut mass = 0.0;
        let mut moment = NVec2::zeros();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(node) = self.node(next) else { continue };
            if node.body.is_some() {
                mass += node.mass;
                moment += node.position * node.mass;
            }
            stack.extend(node.children());
        }
        (mass, moment)
    }
}
