//! Handle → leaf lookup for every live body.
//!
//! Lets the simulation visit all live bodies without walking the tree.
//! Entry `i` is `Some(leaf)` exactly while body `i` is live.

use crate::simulation::node::NodeId;
use crate::simulation::states::BodyHandle;

const INITIAL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct BodyIndexTable {
    entries: Vec<Option<NodeId>>,
    next: usize, // next handle to hand out
    live: usize,
}

impl Default for BodyIndexTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyIndexTable {
    pub fn new() -> Self {
        Self {
            entries: vec![None; INITIAL_CAPACITY],
            next: 0,
            live: 0,
        }
    }

    /// Reserve the next handle without pointing it anywhere yet.
    pub fn reserve_handle(&mut self) -> BodyHandle {
        let handle = BodyHandle(self.next);
        self.next += 1;
        self.grow_to(handle.index());
        handle
    }

    /// Issue a new handle already pointing at `leaf`.
    pub fn register(&mut self, leaf: NodeId) -> BodyHandle {
        let handle = self.reserve_handle();
        self.assign(handle, leaf);
        handle
    }

    pub fn lookup(&self, handle: BodyHandle) -> Option<NodeId> {
        self.entries.get(handle.index()).copied().flatten()
    }

    /// Point `handle` at `leaf`, growing the table if needed.
    pub fn assign(&mut self, handle: BodyHandle, leaf: NodeId) {
        self.grow_to(handle.index());
        let slot = &mut self.entries[handle.index()];
        if slot.is_none() {
            self.live += 1;
        }
        *slot = Some(leaf);
    }

    /// Returns the leaf the handle pointed at, if any.
    pub fn clear(&mut self, handle: BodyHandle) -> Option<NodeId> {
        let previous = self.entries.get_mut(handle.index()).and_then(Option::take);
        if previous.is_some() {
            self.live -= 1;
        }
        previous
    }

    pub fn live(&self) -> impl Iterator<Item = (BodyHandle, NodeId)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.map(|leaf| (BodyHandle(i), leaf)))
    }

    pub fn live_handles(&self) -> Vec<BodyHandle> {
        self.live().map(|(h, _)| h).collect()
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of handles issued so far, live or not.
    pub fn issued(&self) -> usize {
        self.next
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    // double until `index` fits
    fn grow_to(&mut self, index: usize) {
        if index < self.entries.len() {
            return;
        }
        let mut capacity = self.entries.len().max(1);
        while capacity <= index {
            capacity *= 2;
        }
        self.entries.resize(capacity, None);
    }
}
