//! What a renderer gets to see of a running simulation
//!
//! A [`Snapshot`] is a flat copy of the parts of the tree selected by a
//! [`SnapshotConfig`]: leaf bodies, optionally the aggregate of internal nodes,
//! and the quadrant outlines. Renderers only ever see snapshots, never the
//! tree itself.

use crate::simulation::states::{Bounds, NVec2};
use crate::simulation::universe::{Simulation, Viewport};

/// Which parts of the tree end up in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub debug: bool, // include the COM of internal nodes
    pub depth: i32, // only this depth, negative for every depth
    pub show_quad: bool, // include quadrant outlines
    pub same_depth_only: bool, // bodies are filtered by `depth` too
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            debug: false,
            depth: -1,
            show_quad: false,
            same_depth_only: false,
        }
    }
}

impl SnapshotConfig {
    fn at_depth(&self, depth: u32) -> bool {
        self.depth < 0 || depth as i64 == self.depth as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotNode {
    pub position: NVec2,
    pub mass: f64,
    pub bounds: Bounds,
    pub depth: u32,
    pub is_leaf: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub t: f64,
    pub nodes: Vec<SnapshotNode>, // walk order, aggregates only in debug mode
    pub quads: Vec<(Bounds, u32)>, // outlines with their depth
}

impl Snapshot {
    pub fn capture(sim: &Simulation, config: &SnapshotConfig) -> Self {
        let mut snapshot = Snapshot {
            t: sim.time(),
            ..Default::default()
        };

        sim.traverse(|view, depth| {
            let wanted = config.at_depth(depth);
            if config.show_quad && wanted {
                snapshot.quads.push((view.bounds(), depth));
            }

            let leaf = view.is_leaf();
            if (leaf || config.debug) && (wanted || !config.same_depth_only) {
                snapshot.nodes.push(SnapshotNode {
                    position: view.position(),
                    mass: view.mass(),
                    bounds: view.bounds(),
                    depth,
                    is_leaf: leaf,
                });
            }

            // nothing below the requested depth can be drawn
            !(config.same_depth_only && config.depth >= 0 && depth as i64 >= config.depth as i64)
        });

        snapshot
    }

    /// Hand every outline, then every node, to `renderer`.
    pub fn render<R: Renderer + ?Sized>(&self, renderer: &mut R, viewport: &Viewport) {
        for (bounds, depth) in &self.quads {
            let ll = viewport.to_screen(bounds.ll);
            let ur = viewport.to_screen(bounds.ur);
            renderer.quad(ll, ur, *depth);
        }
        for node in &self.nodes {
            renderer.node(viewport.to_screen(node.position), node);
        }
    }
}

/// Drawing backend. Positions are already in view units, origin at the
/// middle of the view and y pointing up.
pub trait Renderer {
    fn quad(&mut self, ll: NVec2, ur: NVec2, depth: u32);
    fn node(&mut self, at: NVec2, node: &SnapshotNode);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::engine::Engine;
    use crate::simulation::params::Parameters;

    fn sim() -> Simulation {
        let bounds = Bounds::new(NVec2::new(-8.0, -8.0), NVec2::new(8.0, 8.0));
        let mut sim = Simulation::with_bounds(bounds, Engine::default(), Parameters::default()).unwrap();
        for (x, y) in [(-4.0, -4.0), (1.0, 1.0), (5.0, 5.0)] {
            sim.register_star(NVec2::new(x, y), 1.0, NVec2::zeros()).unwrap();
        }
        sim
    }

    #[derive(Default)]
    struct Counter {
        quads: usize,
        bodies: usize,
    }

    impl Renderer for Counter {
        fn quad(&mut self, _: NVec2, _: NVec2, _: u32) {
            self.quads += 1;
        }

        fn node(&mut self, _: NVec2, node: &SnapshotNode) {
            if node.is_leaf {
                self.bodies += 1;
            }
        }
    }

    #[test]
    fn default_snapshot_holds_only_bodies() {
        let snap = Snapshot::capture(&sim(), &SnapshotConfig::default());
        assert_eq!(snap.nodes.len(), 3);
        assert!(snap.nodes.iter().all(|n| n.is_leaf));
        assert!(snap.quads.is_empty());
    }

    #[test]
    fn debug_adds_aggregates() {
        let config = SnapshotConfig {
            debug: true,
            ..Default::default()
        };
        let snap = Snapshot::capture(&sim(), &config);
        let aggregates = snap.nodes.iter().filter(|n| !n.is_leaf).count();
        // root plus the quadrant shared by (1, 1) and (5, 5)
        assert_eq!(aggregates, 2);
        assert_eq!(snap.nodes.len(), 5);
    }

    #[test]
    fn single_depth_outlines() {
        let config = SnapshotConfig {
            show_quad: true,
            depth: 1,
            same_depth_only: true,
            ..Default::default()
        };
        let snap = Snapshot::capture(&sim(), &config);
        assert!(snap.quads.iter().all(|(_, d)| *d == 1));
        assert_eq!(snap.quads.len(), 2);
        // only (-4, -4) is a leaf at depth 1
        assert_eq!(snap.nodes.len(), 1);
    }

    #[test]
    fn renderer_sees_everything_captured() {
        let s = sim();
        let config = SnapshotConfig {
            show_quad: true,
            ..Default::default()
        };
        let snap = Snapshot::capture(&s, &config);
        let mut counter = Counter::default();
        snap.render(&mut counter, s.viewport());
        assert_eq!(counter.quads, snap.quads.len());
        assert_eq!(counter.bodies, 3);
    }
}
