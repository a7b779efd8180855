//! The simulation object callers own and drive.
//!
//! A [`Simulation`] owns the quadtree and the body table and runs each step as
//! three passes over the live bodies:
//! 1. force pass: tree walk per body, accumulated into its `future` acceleration
//! 2. integration pass: one velocity–Verlet update per body, kept aside
//! 3. maintenance pass: every update is applied to the tree, shifting,
//!    migrating or removing bodies so that the tree, the COM aggregates and
//!    the table agree again before `step` returns
//!
//! Nothing here is global: several simulations can live side by side.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::simulation::barnes_hut::{NodeView, Relocation, SpatialTree};
use crate::simulation::body_table::BodyIndexTable;
use crate::simulation::engine::Engine;
use crate::simulation::errors::{ConfigError, TreeError};
use crate::simulation::forces::GravityLaw;
use crate::simulation::galaxy::{self, GalaxySpec};
use crate::simulation::integrator::{leapfrog_step, Kinematics};
use crate::simulation::node::NodeId;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, BodyHandle, BodySnapshot, Bounds, NVec2, Resident, MASS_EPSILON};

/// Visible window and how many simulation units it spans horizontally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64, // view width (pixels)
    pub height: f64, // view height (pixels)
    pub true_width: f64, // world units across the view
}

impl Viewport {
    /// Both view sides and the world width must be positive and finite, or
    /// the world bounds come out NaN.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ok = |v: f64| v > 0.0 && v.is_finite();
        if ok(self.width) && ok(self.height) && ok(self.true_width) {
            Ok(())
        } else {
            Err(ConfigError::InvalidViewport {
                width: self.width,
                height: self.height,
                true_width: self.true_width,
            })
        }
    }

    pub fn true_height(&self) -> f64 {
        self.true_width * self.height / self.width
    }

    /// View units per world unit.
    pub fn scale(&self) -> f64 {
        self.width / self.true_width
    }

    /// The visible world, centered on the origin.
    pub fn world_bounds(&self) -> Bounds {
        Bounds::from_center(NVec2::zeros(), 0.5 * self.true_width, 0.5 * self.true_height())
    }

    /// World position → view position, origin at the middle of the view, y up.
    pub fn to_screen(&self, p: NVec2) -> NVec2 {
        p * self.scale()
    }
}

/// Running totals over the life of the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    pub migrated: u64, // bodies reinserted after leaving their quadrant
    pub departed: u64, // bodies that left the root for good
    pub dropped: u64, // migrating bodies that could not be reinserted
    pub insertion_failures: u64, // every failed insertion, registration included
    pub mass_clamps: u64, // aggregate masses snapped to zero
}

pub struct Simulation {
    tree: SpatialTree,
    table: BodyIndexTable,
    engine: Engine,
    parameters: Parameters,
    viewport: Viewport,
    rng: StdRng,
    stats: StepStats,
    t: f64, // time
    steps: u64,
}

impl Simulation {
    /// Simulation over a `true_width` wide world seen through a
    /// `view_width` × `view_height` window, with the default engine.
    ///
    /// Fails when the view or the parameters are degenerate, see
    /// [`Viewport::validate`] and [`Parameters::validate`].
    pub fn new(view_width: f64, view_height: f64, true_width: f64, parameters: Parameters) -> Result<Self, ConfigError> {
        let viewport = Viewport {
            width: view_width,
            height: view_height,
            true_width,
        };
        Self::with_settings(viewport, Engine::default(), parameters)
    }

    /// The root covers the visible world grown by `parameters.root_scale`, so
    /// bodies can wander off screen for a while before leaving for good.
    pub fn with_settings(viewport: Viewport, engine: Engine, parameters: Parameters) -> Result<Self, ConfigError> {
        viewport.validate()?;
        parameters.validate()?;
        let bounds = viewport.world_bounds().scaled(parameters.root_scale);
        let mut sim = Self::with_bounds(bounds, engine, parameters)?;
        sim.viewport = viewport;
        Ok(sim)
    }

    /// Simulation whose root covers exactly `bounds`.
    pub fn with_bounds(bounds: Bounds, engine: Engine, parameters: Parameters) -> Result<Self, ConfigError> {
        parameters.validate()?;
        let extent_ok = |v: f64| v > 0.0 && v.is_finite();
        if !(extent_ok(bounds.width()) && extent_ok(bounds.height()) && bounds.center().iter().all(|c| c.is_finite())) {
            return Err(ConfigError::InvalidBounds);
        }
        let viewport = Viewport {
            width: bounds.width(),
            height: bounds.height(),
            true_width: bounds.width(),
        };
        Ok(Self {
            tree: SpatialTree::new(bounds),
            table: BodyIndexTable::new(),
            engine,
            rng: StdRng::seed_from_u64(parameters.seed),
            parameters,
            viewport,
            stats: StepStats::default(),
            t: 0.0,
            steps: 0,
        })
    }

    /// Add one body. The handle stays with the body until it departs.
    pub fn register_star(&mut self, position: NVec2, mass: f64, velocity: NVec2) -> Result<BodyHandle, TreeError> {
        if !(mass > MASS_EPSILON && mass.is_finite()) {
            warn!("refusing to register a body of mass {mass}");
            return Err(TreeError::NonPositiveMass(mass));
        }

        let handle = self.table.reserve_handle();
        let body = Body {
            x: position,
            m: mass,
            resident: Resident::new(handle, velocity),
        };
        let root = self.tree.root();
        match self.tree.insert(root, body, true, &mut self.table) {
            Ok(_) => Ok(handle),
            Err(e) => {
                self.stats.insertion_failures += 1;
                Err(e)
            }
        }
    }

    /// Add a core and its satellites. Stars that cannot be placed are
    /// skipped, the handles of the others are returned in placement order.
    pub fn register_galaxy(&mut self, spec: &GalaxySpec) -> Vec<BodyHandle> {
        let stars = galaxy::plan(spec, self.parameters.G, &mut self.rng);
        let total = stars.len();
        let handles: Vec<BodyHandle> = stars
            .into_iter()
            .filter_map(|s| self.register_star(s.x, s.m, s.v).ok())
            .collect();

        if handles.len() < total {
            warn!("galaxy at ({}, {}): placed {} of {} stars", spec.center.x, spec.center.y, handles.len(), total);
        } else {
            debug!("galaxy at ({}, {}): placed {} stars", spec.center.x, spec.center.y, total);
        }
        handles
    }

    /// Barnes–Hut acceleration on every live body for the current positions.
    pub fn accelerations(&self, delta: f64) -> Vec<(BodyHandle, NVec2)> {
        let law = self.law();
        self.table
            .live()
            .filter_map(|(handle, leaf)| {
                let at = self.tree.node(leaf)?.position();
                Some((handle, self.tree.accumulate_force(handle, at, &law, delta)))
            })
            .collect()
    }

    /// Advance every live body by one fixed step.
    pub fn step(&mut self) {
        let dt = self.parameters.h0;

        // Force pass: everything is accumulated before anything moves
        for (handle, accel) in self.accelerations(self.engine.opening_angle()) {
            if let Some(resident) = self.table.lookup(handle).and_then(|leaf| self.tree.resident_mut(leaf)) {
                resident.accel.future += accel;
            }
        }

        // Integration pass
        let moved: Vec<Body> = self
            .table
            .live()
            .filter_map(|(_, leaf)| self.integrate(leaf, dt))
            .collect();

        // Maintenance pass. Leaves are looked up again, earlier migrations
        // may have pushed a body deeper.
        for body in moved {
            let handle = body.resident.handle;
            let Some(leaf) = self.table.lookup(handle) else {
                warn!("body {handle} vanished from the table mid-step");
                continue;
            };

            if !is_finite(&body) {
                warn!("body {handle} has a non-finite state, removing it");
                self.tree.remove(leaf, &mut self.table);
                self.stats.departed += 1;
                continue;
            }

            match self.tree.relocate(leaf, body, &mut self.table) {
                Relocation::Shifted => {}
                Relocation::Migrated(_) => self.stats.migrated += 1,
                Relocation::Departed => {
                    debug!("body {handle} left the universe at ({}, {})", body.x.x, body.x.y);
                    self.stats.departed += 1;
                }
                Relocation::Dropped(e) => {
                    warn!("body {handle} dropped while migrating: {e}");
                    self.stats.dropped += 1;
                    self.stats.insertion_failures += 1;
                }
                Relocation::Missing => warn!("body {handle} has no leaf to update"),
            }
        }

        self.stats.mass_clamps = self.tree.mass_clamps();
        self.t += dt;
        self.steps += 1;
    }

    /// Step until `t_end` is reached.
    pub fn run(&mut self) {
        let t_end = self.parameters.t_end;
        while self.t + 0.5 * self.parameters.h0 < t_end {
            let before = self.t;
            self.step();
            if self.t <= before {
                warn!("time stuck at t = {before}, stopping early");
                break;
            }
        }
        info!(
            "reached t = {:.3} after {} steps, {} bodies live, {:?}",
            self.t,
            self.steps,
            self.live_count(),
            self.stats
        );
    }

    fn integrate(&self, leaf: NodeId, dt: f64) -> Option<Body> {
        let node = self.tree.node(leaf)?;
        let resident = node.body()?;
        let next = leapfrog_step(
            &Kinematics {
                x: node.position(),
                v: resident.velocity,
                accel: resident.accel,
                primed: resident.primed,
            },
            dt,
        );
        Some(Body {
            x: next.x,
            m: node.mass(),
            resident: Resident {
                handle: resident.handle,
                velocity: next.v,
                accel: next.accel,
                primed: next.primed,
            },
        })
    }

    /// Teleport a body and repair the tree right away, the same way the
    /// maintenance pass would after a step.
    pub fn move_body(&mut self, handle: BodyHandle, to: NVec2) -> Result<Relocation, TreeError> {
        let leaf = self.table.lookup(handle).ok_or(TreeError::UnknownHandle(handle.index()))?;
        let node = self.tree.node(leaf).ok_or(TreeError::UnknownHandle(handle.index()))?;
        let resident = *node.body().ok_or(TreeError::UnknownHandle(handle.index()))?;
        let body = Body {
            x: to,
            m: node.mass(),
            resident,
        };

        let outcome = self.tree.relocate(leaf, body, &mut self.table);
        match &outcome {
            Relocation::Migrated(_) => self.stats.migrated += 1,
            Relocation::Departed => self.stats.departed += 1,
            Relocation::Dropped(_) => {
                self.stats.dropped += 1;
                self.stats.insertion_failures += 1;
            }
            Relocation::Shifted | Relocation::Missing => {}
        }
        self.stats.mass_clamps = self.tree.mass_clamps();
        Ok(outcome)
    }

    /// Take a body out of the simulation for good.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Result<BodySnapshot, TreeError> {
        let snapshot = self.body(handle).ok_or(TreeError::UnknownHandle(handle.index()))?;
        let leaf = self.table.lookup(handle).ok_or(TreeError::UnknownHandle(handle.index()))?;
        self.tree.remove(leaf, &mut self.table);
        self.stats.mass_clamps = self.tree.mass_clamps();
        Ok(snapshot)
    }

    /// Depth-first walk over every node with mass, see [`SpatialTree::traverse`].
    pub fn traverse<F>(&self, visitor: F)
    where
        F: FnMut(&NodeView<'_>, u32) -> bool,
    {
        self.tree.traverse(visitor)
    }

    /// Current state of `handle`. The velocity trails the position by one
    /// step, see [`BodySnapshot`].
    pub fn body(&self, handle: BodyHandle) -> Option<BodySnapshot> {
        let node = self.tree.node(self.table.lookup(handle)?)?;
        let resident = node.body()?;
        Some(BodySnapshot {
            handle,
            x: node.position(),
            v: resident.velocity,
            m: node.mass(),
            accel: resident.accel,
        })
    }

    /// Every live body, in handle order.
    pub fn live_bodies(&self) -> Vec<BodySnapshot> {
        self.table.live().filter_map(|(h, _)| self.body(h)).collect()
    }

    pub fn live_count(&self) -> usize {
        self.table.live_count()
    }

    pub fn total_mass(&self) -> f64 {
        self.tree.root_node().mass()
    }

    pub fn center_of_mass(&self) -> NVec2 {
        self.tree.root_node().position()
    }

    pub fn law(&self) -> GravityLaw {
        GravityLaw {
            G: self.parameters.G,
            eps2: self.parameters.eps2,
            angle: self.engine.angle,
        }
    }

    pub fn tree(&self) -> &SpatialTree {
        &self.tree
    }

    pub fn table(&self) -> &BodyIndexTable {
        &self.table
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn stats(&self) -> StepStats {
        self.stats
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

fn is_finite(body: &Body) -> bool {
    body.x.iter().all(|c| c.is_finite()) && body.resident.velocity.iter().all(|c| c.is_finite())
}
