use bevy::log::LogPlugin;
use bevy::math::primitives::Circle;
use bevy::prelude::*;
use bevy::sprite::{MaterialMesh2dBundle, Mesh2dHandle};
use bevy::window::WindowResolution;

use crate::simulation::scenario::Scenario;
use crate::simulation::states::{BodyHandle, NVec2};
use crate::visualization::snapshot::{Renderer, Snapshot, SnapshotNode};

#[derive(Component)]
struct BodyMarker(pub BodyHandle);

const BODY_RADIUS: f32 = 1.5; // pixels, for the lightest stars

pub fn run_2d(scenario: Scenario) {
    ::log::info!(
        "run_2d: starting Bevy 2D viewer with {} bodies",
        scenario.simulation.live_count()
    );

    let viewport = *scenario.simulation.viewport();
    let window = Window {
        title: "bhquad".into(),
        resolution: WindowResolution::new(viewport.width as f32, viewport.height as f32),
        ..default()
    };

    App::new()
        .insert_resource(scenario)
        // the binary already installed a logger
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(window),
                    ..default()
                })
                .disable::<LogPlugin>(),
        )
        .add_systems(Startup, setup_bodies_system)
        .add_systems(Update, (physics_step_system, sync_transforms_system, draw_tree_system).chain())
        .run();
}

fn setup_bodies_system(mut commands: Commands, scenario: Res<Scenario>, mut meshes: ResMut<Assets<Mesh>>, mut materials: ResMut<Assets<ColorMaterial>>) {
    // 2D camera
    commands.spawn(Camera2dBundle::default());

    let viewport = scenario.simulation.viewport();
    let material = materials.add(ColorMaterial::from(Color::WHITE));

    for body in scenario.simulation.live_bodies() {
        // heavy cores stand out, light stars stay dots
        let radius_screen = BODY_RADIUS * (1.0 + 0.5 * body.m.log10().max(0.0) as f32);
        let p = screen(viewport.to_screen(body.x));

        commands.spawn((
            MaterialMesh2dBundle {
                mesh: Mesh2dHandle(meshes.add(Circle::new(radius_screen))),
                material: material.clone(),
                transform: Transform::from_xyz(p.x, p.y, 0.0),
                ..Default::default()
            },
            BodyMarker(body.handle),
        ));
    }
}

fn physics_step_system(mut scenario: ResMut<Scenario>) {
    let Scenario {
        simulation,
        steps_per_frame,
        ..
    } = &mut *scenario;

    for _ in 0..*steps_per_frame {
        simulation.step();
    }
}

fn sync_transforms_system(mut commands: Commands, scenario: Res<Scenario>, mut query: Query<(Entity, &BodyMarker, &mut Transform)>) {
    let viewport = scenario.simulation.viewport();
    for (entity, BodyMarker(handle), mut transform) in &mut query {
        match scenario.simulation.body(*handle) {
            Some(b) => {
                let p = screen(viewport.to_screen(b.x));
                transform.translation.x = p.x;
                transform.translation.y = p.y;
            }
            // departed
            None => commands.entity(entity).despawn(),
        }
    }
}

fn draw_tree_system(scenario: Res<Scenario>, mut gizmos: Gizmos) {
    let config = scenario.snapshot;
    if !(config.show_quad || config.debug) {
        return;
    }

    let snapshot = Snapshot::capture(&scenario.simulation, &config);
    let mut renderer = GizmoRenderer { gizmos: &mut gizmos };
    snapshot.render(&mut renderer, scenario.simulation.viewport());
}

/// Draws outlines and aggregates with gizmos, bodies are meshes already.
struct GizmoRenderer<'a, 'w, 's> {
    gizmos: &'a mut Gizmos<'w, 's>,
}

impl Renderer for GizmoRenderer<'_, '_, '_> {
    fn quad(&mut self, ll: NVec2, ur: NVec2, depth: u32) {
        let alpha = 0.8 / (1.0 + 0.2 * depth as f32);
        let color = Color::srgba(0.3, 0.8, 0.4, alpha);
        let (a, c) = (screen(ll), screen(ur));
        let (b, d) = (Vec2::new(c.x, a.y), Vec2::new(a.x, c.y));

        self.gizmos.line_2d(a, b, color);
        self.gizmos.line_2d(b, c, color);
        self.gizmos.line_2d(c, d, color);
        self.gizmos.line_2d(d, a, color);
    }

    fn node(&mut self, at: NVec2, node: &SnapshotNode) {
        if !node.is_leaf {
            self.gizmos.circle_2d(screen(at), 3.0, Color::srgb(1.0, 0.35, 0.3));
        }
    }
}

fn screen(p: NVec2) -> Vec2 {
    Vec2::new(p.x as f32, p.y as f32)
}
