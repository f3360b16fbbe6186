//! Scene store: owns every node the viewer puts into the world
//!
//! Three kinds of nodes exist. Scenery (grids, axes, light) and the camera
//! are created at mount and live until teardown. Entity nodes (one box plus
//! an optional trail and heading arrow per snapshot entity) are created and
//! destroyed by reconciliation.

use bevy::ecs::message::Messages;
use bevy::prelude::*;
use droneshield_core::EntityKey;
use std::collections::HashMap;
use thiserror::Error;

use crate::camera::{CameraConfig, CameraController, CameraTuning};
use crate::geometry::{
    axis_mesh, grid_plane_mesh, line_material, GridPlane, AXIS_LENGTH, GRID_COLOR,
    GRID_DIVISIONS, GRID_SIZE,
};
use crate::input::InputState;
use crate::reconcile::{NodeBlueprint, ReconcilePlan};
use crate::render_loop::RenderLoop;
use crate::resize::aspect_ratio;

/// Viewport assumed when no window reports a size
pub const DEFAULT_VIEWPORT: Vec2 = Vec2::new(1280.0, 720.0);

pub const FIELD_OF_VIEW_DEGREES: f32 = 75.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 3000.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("Render surface unavailable: no {0} storage")]
    SurfaceUnavailable(&'static str),
}

/// Marker for the viewer camera
#[derive(Component)]
pub struct MainCamera;

/// Box representing one snapshot entity
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityNode {
    pub key: EntityKey,
}

/// Trail line belonging to one snapshot entity
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailNode {
    pub key: EntityKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneryKind {
    Grid(GridPlane),
    Axis,
    Light,
}

/// Heading arrow belonging to one snapshot agent
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrowNode {
    pub key: EntityKey,
}

/// Reference geometry and lighting; never touched by reconciliation
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneryNode {
    pub kind: SceneryKind,
}

/// The world entities making up one entity node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityNodeRecord {
    pub body: Entity,
    pub trail: Option<Entity>,
    pub arrow: Option<Entity>,
}

impl EntityNodeRecord {
    fn despawn(&self, commands: &mut Commands) {
        for entity in self.entities() {
            commands.entity(entity).despawn();
        }
    }

    fn entities(&self) -> impl Iterator<Item = Entity> {
        std::iter::once(self.body).chain(self.trail).chain(self.arrow)
    }
}

/// Current mount state of the view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SceneStatus {
    #[default]
    Unmounted,
    Mounted,
    Failed(SceneError),
}

/// Identifies one mount of the view; a new handle is issued per mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneHandle(pub u32);

/// Bookkeeping for everything the view owns
#[derive(Resource, Debug, Default)]
pub struct SceneGraph {
    status: SceneStatus,
    generation: u32,
    nodes: HashMap<EntityKey, EntityNodeRecord>,
    scenery: Vec<Entity>,
    camera: Option<Entity>,
    viewport: Vec2,
}

impl SceneGraph {
    pub fn status(&self) -> &SceneStatus {
        &self.status
    }

    pub fn is_mounted(&self) -> bool {
        self.status == SceneStatus::Mounted
    }

    pub fn handle(&self) -> Option<SceneHandle> {
        self.is_mounted().then_some(SceneHandle(self.generation))
    }

    pub fn displayed_keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.nodes.keys()
    }

    pub fn node(&self, key: EntityKey) -> Option<&EntityNodeRecord> {
        self.nodes.get(&key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn trail_count(&self) -> usize {
        self.nodes.values().filter(|n| n.trail.is_some()).count()
    }

    pub fn arrow_count(&self) -> usize {
        self.nodes.values().filter(|n| n.arrow.is_some()).count()
    }

    pub fn scenery(&self) -> &[Entity] {
        &self.scenery
    }

    pub fn camera(&self) -> Option<Entity> {
        self.camera
    }

    /// Output surface size in logical pixels
    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub(crate) fn set_viewport(&mut self, size: Vec2) {
        self.viewport = size;
    }

    /// Every world entity owned by the view
    fn owned_entities(&self) -> Vec<Entity> {
        self.nodes
            .values()
            .flat_map(EntityNodeRecord::entities)
            .chain(self.scenery.iter().copied())
            .chain(self.camera)
            .collect()
    }
}

/// Shared geometry reused by every entity node
#[derive(Resource, Debug, Clone)]
pub struct SceneAssets {
    pub unit_cube: Handle<Mesh>,
}

/// Counts from one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub removed: usize,
    pub replaced: usize,
    pub added: usize,
    pub trails: usize,
}

/// Mount the view: scenery, camera and an empty entity set.
///
/// Mounting while already mounted tears the previous view down first.
pub fn initialize(world: &mut World, viewport: Vec2) -> Result<SceneHandle, SceneError> {
    if world.resource::<SceneGraph>().is_mounted() {
        tracing::info!("Scene already mounted; tearing down before remount");
        teardown(world);
    }

    if !world.contains_resource::<Assets<Mesh>>() {
        return Err(fail(world, SceneError::SurfaceUnavailable("mesh")));
    }
    if !world.contains_resource::<Assets<StandardMaterial>>() {
        return Err(fail(world, SceneError::SurfaceUnavailable("material")));
    }

    let viewport = viewport.max(Vec2::ONE);
    let config = world.get_resource::<CameraConfig>().copied().unwrap_or_default();
    let tuning = world.get_resource::<CameraTuning>().cloned().unwrap_or_default();
    let controller = CameraController::new(&config, tuning);

    let unit_cube = world
        .resource_mut::<Assets<Mesh>>()
        .add(Cuboid::new(1.0, 1.0, 1.0));
    let scenery = spawn_scenery(world);
    let camera = world
        .spawn((
            Camera3d::default(),
            Projection::Perspective(PerspectiveProjection {
                fov: FIELD_OF_VIEW_DEGREES.to_radians(),
                near: NEAR_PLANE,
                far: FAR_PLANE,
                aspect_ratio: aspect_ratio(viewport),
                ..default()
            }),
            controller.transform(),
            MainCamera,
        ))
        .id();

    world.insert_resource(SceneAssets { unit_cube });
    world.insert_resource(controller);
    if let Some(mut input) = world.get_resource_mut::<InputState>() {
        input.clear();
    }
    world.resource_mut::<RenderLoop>().start();

    let mut graph = world.resource_mut::<SceneGraph>();
    graph.generation += 1;
    graph.status = SceneStatus::Mounted;
    graph.scenery = scenery;
    graph.camera = Some(camera);
    graph.viewport = viewport;

    let handle = SceneHandle(graph.generation);
    tracing::info!(
        "Scene mounted ({}x{}, {} scenery nodes)",
        viewport.x,
        viewport.y,
        graph.scenery.len()
    );
    Ok(handle)
}

/// Unmount the view and release everything it owns. Does nothing when not mounted.
pub fn teardown(world: &mut World) {
    if !world.resource::<SceneGraph>().is_mounted() {
        return;
    }

    world.resource_mut::<RenderLoop>().cancel();
    if let Some(mut input) = world.get_resource_mut::<InputState>() {
        input.clear();
    }

    let owned = world.resource::<SceneGraph>().owned_entities();
    for entity in &owned {
        if let Ok(entity) = world.get_entity_mut(*entity) {
            entity.despawn();
        }
    }
    world.remove_resource::<SceneAssets>();
    world.remove_resource::<CameraController>();

    let mut graph = world.resource_mut::<SceneGraph>();
    graph.nodes.clear();
    graph.scenery.clear();
    graph.camera = None;
    graph.status = SceneStatus::Unmounted;
    tracing::info!("Scene torn down ({} entities released)", owned.len());
}

fn fail(world: &mut World, err: SceneError) -> SceneError {
    tracing::error!("Failed to mount scene: {}", err);
    world.resource_mut::<SceneGraph>().status = SceneStatus::Failed(err.clone());
    err
}

fn spawn_scenery(world: &mut World) -> Vec<Entity> {
    let mut scenery = Vec::new();

    let grid_material = world
        .resource_mut::<Assets<StandardMaterial>>()
        .add(line_material(GRID_COLOR));
    for plane in GridPlane::ALL {
        let mesh = world
            .resource_mut::<Assets<Mesh>>()
            .add(grid_plane_mesh(GRID_SIZE, GRID_DIVISIONS, plane));
        let id = world
            .spawn((
                Mesh3d(mesh),
                MeshMaterial3d(grid_material.clone()),
                Transform::IDENTITY,
                SceneryNode {
                    kind: SceneryKind::Grid(plane),
                },
            ))
            .id();
        scenery.push(id);
    }

    let axes = [
        (Vec3::X, Color::srgb(1.0, 0.0, 0.0)),
        (Vec3::Y, Color::srgb(0.0, 1.0, 0.0)),
        (Vec3::Z, Color::srgb(0.0, 0.0, 1.0)),
    ];
    for (axis, color) in axes {
        let mesh = world
            .resource_mut::<Assets<Mesh>>()
            .add(axis_mesh(axis, AXIS_LENGTH));
        let material = world
            .resource_mut::<Assets<StandardMaterial>>()
            .add(line_material(color));
        let id = world
            .spawn((
                Mesh3d(mesh),
                MeshMaterial3d(material),
                Transform::IDENTITY,
                SceneryNode {
                    kind: SceneryKind::Axis,
                },
            ))
            .id();
        scenery.push(id);
    }

    let light = world
        .spawn((
            DirectionalLight {
                illuminance: 10_000.0,
                ..default()
            },
            Transform::from_xyz(100.0, 200.0, 100.0).looking_at(Vec3::ZERO, Vec3::Y),
            SceneryNode {
                kind: SceneryKind::Light,
            },
        ))
        .id();
    scenery.push(light);

    scenery
}

/// Execute a reconciliation plan.
///
/// Stale nodes and nodes about to be replaced are despawned before any new
/// node is spawned, so a key never has two live nodes.
pub fn apply_reconciliation(
    commands: &mut Commands,
    graph: &mut SceneGraph,
    assets: &SceneAssets,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    plan: ReconcilePlan,
) -> ReconcileStats {
    let mut stats = ReconcileStats::default();

    for key in &plan.to_remove {
        if let Some(record) = graph.nodes.remove(key) {
            record.despawn(commands);
            stats.removed += 1;
        }
    }
    for blueprint in &plan.to_add {
        if let Some(record) = graph.nodes.remove(&blueprint.key) {
            record.despawn(commands);
            stats.replaced += 1;
        }
    }

    for blueprint in plan.to_add {
        let record = spawn_entity_node(commands, assets, meshes, materials, &blueprint);
        if record.trail.is_some() {
            stats.trails += 1;
        }
        graph.nodes.insert(blueprint.key, record);
        stats.added += 1;
    }
    stats.added -= stats.replaced;

    stats
}

fn spawn_entity_node(
    commands: &mut Commands,
    assets: &SceneAssets,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    blueprint: &NodeBlueprint,
) -> EntityNodeRecord {
    let body = commands
        .spawn((
            Mesh3d(assets.unit_cube.clone()),
            MeshMaterial3d(materials.add(blueprint.body.material())),
            blueprint.body.transform,
            EntityNode { key: blueprint.key },
        ))
        .id();

    let trail = blueprint.trail.as_ref().map(|trail| {
        commands
            .spawn((
                Mesh3d(meshes.add(trail.mesh())),
                MeshMaterial3d(materials.add(trail.material())),
                Transform::IDENTITY,
                TrailNode { key: blueprint.key },
            ))
            .id()
    });

    let arrow = blueprint.arrow.as_ref().map(|arrow| {
        commands
            .spawn((
                Mesh3d(meshes.add(arrow.mesh())),
                MeshMaterial3d(materials.add(arrow.material())),
                Transform::IDENTITY,
                ArrowNode { key: blueprint.key },
            ))
            .id()
    });

    EntityNodeRecord { body, trail, arrow }
}

pub struct StorePlugin;

impl Plugin for StorePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneGraph>()
            .add_systems(Startup, mount_view)
            .add_systems(Last, unmount_on_exit);
    }
}

fn mount_view(world: &mut World) {
    let viewport = world
        .query::<&Window>()
        .iter(world)
        .next()
        .map(|window| Vec2::new(window.width(), window.height()))
        .unwrap_or(DEFAULT_VIEWPORT);

    // Failures are recorded in SceneGraph::status for the overlay
    if let Ok(handle) = initialize(world, viewport) {
        tracing::debug!("Mounted scene {:?}", handle);
    }
}

fn unmount_on_exit(world: &mut World) {
    let exiting = world
        .get_resource::<Messages<AppExit>>()
        .is_some_and(|exits| !exits.is_empty());
    if exiting {
        teardown(world);
    }
}
