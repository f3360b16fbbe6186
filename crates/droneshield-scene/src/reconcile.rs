//! Reconciliation of the displayed entity set against the latest snapshot
//!
//! `reconcile` is pure: given which keys are currently on screen and the
//! newest snapshot, it produces a plan. `apply_latest_snapshot` executes the
//! plan through `Commands`.

use bevy::prelude::*;
use droneshield_core::{color, EntityKey, EntityState, Position, WorldSnapshot};
use std::collections::HashSet;

use crate::geometry::{
    direction_arrow, entity_mesh, trail_line, ArrowVisual, EntityVisual, TrailVisual,
};
use crate::inbox::SnapshotState;
use crate::render_loop::FrameSet;
use crate::store::{self, SceneAssets, SceneGraph};

/// Brightness kept by disabled agents and destroyed assets
pub const INACTIVE_SHADE: f32 = 0.35;

/// Everything needed to (re)create one entity's visuals
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBlueprint {
    pub key: EntityKey,
    pub body: EntityVisual,
    pub trail: Option<TrailVisual>,
    /// Heading arrow; agents only
    pub arrow: Option<ArrowVisual>,
}

impl NodeBlueprint {
    pub fn from_state(key: EntityKey, state: &EntityState) -> Self {
        let color = entity_color(key, state);
        let position = to_vec3(&state.position);
        let body = entity_mesh(
            position,
            state.effective_size() as f32,
            Some(color),
        );
        let trail = if state.has_trail() {
            let path: Vec<Vec3> = state.trail_path().iter().map(to_vec3).collect();
            trail_line(&path, color)
        } else {
            None
        };
        let arrow = if key.category.is_agent() {
            let history: Vec<Vec3> = state.history.iter().take(2).map(to_vec3).collect();
            direction_arrow(&history, position)
        } else {
            None
        };
        Self {
            key,
            body,
            trail,
            arrow,
        }
    }
}

/// Changes that bring the display in line with a snapshot.
///
/// `to_remove` lists keys that are on screen but absent from the snapshot.
/// `to_add` has one blueprint for every entity in the snapshot; a blueprint
/// whose key is already displayed replaces the existing node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub to_remove: Vec<EntityKey>,
    pub to_add: Vec<NodeBlueprint>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    pub fn trail_count(&self) -> usize {
        self.to_add.iter().filter(|b| b.trail.is_some()).count()
    }

    pub fn arrow_count(&self) -> usize {
        self.to_add.iter().filter(|b| b.arrow.is_some()).count()
    }
}

/// Plan the changes from `displayed` to `snapshot`
pub fn reconcile<'a>(
    displayed: impl IntoIterator<Item = &'a EntityKey>,
    snapshot: &WorldSnapshot,
) -> ReconcilePlan {
    let present: HashSet<EntityKey> = snapshot.iter().map(|(key, _)| key).collect();

    let mut to_remove: Vec<EntityKey> = displayed
        .into_iter()
        .filter(|key| !present.contains(key))
        .copied()
        .collect();
    to_remove.sort();

    let to_add = snapshot
        .iter()
        .map(|(key, state)| NodeBlueprint::from_state(key, state))
        .collect();

    ReconcilePlan { to_remove, to_add }
}

/// Snapshot color, falling back to the category color, dimmed when inactive
pub fn entity_color(key: EntityKey, state: &EntityState) -> Color {
    let mut rgb = state
        .color
        .as_deref()
        .and_then(color::parse_color)
        .unwrap_or_else(|| key.category.default_color());
    if state.is_inactive() {
        rgb = color::dim(rgb, INACTIVE_SHADE);
    }
    Color::srgb(rgb[0], rgb[1], rgb[2])
}

pub fn to_vec3(position: &Position) -> Vec3 {
    Vec3::new(position.x as f32, position.y as f32, position.z as f32)
}

pub struct ReconcilePlugin;

impl Plugin for ReconcilePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, apply_latest_snapshot.in_set(FrameSet::Reconcile));
    }
}

/// Apply the newest unapplied snapshot, if any
fn apply_latest_snapshot(
    mut commands: Commands,
    mut state: ResMut<SnapshotState>,
    mut graph: ResMut<SceneGraph>,
    assets: Option<Res<SceneAssets>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if !state.has_pending() {
        return;
    }
    let (Some(snapshot), Some(assets)) = (state.latest(), assets) else {
        return;
    };

    let plan = reconcile(graph.displayed_keys(), snapshot);
    let stats = store::apply_reconciliation(
        &mut commands,
        &mut graph,
        &assets,
        &mut meshes,
        &mut materials,
        plan,
    );
    state.mark_applied();

    tracing::debug!(
        "Reconciled snapshot: {} removed, {} replaced, {} added, {} trails",
        stats.removed, stats.replaced, stats.added, stats.trails
    );
}
