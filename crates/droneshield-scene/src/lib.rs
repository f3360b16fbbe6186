//! Drone Shield Scene - 3D view of the simulation
//!
//! Keeps a Bevy world in step with the latest world snapshot: one box per
//! entity, an arced trail and heading arrow for entities with enough
//! history, static reference geometry, and a camera that either orbits
//! the origin or follows one entity from above. The browser front end
//! (droneshield-web) adds the feed client and overlay on top of this plugin.

pub mod camera;
pub mod geometry;
pub mod inbox;
pub mod input;
pub mod reconcile;
pub mod render_loop;
pub mod resize;
pub mod store;

use bevy::prelude::*;

/// Plugin that sets up the scene, its frame loop and the camera
pub struct DroneShieldScenePlugin;

impl Plugin for DroneShieldScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(render_loop::RenderLoopPlugin)
            .add_plugins(store::StorePlugin)
            .add_plugins(input::KeyboardStatePlugin)
            .add_plugins(inbox::InboxPlugin)
            .add_plugins(reconcile::ReconcilePlugin)
            .add_plugins(camera::CameraPlugin)
            .add_plugins(resize::ResizePlugin);
    }
}

// Re-export commonly used types
pub use camera::{CameraConfig, CameraController, CameraMode, CameraTuning, PointerCapture};
pub use inbox::{FeedEvent, FeedStatus, SnapshotInbox, SnapshotState};
pub use reconcile::{reconcile, NodeBlueprint, ReconcilePlan};
pub use render_loop::{FrameSet, RenderLoop};
pub use store::{
    initialize, teardown, ArrowNode, EntityNode, MainCamera, SceneError, SceneGraph,
    SceneHandle, SceneStatus, SceneryNode, TrailNode,
};
