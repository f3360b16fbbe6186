//! Bevy application setup

use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use bevy_picking::{prelude::MeshPickingPlugin, DefaultPickingPlugins};
use droneshield_scene::DroneShieldScenePlugin;

use crate::config::ViewerConfig;
use crate::feed::FeedPlugin;
use crate::overlay::OverlayPlugin;

/// Canvas the viewer renders into
pub const CANVAS_SELECTOR: &str = "#droneshield-canvas";

/// Run the Bevy application
pub fn run() {
    let config = ViewerConfig::from_browser();
    tracing::info!(
        "Starting viewer: feed {}, camera {} on {}",
        config.feed_url,
        config.camera.mode.label(),
        config.camera.target
    );

    App::new()
        .insert_resource(ClearColor(Color::BLACK))
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Drone Shield".to_string(),
                canvas: Some(CANVAS_SELECTOR.to_string()),
                fit_canvas_to_parent: true,
                prevent_default_event_handling: false,
                ..default()
            }),
            ..default()
        }))
        // These must be added BEFORE EguiPlugin so it can detect PickingPlugin
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(MeshPickingPlugin)
        .add_plugins(EguiPlugin::default())
        // Camera starts in the mode and on the target the page asked for
        .insert_resource(config.camera)
        .insert_resource(config)
        .add_plugins(DroneShieldScenePlugin)
        .add_plugins(FeedPlugin)
        .add_plugins(OverlayPlugin)
        .run();
}
