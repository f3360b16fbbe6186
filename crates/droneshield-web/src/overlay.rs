//! Status overlay using bevy_egui

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use droneshield_core::{EntityCategory, EntityKey, WorldSnapshot};
use droneshield_scene::{
    CameraConfig, CameraMode, FeedStatus, PointerCapture, RenderLoop, SceneGraph, SceneStatus,
    SnapshotState,
};

use crate::feed::{FeedConnection, ReconnectFeed};

pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(EguiPrimaryContextPass, overlay_system);
    }
}

/// Category and index choices for the follow target, from the latest snapshot
pub fn target_choices(snapshot: Option<&WorldSnapshot>) -> Vec<EntityKey> {
    let Some(snapshot) = snapshot else {
        return Vec::new();
    };
    snapshot
        .iter()
        .filter(|(key, _)| key.category.is_agent())
        .map(|(key, _)| key)
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn overlay_system(
    mut contexts: EguiContexts,
    status: Res<FeedStatus>,
    snapshot: Res<SnapshotState>,
    graph: Res<SceneGraph>,
    render_loop: Res<RenderLoop>,
    connection: Res<FeedConnection>,
    mut camera: ResMut<CameraConfig>,
    mut capture: ResMut<PointerCapture>,
    mut reconnect: MessageWriter<ReconnectFeed>,
) {
    let Ok(ctx) = contexts.ctx_mut() else { return };

    let mut requested = *camera;
    egui::Window::new("Drone Shield")
        .anchor(egui::Align2::LEFT_TOP, [10.0, 10.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.heading("Feed");
            if status.connected {
                ui.colored_label(egui::Color32::GREEN, "Connected");
            } else {
                ui.colored_label(egui::Color32::YELLOW, "Not connected");
            }
            ui.label(egui::RichText::new(&connection.url).small());
            if let Some(err) = &status.last_error {
                ui.colored_label(egui::Color32::RED, err.as_str());
            }
            ui.label(format!(
                "Snapshots: {}  Rejected: {}",
                status.snapshots, status.rejected
            ));
            if ui.button("Reconnect").clicked() {
                reconnect.write(ReconnectFeed);
            }

            if let SceneStatus::Failed(err) = graph.status() {
                ui.separator();
                ui.colored_label(egui::Color32::RED, format!("Scene unavailable: {}", err));
            }

            ui.separator();
            ui.heading("Session");
            match snapshot.latest() {
                Some(latest) => session_summary(ui, latest),
                None => {
                    ui.label("Waiting for first snapshot");
                }
            }
            ui.label(
                egui::RichText::new(format!(
                    "{} nodes, {} trails, frame {}",
                    graph.node_count(),
                    graph.trail_count(),
                    render_loop.frames()
                ))
                .small(),
            );

            ui.separator();
            ui.heading("Camera");
            ui.horizontal(|ui| {
                for mode in [CameraMode::Orbit, CameraMode::LockedFollow] {
                    ui.selectable_value(&mut requested.mode, mode, mode.label());
                }
            });

            if requested.mode == CameraMode::LockedFollow {
                let choices = target_choices(snapshot.latest());
                egui::ComboBox::from_label("Target")
                    .selected_text(requested.target.to_string())
                    .show_ui(ui, |ui| {
                        for key in choices {
                            ui.selectable_value(&mut requested.target, key, key.to_string());
                        }
                    });
                ui.label(egui::RichText::new("W/A/S/D or arrows to pan").small());
            }
        });

    camera.set_if_neq(requested);
    capture.set_if_neq(PointerCapture(
        ctx.wants_pointer_input() || ctx.is_pointer_over_area(),
    ));
}

fn session_summary(ui: &mut egui::Ui, snapshot: &WorldSnapshot) {
    let state = match snapshot.is_active {
        Some(true) => "running",
        Some(false) => "finished",
        None => "unknown",
    };
    ui.label(format!("State: {}", state));
    if let Some(strategy) = &snapshot.strategy {
        ui.label(format!("Strategy: {}", strategy));
    }
    if let Some(formation) = &snapshot.formation {
        ui.label(format!("Formation: {}", formation));
    }

    for category in EntityCategory::ALL {
        let total = snapshot.count(category);
        let active = snapshot.active_agents(category);
        let noun = match category {
            EntityCategory::Attacker => "Attackers",
            EntityCategory::Defender => "Defenders",
            EntityCategory::ProtectedObject => "Protected",
        };
        ui.label(format!("{}: {}/{}", noun, active, total));
    }
}
