//! Keeps the projection and output surface in step with the window size

use bevy::prelude::*;
use bevy::window::WindowResized;

use crate::render_loop::FrameSet;
use crate::store::{MainCamera, SceneGraph};

/// Width over height, with both clamped to at least one pixel
pub fn aspect_ratio(size: Vec2) -> f32 {
    size.x.max(1.0) / size.y.max(1.0)
}

pub struct ResizePlugin;

impl Plugin for ResizePlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<WindowResized>()
            .add_systems(Update, handle_resize.in_set(FrameSet::Input));
    }
}

fn handle_resize(
    mut resized: MessageReader<WindowResized>,
    mut graph: ResMut<SceneGraph>,
    mut cameras: Query<&mut Projection, With<MainCamera>>,
) {
    // Only the final size of a burst matters
    let Some(last) = resized.read().last() else {
        return;
    };
    let size = Vec2::new(last.width, last.height);
    graph.set_viewport(size.max(Vec2::ONE));

    for mut projection in &mut cameras {
        if let Projection::Perspective(perspective) = &mut *projection {
            perspective.aspect_ratio = aspect_ratio(size);
        }
    }
    tracing::debug!("Viewport resized to {}x{}", size.x, size.y);
}
