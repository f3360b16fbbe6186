//! Frame ordering and the running/cancelled render loop

use bevy::prelude::*;

/// Per-frame stages, run in this order. `Ingest` runs every frame so the
/// feed queue never backs up; the rest only while the loop is running.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSet {
    /// Keyboard state and viewport changes
    Input,
    /// Drain the snapshot feed
    Ingest,
    /// Bring scene nodes in line with the latest snapshot
    Reconcile,
    /// Move the camera
    Camera,
    /// Bookkeeping after the frame's scene is final
    Present,
}

impl FrameSet {
    pub const ORDER: [FrameSet; 5] = [
        FrameSet::Input,
        FrameSet::Ingest,
        FrameSet::Reconcile,
        FrameSet::Camera,
        FrameSet::Present,
    ];

    /// Whether the set is skipped while the loop is cancelled
    pub fn needs_render_loop(&self) -> bool {
        !matches!(self, FrameSet::Ingest)
    }
}

/// Whether frames are being produced, and how many have been
#[derive(Resource, Debug, Default, Clone)]
pub struct RenderLoop {
    running: bool,
    frames: u64,
}

impl RenderLoop {
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop producing frames; takes effect before the next frame
    pub fn cancel(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Frames presented since the first mount
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Run condition for the gated `FrameSet`s
pub fn render_loop_running(render_loop: Res<RenderLoop>) -> bool {
    render_loop.running
}

pub struct RenderLoopPlugin;

impl Plugin for RenderLoopPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RenderLoop>().configure_sets(
            Update,
            (
                FrameSet::Input,
                FrameSet::Ingest,
                FrameSet::Reconcile,
                FrameSet::Camera,
                FrameSet::Present,
            )
                .chain(),
        );
        for set in FrameSet::ORDER.into_iter().filter(FrameSet::needs_render_loop) {
            app.configure_sets(Update, set.run_if(render_loop_running));
        }
        app.add_systems(Update, count_frame.in_set(FrameSet::Present));
    }
}

fn count_frame(mut render_loop: ResMut<RenderLoop>) {
    render_loop.frames += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Resource, Default)]
    struct Trace(Vec<FrameSet>);

    fn record(set: FrameSet) -> impl FnMut(ResMut<Trace>) + Send + Sync + 'static {
        move |mut trace: ResMut<Trace>| trace.0.push(set)
    }

    fn test_app() -> App {
        let mut app = App::new();
        app.add_plugins(RenderLoopPlugin).init_resource::<Trace>();
        for set in FrameSet::ORDER {
            app.add_systems(Update, record(set).in_set(set));
        }
        app
    }

    #[test]
    fn test_only_ingest_runs_until_started() {
        let mut app = test_app();
        app.update();
        assert_eq!(app.world().resource::<Trace>().0, vec![FrameSet::Ingest]);
        assert_eq!(app.world().resource::<RenderLoop>().frames(), 0);
    }

    #[test]
    fn test_sets_run_in_order() {
        let mut app = test_app();
        app.world_mut().resource_mut::<RenderLoop>().start();
        app.update();
        assert_eq!(app.world().resource::<Trace>().0, FrameSet::ORDER.to_vec());
        assert_eq!(app.world().resource::<RenderLoop>().frames(), 1);
    }

    #[test]
    fn test_cancel_stops_frames() {
        let mut app = test_app();
        app.world_mut().resource_mut::<RenderLoop>().start();
        app.update();
        app.update();
        app.world_mut().resource_mut::<RenderLoop>().cancel();
        app.update();

        let render_loop = app.world().resource::<RenderLoop>();
        assert!(!render_loop.is_running());
        assert_eq!(render_loop.frames(), 2);
        let trace = &app.world().resource::<Trace>().0;
        assert_eq!(trace.len(), 11);
        assert_eq!(trace[10], FrameSet::Ingest);
    }
}
