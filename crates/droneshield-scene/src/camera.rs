//! Camera controller: damped orbit and locked-follow over a tracked entity

use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use droneshield_core::{EntityKey, WorldSnapshot};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;
use std::str::FromStr;

use crate::inbox::SnapshotState;
use crate::input::InputState;
use crate::reconcile::to_vec3;
use crate::render_loop::FrameSet;
use crate::store::MainCamera;

/// Eye position when entering orbit mode; looks at the origin
pub const ORBIT_EYE: Vec3 = Vec3::new(200.0, 200.0, 200.0);

/// Eye position when entering locked-follow mode before a target is seen,
/// with the default follow height
pub const FOLLOW_EYE: Vec3 = Vec3::new(0.0, 50.0, 0.0);

/// Smallest polar angle actually used; keeps the eye off the vertical axis
const POLAR_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// Free orbit around the origin
    #[default]
    Orbit,
    /// Look straight down on the tracked entity
    #[serde(alias = "drone")]
    LockedFollow,
}

impl CameraMode {
    pub fn label(&self) -> &'static str {
        match self {
            CameraMode::Orbit => "Orbit",
            CameraMode::LockedFollow => "Drone",
        }
    }
}

impl FromStr for CameraMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "orbit" | "free" => Ok(CameraMode::Orbit),
            "drone" | "follow" | "locked" | "locked_follow" => Ok(CameraMode::LockedFollow),
            other => Err(format!("Unknown camera mode: {}", other)),
        }
    }
}

/// Requested mode and tracking target. Hosts change this resource; the
/// controller picks the change up on the next frame.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraConfig {
    pub mode: CameraMode,
    pub target: EntityKey,
}

/// Set while the overlay UI owns the pointer; pointer input is then ignored
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerCapture(pub bool);

#[derive(Resource, Debug, Clone, PartialEq)]
pub struct CameraTuning {
    /// Radians per pixel of drag
    pub rotate_sensitivity: f32,
    /// Radius multiplier per scroll step toward the pivot
    pub zoom_step: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Fraction of the pending rotation applied each frame
    pub damping: f32,
    pub follow_height: f32,
    /// World units per frame of keyboard movement
    pub follow_speed: f32,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            rotate_sensitivity: 0.005,
            zoom_step: 0.95,
            min_distance: 10.0,
            max_distance: 2000.0,
            damping: 0.05,
            follow_height: 50.0,
            follow_speed: 2.0,
        }
    }
}

/// Pointer activity gathered over one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerInput {
    /// Drag delta in pixels (only while the primary button is held)
    pub drag: Vec2,
    /// Scroll steps, positive toward the scene
    pub scroll: f32,
}

/// Spherical orbit around a pivot, Y up
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitState {
    pub pivot: Vec3,
    pub radius: f32,
    /// Angle around +Y, measured from +Z toward +X
    pub azimuth: f32,
    /// Angle down from +Y
    pub polar: f32,
    pending_azimuth: f32,
    pending_polar: f32,
}

impl OrbitState {
    pub fn from_eye(eye: Vec3, pivot: Vec3) -> Self {
        let offset = eye - pivot;
        let radius = offset.length().max(f32::EPSILON);
        Self {
            pivot,
            radius,
            azimuth: offset.x.atan2(offset.z),
            polar: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            pending_azimuth: 0.0,
            pending_polar: 0.0,
        }
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_polar, cos_polar) = self.polar.sin_cos();
        let (sin_azimuth, cos_azimuth) = self.azimuth.sin_cos();
        self.pivot
            + self.radius * Vec3::new(sin_polar * sin_azimuth, cos_polar, sin_polar * cos_azimuth)
    }

    fn apply_pointer(&mut self, pointer: PointerInput, tuning: &CameraTuning) {
        self.pending_azimuth -= pointer.drag.x * tuning.rotate_sensitivity;
        self.pending_polar -= pointer.drag.y * tuning.rotate_sensitivity;
        if pointer.scroll != 0.0 {
            self.radius = (self.radius * tuning.zoom_step.powf(pointer.scroll))
                .clamp(tuning.min_distance, tuning.max_distance);
        }
    }

    /// Apply a damped share of the pending rotation
    fn step(&mut self, tuning: &CameraTuning) {
        self.azimuth += self.pending_azimuth * tuning.damping;
        self.polar = (self.polar + self.pending_polar * tuning.damping)
            .clamp(POLAR_EPSILON, FRAC_PI_2);
        let decay = 1.0 - tuning.damping;
        self.pending_azimuth *= decay;
        self.pending_polar *= decay;
    }

    fn transform(&self) -> Transform {
        Transform::from_translation(self.eye()).looking_at(self.pivot, Vec3::Y)
    }
}

/// Tracked entity and the user's manual offset from it
#[derive(Debug, Clone, PartialEq)]
pub struct FollowState {
    pub target: EntityKey,
    pub offset: Vec3,
}

/// Owns the camera pose; the Bevy camera entity mirrors `transform()`
#[derive(Resource, Debug, Clone)]
pub struct CameraController {
    mode: CameraMode,
    orbit: OrbitState,
    follow: FollowState,
    transform: Transform,
    tuning: CameraTuning,
}

impl CameraController {
    pub fn new(config: &CameraConfig, tuning: CameraTuning) -> Self {
        let mut controller = Self {
            mode: config.mode,
            orbit: OrbitState::from_eye(ORBIT_EYE, Vec3::ZERO),
            follow: FollowState {
                target: config.target,
                offset: Vec3::ZERO,
            },
            transform: Transform::IDENTITY,
            tuning,
        };
        controller.enter_mode(config.mode);
        controller
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn target(&self) -> EntityKey {
        self.follow.target
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn orbit(&self) -> &OrbitState {
        &self.orbit
    }

    pub fn follow_offset(&self) -> Vec3 {
        self.follow.offset
    }

    /// Switch modes. The new mode starts from its initial pose; switching to
    /// the current mode does nothing.
    pub fn set_mode(&mut self, mode: CameraMode) {
        if mode != self.mode {
            self.enter_mode(mode);
        }
    }

    /// Change the tracked entity; the manual offset is kept
    pub fn set_target(&mut self, target: EntityKey) {
        self.follow.target = target;
    }

    pub fn apply_config(&mut self, config: &CameraConfig) {
        self.set_target(config.target);
        self.set_mode(config.mode);
    }

    fn enter_mode(&mut self, mode: CameraMode) {
        self.mode = mode;
        match mode {
            CameraMode::Orbit => {
                self.orbit = OrbitState::from_eye(ORBIT_EYE, Vec3::ZERO);
                self.transform = self.orbit.transform();
            }
            CameraMode::LockedFollow => {
                self.follow.offset = Vec3::ZERO;
                self.transform = overhead(Vec3::ZERO, self.tuning.follow_height);
            }
        }
    }

    /// Advance one frame. Returns the new pose, or `None` when the camera
    /// holds still because the follow target is not in the snapshot.
    pub fn update(
        &mut self,
        pointer: PointerInput,
        input: &InputState,
        snapshot: Option<&WorldSnapshot>,
    ) -> Option<Transform> {
        match self.mode {
            CameraMode::Orbit => {
                self.orbit.apply_pointer(pointer, &self.tuning);
                self.orbit.step(&self.tuning);
                self.transform = self.orbit.transform();
            }
            CameraMode::LockedFollow => {
                let target = snapshot.and_then(|s| s.get(self.follow.target))?;
                let direction = input.direction();
                if direction != Vec2::ZERO {
                    let (forward, right) = horizontal_basis(&self.transform);
                    let step = (forward * direction.y + right * direction.x).normalize_or_zero();
                    self.follow.offset += step * self.tuning.follow_speed;
                }
                let focus = to_vec3(&target.position) + self.follow.offset;
                self.transform = overhead(focus, self.tuning.follow_height);
            }
        }
        Some(self.transform)
    }
}

/// Looking straight down at `focus` from `height` above it
fn overhead(focus: Vec3, height: f32) -> Transform {
    Transform::from_translation(focus + Vec3::Y * height).looking_at(focus, Vec3::NEG_Z)
}

/// Camera forward and right flattened onto the ground plane.
/// A camera looking straight down uses its up vector as forward.
fn horizontal_basis(transform: &Transform) -> (Vec3, Vec3) {
    let flat = |v: Vec3| Vec3::new(v.x, 0.0, v.z);
    let mut forward = flat(*transform.forward());
    if forward.length_squared() < 1e-6 {
        forward = flat(*transform.up());
    }
    (
        forward.normalize_or_zero(),
        flat(*transform.right()).normalize_or_zero(),
    )
}

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraConfig>()
            .init_resource::<CameraTuning>()
            .init_resource::<PointerCapture>()
            .add_message::<MouseMotion>()
            .add_message::<MouseWheel>()
            .add_systems(Update, drive_camera.in_set(FrameSet::Camera));
    }
}

#[allow(clippy::too_many_arguments)]
fn drive_camera(
    config: Res<CameraConfig>,
    controller: Option<ResMut<CameraController>>,
    input: Res<InputState>,
    capture: Res<PointerCapture>,
    snapshot: Res<SnapshotState>,
    mouse_button: Option<Res<ButtonInput<MouseButton>>>,
    touches: Option<Res<Touches>>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut mouse_wheel: MessageReader<MouseWheel>,
    mut cameras: Query<&mut Transform, With<MainCamera>>,
) {
    let Some(mut controller) = controller else {
        return;
    };

    if config.is_changed() {
        let before = controller.mode();
        controller.apply_config(&config);
        if before != controller.mode() {
            tracing::info!("Camera mode: {}", controller.mode().label());
        }
    }

    // Always drain so stale motion does not leak into a later frame
    let motion: Vec2 = mouse_motion.read().map(|m| m.delta).sum();
    let scroll: f32 = mouse_wheel
        .read()
        .map(|wheel| match wheel.unit {
            MouseScrollUnit::Line => wheel.y,
            MouseScrollUnit::Pixel => wheel.y / 100.0,
        })
        .sum();

    let mut pointer = PointerInput::default();
    if !capture.0 {
        let dragging = mouse_button.is_some_and(|b| b.pressed(MouseButton::Left));
        if dragging {
            pointer.drag = motion;
        }
        if let Some(touches) = touches {
            if touches.iter().count() == 1 {
                pointer.drag += touches.iter().map(|t| t.delta()).sum::<Vec2>();
            }
        }
        pointer.scroll = scroll;
    }

    let moved = controller.update(pointer, &input, snapshot.latest()).is_some();
    if moved || config.is_changed() {
        if let Ok(mut transform) = cameras.single_mut() {
            *transform = controller.transform();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::message::Messages;
    use droneshield_core::EntityState;

    fn follow_controller() -> CameraController {
        CameraController::new(
            &CameraConfig {
                mode: CameraMode::LockedFollow,
                target: EntityKey::attacker(0),
            },
            CameraTuning::default(),
        )
    }

    fn snapshot_with_attacker(x: f64, y: f64, z: f64) -> WorldSnapshot {
        let mut snapshot = WorldSnapshot::default();
        snapshot.attackers.push(EntityState::at(x, y, z));
        snapshot
    }

    fn assert_close(a: Vec3, b: Vec3) {
        assert!(a.distance(b) < 1e-3, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("orbit".parse::<CameraMode>(), Ok(CameraMode::Orbit));
        assert_eq!("Drone".parse::<CameraMode>(), Ok(CameraMode::LockedFollow));
        assert!("sideways".parse::<CameraMode>().is_err());
    }

    #[test]
    fn test_mode_serde_names() {
        assert_eq!(
            serde_json::to_string(&CameraMode::LockedFollow).unwrap(),
            "\"locked_follow\""
        );
        assert_eq!(
            serde_json::from_str::<CameraMode>("\"drone\"").unwrap(),
            CameraMode::LockedFollow
        );
        assert_eq!(
            serde_json::from_str::<CameraMode>("\"orbit\"").unwrap(),
            CameraMode::Orbit
        );
    }

    #[test]
    fn test_orbit_initial_pose() {
        let controller = CameraController::new(&CameraConfig::default(), CameraTuning::default());
        let transform = controller.transform();
        assert_close(transform.translation, ORBIT_EYE);
        assert_close(*transform.forward(), -ORBIT_EYE.normalize());
    }

    #[test]
    fn test_orbit_eye_round_trips() {
        let orbit = OrbitState::from_eye(Vec3::new(30.0, 40.0, -20.0), Vec3::new(1.0, 2.0, 3.0));
        assert_close(orbit.eye(), Vec3::new(30.0, 40.0, -20.0));
    }

    #[test]
    fn test_orbit_drag_is_damped() {
        let mut controller = CameraController::new(&CameraConfig::default(), CameraTuning::default());
        let input = InputState::default();
        let start = controller.orbit().azimuth;

        let drag = PointerInput {
            drag: Vec2::new(100.0, 0.0),
            scroll: 0.0,
        };
        controller.update(drag, &input, None);
        let first = start - controller.orbit().azimuth;
        assert!((first - 100.0 * 0.005 * 0.05).abs() < 1e-5);

        // Rotation keeps easing in after the drag stops
        controller.update(PointerInput::default(), &input, None);
        let second = start - controller.orbit().azimuth;
        assert!(second > first);
        assert!(second < 100.0 * 0.005);
    }

    #[test]
    fn test_polar_stays_clamped() {
        let mut controller = CameraController::new(&CameraConfig::default(), CameraTuning::default());
        let input = InputState::default();
        let mut seed: u32 = 12345;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let dy = ((seed >> 16) % 2001) as f32 - 1000.0;
            let pointer = PointerInput {
                drag: Vec2::new(0.0, dy),
                scroll: 0.0,
            };
            controller.update(pointer, &input, None);
            let polar = controller.orbit().polar;
            assert!((0.0..=FRAC_PI_2).contains(&polar), "polar {}", polar);
            assert!(controller.transform().translation.y >= -1e-3);
        }
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut controller = CameraController::new(&CameraConfig::default(), CameraTuning::default());
        let input = InputState::default();
        let zoom_in = PointerInput {
            drag: Vec2::ZERO,
            scroll: 500.0,
        };
        controller.update(zoom_in, &input, None);
        assert_eq!(controller.orbit().radius, 10.0);

        let zoom_out = PointerInput {
            drag: Vec2::ZERO,
            scroll: -500.0,
        };
        controller.update(zoom_out, &input, None);
        assert_eq!(controller.orbit().radius, 2000.0);
    }

    #[test]
    fn test_follow_initial_pose_looks_down() {
        let controller = follow_controller();
        let transform = controller.transform();
        assert_close(transform.translation, FOLLOW_EYE);
        assert_close(*transform.forward(), Vec3::NEG_Y);
    }

    #[test]
    fn test_follow_tracks_target() {
        let mut controller = follow_controller();
        let snapshot = snapshot_with_attacker(100.0, 20.0, -40.0);
        let transform = controller
            .update(PointerInput::default(), &InputState::default(), Some(&snapshot))
            .unwrap();
        assert_close(transform.translation, Vec3::new(100.0, 70.0, -40.0));
        assert_close(*transform.forward(), Vec3::NEG_Y);
    }

    #[test]
    fn test_follow_keyboard_offset() {
        let mut controller = follow_controller();
        let snapshot = snapshot_with_attacker(0.0, 0.0, 0.0);
        let mut input = InputState::default();

        input.press(KeyCode::KeyW);
        controller.update(PointerInput::default(), &input, Some(&snapshot));
        assert_close(controller.follow_offset(), Vec3::new(0.0, 0.0, -2.0));

        input.release(KeyCode::KeyW);
        input.press(KeyCode::ArrowRight);
        controller.update(PointerInput::default(), &input, Some(&snapshot));
        assert_close(controller.follow_offset(), Vec3::new(2.0, 0.0, -2.0));
        assert_close(controller.transform().translation, Vec3::new(2.0, 50.0, -2.0));
    }

    #[test]
    fn test_follow_holds_when_target_missing() {
        let mut controller = follow_controller();
        let snapshot = snapshot_with_attacker(10.0, 0.0, 10.0);
        controller.update(PointerInput::default(), &InputState::default(), Some(&snapshot));
        let before = controller.transform();

        controller.set_target(EntityKey::defender(3));
        let held = controller.update(PointerInput::default(), &InputState::default(), Some(&snapshot));
        assert!(held.is_none());
        assert_eq!(controller.transform(), before);

        assert!(controller
            .update(PointerInput::default(), &InputState::default(), None)
            .is_none());
    }

    #[test]
    fn test_mode_switch_resets_pose() {
        let mut controller = follow_controller();
        let snapshot = snapshot_with_attacker(10.0, 0.0, 10.0);
        let mut input = InputState::default();
        input.press(KeyCode::KeyD);
        controller.update(PointerInput::default(), &input, Some(&snapshot));

        controller.set_mode(CameraMode::Orbit);
        assert_close(controller.transform().translation, ORBIT_EYE);

        controller.set_mode(CameraMode::LockedFollow);
        assert_eq!(controller.follow_offset(), Vec3::ZERO);
        assert_close(controller.transform().translation, FOLLOW_EYE);
    }

    fn orbit_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .init_resource::<Assets<Mesh>>()
            .init_resource::<Assets<StandardMaterial>>()
            .add_plugins(crate::DroneShieldScenePlugin);
        let mut buttons = ButtonInput::<MouseButton>::default();
        buttons.press(MouseButton::Left);
        app.insert_resource(buttons);
        app.update();
        app
    }

    fn drag_and_scroll(app: &mut App) {
        let world = app.world_mut();
        world
            .resource_mut::<Messages<MouseMotion>>()
            .write(MouseMotion {
                delta: Vec2::new(80.0, 40.0),
            });
        world.resource_mut::<Messages<MouseWheel>>().write(MouseWheel {
            unit: MouseScrollUnit::Line,
            x: 0.0,
            y: 3.0,
            window: Entity::PLACEHOLDER,
        });
        app.update();
    }

    fn orbit_pose(app: &App) -> (f32, f32, f32) {
        let orbit = app.world().resource::<CameraController>().orbit();
        (orbit.azimuth, orbit.polar, orbit.radius)
    }

    #[test]
    fn test_captured_pointer_leaves_orbit_alone() {
        let mut app = orbit_app();
        let before = orbit_pose(&app);

        app.insert_resource(PointerCapture(true));
        drag_and_scroll(&mut app);
        assert_eq!(orbit_pose(&app), before);

        // Input swallowed while captured does not replay once released
        app.insert_resource(PointerCapture(false));
        app.update();
        assert_eq!(orbit_pose(&app), before);
    }

    #[test]
    fn test_free_pointer_drives_orbit() {
        let mut app = orbit_app();
        let (azimuth, polar, radius) = orbit_pose(&app);

        drag_and_scroll(&mut app);
        let after = orbit_pose(&app);
        assert!(after.0 < azimuth);
        assert!(after.1 < polar);
        assert!(after.2 < radius);
    }

    #[test]
    fn test_target_change_keeps_offset() {
        let mut controller = follow_controller();
        let mut snapshot = snapshot_with_attacker(0.0, 0.0, 0.0);
        snapshot.defenders.push(EntityState::at(50.0, 0.0, 50.0));
        let mut input = InputState::default();
        input.press(KeyCode::KeyA);
        controller.update(PointerInput::default(), &input, Some(&snapshot));

        controller.apply_config(&CameraConfig {
            mode: CameraMode::LockedFollow,
            target: EntityKey::defender(0),
        });
        controller.update(PointerInput::default(), &InputState::default(), Some(&snapshot));
        assert_close(controller.transform().translation, Vec3::new(48.0, 50.0, 50.0));
    }
}
