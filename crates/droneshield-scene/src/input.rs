//! Held-key tracking for camera movement

use bevy::input::keyboard::KeyboardInput;
use bevy::input::ButtonState;
use bevy::prelude::*;
use std::collections::HashMap;

use crate::render_loop::FrameSet;

/// Which keys are currently held. Cleared on mount and teardown.
#[derive(Resource, Debug, Default, Clone)]
pub struct InputState {
    held: HashMap<KeyCode, bool>,
}

impl InputState {
    pub fn press(&mut self, key: KeyCode) {
        self.held.insert(key, true);
    }

    pub fn release(&mut self, key: KeyCode) {
        self.held.insert(key, false);
    }

    pub fn is_held(&self, key: KeyCode) -> bool {
        self.held.get(&key).copied().unwrap_or(false)
    }

    fn any_held(&self, keys: &[KeyCode]) -> bool {
        keys.iter().any(|key| self.is_held(*key))
    }

    /// Requested movement: `x` is right, `y` is forward, each in -1..=1
    pub fn direction(&self) -> Vec2 {
        let axis = |positive: &[KeyCode], negative: &[KeyCode]| {
            self.any_held(positive) as i8 as f32 - self.any_held(negative) as i8 as f32
        };
        Vec2::new(
            axis(
                &[KeyCode::KeyD, KeyCode::ArrowRight],
                &[KeyCode::KeyA, KeyCode::ArrowLeft],
            ),
            axis(
                &[KeyCode::KeyW, KeyCode::ArrowUp],
                &[KeyCode::KeyS, KeyCode::ArrowDown],
            ),
        )
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }
}

pub struct KeyboardStatePlugin;

impl Plugin for KeyboardStatePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InputState>()
            .add_message::<KeyboardInput>()
            .add_systems(Update, record_keyboard.in_set(FrameSet::Input));
    }
}

fn record_keyboard(mut keys: MessageReader<KeyboardInput>, mut input: ResMut<InputState>) {
    for event in keys.read() {
        match event.state {
            ButtonState::Pressed => input.press(event.key_code),
            ButtonState::Released => input.release(event.key_code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_held_keys() {
        let mut input = InputState::default();
        assert_eq!(input.direction(), Vec2::ZERO);

        input.press(KeyCode::KeyW);
        assert_eq!(input.direction(), Vec2::new(0.0, 1.0));

        input.press(KeyCode::ArrowLeft);
        assert_eq!(input.direction(), Vec2::new(-1.0, 1.0));

        input.release(KeyCode::KeyW);
        input.press(KeyCode::KeyS);
        assert_eq!(input.direction(), Vec2::new(-1.0, -1.0));
    }

    #[test]
    fn test_opposing_keys_cancel() {
        let mut input = InputState::default();
        input.press(KeyCode::KeyA);
        input.press(KeyCode::KeyD);
        assert_eq!(input.direction().x, 0.0);
    }

    #[test]
    fn test_unrelated_keys_ignored_and_clear() {
        let mut input = InputState::default();
        input.press(KeyCode::Space);
        assert!(input.is_held(KeyCode::Space));
        assert_eq!(input.direction(), Vec2::ZERO);

        input.press(KeyCode::ArrowUp);
        input.clear();
        assert!(!input.is_held(KeyCode::ArrowUp));
    }
}
