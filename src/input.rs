use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::context::{Action, LIFT_STEP};
use crate::graphics::DrawMode;

/// Browser-style pixels per scroll wheel line.
pub const PIXELS_PER_LINE: f32 = 100.0;

/// Turns window events into [`Action`]s.
///
/// Keys act on press (and on auto-repeat for the camera lift keys). Dragging
/// with the left button rotates the scene; the drag ends when the button is
/// released or the cursor leaves the window.
#[derive(Default)]
pub struct Input {
    keys_down: HashSet<KeyCode>,
    dragging: bool,
    mouse_position: Option<Vec2>,
    actions: Vec<Action>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a window event and queue the actions it produces.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => self.key_pressed(key),
                        ElementState::Released => self.key_released(key),
                    }
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.set_dragging(*state == ElementState::Pressed),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(Vec2::new(position.x as f32, position.y as f32))
            }
            WindowEvent::CursorLeft { .. } => self.set_dragging(false),
            WindowEvent::MouseWheel { delta, .. } => self.scrolled(*delta),
            WindowEvent::Focused(false) => self.keys_down.clear(),
            _ => {}
        }
    }

    /// Drains the actions queued since the last call.
    pub fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    /// Returns true if the key is currently held down.
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Returns true while a scene drag is in progress.
    pub fn dragging(&self) -> bool {
        self.dragging
    }

    fn key_pressed(&mut self, key: KeyCode) {
        let repeat = !self.keys_down.insert(key);
        if let Some(action) = key_action(key) {
            if !repeat || matches!(action, Action::LiftCamera(_)) {
                self.actions.push(action);
            }
        }
    }

    fn key_released(&mut self, key: KeyCode) {
        self.keys_down.remove(&key);
    }

    fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    fn cursor_moved(&mut self, position: Vec2) {
        if self.dragging {
            if let Some(last) = self.mouse_position {
                let delta = position - last;
                if delta != Vec2::ZERO {
                    self.actions.push(Action::RotateScene {
                        dx: delta.x,
                        dy: delta.y,
                    });
                }
            }
        }
        self.mouse_position = Some(position);
    }

    fn scrolled(&mut self, delta: MouseScrollDelta) {
        let pixels = scroll_pixels(delta);
        if pixels != Vec2::ZERO {
            self.actions.push(Action::PanCamera {
                dx: pixels.x,
                dy: pixels.y,
            });
        }
    }
}

/// The action bound to a key, if any.
pub fn key_action(key: KeyCode) -> Option<Action> {
    let action = match key {
        KeyCode::KeyL => Action::ToggleLight,
        KeyCode::KeyA => Action::ToggleTexture,
        KeyCode::KeyW => Action::SetDrawMode(DrawMode::Lines),
        KeyCode::KeyT => Action::SetDrawMode(DrawMode::Triangles),
        KeyCode::KeyP => Action::SetDrawMode(DrawMode::Points),
        KeyCode::ArrowUp => Action::LiftCamera(LIFT_STEP),
        KeyCode::ArrowDown => Action::LiftCamera(-LIFT_STEP),
        KeyCode::Space => Action::ToggleAnimation,
        _ => return None,
    };
    Some(action)
}

/// Converts a wheel delta to browser-convention pixels.
///
/// winit reports how the content should move; browsers report how far the
/// view scrolled, so both axes flip.
pub fn scroll_pixels(delta: MouseScrollDelta) -> Vec2 {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => -Vec2::new(x, y) * PIXELS_PER_LINE,
        MouseScrollDelta::PixelDelta(pos) => -Vec2::new(pos.x as f32, pos.y as f32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(key_action(KeyCode::KeyL), Some(Action::ToggleLight));
        assert_eq!(key_action(KeyCode::KeyA), Some(Action::ToggleTexture));
        assert_eq!(
            key_action(KeyCode::KeyP),
            Some(Action::SetDrawMode(DrawMode::Points))
        );
        assert_eq!(
            key_action(KeyCode::ArrowDown),
            Some(Action::LiftCamera(-LIFT_STEP))
        );
        assert_eq!(key_action(KeyCode::Space), Some(Action::ToggleAnimation));
        assert_eq!(key_action(KeyCode::KeyZ), None);
    }

    #[test]
    fn toggles_ignore_repeat_but_lift_does_not() {
        let mut input = Input::new();
        input.key_pressed(KeyCode::KeyL);
        input.key_pressed(KeyCode::KeyL);
        input.key_pressed(KeyCode::ArrowUp);
        input.key_pressed(KeyCode::ArrowUp);
        assert!(input.key_down(KeyCode::ArrowUp));

        assert_eq!(
            input.take_actions(),
            vec![
                Action::ToggleLight,
                Action::LiftCamera(LIFT_STEP),
                Action::LiftCamera(LIFT_STEP),
            ]
        );
        assert!(input.take_actions().is_empty());

        input.key_released(KeyCode::KeyL);
        input.key_pressed(KeyCode::KeyL);
        assert_eq!(input.take_actions(), vec![Action::ToggleLight]);
    }

    #[test]
    fn drag_produces_pixel_deltas() {
        let mut input = Input::new();
        input.cursor_moved(Vec2::new(10.0, 10.0));
        input.cursor_moved(Vec2::new(20.0, 10.0));
        assert!(input.take_actions().is_empty());

        input.set_dragging(true);
        input.cursor_moved(Vec2::new(25.0, 7.0));
        input.set_dragging(false);
        input.cursor_moved(Vec2::new(50.0, 50.0));

        assert_eq!(
            input.take_actions(),
            vec![Action::RotateScene { dx: 5.0, dy: -3.0 }]
        );
    }

    #[test]
    fn wheel_uses_browser_convention() {
        assert_eq!(
            scroll_pixels(MouseScrollDelta::LineDelta(0.0, -1.0)),
            Vec2::new(0.0, 100.0)
        );
        assert_eq!(
            scroll_pixels(MouseScrollDelta::PixelDelta(PhysicalPosition::new(12.0, 0.0))),
            Vec2::new(-12.0, 0.0)
        );

        let mut input = Input::new();
        input.scrolled(MouseScrollDelta::LineDelta(0.0, 0.0));
        input.scrolled(MouseScrollDelta::LineDelta(0.5, -0.5));
        assert_eq!(
            input.take_actions(),
            vec![Action::PanCamera { dx: -50.0, dy: 50.0 }]
        );
    }
}
