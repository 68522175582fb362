//! Render state shared between input handling and the renderer.

use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::graphics::DrawMode;

/// Vertical field of view of the projection, in degrees.
pub const FIELD_OF_VIEW_DEGREES: f32 = 45.0;
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 300.0;
/// Animation clock increment per frame, in radians of view rotation.
pub const CLOCK_STEP: f32 = 0.01;
/// Camera lift per arrow key press.
pub const LIFT_STEP: f32 = 0.1;
/// Pixels of drag per degree of scene rotation.
pub const DRAG_PIXELS_PER_DEGREE: f32 = 10.0;
/// Pixels of scroll per unit of camera pan.
pub const SCROLL_PIXELS_PER_UNIT: f32 = 30.0;

/// The single point light of the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub color: Vec3,
    pub direction: Vec3,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: Vec3::splat(10.0),
            color: Vec3::splat(0.1),
            direction: Vec3::ONE,
        }
    }
}

/// A user command, decoupled from the device that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    ToggleLight,
    ToggleTexture,
    SetDrawMode(DrawMode),
    /// Moves the camera eye along Y.
    LiftCamera(f32),
    ToggleAnimation,
    /// Mouse drag, in pixels.
    RotateScene { dx: f32, dy: f32 },
    /// Scroll, in pixels.
    PanCamera { dx: f32, dy: f32 },
}

/// Everything the renderer reads besides the scene itself.
#[derive(Clone, Debug)]
pub struct RenderContext {
    pub camera: Camera,
    pub use_light: bool,
    pub use_texture: bool,
    pub draw_mode: DrawMode,
    pub light: Light,
    /// Angle of the automatic view rotation, in radians.
    pub clock: f32,
    pub animated: bool,
    /// Rotation applied to the whole scene by mouse drags.
    pub global_rotation: Mat4,
    projection: Mat4,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            use_light: true,
            use_texture: true,
            draw_mode: DrawMode::Triangles,
            light: Light::default(),
            clock: 0.0,
            animated: true,
            global_rotation: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: Action) {
        log::trace!("{:?}", action);
        match action {
            Action::ToggleLight => self.use_light = !self.use_light,
            Action::ToggleTexture => self.use_texture = !self.use_texture,
            Action::SetDrawMode(mode) => self.draw_mode = mode,
            Action::LiftCamera(dy) => self.camera.lift(dy),
            Action::ToggleAnimation => self.animated = !self.animated,
            Action::RotateScene { dx, dy } => self.rotate_scene(dx, dy),
            Action::PanCamera { dx, dy } => self.camera.pan(
                dx / SCROLL_PIXELS_PER_UNIT,
                dy / SCROLL_PIXELS_PER_UNIT,
            ),
        }
    }

    /// Pre-multiplies a drag rotation onto the global scene rotation.
    ///
    /// Horizontal drag turns about Y, vertical drag about X; the new rotation
    /// is applied after everything accumulated so far.
    pub fn rotate_scene(&mut self, dx: f32, dy: f32) {
        let yaw = (dx / DRAG_PIXELS_PER_DEGREE).to_radians();
        let pitch = (dy / DRAG_PIXELS_PER_DEGREE).to_radians();
        let rotation = Mat4::from_rotation_y(yaw) * Mat4::from_rotation_x(pitch);
        self.global_rotation = rotation * self.global_rotation;
    }

    /// Moves the animation clock forward one frame when animated.
    pub fn advance_clock(&mut self) {
        if self.animated {
            self.clock += CLOCK_STEP;
        }
    }

    /// Recomputes the projection for a surface aspect ratio.
    pub fn update_projection(&mut self, aspect: f32) -> Mat4 {
        self.projection = Mat4::perspective_rh(
            FIELD_OF_VIEW_DEGREES.to_radians(),
            aspect,
            Z_NEAR,
            Z_FAR,
        );
        self.projection
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }
}
