use glam::{Mat4, Vec3, Vec4};

/// A camera placed at `position`, looking at `target`.
///
/// The camera-to-world matrix is cached and only recomputed when the pose
/// changes.
///
/// # Example
/// ```ignore
/// let mut camera = Camera::new()
///     .at(Vec3::new(0.0, 5.0, 20.0))
///     .looking_at(Vec3::ZERO);
///
/// camera.lift(0.1);
/// let view = camera.view_matrix();
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    position: Vec3,
    target: Vec3,
    up: Vec3,
    matrix: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_pose(Vec3::new(0.0, 5.0, 20.0), Vec3::ZERO, Vec3::Y)
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pose(position: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            position,
            target,
            up,
            matrix: target_to(position, target, up),
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.set_pose(position, self.target, self.up);
        self
    }

    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.set_pose(self.position, target, self.up);
        self
    }

    /// Moves the camera and recomputes its matrix.
    pub fn set_pose(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.position = position;
        self.target = target;
        self.up = up;
        self.matrix = target_to(position, target, up);
    }

    /// Offsets position and target independently.
    pub fn apply_delta(&mut self, position_delta: Vec3, target_delta: Vec3) {
        self.set_pose(
            self.position + position_delta,
            self.target + target_delta,
            self.up,
        );
    }

    /// Raises (or lowers) the eye along Y, keeping the target fixed.
    pub fn lift(&mut self, dy: f32) {
        self.apply_delta(Vec3::new(0.0, dy, 0.0), Vec3::ZERO);
    }

    /// Slides eye and target together in the XZ plane.
    pub fn pan(&mut self, dx: f32, dz: f32) {
        let delta = Vec3::new(dx, 0.0, dz);
        self.apply_delta(delta, delta);
    }

    /// Camera-to-world transform.
    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    /// World-to-camera transform.
    pub fn view_matrix(&self) -> Mat4 {
        self.matrix.inverse()
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }
}

/// Camera-to-world matrix whose -Z axis points from `eye` towards `target`.
///
/// Degenerate poses (`eye == target`, or `up` parallel to the viewing
/// direction) fall back to the world axes.
fn target_to(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let z = (eye - target).normalize_or(Vec3::Z);
    let x = up.cross(z).normalize_or(Vec3::X);
    let y = z.cross(x);

    Mat4::from_cols(
        x.extend(0.0),
        y.extend(0.0),
        z.extend(0.0),
        Vec4::new(eye.x, eye.y, eye.z, 1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec4, b: Vec4) -> bool {
        (a - b).abs().max_element() < 1e-5
    }

    #[test]
    fn origin_maps_to_eye() {
        let camera = Camera::new();
        let eye = camera.matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(approx(eye, Vec4::new(0.0, 5.0, 20.0, 1.0)));
    }

    #[test]
    fn looks_down_negative_z() {
        let camera = Camera::from_pose(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let forward = camera.matrix() * Vec4::new(0.0, 0.0, -1.0, 0.0);
        assert!(approx(forward, Vec4::new(0.0, 0.0, -1.0, 0.0)));

        let target = camera.view_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(approx(target, Vec4::new(0.0, 0.0, -10.0, 1.0)));
    }

    #[test]
    fn lift_moves_only_the_eye() {
        let mut camera = Camera::new();
        camera.lift(0.1);
        camera.lift(0.1);
        assert!((camera.position().y - 5.2).abs() < 1e-5);
        assert_eq!(camera.target(), Vec3::ZERO);
        let eye = camera.matrix() * Vec4::W;
        assert!((eye.y - 5.2).abs() < 1e-5);
    }

    #[test]
    fn pan_moves_eye_and_target() {
        let mut camera = Camera::new();
        camera.pan(1.0, -2.0);
        assert_eq!(camera.position(), Vec3::new(1.0, 5.0, 18.0));
        assert_eq!(camera.target(), Vec3::new(1.0, 0.0, -2.0));
    }

    #[test]
    fn degenerate_pose_stays_finite() {
        let camera = Camera::from_pose(Vec3::ONE, Vec3::ONE, Vec3::Y);
        assert!(camera.matrix().is_finite());
        let straight_down = Camera::from_pose(Vec3::Y, Vec3::ZERO, Vec3::Y);
        assert!(straight_down.matrix().is_finite());
    }
}
