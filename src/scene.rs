//! The scene graph: an append-only, ordered list of drawable elements.

use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::material::MaterialInstance;
use crate::mesh::Mesh;

/// Position, orientation and scale of a scene element.
///
/// Rotation is stored as Euler angles in radians and applied X, then Y, then Z
/// in matrix order, so the local matrix is `T · Rx · Ry · Rz · S`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Creates an identity transform (origin, no rotation, unit scale).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transform positioned at the given location.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    /// Sets the per-axis rotation angles, in radians.
    pub fn rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    /// The local-to-scene matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_z(self.rotation.z)
            * Mat4::from_scale(self.scale)
    }
}

/// One positioned, materialised instance of a mesh.
#[derive(Clone, Debug)]
pub struct SceneElement {
    pub name: String,
    pub mesh: Rc<Mesh>,
    pub transform: Transform,
    pub material: MaterialInstance,
}

impl SceneElement {
    pub fn new(name: impl Into<String>, mesh: Rc<Mesh>, material: MaterialInstance) -> Self {
        Self {
            name: name.into(),
            mesh,
            transform: Transform::default(),
            material,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// Ordered scene elements. Elements are only ever appended.
#[derive(Default, Debug)]
pub struct Scene {
    elements: Vec<SceneElement>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, element: SceneElement) {
        log::debug!("scene: appending '{}'", element.name);
        self.elements.push(element);
    }

    /// Appends a whole batch at once.
    pub fn extend(&mut self, batch: Vec<SceneElement>) {
        log::debug!("scene: appending batch of {}", batch.len());
        self.elements.extend(batch);
    }

    /// Elements in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SceneElement> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// First element with the given name.
    pub fn get(&self, name: &str) -> Option<&SceneElement> {
        self.elements.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn pure_translation_matrix() {
        let m = Transform::from_translation(Vec3::new(5.0, 1.0, 0.0)).matrix();
        assert_eq!(m.w_axis, Vec4::new(5.0, 1.0, 0.0, 1.0));
        assert_eq!(m.x_axis, Vec4::X);
        assert_eq!(m.y_axis, Vec4::Y);
        assert_eq!(m.z_axis, Vec4::Z);
    }

    #[test]
    fn rotation_applies_z_first_to_points() {
        let half_pi = std::f32::consts::FRAC_PI_2;
        let t = Transform::new().rotation(Vec3::new(half_pi, 0.0, half_pi));
        // Rz takes +X to +Y, then Rx takes +Y to +Z.
        let p = t.matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::Z, 1e-6));
    }

    #[test]
    fn scale_is_applied_before_translation() {
        let t = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0)).uniform_scale(2.0);
        let p = t.matrix().transform_point3(Vec3::ONE);
        assert!(p.abs_diff_eq(Vec3::new(3.0, 2.0, 2.0), 1e-6));
    }
}
