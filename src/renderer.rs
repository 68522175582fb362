//! The per-frame draw loop.
//!
//! [`Renderer::draw_frame`] walks the scene in insertion order and, for every
//! element, selects its program, binds its buffers and textures, pushes the
//! shared globals and then the material's own parameters before issuing one
//! indexed draw. Elements are not sorted, so blended elements drawn before
//! opaque ones behind them show through.

use glam::Mat4;

use crate::context::RenderContext;
use crate::graphics::{ClearState, Graphics};
use crate::material::{GlobalSlots, MaterialInstance, TextureBinding, push_params};
use crate::scene::{Scene, SceneElement};
use crate::wgpu_graphics::{COLOR_TEXTURE_UNIT, ENVIRONMENT_UNIT};

/// Maps texture coordinates to `(u, -v)`, flipping images loaded top row first.
pub const TEXTURE_FLIP: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0, //
    0.0, -1.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 0.0,
]);

/// The matrices pushed for one element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElementMatrices {
    pub view: Mat4,
    pub world: Mat4,
    pub normal: Mat4,
}

/// Draws a [`Scene`] through a [`Graphics`] implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct Renderer {
    clear: ClearState,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws every element of `scene`, then advances the animation clock.
    ///
    /// Returns the number of draws issued.
    pub fn draw_frame(
        &self,
        gfx: &mut dyn Graphics,
        ctx: &mut RenderContext,
        scene: &Scene,
        aspect: f32,
    ) -> usize {
        gfx.begin_frame(self.clear);
        ctx.update_projection(aspect);

        let mut draws = 0;
        for element in scene.iter() {
            self.draw_element(gfx, ctx, element);
            draws += 1;
        }

        ctx.advance_clock();
        draws
    }

    /// View, world and normal matrices of one element.
    ///
    /// Two rotations act on every element. The animation clock turns the
    /// *view* about Y, so the scene appears to spin around the world origin
    /// as seen from the camera. Mouse drags accumulate into the *world* side
    /// through the context's global rotation, which pivots the scene about
    /// its own origin before the view is applied. Both compose: dragging
    /// while animated tilts a scene that keeps spinning.
    pub fn element_matrices(ctx: &RenderContext, element: &SceneElement) -> ElementMatrices {
        let view = ctx.camera.view_matrix() * Mat4::from_rotation_y(ctx.clock);
        let world = ctx.global_rotation * element.transform.matrix();
        let normal = view.inverse().transpose();
        ElementMatrices {
            view,
            world,
            normal,
        }
    }

    fn draw_element(&self, gfx: &mut dyn Graphics, ctx: &RenderContext, element: &SceneElement) {
        let material = &element.material;
        let globals = &material.slots().globals;
        let mesh = &element.mesh;

        gfx.use_program(material.program());

        // Bind every input the program consumes. Cube programs take no
        // texture coordinates, so they never get that buffer.
        let inputs = [
            (globals.position, mesh.positions),
            (globals.normal, mesh.normals),
            (globals.tex_coord, mesh.tex_coords),
        ];
        for (slot, buffer) in inputs {
            if let Some(location) = slot {
                gfx.bind_vertex_buffer(location, buffer);
            }
        }

        match material.texture() {
            TextureBinding::None | TextureBinding::Texture2d(None) => {}
            TextureBinding::Texture2d(Some(texture)) => {
                gfx.bind_texture(COLOR_TEXTURE_UNIT, texture);
            }
            TextureBinding::CubeMap(texture) => {
                gfx.bind_texture(ENVIRONMENT_UNIT, texture);
                if let Some(location) = globals.sampler_unit {
                    gfx.uniform_1i(location, ENVIRONMENT_UNIT as i32);
                }
            }
        }

        let matrices = Self::element_matrices(ctx, element);
        push_globals(gfx, globals, ctx, material, &matrices);
        push_params(gfx, material.slots(), material.params());

        gfx.draw_elements(ctx.draw_mode, mesh.index_buffer(), mesh.index_count());
    }
}

/// Pushes the uniforms every program shares.
///
/// The context's texture toggle goes to the same slot as the element's own
/// flag and is written after it, so it wins.
fn push_globals(
    gfx: &mut dyn Graphics,
    slots: &GlobalSlots,
    ctx: &RenderContext,
    material: &MaterialInstance,
    matrices: &ElementMatrices,
) {
    let matrix_uniforms = [
        (slots.projection_matrix, ctx.projection()),
        (slots.texture_matrix, TEXTURE_FLIP),
        (slots.view_matrix, matrices.view),
        (slots.normal_matrix, matrices.normal),
        (slots.world_matrix, matrices.world),
        (slots.camera_matrix, ctx.camera.matrix()),
    ];
    for (slot, value) in matrix_uniforms {
        if let Some(location) = slot {
            gfx.uniform_matrix_4fv(location, &value);
        }
    }

    if let Some(location) = slots.camera_position {
        gfx.uniform_3fv(location, ctx.camera.position());
    }
    if let Some(location) = slots.use_texture {
        gfx.uniform_1i(location, material.use_texture() as i32);
    }
    if let Some(location) = slots.alpha {
        gfx.uniform_1f(location, material.alpha());
    }
    if let Some(location) = slots.use_light {
        gfx.uniform_1i(location, ctx.use_light as i32);
    }
    if let Some(location) = slots.use_texture {
        gfx.uniform_1i(location, ctx.use_texture as i32);
    }

    let light = [
        (slots.light_position, ctx.light.position),
        (slots.light_color, ctx.light.color),
        (slots.light_direction, ctx.light.direction),
    ];
    for (slot, value) in light {
        if let Some(location) = slot {
            gfx.uniform_3fv(location, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use glam::{Vec3, Vec4};

    use super::*;
    use crate::context::Action;
    use crate::graphics::testing::{Call, Recorder};
    use crate::graphics::{DrawMode, TextureId, TextureKind};
    use crate::material::{MaterialCatalog, MaterialKind, MaterialParams, Overrides};
    use crate::mesh::Mesh;
    use crate::scene::Transform;

    struct Fixture {
        gfx: Recorder,
        catalog: MaterialCatalog,
        cube: Rc<Mesh>,
        label: TextureId,
        sky: TextureId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut gfx = Recorder::new();
            let cube = Rc::new(Mesh::cube(&mut gfx));
            let label = gfx.create_texture(TextureKind::Texture2d, 1, 1, [0; 4], "label");
            let sky = gfx.create_texture(TextureKind::CubeMap, 4, 4, [0; 4], "sky");

            let mut catalog = MaterialCatalog::new();
            for kind in MaterialKind::ALL {
                let program = gfx
                    .compile_program(kind.name(), kind.shader_source())
                    .unwrap();
                let texture = match kind {
                    MaterialKind::Reflect | MaterialKind::Refract => TextureBinding::CubeMap(sky),
                    MaterialKind::Toon => TextureBinding::None,
                    _ => TextureBinding::Texture2d(Some(label)),
                };
                catalog.define(
                    &gfx,
                    kind.name(),
                    program,
                    texture,
                    kind != MaterialKind::Toon,
                    1.0,
                    MaterialParams::defaults(kind),
                );
            }
            gfx.clear();

            Self {
                gfx,
                catalog,
                cube,
                label,
                sky,
            }
        }

        fn element(&self, material: &str) -> SceneElement {
            let instance = self.catalog.instantiate(material, &Overrides::new()).unwrap();
            SceneElement::new(material, Rc::clone(&self.cube), instance)
        }
    }

    fn bound_locations(calls: &[Call]) -> Vec<u32> {
        calls
            .iter()
            .filter_map(|call| match call {
                Call::BindVertexBuffer { location, .. } => Some(*location),
                _ => None,
            })
            .collect()
    }

    fn textures(calls: &[Call]) -> Vec<(u32, TextureId)> {
        calls
            .iter()
            .filter_map(|call| match call {
                Call::BindTexture { unit, texture } => Some((*unit, *texture)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn identity_view_gives_identity_normal_matrix() {
        let fx = Fixture::new();
        let mut ctx = RenderContext::new();
        ctx.camera.set_pose(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        ctx.clock = 0.0;
        ctx.global_rotation = Mat4::IDENTITY;
        let element = fx.element("basic").with_transform(Transform::default());

        let matrices = Renderer::element_matrices(&ctx, &element);
        assert!(matrices.view.abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert!(matrices.world.abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert!(matrices.normal.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn element_matrices_compose_both_rotations() {
        let fx = Fixture::new();
        let mut ctx = RenderContext::new();
        let element = fx
            .element("basic")
            .with_transform(Transform::from_translation(Vec3::new(5.0, 1.0, 0.0)));

        let still = Renderer::element_matrices(&ctx, &element);
        assert_eq!(still.world.w_axis, Vec4::new(5.0, 1.0, 0.0, 1.0));
        assert!(still.view.abs_diff_eq(ctx.camera.view_matrix(), 1e-6));

        ctx.clock = std::f32::consts::FRAC_PI_2;
        ctx.apply(Action::RotateScene { dx: 900.0, dy: 0.0 });
        let moved = Renderer::element_matrices(&ctx, &element);

        // A quarter turn about Y takes (5, 1, 0) to (0, 1, -5).
        let origin = moved.world * Vec4::W;
        assert!((origin - Vec4::new(0.0, 1.0, -5.0, 1.0)).abs().max_element() < 1e-5);
        let expected_view = ctx.camera.view_matrix() * Mat4::from_rotation_y(ctx.clock);
        assert!(moved.view.abs_diff_eq(expected_view, 1e-6));
        assert!(moved.normal.abs_diff_eq(moved.view.inverse().transpose(), 1e-6));
    }

    #[test]
    fn one_draw_per_element_in_order() {
        let mut fx = Fixture::new();
        let mut scene = Scene::new();
        scene.append(fx.element("phong"));
        scene.append(fx.element("toon"));
        scene.append(fx.element("reflect"));

        let mut ctx = RenderContext::new();
        ctx.apply(Action::SetDrawMode(DrawMode::Lines));
        let draws = Renderer::new().draw_frame(&mut fx.gfx, &mut ctx, &scene, 1.5);

        assert_eq!(draws, 3);
        assert_eq!(fx.gfx.draw_count(), 3);
        assert_eq!(fx.gfx.calls[0], Call::BeginFrame(ClearState::default()));

        let programs: Vec<_> = fx
            .gfx
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::UseProgram(p) => Some(*p),
                _ => None,
            })
            .collect();
        let expected: Vec<_> = ["phong", "toon", "reflect"]
            .iter()
            .map(|name| fx.catalog.get(name).unwrap().program())
            .collect();
        assert_eq!(programs, expected);

        assert!(fx.gfx.calls.iter().all(|call| match call {
            Call::DrawElements { mode, count, .. } => *mode == DrawMode::Lines && *count == 36,
            _ => true,
        }));
        assert!((ctx.clock - 0.01).abs() < 1e-6);
    }

    #[test]
    fn empty_scene_still_clears() {
        let mut fx = Fixture::new();
        let mut ctx = RenderContext::new();
        ctx.apply(Action::ToggleAnimation);
        let draws = Renderer::new().draw_frame(&mut fx.gfx, &mut ctx, &Scene::new(), 1.0);

        assert_eq!(draws, 0);
        assert_eq!(fx.gfx.calls, vec![Call::BeginFrame(ClearState::default())]);
        assert_eq!(ctx.clock, 0.0);
    }

    #[test]
    fn textures_route_by_binding() {
        let mut fx = Fixture::new();
        let mut ctx = RenderContext::new();

        for (material, locations, bound) in [
            ("phong", vec![0, 1, 2], vec![(COLOR_TEXTURE_UNIT, fx.label)]),
            ("toon", vec![0, 1, 2], vec![]),
            ("refract", vec![0, 1], vec![(ENVIRONMENT_UNIT, fx.sky)]),
        ] {
            let mut scene = Scene::new();
            scene.append(fx.element(material));
            fx.gfx.clear();
            Renderer::new().draw_frame(&mut fx.gfx, &mut ctx, &scene, 1.0);

            let calls = fx.gfx.frame_calls();
            assert_eq!(bound_locations(calls), locations, "{}", material);
            assert_eq!(textures(calls), bound, "{}", material);
        }
    }

    #[test]
    fn cube_materials_select_the_environment_unit() {
        let mut fx = Fixture::new();
        let mut scene = Scene::new();
        scene.append(fx.element("reflect"));
        let mut ctx = RenderContext::new();
        Renderer::new().draw_frame(&mut fx.gfx, &mut ctx, &scene, 1.0);

        let sampler = fx.catalog.get("reflect").unwrap().slots().globals.sampler_unit.unwrap();
        assert!(fx.gfx.calls.contains(&Call::Uniform1i(sampler, 1)));
    }

    #[test]
    fn context_texture_toggle_is_written_last() {
        let mut fx = Fixture::new();
        let mut scene = Scene::new();
        scene.append(fx.element("basic"));
        let mut ctx = RenderContext::new();
        ctx.apply(Action::ToggleTexture);
        ctx.apply(Action::ToggleLight);
        Renderer::new().draw_frame(&mut fx.gfx, &mut ctx, &scene, 1.0);

        let globals = &fx.catalog.get("basic").unwrap().slots().globals;
        let use_texture = globals.use_texture.unwrap();
        let writes: Vec<_> = fx
            .gfx
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Uniform1i(location, value) if *location == use_texture => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![1, 0]);
        assert!(fx
            .gfx
            .calls
            .contains(&Call::Uniform1i(globals.use_light.unwrap(), 0)));
    }

    #[test]
    fn globals_then_params_then_draw() {
        let mut fx = Fixture::new();
        let mut scene = Scene::new();
        scene.append(fx.element("phong"));
        let mut ctx = RenderContext::new();
        Renderer::new().draw_frame(&mut fx.gfx, &mut ctx, &scene, 2.0);

        let program = fx.catalog.get("phong").unwrap().program();
        let names: Vec<_> = fx
            .gfx
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Uniform1f(l, _)
                | Call::Uniform1i(l, _)
                | Call::Uniform3fv(l, _)
                | Call::UniformMatrix4fv(l, _) => fx.gfx.uniform_name(program, *l),
                _ => None,
            })
            .collect();

        assert_eq!(&names[..3], ["projection_matrix", "texture_matrix", "view_matrix"]);
        let light = names.iter().position(|n| *n == "light_direction").unwrap();
        let shininess = names.iter().position(|n| *n == "shininess").unwrap();
        assert!(light < shininess);
        assert!(matches!(fx.gfx.calls.last(), Some(Call::DrawElements { .. })));

        let projection = fx.gfx.calls.iter().find_map(|call| match call {
            Call::UniformMatrix4fv(l, m)
                if fx.gfx.uniform_name(program, *l) == Some("projection_matrix") =>
            {
                Some(*m)
            }
            _ => None,
        });
        assert_eq!(projection, Some(ctx.projection()));
    }
}
