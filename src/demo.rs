//! The bundled demo scene: a background quad, a toon-shaded mug and a
//! textured phong bottle, with every material of the renderer defined.
//!
//! Asset URLs are relative to the configured asset root:
//!
//! ```text
//! obj/mug.obj  obj/beer-bottle.obj  obj/etiqueta.jpg
//! cubemap/{posx,negx,posy,negy,posz,negz}.jpg
//! ```

use std::rc::Rc;

use glam::Vec3;

use crate::app::SetupContext;
use crate::loader::MeshRequest;
use crate::material::{MaterialKind, MaterialParams, Overrides, TextureBinding};
use crate::mesh::Mesh;
use crate::scene::{SceneElement, Transform};

pub const MUG_URL: &str = "obj/mug.obj";
pub const BOTTLE_URL: &str = "obj/beer-bottle.obj";
pub const LABEL_URL: &str = "obj/etiqueta.jpg";
pub const BACKGROUND_URL: &str = "cubemap/negz.jpg";
pub const CUBE_MAP_DIR: &str = "cubemap";

/// Builds the demo scene. Pass to [`run_with_config`](crate::run_with_config).
pub fn setup(ctx: &mut SetupContext) {
    let label = ctx.resources.create_texture_2d(ctx.gfx, "bottle", LABEL_URL);
    let background = ctx
        .resources
        .create_texture_2d(ctx.gfx, "background", BACKGROUND_URL);
    let environment = ctx
        .resources
        .create_cube_map(ctx.gfx, "cubemap", CUBE_MAP_DIR);

    for kind in MaterialKind::ALL {
        let Ok(program) = ctx
            .resources
            .compile_program(ctx.gfx, kind.name(), kind.shader_source())
        else {
            log::warn!("material '{}' is unavailable", kind.name());
            continue;
        };

        let (texture, use_texture) = match kind {
            MaterialKind::Basic | MaterialKind::Phong => (TextureBinding::Texture2d(Some(label)), true),
            MaterialKind::Toon => (TextureBinding::Texture2d(None), false),
            MaterialKind::Reflect | MaterialKind::Refract => {
                (TextureBinding::CubeMap(environment), true)
            }
            MaterialKind::Background => (TextureBinding::Texture2d(Some(background)), true),
        };

        ctx.materials.define(
            ctx.gfx,
            kind.name(),
            program,
            texture,
            use_texture,
            1.0,
            MaterialParams::defaults(kind),
        );
    }

    ctx.resources
        .add_mesh("background", Rc::new(Mesh::background_quad(ctx.gfx)));
    ctx.resources.add_mesh("cube", Rc::new(Mesh::cube(ctx.gfx)));
    ctx.resources.add_mesh("pyramid", Rc::new(Mesh::pyramid(ctx.gfx)));

    let backdrop = ctx.materials.instantiate(
        "background",
        &Overrides::new()
            .texture(TextureBinding::Texture2d(Some(background)))
            .use_texture(true),
    );
    match (ctx.resources.mesh("background"), backdrop) {
        (Some(mesh), Some(material)) => ctx.scene.append(
            SceneElement::new("background", mesh, material)
                .with_transform(Transform::from_translation(Vec3::new(0.0, 0.0, -200.0))),
        ),
        _ => log::warn!("background material missing, skipping backdrop"),
    }

    let mug = ctx.materials.instantiate(
        "toon",
        &Overrides::new()
            .ambient_color(Vec3::splat(0.1))
            .diffuse_color(Vec3::new(0.267, 0.329, 0.415))
            .specular_color(Vec3::ONE)
            .texture(TextureBinding::Texture2d(None))
            .use_texture(false)
            .alpha(1.0),
    );
    let bottle = ctx.materials.instantiate(
        "phong",
        &Overrides::new()
            .ambient_color(Vec3::splat(0.1))
            .diffuse_color(Vec3::new(0.267, 0.329, 0.415))
            .specular_color(Vec3::splat(0.5))
            .texture(TextureBinding::Texture2d(Some(label)))
            .use_texture(true)
            .alpha(1.0),
    );
    let (Some(mug), Some(bottle)) = (mug, bottle) else {
        log::warn!("toon or phong material missing, not loading the mug and bottle");
        return;
    };

    ctx.loader.load_batch(
        vec![MeshRequest::obj(MUG_URL), MeshRequest::obj(BOTTLE_URL)],
        move |meshes| {
            vec![
                SceneElement::new("mug", Rc::clone(&meshes[0]), mug)
                    .with_transform(Transform::from_translation(Vec3::new(5.0, 1.0, 0.0))),
                SceneElement::new("bottle", Rc::clone(&meshes[1]), bottle)
                    .with_transform(Transform::from_translation(Vec3::new(-5.0, 1.0, 0.0))),
            ]
        },
    );
}
