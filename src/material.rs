//! Materials: named shader configurations and their per-element instances.
//!
//! A [`Material`] is a template: a compiled program, a texture binding, and a
//! typed set of material-specific values ([`MaterialParams`]). Defining one
//! resolves every uniform it will ever push into a [`ParamSlots`] table, which
//! is shared read-only with every instance. Instances are plain value copies of
//! the template with [`Overrides`] merged on top, so changing an instance never
//! touches the template.
//!
//! # Uniform dispatch
//!
//! Material-specific values are exposed as `(name, UniformValue)` pairs and
//! pushed by [`push_params`], which routes each value by its variant:
//!
//! | Variant | Upload |
//! |---------|--------|
//! | `Float` | `uniform_1f` |
//! | `Bool`  | `uniform_1i` |
//! | `Vec2`  | `uniform_2fv` |
//! | `Vec3`  | `uniform_3fv` |
//! | `Vec4`  | `uniform_4fv` |

use std::collections::HashMap;
use std::rc::Rc;

use glam::{Vec2, Vec3, Vec4};

use crate::graphics::{Graphics, ProgramId, TextureId};
use crate::reflect::UniformLocation;
use crate::shaders;

/// A material-specific uniform value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
}

impl UniformValue {
    /// Uploads this value to `location` of the current program.
    pub fn push(self, gfx: &mut dyn Graphics, location: UniformLocation) {
        match self {
            UniformValue::Float(v) => gfx.uniform_1f(location, v),
            UniformValue::Bool(v) => gfx.uniform_1i(location, v as i32),
            UniformValue::Vec2(v) => gfx.uniform_2fv(location, v),
            UniformValue::Vec3(v) => gfx.uniform_3fv(location, v),
            UniformValue::Vec4(v) => gfx.uniform_4fv(location, v),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

/// The shading models the renderer ships programs for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Basic,
    Phong,
    Toon,
    Reflect,
    Refract,
    Background,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 6] = [
        MaterialKind::Basic,
        MaterialKind::Phong,
        MaterialKind::Toon,
        MaterialKind::Reflect,
        MaterialKind::Refract,
        MaterialKind::Background,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MaterialKind::Basic => "basic",
            MaterialKind::Phong => "phong",
            MaterialKind::Toon => "toon",
            MaterialKind::Reflect => "reflect",
            MaterialKind::Refract => "refract",
            MaterialKind::Background => "background",
        }
    }

    /// WGSL source of this kind's program.
    pub fn shader_source(self) -> &'static str {
        shaders::source(self)
    }
}

/// Coefficients shared by the phong and toon shading models.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    pub ka: f32,
    pub kd: f32,
    pub ks: f32,
    pub shininess: f32,
    pub ambient_color: Vec3,
    pub diffuse_color: Vec3,
    pub specular_color: Vec3,
}

impl Lighting {
    fn uniforms(&self) -> Vec<(&'static str, UniformValue)> {
        vec![
            ("ka", self.ka.into()),
            ("kd", self.kd.into()),
            ("ks", self.ks.into()),
            ("shininess", self.shininess.into()),
            ("ambient_color", self.ambient_color.into()),
            ("diffuse_color", self.diffuse_color.into()),
            ("specular_color", self.specular_color.into()),
        ]
    }

    fn apply(&mut self, overrides: &Overrides) {
        let o = overrides;
        self.ka = o.ka.unwrap_or(self.ka);
        self.kd = o.kd.unwrap_or(self.kd);
        self.ks = o.ks.unwrap_or(self.ks);
        self.shininess = o.shininess.unwrap_or(self.shininess);
        self.ambient_color = o.ambient_color.unwrap_or(self.ambient_color);
        self.diffuse_color = o.diffuse_color.unwrap_or(self.diffuse_color);
        self.specular_color = o.specular_color.unwrap_or(self.specular_color);
    }
}

/// Typed material-specific values, one variant per [`MaterialKind`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaterialParams {
    Basic { ambient_color: Vec3 },
    Phong(Lighting),
    Toon(Lighting),
    Reflect,
    Refract,
    Background,
}

impl MaterialParams {
    /// The stock values for `kind`.
    pub fn defaults(kind: MaterialKind) -> Self {
        let phong = Lighting {
            ka: 1.0,
            kd: 1.0,
            ks: 1.0,
            shininess: 90.0,
            ambient_color: Vec3::splat(0.1),
            diffuse_color: Vec3::new(0.267, 0.329, 0.415),
            specular_color: Vec3::ONE,
        };

        match kind {
            MaterialKind::Basic => MaterialParams::Basic {
                ambient_color: Vec3::splat(0.5),
            },
            MaterialKind::Phong => MaterialParams::Phong(phong),
            MaterialKind::Toon => MaterialParams::Toon(Lighting {
                shininess: 250.0,
                specular_color: Vec3::ZERO,
                ..phong
            }),
            MaterialKind::Reflect => MaterialParams::Reflect,
            MaterialKind::Refract => MaterialParams::Refract,
            MaterialKind::Background => MaterialParams::Background,
        }
    }

    pub fn kind(&self) -> MaterialKind {
        match self {
            MaterialParams::Basic { .. } => MaterialKind::Basic,
            MaterialParams::Phong(_) => MaterialKind::Phong,
            MaterialParams::Toon(_) => MaterialKind::Toon,
            MaterialParams::Reflect => MaterialKind::Reflect,
            MaterialParams::Refract => MaterialKind::Refract,
            MaterialParams::Background => MaterialKind::Background,
        }
    }

    /// Every material-specific uniform with its current value.
    pub fn uniforms(&self) -> Vec<(&'static str, UniformValue)> {
        match self {
            MaterialParams::Basic { ambient_color } => {
                vec![("ambient_color", (*ambient_color).into())]
            }
            MaterialParams::Phong(lighting) | MaterialParams::Toon(lighting) => {
                lighting.uniforms()
            }
            MaterialParams::Reflect | MaterialParams::Refract | MaterialParams::Background => {
                Vec::new()
            }
        }
    }

    fn apply(&mut self, overrides: &Overrides, material: &str) {
        match self {
            MaterialParams::Basic { ambient_color } => {
                *ambient_color = overrides.ambient_color.unwrap_or(*ambient_color);
                if overrides.has_lighting_terms() {
                    log::warn!(
                        "material '{}': basic materials only take an ambient color, ignoring other lighting overrides",
                        material
                    );
                }
            }
            MaterialParams::Phong(lighting) | MaterialParams::Toon(lighting) => {
                lighting.apply(overrides)
            }
            MaterialParams::Reflect | MaterialParams::Refract | MaterialParams::Background => {
                if overrides.ambient_color.is_some() || overrides.has_lighting_terms() {
                    log::warn!(
                        "material '{}' has no lighting parameters, ignoring lighting overrides",
                        material
                    );
                }
            }
        }
    }
}

/// How a material samples textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureBinding {
    /// No texture coordinates and no sampler.
    None,
    /// Texture coordinates are bound; the texture itself is optional.
    Texture2d(Option<TextureId>),
    /// A cube map sampled by direction.
    CubeMap(TextureId),
}

/// Attribute and uniform locations every material resolves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlobalSlots {
    pub position: Option<u32>,
    pub normal: Option<u32>,
    pub tex_coord: Option<u32>,

    pub projection_matrix: Option<UniformLocation>,
    pub texture_matrix: Option<UniformLocation>,
    pub view_matrix: Option<UniformLocation>,
    pub world_matrix: Option<UniformLocation>,
    pub normal_matrix: Option<UniformLocation>,
    pub camera_matrix: Option<UniformLocation>,
    pub camera_position: Option<UniformLocation>,

    pub use_light: Option<UniformLocation>,
    pub light_position: Option<UniformLocation>,
    pub light_color: Option<UniformLocation>,
    pub light_direction: Option<UniformLocation>,

    pub use_texture: Option<UniformLocation>,
    pub sampler_unit: Option<UniformLocation>,
    pub alpha: Option<UniformLocation>,
}

impl GlobalSlots {
    pub fn resolve(gfx: &dyn Graphics, program: ProgramId) -> Self {
        let uniform = |name| gfx.uniform_location(program, name);
        Self {
            position: gfx.attrib_location(program, "position"),
            normal: gfx.attrib_location(program, "normal"),
            tex_coord: gfx.attrib_location(program, "tex_coord"),

            projection_matrix: uniform("projection_matrix"),
            texture_matrix: uniform("texture_matrix"),
            view_matrix: uniform("view_matrix"),
            world_matrix: uniform("world_matrix"),
            normal_matrix: uniform("normal_matrix"),
            camera_matrix: uniform("camera_matrix"),
            camera_position: uniform("camera_position"),

            use_light: uniform("use_light"),
            light_position: uniform("light_position"),
            light_color: uniform("light_color"),
            light_direction: uniform("light_direction"),

            use_texture: uniform("use_texture"),
            sampler_unit: uniform("sampler_unit"),
            alpha: uniform("alpha"),
        }
    }
}

/// Resolved locations for one program: the globals plus every
/// material-specific uniform.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamSlots {
    pub globals: GlobalSlots,
    specific: HashMap<&'static str, Option<UniformLocation>>,
}

impl ParamSlots {
    pub fn resolve(gfx: &dyn Graphics, program: ProgramId, params: &MaterialParams) -> Self {
        let specific = params
            .uniforms()
            .into_iter()
            .map(|(name, _)| (name, gfx.uniform_location(program, name)))
            .collect();

        Self {
            globals: GlobalSlots::resolve(gfx, program),
            specific,
        }
    }

    /// Whether `name` was resolved (even if the program does not declare it).
    pub fn contains(&self, name: &str) -> bool {
        self.specific.contains_key(name)
    }

    /// Location of a material-specific uniform, `None` when absent.
    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.specific.get(name).copied().flatten()
    }
}

/// Pushes every material-specific value through its typed upload path.
///
/// Values whose uniform the program does not declare are skipped.
pub fn push_params(gfx: &mut dyn Graphics, slots: &ParamSlots, params: &MaterialParams) {
    for (name, value) in params.uniforms() {
        debug_assert!(slots.contains(name), "unresolved material parameter {name}");
        if let Some(location) = slots.location(name) {
            value.push(gfx, location);
        }
    }
}

/// Per-instance changes applied on top of a material template.
///
/// Fields a material kind does not carry are ignored with a warning.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Overrides {
    texture: Option<TextureBinding>,
    use_texture: Option<bool>,
    alpha: Option<f32>,
    ambient_color: Option<Vec3>,
    diffuse_color: Option<Vec3>,
    specular_color: Option<Vec3>,
    ka: Option<f32>,
    kd: Option<f32>,
    ks: Option<f32>,
    shininess: Option<f32>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(mut self, texture: TextureBinding) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn use_texture(mut self, use_texture: bool) -> Self {
        self.use_texture = Some(use_texture);
        self
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn ambient_color(mut self, color: Vec3) -> Self {
        self.ambient_color = Some(color);
        self
    }

    pub fn diffuse_color(mut self, color: Vec3) -> Self {
        self.diffuse_color = Some(color);
        self
    }

    pub fn specular_color(mut self, color: Vec3) -> Self {
        self.specular_color = Some(color);
        self
    }

    pub fn ka(mut self, ka: f32) -> Self {
        self.ka = Some(ka);
        self
    }

    pub fn kd(mut self, kd: f32) -> Self {
        self.kd = Some(kd);
        self
    }

    pub fn ks(mut self, ks: f32) -> Self {
        self.ks = Some(ks);
        self
    }

    pub fn shininess(mut self, shininess: f32) -> Self {
        self.shininess = Some(shininess);
        self
    }

    // Terms only phong and toon carry.
    fn has_lighting_terms(&self) -> bool {
        self.diffuse_color.is_some()
            || self.specular_color.is_some()
            || self.ka.is_some()
            || self.kd.is_some()
            || self.ks.is_some()
            || self.shininess.is_some()
    }
}

/// A named material template.
#[derive(Clone, Debug)]
pub struct Material {
    name: String,
    program: ProgramId,
    texture: TextureBinding,
    use_texture: bool,
    alpha: f32,
    slots: Rc<ParamSlots>,
    params: MaterialParams,
}

impl Material {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn kind(&self) -> MaterialKind {
        self.params.kind()
    }

    pub fn texture(&self) -> TextureBinding {
        self.texture
    }

    pub fn params(&self) -> &MaterialParams {
        &self.params
    }

    pub fn slots(&self) -> &Rc<ParamSlots> {
        &self.slots
    }

    /// A fresh copy of this template's values with `overrides` merged on top.
    pub fn instantiate(&self, overrides: &Overrides) -> MaterialInstance {
        let mut params = self.params;
        params.apply(overrides, &self.name);

        MaterialInstance {
            material: self.name.clone(),
            program: self.program,
            texture: overrides.texture.unwrap_or(self.texture),
            use_texture: overrides.use_texture.unwrap_or(self.use_texture),
            alpha: overrides.alpha.unwrap_or(self.alpha),
            slots: Rc::clone(&self.slots),
            params,
        }
    }
}

/// A scene element's own copy of a material.
#[derive(Clone, Debug)]
pub struct MaterialInstance {
    material: String,
    program: ProgramId,
    texture: TextureBinding,
    use_texture: bool,
    alpha: f32,
    slots: Rc<ParamSlots>,
    params: MaterialParams,
}

impl MaterialInstance {
    /// Name of the template this instance was made from.
    pub fn material(&self) -> &str {
        &self.material
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn texture(&self) -> TextureBinding {
        self.texture
    }

    pub fn use_texture(&self) -> bool {
        self.use_texture
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn slots(&self) -> &ParamSlots {
        &self.slots
    }

    pub fn params(&self) -> &MaterialParams {
        &self.params
    }
}

/// Material templates by name.
#[derive(Default)]
pub struct MaterialCatalog {
    materials: HashMap<String, Material>,
}

impl MaterialCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines (or redefines) a material, resolving its parameter slots.
    #[allow(clippy::too_many_arguments)]
    pub fn define(
        &mut self,
        gfx: &dyn Graphics,
        name: &str,
        program: ProgramId,
        texture: TextureBinding,
        use_texture: bool,
        alpha: f32,
        params: MaterialParams,
    ) -> &Material {
        let slots = Rc::new(ParamSlots::resolve(gfx, program, &params));
        log::debug!("defined material '{}' ({:?})", name, params.kind());

        let material = Material {
            name: name.to_string(),
            program,
            texture,
            use_texture,
            alpha,
            slots,
            params,
        };
        self.materials.insert(name.to_string(), material);
        &self.materials[name]
    }

    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    /// Instantiates the named material, or `None` if it was never defined.
    pub fn instantiate(&self, name: &str, overrides: &Overrides) -> Option<MaterialInstance> {
        self.get(name).map(|m| m.instantiate(overrides))
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
