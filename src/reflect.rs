//! WGSL program compilation and reflection.
//!
//! A program is a single WGSL module holding a `vs` vertex entry point and an
//! `fs` fragment entry point. Compiling it parses and validates the source with
//! naga, then records where things live so they can be looked up by name later:
//!
//! - vertex attributes: the `@location` of every vertex-stage input
//! - uniforms: the byte offset and type of every leaf field of the uniform
//!   block bound at `@group(0) @binding(0)`
//!
//! Nested structs inside the uniform block are flattened, so a `globals: Globals`
//! member contributes `globals.view_matrix` as plain `view_matrix`.

use std::collections::HashMap;

use naga::{AddressSpace, Binding, Handle, ScalarKind, ShaderStage, Type, TypeInner, VectorSize};

/// Name of the vertex entry point every program must define.
pub const VERTEX_ENTRY: &str = "vs";
/// Name of the fragment entry point every program must define.
pub const FRAGMENT_ENTRY: &str = "fs";
/// Binding index of the uniform block inside bind group 0.
pub const UNIFORM_BINDING: u32 = 0;

/// Errors produced while compiling a program.
#[derive(Debug, Clone)]
pub enum ShaderError {
    /// The WGSL source did not parse.
    Parse { label: String, log: String },
    /// The module parsed but failed validation.
    Validation { label: String, log: String },
    /// A required entry point is missing.
    MissingEntryPoint { label: String, entry: &'static str },
}

impl std::fmt::Display for ShaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderError::Parse { label, log } => {
                write!(f, "shader '{}' failed to parse:\n{}", label, log)
            }
            ShaderError::Validation { label, log } => {
                write!(f, "shader '{}' failed validation:\n{}", label, log)
            }
            ShaderError::MissingEntryPoint { label, entry } => {
                write!(f, "shader '{}' has no '{}' entry point", label, entry)
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// Shape of a uniform block field as declared in WGSL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Int,
    Uint,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Other,
}

impl UniformType {
    fn of(inner: &TypeInner) -> Self {
        match *inner {
            TypeInner::Scalar(scalar) => match scalar.kind {
                ScalarKind::Float => UniformType::Float,
                ScalarKind::Sint => UniformType::Int,
                ScalarKind::Uint => UniformType::Uint,
                _ => UniformType::Other,
            },
            TypeInner::Vector { size, scalar } if matches!(scalar.kind, ScalarKind::Float) => {
                match size {
                    VectorSize::Bi => UniformType::Vec2,
                    VectorSize::Tri => UniformType::Vec3,
                    VectorSize::Quad => UniformType::Vec4,
                }
            }
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                ..
            } => UniformType::Mat4,
            _ => UniformType::Other,
        }
    }
}

/// Location of a uniform inside a program's uniform block.
///
/// Only obtainable from [`Graphics::uniform_location`](crate::Graphics::uniform_location);
/// a location is meaningful for the program it was resolved against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub(crate) offset: u32,
    pub(crate) ty: UniformType,
}

impl UniformLocation {
    /// Byte offset of the field within the uniform block.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Declared type of the field.
    pub fn ty(&self) -> UniformType {
        self.ty
    }
}

/// A vertex-stage input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: String,
    pub location: u32,
    /// Number of `f32` components (1 to 4).
    pub components: u32,
}

/// Everything the renderer needs to know about a compiled program.
#[derive(Clone, Debug, Default)]
pub struct ProgramReflection {
    attributes: Vec<VertexAttribute>,
    uniforms: HashMap<String, UniformLocation>,
    block_size: u32,
}

impl ProgramReflection {
    /// Parses, validates and reflects a WGSL program.
    pub fn from_wgsl(label: &str, source: &str) -> Result<Self, ShaderError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
            label: label.to_string(),
            log: e.emit_to_string(source),
        })?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            label: label.to_string(),
            log: e.emit_to_string(source),
        })?;

        for entry in [VERTEX_ENTRY, FRAGMENT_ENTRY] {
            if !module.entry_points.iter().any(|ep| ep.name == entry) {
                return Err(ShaderError::MissingEntryPoint {
                    label: label.to_string(),
                    entry,
                });
            }
        }

        let mut reflection = Self::default();

        let vertex = module
            .entry_points
            .iter()
            .find(|ep| matches!(ep.stage, ShaderStage::Vertex) && ep.name == VERTEX_ENTRY);
        if let Some(vertex) = vertex {
            for argument in &vertex.function.arguments {
                let inner = &module.types[argument.ty].inner;
                match (&argument.binding, inner) {
                    (Some(Binding::Location { location, .. }), _) => {
                        reflection.attributes.push(VertexAttribute {
                            name: argument.name.clone().unwrap_or_default(),
                            location: *location,
                            components: components(inner),
                        });
                    }
                    (None, TypeInner::Struct { members, .. }) => {
                        for member in members {
                            if let Some(Binding::Location { location, .. }) = member.binding {
                                reflection.attributes.push(VertexAttribute {
                                    name: member.name.clone().unwrap_or_default(),
                                    location,
                                    components: components(&module.types[member.ty].inner),
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        reflection.attributes.sort_by_key(|attribute| attribute.location);

        for (_, var) in module.global_variables.iter() {
            if !matches!(var.space, AddressSpace::Uniform) {
                continue;
            }
            let Some(binding) = &var.binding else {
                continue;
            };
            if binding.group != 0 || binding.binding != UNIFORM_BINDING {
                continue;
            }

            reflection.block_size = module.types[var.ty].inner.size(module.to_ctx());
            match &module.types[var.ty].inner {
                TypeInner::Struct { .. } => {
                    collect_fields(&module, var.ty, 0, &mut reflection.uniforms);
                }
                inner => {
                    if let Some(name) = &var.name {
                        reflection.uniforms.insert(
                            name.clone(),
                            UniformLocation {
                                offset: 0,
                                ty: UniformType::of(inner),
                            },
                        );
                    }
                }
            }
        }

        Ok(reflection)
    }

    /// Location of a named vertex input, if the vertex stage consumes it.
    pub fn attrib_location(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.location)
    }

    /// Every consumed vertex input, by ascending location.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Location of a named uniform field, if the block declares it.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }

    /// Every uniform leaf field with its location.
    pub fn uniforms(&self) -> impl Iterator<Item = (&str, UniformLocation)> + '_ {
        self.uniforms
            .iter()
            .map(|(name, location)| (name.as_str(), *location))
    }

    /// Size in bytes of the uniform block (0 when the program has none).
    pub fn block_size(&self) -> u32 {
        self.block_size
    }
}

fn components(inner: &TypeInner) -> u32 {
    match *inner {
        TypeInner::Vector { size, .. } => size as u32,
        _ => 1,
    }
}

fn collect_fields(
    module: &naga::Module,
    ty: Handle<Type>,
    base: u32,
    out: &mut HashMap<String, UniformLocation>,
) {
    let TypeInner::Struct { members, .. } = &module.types[ty].inner else {
        return;
    };

    for member in members {
        let offset = base + member.offset;
        let inner = &module.types[member.ty].inner;
        if let TypeInner::Struct { .. } = inner {
            collect_fields(module, member.ty, offset, out);
        } else if let Some(name) = &member.name {
            out.insert(
                name.clone(),
                UniformLocation {
                    offset,
                    ty: UniformType::of(inner),
                },
            );
        }
    }
}
