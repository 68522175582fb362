//! # Scene Renderer
//!
//! **A small scene-graph renderer with multiple materials, cube maps and
//! asynchronous mesh loading.**
//!
//! A scene is an ordered list of positioned mesh instances, each carrying its
//! own material instance. Every frame the [`Renderer`] pushes the shared
//! globals and the material's parameters for each element and issues one
//! indexed draw through the [`Graphics`] trait, which [`WgpuGraphics`]
//! implements on top of wgpu.
//!
//! ## Quick Start
//!
//! ```no_run
//! use scene_renderer::*;
//!
//! fn main() -> Result<(), RunError> {
//!     init_logging(LoggingConfig::default());
//!     run_with_config(AppConfig::new().asset_root("web"), demo::setup)
//! }
//! ```
//!
//! ## Controls
//!
//! | Input | Effect |
//! |-------|--------|
//! | `L` / `A` | toggle lighting / texturing |
//! | `W` / `T` / `P` | draw lines / triangles / points |
//! | Up / Down | raise / lower the camera |
//! | Space | pause the view rotation |
//! | Left drag | rotate the scene |
//! | Wheel | pan the camera over the ground plane |

mod app;
mod assets;
mod camera;
mod context;
pub mod demo;
mod geometry;
mod gpu;
mod graphics;
mod input;
mod loader;
mod logging;
mod material;
mod mesh;
mod reflect;
mod registry;
mod renderer;
mod scene;
mod shaders;
mod texture;
mod wgpu_graphics;

pub use app::{AppConfig, RunError, SetupContext, run, run_with_config};
pub use assets::{AssetSource, FetchError, FileSource, MemorySource};
pub use camera::Camera;
pub use context::{Action, Light, RenderContext};
pub use geometry::{GeometryData, MAX_VERTICES, MeshError, parse_json, parse_obj};
pub use gpu::{GpuContext, GpuError};
pub use graphics::{
    BufferId, BufferKind, ClearState, DrawMode, Graphics, ProgramId, TextureId, TextureKind,
};
pub use input::Input;
pub use loader::{BatchOutcome, BatchReport, LoadError, MeshFormat, MeshLoader, MeshRequest};
pub use logging::{LoggingConfig, init_logging};
pub use material::{
    GlobalSlots, Lighting, Material, MaterialCatalog, MaterialInstance, MaterialKind,
    MaterialParams, Overrides, ParamSlots, TextureBinding, UniformValue, push_params,
};
pub use mesh::Mesh;
pub use reflect::{ProgramReflection, ShaderError, UniformLocation, UniformType};
pub use registry::Resources;
pub use renderer::{ElementMatrices, Renderer, TEXTURE_FLIP};
pub use scene::{Scene, SceneElement, Transform};
pub use texture::CubeFace;
pub use wgpu_graphics::WgpuGraphics;

// Re-export glam math types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};
