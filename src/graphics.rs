//! The capability surface the renderer draws through.
//!
//! Everything above this module talks to the GPU only via [`Graphics`]: buffers,
//! textures and programs are created through it and referred to afterwards by
//! opaque handles. [`WgpuGraphics`](crate::WgpuGraphics) implements it on top of
//! wgpu; tests use the recording implementation in [`testing`].
//!
//! The shape of the trait is deliberately close to an immediate-mode graphics
//! API: select a program, bind vertex buffers and textures, set uniforms one by
//! one, then issue an indexed draw.

use glam::{Mat4, Vec2, Vec3, Vec4};
use image::RgbaImage;

use crate::reflect::{ShaderError, UniformLocation};

/// Handle to a GPU buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) u32);

/// Handle to a GPU texture (2D or cube).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) u32);

/// Handle to a compiled shader program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) u32);

impl BufferId {
    /// Wraps a raw backend index.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl TextureId {
    /// Wraps a raw backend index.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl ProgramId {
    /// Wraps a raw backend index.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

/// What a buffer is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    /// Per-vertex attribute data (`f32` components).
    Vertex,
    /// Triangle indices (`u16`).
    Index,
}

/// Texture target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Texture2d,
    /// Six square faces, uploaded per layer in [`CubeFace`](crate::CubeFace) order.
    CubeMap,
}

/// Primitive assembly used for a draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Points,
    Lines,
    #[default]
    Triangles,
}

/// Per-frame clear values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearState {
    pub color: [f64; 4],
    pub depth: f32,
}

impl Default for ClearState {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, 0.0],
            depth: 1.0,
        }
    }
}

/// Immediate-mode style access to a GPU.
pub trait Graphics {
    /// Creates a buffer initialised with `bytes`.
    fn create_buffer(&mut self, kind: BufferKind, bytes: &[u8], label: &str) -> BufferId;

    /// Creates a texture whose every texel (and every face, for cube maps) is `fill`.
    fn create_texture(
        &mut self,
        kind: TextureKind,
        width: u32,
        height: u32,
        fill: [u8; 4],
        label: &str,
    ) -> TextureId;

    /// Replaces one layer of a texture and regenerates its mip chain.
    ///
    /// For 2D textures `layer` must be 0; the texture is reallocated when the
    /// image size differs from its current size. Cube faces must already
    /// match the face size.
    fn upload_texture(&mut self, texture: TextureId, layer: u32, image: &RgbaImage);

    /// Compiles a WGSL program with `vs`/`fs` entry points.
    fn compile_program(&mut self, label: &str, source: &str) -> Result<ProgramId, ShaderError>;

    /// Location of a vertex input the program consumes.
    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<u32>;

    /// Location of a uniform the program declares.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Starts a new frame, clearing colour and depth.
    fn begin_frame(&mut self, clear: ClearState);

    /// Selects the program used by subsequent binds, uniforms and draws.
    fn use_program(&mut self, program: ProgramId);

    fn bind_vertex_buffer(&mut self, location: u32, buffer: BufferId);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    fn uniform_1f(&mut self, location: UniformLocation, value: f32);

    fn uniform_1i(&mut self, location: UniformLocation, value: i32);

    fn uniform_2fv(&mut self, location: UniformLocation, value: Vec2);

    fn uniform_3fv(&mut self, location: UniformLocation, value: Vec3);

    fn uniform_4fv(&mut self, location: UniformLocation, value: Vec4);

    fn uniform_matrix_4fv(&mut self, location: UniformLocation, value: &Mat4);

    /// Draws `count` indices from `index_buffer` with the current state.
    fn draw_elements(&mut self, mode: DrawMode, index_buffer: BufferId, count: u32);
}

#[cfg(test)]
pub(crate) mod testing {
    //! A [`Graphics`] implementation that records every call.
    //!
    //! Programs are reflected with the real naga front end, so locations
    //! handed out by the recorder are the ones the wgpu backend would use.

    use super::*;
    use crate::reflect::ProgramReflection;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        CreateBuffer { kind: BufferKind, len: usize },
        CreateTexture { kind: TextureKind, width: u32, height: u32, fill: [u8; 4] },
        UploadTexture { texture: TextureId, layer: u32, width: u32, height: u32 },
        BeginFrame(ClearState),
        UseProgram(ProgramId),
        BindVertexBuffer { location: u32, buffer: BufferId },
        BindTexture { unit: u32, texture: TextureId },
        Uniform1f(UniformLocation, f32),
        Uniform1i(UniformLocation, i32),
        Uniform2fv(UniformLocation, Vec2),
        Uniform3fv(UniformLocation, Vec3),
        Uniform4fv(UniformLocation, Vec4),
        UniformMatrix4fv(UniformLocation, Mat4),
        DrawElements { mode: DrawMode, index_buffer: BufferId, count: u32 },
    }

    #[derive(Default)]
    pub struct Recorder {
        pub calls: Vec<Call>,
        pub buffers: Vec<Vec<u8>>,
        programs: Vec<ProgramReflection>,
        textures: u32,
    }

    impl Recorder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn clear(&mut self) {
            self.calls.clear();
        }

        /// Calls recorded after the most recent `BeginFrame`.
        pub fn frame_calls(&self) -> &[Call] {
            let start = self
                .calls
                .iter()
                .rposition(|call| matches!(call, Call::BeginFrame(_)))
                .map_or(0, |i| i + 1);
            &self.calls[start..]
        }

        pub fn draw_count(&self) -> usize {
            self.calls
                .iter()
                .filter(|call| matches!(call, Call::DrawElements { .. }))
                .count()
        }

        /// Reads back a vertex buffer as `f32` components.
        pub fn floats(&self, buffer: BufferId) -> Vec<f32> {
            bytemuck::pod_collect_to_vec(&self.buffers[buffer.0 as usize])
        }

        /// Reads back an index buffer as `u16` indices.
        pub fn indices(&self, buffer: BufferId) -> Vec<u16> {
            bytemuck::pod_collect_to_vec(&self.buffers[buffer.0 as usize])
        }

        /// Name of the program uniform a location was resolved from.
        pub fn uniform_name(&self, program: ProgramId, location: UniformLocation) -> Option<&str> {
            self.programs
                .get(program.0 as usize)?
                .uniforms()
                .find(|(_, loc)| *loc == location)
                .map(|(name, _)| name)
        }
    }

    impl Graphics for Recorder {
        fn create_buffer(&mut self, kind: BufferKind, bytes: &[u8], _label: &str) -> BufferId {
            self.calls.push(Call::CreateBuffer { kind, len: bytes.len() });
            self.buffers.push(bytes.to_vec());
            BufferId(self.buffers.len() as u32 - 1)
        }

        fn create_texture(
            &mut self,
            kind: TextureKind,
            width: u32,
            height: u32,
            fill: [u8; 4],
            _label: &str,
        ) -> TextureId {
            self.calls.push(Call::CreateTexture { kind, width, height, fill });
            self.textures += 1;
            TextureId(self.textures - 1)
        }

        fn upload_texture(&mut self, texture: TextureId, layer: u32, image: &RgbaImage) {
            self.calls.push(Call::UploadTexture {
                texture,
                layer,
                width: image.width(),
                height: image.height(),
            });
        }

        fn compile_program(&mut self, label: &str, source: &str) -> Result<ProgramId, ShaderError> {
            let reflection = ProgramReflection::from_wgsl(label, source)?;
            self.programs.push(reflection);
            Ok(ProgramId(self.programs.len() as u32 - 1))
        }

        fn attrib_location(&self, program: ProgramId, name: &str) -> Option<u32> {
            self.programs.get(program.0 as usize)?.attrib_location(name)
        }

        fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
            self.programs.get(program.0 as usize)?.uniform_location(name)
        }

        fn begin_frame(&mut self, clear: ClearState) {
            self.calls.push(Call::BeginFrame(clear));
        }

        fn use_program(&mut self, program: ProgramId) {
            self.calls.push(Call::UseProgram(program));
        }

        fn bind_vertex_buffer(&mut self, location: u32, buffer: BufferId) {
            self.calls.push(Call::BindVertexBuffer { location, buffer });
        }

        fn bind_texture(&mut self, unit: u32, texture: TextureId) {
            self.calls.push(Call::BindTexture { unit, texture });
        }

        fn uniform_1f(&mut self, location: UniformLocation, value: f32) {
            self.calls.push(Call::Uniform1f(location, value));
        }

        fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
            self.calls.push(Call::Uniform1i(location, value));
        }

        fn uniform_2fv(&mut self, location: UniformLocation, value: Vec2) {
            self.calls.push(Call::Uniform2fv(location, value));
        }

        fn uniform_3fv(&mut self, location: UniformLocation, value: Vec3) {
            self.calls.push(Call::Uniform3fv(location, value));
        }

        fn uniform_4fv(&mut self, location: UniformLocation, value: Vec4) {
            self.calls.push(Call::Uniform4fv(location, value));
        }

        fn uniform_matrix_4fv(&mut self, location: UniformLocation, value: &Mat4) {
            self.calls.push(Call::UniformMatrix4fv(location, *value));
        }

        fn draw_elements(&mut self, mode: DrawMode, index_buffer: BufferId, count: u32) {
            self.calls.push(Call::DrawElements {
                mode,
                index_buffer,
                count,
            });
        }
    }
}
