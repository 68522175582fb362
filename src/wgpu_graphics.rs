//! [`Graphics`] on top of wgpu.
//!
//! wgpu has no notion of "current program" or loose uniforms, so this backend
//! keeps that state on the CPU and turns it into wgpu objects when the frame is
//! presented:
//!
//! - Every program owns a CPU copy of its uniform block, laid out from naga
//!   reflection. `uniform_*` calls write into it by byte offset.
//! - `draw_elements` snapshots the block into a per-frame uniform arena (each
//!   snapshot aligned to the device's uniform offset alignment) and records a
//!   [`DrawCommand`] with the currently bound buffers and textures.
//! - [`WgpuGraphics::present`] uploads the arena once, opens a single render
//!   pass with a depth attachment and replays the recorded draws.
//!
//! Render pipelines are created lazily and cached per (program, primitive mode).
//! All programs share one bind group layout:
//!
//! | Binding | Resource |
//! |---------|----------|
//! | 0 | uniform block `u` |
//! | 1 | `color_texture` (2D, texture unit 0) |
//! | 2 | `environment` (cube, texture unit 1) |
//! | 3 | `linear_sampler` |

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;

use glam::{Mat4, Vec2, Vec3, Vec4};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::gpu::GpuContext;
use crate::graphics::{
    BufferId, BufferKind, ClearState, DrawMode, Graphics, ProgramId, TextureId, TextureKind,
};
use crate::reflect::{
    FRAGMENT_ENTRY, ProgramReflection, ShaderError, UniformLocation, UniformType, VERTEX_ENTRY,
};
use crate::texture;

/// Texture unit sampled as `color_texture`.
pub const COLOR_TEXTURE_UNIT: u32 = 0;
/// Texture unit sampled as `environment`.
pub const ENVIRONMENT_UNIT: u32 = 1;

// Kind sampled by each texture unit.
const UNIT_KINDS: [TextureKind; 2] = [TextureKind::Texture2d, TextureKind::CubeMap];

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
// Bound for programs without a uniform block.
const EMPTY_BLOCK_SIZE: u64 = 16;

struct GpuProgram {
    label: String,
    module: wgpu::ShaderModule,
    reflection: ProgramReflection,
    block: Vec<u8>,
}

struct GpuTexture {
    kind: TextureKind,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// One recorded draw, replayed by [`WgpuGraphics::present`].
struct DrawCommand {
    program: ProgramId,
    mode: DrawMode,
    /// Vertex buffers in pipeline slot order (ascending attribute location).
    vertex_buffers: Vec<BufferId>,
    index_buffer: BufferId,
    count: u32,
    uniform_offset: u64,
    uniform_size: u64,
    color_texture: Option<TextureId>,
    environment: Option<TextureId>,
}

/// The wgpu implementation of [`Graphics`].
pub struct WgpuGraphics {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    uniform_alignment: u64,

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    white_2d: GpuTexture,
    white_cube: GpuTexture,
    depth_view: wgpu::TextureView,
    depth_size: (u32, u32),

    buffers: Vec<wgpu::Buffer>,
    textures: Vec<GpuTexture>,
    programs: Vec<GpuProgram>,
    pipelines: HashMap<(ProgramId, DrawMode), wgpu::RenderPipeline>,

    clear: ClearState,
    current_program: Option<ProgramId>,
    vertex_bindings: HashMap<u32, BufferId>,
    texture_units: [Option<TextureId>; 2],
    misbound: HashSet<(u32, TextureId)>,
    uniform_arena: Vec<u8>,
    commands: Vec<DrawCommand>,
}

impl WgpuGraphics {
    /// Creates the backend for the surface described by `gpu`.
    pub fn new(gpu: &GpuContext) -> Self {
        let device = gpu.device.clone();
        let queue = gpu.queue.clone();

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Material Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white = texture::solid(1, 1, [255, 255, 255, 255]);
        let white_2d = allocate_texture(&device, TextureKind::Texture2d, 1, 1, "White 2D");
        write_mips(&queue, &white_2d.texture, 0, &white);
        let white_cube = allocate_texture(&device, TextureKind::CubeMap, 1, 1, "White Cube");
        for layer in 0..6 {
            write_mips(&queue, &white_cube.texture, layer, &white);
        }

        let depth_view = create_depth_view(&device, gpu.width(), gpu.height());

        Self {
            uniform_alignment: device.limits().min_uniform_buffer_offset_alignment as u64,
            surface_format: gpu.config.format,
            device,
            queue,
            bind_group_layout,
            pipeline_layout,
            sampler,
            white_2d,
            white_cube,
            depth_view,
            depth_size: (gpu.width(), gpu.height()),
            buffers: Vec::new(),
            textures: Vec::new(),
            programs: Vec::new(),
            pipelines: HashMap::new(),
            clear: ClearState::default(),
            current_program: None,
            vertex_bindings: HashMap::new(),
            texture_units: [None; 2],
            misbound: HashSet::new(),
            uniform_arena: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Submits every draw recorded since [`begin_frame`](Graphics::begin_frame)
    /// and presents the surface texture.
    pub fn present(&mut self, gpu: &GpuContext) -> Result<(), wgpu::SurfaceError> {
        let commands = std::mem::take(&mut self.commands);
        let arena = std::mem::take(&mut self.uniform_arena);

        let output = gpu.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        for command in &commands {
            self.ensure_pipeline(command.program, command.mode);
        }
        self.ensure_depth(gpu.width(), gpu.height());

        let uniforms = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Frame Uniforms"),
                contents: if arena.is_empty() {
                    &[0; EMPTY_BLOCK_SIZE as usize]
                } else {
                    &arena
                },
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_groups: Vec<wgpu::BindGroup> = commands
            .iter()
            .map(|command| self.bind_group(&uniforms, command))
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Encoder"),
            });

        {
            let [r, g, b, a] = self.clear.color;

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear.depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (command, bind_group) in commands.iter().zip(&bind_groups) {
                let Some(pipeline) = self.pipelines.get(&(command.program, command.mode)) else {
                    continue;
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, bind_group, &[]);
                for (slot, buffer) in command.vertex_buffers.iter().enumerate() {
                    let buffer = &self.buffers[buffer.0 as usize];
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                render_pass.set_index_buffer(
                    self.buffers[command.index_buffer.0 as usize].slice(..),
                    wgpu::IndexFormat::Uint16,
                );
                render_pass.draw_indexed(0..command.count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Number of draws recorded for the current frame.
    pub fn pending_draws(&self) -> usize {
        self.commands.len()
    }

    /// Recreates the depth buffer when the surface size changed.
    fn ensure_depth(&mut self, width: u32, height: u32) {
        if self.depth_size != (width, height) {
            self.depth_view = create_depth_view(&self.device, width, height);
            self.depth_size = (width, height);
        }
    }

    fn ensure_pipeline(&mut self, program_id: ProgramId, mode: DrawMode) {
        if self.pipelines.contains_key(&(program_id, mode)) {
            return;
        }
        let Some(program) = self.programs.get(program_id.0 as usize) else {
            return;
        };

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = program
            .reflection
            .attributes()
            .iter()
            .map(|attribute| {
                [wgpu::VertexAttribute {
                    format: vertex_format(attribute.components),
                    offset: 0,
                    shader_location: attribute.location,
                }]
            })
            .collect();
        let layouts: Vec<wgpu::VertexBufferLayout> = program
            .reflection
            .attributes()
            .iter()
            .zip(&attributes)
            .map(|(attribute, attrs)| wgpu::VertexBufferLayout {
                array_stride: attribute.components as u64 * 4,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attrs,
            })
            .collect();

        let topology = match mode {
            DrawMode::Points => wgpu::PrimitiveTopology::PointList,
            DrawMode::Lines => wgpu::PrimitiveTopology::LineList,
            DrawMode::Triangles => wgpu::PrimitiveTopology::TriangleList,
        };

        let label = format!("{} {:?} Pipeline", program.label, mode);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.module,
                    entry_point: Some(VERTEX_ENTRY),
                    buffers: &layouts,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.module,
                    entry_point: Some(FRAGMENT_ENTRY),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.surface_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        log::debug!("created pipeline '{}'", label);
        self.pipelines.insert((program_id, mode), pipeline);
    }

    fn bind_group(&self, uniforms: &wgpu::Buffer, command: &DrawCommand) -> wgpu::BindGroup {
        let color = self.texture_view(command.color_texture, TextureKind::Texture2d);
        let environment = self.texture_view(command.environment, TextureKind::CubeMap);

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: uniforms,
                        offset: command.uniform_offset,
                        size: NonZeroU64::new(command.uniform_size),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(color),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(environment),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// The bound texture when it has the expected kind, the white fallback otherwise.
    fn texture_view(&self, texture: Option<TextureId>, kind: TextureKind) -> &wgpu::TextureView {
        let fallback = match kind {
            TextureKind::Texture2d => &self.white_2d.view,
            TextureKind::CubeMap => &self.white_cube.view,
        };
        match texture.and_then(|id| self.textures.get(id.0 as usize)) {
            Some(texture) if texture.kind == kind => &texture.view,
            _ => fallback,
        }
    }

    fn write_uniform(&mut self, location: UniformLocation, bytes: &[u8]) {
        let Some(program) = self
            .current_program
            .and_then(|id| self.programs.get_mut(id.0 as usize))
        else {
            log::warn!("uniform set with no program in use");
            return;
        };

        let start = location.offset() as usize;
        let end = start + bytes.len();
        match program.block.get_mut(start..end) {
            Some(slot) => slot.copy_from_slice(bytes),
            None => log::warn!(
                "uniform at offset {} does not fit the block of '{}'",
                start,
                program.label
            ),
        }
    }
}

impl Graphics for WgpuGraphics {
    fn create_buffer(&mut self, kind: BufferKind, bytes: &[u8], label: &str) -> BufferId {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytes,
                usage,
            });
        self.buffers.push(buffer);
        BufferId(self.buffers.len() as u32 - 1)
    }

    fn create_texture(
        &mut self,
        kind: TextureKind,
        width: u32,
        height: u32,
        fill: [u8; 4],
        label: &str,
    ) -> TextureId {
        let texture = allocate_texture(&self.device, kind, width, height, label);

        // New textures start out zeroed.
        if fill != [0; 4] {
            let image = texture::solid(width, height, fill);
            for layer in 0..layer_count(kind) {
                write_mips(&self.queue, &texture.texture, layer, &image);
            }
        }

        self.textures.push(texture);
        TextureId(self.textures.len() as u32 - 1)
    }

    fn upload_texture(&mut self, texture: TextureId, layer: u32, image: &RgbaImage) {
        let Some(target) = self.textures.get(texture.0 as usize) else {
            log::warn!("upload to unknown texture {:?}", texture);
            return;
        };

        match target.kind {
            TextureKind::Texture2d => {
                let (width, height) = image.dimensions();
                if (target.width, target.height) != (width, height) {
                    let label = format!("Texture {}", texture.0);
                    self.textures[texture.0 as usize] = allocate_texture(
                        &self.device,
                        TextureKind::Texture2d,
                        width,
                        height,
                        &label,
                    );
                }
                write_mips(&self.queue, &self.textures[texture.0 as usize].texture, 0, image);
            }
            TextureKind::CubeMap => {
                if layer >= 6 {
                    log::warn!("cube map layer {} out of range", layer);
                    return;
                }
                let face = texture::fit_square_ref(image, target.width);
                write_mips(&self.queue, &target.texture, layer, &face);
            }
        }
    }

    fn compile_program(&mut self, label: &str, source: &str) -> Result<ProgramId, ShaderError> {
        let reflection = ProgramReflection::from_wgsl(label, source)?;
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

        let block = vec![0; reflection.block_size() as usize];
        self.programs.push(GpuProgram {
            label: label.to_string(),
            module,
            reflection,
            block,
        });
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs
            .get(program.0 as usize)?
            .reflection
            .attrib_location(name)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs
            .get(program.0 as usize)?
            .reflection
            .uniform_location(name)
    }

    fn begin_frame(&mut self, clear: ClearState) {
        self.clear = clear;
        self.commands.clear();
        self.uniform_arena.clear();
        self.current_program = None;
        self.vertex_bindings.clear();
        self.texture_units = [None; 2];
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.programs.get(program.0 as usize).is_none() {
            log::warn!("use of unknown program {:?}", program);
            self.current_program = None;
            return;
        }
        self.current_program = Some(program);
    }

    fn bind_vertex_buffer(&mut self, location: u32, buffer: BufferId) {
        self.vertex_bindings.insert(location, buffer);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        match self.texture_units.get_mut(unit as usize) {
            Some(slot) => *slot = Some(texture),
            None => {
                log::warn!("texture unit {} is not supported", unit);
                return;
            }
        }

        let expected = UNIT_KINDS[unit as usize];
        if let Some(bound) = self.textures.get(texture.0 as usize)
            && first_misbinding(&mut self.misbound, unit, texture, expected, bound.kind)
        {
            log::warn!(
                "{:?} bound to a {:?} unit ({}), sampling white instead",
                texture,
                expected,
                unit
            );
        }
    }

    fn uniform_1f(&mut self, location: UniformLocation, value: f32) {
        match location.ty() {
            UniformType::Int | UniformType::Uint => {
                self.write_uniform(location, &(value as i32).to_ne_bytes())
            }
            _ => self.write_uniform(location, &value.to_ne_bytes()),
        }
    }

    fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
        match location.ty() {
            UniformType::Float => self.write_uniform(location, &(value as f32).to_ne_bytes()),
            _ => self.write_uniform(location, &value.to_ne_bytes()),
        }
    }

    fn uniform_2fv(&mut self, location: UniformLocation, value: Vec2) {
        self.write_uniform(location, bytemuck::cast_slice(&value.to_array()));
    }

    fn uniform_3fv(&mut self, location: UniformLocation, value: Vec3) {
        self.write_uniform(location, bytemuck::cast_slice(&value.to_array()));
    }

    fn uniform_4fv(&mut self, location: UniformLocation, value: Vec4) {
        self.write_uniform(location, bytemuck::cast_slice(&value.to_array()));
    }

    fn uniform_matrix_4fv(&mut self, location: UniformLocation, value: &Mat4) {
        self.write_uniform(location, bytemuck::cast_slice(&value.to_cols_array()));
    }

    fn draw_elements(&mut self, mode: DrawMode, index_buffer: BufferId, count: u32) {
        let Some(program_id) = self.current_program else {
            log::warn!("draw with no program in use");
            return;
        };
        if count == 0 {
            return;
        }
        let program = &self.programs[program_id.0 as usize];

        let mut vertex_buffers = Vec::with_capacity(program.reflection.attributes().len());
        for attribute in program.reflection.attributes() {
            match self.vertex_bindings.get(&attribute.location) {
                Some(buffer) => vertex_buffers.push(*buffer),
                None => {
                    log::warn!(
                        "'{}' reads '{}' (location {}) but no buffer is bound, skipping draw",
                        program.label,
                        attribute.name,
                        attribute.location
                    );
                    return;
                }
            }
        }

        let aligned = self.uniform_arena.len().next_multiple_of(self.uniform_alignment as usize);
        self.uniform_arena.resize(aligned, 0);
        let uniform_size = if program.block.is_empty() {
            self.uniform_arena.resize(aligned + EMPTY_BLOCK_SIZE as usize, 0);
            EMPTY_BLOCK_SIZE
        } else {
            self.uniform_arena.extend_from_slice(&program.block);
            program.block.len() as u64
        };

        self.commands.push(DrawCommand {
            program: program_id,
            mode,
            vertex_buffers,
            index_buffer,
            count,
            uniform_offset: aligned as u64,
            uniform_size,
            color_texture: self.texture_units[COLOR_TEXTURE_UNIT as usize],
            environment: self.texture_units[ENVIRONMENT_UNIT as usize],
        });
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn layer_count(kind: TextureKind) -> u32 {
    match kind {
        TextureKind::Texture2d => 1,
        TextureKind::CubeMap => 6,
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn allocate_texture(
    device: &wgpu::Device,
    kind: TextureKind,
    width: u32,
    height: u32,
    label: &str,
) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: layer_count(kind),
        },
        mip_level_count: texture::mip_level_count(width, height),
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let dimension = match kind {
        TextureKind::Texture2d => wgpu::TextureViewDimension::D2,
        TextureKind::CubeMap => wgpu::TextureViewDimension::Cube,
    };
    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(label),
        dimension: Some(dimension),
        ..Default::default()
    });

    GpuTexture {
        kind,
        texture,
        view,
        width,
        height,
    }
}

/// True the first time `texture` is bound to `unit` with the wrong kind.
fn first_misbinding(
    reported: &mut HashSet<(u32, TextureId)>,
    unit: u32,
    texture: TextureId,
    expected: TextureKind,
    actual: TextureKind,
) -> bool {
    expected != actual && reported.insert((unit, texture))
}

/// Writes `image` and its generated mip chain into one layer of `texture`.
fn write_mips(queue: &wgpu::Queue, texture: &wgpu::Texture, layer: u32, image: &RgbaImage) {
    for (level, mip) in texture::mip_chain(image)
        .iter()
        .take(texture.mip_level_count() as usize)
        .enumerate()
    {
        let (width, height) = mip.dimensions();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: level as u32,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            mip.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misbinding_is_reported_once_per_unit_and_texture() {
        let mut reported = HashSet::new();
        let sky = TextureId::from_raw(3);
        let (flat, cube) = (TextureKind::Texture2d, TextureKind::CubeMap);

        assert!(first_misbinding(&mut reported, 0, sky, flat, cube));
        assert!(!first_misbinding(&mut reported, 0, sky, flat, cube));
        assert!(first_misbinding(&mut reported, 1, TextureId::from_raw(4), cube, flat));
        assert!(!first_misbinding(&mut reported, 1, sky, cube, cube));
        assert_eq!(reported.len(), 2);
    }
}
