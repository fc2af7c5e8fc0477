use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::renderer::VertexLayout;

use super::handle::HandleAllocator;
use super::state::{resolve_draw, stage_uniform, DrawState, DrawTables, WarnOnce};
use super::uniform::{UniformSlots, UniformStorage};
use super::{
    BufferId, FilterMode, GfxError, GraphicsApi, ProgramId, ProgramSource, ReleaseQueue, Released,
    SamplerParams, TextureId, TextureUpload, UniformLocation, UniformValue, VertexArrayId,
    WrapMode, MAX_UNIFORM_BLOCK_SIZE,
};

/// Depth attachment format expected by [`WgpuGraphics::flush`].
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const MIN_UNIFORM_SLOTS: usize = 64;

struct ProgramEntry {
    vertex: wgpu::ShaderModule,
    vertex_entry: String,
    fragment: wgpu::ShaderModule,
    fragment_entry: String,
    uniforms: UniformStorage,
}

struct TextureEntry {
    // Kept alive for the bind group.
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct BufferEntry {
    buffer: wgpu::Buffer,
    capacity: u64,
    /// Bytes holding vertex data.
    len: u64,
}

struct VertexArrayEntry {
    buffer: BufferId,
    layout: VertexLayout,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct PipelineKey {
    program: ProgramId,
    layout: VertexLayout,
}

/// A validated draw waiting for the frame's render pass.
struct PendingDraw {
    key: PipelineKey,
    buffer: BufferId,
    /// The vertex buffer as it was when the draw was issued.
    vertices: wgpu::Buffer,
    texture: Option<TextureId>,
    first: u32,
    count: u32,
    uniform_slot: u32,
}

/// wgpu implementation of [`GraphicsApi`].
///
/// Draw calls are recorded during the frame and replayed by [`WgpuGraphics::flush`]
/// into a single render pass. Each draw gets its own slot in a dynamic-offset
/// uniform ring, so uniform values set between draws are preserved per draw.
/// A vertex buffer rewritten while draws against it are pending is replaced by
/// a new buffer, so those draws still read what they were issued with.
pub struct WgpuGraphics {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,

    handles: HandleAllocator,
    release: ReleaseQueue,
    state: DrawState,
    warn: WarnOnce,

    programs: HashMap<ProgramId, ProgramEntry>,
    textures: HashMap<TextureId, TextureEntry>,
    buffers: HashMap<BufferId, BufferEntry>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayEntry>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    uniform_bgl: wgpu::BindGroupLayout,
    texture_bgl: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    default_texture: TextureEntry,

    uniform_slots: UniformSlots,
    uniform_ubo: Option<wgpu::Buffer>,
    uniform_bind_group: Option<wgpu::BindGroup>,
    uniform_capacity: usize,

    pending: Vec<PendingDraw>,
}

impl WgpuGraphics {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, color_format: wgpu::TextureFormat) -> Self {
        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cubelab uniform bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cubelab texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cubelab pipeline layout"),
            bind_group_layouts: &[&uniform_bgl, &texture_bgl],
            immediate_size: 0,
        });

        let white = [super::MipLevel { width: 1, height: 1, pixels: vec![255; 4] }];
        let default_texture = upload_texture(
            device,
            queue,
            &texture_bgl,
            &TextureUpload { levels: &white, sampler: SamplerParams::default() },
            "cubelab default texture",
        );

        let min_alignment = device.limits().min_uniform_buffer_offset_alignment.max(1);
        let uniform_slots =
            UniformSlots::new(MAX_UNIFORM_BLOCK_SIZE.next_multiple_of(min_alignment));

        Self {
            device: device.clone(),
            queue: queue.clone(),
            color_format,
            handles: HandleAllocator::new(),
            release: ReleaseQueue::new(),
            state: DrawState::default(),
            warn: WarnOnce::default(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            pipelines: HashMap::new(),
            uniform_bgl,
            texture_bgl,
            pipeline_layout,
            default_texture,
            uniform_slots,
            uniform_ubo: None,
            uniform_bind_group: None,
            uniform_capacity: 0,
            pending: Vec::new(),
        }
    }

    /// Follows a surface format change. Cached pipelines are rebuilt on demand.
    pub fn set_color_format(&mut self, format: wgpu::TextureFormat) {
        if self.color_format != format {
            self.color_format = format;
            self.pipelines.clear();
        }
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    /// Replays every draw recorded since the last flush into one render pass.
    ///
    /// Color is cleared to `clear` and depth to 1.0 even when nothing was drawn.
    pub fn flush(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        clear: wgpu::Color,
    ) {
        // Mutating methods must happen before borrowing resources immutably.
        self.ensure_uniform_capacity(self.pending.len());
        if let Some(ubo) = self.uniform_ubo.as_ref() {
            if !self.uniform_slots.is_empty() {
                self.queue.write_buffer(ubo, 0, self.uniform_slots.bytes());
            }
        }

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("cubelab frame pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(uniform_bind_group) = self.uniform_bind_group.as_ref() {
                for draw in &self.pending {
                    let Some(pipeline) = self.pipelines.get(&draw.key) else { continue };
                    let texture = draw
                        .texture
                        .and_then(|t| self.textures.get(&t))
                        .unwrap_or(&self.default_texture);

                    rpass.set_pipeline(pipeline);
                    let uniform_offset = self.uniform_slots.offset(draw.uniform_slot);
                    rpass.set_bind_group(0, uniform_bind_group, &[uniform_offset]);
                    rpass.set_bind_group(1, &texture.bind_group, &[]);
                    rpass.set_vertex_buffer(0, draw.vertices.slice(..));
                    rpass.draw(draw.first..draw.first + draw.count, 0..1);
                }
            }
        }

        self.pending.clear();
        self.uniform_slots.clear();
    }

    fn ensure_uniform_capacity(&mut self, required_slots: usize) {
        if required_slots <= self.uniform_capacity && self.uniform_ubo.is_some() {
            return;
        }

        let new_cap = required_slots.next_power_of_two().max(MIN_UNIFORM_SLOTS);
        let ubo = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cubelab uniform ring"),
            size: new_cap as u64 * u64::from(self.uniform_slots.stride()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cubelab uniform bind group"),
            layout: &self.uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &ubo,
                    offset: 0,
                    size: wgpu::BufferSize::new(u64::from(MAX_UNIFORM_BLOCK_SIZE)),
                }),
            }],
        });

        log::debug!("WgpuGraphics: uniform ring grown to {new_cap} slots");
        self.uniform_ubo = Some(ubo);
        self.uniform_bind_group = Some(bind_group);
        self.uniform_capacity = new_cap;
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> bool {
        if self.pipelines.contains_key(&key) {
            return true;
        }
        let Some(program) = self.programs.get(&key.program) else { return false };

        let attributes: Vec<wgpu::VertexAttribute> = key
            .layout
            .attributes()
            .map(|a| wgpu::VertexAttribute {
                format: float_format(a.components),
                offset: u64::from(a.offset),
                shader_location: a.location,
            })
            .collect();

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("cubelab pipeline"),
            layout: Some(&self.pipeline_layout),

            vertex: wgpu::VertexState {
                module: &program.vertex,
                entry_point: Some(program.vertex_entry.as_str()),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: u64::from(key.layout.stride()),
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },

            fragment: Some(wgpu::FragmentState {
                module: &program.fragment,
                entry_point: Some(program.fragment_entry.as_str()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!(
            "WgpuGraphics: built pipeline for {} with {}+{} floats per vertex",
            key.program,
            key.layout.dim(),
            key.layout.tex_dim()
        );
        self.pipelines.insert(key, pipeline);
        true
    }

    fn record_draw(&mut self, first: u32, count: u32) -> Option<PendingDraw> {
        let draw = match resolve_draw(&self.state, &*self, first, count) {
            Ok(draw) => draw,
            Err(message) => {
                self.warn.warn(message);
                return None;
            }
        };
        let key = PipelineKey { program: draw.program, layout: draw.layout };
        if !self.ensure_pipeline(key) {
            return None;
        }
        let vertices = self.buffers.get(&draw.buffer)?.buffer.clone();
        let uniforms = self.programs.get(&draw.program)?.uniforms.bytes();
        let uniform_slot = self.uniform_slots.push(uniforms);

        Some(PendingDraw {
            key,
            buffer: draw.buffer,
            vertices,
            texture: draw.texture,
            first,
            count,
            uniform_slot,
        })
    }
}

impl DrawTables for WgpuGraphics {
    fn program_alive(&self, program: ProgramId) -> bool {
        self.programs.contains_key(&program)
    }

    fn vertex_array(&self, vertex_array: VertexArrayId) -> Option<(BufferId, VertexLayout)> {
        self.vertex_arrays.get(&vertex_array).map(|v| (v.buffer, v.layout))
    }

    fn vertices_in(&self, buffer: BufferId, layout: &VertexLayout) -> u32 {
        self.buffers
            .get(&buffer)
            .map_or(0, |b| (b.len / u64::from(layout.stride())) as u32)
    }

    fn texture_alive(&self, texture: TextureId) -> bool {
        self.textures.contains_key(&texture)
    }
}

impl GraphicsApi for WgpuGraphics {
    fn create_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramId, GfxError> {
        source.check()?;
        let id = ProgramId::from_raw(self.handles.alloc()?);

        let vertex = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cubelab vertex stage"),
            source: wgpu::ShaderSource::Wgsl(source.vertex.source.into()),
        });
        let fragment = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cubelab fragment stage"),
            source: wgpu::ShaderSource::Wgsl(source.fragment.source.into()),
        });

        self.programs.insert(
            id,
            ProgramEntry {
                vertex,
                vertex_entry: source.vertex.entry_point.to_string(),
                fragment,
                fragment_entry: source.fragment.entry_point.to_string(),
                uniforms: UniformStorage::new(source.uniforms.clone()),
            },
        );
        log::debug!("WgpuGraphics: created {id}");
        Ok(id)
    }

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<TextureId, GfxError> {
        upload.check()?;
        let id = TextureId::from_raw(self.handles.alloc()?);
        let entry = upload_texture(&self.device, &self.queue, &self.texture_bgl, upload, "cubelab texture");
        self.textures.insert(id, entry);
        log::debug!(
            "WgpuGraphics: created {id} ({}x{}, {} levels)",
            upload.width(),
            upload.height(),
            upload.levels.len()
        );
        Ok(id)
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferId, GfxError> {
        if data.is_empty() {
            return Err(GfxError::EmptyBuffer);
        }
        let id = BufferId::from_raw(self.handles.alloc()?);
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cubelab vertex buffer"),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let size = std::mem::size_of_val(data) as u64;
        self.buffers.insert(id, BufferEntry { buffer, capacity: size, len: size });
        log::debug!("WgpuGraphics: created {id} ({size} bytes)");
        Ok(id)
    }

    fn write_vertex_buffer(&mut self, buffer: BufferId, data: &[f32]) -> Result<(), GfxError> {
        if data.is_empty() {
            return Err(GfxError::EmptyBuffer);
        }
        let entry = self.buffers.get_mut(&buffer).ok_or(GfxError::UnknownHandle {
            kind: "buffer",
            raw: buffer.get(),
        })?;
        let size = std::mem::size_of_val(data) as u64;
        let in_flight = self.pending.iter().any(|d| d.buffer == buffer);
        if in_flight || size > entry.capacity {
            // Pending draws hold a clone of the old buffer and keep it alive.
            entry.buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("cubelab vertex buffer"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
            entry.capacity = size;
            log::debug!("WgpuGraphics: {buffer} reallocated at {size} bytes (in flight: {in_flight})");
        } else {
            self.queue.write_buffer(&entry.buffer, 0, bytemuck::cast_slice(data));
        }
        entry.len = size;
        Ok(())
    }

    fn create_vertex_array(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> Result<VertexArrayId, GfxError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(GfxError::UnknownHandle { kind: "buffer", raw: buffer.get() });
        }
        let id = VertexArrayId::from_raw(self.handles.alloc()?);
        self.vertex_arrays.insert(id, VertexArrayEntry { buffer, layout: *layout });
        log::debug!("WgpuGraphics: created {id} over {buffer}");
        Ok(id)
    }

    fn release_queue(&self) -> ReleaseQueue {
        self.release.clone()
    }

    fn collect_garbage(&mut self) {
        for released in self.release.drain() {
            let existed = match released {
                Released::Program(id) => {
                    self.pipelines.retain(|key, _| key.program != id);
                    self.programs.remove(&id).is_some()
                }
                Released::Texture(id) => self.textures.remove(&id).is_some(),
                Released::Buffer(id) => self.buffers.remove(&id).is_some(),
                Released::VertexArray(id) => self.vertex_arrays.remove(&id).is_some(),
            };
            if existed {
                self.state.forget(released);
                log::trace!("WgpuGraphics: released {released:?}");
            }
        }
    }

    fn active_texture(&mut self, unit: u32) {
        if !self.state.set_active_unit(unit) {
            self.warn.warn(format!("active_texture: unit {unit} out of range"));
        }
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.state.bind_texture(texture);
    }

    fn use_program(&mut self, program: ProgramId) {
        self.state.use_program(program);
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.uniforms.location(program, name)
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let current = self.state.program();
        let storage = current
            .and_then(|p| self.programs.get_mut(&p))
            .map(|p| &mut p.uniforms);
        stage_uniform(current, storage, location, value, &mut self.warn);
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.state.bind_vertex_array(vertex_array);
    }

    fn draw_arrays(&mut self, first: u32, count: u32) {
        if count == 0 {
            return;
        }
        if let Some(draw) = self.record_draw(first, count) {
            self.pending.push(draw);
        }
    }
}

fn float_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn address_mode(mode: WrapMode) -> wgpu::AddressMode {
    match mode {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn mipmap_filter_mode(mode: FilterMode) -> wgpu::MipmapFilterMode {
    match mode {
        FilterMode::Nearest => wgpu::MipmapFilterMode::Nearest,
        FilterMode::Linear => wgpu::MipmapFilterMode::Linear,
    }
}

/// Creates the texture, writes every mip level and builds its group-1 bind group.
/// `upload` must already be checked.
fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    upload: &TextureUpload<'_>,
    label: &str,
) -> TextureEntry {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: upload.width(),
            height: upload.height(),
            depth_or_array_layers: 1,
        },
        mip_level_count: upload.levels.len() as u32,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (mip, level) in upload.levels.iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: mip as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &level.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(level.width * 4),
                rows_per_image: Some(level.height),
            },
            wgpu::Extent3d {
                width: level.width,
                height: level.height,
                depth_or_array_layers: 1,
            },
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let params = upload.sampler;
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode(params.wrap_u),
        address_mode_v: address_mode(params.wrap_v),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter_mode(params.mag_filter),
        min_filter: filter_mode(params.min_filter),
        mipmap_filter: mipmap_filter_mode(params.mipmap_filter),
        ..Default::default()
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    });

    TextureEntry { _texture: texture, bind_group }
}
