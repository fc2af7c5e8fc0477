use std::collections::HashMap;

use glam::Mat4;

use crate::renderer::VertexLayout;

use super::handle::HandleAllocator;
use super::state::{resolve_draw, stage_uniform, DrawState, DrawTables, WarnOnce};
use super::uniform::UniformStorage;
use super::{
    BufferId, GfxError, GraphicsApi, ProgramId, ProgramSource, ReleaseQueue, Released, TextureId,
    TextureUpload, UniformLocation, UniformValue, VertexArrayId,
};

/// One call observed by [`HeadlessGraphics`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateProgram(ProgramId),
    CreateTexture { id: TextureId, width: u32, height: u32, levels: u32 },
    CreateVertexBuffer { id: BufferId, floats: usize },
    WriteVertexBuffer { id: BufferId, floats: usize },
    CreateVertexArray { id: VertexArrayId, buffer: BufferId, layout: VertexLayout },
    Release(Released),
    ActiveTexture(u32),
    BindTexture(TextureId),
    UseProgram(ProgramId),
    SetUniform { location: UniformLocation, value: UniformValue },
    BindVertexArray(VertexArrayId),
    DrawArrays { first: u32, count: u32 },
}

/// A draw that passed validation, with the state it captured.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramId,
    pub vertex_array: VertexArrayId,
    /// Texture on unit 0, `None` meaning the white default.
    pub texture: Option<TextureId>,
    pub first: u32,
    pub count: u32,
    pub uniforms: Vec<u8>,
    /// Floats of vertices `first..first + count` as stored when the draw was issued.
    pub vertices: Vec<f32>,
}

impl DrawRecord {
    /// `count` floats of the uniform snapshot from byte `offset`, or `None`
    /// if they run past the end of the block.
    pub fn uniform_f32s(&self, offset: u32, count: usize) -> Option<Vec<f32>> {
        let start = offset as usize;
        let bytes = self.uniforms.get(start..start.checked_add(count.checked_mul(4)?)?)?;
        Some(
            bytes
                .chunks_exact(4)
                .map(bytemuck::pod_read_unaligned::<f32>)
                .collect(),
        )
    }

    pub fn uniform_mat4(&self, offset: u32) -> Option<Mat4> {
        self.uniform_f32s(offset, 16).map(|cols| Mat4::from_cols_slice(&cols))
    }
}

struct VertexArrayEntry {
    buffer: BufferId,
    layout: VertexLayout,
}

/// Recording backend with no device behind it.
///
/// Applies the same validation and uniform staging rules as [`super::WgpuGraphics`],
/// so tests observe exactly which draws a real frame would contain.
#[derive(Default)]
pub struct HeadlessGraphics {
    handles: HandleAllocator,
    release: ReleaseQueue,
    state: DrawState,
    warn: WarnOnce,

    programs: HashMap<ProgramId, UniformStorage>,
    textures: HashMap<TextureId, (u32, u32)>,
    buffers: HashMap<BufferId, Vec<f32>>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayEntry>,

    commands: Vec<Command>,
    draws: Vec<DrawRecord>,
}

impl HeadlessGraphics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Clears the command and draw logs, keeping resources and bound state.
    pub fn clear_log(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[f32]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).copied()
    }

    pub fn vertex_array_buffer(&self, vertex_array: VertexArrayId) -> Option<BufferId> {
        self.vertex_arrays.get(&vertex_array).map(|v| v.buffer)
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.state.program()
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.state.texture(unit)
    }

    fn record_draw(&mut self, first: u32, count: u32) -> Option<DrawRecord> {
        let draw = match resolve_draw(&self.state, &*self, first, count) {
            Ok(draw) => draw,
            Err(message) => {
                self.warn.warn(message);
                return None;
            }
        };
        let fpv = draw.layout.floats_per_vertex() as usize;
        let range = first as usize * fpv..(first + count) as usize * fpv;
        Some(DrawRecord {
            program: draw.program,
            vertex_array: draw.vertex_array,
            texture: draw.texture,
            first,
            count,
            uniforms: self.programs.get(&draw.program)?.bytes().to_vec(),
            vertices: self.buffers.get(&draw.buffer)?.get(range)?.to_vec(),
        })
    }
}

impl DrawTables for HeadlessGraphics {
    fn program_alive(&self, program: ProgramId) -> bool {
        self.programs.contains_key(&program)
    }

    fn vertex_array(&self, vertex_array: VertexArrayId) -> Option<(BufferId, VertexLayout)> {
        self.vertex_arrays.get(&vertex_array).map(|v| (v.buffer, v.layout))
    }

    fn vertices_in(&self, buffer: BufferId, layout: &VertexLayout) -> u32 {
        self.buffers
            .get(&buffer)
            .map_or(0, |b| b.len() as u32 / layout.floats_per_vertex())
    }

    fn texture_alive(&self, texture: TextureId) -> bool {
        self.textures.contains_key(&texture)
    }
}

impl GraphicsApi for HeadlessGraphics {
    fn create_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramId, GfxError> {
        source.check()?;
        let id = ProgramId::from_raw(self.handles.alloc()?);
        self.programs.insert(id, UniformStorage::new(source.uniforms.clone()));
        self.commands.push(Command::CreateProgram(id));
        log::debug!("headless: created {id}");
        Ok(id)
    }

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<TextureId, GfxError> {
        upload.check()?;
        let id = TextureId::from_raw(self.handles.alloc()?);
        let (width, height) = (upload.width(), upload.height());
        self.textures.insert(id, (width, height));
        self.commands.push(Command::CreateTexture {
            id,
            width,
            height,
            levels: upload.levels.len() as u32,
        });
        log::debug!("headless: created {id} ({width}x{height})");
        Ok(id)
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferId, GfxError> {
        if data.is_empty() {
            return Err(GfxError::EmptyBuffer);
        }
        let id = BufferId::from_raw(self.handles.alloc()?);
        self.buffers.insert(id, data.to_vec());
        self.commands.push(Command::CreateVertexBuffer { id, floats: data.len() });
        log::debug!("headless: created {id} ({} floats)", data.len());
        Ok(id)
    }

    fn write_vertex_buffer(&mut self, buffer: BufferId, data: &[f32]) -> Result<(), GfxError> {
        if data.is_empty() {
            return Err(GfxError::EmptyBuffer);
        }
        let stored = self.buffers.get_mut(&buffer).ok_or(GfxError::UnknownHandle {
            kind: "buffer",
            raw: buffer.get(),
        })?;
        stored.clear();
        stored.extend_from_slice(data);
        self.commands.push(Command::WriteVertexBuffer { id: buffer, floats: data.len() });
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
        self.commands.push(Command::CreateVertexArray { id, buffer, layout: *layout });
        log::debug!("headless: created {id} over {buffer}");
        Ok(id)
    }

    fn release_queue(&self) -> ReleaseQueue {
        self.release.clone()
    }

    fn collect_garbage(&mut self) {
        for released in self.release.drain() {
            let existed = match released {
                Released::Program(id) => self.programs.remove(&id).is_some(),
                Released::Texture(id) => self.textures.remove(&id).is_some(),
                Released::Buffer(id) => self.buffers.remove(&id).is_some(),
                Released::VertexArray(id) => self.vertex_arrays.remove(&id).is_some(),
            };
            if existed {
                self.state.forget(released);
                self.commands.push(Command::Release(released));
                log::trace!("headless: released {released:?}");
            }
        }
    }

    fn active_texture(&mut self, unit: u32) {
        self.commands.push(Command::ActiveTexture(unit));
        if !self.state.set_active_unit(unit) {
            self.warn.warn(format!("active_texture: unit {unit} out of range"));
        }
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.commands.push(Command::BindTexture(texture));
        self.state.bind_texture(texture);
    }

    fn use_program(&mut self, program: ProgramId) {
        self.commands.push(Command::UseProgram(program));
        self.state.use_program(program);
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.location(program, name)
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.commands.push(Command::SetUniform { location, value });
        let current = self.state.program();
        let storage = current.and_then(|p| self.programs.get_mut(&p));
        stage_uniform(current, storage, location, value, &mut self.warn);
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.commands.push(Command::BindVertexArray(vertex_array));
        self.state.bind_vertex_array(vertex_array);
    }

    fn draw_arrays(&mut self, first: u32, count: u32) {
        self.commands.push(Command::DrawArrays { first, count });
        if count == 0 {
            return;
        }
        if let Some(record) = self.record_draw(first, count) {
            self.draws.push(record);
        }
    }
}
