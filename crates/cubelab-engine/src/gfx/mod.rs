//! GL-style graphics command surface.
//!
//! The shader, texture and renderer layers talk to the GPU only through
//! [`GraphicsApi`]: integer handles, a bound-state machine and `draw_arrays`.
//! [`WgpuGraphics`] replays that stream into wgpu render passes;
//! [`HeadlessGraphics`] records it so the core can run without a device.
//!
//! Binding layout every program follows:
//! - `@group(0) @binding(0)`: uniform block, at most [`MAX_UNIFORM_BLOCK_SIZE`] bytes
//! - `@group(1) @binding(0)`: `texture_2d<f32>`
//! - `@group(1) @binding(1)`: `sampler`

mod handle;
mod headless;
mod release;
mod state;
mod types;
mod uniform;
mod wgpu_backend;

pub use handle::{BufferId, ProgramId, TextureId, VertexArrayId};
pub use headless::{Command, DrawRecord, HeadlessGraphics};
pub use release::{ReleaseQueue, Released};
pub use state::TEXTURE_UNITS;
pub use types::{FilterMode, MipLevel, ProgramSource, SamplerParams, StageSource, TextureUpload, WrapMode};
pub use uniform::{
    UniformBlock, UniformKind, UniformLocation, UniformMember, UniformValue, MAX_UNIFORM_BLOCK_SIZE,
};
pub use wgpu_backend::{WgpuGraphics, DEPTH_FORMAT};

use crate::renderer::VertexLayout;

#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("graphics handle space exhausted")]
    HandlesExhausted,

    #[error("unknown {kind} handle {raw}")]
    UnknownHandle { kind: &'static str, raw: u32 },

    #[error("invalid texture upload: {0}")]
    InvalidTexture(String),

    #[error("vertex buffer data is empty")]
    EmptyBuffer,

    #[error("uniform block of {size} bytes exceeds the {max}-byte limit")]
    UniformBlockTooLarge { size: u32, max: u32 },
}

/// The command surface consumed by `ShaderProgram`, `Texture` and `Renderer`.
///
/// Creation calls return typed errors. Per-frame calls never fail: misuse is
/// logged once per distinct cause and the affected call or draw is dropped.
pub trait GraphicsApi {
    fn create_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramId, GfxError>;

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<TextureId, GfxError>;

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferId, GfxError>;

    /// Replaces the contents of `buffer`, growing it if `data` is larger.
    fn write_vertex_buffer(&mut self, buffer: BufferId, data: &[f32]) -> Result<(), GfxError>;

    fn create_vertex_array(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> Result<VertexArrayId, GfxError>;

    /// Queue that owning types push their handles to when dropped.
    fn release_queue(&self) -> ReleaseQueue;

    /// Frees everything pushed to the release queue since the last call.
    fn collect_garbage(&mut self);

    fn active_texture(&mut self, unit: u32);

    /// Binds `texture` to the active unit.
    fn bind_texture(&mut self, texture: TextureId);

    fn use_program(&mut self, program: ProgramId);

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Writes into the uniform block of the program currently in use.
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    /// Looks up `name` and sets it. Returns `false` if the program has no such uniform.
    fn set_uniform_by_name(
        &mut self,
        program: ProgramId,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> bool
    where
        Self: Sized,
    {
        match self.uniform_location(program, name) {
            Some(location) => {
                self.set_uniform(location, value.into());
                true
            }
            None => false,
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId);

    /// Draws `count` vertices starting at `first` as a triangle list.
    fn draw_arrays(&mut self, first: u32, count: u32);
}
