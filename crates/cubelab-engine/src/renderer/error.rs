use crate::gfx::GfxError;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid vertex layout: dim {dim} (1..=4), tex_dim {tex_dim} (0..=4)")]
    InvalidLayout { dim: u32, tex_dim: u32 },

    #[error("{len} floats is not a multiple of {floats_per_vertex} floats per vertex")]
    Misaligned { len: usize, floats_per_vertex: u32 },

    #[error("vertex data is empty")]
    Empty,

    #[error("{vertex_count} vertices do not form a triangle list")]
    NotTriangles { vertex_count: usize },

    #[error("shader reads vertex attribute @location({location}) which the layout does not provide as floats")]
    IncompatibleShader { location: u32 },

    #[error(transparent)]
    Gfx(#[from] GfxError),
}
