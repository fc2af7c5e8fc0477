use super::RenderError;

const F32_SIZE: u32 = std::mem::size_of::<f32>() as u32;

/// One attribute slot read from an interleaved vertex stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    /// Byte offset from the start of a vertex.
    pub offset: u32,
}

/// Interleaved `[position; dim][texcoord; tex_dim]` vertex layout.
///
/// Position is attribute 0 at offset 0. Texture coordinates are attribute 1,
/// placed directly after the position floats, and omitted when `tex_dim == 0`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexLayout {
    dim: u32,
    tex_dim: u32,
}

impl VertexLayout {
    pub fn interleaved(dim: u32, tex_dim: u32) -> Result<Self, RenderError> {
        if !(1..=4).contains(&dim) || tex_dim > 4 {
            return Err(RenderError::InvalidLayout { dim, tex_dim });
        }
        Ok(Self { dim, tex_dim })
    }

    pub fn dim(&self) -> u32 {
        self.dim
    }

    pub fn tex_dim(&self) -> u32 {
        self.tex_dim
    }

    pub fn floats_per_vertex(&self) -> u32 {
        self.dim + self.tex_dim
    }

    /// Bytes between consecutive vertices.
    pub fn stride(&self) -> u32 {
        self.floats_per_vertex() * F32_SIZE
    }

    pub fn position(&self) -> VertexAttribute {
        VertexAttribute { location: 0, components: self.dim, offset: 0 }
    }

    pub fn tex_coords(&self) -> Option<VertexAttribute> {
        (self.tex_dim > 0).then(|| VertexAttribute {
            location: 1,
            components: self.tex_dim,
            offset: self.dim * F32_SIZE,
        })
    }

    pub fn attributes(&self) -> impl Iterator<Item = VertexAttribute> {
        std::iter::once(self.position()).chain(self.tex_coords())
    }

    pub fn attribute(&self, location: u32) -> Option<VertexAttribute> {
        self.attributes().find(|a| a.location == location)
    }

    /// Validates a stream of `len` floats and returns its vertex count.
    pub fn vertex_count(&self, len: usize) -> Result<u32, RenderError> {
        if len == 0 {
            return Err(RenderError::Empty);
        }
        let per_vertex = self.floats_per_vertex() as usize;
        if len % per_vertex != 0 {
            return Err(RenderError::Misaligned {
                len,
                floats_per_vertex: self.floats_per_vertex(),
            });
        }
        let vertex_count = len / per_vertex;
        if vertex_count % 3 != 0 {
            return Err(RenderError::NotTriangles { vertex_count });
        }
        u32::try_from(vertex_count).map_err(|_| RenderError::NotTriangles { vertex_count })
    }
}
