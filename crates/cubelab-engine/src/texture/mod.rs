//! Sampled 2D textures loaded from image files.

mod image_data;
mod mipmap;

use std::path::{Path, PathBuf};

use crate::gfx::{GfxError, GraphicsApi, ReleaseQueue, Released, SamplerParams, TextureId, TextureUpload};

pub use image_data::ImageData;

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("texture image not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to decode texture image {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid texture image: {0}")]
    InvalidImage(String),

    #[error(transparent)]
    Gfx(#[from] GfxError),
}

/// An uploaded RGBA texture with repeat wrapping, linear filtering and mipmaps.
///
/// Owns its handle and releases it on drop. Share through `Rc`.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
    release: ReleaseQueue,
}

impl Texture {
    pub fn load_from_path<G: GraphicsApi>(gfx: &mut G, path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let image = ImageData::open(path)?;
        log::debug!(
            "decoded {} ({}x{}, {} channels)",
            path.display(),
            image.width,
            image.height,
            image.channels
        );
        Self::from_image(gfx, &image)
    }

    pub fn from_image<G: GraphicsApi>(gfx: &mut G, image: &ImageData) -> Result<Self, TextureError> {
        Self::with_sampler(gfx, image, SamplerParams::default())
    }

    pub fn with_sampler<G: GraphicsApi>(
        gfx: &mut G,
        image: &ImageData,
        sampler: SamplerParams,
    ) -> Result<Self, TextureError> {
        let rgba = image.to_rgba8()?;
        let levels = mipmap::mip_chain(image.width, image.height, rgba);
        let id = gfx.create_texture(&TextureUpload { levels: &levels, sampler })?;

        Ok(Self {
            id,
            width: image.width,
            height: image.height,
            release: gfx.release_queue(),
        })
    }

    /// Binds this texture to texture unit 0.
    pub fn activate<G: GraphicsApi>(&self, gfx: &mut G) {
        gfx.active_texture(0);
        gfx.bind_texture(self.id);
    }

    /// Binds this texture to whichever unit is currently active.
    pub fn bind<G: GraphicsApi>(&self, gfx: &mut G) {
        gfx.bind_texture(self.id);
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl From<&Texture> for u32 {
    fn from(texture: &Texture) -> u32 {
        texture.id.get()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.release.push(Released::Texture(self.id));
    }
}
