use super::{GfxError, UniformBlock, MAX_UNIFORM_BLOCK_SIZE};

/// One validated shader stage handed to the backend.
#[derive(Debug, Copy, Clone)]
pub struct StageSource<'a> {
    pub source: &'a str,
    pub entry_point: &'a str,
}

/// Everything a backend needs to build a program.
///
/// Stages arrive already parsed and checked; backends only compile them for
/// their target and allocate the uniform storage described by `uniforms`.
#[derive(Debug, Clone)]
pub struct ProgramSource<'a> {
    pub vertex: StageSource<'a>,
    pub fragment: StageSource<'a>,
    pub uniforms: Option<UniformBlock>,
}

impl ProgramSource<'_> {
    pub(crate) fn check(&self) -> Result<(), GfxError> {
        match &self.uniforms {
            Some(block) if block.size() > MAX_UNIFORM_BLOCK_SIZE => {
                Err(GfxError::UniformBlockTooLarge {
                    size: block.size(),
                    max: MAX_UNIFORM_BLOCK_SIZE,
                })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    MirrorRepeat,
    ClampToEdge,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Sampling parameters attached to a texture at creation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SamplerParams {
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mipmap_filter: FilterMode,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            wrap_u: WrapMode::Repeat,
            wrap_v: WrapMode::Repeat,
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
        }
    }
}

/// One RGBA8 mip level.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Texture creation request: a base level followed by its mip chain.
#[derive(Debug, Copy, Clone)]
pub struct TextureUpload<'a> {
    pub levels: &'a [MipLevel],
    pub sampler: SamplerParams,
}

impl TextureUpload<'_> {
    pub fn width(&self) -> u32 {
        self.levels.first().map_or(0, |l| l.width)
    }

    pub fn height(&self) -> u32 {
        self.levels.first().map_or(0, |l| l.height)
    }

    /// Each level must halve the previous one (rounding down, min 1) and hold
    /// exactly `width * height * 4` bytes.
    pub(crate) fn check(&self) -> Result<(), GfxError> {
        let Some(base) = self.levels.first() else {
            return Err(GfxError::InvalidTexture("no mip levels".into()));
        };
        if base.width == 0 || base.height == 0 {
            return Err(GfxError::InvalidTexture(format!(
                "zero-sized base level {}x{}",
                base.width, base.height
            )));
        }

        for (i, level) in self.levels.iter().enumerate() {
            let want_w = (base.width >> i).max(1);
            let want_h = (base.height >> i).max(1);
            if level.width != want_w || level.height != want_h {
                return Err(GfxError::InvalidTexture(format!(
                    "mip level {i} is {}x{}, expected {want_w}x{want_h}",
                    level.width, level.height
                )));
            }
            let want_len = want_w as usize * want_h as usize * 4;
            if level.pixels.len() != want_len {
                return Err(GfxError::InvalidTexture(format!(
                    "mip level {i} holds {} bytes, expected {want_len}",
                    level.pixels.len()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{UniformKind, UniformMember};

    fn level(w: u32, h: u32) -> MipLevel {
        MipLevel { width: w, height: h, pixels: vec![255; (w * h * 4) as usize] }
    }

    #[test]
    fn a_proper_chain_passes() {
        let levels = [level(4, 2), level(2, 1), level(1, 1)];
        let upload = TextureUpload { levels: &levels, sampler: SamplerParams::default() };
        assert!(upload.check().is_ok());
        assert_eq!((upload.width(), upload.height()), (4, 2));
    }

    #[test]
    fn empty_and_short_levels_are_rejected() {
        let upload = TextureUpload { levels: &[], sampler: SamplerParams::default() };
        assert!(matches!(upload.check(), Err(GfxError::InvalidTexture(_))));

        let mut short = level(2, 2);
        short.pixels.pop();
        let levels = [short];
        let upload = TextureUpload { levels: &levels, sampler: SamplerParams::default() };
        assert!(matches!(upload.check(), Err(GfxError::InvalidTexture(_))));
    }

    #[test]
    fn oversized_uniform_block_is_rejected() {
        let block = UniformBlock::new(
            320,
            (0..5)
                .map(|i| UniformMember {
                    name: format!("m{i}"),
                    offset: i * 64,
                    kind: UniformKind::Mat4,
                })
                .collect(),
        );
        let stage = StageSource { source: "", entry_point: "main" };
        let source = ProgramSource { vertex: stage, fragment: stage, uniforms: Some(block) };
        assert!(matches!(
            source.check(),
            Err(GfxError::UniformBlockTooLarge { size: 320, max: 256 })
        ));
    }
}
