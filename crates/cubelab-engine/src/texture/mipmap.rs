use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::gfx::MipLevel;

/// Builds the full mip chain for an RGBA8 base image, down to 1x1.
///
/// `rgba` must hold exactly `width * height * 4` bytes; otherwise no levels
/// are produced.
pub(crate) fn mip_chain(width: u32, height: u32, rgba: Vec<u8>) -> Vec<MipLevel> {
    let Some(base) = RgbaImage::from_raw(width, height, rgba) else {
        return Vec::new();
    };
    let levels = 32 - width.max(height).leading_zeros();

    let mut out = Vec::with_capacity(levels as usize);
    let mut prev = base;
    for level in 1..levels {
        let w = (width >> level).max(1);
        let h = (height >> level).max(1);
        let next = imageops::resize(&prev, w, h, FilterType::Triangle);
        out.push(MipLevel { width: prev.width(), height: prev.height(), pixels: prev.into_raw() });
        prev = next;
    }
    out.push(MipLevel { width: prev.width(), height: prev.height(), pixels: prev.into_raw() });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_halves_down_to_one() {
        let chain = mip_chain(8, 2, vec![255; 8 * 2 * 4]);
        let sizes: Vec<(u32, u32)> = chain.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
        assert!(chain.iter().all(|l| l.pixels.len() == (l.width * l.height * 4) as usize));
    }

    #[test]
    fn one_pixel_has_a_single_level() {
        assert_eq!(mip_chain(1, 1, vec![1, 2, 3, 4]).len(), 1);
        assert!(mip_chain(2, 2, vec![0; 3]).is_empty());
    }

    #[test]
    fn uniform_color_survives_downsampling() {
        let chain = mip_chain(4, 4, [10u8, 20, 30, 255].repeat(16));
        let last = &chain.last().unwrap().pixels;
        for (got, want) in last.iter().zip([10u8, 20, 30, 255]) {
            assert!(got.abs_diff(want) <= 1, "{got} vs {want}");
        }
    }
}
