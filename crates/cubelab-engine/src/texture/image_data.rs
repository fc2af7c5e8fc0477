use std::path::Path;

use super::TextureError;

/// Decoded pixels as they came out of the image file.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    /// 1 (gray), 2 (gray + alpha), 3 (RGB) or 4 (RGBA).
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// Decodes `path`, keeping 8-bit channel data in the file's channel count.
    pub fn open(path: &Path) -> Result<Self, TextureError> {
        let img = image::open(path).map_err(|e| match e {
            image::ImageError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
                TextureError::NotFound { path: path.to_path_buf() }
            }
            other => TextureError::Decode { path: path.to_path_buf(), source: other },
        })?;

        let (width, height) = (img.width(), img.height());
        let (channels, pixels) = match img.color().channel_count() {
            1 => (1, img.into_luma8().into_raw()),
            2 => (2, img.into_luma_alpha8().into_raw()),
            3 => (3, img.into_rgb8().into_raw()),
            _ => (4, img.into_rgba8().into_raw()),
        };

        Ok(Self { width, height, channels, pixels })
    }

    pub(crate) fn check(&self) -> Result<(), TextureError> {
        if self.width == 0 || self.height == 0 {
            return Err(TextureError::InvalidImage(format!(
                "zero-sized image {}x{}",
                self.width, self.height
            )));
        }
        if !(1..=4).contains(&self.channels) {
            return Err(TextureError::InvalidImage(format!(
                "unsupported channel count {}",
                self.channels
            )));
        }
        let want = self.width as usize * self.height as usize * self.channels as usize;
        if self.pixels.len() < want {
            return Err(TextureError::InvalidImage(format!(
                "{} bytes of pixel data, {}x{}x{} needs {want}",
                self.pixels.len(),
                self.width,
                self.height,
                self.channels
            )));
        }
        Ok(())
    }

    /// Expands to tightly packed RGBA8. Gray is replicated across RGB and
    /// missing alpha becomes opaque.
    pub(crate) fn to_rgba8(&self) -> Result<Vec<u8>, TextureError> {
        self.check()?;
        let n = self.width as usize * self.height as usize;
        let c = self.channels as usize;
        let src = &self.pixels[..n * c];

        let mut out = Vec::with_capacity(n * 4);
        for px in src.chunks_exact(c) {
            let rgba = match *px {
                [g] => [g, g, g, 255],
                [g, a] => [g, g, g, a],
                [r, g, b] => [r, g, b, 255],
                [r, g, b, a] => [r, g, b, a],
                _ => unreachable!("channel count checked above"),
            };
            out.extend_from_slice(&rgba);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(channels: u8, pixels: Vec<u8>) -> ImageData {
        ImageData { width: 1, height: 1, channels, pixels }
    }

    #[test]
    fn expands_every_channel_count() {
        assert_eq!(image(1, vec![7]).to_rgba8().unwrap(), vec![7, 7, 7, 255]);
        assert_eq!(image(2, vec![7, 9]).to_rgba8().unwrap(), vec![7, 7, 7, 9]);
        assert_eq!(image(3, vec![1, 2, 3]).to_rgba8().unwrap(), vec![1, 2, 3, 255]);
        assert_eq!(image(4, vec![1, 2, 3, 4]).to_rgba8().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn short_buffer_is_invalid() {
        let img = ImageData { width: 2, height: 2, channels: 3, pixels: vec![0; 11] };
        assert!(matches!(img.to_rgba8(), Err(TextureError::InvalidImage(_))));
    }

    #[test]
    fn zero_size_and_bad_channels_are_invalid() {
        let img = ImageData { width: 0, height: 4, channels: 4, pixels: vec![] };
        assert!(matches!(img.check(), Err(TextureError::InvalidImage(_))));
        assert!(matches!(image(5, vec![0; 5]).check(), Err(TextureError::InvalidImage(_))));
    }
}
