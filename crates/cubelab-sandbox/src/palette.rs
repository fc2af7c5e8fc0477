//! Weighted choice of the cube face texture.

use rand::rngs::StdRng;
use rand::RngExt;

#[derive(Debug, Clone, PartialEq)]
pub struct PaletteEntry {
    /// File name under the texture directory.
    pub file: String,
    pub weight: u32,
}

impl PaletteEntry {
    pub fn new(file: impl Into<String>, weight: u32) -> Self {
        Self { file: file.into(), weight }
    }
}

/// Texture files with integer weights. Zero-weight entries are never picked.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Default for Palette {
    /// The eight "frame" colors, 26 weight in total.
    fn default() -> Self {
        Self::new(vec![
            PaletteEntry::new("frame_yellow.png", 2),
            PaletteEntry::new("frame_cian.png", 3),
            PaletteEntry::new("frame_magenta.png", 4),
            PaletteEntry::new("frame_red.png", 7),
            PaletteEntry::new("frame_green.png", 4),
            PaletteEntry::new("frame_blue.png", 3),
            PaletteEntry::new("frame_white.png", 2),
            PaletteEntry::new("frame_black.png", 1),
        ])
    }
}

impl Palette {
    pub fn new(entries: Vec<PaletteEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn total_weight(&self) -> u32 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// Maps `roll` in `0..total_weight()` to an entry index.
    pub fn index_for_roll(&self, roll: u32) -> Option<usize> {
        let mut remaining = roll;
        for (i, entry) in self.entries.iter().enumerate() {
            if remaining < entry.weight {
                return Some(i);
            }
            remaining -= entry.weight;
        }
        None
    }

    /// `None` when every weight is zero.
    pub fn choose(&self, rng: &mut StdRng) -> Option<usize> {
        let total = self.total_weight();
        if total == 0 {
            return None;
        }
        self.index_for_roll(rng.random_range(0..total))
    }
}
