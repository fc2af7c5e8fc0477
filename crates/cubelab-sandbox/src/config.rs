use std::path::PathBuf;

use cubelab_engine::Projection;
use glam::Vec3;

use crate::palette::Palette;

/// Overrides [`SandboxConfig::asset_root`].
pub const ASSETS_ENV: &str = "CUBELAB_ASSETS";

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Directory holding `shaders/` and `textures/`.
    pub asset_root: PathBuf,

    pub camera_start: Vec3,
    /// World units per second.
    pub camera_speed: f32,
    /// Degrees per pixel of mouse motion.
    pub camera_sensitivity: f32,
    /// Speed change per wheel line.
    pub scroll_speed_step: f32,

    pub projection: Projection,
    pub clear_color: wgpu::Color,
    pub palette: Palette,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/assets")),
            camera_start: Vec3::new(0.0, 0.0, 3.0),
            camera_speed: 2.5,
            camera_sensitivity: 0.1,
            scroll_speed_step: 0.5,
            projection: Projection::default(),
            clear_color: wgpu::Color::BLACK,
            palette: Palette::default(),
        }
    }
}

impl SandboxConfig {
    /// Defaults, with the asset root taken from the environment when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(root) = std::env::var_os(ASSETS_ENV) {
            config.asset_root = PathBuf::from(root);
        }
        config
    }

    pub fn vertex_shader(&self) -> PathBuf {
        self.asset_root.join("shaders/cube.vert.wgsl")
    }

    pub fn fragment_shader(&self) -> PathBuf {
        self.asset_root.join("shaders/cube.frag.wgsl")
    }

    pub fn texture(&self, file: &str) -> PathBuf {
        self.asset_root.join("textures").join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_point_into_the_shipped_assets() {
        let config = SandboxConfig::default();
        assert!(config.vertex_shader().ends_with("assets/shaders/cube.vert.wgsl"));
        assert!(config.texture("frame_red.png").ends_with("assets/textures/frame_red.png"));
        assert!(config.vertex_shader().is_file());
        for entry in config.palette.entries() {
            assert!(config.texture(&entry.file).is_file(), "{} missing", entry.file);
        }
    }
}
