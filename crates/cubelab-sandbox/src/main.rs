//! "4AM CUBE": a field of textured cubes under a free-fly camera.
//!
//! WASD moves, Space/Shift rise and sink, the mouse looks around, the wheel
//! changes speed and Escape quits. Set `CUBELAB_ASSETS` to load shaders and
//! textures from another directory.

mod app;
mod config;
mod palette;
mod scene;

use std::process::ExitCode;

use cubelab_engine::device::GpuInit;
use cubelab_engine::logging::{init_logging, LoggingConfig};
use cubelab_engine::window::{Runtime, RuntimeConfig};

use crate::app::CubeApp;
use crate::config::SandboxConfig;

fn main() -> ExitCode {
    init_logging(LoggingConfig::default());

    let config = SandboxConfig::from_env();
    log::info!("assets from {}", config.asset_root.display());

    match Runtime::run(RuntimeConfig::default(), GpuInit::default(), CubeApp::new(config)) {
        Ok(()) => ExitCode::SUCCESS,
        // Already logged by the runtime.
        Err(_) => ExitCode::FAILURE,
    }
}
