//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - configuring the Surface (swapchain) and the matching depth target
//! - owning the [`WgpuGraphics`](crate::gfx::WgpuGraphics) backend bound to the device

mod context;
mod error;
mod frame;
mod surface;

pub use context::{Gpu, GpuInit};
pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
