//! cubelab engine crate.
//!
//! The core is a small set of GPU resource owners (`ShaderProgram`, `Texture`,
//! `Renderer`) talking to a GL-style [`gfx::GraphicsApi`], plus a free-fly
//! [`camera::Camera`]. The remaining modules are the platform and GPU runtime
//! that drives them from a winit event loop.

pub mod camera;
pub mod gfx;
pub mod renderer;
pub mod shader;
pub mod texture;

pub mod core;
pub mod device;
pub mod input;
pub mod logging;
pub mod time;
pub mod window;

pub use camera::{Camera, Projection};
pub use renderer::{RenderError, Renderer, VertexLayout};
pub use shader::{ShaderError, ShaderProgram};
pub use texture::{Texture, TextureError};
