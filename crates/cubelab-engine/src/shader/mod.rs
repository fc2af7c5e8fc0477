//! WGSL shader programs.
//!
//! Stages are parsed and validated with naga before anything reaches the
//! backend, so compile and link failures surface as typed errors without a GPU.

mod error;
mod program;
mod reflect;
mod stage;

pub use error::ShaderError;
pub use program::ShaderProgram;
pub use reflect::{ProgramInterface, ScalarType, VertexInput};
pub use stage::{compile, CompiledStage, ShaderStage};
