use std::path::PathBuf;

use crate::gfx::GfxError;

use super::ShaderStage;

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("shader source not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read shader source {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} shader failed to compile:\n{diagnostic}")]
    Compilation { stage: ShaderStage, diagnostic: String },

    #[error("shader program failed to link: {reason}")]
    Link { reason: String },

    #[error(transparent)]
    Gfx(#[from] GfxError),
}

impl ShaderError {
    pub(crate) fn link(reason: impl Into<String>) -> Self {
        ShaderError::Link { reason: reason.into() }
    }
}
