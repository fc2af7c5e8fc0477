use std::path::Path;

use crate::gfx::{GraphicsApi, ProgramId, ProgramSource, ReleaseQueue, Released, StageSource};

use super::reflect::{link_interface, ProgramInterface};
use super::stage::{compile, ShaderStage};
use super::ShaderError;

/// A linked vertex + fragment program.
///
/// Owns its handle: dropping the program queues the handle for deletion.
/// Share it through `Rc`; it is deliberately not `Clone`.
#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
    interface: ProgramInterface,
    release: ReleaseQueue,
}

impl ShaderProgram {
    /// Compiles both stages, checks they fit together and creates the program.
    pub fn link<G: GraphicsApi>(
        gfx: &mut G,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let vertex = compile(ShaderStage::Vertex, vertex_source)?;
        let fragment = compile(ShaderStage::Fragment, fragment_source)?;
        let interface = link_interface(&vertex, &fragment)?;

        let id = gfx.create_program(&ProgramSource {
            vertex: StageSource {
                source: vertex_source,
                entry_point: vertex.entry_point(),
            },
            fragment: StageSource {
                source: fragment_source,
                entry_point: fragment.entry_point(),
            },
            uniforms: interface.uniforms.clone(),
        })?;

        log::debug!(
            "linked {id}: {} vertex inputs, {} uniforms",
            interface.vertex_inputs.len(),
            interface.uniforms.as_ref().map_or(0, |u| u.members().len())
        );

        Ok(Self {
            id,
            interface,
            release: gfx.release_queue(),
        })
    }

    /// Reads both source files and links them.
    pub fn load_from_paths<G: GraphicsApi>(
        gfx: &mut G,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<Self, ShaderError> {
        let vertex_source = read_source(vertex_path.as_ref())?;
        let fragment_source = read_source(fragment_path.as_ref())?;
        Self::link(gfx, &vertex_source, &fragment_source)
    }

    /// Makes this the program used by subsequent uniform writes and draws.
    pub fn activate<G: GraphicsApi>(&self, gfx: &mut G) {
        gfx.use_program(self.id);
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }
}

impl From<&ShaderProgram> for u32 {
    fn from(program: &ShaderProgram) -> u32 {
        program.id.get()
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        self.release.push(Released::Program(self.id));
    }
}

fn read_source(path: &Path) -> Result<String, ShaderError> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ShaderError::NotFound { path: path.to_path_buf() }
        } else {
            ShaderError::Io { path: path.to_path_buf(), source }
        }
    })
}
