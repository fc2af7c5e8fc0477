use std::cell::RefCell;
use std::rc::Rc;

use super::{BufferId, ProgramId, TextureId, VertexArrayId};

/// A resource handle whose owner has been dropped.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Released {
    Program(ProgramId),
    Texture(TextureId),
    Buffer(BufferId),
    VertexArray(VertexArrayId),
}

/// Deferred deletion list shared between a backend and the objects it created.
///
/// Owning types (`ShaderProgram`, `Texture`, `Renderer`) push their handles here
/// from `Drop`, which has no access to the backend. The backend frees them on its
/// next `collect_garbage`.
#[derive(Debug, Clone, Default)]
pub struct ReleaseQueue(Rc<RefCell<Vec<Released>>>);

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, released: Released) {
        self.0.borrow_mut().push(released);
    }

    /// Takes every pending release in push order.
    pub fn drain(&self) -> Vec<Released> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;

    #[test]
    fn clones_share_one_list() {
        let queue = ReleaseQueue::new();
        let handle = queue.clone();
        let id = TextureId::from_raw(NonZeroU32::new(3).unwrap());

        handle.push(Released::Texture(id));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.drain(), vec![Released::Texture(id)]);
        assert!(handle.is_empty());
    }
}
