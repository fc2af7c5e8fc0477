use std::fmt;
use std::num::NonZeroU32;

use super::GfxError;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(NonZeroU32);

        impl $name {
            pub(crate) fn from_raw(raw: NonZeroU32) -> Self {
                Self(raw)
            }

            /// Raw integer handle. Never zero.
            #[inline]
            pub fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl From<$name> for u32 {
            fn from(handle: $name) -> u32 {
                handle.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} #{}", $kind, self.0)
            }
        }
    };
}

define_handle!(
    /// Linked shader program.
    ProgramId,
    "program"
);
define_handle!(
    /// Sampled 2D texture.
    TextureId,
    "texture"
);
define_handle!(
    /// Vertex buffer holding `f32` data.
    BufferId,
    "buffer"
);
define_handle!(
    /// Vertex buffer plus the attribute layout used to read it.
    VertexArrayId,
    "vertex array"
);

/// Monotonic handle source shared by all resource kinds of one backend.
///
/// Starts at 1 so a handle is always a positive integer, and never reuses a
/// value for the lifetime of the backend.
#[derive(Debug)]
pub(crate) struct HandleAllocator {
    next: u32,
}

impl HandleAllocator {
    pub(crate) fn new() -> Self {
        Self { next: 1 }
    }

    pub(crate) fn alloc(&mut self) -> Result<NonZeroU32, GfxError> {
        let raw = NonZeroU32::new(self.next).ok_or(GfxError::HandlesExhausted)?;
        self.next = self.next.checked_add(1).unwrap_or(0);
        Ok(raw)
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}
