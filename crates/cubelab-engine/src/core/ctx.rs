use winit::dpi::PhysicalSize;
use winit::window::{CursorGrabMode, Window};

use crate::device::{Gpu, SurfaceErrorAction};
use crate::gfx::WgpuGraphics;
use crate::input::{InputFrame, InputState};
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Window handle exposed to the app.
pub struct WindowCtx<'a> {
    pub window: &'a Window,
}

impl WindowCtx<'_> {
    /// Drawable size in physical pixels.
    pub fn physical_size(&self) -> PhysicalSize<u32> {
        self.window.inner_size()
    }

    /// Hides the cursor and keeps it inside the window, or releases it.
    ///
    /// Platforms without confinement fall back to locking. Failure is logged;
    /// raw mouse motion still arrives either way.
    pub fn set_cursor_grab(&self, grab: bool) {
        let result = if grab {
            self.window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Locked))
        } else {
            self.window.set_cursor_grab(CursorGrabMode::None)
        };

        if let Err(e) = result {
            log::warn!("cursor grab unavailable: {e}");
        }
        self.window.set_cursor_visible(!grab);
    }
}

/// Context passed to [`super::App::init`].
pub struct SetupCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
}

impl SetupCtx<'_, '_> {
    pub fn graphics(&mut self) -> &mut WgpuGraphics {
        self.gpu.graphics_mut()
    }
}

/// Per-frame context passed to [`super::App::on_frame`].
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub input: &'a InputState,
    pub input_frame: &'a InputFrame,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl FrameCtx<'_, '_> {
    /// Acquires a frame, lets `draw` record through the graphics backend, then
    /// flushes the draws into one pass cleared to `clear` and presents.
    ///
    /// A lost or outdated surface skips the frame; running out of memory exits.
    pub fn render<F>(&mut self, clear: wgpu::Color, draw: F) -> AppControl
    where
        F: FnOnce(&mut WgpuGraphics),
    {
        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => {
                        log::error!("surface out of memory");
                        AppControl::Exit
                    }
                    _ => AppControl::Continue,
                };
            }
        };

        draw(self.gpu.graphics_mut());
        self.gpu.flush(&mut frame, clear);

        self.window.window.pre_present_notify();
        self.gpu.submit(frame);

        AppControl::Continue
    }
}
