use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App as CoreApp, AppControl, FrameCtx, SetupCtx, WindowCtx};
use crate::device::{Gpu, GpuInit};
use crate::gfx::GraphicsApi;
use crate::input::translate::{translate_device_event, translate_window_event};
use crate::input::{InputFrame, InputState};
use crate::time::FrameClock;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Hide and confine the cursor once the window is up.
    pub grab_cursor: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "4AM CUBE".to_string(),
            initial_size: LogicalSize::new(1000.0, 1000.0),
            grab_cursor: true,
        }
    }
}

/// Runtime requests made from inside a frame. Applied after `on_frame` returns.
#[derive(Debug, Default)]
pub struct RuntimeCtx {
    exit: bool,
}

impl RuntimeCtx {
    pub fn exit(&mut self) {
        self.exit = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window and drives `app` until the window closes or the app exits.
    ///
    /// A failure is logged here, with its context chain, before it is
    /// returned. Callers only need it for the exit status.
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        report(Self::drive(config, gpu_init, app))
    }

    fn drive<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        state.finish()
    }
}

fn report(result: Result<()>) -> Result<()> {
    if let Err(e) = &result {
        log::error!("{e:#}");
    }
    result
}

#[self_referencing]
struct WindowEntry {
    input_state: InputState,
    input_frame: InputFrame,
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct AppState<A>
where
    A: CoreApp + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    window: Option<WindowEntry>,
    exit_requested: bool,
    failure: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: CoreApp + 'static,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            window: None,
            exit_requested: false,
            failure: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.record_failure(err);
        event_loop.exit();
    }

    /// Only the first failure is kept; later ones happen while shutting down.
    fn record_failure(&mut self, err: anyhow::Error) {
        match self.failure {
            None => self.failure = Some(err),
            Some(_) => log::debug!("runtime: further failure while exiting: {err:#}"),
        }
        self.exit_requested = true;
    }

    fn finish(mut self) -> Result<()> {
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();

        WindowEntryTryBuilder {
            input_state: InputState::default(),
            input_frame: InputFrame::default(),
            clock: FrameClock::default(),
            window,
            gpu_builder: |w| {
                pollster::block_on(Gpu::new(w, gpu_init)).context("GPU initialization failed")
            },
        }
        .try_build()
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut entry = self.create_window_entry(event_loop)?;
        let grab = self.config.grab_cursor;
        let app = &mut self.app;

        entry.with_mut(|fields| -> Result<()> {
            let window = WindowCtx { window: fields.window };
            if grab {
                window.set_cursor_grab(true);
            }

            let mut ctx = SetupCtx { window, gpu: fields.gpu };
            app.init(&mut ctx).context("application setup failed")?;

            // Setup time should not count as the first frame's delta.
            fields.clock.reset();
            Ok(())
        })?;

        entry.with_window(|w| w.request_redraw());
        self.window = Some(entry);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.window.as_mut() else {
            return;
        };

        let app = &mut self.app;
        let mut runtime_ctx = RuntimeCtx::default();
        let mut control = AppControl::Continue;

        entry.with_mut(|fields| {
            let time = fields.clock.tick();
            fields.gpu.graphics_mut().collect_garbage();

            {
                let mut ctx = FrameCtx {
                    window: WindowCtx { window: fields.window },
                    gpu: fields.gpu,
                    input: fields.input_state,
                    input_frame: fields.input_frame,
                    time,
                    runtime: &mut runtime_ctx,
                };
                control = app.on_frame(&mut ctx);
            }

            // Per-frame deltas are consumed.
            fields.input_frame.clear();
        });

        if control == AppControl::Exit || runtime_ctx.exit_requested() {
            self.exit_requested = true;
            event_loop.exit();
        }
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CoreApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.exit_requested {
            return;
        }

        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        // Continuous redraw.
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(entry) = self.window.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let Some(entry) = self.window.as_mut() else {
            return;
        };
        let Some(ev) = translate_device_event(&event) else {
            return;
        };

        entry.with_mut(|fields| {
            if fields.input_state.focused {
                fields.input_state.apply_event(fields.input_frame, ev);
            }
        });
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let (app, window) = (&mut self.app, &mut self.window);
        let Some(entry) = window.as_mut() else {
            return;
        };

        let mut exit_from_app = false;
        entry.with_mut(|fields| {
            if let Some(ev) = translate_window_event(fields.window, &event) {
                fields.input_state.apply_event(fields.input_frame, ev);
            }

            if app.on_window_event(&event) == AppControl::Exit {
                exit_from_app = true;
            }
        });

        if exit_from_app {
            self.exit_requested = true;
            event_loop.exit();
            return;
        }

        match &event {
            WindowEvent::CloseRequested => {
                self.window = None;
                self.exit_requested = true;
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                entry.with_gpu_mut(|gpu| gpu.resize(*new_size));
                entry.with_window(|w| w.request_redraw());
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                let new_size = entry.with_window(|w| w.inner_size());
                entry.with_gpu_mut(|gpu| gpu.resize(new_size));
                entry.with_window(|w| w.request_redraw());
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    static ERRORS: Mutex<Vec<String>> = Mutex::new(Vec::new());

    struct CaptureErrors;

    impl log::Log for CaptureErrors {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::Level::Error
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                ERRORS.lock().unwrap().push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    static CAPTURE: CaptureErrors = CaptureErrors;

    fn errors_mentioning(needle: &str) -> Vec<String> {
        ERRORS.lock().unwrap().iter().filter(|m| m.contains(needle)).cloned().collect()
    }

    struct Idle;

    impl CoreApp for Idle {
        fn on_frame(&mut self, _ctx: &mut FrameCtx<'_, '_>) -> AppControl {
            AppControl::Continue
        }
    }

    fn state() -> AppState<Idle> {
        AppState::new(RuntimeConfig::default(), GpuInit::default(), Idle)
    }

    #[test]
    fn setup_failure_is_logged_once_with_its_chain() {
        let _ = log::set_logger(&CAPTURE);
        log::set_max_level(log::LevelFilter::Error);

        let mut state = state();
        let err = anyhow::anyhow!("missing cube.vert.wgsl").context("application setup failed");
        state.record_failure(err);
        assert!(state.exit_requested);
        assert!(errors_mentioning("missing cube.vert.wgsl").is_empty());

        let err = report(state.finish()).unwrap_err();
        assert_eq!(err.to_string(), "application setup failed");
        assert_eq!(
            errors_mentioning("missing cube.vert.wgsl"),
            vec!["application setup failed: missing cube.vert.wgsl".to_string()]
        );
    }

    #[test]
    fn first_failure_wins() {
        let mut state = state();
        state.record_failure(anyhow::anyhow!("gpu lost"));
        state.record_failure(anyhow::anyhow!("window gone"));
        assert_eq!(state.finish().unwrap_err().to_string(), "gpu lost");
    }

    #[test]
    fn clean_exit_has_no_failure() {
        assert!(state().finish().is_ok());
    }
}
