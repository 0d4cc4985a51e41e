use crate::backend::GraphicsBackend;
use crate::diagnostics::{Diagnostics, APP_TAG};
use crate::frame_loop::{self, EventSource, RunReport};
use crate::gpu::GpuBackend;
use crate::program::{load_program, Program};
use crate::resources::ResourceNamespace;
use crate::runtime::TimeSource;
use crate::types::{DemoConfig, SurfaceConfig};
use crate::window::{self, WinitEvents};

/// Owns the window, context and program for one run.
///
/// A demo whose bootstrap failed stays inert: loading and running do nothing.
pub struct Demo<B, E>
where
    B: GraphicsBackend,
    E: EventSource,
{
    config: DemoConfig,
    diagnostics: Diagnostics,
    surface: SurfaceConfig,
    backend: Option<B>,
    events: Option<E>,
    program: Option<Program>,
}

impl Demo<GpuBackend, WinitEvents> {
    /// Opens the fullscreen window, creates the context and shows one frame
    /// cleared to the configured colour.
    pub fn init(config: DemoConfig, diagnostics: Diagnostics) -> Self {
        let (events, surface) = match window::create_window(&config.title) {
            Ok(created) => created,
            Err(err) => {
                diagnostics.report(format!("No window: {err:#}"));
                let surface = SurfaceConfig::new(1, 1);
                return Self::from_parts(config, diagnostics, surface, None, None);
            }
        };
        let backend = match window::create_context(&events, surface, config.context) {
            Ok(backend) => backend,
            Err(err) => {
                diagnostics.report(format!("No context: {err:#}"));
                return Self::from_parts(config, diagnostics, surface, None, Some(events));
            }
        };
        Self::from_parts(config, diagnostics, surface, Some(backend), Some(events))
    }
}

impl<B, E> Demo<B, E>
where
    B: GraphicsBackend,
    E: EventSource,
{
    /// Assembles a demo from an existing backend and event source. When both
    /// are present the surface is cleared and presented once.
    pub fn from_parts(
        config: DemoConfig,
        diagnostics: Diagnostics,
        surface: SurfaceConfig,
        backend: Option<B>,
        events: Option<E>,
    ) -> Self {
        let mut demo = Self {
            config,
            diagnostics,
            surface,
            backend,
            events,
            program: None,
        };
        if demo.events.is_some() {
            if let Some(backend) = demo.backend.as_mut() {
                backend.set_viewport(surface.width, surface.height);
                demo.diagnostics.check_backend(backend, "set_viewport");
                backend.clear(demo.config.clear_color);
                demo.diagnostics.check_backend(backend, "clear");
                backend.present();
                demo.diagnostics.check_backend(backend, "present");
                demo.diagnostics.drain_message(backend, "present");
            }
        }
        demo
    }

    /// Loads and links the configured shader pair.
    pub fn load<R>(&mut self, resources: &R) -> bool
    where
        R: ResourceNamespace + ?Sized,
    {
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };
        if let Some(previous) = self.program.take() {
            previous.release(backend, &self.diagnostics);
        }
        match load_program(backend, resources, &self.diagnostics, &self.config.sources) {
            Ok(program) => {
                tracing::info!(
                    vertex = %self.config.sources.vertex,
                    fragment = %self.config.sources.fragment,
                    "loaded shader program"
                );
                self.program = Some(program);
                true
            }
            Err(err) => {
                tracing::debug!(error = %err, "shader program unavailable");
                false
            }
        }
    }

    /// Runs the render loop until quit. Without a window, context or program
    /// this returns immediately.
    pub fn run<T>(&mut self, clock: &mut T) -> RunReport
    where
        T: TimeSource + ?Sized,
    {
        let (Some(backend), Some(events), Some(program)) = (
            self.backend.as_mut(),
            self.events.as_mut(),
            self.program.as_mut(),
        ) else {
            return RunReport::default();
        };
        frame_loop::run(
            backend,
            program,
            self.surface,
            events,
            clock,
            &self.diagnostics,
        )
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn has_program(&self) -> bool {
        self.program.is_some()
    }
}

impl<B, E> Drop for Demo<B, E>
where
    B: GraphicsBackend,
    E: EventSource,
{
    fn drop(&mut self) {
        tracing::info!(target: APP_TAG, "Destroying window and quitting.");
        if let (Some(program), Some(backend)) = (self.program.take(), self.backend.as_mut()) {
            program.release(backend, &self.diagnostics);
        }
    }
}
