use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowBuilder};

use crate::frame_loop::EventSource;
use crate::gpu::{GpuBackend, GpuContext};
use crate::types::{ContextRequest, SurfaceConfig};

/// The demo window together with the event loop that feeds it.
///
/// Polling never blocks: each call drains whatever winit has queued.
pub struct WinitEvents {
    event_loop: EventLoop<()>,
    window: Arc<Window>,
    quit: bool,
}

impl WinitEvents {
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl EventSource for WinitEvents {
    fn poll_quit(&mut self) -> bool {
        let mut quit = self.quit;
        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, elwt| {
                if let Event::WindowEvent { event, .. } = &event {
                    if is_quit(event) {
                        quit = true;
                        elwt.exit();
                    }
                }
            });
        if let PumpStatus::Exit(code) = status {
            tracing::debug!(code, "event loop exited");
            quit = true;
        }
        self.quit = quit;
        quit
    }
}

fn is_quit(event: &WindowEvent) -> bool {
    match event {
        WindowEvent::CloseRequested | WindowEvent::Destroyed => true,
        WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    logical_key: Key::Named(NamedKey::Escape),
                    state: ElementState::Pressed,
                    ..
                },
            ..
        } => true,
        _ => false,
    }
}

/// Opens a borderless fullscreen window on the primary monitor and captures
/// its size once.
pub fn create_window(title: &str) -> Result<(WinitEvents, SurfaceConfig)> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let monitor = event_loop
        .primary_monitor()
        .or_else(|| event_loop.available_monitors().next());
    let mode_size = monitor
        .as_ref()
        .map(|monitor| monitor.size())
        .unwrap_or_else(|| PhysicalSize::new(1280, 720));

    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(mode_size)
        .with_fullscreen(Some(Fullscreen::Borderless(monitor)))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let size = window.inner_size();
    let size = if size.width == 0 || size.height == 0 {
        mode_size
    } else {
        size
    };
    let surface = SurfaceConfig::new(size.width, size.height);
    tracing::info!(
        width = surface.width,
        height = surface.height,
        "created fullscreen window"
    );

    Ok((
        WinitEvents {
            event_loop,
            window,
            quit: false,
        },
        surface,
    ))
}

/// Creates the graphics context for the window with the requested API and
/// swap interval.
pub fn create_context(
    events: &WinitEvents,
    surface: SurfaceConfig,
    request: ContextRequest,
) -> Result<GpuBackend> {
    let context = GpuContext::for_window(Arc::clone(&events.window), surface, request)
        .context("failed to create graphics context")?;
    Ok(GpuBackend::new(context))
}
