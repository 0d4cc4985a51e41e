//! The per-frame render loop.
//!
//! One state, re-entered every iteration: push `time` and `cam_pos`, draw the
//! full-screen quad, present, then poll for a quit signal. Backend errors are
//! reported and the loop carries on.

use crate::backend::{
    GraphicsBackend, POSITION_SLOT, QUAD_POSITIONS, QUAD_TEXCOORDS, TEXCOORD_SLOT,
};
use crate::diagnostics::Diagnostics;
use crate::program::Program;
use crate::runtime::{FrameState, TimeSource};
use crate::types::{SurfaceConfig, UniformLocation, UniformValue};

/// Source of the termination signal.
pub trait EventSource {
    /// Drains pending events without blocking; `true` once quit was observed.
    fn poll_quit(&mut self) -> bool;
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Iterations completed, each ending in one present.
    pub frames: u64,
}

/// Uniform locations resolved once before the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameUniforms {
    resolution: Option<UniformLocation>,
    time: Option<UniformLocation>,
    cam_pos: Option<UniformLocation>,
}

impl FrameUniforms {
    fn resolve<B>(program: &mut Program, backend: &B) -> Self
    where
        B: GraphicsBackend + ?Sized,
    {
        Self {
            resolution: program.uniform_location(backend, "resolution"),
            time: program.uniform_location(backend, "time"),
            cam_pos: program.uniform_location(backend, "cam_pos"),
        }
    }
}

/// Drives `program` until `events` reports quit.
///
/// The program must have come out of the linker; the surface size is fixed
/// for the whole run and feeds both the viewport and `resolution`.
pub fn run<B, E, T>(
    backend: &mut B,
    program: &mut Program,
    surface: SurfaceConfig,
    events: &mut E,
    clock: &mut T,
    diagnostics: &Diagnostics,
) -> RunReport
where
    B: GraphicsBackend + ?Sized,
    E: EventSource + ?Sized,
    T: TimeSource + ?Sized,
{
    backend.use_program(program.id());
    diagnostics.check_backend(backend, "use_program");
    let uniforms = FrameUniforms::resolve(program, backend);
    diagnostics.check_backend(backend, "uniform_location");

    backend.enable_attribute(POSITION_SLOT);
    diagnostics.check_backend(backend, "enable_attribute");
    backend.enable_attribute(TEXCOORD_SLOT);
    diagnostics.check_backend(backend, "enable_attribute");
    backend.set_viewport(surface.width, surface.height);
    diagnostics.check_backend(backend, "set_viewport");
    backend.set_uniform(uniforms.resolution, UniformValue::Vec2(surface.resolution()));
    diagnostics.check_backend(backend, "set_uniform(resolution)");

    tracing::info!(
        program = %program.id(),
        width = surface.width,
        height = surface.height,
        "entering render loop"
    );

    let start = clock.now();
    let mut report = RunReport::default();
    loop {
        let frame = FrameState::new(start, clock.now());

        backend.set_uniform(uniforms.time, UniformValue::Float(frame.elapsed));
        diagnostics.check_backend(backend, "set_uniform(time)");
        backend.set_uniform(uniforms.cam_pos, UniformValue::Vec3(frame.camera));
        diagnostics.check_backend(backend, "set_uniform(cam_pos)");

        backend.draw_triangle_strip(&QUAD_POSITIONS, &QUAD_TEXCOORDS);
        diagnostics.check_backend(backend, "draw_triangle_strip");
        backend.present();
        diagnostics.check_backend(backend, "present");
        diagnostics.drain_message(backend, "present");
        report.frames += 1;

        if events.poll_quit() {
            break;
        }
    }

    tracing::info!(frames = report.frames, "render loop finished");
    report
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::BackendError;
    use crate::diagnostics::RETAINED_ENTRIES;
    use crate::program::link_program;
    use crate::runtime::MonotonicClock;
    use crate::testing::{
        Call, MockBackend, ScriptedEvents, SteppedClock, CONSTANT_FRAGMENT, ORBIT_FRAGMENT,
        PASSTHROUGH_VERTEX,
    };

    const SURFACE: SurfaceConfig = SurfaceConfig {
        width: 1920,
        height: 1080,
    };

    fn linked(backend: &mut MockBackend, fragment: &str) -> Program {
        let diagnostics = Diagnostics::capturing();
        link_program(backend, &diagnostics, PASSTHROUGH_VERTEX, fragment).unwrap()
    }

    #[test]
    fn setup_precedes_the_first_frame() {
        let mut backend = MockBackend::new();
        let mut program = linked(&mut backend, ORBIT_FRAGMENT);
        let first_call = backend.calls().len();
        let diagnostics = Diagnostics::capturing();

        run(
            &mut backend,
            &mut program,
            SURFACE,
            &mut ScriptedEvents::quit_on(1),
            &mut SteppedClock::new(Duration::from_millis(16)),
            &diagnostics,
        );

        let calls = &backend.calls()[first_call..];
        assert_eq!(calls[0], Call::UseProgram(program.id()));
        assert_eq!(calls[1], Call::EnableAttribute(POSITION_SLOT));
        assert_eq!(calls[2], Call::EnableAttribute(TEXCOORD_SLOT));
        assert_eq!(calls[3], Call::Viewport(1920, 1080));
        assert_eq!(
            calls[4],
            Call::SetUniform(
                Some(UniformLocation(0)),
                UniformValue::Vec2([1920.0, 1080.0])
            )
        );
        assert!(matches!(calls[5], Call::SetUniform(Some(UniformLocation(8)), _)));
        assert!(matches!(calls[6], Call::SetUniform(Some(UniformLocation(16)), _)));
        assert_eq!(calls[7], Call::Draw(4));
        assert_eq!(calls[8], Call::Present);
        assert_eq!(calls.len(), 9);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn resolution_is_pushed_exactly_once() {
        let mut backend = MockBackend::new();
        let mut program = linked(&mut backend, ORBIT_FRAGMENT);

        let report = run(
            &mut backend,
            &mut program,
            SURFACE,
            &mut ScriptedEvents::quit_on(5),
            &mut SteppedClock::new(Duration::from_millis(16)),
            &Diagnostics::capturing(),
        );

        assert_eq!(report.frames, 5);
        assert_eq!(backend.uploads(UniformLocation(0)).len(), 1);
        assert_eq!(backend.uploads(UniformLocation(8)).len(), 5);
    }

    #[test]
    fn time_uploads_never_decrease() {
        let mut backend = MockBackend::new();
        let mut program = linked(&mut backend, ORBIT_FRAGMENT);

        run(
            &mut backend,
            &mut program,
            SURFACE,
            &mut ScriptedEvents::quit_on(50),
            &mut MonotonicClock::new(),
            &Diagnostics::capturing(),
        );

        let times: Vec<f32> = backend
            .uploads(UniformLocation(8))
            .into_iter()
            .map(|value| match value {
                UniformValue::Float(t) => t,
                other => panic!("unexpected time upload {other:?}"),
            })
            .collect();
        assert_eq!(times.len(), 50);
        assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn camera_follows_the_orbit_every_frame() {
        let mut backend = MockBackend::new();
        let mut program = linked(&mut backend, ORBIT_FRAGMENT);

        run(
            &mut backend,
            &mut program,
            SURFACE,
            &mut ScriptedEvents::quit_on(40),
            &mut SteppedClock::new(Duration::from_millis(250)),
            &Diagnostics::capturing(),
        );

        let times = backend.uploads(UniformLocation(8));
        let cameras = backend.uploads(UniformLocation(16));
        assert_eq!(cameras.len(), 40);
        for (time, camera) in times.into_iter().zip(cameras) {
            let (UniformValue::Float(t), UniformValue::Vec3([x, y, z])) = (time, camera) else {
                panic!("unexpected uploads");
            };
            assert!((x * x + z * z - 64.0).abs() < 1e-3);
            assert!((x + 8.0 * t.sin()).abs() < 1e-4);
            assert!((z - 8.0 * t.cos()).abs() < 1e-4);
            assert_eq!(y, 4.0);
        }
    }

    #[test]
    fn quit_stops_drawing_within_one_poll() {
        let mut backend = MockBackend::new();
        let mut program = linked(&mut backend, ORBIT_FRAGMENT);
        let mut events = ScriptedEvents::quit_on(3);

        run(
            &mut backend,
            &mut program,
            SURFACE,
            &mut events,
            &mut SteppedClock::new(Duration::from_millis(16)),
            &Diagnostics::capturing(),
        );

        assert_eq!(events.polls, 3);
        assert_eq!(backend.draws(), 3);
        assert_eq!(backend.presents(), 3);
        assert_eq!(backend.calls().last(), Some(&Call::Present));
    }

    #[test]
    fn backend_errors_are_reported_and_the_loop_continues() {
        let mut backend = MockBackend::new();
        let mut program = linked(&mut backend, ORBIT_FRAGMENT);
        backend.draw_error = Some(BackendError::OutOfMemory);
        let diagnostics = Diagnostics::capturing();

        let report = run(
            &mut backend,
            &mut program,
            SURFACE,
            &mut ScriptedEvents::quit_on(4),
            &mut SteppedClock::new(Duration::from_millis(16)),
            &diagnostics,
        );

        assert_eq!(report.frames, 4);
        assert_eq!(
            diagnostics.entries(),
            vec!["draw_triangle_strip: out of memory"; 4]
        );
    }

    #[test]
    fn persistent_errors_keep_the_log_bounded() {
        let mut backend = MockBackend::new();
        let mut program = linked(&mut backend, ORBIT_FRAGMENT);
        backend.draw_error = Some(BackendError::OutOfMemory);
        let diagnostics = Diagnostics::capturing();

        let report = run(
            &mut backend,
            &mut program,
            SURFACE,
            &mut ScriptedEvents::quit_on(5_000),
            &mut SteppedClock::new(Duration::from_millis(16)),
            &diagnostics,
        );

        assert_eq!(report.frames, 5_000);
        assert_eq!(diagnostics.len(), RETAINED_ENTRIES);
        assert_eq!(diagnostics.dropped(), 5_000 - RETAINED_ENTRIES as u64);
    }

    #[test]
    fn missing_uniforms_are_skipped_silently() {
        let mut backend = MockBackend::new();
        let mut program = linked(&mut backend, CONSTANT_FRAGMENT);
        let diagnostics = Diagnostics::capturing();

        let report = run(
            &mut backend,
            &mut program,
            SURFACE,
            &mut ScriptedEvents::quit_on(2),
            &mut SteppedClock::new(Duration::from_millis(16)),
            &diagnostics,
        );

        assert_eq!(report.frames, 2);
        assert_eq!(backend.draws(), 2);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn lost_surface_messages_are_drained_after_present() {
        let mut backend = MockBackend::new();
        let mut program = linked(&mut backend, ORBIT_FRAGMENT);
        backend.set_message("surface lost; reconfigured");
        let diagnostics = Diagnostics::capturing();

        run(
            &mut backend,
            &mut program,
            SURFACE,
            &mut ScriptedEvents::quit_on(2),
            &mut SteppedClock::new(Duration::from_millis(16)),
            &diagnostics,
        );

        assert_eq!(
            diagnostics.entries(),
            vec!["present: surface lost; reconfigured"]
        );
    }
}
