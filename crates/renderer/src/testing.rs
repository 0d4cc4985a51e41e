//! Device-free backend used by the unit tests.
//!
//! Stage and program handling runs through the same object tables and naga
//! front-end as the wgpu backend, so compile and link outcomes and error codes
//! are real; only the draw side is simulated. Every call is recorded so tests
//! can assert on ordering and on leaked objects.

use std::time::Duration;

use crate::backend::{BackendError, GraphicsBackend};
use crate::frame_loop::EventSource;
use crate::gpu::objects::{LinkedProgram, ObjectTables};
use crate::gpu::reflect::ProgramInterface;
use crate::gpu::uniforms::UniformBlock;
use crate::runtime::TimeSource;
use crate::types::{ProgramId, StageId, StageKind, UniformLocation, UniformValue};

pub(crate) const PASSTHROUGH_VERTEX: &str = r"#version 450
layout(location = 0) in vec4 position;
layout(location = 1) in vec2 texcoord;
layout(location = 0) out vec2 v_texcoord;
void main() { v_texcoord = texcoord; gl_Position = position; }
";

pub(crate) const ORBIT_FRAGMENT: &str = r"#version 450
layout(location = 0) in vec2 v_texcoord;
layout(location = 0) out vec4 out_color;
layout(std140, set = 0, binding = 0) uniform Frame {
    vec2 resolution;
    float time;
    vec3 cam_pos;
};
void main() {
    vec2 uv = gl_FragCoord.xy / resolution;
    out_color = vec4(uv, 0.5 + 0.5 * sin(time), 1.0) + vec4(normalize(cam_pos), 0.0) * 0.1;
}
";

pub(crate) const CONSTANT_FRAGMENT: &str = r"#version 450
layout(location = 0) out vec4 out_color;
void main() { out_color = vec4(1.0, 0.5, 0.25, 1.0); }
";

pub(crate) const BROKEN_FRAGMENT: &str = r"#version 450
layout(location = 0) out vec4 out_color;
void main() { out_color = vec4(1.0, 0.0, 0.0 }
";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateStage(StageKind),
    StageSource(StageId),
    CompileStage(StageId),
    DeleteStage(StageId),
    CreateProgram,
    AttachStage(ProgramId, StageId),
    BindAttribute(ProgramId, u32, String),
    LinkProgram(ProgramId),
    DeleteProgram(ProgramId),
    UseProgram(ProgramId),
    SetUniform(Option<UniformLocation>, UniformValue),
    EnableAttribute(u32),
    Viewport(u32, u32),
    Clear([f32; 4]),
    Draw(usize),
    Present,
}

struct MockLinked {
    interface: ProgramInterface,
    uniforms: Option<UniformBlock>,
}

impl LinkedProgram for MockLinked {
    fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    fn uniforms_mut(&mut self) -> Option<&mut UniformBlock> {
        self.uniforms.as_mut()
    }
}

pub(crate) struct MockBackend {
    objects: ObjectTables<MockLinked>,
    message: Option<String>,
    calls: Vec<Call>,
    pub refuse_stages: bool,
    pub refuse_programs: bool,
    pub link_failure: Option<String>,
    pub draw_error: Option<BackendError>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            objects: ObjectTables::new(),
            message: None,
            calls: Vec::new(),
            refuse_stages: false,
            refuse_programs: false,
            link_failure: None,
            draw_error: None,
        }
    }

    pub fn push_error(&mut self, error: BackendError) {
        self.objects.raise(error);
    }

    pub fn set_message(&mut self, message: &str) {
        self.message = Some(message.to_string());
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn live_stages(&self) -> usize {
        self.objects.live_stages()
    }

    pub fn live_programs(&self) -> usize {
        self.objects.live_programs()
    }

    pub fn draws(&self) -> usize {
        self.count(|call| matches!(call, Call::Draw(_)))
    }

    pub fn presents(&self) -> usize {
        self.count(|call| matches!(call, Call::Present))
    }

    pub fn bindings(&self, program: ProgramId) -> Vec<(u32, String)> {
        self.objects.bindings(program)
    }

    /// Values uploaded to `location`, in upload order.
    pub fn uploads(&self, location: UniformLocation) -> Vec<UniformValue> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::SetUniform(Some(at), value) if *at == location => Some(*value),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }
}

impl GraphicsBackend for MockBackend {
    fn create_stage(&mut self, kind: StageKind) -> Option<StageId> {
        self.calls.push(Call::CreateStage(kind));
        if self.refuse_stages {
            return None;
        }
        self.objects.create_stage(kind)
    }

    fn stage_source(&mut self, stage: StageId, source: &str) {
        self.calls.push(Call::StageSource(stage));
        self.objects.stage_source(stage, source);
    }

    fn compile_stage(&mut self, stage: StageId) {
        self.calls.push(Call::CompileStage(stage));
        self.objects.compile_stage(stage);
    }

    fn stage_compiled(&self, stage: StageId) -> bool {
        self.objects.stage_compiled(stage)
    }

    fn stage_log(&self, stage: StageId) -> Option<String> {
        self.objects.stage_log(stage)
    }

    fn delete_stage(&mut self, stage: StageId) {
        self.calls.push(Call::DeleteStage(stage));
        self.objects.delete_stage(stage);
    }

    fn create_program(&mut self) -> Option<ProgramId> {
        self.calls.push(Call::CreateProgram);
        if self.refuse_programs {
            return None;
        }
        self.objects.create_program()
    }

    fn attach_stage(&mut self, program: ProgramId, stage: StageId) {
        self.calls.push(Call::AttachStage(program, stage));
        self.objects.attach_stage(program, stage);
    }

    fn bind_attribute(&mut self, program: ProgramId, slot: u32, name: &str) {
        self.calls
            .push(Call::BindAttribute(program, slot, name.to_string()));
        self.objects.bind_attribute(program, slot, name);
    }

    fn link_program(&mut self, program: ProgramId) {
        self.calls.push(Call::LinkProgram(program));
        let failure = self.link_failure.clone();
        self.objects.link_program(program, |interface, _| match failure {
            Some(log) => Err(log),
            None => Ok(MockLinked {
                uniforms: interface.uniforms.clone().map(UniformBlock::new),
                interface,
            }),
        });
    }

    fn program_linked(&self, program: ProgramId) -> bool {
        self.objects.program_linked(program)
    }

    fn program_log(&self, program: ProgramId) -> Option<String> {
        self.objects.program_log(program)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.calls.push(Call::DeleteProgram(program));
        self.objects.delete_program(program);
    }

    fn use_program(&mut self, program: ProgramId) {
        self.calls.push(Call::UseProgram(program));
        self.objects.use_program(program);
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.objects.uniform_location(program, name)
    }

    fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue) {
        self.calls.push(Call::SetUniform(location, value));
        self.objects.set_uniform(location, value);
    }

    fn enable_attribute(&mut self, slot: u32) {
        self.calls.push(Call::EnableAttribute(slot));
        self.objects.enable_attribute(slot);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.calls.push(Call::Viewport(width, height));
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.calls.push(Call::Clear(color));
    }

    fn draw_triangle_strip(&mut self, positions: &[[f32; 4]], texcoords: &[[f32; 2]]) {
        if !self.objects.check_draw(positions, texcoords) {
            return;
        }
        self.calls.push(Call::Draw(positions.len()));
        if let Some(error) = self.draw_error.clone() {
            self.objects.raise(error);
        }
    }

    fn present(&mut self) {
        self.calls.push(Call::Present);
    }

    fn take_error(&mut self) -> Option<BackendError> {
        self.objects.take_error()
    }

    fn take_message(&mut self) -> Option<String> {
        self.message.take()
    }
}

/// Event source that reports quit on the `quit_on`-th poll (1-based).
pub(crate) struct ScriptedEvents {
    pub polls: usize,
    quit_on: usize,
}

impl ScriptedEvents {
    pub fn quit_on(poll: usize) -> Self {
        Self {
            polls: 0,
            quit_on: poll,
        }
    }
}

impl EventSource for ScriptedEvents {
    fn poll_quit(&mut self) -> bool {
        self.polls += 1;
        self.polls >= self.quit_on
    }
}

/// Clock that advances by a fixed step on every read.
pub(crate) struct SteppedClock {
    now: Duration,
    step: Duration,
}

impl SteppedClock {
    pub fn new(step: Duration) -> Self {
        Self {
            now: Duration::ZERO,
            step,
        }
    }
}

impl TimeSource for SteppedClock {
    fn now(&mut self) -> Duration {
        let now = self.now;
        self.now += self.step;
        now
    }
}
