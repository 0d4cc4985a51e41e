//! Capability seam between the demo core and whatever draws the pixels.
//!
//! The core (compiler, linker, frame loop) only ever talks to a
//! [`GraphicsBackend`]. The production implementation lives in `gpu` and
//! drives wgpu; tests use a device-free mock. The method set deliberately
//! follows the shape of a GL ES 2 context: objects are created, configured,
//! and queried through integer handles, and failures of individual calls are
//! observed after the fact through [`GraphicsBackend::take_error`] and
//! [`GraphicsBackend::take_message`].

use thiserror::Error;

use crate::types::{ProgramId, StageId, StageKind, UniformLocation, UniformValue};

/// Attribute slot carrying the 4-component clip-space position.
pub const POSITION_SLOT: u32 = 0;
/// Attribute slot carrying the 2-component texture coordinate.
pub const TEXCOORD_SLOT: u32 = 1;

/// Fixed attribute-name protocol shared by the linker and every vertex shader.
pub const ATTRIBUTE_BINDINGS: [(u32, &str); 2] =
    [(POSITION_SLOT, "position"), (TEXCOORD_SLOT, "texcoord")];

/// Number of vertices in the full-screen triangle strip.
pub const QUAD_VERTEX_COUNT: usize = 4;

/// Clip-space corners of the full-screen quad, in triangle-strip order.
pub const QUAD_POSITIONS: [[f32; 4]; QUAD_VERTEX_COUNT] = [
    [-1.0, -1.0, 0.0, 1.0],
    [1.0, -1.0, 0.0, 1.0],
    [-1.0, 1.0, 0.0, 1.0],
    [1.0, 1.0, 0.0, 1.0],
];

/// Unit texture coordinates matching [`QUAD_POSITIONS`].
pub const QUAD_TEXCOORDS: [[f32; 2]; QUAD_VERTEX_COUNT] =
    [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];

/// Error codes a backend raises after a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("invalid value")]
    InvalidValue,
    #[error("invalid operation")]
    InvalidOperation,
    #[error("out of memory")]
    OutOfMemory,
    #[error("device error: {0}")]
    Device(String),
    #[error("surface error: {0}")]
    Surface(String),
}

/// GL ES 2 shaped rendering context.
///
/// Compile and link outcomes are reported through status queries and logs,
/// never through [`BackendError`]; errors are reserved for misuse of the API
/// and for device-level failures.
pub trait GraphicsBackend {
    /// Allocates an empty stage object, or `None` when the backend refuses.
    fn create_stage(&mut self, kind: StageKind) -> Option<StageId>;
    /// Replaces the stage's source text.
    fn stage_source(&mut self, stage: StageId, source: &str);
    fn compile_stage(&mut self, stage: StageId);
    fn stage_compiled(&self, stage: StageId) -> bool;
    /// Compiler output for the last compile, `None` when there is none.
    fn stage_log(&self, stage: StageId) -> Option<String>;
    fn delete_stage(&mut self, stage: StageId);

    fn create_program(&mut self) -> Option<ProgramId>;
    fn attach_stage(&mut self, program: ProgramId, stage: StageId);
    fn bind_attribute(&mut self, program: ProgramId, slot: u32, name: &str);
    fn link_program(&mut self, program: ProgramId);
    fn program_linked(&self, program: ProgramId) -> bool;
    fn program_log(&self, program: ProgramId) -> Option<String>;
    fn delete_program(&mut self, program: ProgramId);
    /// Makes the program current for uniform uploads and draws.
    fn use_program(&mut self, program: ProgramId);
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    /// Uploads into the current program. A `None` location is ignored.
    fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue);

    fn enable_attribute(&mut self, slot: u32);
    fn set_viewport(&mut self, width: u32, height: u32);
    fn clear(&mut self, color: [f32; 4]);
    /// Draws a triangle strip from client-side attribute arrays bound to
    /// [`POSITION_SLOT`] and [`TEXCOORD_SLOT`].
    fn draw_triangle_strip(&mut self, positions: &[[f32; 4]], texcoords: &[[f32; 2]]);
    /// Shows the finished frame.
    fn present(&mut self);

    /// Pops the oldest pending error code.
    fn take_error(&mut self) -> Option<BackendError>;
    /// Returns and clears the last error string.
    fn take_message(&mut self) -> Option<String>;
}
