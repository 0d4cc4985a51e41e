//! Renderer crate for HackDemo, a fullscreen raymarching shader demo.
//!
//! Two GLSL stages are loaded by name, compiled, linked, and drawn over a
//! full-screen quad every frame while the camera orbits the origin. The flow:
//!
//! ```text
//!   hackdemo (binary)
//!          │ DemoConfig + ResourceNamespace
//!          ▼
//!   Demo::init ──▶ window + GpuBackend ──▶ clear, present
//!          │
//!   Demo::load ──▶ compile_stage ×2 ──▶ link_program ──▶ Program
//!          │
//!   Demo::run  ──▶ frame_loop::run ──▶ time / cam_pos ─▶ draw ─▶ present ─▶ poll
//! ```
//!
//! The core only talks to the GPU through [`GraphicsBackend`], a GL ES 2
//! shaped capability set implemented on top of wgpu by [`GpuBackend`]. Every
//! failure is funnelled through [`Diagnostics`]; nothing past bootstrap stops
//! the demo.

pub mod backend;
pub mod compile;
pub mod demo;
pub mod diagnostics;
pub mod frame_loop;
pub mod gpu;
pub mod program;
pub mod resources;
pub mod runtime;
pub mod types;
pub mod window;

#[cfg(test)]
mod testing;

pub use backend::{BackendError, GraphicsBackend};
pub use compile::{compile_stage, CompileError, ShaderStage};
pub use demo::Demo;
pub use diagnostics::{DiagnosticSink, Diagnostics, TracingSink, APP_TAG, RETAINED_ENTRIES};
pub use frame_loop::{EventSource, RunReport};
pub use gpu::GpuBackend;
pub use program::{link_program, load_program, LinkError, Program};
pub use resources::{
    load_text, BundledResources, DirectoryResources, ResourceError, ResourceNamespace,
};
pub use runtime::{camera_position, FrameState, MonotonicClock, TimeSource};
pub use types::{
    ContextRequest, DemoConfig, ProgramId, ProgramSources, RenderingApi, StageId, StageKind,
    SurfaceConfig, UniformLocation, UniformValue,
};
pub use window::WinitEvents;
