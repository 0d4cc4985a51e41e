//! wgpu implementation of the graphics backend.
//!
//! - `context` owns the instance/device/queue and the render target: a window
//!   surface, or an offscreen texture that is read back on present.
//! - `reflect` runs naga's GLSL front-end to compile stages and check the
//!   program interface at link time.
//! - `uniforms` mirrors the program's uniform block on the CPU.
//! - `objects` holds the stage/program handle tables and their error rules.
//! - `pipeline` turns a checked interface into a render pipeline.
//! - `state` glues everything together behind `GpuBackend`.

mod context;
pub(crate) mod objects;
mod pipeline;
pub(crate) mod reflect;
mod state;
pub(crate) mod uniforms;

pub(crate) use context::GpuContext;
pub use state::GpuBackend;
