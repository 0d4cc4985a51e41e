use std::fmt;
use std::num::NonZeroU32;

/// Pipeline step a shader stage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    pub(crate) fn naga_stage(self) -> naga::ShaderStage {
        match self {
            StageKind::Vertex => naga::ShaderStage::Vertex,
            StageKind::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Backend handle for a shader stage object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(pub NonZeroU32);

/// Backend handle for a program object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub NonZeroU32);

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage#{}", self.0)
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program#{}", self.0)
    }
}

/// Location of a uniform inside a linked program. Always non-negative; a
/// uniform the program does not declare has no location at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

/// Typed value pushed into a uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
}

impl UniformValue {
    /// Size of the value in bytes as laid out in a `std140` block.
    pub fn byte_len(&self) -> usize {
        match self {
            UniformValue::Float(_) => 4,
            UniformValue::Vec2(_) => 8,
            UniformValue::Vec3(_) => 12,
        }
    }

    pub(crate) fn write_to(&self, out: &mut [u8]) {
        match self {
            UniformValue::Float(value) => out.copy_from_slice(bytemuck::bytes_of(value)),
            UniformValue::Vec2(value) => out.copy_from_slice(bytemuck::cast_slice(value)),
            UniformValue::Vec3(value) => out.copy_from_slice(bytemuck::cast_slice(value)),
        }
    }
}

/// Dimensions of the presentation surface, captured once at bootstrap.
///
/// The same size drives the viewport and the `resolution` uniform for the
/// whole lifetime of the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
}

impl SurfaceConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn resolution(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

/// Graphics API family the context should be created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderingApi {
    /// Whatever the platform considers native (Vulkan, Metal, DX12).
    #[default]
    Primary,
    /// OpenGL ES through the GL backend, restricted to WebGL2-class limits.
    OpenGlEs,
}

/// Context parameters requested at bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextRequest {
    pub api: RenderingApi,
    /// Display refreshes between presented frames; 0 disables vsync.
    pub swap_interval: u32,
}

impl Default for ContextRequest {
    fn default() -> Self {
        Self {
            api: RenderingApi::OpenGlEs,
            swap_interval: 1,
        }
    }
}

/// Names of the two shader resources making up the demo program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSources {
    pub vertex: String,
    pub fragment: String,
}

impl Default for ProgramSources {
    fn default() -> Self {
        Self {
            vertex: "raymarch.vert".to_string(),
            fragment: "raymarch.frag".to_string(),
        }
    }
}

/// Immutable configuration for one demo run.
///
/// There is no command line or configuration file; the defaults describe the
/// reference deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    pub title: String,
    pub sources: ProgramSources,
    pub context: ContextRequest,
    /// Colour the surface is cleared to right after the context comes up.
    pub clear_color: [f32; 4],
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "Cool Demo".to_string(),
            sources: ProgramSources::default(),
            context: ContextRequest::default(),
            clear_color: [1.0, 0.0, 0.0, 0.0],
        }
    }
}
