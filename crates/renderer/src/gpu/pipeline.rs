use std::borrow::Cow;

use wgpu::util::DeviceExt;

use crate::backend::{POSITION_SLOT, QUAD_VERTEX_COUNT, TEXCOORD_SLOT};
use crate::types::StageKind;

use super::objects::LinkedProgram;
use super::reflect::{ProgramInterface, UNIFORM_BINDING};
use super::uniforms::UniformBlock;

/// Everything a successfully linked program owns on the device.
pub(crate) struct LinkedPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub interface: ProgramInterface,
    pub uniforms: Option<GpuUniforms>,
    pub positions: wgpu::Buffer,
    pub texcoords: wgpu::Buffer,
}

impl LinkedProgram for LinkedPipeline {
    fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    fn uniforms_mut(&mut self) -> Option<&mut UniformBlock> {
        self.uniforms.as_mut().map(|uniforms| &mut uniforms.block)
    }
}

/// CPU mirror of the uniform block plus the buffer it is flushed into.
pub(crate) struct GpuUniforms {
    pub block: UniformBlock,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl GpuUniforms {
    /// Writes pending uniform changes through the queue.
    pub fn flush(&mut self, queue: &wgpu::Queue) {
        if let Some(bytes) = self.block.take_dirty() {
            queue.write_buffer(&self.buffer, 0, bytes);
        }
    }
}

/// GLSL sources of a program's two stages.
pub(crate) struct StageSources<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
}

/// Builds the render pipeline for a program whose interface already checked
/// out. Device-side failures surface through the caller's error scope.
pub(crate) fn build(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    sources: StageSources<'_>,
    interface: ProgramInterface,
) -> LinkedPipeline {
    let vertex_module = shader_module(device, StageKind::Vertex, sources.vertex);
    let fragment_module = shader_module(device, StageKind::Fragment, sources.fragment);

    let uniforms = interface.uniforms.clone().map(|layout| {
        let block = UniformBlock::new(layout);
        let bind_group_layout = uniform_layout(device);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("program uniforms"),
            size: block.layout().buffer_size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("program uniform bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: UNIFORM_BINDING,
                resource: buffer.as_entire_binding(),
            }],
        });
        (
            GpuUniforms {
                block,
                buffer,
                bind_group,
            },
            bind_group_layout,
        )
    });

    let bind_group_layouts: Vec<&wgpu::BindGroupLayout> =
        uniforms.iter().map(|(_, layout)| layout).collect();
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("program pipeline layout"),
        bind_group_layouts: &bind_group_layouts,
        push_constant_ranges: &[],
    });

    let position_attributes = [wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x4,
        offset: 0,
        shader_location: POSITION_SLOT,
    }];
    let texcoord_attributes = [wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x2,
        offset: 0,
        shader_location: TEXCOORD_SLOT,
    }];
    let vertex_buffers = [
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &position_attributes,
        },
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &texcoord_attributes,
        },
    ];

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("program pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some("main"),
            buffers: &vertex_buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });

    LinkedPipeline {
        pipeline,
        interface,
        uniforms: uniforms.map(|(uniforms, _)| uniforms),
        positions: vertex_buffer::<[f32; 4]>(device, "quad positions"),
        texcoords: vertex_buffer::<[f32; 2]>(device, "quad texcoords"),
    }
}

fn shader_module(device: &wgpu::Device, kind: StageKind, source: &str) -> wgpu::ShaderModule {
    let stage = match kind {
        StageKind::Vertex => wgpu::naga::ShaderStage::Vertex,
        StageKind::Fragment => wgpu::naga::ShaderStage::Fragment,
    };
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(match kind {
            StageKind::Vertex => "vertex stage",
            StageKind::Fragment => "fragment stage",
        }),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_string()),
            stage,
            defines: &[],
        },
    })
}

fn uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("uniform layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: UNIFORM_BINDING,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Room for one full-screen strip; draws rewrite it every time.
fn vertex_buffer<T: bytemuck::Pod + Default>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    let zeroed = vec![T::default(); QUAD_VERTEX_COUNT];
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&zeroed),
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
    })
}
