use anyhow::Result;
use tracing::warn;

use crate::backend::{BackendError, GraphicsBackend};
use crate::types::{ProgramId, StageId, StageKind, SurfaceConfig, UniformLocation, UniformValue};

use super::context::{Frame, GpuContext};
use super::objects::ObjectTables;
use super::pipeline::{self, LinkedPipeline, StageSources};
use super::reflect::ProgramInterface;

/// wgpu implementation of [`GraphicsBackend`].
///
/// Stage and program objects live in [`ObjectTables`]; a successful link
/// leaves a render pipeline behind. Clears and draws encode into the frame
/// acquired on first use; `present` submits and shows it.
pub struct GpuBackend {
    context: GpuContext,
    objects: ObjectTables<LinkedPipeline>,
    viewport: (u32, u32),
    frame: Option<Frame>,
    last_frame: Option<Vec<u8>>,
    message: Option<String>,
}

impl GpuBackend {
    pub(crate) fn new(context: GpuContext) -> Self {
        let objects = ObjectTables::new();
        let sink = objects.error_queue();
        context.device.on_uncaptured_error(Box::new(move |error| {
            warn!(%error, "uncaptured device error");
            if let Ok(mut queue) = sink.lock() {
                queue.push_back(BackendError::Device(error.to_string()));
            }
        }));
        let viewport = (context.size.width, context.size.height);
        Self {
            context,
            objects,
            viewport,
            frame: None,
            last_frame: None,
            message: None,
        }
    }

    /// Backend drawing into an offscreen RGBA8 target; each present reads the
    /// frame back so it can be inspected with [`GpuBackend::read_pixel`].
    pub fn headless(size: SurfaceConfig) -> Result<Self> {
        let context = GpuContext::headless(size, Default::default())?;
        Ok(Self::new(context))
    }

    pub fn surface_size(&self) -> SurfaceConfig {
        self.context.size
    }

    /// RGBA8 texel of the last presented offscreen frame; row 0 is the top.
    pub fn read_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let size = self.context.size;
        if x >= size.width || y >= size.height {
            return None;
        }
        let frame = self.last_frame.as_ref()?;
        let start = ((y * size.width + x) * 4) as usize;
        let texel = frame.get(start..start + 4)?;
        Some([texel[0], texel[1], texel[2], texel[3]])
    }

    /// Acquires the frame under construction if there is none yet.
    fn ensure_frame(&mut self) -> bool {
        if self.frame.is_some() {
            return true;
        }
        match self.context.acquire() {
            Ok(frame) => {
                self.frame = Some(frame);
                true
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.context.reconfigure();
                self.message = Some("surface lost; reconfigured".to_string());
                false
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.objects.raise(BackendError::OutOfMemory);
                false
            }
            Err(other) => {
                self.objects.raise(BackendError::Surface(other.to_string()));
                false
            }
        }
    }
}

/// Creates the pipeline inside a validation error scope so device-side
/// rejections become the link log.
fn build_pipeline(
    context: &GpuContext,
    interface: ProgramInterface,
    sources: StageSources<'_>,
) -> Result<LinkedPipeline, String> {
    let device = &context.device;
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let linked = pipeline::build(device, context.format, sources, interface);
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(format!("error: {error}")),
        None => Ok(linked),
    }
}

impl GraphicsBackend for GpuBackend {
    fn create_stage(&mut self, kind: StageKind) -> Option<StageId> {
        self.objects.create_stage(kind)
    }

    fn stage_source(&mut self, stage: StageId, source: &str) {
        self.objects.stage_source(stage, source);
    }

    fn compile_stage(&mut self, stage: StageId) {
        self.objects.compile_stage(stage);
    }

    fn stage_compiled(&self, stage: StageId) -> bool {
        self.objects.stage_compiled(stage)
    }

    fn stage_log(&self, stage: StageId) -> Option<String> {
        self.objects.stage_log(stage)
    }

    fn delete_stage(&mut self, stage: StageId) {
        self.objects.delete_stage(stage);
    }

    fn create_program(&mut self) -> Option<ProgramId> {
        self.objects.create_program()
    }

    fn attach_stage(&mut self, program: ProgramId, stage: StageId) {
        self.objects.attach_stage(program, stage);
    }

    fn bind_attribute(&mut self, program: ProgramId, slot: u32, name: &str) {
        self.objects.bind_attribute(program, slot, name);
    }

    fn link_program(&mut self, program: ProgramId) {
        let context = &self.context;
        self.objects.link_program(program, |interface, sources| {
            build_pipeline(context, interface, sources)
        });
    }

    fn program_linked(&self, program: ProgramId) -> bool {
        self.objects.program_linked(program)
    }

    fn program_log(&self, program: ProgramId) -> Option<String> {
        self.objects.program_log(program)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.objects.delete_program(program);
    }

    fn use_program(&mut self, program: ProgramId) {
        self.objects.use_program(program);
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.objects.uniform_location(program, name)
    }

    fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue) {
        self.objects.set_uniform(location, value);
    }

    fn enable_attribute(&mut self, slot: u32) {
        self.objects.enable_attribute(slot);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        let size = self.context.size;
        self.viewport = (width.min(size.width), height.min(size.height));
    }

    fn clear(&mut self, color: [f32; 4]) {
        if !self.ensure_frame() {
            return;
        }
        let Some(frame) = self.frame.as_ref() else {
            return;
        };
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("clear encoder"),
                });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(color[0]),
                            g: f64::from(color[1]),
                            b: f64::from(color[2]),
                            a: f64::from(color[3]),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw_triangle_strip(&mut self, positions: &[[f32; 4]], texcoords: &[[f32; 2]]) {
        if !self.objects.check_draw(positions, texcoords) || !self.ensure_frame() {
            return;
        }

        let (width, height) = self.viewport;
        let Some(frame) = self.frame.as_ref() else {
            return;
        };
        let Some(linked) = self.objects.current_mut() else {
            return;
        };

        let queue = &self.context.queue;
        queue.write_buffer(&linked.positions, 0, bytemuck::cast_slice(positions));
        queue.write_buffer(&linked.texcoords, 0, bytemuck::cast_slice(texcoords));
        if let Some(uniforms) = linked.uniforms.as_mut() {
            uniforms.flush(queue);
        }

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("draw encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            pass.set_pipeline(&linked.pipeline);
            if let Some(uniforms) = linked.uniforms.as_ref() {
                pass.set_bind_group(0, &uniforms.bind_group, &[]);
            }
            pass.set_vertex_buffer(0, linked.positions.slice(..));
            pass.set_vertex_buffer(1, linked.texcoords.slice(..));
            pass.draw(0..positions.len() as u32, 0..1);
        }
        queue.submit(std::iter::once(encoder.finish()));
    }

    fn present(&mut self) {
        // An untouched frame is still shown, like a buffer swap.
        if !self.ensure_frame() {
            return;
        }
        let Some(frame) = self.frame.take() else {
            return;
        };
        match self.context.finish(frame) {
            Ok(Some(pixels)) => self.last_frame = Some(pixels),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "failed to finish frame");
                self.objects.raise(BackendError::Surface(format!("{err:#}")));
            }
        }
    }

    fn take_error(&mut self) -> Option<BackendError> {
        self.objects.take_error()
    }

    fn take_message(&mut self) -> Option<String> {
        self.message.take()
    }
}
