use std::sync::Arc;

use anyhow::{anyhow, Context as AnyhowContext, Result};
use winit::window::Window;

use crate::types::{ContextRequest, RenderingApi, SurfaceConfig};

/// Format of the offscreen colour target.
pub(crate) const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const BYTES_PER_PIXEL: u32 = 4;

/// Where presented frames end up.
pub(crate) enum RenderTarget {
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        readback: wgpu::Buffer,
        padded_row: u32,
    },
}

/// Texture the current frame renders into.
pub(crate) struct Frame {
    surface_texture: Option<wgpu::SurfaceTexture>,
    pub view: wgpu::TextureView,
}

pub(crate) struct GpuContext {
    _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub format: wgpu::TextureFormat,
    pub size: SurfaceConfig,
    target: RenderTarget,
}

impl GpuContext {
    /// Builds a context presenting to `window`.
    pub(crate) fn for_window(
        window: Arc<Window>,
        size: SurfaceConfig,
        request: ContextRequest,
    ) -> Result<Self> {
        let instance = create_instance(request.api);
        let surface = instance
            .create_surface(window)
            .context("failed to create rendering surface")?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface), request.api)?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: present_mode(request.swap_interval),
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        tracing::debug!(?format, present_mode = ?config.present_mode, "configured window surface");

        Ok(Self {
            _instance: instance,
            device,
            queue,
            format,
            size,
            target: RenderTarget::Window { surface, config },
        })
    }

    /// Builds a context rendering into an RGBA8 texture that is read back on
    /// every present.
    pub(crate) fn headless(size: SurfaceConfig, api: RenderingApi) -> Result<Self> {
        let instance = create_instance(api);
        let (_adapter, device, queue) = request_device(&instance, None, api)?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let padded_row = padded_bytes_per_row(size.width);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("offscreen readback"),
            size: u64::from(padded_row) * u64::from(size.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            _instance: instance,
            device,
            queue,
            format: OFFSCREEN_FORMAT,
            size,
            target: RenderTarget::Offscreen {
                texture,
                readback,
                padded_row,
            },
        })
    }

    /// Acquires the texture the next frame draws into.
    pub(crate) fn acquire(&self) -> Result<Frame, wgpu::SurfaceError> {
        match &self.target {
            RenderTarget::Window { surface, .. } => {
                let texture = surface.get_current_texture()?;
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(Frame {
                    surface_texture: Some(texture),
                    view,
                })
            }
            RenderTarget::Offscreen { texture, .. } => Ok(Frame {
                surface_texture: None,
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            }),
        }
    }

    /// Reconfigures the window surface with the bootstrap size.
    pub(crate) fn reconfigure(&self) {
        if let RenderTarget::Window { surface, config } = &self.target {
            surface.configure(&self.device, config);
        }
    }

    /// Shows a finished frame. Offscreen targets return their tightly packed
    /// RGBA8 pixels instead.
    pub(crate) fn finish(&self, frame: Frame) -> Result<Option<Vec<u8>>> {
        match &self.target {
            RenderTarget::Window { .. } => {
                if let Some(texture) = frame.surface_texture {
                    texture.present();
                }
                Ok(None)
            }
            RenderTarget::Offscreen {
                texture,
                readback,
                padded_row,
            } => self.read_back(texture, readback, *padded_row).map(Some),
        }
    }

    fn read_back(
        &self,
        texture: &wgpu::Texture,
        readback: &wgpu::Buffer,
        padded_row: u32,
    ) -> Result<Vec<u8>> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("offscreen readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(self.size.height),
                },
            },
            wgpu::Extent3d {
                width: self.size.width,
                height: self.size.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| anyhow!("device poll failed: {err}"))?;
        rx.recv()
            .context("readback callback dropped")?
            .map_err(|err| anyhow!("failed to map readback buffer: {err}"))?;

        let row = (self.size.width * BYTES_PER_PIXEL) as usize;
        let mut pixels = Vec::with_capacity(row * self.size.height as usize);
        {
            let mapped = slice.get_mapped_range();
            for chunk in mapped.chunks(padded_row as usize) {
                pixels.extend_from_slice(&chunk[..row]);
            }
        }
        readback.unmap();
        Ok(pixels)
    }
}

fn create_instance(api: RenderingApi) -> wgpu::Instance {
    let backends = match api {
        RenderingApi::Primary => wgpu::Backends::PRIMARY,
        RenderingApi::OpenGlEs => wgpu::Backends::GL,
    };
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends,
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
    api: RenderingApi,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: surface,
        force_fallback_adapter: false,
    }))
    .context("failed to find a suitable GPU adapter")?;

    let info = adapter.get_info();
    tracing::debug!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        "selected GPU adapter"
    );

    let required_limits = match api {
        RenderingApi::Primary => adapter.limits(),
        RenderingApi::OpenGlEs => {
            wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
        }
    };

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("hackdemo device"),
        required_features: wgpu::Features::empty(),
        required_limits,
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::default(),
    }))
    .context("failed to create GPU device")?;

    Ok((adapter, device, queue))
}

/// Maps a GL-style swap interval onto a present mode every surface supports.
pub(crate) fn present_mode(swap_interval: u32) -> wgpu::PresentMode {
    match swap_interval {
        0 => wgpu::PresentMode::AutoNoVsync,
        1 => wgpu::PresentMode::AutoVsync,
        requested => {
            tracing::warn!(
                requested,
                clamped = 1,
                "swap intervals above 1 are not supported; clamping"
            );
            wgpu::PresentMode::AutoVsync
        }
    }
}

fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}
