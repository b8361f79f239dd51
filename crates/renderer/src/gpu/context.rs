use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::error::RenderError;

/// Device-level GPU state shared by every surface a backend owns.
pub(crate) struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Requests an adapter compatible with `surface` and a device on it.
    pub(crate) fn new(
        instance: wgpu::Instance,
        surface: &wgpu::Surface<'_>,
    ) -> Result<Self, RenderError> {
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        }))
        .map_err(|err| RenderError::unavailable(format!("no suitable GPU adapter: {err}")))?;

        let info = adapter.get_info();
        tracing::debug!(
            name = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("smoothpaper device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| RenderError::unavailable(format!("failed to create GPU device: {err}")))?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

/// Wraps a surface built from raw display/window handles the backend keeps
/// alive for at least as long as the returned surface.
pub(crate) fn create_raw_surface(
    instance: &wgpu::Instance,
    raw_display_handle: RawDisplayHandle,
    raw_window_handle: RawWindowHandle,
) -> Result<wgpu::Surface<'static>, RenderError> {
    unsafe {
        instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
            raw_display_handle,
            raw_window_handle,
        })
    }
    .map_err(|err| RenderError::unavailable(format!("failed to create rendering surface: {err}")))
}

/// A configured swapchain surface plus its configuration.
pub(crate) struct SurfaceTarget {
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
}

impl SurfaceTarget {
    /// Picks a swapchain format (BGRA preferred, gamma-encoded) and
    /// configures the surface at `size` with Fifo presentation.
    pub(crate) fn configure(
        gpu: &GpuContext,
        surface: wgpu::Surface<'static>,
        size: (u32, u32),
    ) -> Result<Self, RenderError> {
        let caps = surface.get_capabilities(&gpu.adapter);
        if caps.formats.is_empty() {
            return Err(RenderError::unavailable(
                "surface reports no supported formats",
            ));
        }

        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| *format == wgpu::TextureFormat::Bgra8Unorm)
            .or_else(|| caps.formats.iter().copied().find(|format| !format.is_srgb()))
            .unwrap_or(caps.formats[0]);

        let present_mode = caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .unwrap_or(caps.present_modes[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.0.max(1),
            height: size.1.max(1),
            present_mode,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(&gpu.device, &config);

        Ok(Self { surface, config })
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub(crate) fn resize(&mut self, gpu: &GpuContext, size: (u32, u32)) {
        if size.0 == 0 || size.1 == 0 {
            return;
        }
        self.config.width = size.0;
        self.config.height = size.1;
        self.surface.configure(&gpu.device, &self.config);
    }

    /// Acquires the next frame, reconfiguring once on `Lost`/`Outdated`.
    /// Anything else is display loss for our purposes.
    pub(crate) fn acquire(&mut self, gpu: &GpuContext) -> Result<wgpu::SurfaceTexture, RenderError> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&gpu.device, &self.config);
                self.surface
                    .get_current_texture()
                    .map_err(|err| RenderError::lost(format!("surface unrecoverable: {err:?}")))
            }
            Err(wgpu::SurfaceError::Timeout) => {
                Err(RenderError::lost("surface acquire timed out"))
            }
            Err(err) => Err(RenderError::lost(format!("surface error: {err:?}"))),
        }
    }
}
