//! Wayland layer-shell backend.
//!
//! One background layer surface per output, anchored to all four edges with
//! an exclusive zone of -1 so the compositor treats it as wallpaper. All
//! outputs share a single GPU device and draw the same scene; per-output
//! buffers are sized `logical x scale`.
//!
//! Protocol callbacks only record state on [`OutputEntry`] and raise a dirty
//! flag; GPU resources are rebuilt in an "event apply" step at the top of
//! each frame, never from inside a listener. A closed layer surface keeps
//! its output record so the next tick can re-create it; losing the
//! connection itself (or every output) surfaces as `DisplayLost` and tears
//! the whole backend down for `try_reconnect`.

use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::time::{Duration, Instant};

use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, WaylandDisplayHandle, WaylandWindowHandle,
};
use smithay_client_toolkit::compositor::{CompositorHandler, CompositorState};
use smithay_client_toolkit::output::{OutputHandler, OutputState};
use smithay_client_toolkit::reexports::client::globals::registry_queue_init;
use smithay_client_toolkit::reexports::client::protocol::{wl_output, wl_surface};
use smithay_client_toolkit::reexports::client::{Connection, EventQueue, Proxy, QueueHandle};
use smithay_client_toolkit::registry::{ProvidesRegistryState, RegistryState};
use smithay_client_toolkit::shell::wlr_layer::{
    Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
    LayerSurfaceConfigure,
};
use smithay_client_toolkit::shell::WaylandSurface;
use smithay_client_toolkit::{
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, registry_handlers,
};

use crate::error::RenderError;
use crate::geometry::half_extents;
use crate::gpu::{
    create_raw_surface, FramePlan, GpuContext, GpuTexture, QuadPipeline, Scene, SurfaceTarget,
    SLOT_CURRENT, SLOT_NEXT, SLOT_OVERLAY,
};
use crate::source::ImageData;
use crate::types::{Renderer, RendererOptions, ScaleMode};

/// Bound on the wait for the first layer-surface configure.
const CONFIGURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Wayland layer-shell renderer; `conn` is `None` whenever the display has
/// been lost or released.
pub struct WaylandRenderer {
    options: RendererOptions,
    conn: Option<Connected>,
}

impl WaylandRenderer {
    pub fn create(options: RendererOptions) -> Result<Self, RenderError> {
        let conn = Connected::connect(options)?;
        Ok(Self {
            options,
            conn: Some(conn),
        })
    }

    fn connected(&mut self) -> Result<&mut Connected, RenderError> {
        self.conn
            .as_mut()
            .ok_or_else(|| RenderError::lost("wayland connection is down"))
    }

    /// Drops the connection after a failure so the manager sees a dead
    /// display until `try_reconnect` succeeds.
    fn fail(&mut self, err: RenderError) -> RenderError {
        self.conn = None;
        if err.is_display_lost() {
            err
        } else {
            RenderError::lost(err)
        }
    }
}

impl Renderer for WaylandRenderer {
    fn set_image(&mut self, image: &ImageData) -> Result<(), RenderError> {
        let conn = self.connected()?;
        let texture = conn.quad.upload(&conn.gpu, image, "current wallpaper")?;
        conn.scene.set_current(texture);
        Ok(())
    }

    fn transition(&mut self, next: &ImageData, duration: Duration) -> Result<(), RenderError> {
        {
            let conn = self.connected()?;
            if !conn.scene.has_current() {
                let fallback = conn.quad.solid(&conn.gpu, [0, 0, 0, 255], "fallback black")?;
                conn.scene.set_fallback_current(fallback);
            }
            let texture = conn.quad.upload(&conn.gpu, next, "incoming wallpaper")?;
            conn.scene.begin_fade(texture, duration, Instant::now());
        }

        loop {
            let conn = match self.conn.as_mut() {
                Some(conn) => conn,
                None => return Err(RenderError::lost("wayland connection is down")),
            };
            if let Err(err) = conn.render_frame() {
                return Err(self.fail(err));
            }
            if !self
                .conn
                .as_ref()
                .map(|conn| conn.scene.fading())
                .unwrap_or(false)
            {
                return Ok(());
            }
        }
    }

    fn render(&mut self) -> Result<(), RenderError> {
        let result = match self.connected() {
            Ok(conn) => conn.render_frame(),
            Err(err) => return Err(err),
        };
        result.map_err(|err| self.fail(err))
    }

    fn size(&self) -> (u32, u32) {
        self.conn
            .as_ref()
            .and_then(Connected::primary_size)
            .unwrap_or((0, 0))
    }

    fn is_display_running(&mut self) -> bool {
        self.conn.is_some()
    }

    fn try_reconnect(&mut self) -> Result<(), RenderError> {
        self.cleanup();
        self.conn = Some(Connected::connect(self.options)?);
        Ok(())
    }

    fn cleanup(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.scene.clear();
        }
        // Field order on Connected releases GPU resources ahead of the
        // protocol objects and the display connection itself.
        self.conn = None;
    }
}

impl Drop for WaylandRenderer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Everything owned while the display connection is alive.
///
/// Field order is the release order: textures, pipeline and surfaces go
/// before the device, which goes before the layer surfaces and the
/// connection.
struct Connected {
    options: RendererOptions,
    scene: Scene,
    overlay: GpuTexture,
    quad: QuadPipeline,
    surfaces: HashMap<u32, SurfaceTarget>,
    gpu: GpuContext,
    app: App,
    event_queue: EventQueue<App>,
    qh: QueueHandle<App>,
    connection: Connection,
}

impl Connected {
    fn connect(options: RendererOptions) -> Result<Self, RenderError> {
        let connection = Connection::connect_to_env().map_err(|err| {
            RenderError::unavailable(format!("failed to connect to Wayland display: {err}"))
        })?;
        let (globals, mut event_queue) = registry_queue_init::<App>(&connection)
            .map_err(|err| RenderError::unavailable(format!("registry init failed: {err}")))?;
        let qh = event_queue.handle();

        let compositor = CompositorState::bind(&globals, &qh).map_err(|err| {
            RenderError::unavailable(format!("wl_compositor is not available: {err}"))
        })?;
        let layer_shell = LayerShell::bind(&globals, &qh).map_err(|err| {
            RenderError::unavailable(format!("layer shell protocol is not available: {err}"))
        })?;

        let mut app = App {
            registry_state: RegistryState::new(&globals),
            output_state: OutputState::new(&globals, &qh),
            compositor,
            layer_shell,
            outputs: HashMap::new(),
            dirty: true,
        };

        // Two roundtrips: one to learn the outputs, one for their geometry.
        for _ in 0..2 {
            event_queue
                .roundtrip(&mut app)
                .map_err(|err| RenderError::unavailable(format!("wayland roundtrip: {err}")))?;
        }

        if app.outputs.is_empty() {
            return Err(RenderError::unavailable("compositor advertised no outputs"));
        }

        app.ensure_layers(&qh);

        let deadline = Instant::now() + CONFIGURE_TIMEOUT;
        while !app.outputs.values().all(|entry| entry.configured) {
            if Instant::now() > deadline {
                return Err(RenderError::unavailable(
                    "timed out waiting for layer surface configure",
                ));
            }
            event_queue
                .roundtrip(&mut app)
                .map_err(|err| RenderError::unavailable(format!("wayland roundtrip: {err}")))?;
            // Outputs that appeared mid-wait need their layer surfaces too.
            app.ensure_layers(&qh);
        }

        // Bring up the GPU against the first configured output; the device
        // is shared by every surface after that.
        let instance = wgpu::Instance::default();
        let (&first_id, first_entry) = app
            .outputs
            .iter()
            .find(|(_, entry)| entry.configured)
            .ok_or_else(|| RenderError::unavailable("no configured output"))?;
        let layer = first_entry
            .layer
            .as_ref()
            .ok_or_else(|| RenderError::unavailable("configured output lost its surface"))?;
        let (display_handle, window_handle) = raw_handles(&connection, layer)?;
        let first_surface = create_raw_surface(&instance, display_handle, window_handle)?;
        let gpu = GpuContext::new(instance, &first_surface)?;
        let mut quad = QuadPipeline::new(&gpu.device);

        let mut surfaces = HashMap::new();
        layer.wl_surface().set_buffer_scale(first_entry.scale);
        let target = SurfaceTarget::configure(&gpu, first_surface, first_entry.buffer_size())?;
        quad.prepare(&gpu.device, target.config.format);
        surfaces.insert(first_id, target);

        let overlay = quad.solid(&gpu, [0, 0, 0, 255], "masking overlay")?;

        let mut connected = Self {
            options,
            scene: Scene::new(),
            overlay,
            quad,
            surfaces,
            gpu,
            app,
            event_queue,
            qh,
            connection,
        };
        connected.reconcile()?;
        tracing::info!(
            outputs = connected.surfaces.len(),
            "wayland renderer connected"
        );
        Ok(connected)
    }

    fn primary_size(&self) -> Option<(u32, u32)> {
        self.surfaces.values().next().map(SurfaceTarget::size)
    }

    /// Event-apply phase: rebuild whatever the listeners flagged since the
    /// previous frame. Layer surfaces are re-created for closed outputs and
    /// per-output swapchains follow size and scale changes.
    fn reconcile(&mut self) -> Result<(), RenderError> {
        if !self.app.dirty {
            return Ok(());
        }
        self.app.dirty = false;

        self.app.ensure_layers(&self.qh);

        let outputs = &self.app.outputs;
        self.surfaces.retain(|id, _| {
            outputs
                .get(id)
                .map(|entry| entry.layer.is_some() && entry.configured)
                .unwrap_or(false)
        });

        for (id, entry) in &self.app.outputs {
            if !entry.configured {
                continue;
            }
            let Some(layer) = entry.layer.as_ref() else {
                continue;
            };
            let wanted = entry.buffer_size();

            match self.surfaces.get_mut(id) {
                Some(target) => {
                    if target.size() != wanted {
                        layer.wl_surface().set_buffer_scale(entry.scale);
                        target.resize(&self.gpu, wanted);
                        tracing::debug!(output = id, ?wanted, "resized output surface");
                    }
                }
                None => {
                    let (display_handle, window_handle) = raw_handles(&self.connection, layer)?;
                    let surface = create_raw_surface(&self.gpu.instance, display_handle, window_handle)?;
                    layer.wl_surface().set_buffer_scale(entry.scale);
                    let target = SurfaceTarget::configure(&self.gpu, surface, wanted)?;
                    self.quad.prepare(&self.gpu.device, target.config.format);
                    tracing::info!(output = id, ?wanted, "created output surface");
                    self.surfaces.insert(*id, target);
                }
            }
        }

        Ok(())
    }

    /// One frame on every output, then one roundtrip and the pacing sleep.
    fn render_frame(&mut self) -> Result<(), RenderError> {
        self.reconcile()?;

        if self.app.outputs.is_empty() {
            return Err(RenderError::lost("all outputs are gone"));
        }

        let plan = self.scene.advance(Instant::now(), self.options.easing);
        match plan {
            FramePlan::Static => {
                if let Some(current) = self.scene.current() {
                    current.set_alpha(&self.gpu.queue, 1.0);
                }
            }
            FramePlan::Blend { alpha } => {
                if let Some(current) = self.scene.current() {
                    current.set_alpha(&self.gpu.queue, 1.0);
                }
                self.overlay.set_alpha(&self.gpu.queue, alpha);
                if let Some(next) = self.scene.next() {
                    next.set_alpha(&self.gpu.queue, alpha);
                }
            }
        }

        let ids: Vec<u32> = self.surfaces.keys().copied().collect();
        for id in ids {
            self.draw_output(id, plan)?;
        }

        self.event_queue
            .roundtrip(&mut self.app)
            .map_err(|err| RenderError::lost(format!("wayland roundtrip failed: {err}")))?;

        std::thread::sleep(self.options.frame_interval());
        Ok(())
    }

    fn draw_output(&mut self, id: u32, plan: FramePlan) -> Result<(), RenderError> {
        let Some(target) = self.surfaces.get_mut(&id) else {
            return Ok(());
        };
        let size = target.size();
        let scale_mode = self.options.scale_mode;

        let mut draws: Vec<(usize, &GpuTexture)> = Vec::with_capacity(3);
        match plan {
            FramePlan::Static => {
                if let Some(current) = self.scene.current() {
                    let (hx, hy) = half_extents(scale_mode, size, current.size());
                    self.quad.write_slot(&self.gpu.queue, SLOT_CURRENT, hx, hy);
                    draws.push((SLOT_CURRENT, current));
                }
            }
            FramePlan::Blend { .. } => {
                if let Some(current) = self.scene.current() {
                    let (hx, hy) = half_extents(scale_mode, size, current.size());
                    self.quad.write_slot(&self.gpu.queue, SLOT_CURRENT, hx, hy);
                    draws.push((SLOT_CURRENT, current));
                }
                // Full-screen black between the two images masks letterbox
                // borders mid-fade; at stretch it is visually a no-op.
                let (hx, hy) = half_extents(ScaleMode::Stretch, size, self.overlay.size());
                self.quad.write_slot(&self.gpu.queue, SLOT_OVERLAY, hx, hy);
                draws.push((SLOT_OVERLAY, &self.overlay));
                if let Some(next) = self.scene.next() {
                    let (hx, hy) = half_extents(scale_mode, size, next.size());
                    self.quad.write_slot(&self.gpu.queue, SLOT_NEXT, hx, hy);
                    draws.push((SLOT_NEXT, next));
                }
            }
        }

        let frame = target.acquire(&self.gpu)?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("output frame"),
            });
        self.quad
            .encode(&mut encoder, &view, target.config.format, draws);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

/// Per-output protocol state; mutated only by listeners, consumed by the
/// frame-side reconcile step.
struct OutputEntry {
    output: wl_output::WlOutput,
    layer: Option<LayerSurface>,
    logical_size: (u32, u32),
    scale: i32,
    configured: bool,
}

impl OutputEntry {
    fn buffer_size(&self) -> (u32, u32) {
        let scale = self.scale.max(1) as u32;
        (
            self.logical_size.0.max(1) * scale,
            self.logical_size.1.max(1) * scale,
        )
    }
}

/// smithay-client-toolkit dispatch state.
struct App {
    registry_state: RegistryState,
    output_state: OutputState,
    compositor: CompositorState,
    layer_shell: LayerShell,
    outputs: HashMap<u32, OutputEntry>,
    dirty: bool,
}

impl App {
    /// Creates a background layer surface for every output that lacks one.
    fn ensure_layers(&mut self, qh: &QueueHandle<Self>) {
        for (id, entry) in self.outputs.iter_mut() {
            if entry.layer.is_some() {
                continue;
            }
            let wl_surface = self.compositor.create_surface(qh);
            let layer = self.layer_shell.create_layer_surface(
                qh,
                wl_surface,
                Layer::Background,
                Some("smoothpaper"),
                Some(&entry.output),
            );
            layer.set_anchor(Anchor::TOP | Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT);
            layer.set_keyboard_interactivity(KeyboardInteractivity::None);
            layer.set_exclusive_zone(-1);
            layer.set_size(0, 0);
            layer.set_margin(0, 0, 0, 0);
            layer.commit();
            entry.configured = false;
            entry.layer = Some(layer);
            tracing::debug!(output = id, "created layer surface");
        }
    }

    fn entry_for_surface(&mut self, surface: &wl_surface::WlSurface) -> Option<&mut OutputEntry> {
        self.outputs.values_mut().find(|entry| {
            entry
                .layer
                .as_ref()
                .map(|layer| layer.wl_surface() == surface)
                .unwrap_or(false)
        })
    }

    fn entry_for_layer(&mut self, layer: &LayerSurface) -> Option<&mut OutputEntry> {
        self.outputs.values_mut().find(|entry| {
            entry
                .layer
                .as_ref()
                .map(|own| own.wl_surface() == layer.wl_surface())
                .unwrap_or(false)
        })
    }
}

impl CompositorHandler for App {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        surface: &wl_surface::WlSurface,
        new_factor: i32,
    ) {
        if let Some(entry) = self.entry_for_surface(surface) {
            if entry.scale != new_factor {
                entry.scale = new_factor;
                self.dirty = true;
            }
        }
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
        // Presentation is self-paced; frame callbacks are not used.
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for App {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        let Some(info) = self.output_state.info(&output) else {
            return;
        };
        tracing::info!(output = info.id, name = ?info.name, "output added");
        self.outputs.insert(
            info.id,
            OutputEntry {
                output,
                layer: None,
                logical_size: (0, 0),
                scale: info.scale_factor.max(1),
                configured: false,
            },
        );
        self.dirty = true;
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        let Some(info) = self.output_state.info(&output) else {
            return;
        };
        if let Some(entry) = self.outputs.get_mut(&info.id) {
            let scale = info.scale_factor.max(1);
            if entry.scale != scale {
                entry.scale = scale;
                self.dirty = true;
            }
        }
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        let id = self
            .outputs
            .iter()
            .find(|(_, entry)| entry.output == output)
            .map(|(id, _)| *id);
        if let Some(id) = id {
            tracing::info!(output = id, "output removed");
            self.outputs.remove(&id);
            self.dirty = true;
        }
    }
}

impl LayerShellHandler for App {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, layer: &LayerSurface) {
        if let Some(entry) = self.entry_for_layer(layer) {
            tracing::warn!("layer surface closed by compositor");
            entry.layer = None;
            entry.configured = false;
            self.dirty = true;
        }
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        // smithay-client-toolkit acks the configure before dispatching here.
        if let Some(entry) = self.entry_for_layer(layer) {
            let (width, height) = configure.new_size;
            entry.logical_size = (width.max(1), height.max(1));
            entry.configured = true;
            self.dirty = true;
            tracing::debug!(width, height, "layer surface configured");
        }
    }
}

impl ProvidesRegistryState for App {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState];
}

delegate_compositor!(App);
delegate_output!(App);
delegate_layer!(App);
delegate_registry!(App);

fn raw_handles(
    connection: &Connection,
    layer: &LayerSurface,
) -> Result<(RawDisplayHandle, RawWindowHandle), RenderError> {
    let display = NonNull::new(connection.backend().display_ptr() as *mut c_void)
        .ok_or_else(|| RenderError::lost("wayland display pointer is null"))?;
    let surface = NonNull::new(layer.wl_surface().id().as_ptr() as *mut c_void)
        .ok_or_else(|| RenderError::lost("wayland surface pointer is null"))?;
    Ok((
        RawDisplayHandle::Wayland(WaylandDisplayHandle::new(display)),
        RawWindowHandle::Wayland(WaylandWindowHandle::new(surface)),
    ))
}
