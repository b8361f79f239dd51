//! X11 backend.
//!
//! Draws into an override-redirect, desktop-typed window created at root
//! size and parented on the desktop window (found via the `__SWM_VROOT`
//! convention). On every completed transition the final frame is read back
//! and persisted as the root window's background pixmap, with the
//! `_XROOTPMAP_ID` / `ESETROOT_PMAP_ID` atoms updated and the pixmap
//! retained server-side so the wallpaper survives a daemon crash.

use std::ffi::c_void;
use std::num::NonZeroU32;
use std::ptr::NonNull;
use std::sync::Arc;
use std::time::{Duration, Instant};

use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XcbDisplayHandle, XcbWindowHandle};
use xcb::{x, Xid, XidNew};

use crate::error::RenderError;
use crate::geometry::half_extents;
use crate::gpu::{
    create_raw_surface, FramePlan, GpuContext, GpuTexture, QuadPipeline, Scene, SurfaceTarget,
    SLOT_CURRENT, SLOT_NEXT,
};
use crate::source::ImageData;
use crate::types::{Renderer, RendererOptions, ScaleMode};

/// Keep PutImage requests comfortably below the server's maximum request
/// length by uploading the pixmap in row bands.
const PUT_IMAGE_BAND_BYTES: usize = 256 * 1024;

/// X11 renderer; `conn` is `None` whenever the display has been lost or
/// released.
pub struct X11Renderer {
    options: RendererOptions,
    conn: Option<X11Connected>,
}

impl X11Renderer {
    pub fn create(options: RendererOptions) -> Result<Self, RenderError> {
        let conn = X11Connected::connect(options)?;
        Ok(Self {
            options,
            conn: Some(conn),
        })
    }

    fn connected(&mut self) -> Result<&mut X11Connected, RenderError> {
        self.conn
            .as_mut()
            .ok_or_else(|| RenderError::lost("x11 connection is down"))
    }

    fn fail(&mut self, err: RenderError) -> RenderError {
        self.conn = None;
        if err.is_display_lost() {
            err
        } else {
            RenderError::lost(err)
        }
    }
}

impl Renderer for X11Renderer {
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
                None => return Err(RenderError::lost("x11 connection is down")),
            };
            if let Err(err) = conn.render_frame() {
                return Err(self.fail(err));
            }
            if !conn.scene.fading() {
                break;
            }
        }

        // The fade has settled on the new image; make it outlive us.
        let conn = self.connected()?;
        if let Err(err) = conn.persist_root_pixmap() {
            return Err(self.fail(err));
        }
        Ok(())
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
            .map(|conn| (u32::from(conn.width), u32::from(conn.height)))
            .unwrap_or((0, 0))
    }

    fn is_display_running(&mut self) -> bool {
        match self.conn.as_ref() {
            Some(conn) => conn.connection.has_error().is_ok(),
            None => false,
        }
    }

    fn try_reconnect(&mut self) -> Result<(), RenderError> {
        self.cleanup();
        self.conn = Some(X11Connected::connect(self.options)?);
        Ok(())
    }

    fn cleanup(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.scene.clear();
        }
        self.conn = None;
    }
}

impl Drop for X11Renderer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

struct InternedAtoms {
    window_type: x::Atom,
    window_type_desktop: x::Atom,
    swm_vroot: x::Atom,
    xrootpmap_id: x::Atom,
    esetroot_pmap_id: x::Atom,
}

/// Destroys the desktop window after every GPU resource pointing at it has
/// been released; the shared connection keeps the display open until the
/// very end.
struct WindowGuard {
    connection: Arc<xcb::Connection>,
    window: x::Window,
}

impl Drop for WindowGuard {
    fn drop(&mut self) {
        self.connection.send_request(&x::DestroyWindow {
            window: self.window,
        });
        let _ = self.connection.flush();
    }
}

/// Everything owned while the X11 connection is alive. Field order is the
/// release order: GPU state first, then the window, with the display
/// connection outliving both.
struct X11Connected {
    options: RendererOptions,
    scene: Scene,
    quad: QuadPipeline,
    target: SurfaceTarget,
    gpu: GpuContext,
    window: WindowGuard,
    root: x::Window,
    width: u16,
    height: u16,
    depth: u8,
    atoms: InternedAtoms,
    background_pixmap: Option<x::Pixmap>,
    connection: Arc<xcb::Connection>,
}

impl X11Connected {
    fn connect(options: RendererOptions) -> Result<Self, RenderError> {
        let (connection, screen_num) = xcb::Connection::connect(None).map_err(|err| {
            RenderError::unavailable(format!("unable to open X11 display: {err}"))
        })?;

        let setup = connection.get_setup();
        let screen = setup
            .roots()
            .nth(screen_num as usize)
            .ok_or_else(|| RenderError::unavailable("default screen missing from setup"))?;
        let root = screen.root();
        let width = screen.width_in_pixels();
        let height = screen.height_in_pixels();
        let depth = screen.root_depth();
        let black = screen.black_pixel();
        let root_visual = screen.root_visual();

        if width == 0 || height == 0 {
            return Err(RenderError::unavailable("unable to get screen dimensions"));
        }

        let atoms = InternedAtoms {
            window_type: intern_atom(&connection, b"_NET_WM_WINDOW_TYPE")?,
            window_type_desktop: intern_atom(&connection, b"_NET_WM_WINDOW_TYPE_DESKTOP")?,
            swm_vroot: intern_atom(&connection, b"__SWM_VROOT")?,
            xrootpmap_id: intern_atom(&connection, b"_XROOTPMAP_ID")?,
            esetroot_pmap_id: intern_atom(&connection, b"ESETROOT_PMAP_ID")?,
        };

        let desktop = find_desktop_window(&connection, root, atoms.swm_vroot, width, height);

        let window: x::Window = connection.generate_id();
        connection
            .send_and_check_request(&x::CreateWindow {
                depth: x::COPY_FROM_PARENT as u8,
                wid: window,
                parent: desktop,
                x: 0,
                y: 0,
                width,
                height,
                border_width: 0,
                class: x::WindowClass::InputOutput,
                visual: root_visual,
                value_list: &[
                    x::Cw::BackPixel(black),
                    x::Cw::BackingStore(x::BackingStore::Always),
                    x::Cw::OverrideRedirect(true),
                    x::Cw::EventMask(x::EventMask::STRUCTURE_NOTIFY | x::EventMask::EXPOSURE),
                ],
            })
            .map_err(|err| {
                RenderError::unavailable(format!("failed to create desktop window: {err}"))
            })?;

        connection
            .send_and_check_request(&x::ChangeProperty {
                mode: x::PropMode::Replace,
                window,
                property: atoms.window_type,
                r#type: x::ATOM_ATOM,
                data: &[atoms.window_type_desktop],
            })
            .map_err(|err| {
                RenderError::unavailable(format!("failed to tag desktop window: {err}"))
            })?;

        connection.send_request(&x::ConfigureWindow {
            window,
            value_list: &[x::ConfigWindow::StackMode(x::StackMode::Below)],
        });
        connection.send_request(&x::MapWindow { window });
        connection
            .flush()
            .map_err(|err| RenderError::unavailable(format!("x11 flush failed: {err}")))?;

        // GPU bring-up against the freshly mapped window. The connection is
        // shared with the window guard so teardown can sequence GPU state,
        // window, and display correctly.
        let connection = Arc::new(connection);
        let instance = wgpu::Instance::default();
        let window_id = NonZeroU32::new(window.resource_id())
            .ok_or_else(|| RenderError::unavailable("x11 window id is zero"))?;
        let display_ptr = NonNull::new(connection.get_raw_conn() as *mut c_void)
            .ok_or_else(|| RenderError::unavailable("x11 connection pointer is null"))?;
        let display_handle =
            RawDisplayHandle::Xcb(XcbDisplayHandle::new(Some(display_ptr), screen_num));
        let window_handle = RawWindowHandle::Xcb(XcbWindowHandle::new(window_id));

        let surface = create_raw_surface(&instance, display_handle, window_handle)?;
        let gpu = GpuContext::new(instance, &surface)?;
        let mut quad = QuadPipeline::new(&gpu.device);
        let target =
            SurfaceTarget::configure(&gpu, surface, (u32::from(width), u32::from(height)))?;
        quad.prepare(&gpu.device, target.config.format);
        // The readback pass used for root-pixmap persistence always targets
        // BGRA regardless of the swapchain format.
        quad.prepare(&gpu.device, wgpu::TextureFormat::Bgra8Unorm);

        tracing::info!(width, height, depth, "x11 renderer connected");

        Ok(Self {
            options,
            scene: Scene::new(),
            quad,
            target,
            gpu,
            window: WindowGuard {
                connection: Arc::clone(&connection),
                window,
            },
            root,
            width,
            height,
            depth,
            atoms,
            background_pixmap: None,
            connection,
        })
    }

    fn screen_size(&self) -> (u32, u32) {
        (u32::from(self.width), u32::from(self.height))
    }

    fn render_frame(&mut self) -> Result<(), RenderError> {
        let plan = self.scene.advance(Instant::now(), self.options.easing);
        let draws = plan_draws(
            &self.scene,
            &self.quad,
            &self.gpu.queue,
            self.options.scale_mode,
            self.screen_size(),
            plan,
        );

        let frame = self.target.acquire(&self.gpu)?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("x11 frame"),
            });
        self.quad
            .encode(&mut encoder, &view, self.target.config.format, draws);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        self.connection
            .has_error()
            .map_err(|err| RenderError::lost(format!("x11 connection error: {err}")))?;

        std::thread::sleep(self.options.frame_interval());
        Ok(())
    }

    /// Renders the current image once more into an offscreen BGRA target,
    /// reads it back, and installs it as the root window's background
    /// pixmap so the wallpaper outlives the process.
    fn persist_root_pixmap(&mut self) -> Result<(), RenderError> {
        let (width, height) = self.screen_size();
        let pixels = self.read_back_frame(width, height)?;
        self.install_root_pixmap(width, height, &pixels)?;
        tracing::debug!(width, height, "persisted frame to root pixmap");
        Ok(())
    }

    fn read_back_frame(&mut self, width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
        let format = wgpu::TextureFormat::Bgra8Unorm;
        let texture = self.gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("root pixmap frame"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let unpadded_bytes_per_row = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
        let readback = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("root pixmap readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let draws = plan_draws(
            &self.scene,
            &self.quad,
            &self.gpu.queue,
            self.options.scale_mode,
            (width, height),
            FramePlan::Static,
        );
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("root pixmap pass"),
            });
        self.quad.encode(&mut encoder, &view, format, draws);
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.gpu
            .device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| RenderError::lost(format!("device poll failed: {err}")))?;
        rx.recv()
            .map_err(|_| RenderError::lost("readback callback dropped"))?
            .map_err(|err| RenderError::lost(format!("readback map failed: {err:?}")))?;

        // Strip the copy alignment padding down to tight 4-byte-aligned
        // rows; the data is already BGRA with a top-left origin.
        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in 0..height as usize {
            let start = row * padded_bytes_per_row as usize;
            pixels.extend_from_slice(&mapped[start..start + unpadded_bytes_per_row as usize]);
        }
        drop(mapped);
        readback.unmap();
        Ok(pixels)
    }

    fn install_root_pixmap(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<(), RenderError> {
        let conn = &self.connection;
        let lost = |err: xcb::ProtocolError| RenderError::lost(format!("x11 request failed: {err}"));

        // Reap a previous instance's retained pixmap before installing ours.
        conn.send_request(&x::KillClient { resource: 0 });

        let pixmap: x::Pixmap = conn.generate_id();
        conn.send_and_check_request(&x::CreatePixmap {
            depth: self.depth,
            pid: pixmap,
            drawable: x::Drawable::Window(self.root),
            width: width as u16,
            height: height as u16,
        })
        .map_err(lost)?;

        let gc: x::Gcontext = conn.generate_id();
        conn.send_and_check_request(&x::CreateGc {
            cid: gc,
            drawable: x::Drawable::Pixmap(pixmap),
            value_list: &[],
        })
        .map_err(lost)?;

        let row_bytes = width as usize * 4;
        let rows_per_band = (PUT_IMAGE_BAND_BYTES / row_bytes).max(1);
        let mut row = 0usize;
        while row < height as usize {
            let band = rows_per_band.min(height as usize - row);
            let data = &pixels[row * row_bytes..(row + band) * row_bytes];
            conn.send_and_check_request(&x::PutImage {
                format: x::ImageFormat::ZPixmap,
                drawable: x::Drawable::Pixmap(pixmap),
                gc,
                width: width as u16,
                height: band as u16,
                dst_x: 0,
                dst_y: row as i16,
                left_pad: 0,
                depth: self.depth,
                data,
            })
            .map_err(lost)?;
            row += band;
        }
        conn.send_request(&x::FreeGc { gc });

        conn.send_and_check_request(&x::ChangeWindowAttributes {
            window: self.root,
            value_list: &[x::Cw::BackPixmap(pixmap)],
        })
        .map_err(lost)?;
        for property in [self.atoms.xrootpmap_id, self.atoms.esetroot_pmap_id] {
            conn.send_and_check_request(&x::ChangeProperty {
                mode: x::PropMode::Replace,
                window: self.root,
                property,
                r#type: x::ATOM_PIXMAP,
                data: &[pixmap.resource_id()],
            })
            .map_err(lost)?;
        }
        conn.send_request(&x::ClearArea {
            exposures: false,
            window: self.root,
            x: 0,
            y: 0,
            width: width as u16,
            height: height as u16,
        });
        // Retain the pixmap server-side so it survives our exit.
        conn.send_request(&x::SetCloseDownMode {
            mode: x::CloseDown::RetainTemporary,
        });
        conn.flush()
            .map_err(|err| RenderError::lost(format!("x11 flush failed: {err}")))?;

        // The previous background pixmap is no longer referenced.
        if let Some(old) = self.background_pixmap.replace(pixmap) {
            conn.send_request(&x::FreePixmap { pixmap: old });
        }
        Ok(())
    }
}

/// Writes this frame's quad geometry and alphas, returning the draw list.
/// The X11 path never needs the masking overlay; letterbox bars stay black
/// on both sides of the fade.
fn plan_draws<'a>(
    scene: &'a Scene,
    quad: &QuadPipeline,
    queue: &wgpu::Queue,
    scale_mode: ScaleMode,
    size: (u32, u32),
    plan: FramePlan,
) -> Vec<(usize, &'a GpuTexture)> {
    let mut draws = Vec::with_capacity(2);
    match plan {
        FramePlan::Static => {
            if let Some(current) = scene.current() {
                let (hx, hy) = half_extents(scale_mode, size, current.size());
                quad.write_slot(queue, SLOT_CURRENT, hx, hy);
                current.set_alpha(queue, 1.0);
                draws.push((SLOT_CURRENT, current));
            }
        }
        FramePlan::Blend { alpha } => {
            if let Some(current) = scene.current() {
                let (hx, hy) = half_extents(scale_mode, size, current.size());
                quad.write_slot(queue, SLOT_CURRENT, hx, hy);
                current.set_alpha(queue, 1.0);
                draws.push((SLOT_CURRENT, current));
            }
            if let Some(next) = scene.next() {
                let (hx, hy) = half_extents(scale_mode, size, next.size());
                quad.write_slot(queue, SLOT_NEXT, hx, hy);
                next.set_alpha(queue, alpha);
                draws.push((SLOT_NEXT, next));
            }
        }
    }
    draws
}

fn intern_atom(conn: &xcb::Connection, name: &[u8]) -> Result<x::Atom, RenderError> {
    let cookie = conn.send_request(&x::InternAtom {
        only_if_exists: false,
        name,
    });
    let reply = conn
        .wait_for_reply(cookie)
        .map_err(|err| RenderError::unavailable(format!("failed to intern atom: {err}")))?;
    Ok(reply.atom())
}

/// Walks the root's children looking for a `__SWM_VROOT` tag, then narrows
/// to a mapped child matching the screen size; falls back to the root.
fn find_desktop_window(
    conn: &xcb::Connection,
    root: x::Window,
    swm_vroot: x::Atom,
    screen_width: u16,
    screen_height: u16,
) -> x::Window {
    let mut desktop = root;

    if let Ok(tree) = conn.wait_for_reply(conn.send_request(&x::QueryTree { window: root })) {
        for &child in tree.children() {
            let cookie = conn.send_request(&x::GetProperty {
                delete: false,
                window: child,
                property: swm_vroot,
                r#type: x::ATOM_WINDOW,
                long_offset: 0,
                long_length: 1,
            });
            if let Ok(reply) = conn.wait_for_reply(cookie) {
                if reply.r#type() == x::ATOM_WINDOW {
                    if let Some(&id) = reply.value::<u32>().first() {
                        desktop = unsafe { x::Window::new(id) };
                        break;
                    }
                }
            }
        }
    }

    for _ in 0..10 {
        let Ok(tree) = conn.wait_for_reply(conn.send_request(&x::QueryTree { window: desktop }))
        else {
            break;
        };
        let mut narrowed = None;
        for &child in tree.children() {
            let attrs =
                conn.wait_for_reply(conn.send_request(&x::GetWindowAttributes { window: child }));
            let Ok(attrs) = attrs else { continue };
            if attrs.map_state() != x::MapState::Viewable {
                continue;
            }
            let geometry = conn.wait_for_reply(conn.send_request(&x::GetGeometry {
                drawable: x::Drawable::Window(child),
            }));
            let Ok(geometry) = geometry else { continue };
            if geometry.width() == screen_width && geometry.height() == screen_height {
                narrowed = Some(child);
                break;
            }
        }
        match narrowed {
            Some(child) if child != desktop => desktop = child,
            _ => break,
        }
    }

    desktop
}
