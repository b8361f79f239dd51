//! Rendering engine for the smoothpaper wallpaper daemon.
//!
//! The crate glues display-server plumbing, the `wgpu` quad pipeline, and the
//! cross-fade timeline together behind one trait. The overall flow is:
//!
//! ```text
//!   smoothpaper (CLI/daemon)
//!          │ RendererOptions
//!          ▼
//!   create_renderer ──▶ WaylandRenderer ──▶ per-output layer surface ─▶ frame
//!          │                 (or)
//!          └──────────▶ X11Renderer ──▶ override-redirect window ─▶ frame
//!                                             │
//!                                             └─▶ root pixmap on fade end
//! ```
//!
//! Both backends share the GPU plumbing in [`gpu`]: one device, one textured
//! quad pipeline with a per-draw alpha, and a [`gpu::Scene`] holding the
//! current/next textures plus the running fade envelope. The playlist manager
//! drives everything through the [`Renderer`] trait and never sees a display
//! handle.

mod error;
mod fade;
mod geometry;
mod gpu;
mod source;
mod types;
mod wayland;
mod x11;

pub use error::RenderError;
pub use fade::FadeEnvelope;
pub use geometry::half_extents;
pub use source::{load_image, DecodeError, ImageData};
pub use types::{EasingMode, Renderer, RendererOptions, ScaleMode, SessionKind};
pub use wayland::WaylandRenderer;
pub use x11::X11Renderer;

/// Builds the backend matching the current session.
///
/// `XDG_SESSION_TYPE=wayland` selects the layer-shell backend; anything else
/// falls back to X11. This is the single dispatch point; callers only ever
/// hold a `Box<dyn Renderer>`.
pub fn create_renderer(options: RendererOptions) -> Result<Box<dyn Renderer>, RenderError> {
    match SessionKind::detect() {
        SessionKind::Wayland => {
            tracing::info!("detected Wayland session");
            Ok(Box::new(WaylandRenderer::create(options)?))
        }
        SessionKind::X11 => {
            tracing::info!("Wayland not detected, assuming X11 session");
            Ok(Box::new(X11Renderer::create(options)?))
        }
    }
}
