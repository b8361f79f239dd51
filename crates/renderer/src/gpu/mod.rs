//! GPU plumbing shared by both display backends.
//!
//! - `context` owns the wgpu instance/adapter/device wiring and the
//!   per-surface swapchain configuration.
//! - `quad` is the single textured-quad pipeline: interleaved `(x, y, u, v)`
//!   vertices, clamp-to-edge linear sampling, and a per-texture alpha
//!   uniform multiplied into the sampled colour.
//! - `scene` holds the current/next textures plus the fade envelope and
//!   decides each frame whether to draw a static image or a blend.
//!
//! One `wgpu::Device` is shared across every surface a backend creates,
//! mirroring the single GL context of a classic EGL/GLX setup.

mod context;
mod quad;
mod scene;

pub(crate) use context::{create_raw_surface, GpuContext, SurfaceTarget};
pub(crate) use quad::{GpuTexture, QuadPipeline, SLOT_CURRENT, SLOT_NEXT, SLOT_OVERLAY};
pub(crate) use scene::{FramePlan, Scene};
