//! Renderer data model: scaling and easing policies, the immutable options
//! snapshot handed over at start-up, and the contract both display backends
//! implement.

use std::time::Duration;

use crate::error::RenderError;
use crate::source::ImageData;

/// How a wallpaper is mapped onto a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMode {
    /// Fit inside the screen preserving aspect; letter/pillar-boxed, no crop.
    Center,
    /// Fill the screen ignoring aspect.
    Stretch,
    /// Width pinned to the screen, height follows the image aspect.
    FitHorizontal,
    /// Height pinned to the screen, width follows the image aspect.
    FitVertical,
}

impl Default for ScaleMode {
    fn default() -> Self {
        ScaleMode::Center
    }
}

/// Alpha ramp applied over a cross-fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EasingMode {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Default for EasingMode {
    fn default() -> Self {
        EasingMode::EaseInOut
    }
}

/// Immutable configuration passed to a backend at start-up.
#[derive(Debug, Clone, Copy)]
pub struct RendererOptions {
    pub scale_mode: ScaleMode,
    pub easing: EasingMode,
    /// Presentation rate; clamped to 1..=240 on construction.
    pub framerate: u32,
}

impl RendererOptions {
    pub fn new(scale_mode: ScaleMode, easing: EasingMode, framerate: u32) -> Self {
        Self {
            scale_mode,
            easing,
            framerate: framerate.clamp(1, 240),
        }
    }

    /// Voluntary per-frame sleep that paces presentation.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.framerate.clamp(1, 240)))
    }
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            scale_mode: ScaleMode::default(),
            easing: EasingMode::default(),
            framerate: 60,
        }
    }
}

/// Which display stack the process talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Wayland,
    X11,
}

impl SessionKind {
    /// `XDG_SESSION_TYPE=wayland` selects Wayland; any other value is X11.
    pub fn detect() -> Self {
        match std::env::var("XDG_SESSION_TYPE") {
            Ok(value) if value == "wayland" => SessionKind::Wayland,
            _ => SessionKind::X11,
        }
    }
}

/// Contract between the playlist manager and a display backend.
///
/// The render-owning thread is fixed at construction; no method may be called
/// from any other thread. GPU and display resources are owned exclusively by
/// the implementation and released by `cleanup` (and on drop) in reverse
/// acquisition order.
pub trait Renderer {
    /// Replaces the current texture with one built from `image` and cancels
    /// any fade in progress.
    fn set_image(&mut self, image: &ImageData) -> Result<(), RenderError>;

    /// Uploads `next`, then drives frames until the cross-fade completes.
    ///
    /// Blocks for roughly `duration`; returns `DisplayLost` if the display
    /// goes away mid-fade so the caller can reconnect.
    fn transition(&mut self, next: &ImageData, duration: Duration) -> Result<(), RenderError>;

    /// Produces one frame and sleeps out the remainder of the frame budget.
    fn render(&mut self) -> Result<(), RenderError>;

    /// Pixel size used for geometry (the primary output on Wayland).
    fn size(&self) -> (u32, u32);

    /// Cheap liveness probe for the display connection.
    fn is_display_running(&mut self) -> bool;

    /// Tears down and rebuilds the display connection and GPU resources.
    /// Textures are not carried over; the caller re-uploads via `set_image`.
    fn try_reconnect(&mut self) -> Result<(), RenderError>;

    /// Releases GPU and display resources. Idempotent.
    fn cleanup(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framerate_clamps_to_supported_range() {
        assert_eq!(
            RendererOptions::new(ScaleMode::Center, EasingMode::Linear, 0).framerate,
            1
        );
        assert_eq!(
            RendererOptions::new(ScaleMode::Center, EasingMode::Linear, 1000).framerate,
            240
        );
        assert_eq!(
            RendererOptions::new(ScaleMode::Center, EasingMode::Linear, 60).framerate,
            60
        );
    }

    #[test]
    fn frame_interval_matches_framerate() {
        let options = RendererOptions::new(ScaleMode::Center, EasingMode::Linear, 50);
        assert_eq!(options.frame_interval(), Duration::from_millis(20));
    }
}
