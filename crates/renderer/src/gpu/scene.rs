use std::time::{Duration, Instant};

use crate::fade::FadeEnvelope;
use crate::types::EasingMode;

use super::quad::GpuTexture;

/// What this frame should draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FramePlan {
    /// The current texture alone, fully opaque.
    Static,
    /// Current at full opacity underneath, incoming (and the masking
    /// overlay) at `alpha` on top.
    Blend { alpha: f32 },
}

/// The textures in play plus the running fade, shared by both backends.
///
/// Invariants: a fade is only in flight while `next` is set; completion
/// promotes `next` into `current` and drops the old texture exactly once.
pub(crate) struct Scene {
    current: Option<GpuTexture>,
    next: Option<GpuTexture>,
    envelope: Option<FadeEnvelope>,
}

impl Scene {
    pub(crate) fn new() -> Self {
        Self {
            current: None,
            next: None,
            envelope: None,
        }
    }

    pub(crate) fn current(&self) -> Option<&GpuTexture> {
        self.current.as_ref()
    }

    pub(crate) fn next(&self) -> Option<&GpuTexture> {
        self.next.as_ref()
    }

    pub(crate) fn has_current(&self) -> bool {
        self.current.is_some()
    }

    pub(crate) fn fading(&self) -> bool {
        self.envelope.is_some()
    }

    /// Static replacement of the on-screen image; cancels any fade.
    pub(crate) fn set_current(&mut self, texture: GpuTexture) {
        self.current = Some(texture);
        self.next = None;
        self.envelope = None;
    }

    /// Installs the fallback "from" side; only used when a transition is
    /// requested before any image was set.
    pub(crate) fn set_fallback_current(&mut self, texture: GpuTexture) {
        if self.current.is_none() {
            self.current = Some(texture);
        }
    }

    pub(crate) fn begin_fade(&mut self, next: GpuTexture, duration: Duration, now: Instant) {
        self.next = Some(next);
        self.envelope = Some(FadeEnvelope::new(duration, now));
    }

    /// Steps the fade clock and returns the plan for this frame.
    ///
    /// When the envelope completes, `next` is promoted to `current` (the old
    /// current drops here), the fade clears, and one final opaque frame of
    /// the promoted texture is planned.
    pub(crate) fn advance(&mut self, now: Instant, easing: EasingMode) -> FramePlan {
        let Some(envelope) = self.envelope else {
            return FramePlan::Static;
        };

        let progress = envelope.progress(now);
        if progress >= 1.0 {
            if let Some(next) = self.next.take() {
                self.current = Some(next);
            }
            self.envelope = None;
            return FramePlan::Static;
        }

        FramePlan::Blend {
            alpha: easing.sample(progress),
        }
    }

    /// Drops every texture; used ahead of device teardown.
    pub(crate) fn clear(&mut self) {
        self.current = None;
        self.next = None;
        self.envelope = None;
    }
}
