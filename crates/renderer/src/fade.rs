//! Cross-fade timing: easing curves and the wall-clock envelope that maps
//! elapsed time to fade progress.

use std::time::{Duration, Instant};

use crate::types::EasingMode;

impl EasingMode {
    /// Maps progress in `[0, 1]` to an eased alpha in `[0, 1]`.
    pub fn sample(self, t: f32) -> f32 {
        let clamped = t.clamp(0.0, 1.0);
        match self {
            EasingMode::Linear => clamped,
            EasingMode::EaseIn => clamped * clamped,
            EasingMode::EaseOut => clamped * (2.0 - clamped),
            EasingMode::EaseInOut => {
                if clamped < 0.5 {
                    2.0 * clamped * clamped
                } else {
                    -1.0 + (4.0 - 2.0 * clamped) * clamped
                }
            }
        }
    }
}

/// Tracks an in-flight fade from its start instant and duration.
#[derive(Debug, Clone, Copy)]
pub struct FadeEnvelope {
    start: Instant,
    duration: Duration,
}

impl FadeEnvelope {
    pub fn new(duration: Duration, now: Instant) -> Self {
        Self {
            start: now,
            duration,
        }
    }

    /// Raw progress clamped to `1.0`; the caller applies easing.
    pub fn progress(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.start);
        let progress = elapsed.as_secs_f32() / self.duration.as_secs_f32().max(f32::EPSILON);
        progress.min(1.0)
    }

    pub fn finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [EasingMode; 4] = [
        EasingMode::Linear,
        EasingMode::EaseIn,
        EasingMode::EaseOut,
        EasingMode::EaseInOut,
    ];

    #[test]
    fn all_curves_hit_both_endpoints() {
        for mode in MODES {
            assert!((mode.sample(0.0) - 0.0).abs() < 1e-6, "{mode:?} at 0");
            assert!((mode.sample(1.0) - 1.0).abs() < 1e-6, "{mode:?} at 1");
        }
    }

    #[test]
    fn all_curves_are_monotonically_non_decreasing() {
        for mode in MODES {
            let mut last = 0.0f32;
            for step in 0..=100 {
                let sample = mode.sample(step as f32 / 100.0);
                assert!(sample >= last - f32::EPSILON, "{mode:?} at step {step}");
                last = sample;
            }
        }
    }

    #[test]
    fn ease_in_out_is_symmetric_about_the_midpoint() {
        let curve = EasingMode::EaseInOut;
        assert!((curve.sample(0.5) - 0.5).abs() < 1e-6);
        for step in 0..=50 {
            let t = step as f32 / 100.0;
            let lo = curve.sample(t);
            let hi = curve.sample(1.0 - t);
            assert!((lo + hi - 1.0).abs() < 1e-5, "asymmetric at t={t}");
        }
    }

    #[test]
    fn samples_clamp_out_of_range_input() {
        for mode in MODES {
            assert_eq!(mode.sample(-3.0), 0.0);
            assert!((mode.sample(7.0) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn envelope_reports_progress_and_completion() {
        let start = Instant::now();
        let envelope = FadeEnvelope::new(Duration::from_millis(100), start);
        let halfway = envelope.progress(start + Duration::from_millis(50));
        assert!((halfway - 0.5).abs() < 0.05);
        assert!(!envelope.finished(start + Duration::from_millis(50)));
        assert!(envelope.finished(start + Duration::from_millis(150)));
        assert_eq!(envelope.progress(start + Duration::from_secs(5)), 1.0);
    }
}
