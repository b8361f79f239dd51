use std::fmt;

/// Failures surfaced through the renderer contract.
///
/// Every backend folds its diagnostics into one of these kinds so the
/// playlist manager can pick a recovery policy without knowing which display
/// server is behind the trait: `DisplayUnavailable` is fatal at start-up,
/// `DisplayLost` sends the manager into its reconnect loop.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("display unavailable: {0}")]
    DisplayUnavailable(String),
    #[error("display connection lost: {0}")]
    DisplayLost(String),
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

impl RenderError {
    pub(crate) fn unavailable(reason: impl fmt::Display) -> Self {
        RenderError::DisplayUnavailable(reason.to_string())
    }

    pub(crate) fn lost(reason: impl fmt::Display) -> Self {
        RenderError::DisplayLost(reason.to_string())
    }

    /// True when the manager should attempt a reconnect rather than exit.
    pub fn is_display_lost(&self) -> bool {
        matches!(self, RenderError::DisplayLost(_))
    }
}
