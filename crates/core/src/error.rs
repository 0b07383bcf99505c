use crate::media::MediaSlot;

/// Result alias that carries the custom [`PoseRevealError`] type.
pub type Result<T> = std::result::Result<T, PoseRevealError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PoseRevealError {
    /// The widget was configured in a way that can never produce a valid
    /// mask or round cycle (empty roster, zero steps, ...). Raised at
    /// construction time so the widget never enters its running state.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A media pair never reached a playable readiness level within the
    /// configured number of checks.
    #[error("media not ready after {attempts} readiness checks ({sources})")]
    NotReady { sources: String, attempts: u32 },
    /// The environment refused to start playback for one of the slots.
    #[error("{slot} playback rejected: {reason}")]
    PlaybackRejected { slot: MediaSlot, reason: String },
    /// Invalid command line usage reported by the host binary.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl PoseRevealError {
    /// Wraps a free-form message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a configuration error.
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    /// Returns true for errors that must stop the widget from starting.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
