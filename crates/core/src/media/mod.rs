//! Abstraction over the two playback elements supplied by the host.

use std::fmt;

use serde::{Deserialize, Serialize};

mod simulated;

pub use simulated::{ClipProfile, SimulatedMedia, SimulatedProvider};

/// Readiness levels reported by a media element, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// True once enough data is buffered to start and scrub.
    pub fn can_play(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// Which of the two stacked layers a handle renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSlot {
    Primary,
    Overlay,
}

impl fmt::Display for MediaSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSlot::Primary => f.write_str("primary"),
            MediaSlot::Overlay => f.write_str("overlay"),
        }
    }
}

/// Element attributes applied to both handles before playback starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackOptions {
    pub muted: bool,
    pub looping: bool,
    pub plays_inline: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            muted: true,
            looping: true,
            plays_inline: true,
        }
    }
}

/// The environment declined a `play()` request, typically an autoplay policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct PlaybackRejection {
    pub reason: String,
}

impl PlaybackRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A loadable, seekable, playable media resource.
pub trait MediaHandle {
    /// URL the handle is bound to.
    fn source(&self) -> &str;

    fn ready_state(&self) -> ReadyState;

    /// Playback position in seconds.
    fn current_time(&self) -> f64;

    fn seek(&mut self, seconds: f64);

    fn play(&mut self) -> Result<(), PlaybackRejection>;

    fn pause(&mut self);

    fn apply_options(&mut self, options: PlaybackOptions);
}

/// Factory used to create playback elements bound to resolved URLs.
pub trait MediaProvider {
    type Handle: MediaHandle;

    fn load(&mut self, slot: MediaSlot, url: &str) -> Self::Handle;
}
