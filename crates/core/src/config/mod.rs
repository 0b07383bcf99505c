use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{media::PlaybackOptions, PoseRevealError, Result};

/// Top-level configuration structure for the widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reveal: RevealConfig,
    pub sync: SyncConfig,
    pub round: RoundConfig,
    pub assets: AssetConfig,
    /// Players cycled through by the guessing variant, in order.
    pub roster: Vec<String>,
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Checks every section. The roster is only required by the guessing
    /// variant, so it is validated separately through [`Self::validate_roster`].
    pub fn validate(&self) -> Result<()> {
        self.reveal.validate()?;
        self.sync.validate()?;
        self.assets.validate()?;
        Ok(())
    }

    pub fn validate_roster(&self) -> Result<()> {
        if self.roster.is_empty() {
            return Err(PoseRevealError::config("roster must contain at least one player"));
        }
        Ok(())
    }
}

/// Reveal stepping configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    pub total_steps: u32,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self { total_steps: 10 }
    }
}

impl RevealConfig {
    pub fn validate(&self) -> Result<()> {
        if self.total_steps == 0 {
            return Err(PoseRevealError::config("reveal.total_steps must be positive"));
        }
        Ok(())
    }
}

/// Timing of the readiness poll and drift correction loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub ready_poll_interval_ms: u64,
    /// Number of failed readiness checks after which the pair is declared
    /// not ready for good.
    pub max_ready_attempts: u32,
    pub drift_check_interval_ms: u64,
    /// Largest tolerated position difference, in seconds.
    pub drift_tolerance_secs: f64,
    pub playback: PlaybackOptions,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ready_poll_interval_ms: 50,
            max_ready_attempts: 200,
            drift_check_interval_ms: 1_000,
            drift_tolerance_secs: 0.1,
            playback: PlaybackOptions::default(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ready_poll_interval_ms == 0 {
            return Err(PoseRevealError::config("sync.ready_poll_interval_ms must be positive"));
        }
        if self.max_ready_attempts == 0 {
            return Err(PoseRevealError::config("sync.max_ready_attempts must be positive"));
        }
        if self.drift_check_interval_ms == 0 {
            return Err(PoseRevealError::config("sync.drift_check_interval_ms must be positive"));
        }
        if !self.drift_tolerance_secs.is_finite() || self.drift_tolerance_secs < 0.0 {
            return Err(PoseRevealError::config(
                "sync.drift_tolerance_secs must be a finite, non-negative number",
            ));
        }
        Ok(())
    }
}

/// Round progression settings for the guessing variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Pause between a correct guess and the switch to the next player.
    pub advance_delay_ms: u64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            advance_delay_ms: 500,
        }
    }
}

/// Naming convention for clip URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub base_url: String,
    pub raw_dir: String,
    pub overlay_dir: String,
    pub extension: String,
    pub clip_number: u32,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            raw_dir: "raw_clips".to_string(),
            overlay_dir: "gifs".to_string(),
            extension: "mp4".to_string(),
            clip_number: 1,
        }
    }
}

impl AssetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.clip_number == 0 {
            return Err(PoseRevealError::config("assets.clip_number starts at 1"));
        }
        if self.raw_dir.trim().is_empty() || self.overlay_dir.trim().is_empty() {
            return Err(PoseRevealError::config("asset category directories must be named"));
        }
        if self.extension.trim().is_empty() {
            return Err(PoseRevealError::config("assets.extension must not be empty"));
        }
        Ok(())
    }
}
