use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::{
    assets::{AssetResolver, ClipSources},
    config::AppConfig,
    media::{MediaProvider, MediaSlot},
    reveal::{MaskSpec, RevealState},
    sync::{MediaSyncController, SyncEvent, SyncPhase},
    Result,
};

/// Snapshot of everything the host needs to render the widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    pub sources: Option<ClipSources>,
    pub step: u32,
    pub total_steps: u32,
    pub clip_path: String,
    pub sync: SyncPhase,
}

#[derive(Debug, Clone)]
struct ActiveClip {
    player: String,
    clip_number: u32,
    sources: ClipSources,
}

/// The single-clip reveal widget: one player's raw and pose clips played in
/// lockstep, with the pose layer exposed step by step.
pub struct PoseRevealPlayer<P: MediaProvider> {
    assets: AssetResolver,
    reveal: RevealState,
    sync: MediaSyncController<P::Handle>,
    provider: P,
    default_clip: u32,
    active: Option<ActiveClip>,
}

impl<P: MediaProvider> PoseRevealPlayer<P> {
    /// Validates the configuration. Nothing is loaded until [`Self::load`].
    pub fn new(config: &AppConfig, provider: P) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            assets: AssetResolver::new(config.assets.clone())?,
            reveal: RevealState::new(config.reveal.total_steps)?,
            sync: MediaSyncController::new(config.sync.clone())?,
            provider,
            default_clip: config.assets.clip_number,
            active: None,
        })
    }

    /// Points the widget at a player's clip. Loading the sources that are
    /// already attached is a no-op and returns `false`.
    pub fn load(&mut self, player: &str, clip_number: u32, now_ms: u64) -> Result<bool> {
        let sources = self.assets.clip_sources(player, clip_number)?;
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.sources == sources)
        {
            debug!(player, clip_number, "sources unchanged, keeping current session");
            return Ok(false);
        }

        let primary = self.provider.load(MediaSlot::Primary, &sources.primary);
        let overlay = self.provider.load(MediaSlot::Overlay, &sources.overlay);
        self.sync.attach(primary, overlay, now_ms);
        self.active = Some(ActiveClip {
            player: player.trim().to_string(),
            clip_number,
            sources,
        });
        Ok(true)
    }

    /// Loads the configured default clip for `player`.
    pub fn load_default(&mut self, player: &str, now_ms: u64) -> Result<bool> {
        self.load(player, self.default_clip, now_ms)
    }

    pub fn reveal_more(&mut self) -> u32 {
        self.reveal.increment()
    }

    pub fn reveal_less(&mut self) -> u32 {
        self.reveal.decrement()
    }

    pub fn reset_reveal(&mut self) {
        self.reveal.reset();
    }

    pub fn reveal(&self) -> &RevealState {
        &self.reveal
    }

    pub fn mask(&self) -> MaskSpec {
        self.reveal.mask()
    }

    /// Drives the sync controller's timers.
    pub fn tick(&mut self, now_ms: u64) -> usize {
        self.sync.tick(now_ms)
    }

    /// Stops playback and cancels every pending callback.
    pub fn teardown(&mut self) {
        self.sync.detach();
        self.active = None;
    }

    pub fn player(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.player.as_str())
    }

    pub fn clip_number(&self) -> Option<u32> {
        self.active.as_ref().map(|active| active.clip_number)
    }

    pub fn sources(&self) -> Option<&ClipSources> {
        self.active.as_ref().map(|active| &active.sources)
    }

    pub fn sync(&self) -> &MediaSyncController<P::Handle> {
        &self.sync
    }

    pub fn drain_sync_events(&mut self) -> Vec<SyncEvent> {
        self.sync.drain_events()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Snapshot of sources, reveal mask and sync phase.
    pub fn view(&self) -> PlayerView {
        PlayerView {
            sources: self.sources().cloned(),
            step: self.reveal.current_step(),
            total_steps: self.reveal.total_steps(),
            clip_path: self.mask().clip_path(),
            sync: self.sync.phase(),
        }
    }
}

impl<P: MediaProvider> Drop for PoseRevealPlayer<P> {
    fn drop(&mut self) {
        self.sync.detach();
    }
}

impl<P: MediaProvider> fmt::Debug for PoseRevealPlayer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoseRevealPlayer")
            .field("reveal", &self.reveal)
            .field("active", &self.active)
            .field("sync", &self.sync.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ClipProfile, SimulatedProvider};

    fn provider() -> SimulatedProvider {
        let instant = ClipProfile {
            load_ms: 0,
            ..ClipProfile::default()
        };
        SimulatedProvider::new(instant.clone(), instant)
    }

    fn widget() -> PoseRevealPlayer<SimulatedProvider> {
        PoseRevealPlayer::new(&AppConfig::default(), provider()).unwrap()
    }

    #[test]
    fn loads_raw_as_primary_and_pose_as_overlay() {
        let mut widget = widget();
        assert!(widget.load_default("Dame", 0).unwrap());

        let primary = widget.provider().latest(MediaSlot::Primary).unwrap();
        let overlay = widget.provider().latest(MediaSlot::Overlay).unwrap();
        assert_eq!(primary.source_url(), "/raw_clips/Dame/Dame_1.mp4");
        assert_eq!(overlay.source_url(), "/gifs/Dame/Dame_1.mp4");
        assert_eq!(widget.sync().phase(), SyncPhase::Playing);
        assert_eq!(widget.player(), Some("Dame"));
    }

    #[test]
    fn reloading_the_same_sources_keeps_the_session() {
        let mut widget = widget();
        widget.load("Dame", 1, 0).unwrap();
        let session = widget.sync().session_id();

        assert!(!widget.load("Dame", 1, 100).unwrap());
        assert_eq!(widget.sync().session_id(), session);
        assert_eq!(widget.provider().loads(), 2);

        assert!(widget.load("Dame", 2, 200).unwrap());
        assert_ne!(widget.sync().session_id(), session);
    }

    #[test]
    fn reveal_controls_drive_the_mask() {
        let mut widget = widget();
        assert_eq!(widget.view().clip_path, "inset(100% 0% 0% 0%)");

        widget.reveal_more();
        widget.reveal_more();
        widget.reveal_less();
        let view = widget.view();
        assert_eq!(view.step, 1);
        assert_eq!(view.clip_path, "inset(90% 0% 0% 0%)");

        widget.reset_reveal();
        assert!(widget.reveal().is_fully_hidden());
    }

    #[test]
    fn teardown_stops_playback() {
        let mut widget = widget();
        widget.load_default("Kobe", 0).unwrap();
        let primary = widget.provider().latest(MediaSlot::Primary).unwrap();
        assert!(primary.is_playing());

        widget.teardown();
        assert!(!primary.is_playing());
        assert_eq!(widget.sync().pending_timers(), 0);
        assert_eq!(widget.view().sync, SyncPhase::Idle);
    }

    #[test]
    fn blank_player_is_rejected_before_loading() {
        let mut widget = widget();
        assert!(widget.load_default("   ", 0).unwrap_err().is_configuration());
        assert_eq!(widget.provider().loads(), 0);
    }
}
