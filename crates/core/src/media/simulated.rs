use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::{MediaHandle, MediaProvider, MediaSlot, PlaybackOptions, PlaybackRejection, ReadyState};

/// Behaviour of a simulated clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipProfile {
    /// Time spent buffering before the clip reports it can play.
    pub load_ms: u64,
    pub duration_secs: f64,
    /// Playback speed relative to the host clock. Anything other than 1.0
    /// makes the clip drift against a partner running at 1.0.
    pub rate: f64,
    /// When set, every `play()` request is rejected with this reason.
    pub reject_playback: Option<String>,
}

impl Default for ClipProfile {
    fn default() -> Self {
        Self {
            load_ms: 120,
            duration_secs: 4.0,
            rate: 1.0,
            reject_playback: None,
        }
    }
}

#[derive(Debug)]
struct ClipState {
    profile: ClipProfile,
    buffered_ms: u64,
    position: f64,
    playing: bool,
    options: PlaybackOptions,
    play_requests: u32,
    seeks: u32,
}

/// Deterministic in-memory media element.
///
/// Clones share the same underlying clip, so the host can keep a copy to
/// advance time while the sync controller owns another.
#[derive(Clone)]
pub struct SimulatedMedia {
    source: Arc<str>,
    shared: Arc<Mutex<ClipState>>,
}

impl SimulatedMedia {
    /// Creates an unbuffered, paused clip bound to `source`.
    pub fn new(source: impl Into<String>, profile: ClipProfile) -> Self {
        let state = ClipState {
            profile,
            buffered_ms: 0,
            position: 0.0,
            playing: false,
            options: PlaybackOptions::default(),
            play_requests: 0,
            seeks: 0,
        };
        Self {
            source: Arc::from(source.into()),
            shared: Arc::new(Mutex::new(state)),
        }
    }

    /// Advances buffering and, while playing, the playback position.
    pub fn step(&self, delta_ms: u64) {
        let mut clip = self.lock();
        clip.buffered_ms = clip.buffered_ms.saturating_add(delta_ms);
        if !clip.playing {
            return;
        }

        let duration = clip.profile.duration_secs;
        let next = clip.position + delta_ms as f64 / 1_000.0 * clip.profile.rate;
        if duration > 0.0 && next >= duration {
            if clip.options.looping {
                clip.position = next % duration;
            } else {
                clip.position = duration;
                clip.playing = false;
            }
        } else {
            clip.position = next;
        }
    }

    /// Skips the remaining buffering time.
    pub fn finish_loading(&self) {
        let mut clip = self.lock();
        clip.buffered_ms = clip.profile.load_ms;
    }

    pub fn set_rate(&self, rate: f64) {
        self.lock().profile.rate = rate;
    }

    /// Makes every following `play()` fail with `reason`.
    pub fn reject_playback(&self, reason: impl Into<String>) {
        self.lock().profile.reject_playback = Some(reason.into());
    }

    pub fn allow_playback(&self) {
        self.lock().profile.reject_playback = None;
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    pub fn options(&self) -> PlaybackOptions {
        self.lock().options
    }

    /// Number of `play()` calls received, accepted or not.
    pub fn play_requests(&self) -> u32 {
        self.lock().play_requests
    }

    pub fn seek_count(&self) -> u32 {
        self.lock().seeks
    }

    /// Moves the playhead without counting it as a controller seek.
    pub fn nudge(&self, seconds: f64) {
        self.lock().position = seconds.max(0.0);
    }

    pub fn source_url(&self) -> String {
        self.source.to_string()
    }

    fn lock(&self) -> MutexGuard<'_, ClipState> {
        // Clip fields are independent, a poisoned lock still holds usable state.
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MediaHandle for SimulatedMedia {
    fn source(&self) -> &str {
        &self.source
    }

    fn ready_state(&self) -> ReadyState {
        let clip = self.lock();
        if clip.buffered_ms >= clip.profile.load_ms {
            ReadyState::HaveEnoughData
        } else if clip.buffered_ms > 0 {
            ReadyState::HaveMetadata
        } else {
            ReadyState::HaveNothing
        }
    }

    fn current_time(&self) -> f64 {
        self.lock().position
    }

    fn seek(&mut self, seconds: f64) {
        let mut clip = self.lock();
        clip.position = seconds.max(0.0);
        clip.seeks += 1;
    }

    fn play(&mut self) -> Result<(), PlaybackRejection> {
        let mut clip = self.lock();
        clip.play_requests += 1;
        if let Some(reason) = &clip.profile.reject_playback {
            return Err(PlaybackRejection::new(reason.clone()));
        }
        clip.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.lock().playing = false;
    }

    fn apply_options(&mut self, options: PlaybackOptions) {
        self.lock().options = options;
    }
}

impl std::fmt::Debug for SimulatedMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clip = self.lock();
        f.debug_struct("SimulatedMedia")
            .field("source", &self.source)
            .field("position", &clip.position)
            .field("playing", &clip.playing)
            .finish()
    }
}

/// Hands out [`SimulatedMedia`] handles and keeps the current one per slot
/// so the host can drive their clocks. Loading a slot again releases the
/// handle it replaces.
#[derive(Debug, Default)]
pub struct SimulatedProvider {
    primary: ClipProfile,
    overlay: ClipProfile,
    live: Vec<(MediaSlot, SimulatedMedia)>,
    loads: usize,
}

impl SimulatedProvider {
    pub fn new(primary: ClipProfile, overlay: ClipProfile) -> Self {
        Self {
            primary,
            overlay,
            live: Vec::new(),
            loads: 0,
        }
    }

    /// Advances the current handle of each slot.
    pub fn step_all(&self, delta_ms: u64) {
        for (_, media) in &self.live {
            media.step(delta_ms);
        }
    }

    /// Most recently loaded handle for `slot`.
    pub fn latest(&self, slot: MediaSlot) -> Option<SimulatedMedia> {
        self.live
            .iter()
            .rev()
            .find(|(loaded, _)| *loaded == slot)
            .map(|(_, media)| media.clone())
    }

    /// Total number of handles created, including replaced ones.
    pub fn loads(&self) -> usize {
        self.loads
    }

    /// Number of handles the provider still drives.
    pub fn live(&self) -> usize {
        self.live.len()
    }
}

impl MediaProvider for SimulatedProvider {
    type Handle = SimulatedMedia;

    fn load(&mut self, slot: MediaSlot, url: &str) -> SimulatedMedia {
        let profile = match slot {
            MediaSlot::Primary => self.primary.clone(),
            MediaSlot::Overlay => self.overlay.clone(),
        };
        let media = SimulatedMedia::new(url, profile);
        self.loads += 1;
        self.live.retain(|(loaded, _)| *loaded != slot);
        self.live.push((slot, media.clone()));
        media
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> SimulatedMedia {
        SimulatedMedia::new(
            "/raw_clips/Dame/Dame_1.mp4",
            ClipProfile {
                load_ms: 100,
                duration_secs: 2.0,
                ..ClipProfile::default()
            },
        )
    }

    #[test]
    fn becomes_ready_after_buffering() {
        let media = clip();
        assert_eq!(media.ready_state(), ReadyState::HaveNothing);
        media.step(50);
        assert_eq!(media.ready_state(), ReadyState::HaveMetadata);
        media.step(50);
        assert!(media.ready_state().can_play());
    }

    #[test]
    fn advances_only_while_playing_and_loops() {
        let mut media = clip();
        media.finish_loading();
        media.step(500);
        assert_eq!(media.current_time(), 0.0);

        media.play().unwrap();
        media.step(1_500);
        assert!((media.current_time() - 1.5).abs() < 1e-9);
        media.step(1_000);
        assert!((media.current_time() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rejected_play_leaves_clip_stopped() {
        let mut media = clip();
        media.reject_playback("autoplay blocked");
        let err = media.play().unwrap_err();
        assert_eq!(err.reason, "autoplay blocked");
        assert!(!media.is_playing());
        assert_eq!(media.play_requests(), 1);
    }

    #[test]
    fn provider_tracks_latest_handles() {
        let mut provider = SimulatedProvider::default();
        provider.load(MediaSlot::Primary, "a");
        provider.load(MediaSlot::Overlay, "b");
        provider.load(MediaSlot::Primary, "c");

        assert_eq!(provider.loads(), 3);
        assert_eq!(provider.latest(MediaSlot::Primary).unwrap().source_url(), "c");
        assert_eq!(provider.latest(MediaSlot::Overlay).unwrap().source_url(), "b");
    }

    #[test]
    fn replaced_handles_are_released() {
        let mut provider = SimulatedProvider::default();
        let mut handles = Vec::new();
        for round in 0..5 {
            handles.push(provider.load(MediaSlot::Primary, &format!("raw-{round}")));
            provider.load(MediaSlot::Overlay, &format!("pose-{round}"));
        }
        assert_eq!(provider.live(), 2);

        provider.step_all(100);
        let stale = &handles[0];
        assert_eq!(stale.ready_state(), ReadyState::HaveNothing);
        let current = provider.latest(MediaSlot::Primary).unwrap();
        assert_eq!(current.source_url(), "raw-4");
        assert_eq!(current.ready_state(), ReadyState::HaveMetadata);
    }

    #[test]
    fn playback_can_be_allowed_again() {
        let mut media = clip();
        media.reject_playback("autoplay blocked");
        assert!(media.play().is_err());

        media.allow_playback();
        media.play().unwrap();
        assert!(media.is_playing());
        assert_eq!(media.play_requests(), 2);
    }
}
