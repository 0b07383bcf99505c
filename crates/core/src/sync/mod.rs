//! Lockstep playback of the primary and overlay clips.
//!
//! Attaching a pair starts a readiness poll. Once both handles can play they
//! are rewound, started together and a periodic drift check keeps the overlay
//! aligned with the primary. Every pending callback lives in the controller's
//! own [`Scheduler`], so detaching or re-attaching drops them all at once and
//! a stale pair can never start playing.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::SyncConfig,
    media::{MediaHandle, MediaSlot},
    timeline::Scheduler,
    PoseRevealError, Result,
};

/// Where the attached pair currently is in the start-up protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SyncPhase {
    /// Nothing attached.
    Idle,
    /// At least one handle is still buffering.
    WaitingForMedia { attempts: u32 },
    /// Both handles accepted `play()`; drift correction is running.
    Playing,
    /// The environment refused playback. Drift correction still runs so a
    /// later user-initiated play stays aligned.
    PlaybackRejected,
    /// The pair never became playable. Terminal until the next attach.
    NotReady { attempts: u32 },
}

/// Observable outcomes of the sync loop, drained by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    SessionAttached {
        session: u64,
        primary: String,
        overlay: String,
    },
    PlaybackStarted {
        session: u64,
    },
    PlaybackRejected {
        session: u64,
        slot: MediaSlot,
        reason: String,
    },
    DriftCorrected {
        session: u64,
        primary_secs: f64,
        overlay_secs: f64,
    },
    ReadinessTimedOut {
        session: u64,
        attempts: u32,
    },
    Detached {
        session: u64,
    },
}

impl SyncEvent {
    /// Failure carried by this event, if it reports one.
    pub fn error(&self) -> Option<PoseRevealError> {
        match self {
            SyncEvent::PlaybackRejected { slot, reason, .. } => {
                Some(PoseRevealError::PlaybackRejected {
                    slot: *slot,
                    reason: reason.clone(),
                })
            }
            SyncEvent::ReadinessTimedOut { session, attempts } => Some(PoseRevealError::NotReady {
                sources: format!("session {session}"),
                attempts: *attempts,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncTask {
    ReadinessCheck,
    DriftCheck,
}

/// The pair of handles bound together for one round.
#[derive(Debug)]
struct SyncSession<M> {
    id: u64,
    primary: M,
    overlay: M,
    phase: SyncPhase,
    attempts: u32,
}

/// Returns the position the overlay must be moved to, or `None` when the two
/// positions are within `tolerance` of each other.
pub fn correct_drift(primary_secs: f64, overlay_secs: f64, tolerance: f64) -> Option<f64> {
    if (primary_secs - overlay_secs).abs() > tolerance {
        Some(primary_secs)
    } else {
        None
    }
}

/// Owns at most one attached media pair and its timers.
#[derive(Debug)]
pub struct MediaSyncController<M: MediaHandle> {
    config: SyncConfig,
    session: Option<SyncSession<M>>,
    timers: Scheduler<SyncTask>,
    next_session: u64,
    events: Vec<SyncEvent>,
}

impl<M: MediaHandle> MediaSyncController<M> {
    /// Creates an idle controller. Fails on invalid timing configuration.
    pub fn new(config: SyncConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session: None,
            timers: Scheduler::new(),
            next_session: 1,
            events: Vec::new(),
        })
    }

    /// Returns the timing configuration in use.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Binds a new pair, tearing down whatever was attached before, and runs
    /// the first readiness check immediately. Returns the new session id.
    pub fn attach(&mut self, mut primary: M, mut overlay: M, now_ms: u64) -> u64 {
        self.detach();

        primary.apply_options(self.config.playback);
        overlay.apply_options(self.config.playback);

        let id = self.next_session;
        self.next_session += 1;
        info!(
            session = id,
            primary = primary.source(),
            overlay = overlay.source(),
            "attaching media pair"
        );
        self.events.push(SyncEvent::SessionAttached {
            session: id,
            primary: primary.source().to_string(),
            overlay: overlay.source().to_string(),
        });
        self.session = Some(SyncSession {
            id,
            primary,
            overlay,
            phase: SyncPhase::WaitingForMedia { attempts: 0 },
            attempts: 0,
        });

        self.check_readiness(now_ms);
        id
    }

    /// Cancels every pending callback, pauses both handles and hands them
    /// back. Calling it with nothing attached is a no-op.
    pub fn detach(&mut self) -> Option<(M, M)> {
        let cancelled = self.timers.cancel_all();
        let mut session = self.session.take()?;

        session.primary.pause();
        session.overlay.pause();
        debug!(session = session.id, cancelled, "detached media pair");
        self.events.push(SyncEvent::Detached {
            session: session.id,
        });
        Some((session.primary, session.overlay))
    }

    /// Runs every callback due at `now_ms`. Returns how many fired.
    pub fn tick(&mut self, now_ms: u64) -> usize {
        let mut fired = 0;
        while let Some((_, task)) = self.timers.pop_due(now_ms) {
            fired += 1;
            match task {
                SyncTask::ReadinessCheck => self.check_readiness(now_ms),
                SyncTask::DriftCheck => self.check_drift(now_ms),
            }
        }
        fired
    }

    /// Returns the start-up phase of the attached pair, `Idle` if none.
    pub fn phase(&self) -> SyncPhase {
        self.session
            .as_ref()
            .map(|session| session.phase)
            .unwrap_or(SyncPhase::Idle)
    }

    /// Returns the id of the attached session, if any.
    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|session| session.id)
    }

    /// Returns true while a media pair is attached.
    pub fn is_attached(&self) -> bool {
        self.session.is_some()
    }

    /// Number of readiness or drift callbacks still scheduled.
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Terminal readiness failure of the attached pair, if any.
    pub fn readiness_error(&self) -> Option<PoseRevealError> {
        let session = self.session.as_ref()?;
        match session.phase {
            SyncPhase::NotReady { attempts } => Some(PoseRevealError::NotReady {
                sources: format!("{} + {}", session.primary.source(), session.overlay.source()),
                attempts,
            }),
            _ => None,
        }
    }

    /// Takes every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.events)
    }

    fn check_readiness(&mut self, now_ms: u64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if session.primary.ready_state().can_play() && session.overlay.ready_state().can_play() {
            self.start_playback(now_ms);
            return;
        }

        session.attempts += 1;
        let attempts = session.attempts;
        if attempts >= self.config.max_ready_attempts {
            warn!(session = session.id, attempts, "media never became playable");
            session.phase = SyncPhase::NotReady { attempts };
            self.events.push(SyncEvent::ReadinessTimedOut {
                session: session.id,
                attempts,
            });
            return;
        }

        debug!(
            session = session.id,
            attempts,
            primary = ?session.primary.ready_state(),
            overlay = ?session.overlay.ready_state(),
            "media not ready, polling again"
        );
        session.phase = SyncPhase::WaitingForMedia { attempts };
        self.timers.schedule_after(
            now_ms,
            self.config.ready_poll_interval_ms,
            SyncTask::ReadinessCheck,
        );
    }

    fn start_playback(&mut self, now_ms: u64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        session.primary.seek(0.0);
        session.overlay.seek(0.0);

        // Both requests go out before either outcome is inspected.
        let outcomes = [
            (MediaSlot::Primary, session.primary.play()),
            (MediaSlot::Overlay, session.overlay.play()),
        ];

        let mut rejected = false;
        for (slot, outcome) in outcomes {
            if let Err(rejection) = outcome {
                warn!(session = session.id, %slot, reason = %rejection, "synchronised play failed");
                self.events.push(SyncEvent::PlaybackRejected {
                    session: session.id,
                    slot,
                    reason: rejection.reason,
                });
                rejected = true;
            }
        }

        if rejected {
            session.phase = SyncPhase::PlaybackRejected;
        } else {
            info!(session = session.id, "synchronised playback started");
            session.phase = SyncPhase::Playing;
            self.events.push(SyncEvent::PlaybackStarted {
                session: session.id,
            });
        }

        self.timers.schedule_after(
            now_ms,
            self.config.drift_check_interval_ms,
            SyncTask::DriftCheck,
        );
    }

    fn check_drift(&mut self, now_ms: u64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let primary_secs = session.primary.current_time();
        let overlay_secs = session.overlay.current_time();
        if let Some(target) =
            correct_drift(primary_secs, overlay_secs, self.config.drift_tolerance_secs)
        {
            debug!(
                session = session.id,
                primary_secs, overlay_secs, "realigning overlay with primary"
            );
            session.overlay.seek(target);
            self.events.push(SyncEvent::DriftCorrected {
                session: session.id,
                primary_secs,
                overlay_secs,
            });
        }

        self.timers.schedule_after(
            now_ms,
            self.config.drift_check_interval_ms,
            SyncTask::DriftCheck,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ClipProfile, SimulatedMedia};

    fn clip(url: &str, load_ms: u64) -> SimulatedMedia {
        SimulatedMedia::new(
            url,
            ClipProfile {
                load_ms,
                duration_secs: 30.0,
                ..ClipProfile::default()
            },
        )
    }

    fn controller() -> MediaSyncController<SimulatedMedia> {
        MediaSyncController::new(SyncConfig::default()).unwrap()
    }

    fn ready_pair() -> (SimulatedMedia, SimulatedMedia) {
        let primary = clip("raw", 0);
        let overlay = clip("pose", 0);
        (primary, overlay)
    }

    #[test]
    fn starts_immediately_when_both_are_ready() {
        let mut sync = controller();
        let (primary, overlay) = ready_pair();
        primary.nudge(3.0);

        sync.attach(primary.clone(), overlay.clone(), 0);

        assert_eq!(sync.phase(), SyncPhase::Playing);
        assert!(primary.is_playing() && overlay.is_playing());
        assert_eq!(primary.current_time(), 0.0);
        assert_eq!(sync.pending_timers(), 1);
        assert!(overlay.options().muted && overlay.options().looping);
        assert!(sync
            .drain_events()
            .contains(&SyncEvent::PlaybackStarted { session: 1 }));
    }

    #[test]
    fn polls_until_both_handles_can_play() {
        let mut sync = controller();
        let primary = clip("raw", 40);
        let overlay = clip("pose", 120);

        sync.attach(primary.clone(), overlay.clone(), 0);
        assert_eq!(sync.phase(), SyncPhase::WaitingForMedia { attempts: 1 });

        let mut now = 0;
        while sync.phase() != SyncPhase::Playing {
            now += 50;
            primary.step(50);
            overlay.step(50);
            sync.tick(now);
            assert!(sync.pending_timers() <= 1);
            assert!(now <= 500, "never started");
        }

        assert_eq!(now, 150);
        assert!(primary.is_playing());
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let config = SyncConfig {
            max_ready_attempts: 3,
            ..SyncConfig::default()
        };
        let mut sync = MediaSyncController::new(config).unwrap();
        let (primary, overlay) = (clip("raw", 10_000), clip("pose", 0));

        sync.attach(primary.clone(), overlay, 0);
        sync.tick(50);
        sync.tick(100);

        assert_eq!(sync.phase(), SyncPhase::NotReady { attempts: 3 });
        assert_eq!(sync.pending_timers(), 0);
        assert_eq!(sync.tick(10_000), 0);
        assert!(matches!(
            sync.readiness_error(),
            Some(PoseRevealError::NotReady { attempts: 3, .. })
        ));
        let timed_out = sync
            .drain_events()
            .into_iter()
            .find_map(|event| event.error())
            .unwrap();
        assert!(format!("{timed_out}").contains("3 readiness checks"));
        assert!(!primary.is_playing());
    }

    #[test]
    fn rejected_playback_is_reported_not_retried() {
        let mut sync = controller();
        let (primary, overlay) = ready_pair();
        primary.reject_playback("autoplay blocked");

        sync.attach(primary.clone(), overlay.clone(), 0);

        assert_eq!(sync.phase(), SyncPhase::PlaybackRejected);
        assert_eq!(overlay.play_requests(), 1);
        let events = sync.drain_events();
        let rejection = events
            .iter()
            .find(|event| matches!(event, SyncEvent::PlaybackRejected { .. }))
            .unwrap();
        assert!(matches!(
            rejection.error(),
            Some(PoseRevealError::PlaybackRejected {
                slot: MediaSlot::Primary,
                ..
            })
        ));

        sync.tick(5_000);
        assert_eq!(primary.play_requests(), 1);
        assert_eq!(sync.pending_timers(), 1);
    }

    #[test]
    fn drift_decision_respects_tolerance() {
        assert_eq!(correct_drift(1.0, 1.5, 0.1), Some(1.0));
        assert_eq!(correct_drift(1.5, 1.0, 0.1), Some(1.5));
        assert_eq!(correct_drift(1.0, 1.05, 0.1), None);
        assert_eq!(correct_drift(1.0, 1.25, 0.25), None);
    }

    #[test]
    fn drift_tick_realigns_overlay_to_primary() {
        let mut sync = controller();
        let (primary, overlay) = ready_pair();
        overlay.set_rate(1.2);
        sync.attach(primary.clone(), overlay.clone(), 0);
        sync.drain_events();

        primary.step(999);
        overlay.step(999);
        assert_eq!(sync.tick(999), 0);

        primary.step(1);
        overlay.step(1);
        assert_eq!(sync.tick(1_000), 1);
        assert_eq!(overlay.current_time(), primary.current_time());
        assert!(matches!(
            sync.drain_events().as_slice(),
            [SyncEvent::DriftCorrected { session: 1, .. }]
        ));
    }

    #[test]
    fn small_drift_is_left_alone() {
        let mut sync = controller();
        let (primary, overlay) = ready_pair();
        overlay.set_rate(1.05);
        sync.attach(primary.clone(), overlay.clone(), 0);

        primary.step(1_000);
        overlay.step(1_000);
        let before = overlay.current_time();
        sync.tick(1_000);

        assert_eq!(overlay.current_time(), before);
        assert_eq!(overlay.seek_count(), 1);
        assert_eq!(sync.pending_timers(), 1);
    }

    #[test]
    fn reattach_never_starts_the_stale_pair() {
        let mut sync = controller();
        let (stale_primary, stale_overlay) = (clip("old-raw", 100), clip("old-pose", 100));
        let (fresh_primary, fresh_overlay) = (clip("new-raw", 100), clip("new-pose", 100));

        sync.attach(stale_primary.clone(), stale_overlay.clone(), 0);
        let session = sync.attach(fresh_primary.clone(), fresh_overlay.clone(), 10);
        assert_eq!(session, 2);
        assert_eq!(sync.pending_timers(), 1);

        stale_primary.finish_loading();
        stale_overlay.finish_loading();
        sync.tick(60);
        assert_eq!(stale_primary.play_requests(), 0);
        assert_eq!(stale_overlay.play_requests(), 0);

        fresh_primary.finish_loading();
        fresh_overlay.finish_loading();
        sync.tick(110);
        assert_eq!(sync.phase(), SyncPhase::Playing);
        assert!(fresh_primary.is_playing());
        assert_eq!(stale_primary.play_requests(), 0);
    }

    #[test]
    fn detach_is_idempotent_and_stops_everything() {
        let mut sync = controller();
        let (primary, overlay) = ready_pair();
        sync.attach(primary.clone(), overlay.clone(), 0);
        assert!(sync.is_attached());

        assert!(sync.detach().is_some());
        assert!(!sync.is_attached());
        assert!(sync.detach().is_none());
        assert_eq!(sync.phase(), SyncPhase::Idle);
        assert_eq!(sync.pending_timers(), 0);
        assert!(!primary.is_playing() && !overlay.is_playing());

        let detached = sync
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, SyncEvent::Detached { .. }))
            .count();
        assert_eq!(detached, 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SyncConfig {
            drift_check_interval_ms: 0,
            ..SyncConfig::default()
        };
        let err = MediaSyncController::<SimulatedMedia>::new(config).unwrap_err();
        assert!(err.is_configuration());
    }
}
