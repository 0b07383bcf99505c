//! Core library for the Pose Reveal guessing widget.
//!
//! Two clips of the same play, the raw footage and a pose-overlay rendering,
//! are kept in lockstep while the overlay is exposed from the bottom up one
//! step at a time. The guessing variant cycles through a roster of players
//! and moves on whenever the active player is named.
//!
//! Everything is driven by a host-owned millisecond clock: the host calls
//! `tick(now_ms)` and the core fires whichever readiness polls, drift checks
//! or round advances have come due.

pub mod assets;
pub mod config;
pub mod error;
pub mod game;
pub mod media;
pub mod player;
pub mod reveal;
pub mod round;
pub mod sync;
pub mod timeline;

pub use assets::{AssetCategory, AssetResolver, ClipSources};
pub use config::{AppConfig, AssetConfig, RevealConfig, RoundConfig, SyncConfig};
pub use error::{PoseRevealError, Result};
pub use game::{GameNotification, GameView, GuessingGame};
pub use media::{
    ClipProfile, MediaHandle, MediaProvider, MediaSlot, PlaybackOptions, PlaybackRejection,
    ReadyState, SimulatedMedia, SimulatedProvider,
};
pub use player::{PlayerView, PoseRevealPlayer};
pub use reveal::{compute_mask, MaskSpec, RevealState};
pub use round::{
    normalize_guess, GuessOutcome, GuessState, Roster, RoundAdvance, RoundController, RoundPhase,
};
pub use sync::{correct_drift, MediaSyncController, SyncEvent, SyncPhase};
pub use timeline::{HostClock, Scheduler, TimerId};
