//! The guessing variant: a reveal widget cycling through a roster.

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::{
    config::AppConfig,
    media::MediaProvider,
    player::{PlayerView, PoseRevealPlayer},
    round::{GuessOutcome, Roster, RoundAdvance, RoundController, RoundPhase},
    sync::SyncEvent,
    Result,
};

/// Feedback the host renders in response to guesses and round changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notification", rename_all = "snake_case")]
pub enum GameNotification {
    GuessAccepted { round: u32, player: String },
    GuessRejected { round: u32, guess: String },
    RoundAdvanced { round: u32, index: usize, player: String },
}

/// Host-facing snapshot. The active player's name is left out on purpose;
/// it is the answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameView {
    pub round: u32,
    pub roster_len: usize,
    pub phase: RoundPhase,
    pub guess: String,
    pub player: PlayerView,
}

/// Guessing variant: a [`PoseRevealPlayer`] driven by a [`RoundController`].
pub struct GuessingGame<P: MediaProvider> {
    rounds: RoundController,
    widget: PoseRevealPlayer<P>,
    clip_number: u32,
    notifications: Vec<GameNotification>,
    torn_down: bool,
}

impl<P: MediaProvider> GuessingGame<P> {
    /// Validates the configuration and roster, then loads the first player.
    pub fn new(config: &AppConfig, roster: Roster, provider: P, now_ms: u64) -> Result<Self> {
        let mut widget = PoseRevealPlayer::new(config, provider)?;
        let rounds = RoundController::new(roster, config.round.clone());
        let clip_number = config.assets.clip_number;
        widget.load(rounds.current_player(), clip_number, now_ms)?;

        info!(players = rounds.roster().len(), "guessing game ready");
        Ok(Self {
            rounds,
            widget,
            clip_number,
            notifications: Vec::new(),
            torn_down: false,
        })
    }

    /// Builds the game from the roster listed in the configuration.
    pub fn from_config(config: &AppConfig, provider: P, now_ms: u64) -> Result<Self> {
        config.validate_roster()?;
        let roster = Roster::new(config.roster.clone())?;
        Self::new(config, roster, provider, now_ms)
    }

    /// Submits a guess for the active player. Always `Ignored` after teardown.
    pub fn submit_guess(&mut self, text: &str, now_ms: u64) -> GuessOutcome {
        if self.torn_down {
            return GuessOutcome::Ignored;
        }
        let round = self.rounds.round();
        let outcome = self.rounds.submit_guess(text, now_ms);
        match outcome {
            GuessOutcome::Correct => self.notifications.push(GameNotification::GuessAccepted {
                round,
                player: self.rounds.current_player().to_string(),
            }),
            GuessOutcome::Incorrect => self.notifications.push(GameNotification::GuessRejected {
                round,
                guess: text.to_string(),
            }),
            GuessOutcome::Ignored => {}
        }
        outcome
    }

    /// Runs the round timer, then the sync timers. A round advance clears
    /// the reveal before the next player's clips are requested.
    pub fn tick(&mut self, now_ms: u64) -> Result<Option<RoundAdvance>> {
        if self.torn_down {
            return Ok(None);
        }
        let advance = self.rounds.tick(now_ms);
        if let Some(advance) = &advance {
            self.widget.reset_reveal();
            self.widget.load(&advance.player, self.clip_number, now_ms)?;
            self.notifications.push(GameNotification::RoundAdvanced {
                round: advance.round,
                index: advance.index,
                player: advance.player.clone(),
            });
        }
        self.widget.tick(now_ms);
        Ok(advance)
    }

    pub fn set_guess_text(&mut self, text: impl Into<String>) {
        self.rounds.set_guess_text(text);
    }

    pub fn reveal_more(&mut self) -> u32 {
        self.widget.reveal_more()
    }

    pub fn reveal_less(&mut self) -> u32 {
        self.widget.reveal_less()
    }

    pub fn rounds(&self) -> &RoundController {
        &self.rounds
    }

    pub fn widget(&self) -> &PoseRevealPlayer<P> {
        &self.widget
    }

    /// Takes every notification emitted since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<GameNotification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn drain_sync_events(&mut self) -> Vec<SyncEvent> {
        self.widget.drain_sync_events()
    }

    /// Snapshot for rendering; never includes the answer.
    pub fn view(&self) -> GameView {
        GameView {
            round: self.rounds.round(),
            roster_len: self.rounds.roster().len(),
            phase: self.rounds.phase(),
            guess: self.rounds.guess().text().to_string(),
            player: self.widget.view(),
        }
    }

    /// Stops playback and cancels every timer. The game stays inert
    /// afterwards: guesses are ignored and ticks do nothing.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.rounds.cancel_pending();
        self.widget.teardown();
        info!("guessing game torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl<P: MediaProvider> fmt::Debug for GuessingGame<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuessingGame")
            .field("rounds", &self.rounds)
            .field("widget", &self.widget)
            .field("notifications", &self.notifications.len())
            .finish()
    }
}
