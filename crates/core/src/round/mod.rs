//! Player roster and guess-driven round progression.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{config::RoundConfig, timeline::Scheduler, PoseRevealError, Result};

/// Ordered, non-empty list of player identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Roster {
    players: Vec<String>,
}

impl Roster {
    /// Validates that the roster is non-empty and has no blank entries.
    pub fn new(players: Vec<String>) -> Result<Self> {
        if players.is_empty() {
            return Err(PoseRevealError::config("roster must contain at least one player"));
        }
        if let Some(position) = players.iter().position(|player| player.trim().is_empty()) {
            return Err(PoseRevealError::config(format!(
                "roster entry {position} is blank"
            )));
        }
        Ok(Self { players })
    }

    /// Parses a comma separated list such as `Dame,MPJ,Kobe`.
    pub fn parse(list: &str) -> Result<Self> {
        let players = list
            .split(',')
            .map(str::trim)
            .filter(|player| !player.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(players)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Returns the player at `index`, if it exists.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.players.get(index).map(String::as_str)
    }

    /// Index following `index`, wrapping to the start.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.players.len()
    }

    pub fn players(&self) -> &[String] {
        &self.players
    }
}

impl TryFrom<Vec<String>> for Roster {
    type Error = PoseRevealError;

    fn try_from(players: Vec<String>) -> Result<Self> {
        Self::new(players)
    }
}

impl From<Roster> for Vec<String> {
    fn from(roster: Roster) -> Self {
        roster.players
    }
}

/// Guesses are compared after trimming and lowercasing.
pub fn normalize_guess(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Free-text input buffer for the current round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuessState {
    text: String,
}

impl GuessState {
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn normalized(&self) -> String {
        normalize_guess(&self.text)
    }

    pub fn matches(&self, player: &str) -> bool {
        self.normalized() == normalize_guess(player)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    AwaitingGuess,
    /// A correct guess was made; the advance fires after the configured delay.
    Transitioning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuessOutcome {
    Correct,
    Incorrect,
    /// Submitted while the previous correct guess is still being celebrated.
    Ignored,
}

/// Result of a fired round advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundAdvance {
    pub round: u32,
    pub index: usize,
    pub player: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AdvanceRound;

/// Tracks the active player and turns guesses into round advances.
#[derive(Debug)]
pub struct RoundController {
    roster: Roster,
    config: RoundConfig,
    index: usize,
    round: u32,
    guess: GuessState,
    phase: RoundPhase,
    timers: Scheduler<AdvanceRound>,
}

impl RoundController {
    /// Starts at the first player of the roster, in round 1.
    pub fn new(roster: Roster, config: RoundConfig) -> Self {
        Self {
            roster,
            config,
            index: 0,
            round: 1,
            guess: GuessState::default(),
            phase: RoundPhase::AwaitingGuess,
            timers: Scheduler::new(),
        }
    }

    /// Returns the players in turn order.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Returns the roster position of the active player.
    pub fn current_index(&self) -> usize {
        self.index
    }

    /// Returns the active player's identifier.
    pub fn current_player(&self) -> &str {
        // `index` is always reduced modulo the roster length, which is non-zero.
        &self.roster.players[self.index]
    }

    /// Returns the 1-based round counter.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// `Transitioning` between a correct guess and the advance.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Returns the current input buffer.
    pub fn guess(&self) -> &GuessState {
        &self.guess
    }

    /// Updates the input buffer without submitting it.
    pub fn set_guess_text(&mut self, text: impl Into<String>) {
        self.guess.set_text(text);
    }

    /// Starts the round at a given roster position.
    pub fn jump_to(&mut self, index: usize) {
        self.timers.cancel_all();
        self.index = index % self.roster.len();
        self.guess.clear();
        self.phase = RoundPhase::AwaitingGuess;
    }

    /// Stores and evaluates a guess. A correct one schedules the advance.
    pub fn submit_guess(&mut self, text: &str, now_ms: u64) -> GuessOutcome {
        if self.phase == RoundPhase::Transitioning {
            debug!(guess = text, "round already won, ignoring guess");
            return GuessOutcome::Ignored;
        }

        self.guess.set_text(text);
        if !self.guess.matches(self.current_player()) {
            debug!(guess = text, round = self.round, "incorrect guess");
            return GuessOutcome::Incorrect;
        }

        info!(player = self.current_player(), round = self.round, "correct guess");
        self.phase = RoundPhase::Transitioning;
        self.timers
            .schedule_after(now_ms, self.config.advance_delay_ms, AdvanceRound);
        GuessOutcome::Correct
    }

    /// Fires the pending advance once its delay has elapsed.
    pub fn tick(&mut self, now_ms: u64) -> Option<RoundAdvance> {
        self.timers.pop_due(now_ms)?;

        self.index = self.roster.next_index(self.index);
        self.round += 1;
        self.guess.clear();
        self.phase = RoundPhase::AwaitingGuess;

        let advance = RoundAdvance {
            round: self.round,
            index: self.index,
            player: self.current_player().to_string(),
        };
        info!(round = advance.round, player = %advance.player, "advancing to next player");
        Some(advance)
    }

    /// Drops a scheduled advance, e.g. on teardown.
    pub fn cancel_pending(&mut self) -> bool {
        let cancelled = self.timers.cancel_all() > 0;
        if cancelled {
            self.phase = RoundPhase::AwaitingGuess;
        }
        cancelled
    }
}
