//! Round coordination: the Idle/Active state machine on top of [`GameState`].
//!
//! The coordinator decides when a round starts, who draws, which word is
//! secret, and what a guess amounts to. It mutates the game state it is
//! handed and returns plain outcomes; delivering them is the lobby's job.

use crate::game::{ActiveRound, GameState};
use crate::words::WordBank;
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::ScoreTable;

/// A freshly started round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStart {
    pub round_id: u64,
    pub drawer: String,
    pub answer: String,
}

impl RoundStart {
    /// Public hint: the number of characters in the answer.
    pub fn hint(&self) -> usize {
        self.answer.chars().count()
    }
}

/// Result of a ready vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// A round is running; the vote was discarded.
    Ignored,
    /// Vote recorded, still waiting for others.
    Counted,
    /// Vote completed the ready set and a round began.
    Started(RoundStart),
}

/// Result of a guess message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    /// No round is running, or the drawer sent it. Relay as chat.
    Chat,
    Wrong,
    /// The round is over. Scores already include both awarded points.
    Correct { answer: String, scores: ScoreTable },
}

#[derive(Debug)]
pub struct RoundCoordinator<R = StdRng> {
    words: WordBank,
    rng: R,
}

impl RoundCoordinator<StdRng> {
    pub fn new(words: WordBank) -> Self {
        Self::with_rng(words, StdRng::from_entropy())
    }
}

impl<R: Rng> RoundCoordinator<R> {
    pub fn with_rng(words: WordBank, rng: R) -> Self {
        Self { words, rng }
    }

    pub fn words(&self) -> &WordBank {
        &self.words
    }

    /// Casts a ready vote and starts a round if it completes the set.
    pub fn on_ready(&mut self, game: &mut GameState, name: &str) -> ReadyOutcome {
        if !game.accepts_votes_from(name) {
            return ReadyOutcome::Ignored;
        }
        if !game.mark_ready(name) {
            return ReadyOutcome::Counted;
        }
        match self.start(game) {
            Some(start) => ReadyOutcome::Started(start),
            None => ReadyOutcome::Counted,
        }
    }

    /// Picks a drawer and an answer uniformly at random and starts the round.
    pub fn start(&mut self, game: &mut GameState) -> Option<RoundStart> {
        let players = game.player_names();
        let drawer = players.choose(&mut self.rng)?.clone();
        let answer = self.words.words().choose(&mut self.rng)?.clone();

        let round_id = game.start_round(drawer.clone(), answer.clone());
        info!("Round {}: {} is drawing", round_id, drawer);

        Some(RoundStart {
            round_id,
            drawer,
            answer,
        })
    }

    /// Judges a guess. A correct one awards points and ends the round.
    ///
    /// Matching is exact: case and whitespace both count.
    pub fn judge_guess(&self, game: &mut GameState, guesser: &str, text: &str) -> GuessOutcome {
        let answer = match game.current_round() {
            Some(round) if round.drawer != guesser => round.answer.clone(),
            _ => return GuessOutcome::Chat,
        };

        if text != answer {
            return GuessOutcome::Wrong;
        }

        let scores = game.award_points(guesser);
        game.end_round();
        info!("{} guessed the word", guesser);

        GuessOutcome::Correct { answer, scores }
    }

    /// Ends round `round_id` if it is still the one being played.
    pub fn expire(&self, game: &mut GameState, round_id: u64) -> Option<ActiveRound> {
        match game.current_round() {
            Some(round) if round.id == round_id => {
                info!("Round {} timed out", round_id);
                game.end_round()
            }
            _ => None,
        }
    }
}
