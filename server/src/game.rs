//! Authoritative room state: roster, scores, ready votes and the current round.
//!
//! `GameState` is plain data with atomic transition methods. It is never shared
//! directly; the [`Lobby`](crate::lobby::Lobby) owns the single instance behind
//! one mutex so each method below runs as one critical section.

use log::{debug, info};
use shared::{RosterEntry, ScoreTable};
use std::collections::{BTreeMap, BTreeSet};

/// A connected player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub score: u32,
}

impl Player {
    pub fn new(name: String) -> Self {
        Self { name, score: 0 }
    }
}

/// The round currently being played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRound {
    pub id: u64,
    pub drawer: String,
    pub answer: String,
}

/// Point-in-time view of the room for late joiners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterView {
    pub players: Vec<RosterEntry>,
    pub round_id: u64,
    pub in_game: bool,
    pub drawer: Option<String>,
}

#[derive(Debug, Default)]
pub struct GameState {
    players: BTreeMap<String, Player>,
    ready_votes: BTreeSet<String>,
    round: Option<ActiveRound>,
    round_id: u64,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a player under a unique name.
    ///
    /// Collisions are resolved by appending `(2)`, `(3)`, ... to the requested
    /// name until it is free. Returns the name actually assigned.
    pub fn register_player(&mut self, requested: &str) -> String {
        let mut name = requested.to_string();
        let mut suffix = 2;
        while self.players.contains_key(&name) {
            name = format!("{}({})", requested, suffix);
            suffix += 1;
        }

        info!("Added player {}", name);
        self.players.insert(name.clone(), Player::new(name.clone()));
        name
    }

    /// Removes a player and their ready vote.
    ///
    /// If the player was drawing, the round is aborted without awarding points.
    /// Returns true when that abort happened.
    pub fn remove_player(&mut self, name: &str) -> bool {
        if self.players.remove(name).is_none() {
            return false;
        }
        self.ready_votes.remove(name);
        info!("Removed player {}", name);

        let was_drawer = self.is_drawer(name);
        if was_drawer {
            info!("Drawer {} left, aborting round {}", name, self.round_id);
            self.end_round();
        }
        was_drawer
    }

    /// Records a ready vote. Votes cast during a round are ignored.
    ///
    /// Returns true when every connected player has voted and there are at
    /// least two of them.
    pub fn mark_ready(&mut self, name: &str) -> bool {
        if self.round.is_some() || !self.players.contains_key(name) {
            return false;
        }
        self.ready_votes.insert(name.to_string());
        self.all_ready()
    }

    /// True when a vote from `name` would currently be counted.
    pub fn accepts_votes_from(&self, name: &str) -> bool {
        self.round.is_none() && self.players.contains_key(name)
    }

    fn all_ready(&self) -> bool {
        let count = self.players.len();
        count >= 2 && self.ready_votes.len() == count
    }

    /// Starts a round and returns its id.
    pub fn start_round(&mut self, drawer: String, answer: String) -> u64 {
        debug_assert!(self.players.contains_key(&drawer));
        debug_assert!(!answer.is_empty());

        self.round_id += 1;
        self.ready_votes.clear();
        debug!("Round {} answer is {:?}", self.round_id, answer);
        self.round = Some(ActiveRound {
            id: self.round_id,
            drawer,
            answer,
        });
        self.round_id
    }

    /// Returns to idle, clearing the round and any ready votes.
    pub fn end_round(&mut self) -> Option<ActiveRound> {
        self.ready_votes.clear();
        self.round.take()
    }

    /// Gives one point each to `guesser` and the current drawer.
    ///
    /// Must run before [`end_round`](Self::end_round) so the drawer is known.
    pub fn award_points(&mut self, guesser: &str) -> ScoreTable {
        let drawer = self.round.as_ref().map(|round| round.drawer.clone());
        for name in std::iter::once(guesser.to_string()).chain(drawer) {
            if let Some(player) = self.players.get_mut(&name) {
                player.score += 1;
            }
        }
        self.scores()
    }

    pub fn scores(&self) -> ScoreTable {
        self.players
            .values()
            .map(|player| (player.name.clone(), player.score))
            .collect()
    }

    pub fn snapshot(&self) -> RosterView {
        RosterView {
            players: self
                .players
                .values()
                .map(|player| RosterEntry {
                    name: player.name.clone(),
                    score: player.score,
                    ready: self.ready_votes.contains(&player.name),
                })
                .collect(),
            round_id: self.round_id,
            in_game: self.round.is_some(),
            drawer: self.round.as_ref().map(|round| round.drawer.clone()),
        }
    }

    pub fn player_names(&self) -> Vec<String> {
        self.players.keys().cloned().collect()
    }

    pub fn current_round(&self) -> Option<&ActiveRound> {
        self.round.as_ref()
    }

    pub fn round_in_progress(&self) -> bool {
        self.round.is_some()
    }

    pub fn is_drawer(&self, name: &str) -> bool {
        self.round
            .as_ref()
            .map_or(false, |round| round.drawer == name)
    }

    pub fn round_id(&self) -> u64 {
        self.round_id
    }

    pub fn score_of(&self, name: &str) -> Option<u32> {
        self.players.get(name).map(|player| player.score)
    }

    pub fn ready_count(&self) -> usize {
        self.ready_votes.len()
    }

    /// Returns the number of currently connected players
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns true if no players are currently connected
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
