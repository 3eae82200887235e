//! The single shared room every connection talks to.
//!
//! All game state, the connection registry and the round coordinator live
//! behind one mutex. Each public method is one critical section: it applies a
//! state transition and queues the resulting messages on the recipients'
//! outbound channels before releasing the lock, so every client observes
//! events in the same order the state changed. Queueing never blocks; the
//! socket writes happen in each connection's writer task, outside the lock.

use crate::client_manager::{ClientManager, Outbox};
use crate::game::{GameState, RosterView};
use crate::round::{GuessOutcome, ReadyOutcome, RoundCoordinator, RoundStart};
use crate::words::WordBank;
use log::{debug, info, warn};
use shared::{Message, StrokeData};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct Room {
    game: GameState,
    clients: ClientManager,
    coordinator: RoundCoordinator,
}

impl Room {
    /// Queues `message` for everyone except `exclude`.
    fn broadcast(&mut self, message: &Message, exclude: Option<&str>) {
        self.clients.broadcast(message, exclude);
    }

    fn send_to(&mut self, name: &str, message: Message) {
        self.clients.send_to(name, message);
    }

    fn announce_round(&mut self, start: &RoundStart) {
        self.broadcast(
            &Message::RoundStart {
                round_id: start.round_id,
                drawer: start.drawer.clone(),
                hint: start.hint(),
            },
            None,
        );
        self.send_to(
            &start.drawer,
            Message::AssignWord {
                word: start.answer.clone(),
            },
        );
    }
}

pub struct Lobby {
    room: Mutex<Room>,
    round_timeout: Option<Duration>,
}

impl Lobby {
    pub fn new(words: WordBank, max_players: usize, round_timeout: Option<Duration>) -> Self {
        Self::with_coordinator(RoundCoordinator::new(words), max_players, round_timeout)
    }

    pub fn with_coordinator(
        coordinator: RoundCoordinator,
        max_players: usize,
        round_timeout: Option<Duration>,
    ) -> Self {
        Self {
            room: Mutex::new(Room {
                game: GameState::new(),
                clients: ClientManager::new(max_players),
                coordinator,
            }),
            round_timeout,
        }
    }

    /// Completes a handshake.
    ///
    /// Registers the player, sends the welcome with a full roster to the new
    /// connection and announces the join to everyone else. Returns `None`
    /// when the room is full.
    pub async fn join(&self, requested: &str, addr: SocketAddr, outbox: Outbox) -> Option<String> {
        let mut room = self.room.lock().await;

        if room.clients.is_full() {
            warn!(
                "Rejecting {} from {}: room full ({} players)",
                requested,
                addr,
                room.clients.max_clients()
            );
            if let Err(e) = outbox.push(Message::system("Server full")) {
                debug!("Could not tell {} the room is full: {}", addr, e);
            }
            return None;
        }

        let name = room.game.register_player(requested);
        room.clients.add_client(name.clone(), addr, outbox);

        let view = room.game.snapshot();
        room.send_to(
            &name,
            Message::Welcome {
                resolved_name: name.clone(),
                roster: view.players,
                round_id: view.round_id,
                in_game: view.in_game,
                drawer: view.drawer,
            },
        );
        room.broadcast(&Message::PlayerJoin { name: name.clone() }, Some(&name));

        info!("{} joined ({} players)", name, room.game.len());
        Some(name)
    }

    /// Removes a player and announces the departure.
    ///
    /// A departing drawer aborts the round silently: no result is broadcast.
    pub async fn leave(&self, name: &str) {
        let mut room = self.room.lock().await;

        let aborted = room.game.remove_player(name);
        room.clients.remove_client(name);
        if aborted {
            debug!("Round aborted by drawer {} leaving", name);
        }
        room.broadcast(
            &Message::PlayerLeave {
                name: name.to_string(),
            },
            None,
        );

        info!("{} left ({} players)", name, room.game.len());
    }

    /// Records a ready vote, starting a round once everyone is ready.
    pub async fn ready(self: &Arc<Self>, name: &str) {
        let started = {
            let mut room = self.room.lock().await;
            let room = &mut *room;

            match room.coordinator.on_ready(&mut room.game, name) {
                ReadyOutcome::Ignored => {
                    debug!("Ignoring ready from {} during a round", name);
                    None
                }
                ReadyOutcome::Counted => {
                    room.broadcast(&Message::system(format!("{} is ready", name)), None);
                    None
                }
                ReadyOutcome::Started(start) => {
                    room.broadcast(&Message::system(format!("{} is ready", name)), None);
                    room.announce_round(&start);
                    Some(start.round_id)
                }
            }
        };

        if let (Some(round_id), Some(timeout)) = (started, self.round_timeout) {
            let lobby = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                lobby.expire_round(round_id).await;
            });
        }
    }

    /// Rebroadcasts chat to every player, attributed to the sender.
    pub async fn chat(&self, name: &str, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut room = self.room.lock().await;
        room.broadcast(&Message::chat_from(name, text), None);
    }

    /// Handles a guess.
    ///
    /// With no round running, or from the drawer, the guess is relayed as
    /// chat. Wrong guesses are announced publicly; a correct one ends the
    /// round with a result broadcast.
    pub async fn guess(&self, name: &str, text: &str) {
        let mut room = self.room.lock().await;
        let room = &mut *room;

        match room.coordinator.judge_guess(&mut room.game, name, text) {
            GuessOutcome::Chat => {
                debug!("Relaying guess from {} as chat", name);
                if !text.is_empty() {
                    room.broadcast(&Message::chat_from(name, text), None);
                }
            }
            GuessOutcome::Wrong => {
                room.broadcast(
                    &Message::system(format!("{} guessed: {} (wrong)", name, text)),
                    None,
                );
            }
            GuessOutcome::Correct { answer, scores } => {
                room.broadcast(
                    &Message::RoundResult {
                        winner: name.to_string(),
                        answer,
                        scores,
                    },
                    None,
                );
            }
        }
    }

    /// Relays a stroke to everyone else if `name` is the current drawer.
    ///
    /// Returns whether the stroke was relayed.
    pub async fn draw(&self, name: &str, stroke: StrokeData) -> bool {
        let mut room = self.room.lock().await;

        if !room.game.is_drawer(name) {
            debug!("Dropping stroke from non-drawer {}", name);
            return false;
        }
        room.broadcast(&Message::Draw { stroke }, Some(name));
        true
    }

    /// Ends round `round_id` if nobody has guessed it yet.
    pub async fn expire_round(&self, round_id: u64) {
        let mut room = self.room.lock().await;
        let room = &mut *room;

        if let Some(round) = room.coordinator.expire(&mut room.game, round_id) {
            room.broadcast(
                &Message::system(format!("Time's up! The word was {}", round.answer)),
                None,
            );
        }
    }

    pub async fn snapshot(&self) -> RosterView {
        self.room.lock().await.game.snapshot()
    }

    pub async fn player_count(&self) -> usize {
        self.room.lock().await.game.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::RosterEntry;
    use crate::client_manager::OUTBOX_CAPACITY;
    use tokio::sync::mpsc::Receiver;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn test_lobby(max_players: usize) -> Arc<Lobby> {
        let coordinator = RoundCoordinator::with_rng(
            WordBank::new(["giraffe"]),
            StdRng::seed_from_u64(17),
        );
        Arc::new(Lobby::with_coordinator(coordinator, max_players, None))
    }

    async fn join(lobby: &Lobby, name: &str) -> (String, Receiver<Message>) {
        let (outbox, rx, _) = Outbox::channel(OUTBOX_CAPACITY);
        let resolved = lobby.join(name, test_addr(), outbox).await.unwrap();
        (resolved, rx)
    }

    fn drain(rx: &mut Receiver<Message>) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Two players, both ready, round started. Returns (drawer rx, guesser rx, drawer, guesser).
    async fn started_round(
        lobby: &Arc<Lobby>,
    ) -> (
        Receiver<Message>,
        Receiver<Message>,
        String,
        String,
    ) {
        let (alice, mut alice_rx) = join(lobby, "Alice").await;
        let (bob, mut bob_rx) = join(lobby, "Bob").await;
        lobby.ready(&alice).await;
        lobby.ready(&bob).await;

        let drawer = lobby.snapshot().await.drawer.unwrap();
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        if drawer == alice {
            (alice_rx, bob_rx, alice, bob)
        } else {
            (bob_rx, alice_rx, bob, alice)
        }
    }

    #[tokio::test]
    async fn test_join_sends_welcome_then_notifies_others() {
        let lobby = test_lobby(8);
        let (_, mut ann_rx) = join(&lobby, "Ann").await;
        let (second, mut second_rx) = join(&lobby, "Ann").await;

        assert_eq!(second, "Ann(2)");

        let welcome = drain(&mut second_rx);
        assert_eq!(
            welcome,
            vec![Message::Welcome {
                resolved_name: "Ann(2)".to_string(),
                roster: vec![
                    RosterEntry {
                        name: "Ann".to_string(),
                        score: 0,
                        ready: false
                    },
                    RosterEntry {
                        name: "Ann(2)".to_string(),
                        score: 0,
                        ready: false
                    },
                ],
                round_id: 0,
                in_game: false,
                drawer: None,
            }]
        );

        let first = drain(&mut ann_rx);
        assert_eq!(
            first.last(),
            Some(&Message::PlayerJoin {
                name: "Ann(2)".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_full_room_rejects() {
        let lobby = test_lobby(1);
        let _first = join(&lobby, "Ann").await;

        let (outbox, mut rx, _) = Outbox::channel(OUTBOX_CAPACITY);
        assert!(lobby.join("Bob", test_addr(), outbox).await.is_none());
        assert_eq!(rx.try_recv().unwrap(), Message::system("Server full"));
        assert_eq!(lobby.player_count().await, 1);
    }

    #[tokio::test]
    async fn test_full_room_rejects_closed_connection_quietly() {
        let lobby = test_lobby(1);
        let _first = join(&lobby, "Ann").await;

        let (outbox, rx, _) = Outbox::channel(OUTBOX_CAPACITY);
        drop(rx);
        assert!(lobby.join("Bob", test_addr(), outbox).await.is_none());
        assert_eq!(lobby.player_count().await, 1);
    }

    #[tokio::test]
    async fn test_round_start_keeps_answer_private() {
        let lobby = test_lobby(8);
        let (alice, mut alice_rx) = join(&lobby, "Alice").await;
        let (bob, mut bob_rx) = join(&lobby, "Bob").await;

        lobby.ready(&alice).await;
        assert!(!lobby.snapshot().await.in_game);
        lobby.ready(&bob).await;

        let view = lobby.snapshot().await;
        assert!(view.in_game);
        assert_eq!(view.round_id, 1);
        let drawer = view.drawer.unwrap();

        let alice_msgs = drain(&mut alice_rx);
        let bob_msgs = drain(&mut bob_rx);
        let (drawer_msgs, guesser_msgs) = if drawer == alice {
            (alice_msgs, bob_msgs)
        } else {
            (bob_msgs, alice_msgs)
        };

        let round_start = Message::RoundStart {
            round_id: 1,
            drawer: drawer.clone(),
            hint: 7,
        };
        let secret = Message::AssignWord {
            word: "giraffe".to_string(),
        };

        assert!(drawer_msgs.contains(&round_start));
        assert!(drawer_msgs.contains(&secret));
        assert!(guesser_msgs.contains(&round_start));
        assert!(!guesser_msgs.contains(&secret));
        assert!(!guesser_msgs
            .iter()
            .any(|m| serde_json::to_string(m).unwrap().contains("giraffe")));
    }

    #[tokio::test]
    async fn test_ready_notice_broadcast() {
        let lobby = test_lobby(8);
        let (alice, mut alice_rx) = join(&lobby, "Alice").await;
        let (_, mut bob_rx) = join(&lobby, "Bob").await;
        drain(&mut alice_rx);

        lobby.ready(&alice).await;

        let expected = Message::system("Alice is ready");
        assert_eq!(drain(&mut alice_rx), vec![expected.clone()]);
        assert_eq!(drain(&mut bob_rx).last(), Some(&expected));
    }

    #[tokio::test]
    async fn test_draw_only_from_drawer() {
        let lobby = test_lobby(8);
        let (mut drawer_rx, mut guesser_rx, drawer, guesser) = started_round(&lobby).await;

        let mut stroke = StrokeData::new();
        stroke.insert("data".to_string(), serde_json::json!({"x": 1, "y": 2}));

        assert!(!lobby.draw(&guesser, stroke.clone()).await);
        assert!(drain(&mut drawer_rx).is_empty());
        assert!(drain(&mut guesser_rx).is_empty());

        assert!(lobby.draw(&drawer, stroke.clone()).await);
        assert_eq!(drain(&mut guesser_rx), vec![Message::Draw { stroke }]);
        assert!(drain(&mut drawer_rx).is_empty());
    }

    #[tokio::test]
    async fn test_draw_dropped_when_idle() {
        let lobby = test_lobby(8);
        let (alice, _alice_rx) = join(&lobby, "Alice").await;
        let (_, mut bob_rx) = join(&lobby, "Bob").await;

        assert!(!lobby.draw(&alice, StrokeData::new()).await);
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn test_correct_guess_broadcasts_result() {
        let lobby = test_lobby(8);
        let (mut drawer_rx, mut guesser_rx, drawer, guesser) = started_round(&lobby).await;

        lobby.guess(&guesser, "giraffe").await;

        let mut scores = shared::ScoreTable::new();
        scores.insert(drawer.clone(), 1);
        scores.insert(guesser.clone(), 1);
        let result = Message::RoundResult {
            winner: guesser.clone(),
            answer: "giraffe".to_string(),
            scores,
        };

        assert_eq!(drain(&mut drawer_rx), vec![result.clone()]);
        assert_eq!(drain(&mut guesser_rx), vec![result]);

        let view = lobby.snapshot().await;
        assert!(!view.in_game);
        assert!(view.players.iter().all(|entry| entry.score == 1));

        // Idle again: the same text is only chat now.
        lobby.guess(&guesser, "giraffe").await;
        assert_eq!(
            drain(&mut drawer_rx),
            vec![Message::chat_from(guesser.as_str(), "giraffe")]
        );
    }

    #[tokio::test]
    async fn test_wrong_guess_is_public() {
        let lobby = test_lobby(8);
        let (mut drawer_rx, _guesser_rx, _, guesser) = started_round(&lobby).await;

        lobby.guess(&guesser, "zebra").await;

        assert_eq!(
            drain(&mut drawer_rx),
            vec![Message::system(format!("{} guessed: zebra (wrong)", guesser))]
        );
        assert!(lobby.snapshot().await.in_game);
    }

    #[tokio::test]
    async fn test_drawer_guess_is_chat() {
        let lobby = test_lobby(8);
        let (_drawer_rx, mut guesser_rx, drawer, _) = started_round(&lobby).await;

        lobby.guess(&drawer, "giraffe").await;

        assert_eq!(
            drain(&mut guesser_rx),
            vec![Message::chat_from(drawer.as_str(), "giraffe")]
        );
        let view = lobby.snapshot().await;
        assert!(view.in_game);
        assert!(view.players.iter().all(|entry| entry.score == 0));
    }

    #[tokio::test]
    async fn test_drawer_leaving_aborts_without_result() {
        let lobby = test_lobby(8);
        let (_drawer_rx, mut guesser_rx, drawer, _) = started_round(&lobby).await;

        lobby.leave(&drawer).await;

        assert_eq!(
            drain(&mut guesser_rx),
            vec![Message::PlayerLeave {
                name: drawer.clone()
            }]
        );
        let view = lobby.snapshot().await;
        assert!(!view.in_game);
        assert_eq!(view.players.len(), 1);
        assert_eq!(view.players[0].score, 0);
    }

    #[tokio::test]
    async fn test_empty_chat_is_not_relayed() {
        let lobby = test_lobby(8);
        let (alice, mut alice_rx) = join(&lobby, "Alice").await;
        drain(&mut alice_rx);

        lobby.chat(&alice, "").await;
        assert!(drain(&mut alice_rx).is_empty());

        lobby.chat(&alice, "hello").await;
        assert_eq!(drain(&mut alice_rx), vec![Message::chat_from("Alice", "hello")]);
    }

    #[tokio::test]
    async fn test_closed_outbox_does_not_stop_broadcast() {
        let lobby = test_lobby(8);
        let (alice, alice_rx) = join(&lobby, "Alice").await;
        let (_, mut bob_rx) = join(&lobby, "Bob").await;
        drop(alice_rx);

        lobby.chat(&alice, "still here").await;
        assert_eq!(
            drain(&mut bob_rx),
            vec![Message::chat_from("Alice", "still here")]
        );
    }

    #[tokio::test]
    async fn test_stalled_reader_is_disconnected_not_buffered() {
        let lobby = test_lobby(8);
        let (alice_box, alice_rx, alice_hangup) = Outbox::channel(OUTBOX_CAPACITY);
        let (bob_box, bob_rx, bob_hangup) = Outbox::channel(OUTBOX_CAPACITY);
        lobby.join("Alice", test_addr(), alice_box).await.unwrap();
        lobby.join("Bob", test_addr(), bob_box).await.unwrap();
        lobby.ready("Alice").await;
        lobby.ready("Bob").await;

        let drawer = lobby.snapshot().await.drawer.unwrap();
        let (guesser, mut guesser_rx, guesser_hangup, mut drawer_rx) = if drawer == "Alice" {
            ("Bob", bob_rx, bob_hangup, alice_rx)
        } else {
            ("Alice", alice_rx, alice_hangup, bob_rx)
        };
        drain(&mut drawer_rx);

        // The guesser never reads while the drawer streams strokes.
        let mut stroke = StrokeData::new();
        stroke.insert("data".to_string(), serde_json::json!({"x": 1, "y": 2}));
        for _ in 0..(OUTBOX_CAPACITY * 4) {
            lobby.draw(&drawer, stroke.clone()).await;
        }

        assert!(drain(&mut guesser_rx).len() <= OUTBOX_CAPACITY);
        assert!(
            tokio::time::timeout(Duration::from_millis(100), guesser_hangup.notified())
                .await
                .is_ok()
        );

        // Nothing more is queued for the evicted player.
        lobby.chat(&drawer, "still there?").await;
        assert!(drain(&mut guesser_rx).is_empty());
        assert_eq!(
            drain(&mut drawer_rx),
            vec![Message::chat_from(drawer.as_str(), "still there?")]
        );

        // The player stays on the roster until the connection tears itself down.
        assert_eq!(lobby.player_count().await, 2);
        lobby.leave(guesser).await;
        assert_eq!(lobby.player_count().await, 1);
    }

    #[tokio::test]
    async fn test_expire_round_reveals_answer() {
        let lobby = test_lobby(8);
        let (mut drawer_rx, _guesser_rx, _, _) = started_round(&lobby).await;

        lobby.expire_round(99).await;
        assert!(lobby.snapshot().await.in_game);

        lobby.expire_round(1).await;
        assert!(!lobby.snapshot().await.in_game);
        assert_eq!(
            drain(&mut drawer_rx),
            vec![Message::system("Time's up! The word was giraffe")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_timeout_fires() {
        let coordinator = RoundCoordinator::with_rng(
            WordBank::new(["giraffe"]),
            StdRng::seed_from_u64(1),
        );
        let lobby = Arc::new(Lobby::with_coordinator(
            coordinator,
            8,
            Some(Duration::from_secs(60)),
        ));
        let (alice, _alice_rx) = join(&lobby, "Alice").await;
        let (bob, _bob_rx) = join(&lobby, "Bob").await;
        lobby.ready(&alice).await;
        lobby.ready(&bob).await;
        assert!(lobby.snapshot().await.in_game);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!lobby.snapshot().await.in_game);
    }
}
