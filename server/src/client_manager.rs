//! Connection registry for the draw-and-guess server
//!
//! Maps each registered player name to the outbound queue of its connection.
//! The lobby queues messages on these channels while holding its lock, which
//! fixes one delivery order for everyone. Queuing never blocks; each channel is
//! drained onto the socket by that connection's writer task.
//!
//! Queues are bounded. A client that falls so far behind that its queue fills
//! up is evicted from the registry and its connection is told to hang up.

use log::{info, warn};
use shared::Message;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

/// Messages a connection may have waiting before it is considered stalled.
pub const OUTBOX_CAPACITY: usize = 1024;

/// The lobby's handle on one connection: its outbound queue and a hang-up
/// signal the connection's reader listens for.
#[derive(Debug, Clone)]
pub struct Outbox {
    queue: mpsc::Sender<Message>,
    hangup: Arc<Notify>,
}

impl Outbox {
    /// Creates a connection's outbound queue.
    ///
    /// The receiver feeds the socket writer; the `Notify` fires when the
    /// lobby wants the connection closed.
    pub fn channel(capacity: usize) -> (Outbox, mpsc::Receiver<Message>, Arc<Notify>) {
        let (queue, inbox) = mpsc::channel(capacity);
        let hangup = Arc::new(Notify::new());
        let outbox = Outbox {
            queue,
            hangup: Arc::clone(&hangup),
        };
        (outbox, inbox, hangup)
    }

    /// Queues a message without waiting.
    pub fn push(&self, message: Message) -> Result<(), TrySendError<Message>> {
        self.queue.try_send(message)
    }

    /// Asks the connection to close. Remembered if nobody is listening yet.
    pub fn hang_up(&self) {
        self.hangup.notify_one();
    }
}

/// A connected, named client
#[derive(Debug)]
pub struct Client {
    /// Resolved player name, unique across the room
    pub name: String,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// When the handshake completed
    pub joined_at: Instant,
    /// Queue feeding this client's socket writer
    pub outbox: Outbox,
}

impl Client {
    pub fn new(name: String, addr: SocketAddr, outbox: Outbox) -> Self {
        Self {
            name,
            addr,
            joined_at: Instant::now(),
            outbox,
        }
    }

    /// Queues a message for this client.
    pub fn send(&self, message: Message) -> Result<(), TrySendError<Message>> {
        self.outbox.push(message)
    }
}

/// Manages all connected clients
///
/// Enforces the server's capacity and routes messages to outbound queues.
pub struct ClientManager {
    /// Connected clients indexed by player name
    clients: HashMap<String, Client>,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Registers a client under its resolved name.
    pub fn add_client(&mut self, name: String, addr: SocketAddr, outbox: Outbox) {
        info!("Client {} connected from {}", name, addr);
        self.clients
            .insert(name.clone(), Client::new(name, addr, outbox));
    }

    /// Removes a client. Returns true if it was registered.
    pub fn remove_client(&mut self, name: &str) -> bool {
        if let Some(client) = self.clients.remove(name) {
            info!(
                "Client {} disconnected after {:.1}s",
                client.name,
                client.joined_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    /// Queues `message` for one client. Returns whether it was queued.
    ///
    /// A client whose queue is full is evicted and asked to hang up.
    pub fn send_to(&mut self, name: &str, message: Message) -> bool {
        let kind = message.kind();
        let result = match self.clients.get(name) {
            Some(client) => client.send(message),
            None => {
                warn!("Could not deliver {} to {}: not connected", kind, name);
                return false;
            }
        };

        match result {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Outbound queue for {} is full ({} messages), disconnecting",
                    name, OUTBOX_CAPACITY
                );
                self.evict(name);
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Dropping {} for {}: connection closing", kind, name);
                false
            }
        }
    }

    /// Queues `message` for every client except `exclude`.
    pub fn broadcast(&mut self, message: &Message, exclude: Option<&str>) {
        let names: Vec<String> = self
            .clients
            .keys()
            .filter(|name| Some(name.as_str()) != exclude)
            .cloned()
            .collect();
        for name in names {
            self.send_to(&name, message.clone());
        }
    }

    /// Drops a client's queue and tells its connection to close.
    ///
    /// The player stays in the game until the connection's own teardown
    /// removes it, so the name cannot be handed out twice.
    fn evict(&mut self, name: &str) {
        if let Some(client) = self.clients.remove(name) {
            client.outbox.hang_up();
        }
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.max_clients
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }
}
