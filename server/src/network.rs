//! Server network layer: TCP accept loop and per-connection handlers
//!
//! Every accepted socket gets its own task. The task splits the socket, hands
//! the write half to a writer task fed by a bounded queue, and drives the
//! read half through the handshake and the message loop. Whatever ends the
//! loop, the player is removed from the lobby exactly once.

use crate::client_manager::{Outbox, OUTBOX_CAPACITY};
use crate::config::ServerConfig;
use crate::lobby::Lobby;
use crate::words::WordBank;
use crate::ServerError;
use log::{debug, error, info, warn};
use shared::{write_message, Message, MessageReader, DEFAULT_PLAYER_NAME};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::timeout;

/// How long the accept loop waits before re-checking the running flag.
const ACCEPT_POLL: Duration = Duration::from_secs(1);

/// How long a closing connection may spend flushing queued messages.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// Listening endpoint plus the room it serves
pub struct Server {
    listener: TcpListener,
    lobby: Arc<Lobby>,
    running: Arc<AtomicBool>,
}

impl Server {
    /// Binds the listening socket and builds the lobby from `config`.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let words = WordBank::load(config.words.as_deref());
        let lobby = Arc::new(Lobby::new(
            words,
            config.max_players,
            config.round_timeout(),
        ));
        Self::with_lobby(&config.bind_addr(), lobby).await
    }

    pub async fn with_lobby(addr: &str, lobby: Arc<Lobby>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            lobby,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn lobby(&self) -> Arc<Lobby> {
        Arc::clone(&self.lobby)
    }

    /// Asks the accept loop to exit at its next poll.
    ///
    /// Open connections are left alone and end when their peers disconnect.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Accepts connections until [`stop`](Self::stop) is called.
    pub async fn run(&self) -> Result<(), ServerError> {
        info!("Waiting for connections");

        while self.is_running() {
            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Err(_) => continue,
                Ok(Ok((stream, addr))) => {
                    info!("New connection from {}", addr);
                    let lobby = Arc::clone(&self.lobby);
                    tokio::spawn(handle_connection(stream, addr, lobby));
                }
                Ok(Err(e)) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }

        info!("Server stopped accepting connections");
        Ok(())
    }
}

/// Serves one TCP connection until it closes.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, lobby: Arc<Lobby>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }
    let (reader, writer) = stream.into_split();
    serve_connection(reader, writer, addr, lobby).await;
}

/// Drives one connection over any byte stream pair.
pub async fn serve_connection<R, W>(reader: R, writer: W, addr: SocketAddr, lobby: Arc<Lobby>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbox, inbox, hangup) = Outbox::channel(OUTBOX_CAPACITY);
    let (stop_tx, stop_rx) = oneshot::channel();
    let mut writer_task = tokio::spawn(run_writer(writer, inbox, stop_tx, addr));

    let mut connection = Connection {
        addr,
        lobby,
        reader: MessageReader::new(reader),
        backlog: VecDeque::new(),
        stop: stop_rx,
        hangup,
        name: None,
    };

    if let Err(e) = connection.run(outbox).await {
        error!("Connection {} failed: {}", addr, e);
    }
    connection.close().await;

    // The queue closes once the lobby has dropped this client's sender.
    match timeout(WRITER_DRAIN, &mut writer_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Writer task for {} panicked: {}", addr, e),
        Err(_) => {
            warn!("Gave up flushing messages to {}", addr);
            writer_task.abort();
        }
    }
    info!("Connection {} closed", addr);
}

/// Writes queued messages to the socket in order.
///
/// On a write failure it signals the reader through `stop` so the connection
/// tears itself down.
async fn run_writer<W>(
    mut writer: W,
    mut inbox: mpsc::Receiver<Message>,
    stop: oneshot::Sender<()>,
    addr: SocketAddr,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = inbox.recv().await {
        if let Err(e) = write_message(&mut writer, &message).await {
            warn!("Failed to send {} to {}: {}", message.kind(), addr, e);
            let _ = stop.send(());
            return;
        }
    }
    let _ = writer.shutdown().await;
}

struct Connection<R> {
    addr: SocketAddr,
    lobby: Arc<Lobby>,
    reader: MessageReader<R>,
    backlog: VecDeque<Message>,
    stop: oneshot::Receiver<()>,
    /// Fired by the lobby when this client fell too far behind.
    hangup: Arc<Notify>,
    /// Set once the handshake succeeds; taken again on close.
    name: Option<String>,
}

impl<R: AsyncRead + Unpin> Connection<R> {
    async fn run(&mut self, outbox: Outbox) -> Result<(), ServerError> {
        let name = match self.handshake(outbox).await? {
            Some(name) => name,
            None => return Ok(()),
        };
        self.name = Some(name.clone());

        while let Some(message) = self.next_message().await? {
            self.dispatch(&name, message).await;
        }
        Ok(())
    }

    /// Next decoded message, or `None` when the peer closed or the writer
    /// asked to stop.
    async fn next_message(&mut self) -> Result<Option<Message>, ServerError> {
        tokio::select! {
            result = self.reader.next_message(&mut self.backlog) => Ok(result?),
            _ = &mut self.stop => {
                debug!("Stopping reader for {}", self.addr);
                Ok(None)
            }
            _ = self.hangup.notified() => {
                info!("Disconnecting {}: not keeping up with updates", self.addr);
                Ok(None)
            }
        }
    }

    /// Waits for `set-name`, ignoring everything else.
    async fn handshake(&mut self, outbox: Outbox) -> Result<Option<String>, ServerError> {
        while let Some(message) = self.next_message().await? {
            match message {
                Message::SetName { name } => {
                    let requested = if name.trim().is_empty() {
                        DEFAULT_PLAYER_NAME
                    } else {
                        name.as_str()
                    };
                    return Ok(self.lobby.join(requested, self.addr, outbox).await);
                }
                other => debug!(
                    "Ignoring {} from {} before handshake",
                    other.kind(),
                    self.addr
                ),
            }
        }
        Ok(None)
    }

    async fn dispatch(&self, name: &str, message: Message) {
        match message {
            Message::Ready => self.lobby.ready(name).await,
            Message::Chat { text, .. } => self.lobby.chat(name, &text).await,
            Message::Guess { text } => self.lobby.guess(name, &text).await,
            Message::Draw { stroke } => {
                self.lobby.draw(name, stroke).await;
            }
            Message::SetName { .. } => debug!("{} is already registered", name),
            other @ (Message::Welcome { .. }
            | Message::PlayerJoin { .. }
            | Message::PlayerLeave { .. }
            | Message::RoundStart { .. }
            | Message::AssignWord { .. }
            | Message::RoundResult { .. }
            | Message::System { .. }
            | Message::Unknown) => {
                debug!("Ignoring {} from {}", other.kind(), name);
            }
        }
    }

    /// Removes the player if the handshake got that far.
    async fn close(&mut self) {
        if let Some(name) = self.name.take() {
            self.lobby.leave(&name).await;
        }
    }
}
