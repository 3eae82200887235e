use crate::display::describe;
use crate::input::{parse_line, Command};
use log::{info, warn};
use shared::{write_message, CodecError, Message, MessageReader};
use std::collections::VecDeque;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// A connection to the game server.
pub struct Client {
    reader: MessageReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    backlog: VecDeque<Message>,
    name: Option<String>,
}

impl Client {
    /// Connects and sends the handshake. The resolved name arrives with the
    /// welcome message.
    pub async fn connect(server_addr: &str, name: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", server_addr);

        let (reader, writer) = stream.into_split();
        let mut client = Client {
            reader: MessageReader::new(reader),
            writer,
            backlog: VecDeque::new(),
            name: None,
        };
        client
            .send(&Message::SetName {
                name: name.to_string(),
            })
            .await?;

        Ok(client)
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), CodecError> {
        write_message(&mut self.writer, message).await
    }

    /// Waits for the next message from the server; `None` once it hangs up.
    pub async fn recv(&mut self) -> Result<Option<Message>, CodecError> {
        let message = self.reader.next_message(&mut self.backlog).await?;
        if let Some(Message::Welcome { resolved_name, .. }) = &message {
            self.name = Some(resolved_name.clone());
        }
        Ok(message)
    }

    /// Name assigned by the server, once welcomed.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Closes the sending side; the server sees a clean disconnect.
    pub async fn disconnect(mut self) -> Result<(), CodecError> {
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Relays `input` lines to the server and prints what comes back until
    /// either side finishes.
    pub async fn run<I>(&mut self, input: I) -> Result<(), Box<dyn std::error::Error>>
    where
        I: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line? {
                        Some(line) => line,
                        None => break,
                    };
                    match parse_line(&line) {
                        Command::Send(message) => self.send(&message).await?,
                        Command::Quit => break,
                        Command::Nothing(Some(hint)) => println!("{}", hint),
                        Command::Nothing(None) => {}
                    }
                }
                message = self.recv() => {
                    match message? {
                        Some(message) => {
                            if let Some(line) = describe(&message) {
                                println!("{}", line);
                            }
                        }
                        None => {
                            warn!("Server closed the connection");
                            return Ok(());
                        }
                    }
                }
            }
        }

        self.writer.shutdown().await?;
        Ok(())
    }
}
