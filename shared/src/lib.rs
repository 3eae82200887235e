//! Wire protocol shared by the draw-and-guess server and its clients.
//!
//! Every record on the wire is a single JSON object terminated by a newline.
//! The `type` field selects the variant of [`Message`]; the remaining fields
//! are the variant's payload in camelCase.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod codec;

pub use codec::{
    decode_stream, encode_message, write_message, CodecError, MessageBuffer, MessageReader,
};

/// Name given to players whose requested name is empty or whitespace.
pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 9000;

/// Opaque stroke-segment fields carried by a `draw` message.
pub type StrokeData = serde_json::Map<String, serde_json::Value>;

/// Score table broadcast at the end of a round, keyed by player name.
pub type ScoreTable = BTreeMap<String, u32>;

/// Every message that can travel between client and server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Message {
    /// Handshake request carrying the desired display name. A missing name
    /// reads as empty and resolves to the default.
    SetName {
        #[serde(default)]
        name: String,
    },
    /// Private state sync sent once the handshake completes.
    Welcome {
        resolved_name: String,
        roster: Vec<RosterEntry>,
        round_id: u64,
        in_game: bool,
        drawer: Option<String>,
    },
    PlayerJoin { name: String },
    PlayerLeave { name: String },
    /// Ready vote for the next round.
    Ready,
    /// Public round announcement. `hint` is the answer's character count.
    RoundStart {
        round_id: u64,
        drawer: String,
        hint: usize,
    },
    /// Private delivery of the secret word to the drawer.
    AssignWord { word: String },
    /// Stroke segment. The server relays the fields without interpreting them.
    Draw {
        #[serde(flatten)]
        stroke: StrokeData,
    },
    /// Unscored chat. `from` is filled in by the server on rebroadcast.
    Chat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        text: String,
    },
    Guess { text: String },
    RoundResult {
        winner: String,
        answer: String,
        scores: ScoreTable,
    },
    /// Informational notice from the server.
    System { text: String },
    /// Any record whose `type` is not part of the catalogue.
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Builds a server notice.
    pub fn system(text: impl Into<String>) -> Self {
        Message::System { text: text.into() }
    }

    /// Builds a chat message attributed to `from`.
    pub fn chat_from(from: impl Into<String>, text: impl Into<String>) -> Self {
        Message::Chat {
            from: Some(from.into()),
            text: text.into(),
        }
    }

    /// The `type` tag this message carries on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::SetName { .. } => "set-name",
            Message::Welcome { .. } => "welcome",
            Message::PlayerJoin { .. } => "player-join",
            Message::PlayerLeave { .. } => "player-leave",
            Message::Ready => "ready",
            Message::RoundStart { .. } => "round-start",
            Message::AssignWord { .. } => "assign-word",
            Message::Draw { .. } => "draw",
            Message::Chat { .. } => "chat",
            Message::Guess { .. } => "guess",
            Message::RoundResult { .. } => "round-result",
            Message::System { .. } => "system",
            Message::Unknown => "unknown",
        }
    }
}

/// One row of the roster as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub score: u32,
    pub ready: bool,
}
