//! Newline-delimited JSON framing
//!
//! Outgoing messages are serialized to a single line of JSON followed by `\n`.
//! Incoming bytes are accumulated until a terminator is seen; each complete line
//! is parsed on its own and the trailing partial line is kept for the next read.
//! A line that fails to parse is logged and dropped so the rest of the stream
//! stays usable.

use crate::Message;
use log::warn;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Record terminator on the wire.
pub const TERMINATOR: u8 = b'\n';

/// Longest record accepted, not counting the terminator.
pub const MAX_RECORD_LEN: usize = 64 * 1024;

/// Size of a single socket read.
const READ_CHUNK: usize = 4096;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid json record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializes a message into one terminated record.
///
/// JSON string escaping guarantees the payload never contains a raw newline.
pub fn encode_message(message: &Message) -> Result<Vec<u8>, CodecError> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(TERMINATOR);
    Ok(bytes)
}

/// Decodes every complete record in `buffer`.
///
/// Returns the decoded messages and the unterminated remainder, which must be
/// prepended to the next read. Blank and malformed lines are skipped.
pub fn decode_stream(buffer: &[u8]) -> (Vec<Message>, &[u8]) {
    let mut messages = Vec::new();
    let mut start = 0;

    while let Some(offset) = buffer[start..].iter().position(|&b| b == TERMINATOR) {
        let segment = &buffer[start..start + offset];
        start += offset + 1;
        messages.extend(decode_record(segment));
    }

    (messages, &buffer[start..])
}

/// Parses one unterminated record, logging and dropping it if malformed.
fn decode_record(segment: &[u8]) -> Option<Message> {
    match parse_record(segment) {
        Ok(message) => message,
        Err(e) => {
            warn!("Dropping malformed record ({} bytes): {}", segment.len(), e);
            None
        }
    }
}

fn parse_record(segment: &[u8]) -> Result<Option<Message>, CodecError> {
    let text = std::str::from_utf8(segment)?.trim();
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

/// Growable receive buffer that carries partial records between reads.
///
/// Only newly arrived bytes are scanned for terminators. A record longer than
/// the buffer's limit is discarded and decoding resumes after its terminator.
#[derive(Debug)]
pub struct MessageBuffer {
    pending: Vec<u8>,
    max_record: usize,
    /// Inside an oversized record; skipping until the next terminator.
    discarding: bool,
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_RECORD_LEN)
    }
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer that drops records longer than `max_record` bytes.
    pub fn with_limit(max_record: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_record,
            discarding: false,
        }
    }

    /// Appends freshly read bytes and returns every message they complete.
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Message> {
        let mut messages = Vec::new();
        let mut rest = bytes;

        while let Some(offset) = rest.iter().position(|&b| b == TERMINATOR) {
            let tail = &rest[..offset];
            rest = &rest[offset + 1..];

            if self.discarding {
                self.discarding = false;
            } else if self.pending.len() + tail.len() > self.max_record {
                warn!(
                    "Dropping oversized record ({} bytes)",
                    self.pending.len() + tail.len()
                );
            } else if self.pending.is_empty() {
                messages.extend(decode_record(tail));
            } else {
                self.pending.extend_from_slice(tail);
                messages.extend(decode_record(&self.pending));
            }
            self.pending.clear();
        }

        if self.discarding {
            return messages;
        }
        if self.pending.len() + rest.len() > self.max_record {
            warn!(
                "Record exceeds {} bytes, skipping to the next terminator",
                self.max_record
            );
            self.pending.clear();
            self.discarding = true;
        } else {
            self.pending.extend_from_slice(rest);
        }

        messages
    }

    /// Bytes received but not yet terminated.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

/// Reads framed messages from any async byte stream.
pub struct MessageReader<R> {
    reader: R,
    buffer: MessageBuffer,
    chunk: Box<[u8]>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: MessageBuffer::new(),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
        }
    }

    /// Performs one read and returns the messages it completed.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream. A read that only
    /// delivers part of a record yields an empty batch.
    pub async fn read_batch(&mut self) -> Result<Option<Vec<Message>>, CodecError> {
        let len = self.reader.read(&mut self.chunk).await?;
        if len == 0 {
            if !self.buffer.pending().is_empty() {
                warn!(
                    "Stream closed with {} unterminated bytes",
                    self.buffer.pending().len()
                );
            }
            return Ok(None);
        }
        Ok(Some(self.buffer.extend(&self.chunk[..len])))
    }

    /// Waits for the next single message, buffering any extras for later.
    pub async fn next_message(
        &mut self,
        backlog: &mut std::collections::VecDeque<Message>,
    ) -> Result<Option<Message>, CodecError> {
        loop {
            if let Some(message) = backlog.pop_front() {
                return Ok(Some(message));
            }
            match self.read_batch().await? {
                Some(batch) => backlog.extend(batch),
                None => return Ok(None),
            }
        }
    }
}

/// Encodes `message` and writes the whole record to `writer`.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<(), CodecError> {
    let bytes = encode_message(message)?;
    writer.write_all(&bytes).await?;
    Ok(())
}
