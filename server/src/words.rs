//! Word bank the secret answers are drawn from.

use crate::ServerError;
use log::{info, warn};
use std::path::Path;

/// Used when no word file is configured or it yields no words.
pub const DEFAULT_WORDS: &[&str] = &["apple", "banana", "computer", "sun", "moon", "car", "house"];

/// Read-only list of candidate answers, loaded once at startup.
#[derive(Debug, Clone)]
pub struct WordBank {
    words: Vec<String>,
}

impl WordBank {
    /// Builds a bank from the given words, falling back to the defaults when
    /// nothing usable remains after trimming.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words: Vec<String> = words
            .into_iter()
            .map(|word| word.as_ref().trim().to_string())
            .filter(|word| !word.is_empty())
            .collect();

        if words.is_empty() {
            Self::default()
        } else {
            Self { words }
        }
    }

    /// Parses a word list with one word per line.
    pub fn from_text(text: &str) -> Self {
        Self::new(text.lines())
    }

    /// Reads a word list file, failing if it cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, ServerError> {
        let text = std::fs::read_to_string(path).map_err(|source| ServerError::WordList {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_text(&text))
    }

    /// Loads the configured list, using the defaults if it is absent or unreadable.
    pub fn load(path: Option<&Path>) -> Self {
        let bank = match path {
            Some(path) => Self::from_file(path).unwrap_or_else(|e| {
                warn!("{}; using built-in word list", e);
                Self::default()
            }),
            None => Self::default(),
        };
        info!("Word bank holds {} words", bank.len());
        bank
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for WordBank {
    fn default() -> Self {
        Self {
            words: DEFAULT_WORDS.iter().map(|word| word.to_string()).collect(),
        }
    }
}
