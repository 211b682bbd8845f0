use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Speaker of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    User,
}

impl Role {
    /// `"user"` is the user; anything else, including no role, is the assistant
    pub fn from_provider(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("user") => Role::User,
            _ => Role::Assistant,
        }
    }
}

/// One reconciled utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,

    /// Trimmed, never empty
    pub text: String,

    /// When the utterance was finalized
    pub produced_at: DateTime<Utc>,
}

/// Append-only transcript that never holds two identical `(role, text)` pairs
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<TranscriptMessage>,
    seen: HashSet<(Role, String)>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalization candidate
    ///
    /// Returns the appended message, or `None` when the text is blank or the
    /// same `(role, text)` is already anywhere in the transcript.
    pub fn push(&mut self, role: Role, text: &str) -> Option<TranscriptMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if !self.seen.insert((role, text.to_string())) {
            debug!("Skipping duplicate {:?} message: {}", role, text);
            return None;
        }

        // Keep timestamps monotonic even if the wall clock steps back
        let now = Utc::now();
        let produced_at = match self.messages.last() {
            Some(last) if last.produced_at > now => last.produced_at,
            _ => now,
        };

        let message = TranscriptMessage {
            role,
            text: text.to_string(),
            produced_at,
        };
        self.messages.push(message.clone());

        Some(message)
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop everything; only used when a new call replaces the session
    pub fn clear(&mut self) {
        self.messages.clear();
        self.seen.clear();
    }
}
