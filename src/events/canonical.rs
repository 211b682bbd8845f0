use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::session::Role;

/// Notification names exposed by the voice provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderEvent {
    CallStart,
    CallEnd,
    SpeechStart,
    SpeechEnd,
    VolumeLevel,
    Error,
    Message,
    Transcript,
}

impl ProviderEvent {
    /// Every notification the engine subscribes to when a call starts
    pub const ALL: [ProviderEvent; 8] = [
        ProviderEvent::CallStart,
        ProviderEvent::CallEnd,
        ProviderEvent::SpeechStart,
        ProviderEvent::SpeechEnd,
        ProviderEvent::VolumeLevel,
        ProviderEvent::Error,
        ProviderEvent::Message,
        ProviderEvent::Transcript,
    ];

    /// Wire name, e.g. `call-start`
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderEvent::CallStart => "call-start",
            ProviderEvent::CallEnd => "call-end",
            ProviderEvent::SpeechStart => "speech-start",
            ProviderEvent::SpeechEnd => "speech-end",
            ProviderEvent::VolumeLevel => "volume-level",
            ProviderEvent::Error => "error",
            ProviderEvent::Message => "message",
            ProviderEvent::Transcript => "transcript",
        }
    }
}

impl fmt::Display for ProviderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderEvent {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderEvent::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown provider event: {}", s))
    }
}

/// A raw notification as delivered by the provider, shape not controlled by us
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderNotification {
    pub event: ProviderEvent,
    pub payload: Value,
}

impl ProviderNotification {
    pub fn new(event: ProviderEvent, payload: Value) -> Self {
        Self { event, payload }
    }
}

/// Text extracted from a transcript-bearing notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFragment {
    pub role: Role,
    /// Trimmed, never empty
    pub text: String,
    pub is_final: bool,
}

/// Normalized, fixed-shape internal event
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalEvent {
    CallStarted {
        call_id: Option<String>,
    },
    CallEnded {
        reason: Option<String>,
    },
    SpeechStarted,
    SpeechEnded,
    Transcript(TranscriptFragment),
    VolumeSample(f32),
    Error {
        message: String,
        code: Option<String>,
    },
}
