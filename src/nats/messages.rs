use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subject prefix of provider notifications, e.g. `voice.event.call-start`
pub const EVENT_SUBJECT_PREFIX: &str = "voice.event.";

/// Subject that call commands are published to
pub const COMMAND_SUBJECT: &str = "voice.command";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Start,
    Stop,
    Mute,
}

/// Call command published to the voice gateway
#[derive(Debug, Serialize, Deserialize)]
pub struct CallCommandMessage {
    pub client_id: String,
    pub command: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    pub timestamp: String, // RFC3339 timestamp
}

/// Event name carried in a notification subject
pub fn event_name_from_subject(subject: &str) -> Option<&str> {
    subject
        .strip_prefix(EVENT_SUBJECT_PREFIX)
        .filter(|name| !name.is_empty())
}

/// Notification payload: JSON when it parses, otherwise a plain string
pub fn decode_event_payload(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }

    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
