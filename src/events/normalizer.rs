// Event normalizer
//
// Maps provider notifications of varying shape onto canonical events.
// Notifications that carry nothing usable are discarded (`None`); that is
// expected noise from the provider, not an error.

use serde_json::Value;
use tracing::debug;

use super::canonical::{CanonicalEvent, ProviderEvent, ProviderNotification, TranscriptFragment};
use crate::session::Role;

/// Fields probed, in order, for a volume sample
const VOLUME_FIELDS: [&str; 3] = ["volume", "detail", "level"];

type Extraction = Option<(String, Role)>;

/// Transcript extraction strategies, highest priority first
const TRANSCRIPT_STRATEGIES: [fn(&Value) -> Extraction; 5] = [
    direct_transcript,
    nested_transcript,
    text_field,
    content_field,
    plain_string,
];

/// Convert one provider notification into a canonical event
pub fn normalize(notification: &ProviderNotification) -> Option<CanonicalEvent> {
    let payload = &notification.payload;

    let event = match notification.event {
        ProviderEvent::CallStart => Some(CanonicalEvent::CallStarted {
            call_id: call_field(payload, "id"),
        }),
        ProviderEvent::CallEnd => Some(CanonicalEvent::CallEnded {
            reason: call_field(payload, "endedReason"),
        }),
        ProviderEvent::SpeechStart => Some(CanonicalEvent::SpeechStarted),
        ProviderEvent::SpeechEnd => Some(CanonicalEvent::SpeechEnded),
        ProviderEvent::VolumeLevel => extract_volume(payload).map(CanonicalEvent::VolumeSample),
        ProviderEvent::Error => Some(extract_error(payload)),
        ProviderEvent::Message | ProviderEvent::Transcript => {
            extract_transcript(payload).map(CanonicalEvent::Transcript)
        }
    };

    if event.is_none() {
        debug!(
            "Discarding {} notification without usable content: {}",
            notification.event, payload
        );
    }

    event
}

/// Extract `(text, role, is_final)` from a transcript-bearing payload
pub fn extract_transcript(payload: &Value) -> Option<TranscriptFragment> {
    let (text, role) = TRANSCRIPT_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(payload))?;

    Some(TranscriptFragment {
        role,
        text,
        is_final: is_final(payload),
    })
}

/// Extract a volume level; non-numeric samples are discarded
pub fn extract_volume(payload: &Value) -> Option<f32> {
    let raw = match payload {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => {
            // The first field present decides, even if it is not numeric
            let field = VOLUME_FIELDS.iter().find_map(|key| map.get(*key))?;
            field.as_f64()
        }
        _ => None,
    }?;

    if !raw.is_finite() {
        return None;
    }

    Some((raw as f32).clamp(0.0, 1.0))
}

/// Extract an error message and optional code; never discarded
pub fn extract_error(payload: &Value) -> CanonicalEvent {
    let nested = payload.get("error");

    let message = trimmed(payload.get("message"))
        .or_else(|| trimmed(nested.and_then(|e| e.get("message"))))
        .or_else(|| trimmed(nested))
        .or_else(|| trimmed(Some(payload)))
        .unwrap_or_else(|| "Unknown error".to_string());

    let code = code_value(payload.get("code"))
        .or_else(|| code_value(nested.and_then(|e| e.get("code"))));

    CanonicalEvent::Error { message, code }
}

/// Partial iff `transcriptType` is present and is not "final"
fn is_final(payload: &Value) -> bool {
    match payload.get("transcriptType").and_then(Value::as_str) {
        Some(kind) => kind == "final",
        None => true,
    }
}

fn direct_transcript(payload: &Value) -> Extraction {
    let text = trimmed(payload.get("transcript"))?;
    Some((text, Role::from_provider(payload.get("role"))))
}

fn nested_transcript(payload: &Value) -> Extraction {
    let nested = payload.get("transcript")?;
    let text = trimmed(nested.get("text"))?;
    Some((text, Role::from_provider(nested.get("role"))))
}

fn text_field(payload: &Value) -> Extraction {
    let text = trimmed(payload.get("text"))?;
    Some((text, Role::from_provider(payload.get("role"))))
}

fn content_field(payload: &Value) -> Extraction {
    let text = trimmed(payload.get("content"))?;
    Some((text, Role::from_provider(payload.get("role"))))
}

fn plain_string(payload: &Value) -> Extraction {
    // A bare string has no role of its own
    let text = trimmed(Some(payload))?;
    Some((text, Role::Assistant))
}

/// Trimmed string value, `None` if absent, not a string, or blank
fn trimmed(value: Option<&Value>) -> Option<String> {
    let text = value?.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn code_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn call_field(payload: &Value, key: &str) -> Option<String> {
    trimmed(payload.get("call").and_then(|call| call.get(key)))
}
