// Call session state machine
//
// Pure, synchronous core of the call engine. It owns the call status,
// the transcript and the fragment reconciler, and queues observer
// notifications that the engine drains after every step.
//
//   idle --start--> connecting --CallStarted--> active --CallEnded--> ended
//   ended --start--> connecting

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::reconciler::{Candidate, FragmentReconciler};
use super::state::{CallSnapshot, CallStatus};
use super::stats::SessionStats;
use super::transcript::{Transcript, TranscriptMessage};
use crate::error::{CallError, CallResult};
use crate::events::CanonicalEvent;

/// Notification delivered to observers of a call engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EngineEvent {
    StatusChanged(CallSnapshot),
    TranscriptAppended(TranscriptMessage),
    SpeechStarted,
    SpeechEnded,
}

#[derive(Debug)]
pub struct CallMachine {
    snapshot: CallSnapshot,
    stats: SessionStats,
    transcript: Transcript,
    reconciler: FragmentReconciler,
    finalize_pending_on_end: bool,

    /// Last snapshot handed to observers
    published: CallSnapshot,
    outbox: Vec<EngineEvent>,
}

impl CallMachine {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            snapshot: CallSnapshot::default(),
            stats: SessionStats::default(),
            transcript: Transcript::new(),
            reconciler: FragmentReconciler::new(config.debounce),
            finalize_pending_on_end: config.finalize_pending_on_end,
            published: CallSnapshot::default(),
            outbox: Vec::new(),
        }
    }

    pub fn status(&self) -> CallStatus {
        self.snapshot.status
    }

    pub fn snapshot(&self) -> CallSnapshot {
        self.snapshot.clone()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            status: self.snapshot.status,
            transcript_messages: self.transcript.len(),
            ..self.stats.clone()
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.stats.session_id.as_deref()
    }

    /// Deadline of the outstanding debounce, if a partial is pending
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.reconciler.deadline()
    }

    /// Start requested: idle/ended -> connecting with a fresh session
    pub fn begin(&mut self, assistant_id: &str) -> CallResult<String> {
        if !self.snapshot.status.can_start() {
            return Err(CallError::CallInProgress);
        }

        let session_id = format!("call-{}", uuid::Uuid::new_v4());

        self.reconciler.discard();
        self.transcript.clear();
        self.stats = SessionStats {
            session_id: Some(session_id.clone()),
            assistant_id: Some(assistant_id.to_string()),
            requested_at: Some(Utc::now()),
            ..SessionStats::default()
        };
        self.snapshot = CallSnapshot {
            status: CallStatus::Connecting,
            ..CallSnapshot::default()
        };

        info!("Call {} connecting (assistant {})", session_id, assistant_id);
        self.publish_status();

        Ok(session_id)
    }

    /// The provider refused to start: back to idle with the failure recorded
    pub fn abort_start(&mut self, message: String) {
        self.reconciler.discard();
        self.snapshot.status = CallStatus::Idle;
        self.snapshot.is_connected = false;
        self.snapshot.last_error = Some(message);
        self.publish_status();
    }

    /// Apply one canonical event
    pub fn apply(&mut self, event: CanonicalEvent, now: Instant) {
        match event {
            CanonicalEvent::CallStarted { call_id } => {
                if self.snapshot.status != CallStatus::Connecting {
                    debug!("Ignoring call start while {}", self.snapshot.status);
                    return;
                }
                self.snapshot.status = CallStatus::Active;
                self.snapshot.is_connected = true;
                self.stats.connected_at = Some(Utc::now());
                self.stats.provider_call_id = call_id;
                info!("Call {} active", self.stats.session_id.as_deref().unwrap_or("-"));
                self.publish_status();
            }
            CanonicalEvent::CallEnded { reason } => {
                if !self.snapshot.status.in_call() {
                    debug!("Ignoring call end while {}", self.snapshot.status);
                    return;
                }
                self.settle_pending();
                self.mark_ended(reason);
            }
            CanonicalEvent::SpeechStarted => self.outbox.push(EngineEvent::SpeechStarted),
            CanonicalEvent::SpeechEnded => self.outbox.push(EngineEvent::SpeechEnded),
            CanonicalEvent::Transcript(fragment) => {
                if let Some(candidate) = self.reconciler.ingest(fragment, now) {
                    self.append(candidate);
                }
            }
            CanonicalEvent::VolumeSample(level) => {
                self.snapshot.volume_level = level;
                self.publish_status();
            }
            CanonicalEvent::Error { message, code } => {
                warn!("Provider error: {} (code: {:?})", message, code);
                self.record_error(message);
            }
        }
    }

    /// Promote the pending partial if its quiet period is over
    pub fn expire_pending(&mut self, now: Instant) {
        if let Some(candidate) = self.reconciler.expire(now) {
            debug!("Promoting partial after quiet period: {}", candidate.text);
            self.append(candidate);
        }
    }

    /// Cancel the debounce and finalize or drop the pending partial
    pub fn settle_pending(&mut self) {
        if self.finalize_pending_on_end {
            if let Some(candidate) = self.reconciler.flush() {
                self.append(candidate);
            }
        } else {
            self.reconciler.discard();
        }
    }

    /// connecting/active -> ended; no-op otherwise
    pub fn mark_ended(&mut self, reason: Option<String>) {
        if !self.snapshot.status.in_call() {
            return;
        }

        self.snapshot.status = CallStatus::Ended;
        self.snapshot.is_connected = false;
        self.stats.ended_at = Some(Utc::now());
        self.stats.ended_reason = reason;

        info!(
            "Call {} ended after {}s with {} transcript messages",
            self.stats.session_id.as_deref().unwrap_or("-"),
            self.stats.duration_secs,
            self.transcript.len()
        );
        self.publish_status();
    }

    /// One duration tick; counted only while active
    pub fn tick(&mut self) {
        if self.snapshot.status == CallStatus::Active {
            self.stats.duration_secs += 1;
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.snapshot.is_muted = muted;
        self.publish_status();
    }

    pub fn record_error(&mut self, message: String) {
        self.snapshot.last_error = Some(message);
        self.publish_status();
    }

    pub fn clear_error(&mut self) {
        self.snapshot.last_error = None;
        self.publish_status();
    }

    /// Back to the initial idle state, dropping the transcript
    pub fn reset(&mut self) {
        self.reconciler.discard();
        self.transcript.clear();
        self.stats = SessionStats::default();
        self.snapshot = CallSnapshot::default();
        self.publish_status();
    }

    /// Take the notifications queued since the last drain
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.outbox)
    }

    fn append(&mut self, candidate: Candidate) {
        if let Some(message) = self.transcript.push(candidate.role, &candidate.text) {
            info!("Transcript {:?}: {}", message.role, message.text);
            self.outbox.push(EngineEvent::TranscriptAppended(message));
        }
    }

    fn publish_status(&mut self) {
        if self.snapshot != self.published {
            self.published = self.snapshot.clone();
            self.outbox
                .push(EngineEvent::StatusChanged(self.snapshot.clone()));
        }
    }
}
