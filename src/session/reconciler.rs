// Partial/final transcript reconciliation
//
// Providers emit a run of growing partial hypotheses and sometimes a final
// one. At most one partial is held at a time together with a single
// debounce deadline. A final supersedes the held partial; a partial that
// stays quiet for the debounce period is promoted on its own.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::transcript::Role;
use crate::events::TranscriptFragment;

/// In-flight partial transcript awaiting a final or the quiet period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFragment {
    pub role: Role,
    /// Latest superseding text of the utterance
    pub text: String,
    pub first_seen_at: Instant,
}

/// A `(role, text)` ready to be appended to the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub role: Role,
    pub text: String,
}

#[derive(Debug)]
pub struct FragmentReconciler {
    quiet_period: Duration,
    pending: Option<PendingFragment>,
    deadline: Option<Instant>,
}

impl FragmentReconciler {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: None,
            deadline: None,
        }
    }

    /// Feed one fragment; a final fragment yields its candidate immediately
    pub fn ingest(&mut self, fragment: TranscriptFragment, now: Instant) -> Option<Candidate> {
        // The deadline goes before the pending fragment is touched
        self.deadline = None;

        if fragment.is_final {
            if let Some(superseded) = self.pending.take() {
                debug!("Final transcript supersedes partial: {}", superseded.text);
            }
            return Some(Candidate {
                role: fragment.role,
                text: fragment.text,
            });
        }

        let first_seen_at = match &self.pending {
            Some(pending) if pending.role == fragment.role => pending.first_seen_at,
            _ => now,
        };

        self.pending = Some(PendingFragment {
            role: fragment.role,
            text: fragment.text,
            first_seen_at,
        });
        self.deadline = Some(now + self.quiet_period);

        None
    }

    /// When the outstanding debounce fires, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pending(&self) -> Option<&PendingFragment> {
        self.pending.as_ref()
    }

    /// Promote the pending fragment if its quiet period has elapsed
    pub fn expire(&mut self, now: Instant) -> Option<Candidate> {
        match self.deadline {
            Some(deadline) if deadline <= now => self.flush(),
            _ => None,
        }
    }

    /// Cancel the deadline and hand back whatever is pending
    pub fn flush(&mut self) -> Option<Candidate> {
        self.deadline = None;
        self.pending.take().map(|pending| Candidate {
            role: pending.role,
            text: pending.text,
        })
    }

    /// Cancel the deadline and drop whatever is pending
    pub fn discard(&mut self) {
        self.deadline = None;
        self.pending = None;
    }
}
