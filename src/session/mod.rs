//! Call session management
//!
//! This module provides the `CallEngine` that owns a call session:
//! - Call lifecycle state machine (idle, connecting, active, ended)
//! - Partial/final transcript reconciliation with a debounce period
//! - Duplicate suppression on the finalized transcript
//! - Call status snapshot, duration counter and session statistics

mod config;
mod engine;
mod machine;
mod reconciler;
mod state;
mod stats;
mod transcript;

pub use config::SessionConfig;
pub use engine::CallEngine;
pub use machine::{CallMachine, EngineEvent};
pub use reconciler::{Candidate, FragmentReconciler, PendingFragment};
pub use state::{CallSnapshot, CallStatus};
pub use stats::SessionStats;
pub use transcript::{Role, Transcript, TranscriptMessage};
