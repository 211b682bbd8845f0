use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    #[default]
    Idle,
    Connecting,
    Active,
    Ended,
}

impl CallStatus {
    /// Connecting or active
    pub fn in_call(&self) -> bool {
        matches!(self, CallStatus::Connecting | CallStatus::Active)
    }

    /// A new call may be requested from this status
    pub fn can_start(&self) -> bool {
        matches!(self, CallStatus::Idle | CallStatus::Ended)
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallStatus::Idle => "idle",
            CallStatus::Connecting => "connecting",
            CallStatus::Active => "active",
            CallStatus::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Call status as seen by observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSnapshot {
    pub status: CallStatus,
    pub is_connected: bool,
    pub is_muted: bool,
    /// Last known volume in [0, 1]; persists between samples
    pub volume_level: f32,
    pub last_error: Option<String>,
}

impl Default for CallSnapshot {
    fn default() -> Self {
        Self {
            status: CallStatus::Idle,
            is_connected: false,
            is_muted: false,
            volume_level: 0.0,
            last_error: None,
        }
    }
}
