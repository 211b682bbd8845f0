use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::CallStatus;

/// Statistics about a call session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Generated when the call is requested; `None` before the first call
    pub session_id: Option<String>,

    pub status: CallStatus,

    /// Assistant the call was started with
    pub assistant_id: Option<String>,

    /// Call id reported by the provider on call start
    pub provider_call_id: Option<String>,

    /// When the call was requested
    pub requested_at: Option<DateTime<Utc>>,

    /// When the provider reported the call as started
    pub connected_at: Option<DateTime<Utc>>,

    pub ended_at: Option<DateTime<Utc>>,

    /// Seconds counted while the call was active
    pub duration_secs: u64,

    /// Number of finalized transcript messages
    pub transcript_messages: usize,

    /// End reason reported by the provider, if any
    pub ended_reason: Option<String>,
}
