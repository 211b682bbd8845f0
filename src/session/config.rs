use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for call sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Assistant used when `start_call` is not given one
    pub assistant_id: Option<String>,

    /// Quiet period before a partial transcript is promoted
    /// Default: 4 seconds
    pub debounce: Duration,

    /// Interval of the call duration counter while active
    /// Default: 1 second
    pub duration_tick: Duration,

    /// Whether an in-flight partial is kept when the call ends
    pub finalize_pending_on_end: bool,

    /// Capacity of the observer broadcast channel
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            assistant_id: None,
            debounce: Duration::from_secs(4),
            duration_tick: Duration::from_secs(1),
            finalize_pending_on_end: true,
            event_buffer: 256,
        }
    }
}
