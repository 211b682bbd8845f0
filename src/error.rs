use thiserror::Error;

/// Result type alias for call engine commands
pub type CallResult<T> = Result<T, CallError>;

/// Errors reported by call engine commands
#[derive(Error, Debug)]
pub enum CallError {
    /// The provider exposes neither `on` nor `add_event_listener`
    #[error("voice provider `{0}` supports neither on() nor add_event_listener()")]
    UnsupportedTransport(String),

    /// The command needs a call in progress (connecting or active)
    #[error("no call in progress")]
    NoActiveCall,

    #[error("a call is already in progress")]
    CallInProgress,

    #[error("no assistant configured for the call")]
    MissingAssistant,

    /// The provider rejected a start/stop/mute request
    #[error("failed to {action}: {source}")]
    Provider {
        action: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("call engine has shut down")]
    EngineClosed,
}

impl CallError {
    pub fn provider(action: &'static str, source: anyhow::Error) -> Self {
        CallError::Provider { action, source }
    }
}
