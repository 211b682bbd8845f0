pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod nats;
pub mod provider;
pub mod session;

pub use config::Config;
pub use error::{CallError, CallResult};
pub use events::{CanonicalEvent, ProviderEvent, ProviderNotification, TranscriptFragment};
pub use http::{create_router, AppState};
pub use nats::NatsClient;
pub use provider::{LocalProvider, NatsProvider, VoiceProvider};
pub use session::{
    CallEngine, CallSnapshot, CallStatus, EngineEvent, Role, SessionConfig, SessionStats,
    TranscriptMessage,
};
