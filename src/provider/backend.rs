use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

/// Callback invoked with the raw payload of a provider notification
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Registration through `on(event, handler)`
pub trait EventEmitter: Send + Sync {
    fn on(&self, event: &str, handler: EventHandler) -> Result<()>;

    /// Detach every handler registered through `on`
    fn remove_all_listeners(&self);
}

/// Registration through `add_event_listener(event, handler)`
pub trait EventTarget: Send + Sync {
    fn add_event_listener(&self, event: &str, handler: EventHandler) -> Result<()>;

    /// Detach every handler registered for `event`
    fn remove_event_listeners(&self, event: &str);
}

/// External real-time voice provider
///
/// The provider produces call lifecycle, speech, volume, error and
/// transcript notifications. It exposes at most one of the two
/// registration capabilities; which one is probed when a call starts.
///
/// Implementations:
/// - NATS: a voice gateway relays provider notifications over NATS (`on`)
/// - Local: in-process provider driven by `emit` (`add_event_listener`)
#[async_trait::async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    fn as_emitter(&self) -> Option<&dyn EventEmitter> {
        None
    }

    fn as_event_target(&self) -> Option<&dyn EventTarget> {
        None
    }

    /// Start a call with the given assistant
    async fn start(&self, assistant_id: &str) -> Result<()>;

    /// Stop the current call
    async fn stop(&self) -> Result<()>;

    async fn is_muted(&self) -> Result<bool>;

    async fn set_muted(&self, muted: bool) -> Result<()>;
}
