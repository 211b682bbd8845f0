use anyhow::{bail, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

use super::backend::{EventHandler, EventTarget, VoiceProvider};
use super::listeners::ListenerMap;

/// In-process voice provider
///
/// Notifications are injected with [`LocalProvider::emit`] and delivered
/// synchronously to handlers registered through `add_event_listener`.
/// Useful for embedding the engine without a network transport, and for
/// driving it deterministically in tests.
#[derive(Default)]
pub struct LocalProvider {
    listeners: ListenerMap,
    muted: AtomicBool,
    fail_start: AtomicBool,
    started: Mutex<Vec<String>>,
    stop_calls: AtomicUsize,
}

impl LocalProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a notification to the registered handlers
    pub fn emit(&self, event: &str, payload: Value) -> usize {
        let delivered = self.listeners.dispatch(event, &payload);
        debug!("Local provider emitted {} to {} handlers", event, delivered);
        delivered
    }

    /// Make the next `start` calls fail
    pub fn fail_next_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.count()
    }

    /// Assistants passed to `start`, in order
    pub fn started_assistants(&self) -> Vec<String> {
        self.started
            .lock()
            .map(|started| started.clone())
            .unwrap_or_default()
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl EventTarget for LocalProvider {
    fn add_event_listener(&self, event: &str, handler: EventHandler) -> Result<()> {
        self.listeners.add(event, handler)
    }

    fn remove_event_listeners(&self, event: &str) {
        self.listeners.remove(event);
    }
}

#[async_trait::async_trait]
impl VoiceProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn as_event_target(&self) -> Option<&dyn EventTarget> {
        Some(self)
    }

    async fn start(&self, assistant_id: &str) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            bail!("local provider refused to start");
        }

        info!("Local provider starting call with assistant {}", assistant_id);
        if let Ok(mut started) = self.started.lock() {
            started.push(assistant_id.to_string());
        }
        self.muted.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_muted(&self) -> Result<bool> {
        Ok(self.muted.load(Ordering::SeqCst))
    }

    async fn set_muted(&self, muted: bool) -> Result<()> {
        self.muted.store(muted, Ordering::SeqCst);
        Ok(())
    }
}
