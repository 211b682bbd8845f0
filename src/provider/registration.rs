// Provider capability probing
//
// A provider registers handlers either through `on` or through
// `add_event_listener`. The capability is probed once when a call starts
// and the matching registration is used for the rest of the call.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use super::backend::{EventHandler, VoiceProvider};
use crate::error::CallError;
use crate::events::ProviderEvent;

/// Handler registration bound to one provider capability
pub trait EventRegistration: Send + Sync {
    /// Capability name for logging
    fn kind(&self) -> &'static str;

    fn register(&self, event: ProviderEvent, handler: EventHandler) -> Result<()>;

    /// Detach every handler registered through this registration
    fn detach(&self);
}

/// Pick the registration matching the provider's capability
///
/// `on` is preferred when a provider offers both.
pub fn probe(provider: Arc<dyn VoiceProvider>) -> Result<Box<dyn EventRegistration>, CallError> {
    let has_on = provider.as_emitter().is_some();
    let has_add = provider.as_event_target().is_some();

    info!(
        "Voice provider {} event methods: on={}, add_event_listener={}",
        provider.name(),
        has_on,
        has_add
    );

    if has_on {
        Ok(Box::new(EmitterRegistration { provider }))
    } else if has_add {
        Ok(Box::new(EventTargetRegistration {
            provider,
            registered: std::sync::Mutex::new(Vec::new()),
        }))
    } else {
        Err(CallError::UnsupportedTransport(provider.name().to_string()))
    }
}

struct EmitterRegistration {
    provider: Arc<dyn VoiceProvider>,
}

impl EventRegistration for EmitterRegistration {
    fn kind(&self) -> &'static str {
        "on"
    }

    fn register(&self, event: ProviderEvent, handler: EventHandler) -> Result<()> {
        let emitter = self
            .provider
            .as_emitter()
            .context("provider no longer supports on()")?;
        emitter.on(event.as_str(), handler)
    }

    fn detach(&self) {
        if let Some(emitter) = self.provider.as_emitter() {
            emitter.remove_all_listeners();
        }
    }
}

struct EventTargetRegistration {
    provider: Arc<dyn VoiceProvider>,
    /// Events with handlers attached, detached one by one
    registered: std::sync::Mutex<Vec<ProviderEvent>>,
}

impl EventRegistration for EventTargetRegistration {
    fn kind(&self) -> &'static str {
        "add_event_listener"
    }

    fn register(&self, event: ProviderEvent, handler: EventHandler) -> Result<()> {
        let target = self
            .provider
            .as_event_target()
            .context("provider no longer supports add_event_listener()")?;
        target.add_event_listener(event.as_str(), handler)?;

        if let Ok(mut registered) = self.registered.lock() {
            registered.push(event);
        }
        Ok(())
    }

    fn detach(&self) {
        let events = match self.registered.lock() {
            Ok(mut registered) => std::mem::take(&mut *registered),
            Err(_) => ProviderEvent::ALL.to_vec(),
        };

        if let Some(target) = self.provider.as_event_target() {
            for event in events {
                debug!("Removing listeners for {}", event);
                target.remove_event_listeners(event.as_str());
            }
        }
    }
}
