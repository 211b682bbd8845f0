use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::backend::EventHandler;

/// Handlers keyed by provider event name
#[derive(Default)]
pub struct ListenerMap {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl ListenerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, event: &str, handler: EventHandler) -> Result<()> {
        let mut handlers = self
            .handlers
            .lock()
            .map_err(|_| anyhow!("listener registry poisoned"))?;
        handlers.entry(event.to_string()).or_default().push(handler);
        Ok(())
    }

    pub fn remove(&self, event: &str) {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.remove(event);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.clear();
        }
    }

    pub fn count(&self) -> usize {
        self.handlers
            .lock()
            .map(|handlers| handlers.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Invoke every handler for `event`; returns how many ran
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        // Handlers run outside the lock so they may register or detach
        let targets: Vec<EventHandler> = match self.handlers.lock() {
            Ok(handlers) => handlers.get(event).cloned().unwrap_or_default(),
            Err(_) => return 0,
        };

        for handler in &targets {
            handler(payload.clone());
        }

        targets.len()
    }
}
