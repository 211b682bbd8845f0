use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    pub nats_url: String,
    pub client_id: String,
    pub public_key: Option<String>,
    pub assistant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub debounce_ms: u64,
    pub duration_tick_ms: u64,
    pub finalize_pending_on_end: bool,
    pub event_buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 4000,
            duration_tick_ms: 1000,
            finalize_pending_on_end: true,
            event_buffer: 256,
        }
    }
}

impl Config {
    /// Load from a config file, with `CALL_SESSION__*` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("CALL_SESSION").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Runtime session configuration
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            assistant_id: self.provider.assistant_id.clone(),
            debounce: Duration::from_millis(self.session.debounce_ms),
            duration_tick: Duration::from_millis(self.session.duration_tick_ms.max(1)),
            finalize_pending_on_end: self.session.finalize_pending_on_end,
            event_buffer: self.session.event_buffer,
        }
    }
}
