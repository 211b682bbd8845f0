//! Voice provider abstraction
//!
//! The engine depends on an external real-time voice provider for call
//! control and notifications. Providers register handlers through one of
//! two capabilities (`on` or `add_event_listener`), probed at call start.

mod backend;
mod listeners;
mod local;
mod nats;
mod registration;

pub use backend::{EventEmitter, EventHandler, EventTarget, VoiceProvider};
pub use listeners::ListenerMap;
pub use local::LocalProvider;
pub use nats::NatsProvider;
pub use registration::{probe, EventRegistration};
