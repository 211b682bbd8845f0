use crate::session::CallEngine;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Engine owning the call session
    pub engine: CallEngine,
}

impl AppState {
    pub fn new(engine: CallEngine) -> Self {
        Self { engine }
    }
}
