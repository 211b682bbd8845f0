//! Provider notifications and their canonical form
//!
//! The voice provider delivers loosely-shaped notifications; this module
//! names them (`ProviderEvent`) and maps each one onto exactly one
//! `CanonicalEvent`, or discards it when it carries nothing usable.

mod canonical;
mod normalizer;

pub use canonical::{CanonicalEvent, ProviderEvent, ProviderNotification, TranscriptFragment};
pub use normalizer::{extract_error, extract_transcript, extract_volume, normalize};
