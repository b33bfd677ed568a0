//! Client for the app's own REST backend.

mod client;
mod config;
mod payload;
mod probe;

pub use client::{AuthSession, BackendClient, ProgressSync};
pub use config::{BackendConfig, DEFAULT_BACKEND_URL};
pub use payload::progress_sync_payload;
