//! # digimind-telemetry
//!
//! Logging setup for DigiMind binaries and tests.
//!
//! All crates in the workspace log through [`tracing`]. This crate installs
//! the subscriber: a human-readable or JSON formatter filtered by `RUST_LOG`
//! (default `info`), optionally with a [`SpanCaptureLayer`] that keeps closed
//! spans in memory, grouped by `query.id` / `ingest.id`.
//!
//! ```rust,ignore
//! digimind_telemetry::init_telemetry("digimind")?;
//! ```

pub mod memory;

pub use memory::{CORRELATION_KEYS, SharedTraceStorage, SpanCaptureLayer, SpanRecord};

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Errors from subscriber initialisation.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber is already installed.
    #[error("telemetry already initialized: {0}")]
    AlreadyInitialized(String),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a global subscriber with human-readable output.
pub fn init_telemetry(service_name: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;
    tracing::info!(service.name = service_name, "telemetry initialized");
    Ok(())
}

/// Install a global subscriber that writes one JSON object per event.
pub fn init_json_telemetry(service_name: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_current_span(true))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;
    tracing::info!(service.name = service_name, "telemetry initialized");
    Ok(())
}

/// Install a global subscriber with human-readable output that also records
/// closed spans into `storage`.
pub fn init_with_storage(service_name: &str, storage: SharedTraceStorage) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true))
        .with(SpanCaptureLayer::new(storage))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;
    tracing::info!(service.name = service_name, "telemetry initialized");
    Ok(())
}
