//! Tracing initialization
//!
//! The library itself only emits `tracing` events; applications embedding it
//! can call [`init_tracing`] to get a formatted subscriber honoring `RUST_LOG`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "unistore=info";

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `unistore=info`).
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing(json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
    }

    tracing::debug!(json, "Tracing initialized");
    Ok(())
}
