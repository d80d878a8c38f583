//! Observability module for Torro.
//!
//! Provides structured logging via `tracing`.

use crate::config::ObservabilityConfig;
use crate::error::{Result, TorroError};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| TorroError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| TorroError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}
