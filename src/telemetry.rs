//! Tracing subscriber setup for hosts embedding the pipeline

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Returns an error
/// when a global subscriber is already set.
pub fn init(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| anyhow!("Invalid log filter '{}': {e}", logging.level))?;

    let builder = fmt().with_env_filter(filter).with_target(true);

    let result = match logging.format.as_str() {
        "json" => builder.json().with_current_span(true).try_init(),
        _ => builder.pretty().try_init(),
    };

    result.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        let logging = LoggingConfig::default();
        let _ = init(&logging);
        assert!(init(&logging).is_err());
    }
}
