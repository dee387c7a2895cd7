//! Tracing subscriber setup for binaries and tests embedding the orchestrator.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{Error, Result};

/// Initialize a tracing subscriber with the default `info` filter.
///
/// `RUST_LOG` overrides the filter when set.
pub fn init() -> Result<()> {
    init_with_filter("info")
}

/// Initialize a tracing subscriber, falling back to `filter` when
/// `RUST_LOG` is not set.
pub fn init_with_filter(filter: &str) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .compact();

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| Error::Logging { message: e.to_string() })?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Logging { message: e.to_string() })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{info, warn};

    #[test]
    fn test_logging_init() {
        // Only the first init in a process can succeed.
        let _ = init();

        info!("This is an info message");
        warn!("This is a warning message");
        assert!(init().is_err());
    }
}
