//! Logging Infrastructure
//!
//! Console logging for applications embedding the client. Library code only
//! emits `tracing` events; installing a subscriber is left to the binary.

use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Initialize the global subscriber
///
/// # Arguments
/// * `level` - Log level used when `RUST_LOG` is unset (e.g., "info", "debug")
/// * `json_format` - JSON lines (production) or pretty output (development)
///
/// # Examples
/// ```no_run
/// tastebook_client::logging::init_logger("debug", false)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logger(level: &str, json_format: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    if json_format {
        let console_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_file(true)
            .with_line_number(true)
            .boxed();
        subscriber.with(console_layer).try_init()?;
    } else {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .boxed();
        subscriber.with(console_layer).try_init()?;
    }

    Ok(())
}

/// Initialize from a loaded configuration
pub fn init_from_config(config: &crate::ClientConfig) -> anyhow::Result<()> {
    init_logger(&config.log_level, false)
}
