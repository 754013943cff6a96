use std::io::IsTerminal;

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging on stderr.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at `level` and dependencies at `warn`.
/// Calling this twice returns an error instead of panicking.
pub fn init_logging(level: &str) -> Result<(), TryInitError> {
    let default_filter = format!("warn,wealthplan={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init()?;

    tracing::debug!(level, "logging initialized");
    Ok(())
}
