//! Client-side logging.

use tracing_subscriber::{EnvFilter, prelude::*};

/// Initialize logging. `RUST_LOG` overrides the default filter. Calling this
/// more than once is harmless.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("error,ui=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_writer(std::io::stderr);

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
    {
        tracing::info!("Initialized logs");
    }
}
