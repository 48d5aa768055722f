//! tracing setup shared by the binaries

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` wins over `default_filter` when set
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}
