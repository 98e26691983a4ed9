//! Log output for the runner

use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(trace: bool) -> String {
    if trace {
        "warn,interpreter=trace,scheduler=debug".to_string()
    } else {
        "warn".to_string()
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `trace`.
pub fn init_logging(trace: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(trace)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
