use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used by the API when `RUST_LOG` is unset.
pub const API_DEFAULT_FILTER: &str = "info";

/// The worker's simulated emails are logged at debug level, so its default
/// filter opens that one module up.
pub const WORKER_DEFAULT_FILTER: &str = "info,weather_lookup::notification=debug";

/// Initialize structured logging for a binary.
///
/// Call once at startup, before anything logs. `RUST_LOG` overrides
/// `default_filter`.
pub fn init_logging(service: &str, default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Logging initialized for {}", service);
}
