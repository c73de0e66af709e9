use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// filter. Later calls are no-ops, so tests may call it freely.
pub fn init(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .try_init()
            .ok();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .try_init()
            .ok();
    }
    tracing::debug!(json, "logging initialised");
}
