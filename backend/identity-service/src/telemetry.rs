/// Tracing setup
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "identity_service=info,info";

/// Install the JSON fmt subscriber, honoring `RUST_LOG`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .json()
        .try_init();
}
