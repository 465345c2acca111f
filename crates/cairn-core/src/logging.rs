use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,cairn_assets=debug";

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` overrides the default filter when set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Like [`init`], but tolerates a subscriber that is already installed.
///
/// Intended for tests, where several cases race to set up logging.
pub fn try_init() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
        .is_ok()
}
