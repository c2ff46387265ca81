use tracing_subscriber::EnvFilter;

/// Installs the process-wide subscriber. Call once, before the first run.
///
/// `RUST_LOG` wins over the default level when it is set.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
