use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber writing to stderr. `RUST_LOG`
/// wins over the default level. Returns false when a subscriber was already
/// installed.
pub fn init(verbose: bool) -> bool {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
#[path = "../tests/src_inline/logging.rs"]
mod tests;
