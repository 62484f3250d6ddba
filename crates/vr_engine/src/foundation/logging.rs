//! Logger setup for binaries built on the engine

pub use log::{debug, info, warn, error, trace};

/// Install `env_logger`, using `default_level` when `RUST_LOG` is unset
///
/// Millisecond timestamps make frame pacing visible in the output. A second
/// call keeps the first logger.
pub fn init_with_level(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    if env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_err()
    {
        log::debug!("Logger already installed, ignoring level {}", default_level);
    }
}

/// Install `env_logger` driven only by `RUST_LOG`, defaulting to `info`
pub fn init() {
    init_with_level("info");
}
