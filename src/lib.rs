pub mod analysis;
pub mod commands;
pub mod error;
pub mod models;

pub use error::{EquityError, Result};

/// Installs the `env_logger` backend. `RUST_LOG` overrides the default level.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
