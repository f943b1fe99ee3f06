//! RFT CLI Library
//!
//! Shared functionality for the RFT command-line tools.

pub mod config;
pub mod stats;

pub use config::{Config, ConfigError, GrowthMode, ReceiverConfig, SenderConfig};
pub use stats::{
    display_compact_stats, display_receive_report, display_send_report, format_bytes,
    format_duration,
};

use tracing_subscriber::EnvFilter;

/// Install the log subscriber
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks `debug` over `info`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
