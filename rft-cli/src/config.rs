//! Configuration file support for RFT CLI tools
//!
//! A TOML file with optional `[sender]` and `[receiver]` tables. Missing keys
//! take the defaults below; command-line flags override whatever the file says.

use rft::{ReceiveOptions, SendOptions, SenderConfig as SessionConfig, WindowGrowth};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Well-known receiver port
pub const DEFAULT_PORT: u16 = rft::DEFAULT_PORT;

/// When the congestion window grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GrowthMode {
    /// After every acknowledged packet
    #[default]
    PerAck,
    /// Once per fully acknowledged window
    PerRound,
}

impl From<GrowthMode> for WindowGrowth {
    fn from(mode: GrowthMode) -> Self {
        match mode {
            GrowthMode::PerAck => WindowGrowth::PerAck,
            GrowthMode::PerRound => WindowGrowth::PerRound,
        }
    }
}

/// Sender configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Receiver host name or address
    pub server: String,
    /// Receiver port
    pub port: u16,
    /// Bytes of file content per packet
    pub chunk_size: usize,
    /// Retransmission timeout in milliseconds
    pub timeout_ms: u64,
    /// Delay between consecutive sends in milliseconds
    pub pacing_ms: u64,
    /// Retransmissions allowed per packet; 0 retries forever
    pub max_retries: u32,
    /// Starting congestion window
    pub initial_cwnd: u32,
    /// Starting slow start threshold
    pub threshold: u32,
    /// Congestion window growth policy
    pub growth: GrowthMode,
    /// Simulated loss probability (0.0 to 1.0)
    pub loss: f64,
    /// Seed for the loss simulator
    pub seed: Option<u64>,
    /// Statistics interval in seconds; 0 disables periodic output
    pub stats_interval_secs: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        SenderConfig {
            server: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            chunk_size: session.chunk_size,
            timeout_ms: 10_000,
            pacing_ms: 500,
            max_retries: session.max_retries.unwrap_or(0),
            initial_cwnd: session.initial_cwnd,
            threshold: session.initial_threshold,
            growth: GrowthMode::PerAck,
            loss: 0.0,
            seed: None,
            stats_interval_secs: 1,
        }
    }
}

impl SenderConfig {
    /// Driver options for this configuration
    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            session: SessionConfig {
                chunk_size: self.chunk_size,
                max_retries: (self.max_retries > 0).then_some(self.max_retries),
                initial_cwnd: self.initial_cwnd,
                initial_threshold: self.threshold,
                growth: self.growth.into(),
            },
            retransmit_timeout: Duration::from_millis(self.timeout_ms),
            pacing: Duration::from_millis(self.pacing_ms),
            ..SendOptions::default()
        }
    }

    /// Receiver address as `host:port`
    pub fn target(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    /// Get statistics interval as Duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    /// Check value ranges; run again after command-line overrides
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("sender.chunk_size must be > 0".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("sender.timeout_ms must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.loss) {
            return Err(ConfigError::Invalid(format!(
                "sender.loss must be within 0.0..=1.0, got {}",
                self.loss
            )));
        }
        Ok(())
    }
}

/// Receiver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Bind address
    pub bind: String,
    /// Listen port
    pub port: u16,
    /// Directory received files are written to
    pub output_dir: PathBuf,
    /// How long to keep answering after a file completes, in milliseconds
    pub linger_ms: u64,
    /// Give up after this many seconds without a datagram; 0 waits forever
    pub idle_timeout_secs: u64,
    /// Keep accepting files after the first one
    pub keep_running: bool,
    /// Statistics interval in seconds; 0 disables periodic output
    pub stats_interval_secs: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            output_dir: PathBuf::from("received_files"),
            linger_ms: 1_000,
            idle_timeout_secs: 0,
            keep_running: false,
            stats_interval_secs: 1,
        }
    }
}

impl ReceiverConfig {
    /// Driver options for this configuration
    pub fn receive_options(&self) -> ReceiveOptions {
        ReceiveOptions {
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
            linger: Duration::from_millis(self.linger_ms),
            ..ReceiveOptions::default()
        }
    }

    /// Listen address as `host:port`
    pub fn listen(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Get statistics interval as Duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

/// Combined configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sender configuration
    pub sender: SenderConfig,
    /// Receiver configuration
    pub receiver: ReceiverConfig,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Config::default()),
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sender.validate()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
