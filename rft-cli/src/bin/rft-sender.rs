//! RFT Sender - send one file to an RFT receiver
//!
//! Reads the whole file, then transfers it over UDP with per-packet
//! retransmission and congestion control.

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use rft::{FileSender, RandomLoss};
use rft_cli::{display_compact_stats, display_send_report, Config, GrowthMode};
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "rft-sender")]
#[command(about = "Reliable file transfer over UDP: sender", long_about = None)]
struct Args {
    /// File to send
    file: PathBuf,

    /// Receiver host
    #[arg(short, long)]
    server: Option<String>,

    /// Receiver port
    #[arg(short, long)]
    port: Option<u16>,

    /// Configuration file (TOML, [sender] table)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bytes of file content per packet
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Retransmission timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Delay between sends in milliseconds
    #[arg(long)]
    pacing_ms: Option<u64>,

    /// Retransmissions allowed per packet (0 = unlimited)
    #[arg(long)]
    max_retries: Option<u32>,

    /// Congestion window growth policy
    #[arg(long, value_enum)]
    growth: Option<GrowthMode>,

    /// Simulated loss probability (0.0 to 1.0)
    #[arg(long)]
    loss: Option<f64>,

    /// Seed for the loss simulator
    #[arg(long)]
    seed: Option<u64>,

    /// Statistics interval in seconds (0 = off)
    #[arg(long)]
    stats: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    rft_cli::init_logging(args.verbose);

    let mut config = Config::load(args.config.as_deref())
        .context("Failed to load configuration")?
        .sender;
    if let Some(server) = args.server {
        config.server = server;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(pacing_ms) = args.pacing_ms {
        config.pacing_ms = pacing_ms;
    }
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(growth) = args.growth {
        config.growth = growth;
    }
    if let Some(loss) = args.loss {
        config.loss = loss;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(stats) = args.stats {
        config.stats_interval_secs = stats;
    }
    config.validate().context("Invalid sender options")?;

    let content = fs::read(&args.file)
        .with_context(|| format!("Failed to read '{}'", args.file.display()))?;
    let file_name = file_name_of(&args.file)?;
    let peer = resolve(&config.target())?;

    tracing::info!("RFT Sender starting...");
    tracing::info!("Sending '{}' ({} bytes) to {}", file_name, content.len(), peer);

    let mut sender = FileSender::new(peer, config.send_options())?;
    if config.loss > 0.0 {
        tracing::info!("Simulating {:.0}% packet loss", config.loss * 100.0);
        sender = match config.seed {
            Some(seed) => sender.with_loss(RandomLoss::seeded(config.loss, seed)),
            None => sender.with_loss(RandomLoss::new(config.loss)),
        };
    }

    // Statistics thread
    let stats_interval = config.stats_interval();
    if !stats_interval.is_zero() {
        let stats = sender.stats_handle();
        let started = Instant::now();
        thread::spawn(move || loop {
            thread::sleep(stats_interval);
            display_compact_stats(&stats.snapshot(), started.elapsed());
        });
    }

    let report = sender.send(&file_name, Bytes::from(content))?;
    display_send_report(&report);

    Ok(())
}

fn file_name_of(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("'{}' has no usable file name", path.display()))
}

fn resolve(target: &str) -> anyhow::Result<SocketAddr> {
    target
        .to_socket_addrs()
        .with_context(|| format!("Invalid receiver address '{}'", target))?
        .next()
        .ok_or_else(|| anyhow::anyhow!("'{}' did not resolve to any address", target))
}
