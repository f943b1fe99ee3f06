//! RFT Receiver - accept files from RFT senders
//!
//! Listens on the well-known port and writes every completed file into the
//! output directory under a random prefix.

use anyhow::Context;
use clap::Parser;
use rft::{DirectorySink, FileReceiver, TransferError};
use rft_cli::{display_compact_stats, display_receive_report, Config};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "rft-receiver")]
#[command(about = "Reliable file transfer over UDP: receiver", long_about = None)]
struct Args {
    /// Bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for received files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Configuration file (TOML, [receiver] table)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep accepting files after the first one
    #[arg(short, long)]
    keep_running: bool,

    /// Give up after this many seconds without traffic (0 = wait forever)
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Keep answering for this long after a file completes, in milliseconds
    #[arg(long)]
    linger_ms: Option<u64>,

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
        .receiver;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if args.keep_running {
        config.keep_running = true;
    }
    if let Some(idle_timeout) = args.idle_timeout {
        config.idle_timeout_secs = idle_timeout;
    }
    if let Some(linger_ms) = args.linger_ms {
        config.linger_ms = linger_ms;
    }
    if let Some(stats) = args.stats {
        config.stats_interval_secs = stats;
    }

    let listen: SocketAddr = config
        .listen()
        .to_socket_addrs()
        .with_context(|| format!("Invalid listen address '{}'", config.listen()))?
        .next()
        .ok_or_else(|| anyhow::anyhow!("'{}' did not resolve", config.listen()))?;

    tracing::info!("RFT Receiver starting...");
    tracing::info!("Writing files to: {}", config.output_dir.display());

    let mut receiver = FileReceiver::bind(listen, config.receive_options())?;
    let mut sink = DirectorySink::new(&config.output_dir);
    tracing::info!("Listening on: {}", receiver.local_addr());

    // Statistics thread
    let stats_interval = config.stats_interval();
    if !stats_interval.is_zero() {
        let stats = receiver.stats_handle();
        let started = Instant::now();
        thread::spawn(move || loop {
            thread::sleep(stats_interval);
            display_compact_stats(&stats.snapshot(), started.elapsed());
        });
    }

    loop {
        match receiver.receive(&mut sink) {
            Ok(report) => display_receive_report(&report),
            Err(TransferError::Idle(waited)) if config.keep_running => {
                tracing::info!("Idle for {:?}, still listening", waited);
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        if !config.keep_running {
            break;
        }
    }

    receiver.close();
    Ok(())
}
