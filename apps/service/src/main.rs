mod config;

use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use probeup::Daemon;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Checks storage paths with direct I/O reads, controlled over stdin.
///
/// Commands: `start <path> <interval>` and `stop <path>`. Every command and
/// every probe produces one `<event> <path> <error> <data>` line on stdout.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Log debug messages
    #[arg(short, long)]
    debug: bool,

    /// Configuration file (default: ~/.config/uppe/check.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Write the effective configuration to a file and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logger::init(args.debug);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = config::Config::from_config(args.config.as_ref())?;

    if args.print_config {
        print!("{config}");
        return Ok(());
    }
    if let Some(path) = &args.write_config {
        config.write_config(path)?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let daemon_config = config.to_daemon_config()?;
    let shutdown_wait = daemon_config.shutdown_timeout;
    let daemon = Daemon::new(daemon_config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("uppe-check")
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(async {
        watch_signals(daemon.shutdown_token())?;
        daemon.run(tokio::io::stdin(), tokio::io::stdout()).await?;
        Ok::<_, anyhow::Error>(())
    });

    // Probes stuck in the kernel and the stdin reader run on blocking
    // threads that cannot be joined.
    runtime.shutdown_timeout(shutdown_wait + Duration::from_secs(1));
    result
}

/// Cancel `shutdown` on SIGINT or SIGTERM. SIGHUP is logged and ignored.
fn watch_signals(shutdown: CancellationToken) -> Result<()> {
    let mut interrupt =
        signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = interrupt.recv() => info!("Received SIGINT"),
                _ = terminate.recv() => info!("Received SIGTERM"),
                _ = hangup.recv() => {
                    info!("Received SIGHUP, ignoring");
                    continue;
                }
                _ = shutdown.cancelled() => return,
            }
            shutdown.cancel();
            return;
        }
    });

    Ok(())
}
