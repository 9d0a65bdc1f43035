//! zoomeye-leecher main entry point
//!
//! This is the command-line interface for the ZoomEye leecher.

use anyhow::Context;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use zoomeye_leecher::config::{load_config, validate, Config};
use zoomeye_leecher::leech::{PageBatch, Session, StopSignal};
use zoomeye_leecher::output::{print_summary, write_batch, write_matches};

/// Utility for loading results from the ZoomEye search engine
///
/// Logs in once, then pulls result pages for QUERY with a pool of concurrent
/// workers. Matches are printed to stdout; logs and the summary go to stderr.
#[derive(Parser, Debug)]
#[command(name = "zoomeye-leecher")]
#[command(version)]
#[command(about = "Utility for loading results from ZoomEye search engine", long_about = None)]
struct Cli {
    /// Query string
    #[arg(value_name = "QUERY")]
    query: String,

    /// Email
    #[arg(short, long)]
    login: String,

    /// Password
    #[arg(short, long)]
    password: String,

    /// Concurrent connections count (default: 32)
    #[arg(short, long)]
    connections: Option<u32>,

    /// Print matches as pages arrive instead of all at the end
    #[arg(short, long)]
    stream: bool,

    /// Pages limit when streaming (default: 100)
    #[arg(short = 'z', long, requires = "stream")]
    limit: Option<u32>,

    /// Highest page queued when collecting (default: 999)
    #[arg(long, conflicts_with = "stream")]
    ceiling: Option<u32>,

    /// Path to an optional TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;
    let session = Session::new(config, cli.login.as_str(), cli.password.as_str())
        .context("Failed to set up session")?;

    tokio::spawn(stop_on_signal(session.stop_handle()));

    let connections = session.config().leech.connections;
    let report = if cli.stream {
        let limit = session.config().leech.page_limit;
        let (tx, rx) = mpsc::channel(connections as usize);
        let printer = tokio::spawn(print_stream(rx));

        let report = session.stream(&cli.query, connections, limit, tx).await;
        // The channel closes once the run returns, so the printer drains and exits.
        match printer.await {
            Ok(Err(e)) => tracing::error!("Failed to write matches: {}", e),
            Err(e) => tracing::error!("Printer task failed: {}", e),
            Ok(Ok(())) => {}
        }
        report?
    } else {
        let ceiling = session.config().leech.page_ceiling;
        let report = session.collect(&cli.query, connections, ceiling).await?;
        write_matches(&mut io::stdout().lock(), &report.matches)
            .context("Failed to write matches")?;
        report
    };

    if !cli.quiet {
        print_summary(&report);
    }

    Ok(())
}

/// Loads the optional config file and applies CLI overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(connections) = cli.connections {
        config.leech.connections = connections;
    }
    if let Some(limit) = cli.limit {
        config.leech.page_limit = limit;
    }
    if let Some(ceiling) = cli.ceiling {
        config.leech.page_ceiling = ceiling;
    }

    validate(&config).context("Invalid command-line options")?;
    Ok(config)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("zoomeye_leecher=info,warn"),
            1 => EnvFilter::new("zoomeye_leecher=debug,info"),
            2 => EnvFilter::new("zoomeye_leecher=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // stdout carries matches only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Prints streamed batches until every worker has dropped its sender
async fn print_stream(mut rx: mpsc::Receiver<PageBatch>) -> io::Result<()> {
    while let Some(batch) = rx.recv().await {
        write_batch(&mut io::stdout().lock(), &batch)?;
    }
    Ok(())
}

/// Raises the stop signal on SIGINT or SIGTERM
async fn stop_on_signal(stop: StopSignal) {
    if let Err(e) = wait_for_shutdown().await {
        tracing::error!("Failed to install signal handlers: {}", e);
        return;
    }
    tracing::info!("Shutdown requested, letting in-flight pages finish");
    stop.stop();
}

#[cfg(unix)]
async fn wait_for_shutdown() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}
