use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod cache;
mod cli;
mod config;
mod process;
mod refresh;
mod tmux;

use cli::{Args, Commands};
use config::Config;
use refresh::{refresh, RefreshOutcome, SystemProbe};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for status bar output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_directive())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.resolve_config();

    match args.command.unwrap_or(Commands::Refresh) {
        Commands::Refresh => run_refresh(&config).await,
        Commands::Show {
            pane,
            window,
            refresh: refresh_first,
        } => {
            if refresh_first {
                run_refresh(&config).await;
            }
            if let Some(value) = lookup(&config, pane.as_deref(), window.as_deref()) {
                println!("{}", value);
            }
        }
    }

    Ok(())
}

/// Run one refresh. Failures are logged, never surfaced to the status bar.
async fn run_refresh(config: &Config) {
    let probe = SystemProbe::new(config);
    match refresh(config, &probe).await {
        Ok(RefreshOutcome::Published { panes }) => {
            tracing::info!(panes, path = %config.cache_file.display(), "snapshot refreshed");
        }
        Ok(outcome) => tracing::debug!(?outcome, "refresh skipped"),
        Err(e) => tracing::warn!("refresh failed: {:#}", e),
    }
}

/// Read one formatted figure; any read problem means "no data yet"
fn lookup(config: &Config, pane: Option<&str>, window: Option<&str>) -> Option<String> {
    let snapshot = match cache::read_snapshot(&config.cache_file) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::debug!("no snapshot: {}", e);
            return None;
        }
    };

    match (pane, window) {
        (Some(id), _) => snapshot.pane.get(id).cloned(),
        (None, Some(key)) => snapshot.window.get(key).cloned(),
        (None, None) => Some(snapshot.total),
    }
}
