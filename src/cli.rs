use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{self, Config};

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pane-mem",
    about = "Attribute process memory to tmux panes and windows",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (TOML)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Ignore any config file
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Override the snapshot path
    #[arg(long, global = true)]
    pub cache_file: Option<PathBuf>,

    /// Override the lock path
    #[arg(long, global = true)]
    pub lock_file: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value = "warn", global = true)]
    pub log_level: LogLevel,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Regenerate the snapshot if it is stale (default)
    Refresh,

    /// Print one figure from the snapshot
    Show {
        /// Pane id, e.g. %3
        #[arg(long, conflicts_with = "window")]
        pane: Option<String>,

        /// Window key, e.g. work:1
        #[arg(long)]
        window: Option<String>,

        /// Attempt a refresh before reading
        #[arg(long)]
        refresh: bool,
    },
}

impl Args {
    /// Build the effective config: defaults, then file, then flags
    pub fn resolve_config(&self) -> Config {
        let mut config = if self.no_config {
            Config::default()
        } else if let Some(path) = &self.config {
            config::load_config_from_path(path)
        } else {
            config::load_config()
        };

        if let Some(path) = &self.cache_file {
            config.cache_file = path.clone();
        }
        if let Some(path) = &self.lock_file {
            config.lock_file = path.clone();
        }
        config
    }
}
