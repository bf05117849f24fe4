//! Command-line interface for the exporter
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Settings file loading
//! - Mode selection (single run, interval loop, settings check)

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, RunSettings};
use crate::error::Result;

/// Export a MongoDB collection to a timestamped CSV blob
#[derive(Parser, Debug)]
#[command(
    name = "mongo-blob-export",
    version,
    about = "Export a MongoDB collection to a timestamped CSV blob",
    long_about = "Reads every document of a MongoDB collection, encodes the result as CSV and
uploads it as data-export-<timestamp>.csv into a blob container.

Run settings come from the environment: MONGO_CONNECTION_STRING, MONGO_DATABASE_NAME,
MONGO_COLLECTION_NAME, AZURE_STORAGE_CONNECTION_STRING, AZURE_STORAGE_CONTAINER_NAME."
)]
pub struct CliArgs {
    /// Settings file path (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run one export and exit (default)
    Run,

    /// Run an export on a fixed interval until interrupted
    Watch {
        /// Seconds between runs
        #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
        every: u64,
    },

    /// Validate settings without connecting anywhere
    Check,

    /// Show version information
    Version,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Parse process arguments and load the settings file
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build from already-parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Config::load(args.config_file.as_deref())?;
        Ok(Self { args, config })
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.args.config_file.as_deref()
    }

    /// Selected command, `run` when none was given
    pub fn command(&self) -> Commands {
        self.args.command.clone().unwrap_or(Commands::Run)
    }

    /// Logging level chosen by flags, falling back to the settings file
    pub fn log_level(&self) -> tracing::Level {
        if self.args.very_verbose {
            tracing::Level::TRACE
        } else if self.args.verbose {
            tracing::Level::DEBUG
        } else {
            self.config.logging.level.to_tracing_level()
        }
    }

    /// Whether verbosity was forced on the command line
    pub fn verbosity_forced(&self) -> bool {
        self.args.verbose || self.args.very_verbose
    }

    /// Human-readable report for `check`
    ///
    /// # Returns
    /// * `(String, bool)` - Report text and whether the settings are complete
    pub fn check_report(&self, settings: &RunSettings) -> (String, bool) {
        let mut lines = Vec::new();
        match self.config_path() {
            Some(path) => lines.push(format!("Settings file: {}", path.display())),
            None => lines.push(format!(
                "Settings file: {} (used if present)",
                Config::default_path().display()
            )),
        }
        lines.push(format!(
            "Retry: {} attempts, {} ms apart",
            self.config.retry.max_attempts, self.config.retry.delay_ms
        ));
        lines.push(format!(
            "Timeouts: server selection {} ms, connect {} ms",
            self.config.source.server_selection_timeout_ms, self.config.source.connect_timeout_ms
        ));
        lines.push(format!("Run settings: {settings:?}"));

        let complete = match settings.validate() {
            Ok(_) => {
                lines.push("All required settings are present".to_string());
                true
            }
            Err(e) => {
                lines.push(e.to_string());
                false
            }
        };

        (lines.join("\n"), complete)
    }
}
