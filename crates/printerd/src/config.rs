//! Configuration loading for the printerd daemon.
//!
//! Values come from three layers, lowest precedence first: an optional TOML
//! file named with `--config`, environment variables using the `PRINTERD_`
//! prefix, and command-line flags. The merged result is validated once at
//! startup and never changes afterwards.

use crate::logging::Verbosity;
use clap::Parser;
use clap::error::ErrorKind;
use figment::Figment;
use figment::providers::Env;
use printerd_lib::QueueLayout;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "PRINTERD_";
/// Default wait after a scan before touching discovered files.
const DEFAULT_SETTLE_DELAY_MS: u64 = 5_000;
/// Default pause between the end of one cycle and the next scan.
const DEFAULT_CYCLE_DELAY_MS: u64 = 30_000;
/// Default minimum delay between dispatcher restarts in milliseconds.
const DEFAULT_RESTART_MIN_DELAY_MS: u64 = 100;
/// Default time a stopping dispatcher may take before it is aborted.
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 10_000;

/// Command-line interface of the `printerd` binary.
#[derive(Debug, Default, Clone, Parser)]
#[command(name = "printerd", about = "Service that sends pdf files to a printer")]
pub struct CliArgs {
    /// Log additional information.
    #[arg(short, long)]
    pub verbose: bool,
    /// Process pdf files but don't actually queue them to the printer.
    #[arg(short, long = "testonly")]
    pub test_only: bool,
    /// List the printers only.
    #[arg(short, long)]
    pub list: bool,
    /// Directory of the printer queue.
    #[arg(short, long, value_name = "DIR")]
    pub queue: Option<PathBuf>,
    /// Printer name.
    #[arg(short, long, value_name = "NAME")]
    pub printer: Option<String>,
    /// Optional TOML file supplying any of the settings above.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Errors raised while assembling the daemon configuration.
///
/// All of these are fatal: the daemon never starts its loop with an invalid
/// configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("printer is required")]
    MissingPrinter,
    #[error("queue directory is required")]
    MissingQueue,
    #[error("queue must be a readable directory: {path}: {source}")]
    QueueUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("queue must be a readable directory: {path} is not a directory")]
    QueueNotDirectory { path: PathBuf },
    #[error(transparent)]
    Load(#[from] Box<ortho_config::OrthoError>),
}

impl ConfigError {
    /// The clap error kind used when reporting this error with usage text.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingPrinter | Self::MissingQueue => ErrorKind::MissingRequiredArgument,
            Self::QueueUnreadable { .. } | Self::QueueNotDirectory { .. } => {
                ErrorKind::ValueValidation
            }
            Self::Load(_) => ErrorKind::Io,
        }
    }
}

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Printer every queued file is sent to.
    pub printer: String,
    /// Watched queue directory.
    pub queue_dir: PathBuf,
    /// Archive files without sending them to the printer.
    pub test_only: bool,
    /// Log threshold.
    pub verbosity: Verbosity,
    /// Wait after each scan before touching discovered files.
    pub settle_delay_ms: u64,
    /// Pause between cycles.
    pub cycle_delay_ms: u64,
    /// Minimum delay in milliseconds applied between dispatcher restarts.
    pub restart_min_delay_ms: u64,
    /// Time allowed for an in-flight job to finish after a stop request.
    pub shutdown_grace_ms: u64,
}

/// Values read from the configuration file and environment.
///
/// Every field is optional so that CLI flags can fill the gaps.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    printer: Option<String>,
    queue_dir: Option<PathBuf>,
    test_only: Option<bool>,
    verbosity: Option<Verbosity>,
    settle_delay_ms: Option<u64>,
    cycle_delay_ms: Option<u64>,
    restart_min_delay_ms: Option<u64>,
    shutdown_grace_ms: Option<u64>,
}

impl Settings {
    fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut fig = match path {
            Some(path) => ortho_config::load_config_file(path)
                .map_err(Box::new)?
                .ok_or_else(|| {
                    Box::new(ortho_config::OrthoError::File {
                        path: path.to_path_buf(),
                        source: Box::new(io::Error::new(
                            io::ErrorKind::NotFound,
                            "Configuration file not found",
                        )),
                    })
                })?,
            None => Figment::new(),
        };
        fig = fig.merge(Env::prefixed(ENV_PREFIX).split("__"));
        fig.extract()
            .map_err(|e| ConfigError::from(Box::new(ortho_config::OrthoError::from(e))))
    }

    fn apply_cli(mut self, cli: &CliArgs) -> Self {
        if let Some(printer) = &cli.printer {
            self.printer = Some(printer.clone());
        }
        if let Some(queue) = &cli.queue {
            self.queue_dir = Some(queue.clone());
        }
        if cli.test_only {
            self.test_only = Some(true);
        }
        if cli.verbose {
            let current = self.verbosity.unwrap_or_default();
            self.verbosity = Some(current.max(Verbosity::Verbose));
        }
        self
    }
}

impl Config {
    /// Build and validate the configuration from parsed CLI arguments,
    /// merging the optional config file and `PRINTERD_*` environment
    /// variables underneath.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the printer or queue is missing, the queue
    /// is not a readable directory, or the config file cannot be loaded.
    pub fn from_cli(cli: &CliArgs) -> Result<Self, ConfigError> {
        let settings = Settings::load(cli.config.as_deref())?.apply_cli(cli);
        Self::from_settings(settings)
    }

    fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let printer = settings
            .printer
            .filter(|p| !p.trim().is_empty())
            .ok_or(ConfigError::MissingPrinter)?;
        let queue_dir = settings
            .queue_dir
            .filter(|q| !q.as_os_str().is_empty())
            .ok_or(ConfigError::MissingQueue)?;
        check_queue_dir(&queue_dir)?;

        Ok(Self {
            printer,
            queue_dir,
            test_only: settings.test_only.unwrap_or(false),
            verbosity: settings.verbosity.unwrap_or_default(),
            settle_delay_ms: settings.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS),
            cycle_delay_ms: settings.cycle_delay_ms.unwrap_or(DEFAULT_CYCLE_DELAY_MS),
            restart_min_delay_ms: settings
                .restart_min_delay_ms
                .unwrap_or(DEFAULT_RESTART_MIN_DELAY_MS),
            shutdown_grace_ms: settings
                .shutdown_grace_ms
                .unwrap_or(DEFAULT_SHUTDOWN_GRACE_MS),
        })
    }

    /// Paths derived from the queue directory.
    pub fn layout(&self) -> QueueLayout {
        QueueLayout::new(&self.queue_dir)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }

    pub fn restart_min_delay(&self) -> Duration {
        Duration::from_millis(self.restart_min_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Verify that `path` is an existing, listable directory.
fn check_queue_dir(path: &Path) -> Result<(), ConfigError> {
    let unreadable = |source| ConfigError::QueueUnreadable {
        path: path.to_path_buf(),
        source,
    };
    let meta = std::fs::metadata(path).map_err(unreadable)?;
    if !meta.is_dir() {
        return Err(ConfigError::QueueNotDirectory {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_dir(path).map_err(unreadable)?;
    Ok(())
}
