//! Printer gateway.
//!
//! Abstracts "send this file to that printer" behind [`PrinterGateway`]. The
//! production implementation, [`CupsGateway`], hands jobs to the local CUPS
//! spooler through the `lp` and `lpstat` commands. Success means the spooler
//! accepted the job, not that paper came out.

use std::ffi::OsString;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::fs;
use tokio::process::Command;
use tokio::sync::Mutex;

/// Errors returned by a [`PrinterGateway`].
#[derive(Debug, Error)]
pub enum PrintError {
    /// The source document could not be read.
    #[error("cannot read {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The spooler command could not be started.
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The spooler refused the job or the printer is unknown.
    #[error("printer {printer} rejected the job: {reason}")]
    Rejected { printer: String, reason: String },
    /// The spooler could not enumerate its printers.
    #[error("failed to list printers: {0}")]
    List(String),
}

/// Acknowledgement that the spooler accepted a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintReceipt {
    /// Spooler job identifier, when the spooler reports one.
    pub job_id: Option<String>,
}

/// Sends documents to printers and enumerates the printers available.
///
/// Implementations perform no retries; a failed job is retried by the
/// dispatcher on its next cycle.
pub trait PrinterGateway: Send + Sync {
    /// Names of the printers known to the system.
    fn list_printers(&self) -> impl Future<Output = Result<Vec<String>, PrintError>> + Send;

    /// Submit the file at `path` to `printer`.
    fn print(
        &self,
        path: &Path,
        printer: &str,
    ) -> impl Future<Output = Result<PrintReceipt, PrintError>> + Send;
}

/// Gateway backed by the CUPS command-line tools.
#[derive(Debug, Clone)]
pub struct CupsGateway {
    lp: OsString,
    lpstat: OsString,
}

impl Default for CupsGateway {
    fn default() -> Self {
        Self::with_commands("lp", "lpstat")
    }
}

impl CupsGateway {
    /// Use alternative executables in place of `lp` and `lpstat`.
    pub fn with_commands(lp: impl Into<OsString>, lpstat: impl Into<OsString>) -> Self {
        Self {
            lp: lp.into(),
            lpstat: lpstat.into(),
        }
    }

    async fn run(&self, program: &OsString, command: &mut Command) -> Result<String, RunFailure> {
        let output = command
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| RunFailure::Spawn {
                command: program.to_string_lossy().into_owned(),
                source,
            })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let reason = if stderr.is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {stderr}", output.status)
            };
            Err(RunFailure::Status(reason))
        }
    }
}

enum RunFailure {
    Spawn { command: String, source: io::Error },
    Status(String),
}

impl RunFailure {
    fn into_print_error(self, printer: &str) -> PrintError {
        match self {
            Self::Spawn { command, source } => PrintError::Spawn { command, source },
            Self::Status(reason) => PrintError::Rejected {
                printer: printer.to_owned(),
                reason,
            },
        }
    }

    fn into_list_error(self) -> PrintError {
        match self {
            Self::Spawn { command, source } => PrintError::Spawn { command, source },
            Self::Status(reason) => PrintError::List(reason),
        }
    }
}

impl PrinterGateway for CupsGateway {
    async fn list_printers(&self) -> Result<Vec<String>, PrintError> {
        let stdout = self
            .run(&self.lpstat, Command::new(&self.lpstat).arg("-e"))
            .await
            .map_err(RunFailure::into_list_error)?;
        Ok(parse_destinations(&stdout))
    }

    async fn print(&self, path: &Path, printer: &str) -> Result<PrintReceipt, PrintError> {
        check_source(path).await?;
        let stdout = self
            .run(
                &self.lp,
                Command::new(&self.lp)
                    .arg("-d")
                    .arg(printer)
                    .arg("--")
                    .arg(path),
            )
            .await
            .map_err(|e| e.into_print_error(printer))?;
        Ok(PrintReceipt {
            job_id: parse_request_id(&stdout),
        })
    }
}

/// Confirm `path` is a regular file we can open before spooling it.
async fn check_source(path: &Path) -> Result<(), PrintError> {
    let source_error = |source| PrintError::Source {
        path: path.to_path_buf(),
        source,
    };
    let file = fs::File::open(path).await.map_err(source_error)?;
    let meta = file.metadata().await.map_err(source_error)?;
    if !meta.is_file() {
        return Err(source_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    Ok(())
}

/// Extract printer names from `lpstat -e` output, one per line.
pub fn parse_destinations(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_owned)
        .collect()
}

/// Extract the job id from `lp` output such as
/// `request id is office-42 (1 file(s))`.
pub fn parse_request_id(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        line.trim()
            .strip_prefix("request id is ")
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_owned)
    })
}

/// Single-slot access to a gateway.
///
/// At most one job is outstanding at any time: a caller waits for the
/// previous submission to be accepted or refused before its own is sent.
#[derive(Debug)]
pub struct PrintSlot<G> {
    gateway: Mutex<G>,
}

impl<G: PrinterGateway> PrintSlot<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway: Mutex::new(gateway),
        }
    }

    /// Submit one job, waiting for any job already in flight to finish.
    ///
    /// # Errors
    ///
    /// Propagates the gateway's [`PrintError`].
    pub async fn submit(&self, path: &Path, printer: &str) -> Result<PrintReceipt, PrintError> {
        let gateway = self.gateway.lock().await;
        gateway.print(path, printer).await
    }
}

/// Write `Printer: <name>` lines for every printer the gateway reports.
///
/// # Errors
///
/// Fails if enumeration fails or `out` cannot be written.
pub async fn write_printer_list<G, W>(gateway: &G, out: &mut W) -> anyhow::Result<()>
where
    G: PrinterGateway,
    W: Write,
{
    let printers = gateway.list_printers().await?;
    for name in printers {
        writeln!(out, "Printer: {name}")?;
    }
    Ok(())
}
