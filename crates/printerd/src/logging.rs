//! Logging utilities for the daemon.
//!
//! Initializes structured logging using `tracing` and `tracing-subscriber`.
//! Events go to the console and to the append-only `printer.log` file inside
//! the queue directory. File writes happen on a `tracing-appender` worker
//! thread so logging never blocks the dispatch loop. The threshold is passed
//! in as a [`Verbosity`] value; `RUST_LOG` may refine it per target.

use printerd_lib::LOG_FILE_NAME;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Operator-facing log threshold.
///
/// `verbose` corresponds to tracing's `DEBUG` and `debug` to `TRACE`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
}

impl Verbosity {
    /// The tracing level filter for this threshold.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Verbose => LevelFilter::DEBUG,
            Self::Debug => LevelFilter::TRACE,
        }
    }
}

/// Build the event filter for `verbosity`, letting `RUST_LOG` refine it.
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(verbosity.level_filter().into())
        .from_env_lossy()
}

/// Open `printer.log` in `log_dir` for appending behind a worker thread.
///
/// The file is never rotated. Dropping the guard flushes pending events and
/// stops the worker.
///
/// # Errors
///
/// Fails if the log file cannot be created or opened.
pub fn file_writer(log_dir: &Path) -> io::Result<(NonBlocking, WorkerGuard)> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(log_dir)
        .map_err(io::Error::other)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize the global tracing subscriber.
///
/// Logs to stdout and to `printer.log` inside `log_dir`. Keep the returned
/// guard alive for the life of the process. Call `init` before any logging
/// statements to avoid missing logs.
///
/// # Errors
///
/// Fails if the log file cannot be opened or a global subscriber is already
/// installed.
///
/// # Examples
///
/// ```rust,no_run
/// use printerd::logging::{Verbosity, init};
/// use std::path::Path;
///
/// let _guard = init(Verbosity::Info, Path::new("/srv/print")).expect("logging");
/// tracing::info!("Logging is initialized!");
/// ```
pub fn init(verbosity: Verbosity, log_dir: &Path) -> io::Result<WorkerGuard> {
    let (file, guard) = file_writer(log_dir)?;
    init_with_writers(
        verbosity,
        fmt::writer::BoxMakeWriter::new(io::stdout),
        file,
    )?;
    Ok(guard)
}

/// Initialize logging with custom console and file writers.
///
/// The file writer never receives ANSI colour codes.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_with_writers<C, F>(verbosity: Verbosity, console: C, file: F) -> io::Result<()>
where
    C: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    F: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(fmt::layer().with_writer(console))
        .with(fmt::layer().with_ansi(false).with_writer(file))
        .try_init()
        .map_err(io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use test_support::env_guard::EnvVarGuard;
    use test_support::logging::CapturedLogs;
    use tracing::{debug, info};

    #[rstest]
    #[case(Verbosity::Error, LevelFilter::ERROR)]
    #[case(Verbosity::Warn, LevelFilter::WARN)]
    #[case(Verbosity::Info, LevelFilter::INFO)]
    #[case(Verbosity::Verbose, LevelFilter::DEBUG)]
    #[case(Verbosity::Debug, LevelFilter::TRACE)]
    fn maps_verbosity_to_level(#[case] verbosity: Verbosity, #[case] expected: LevelFilter) {
        assert_eq!(verbosity.level_filter(), expected);
    }

    #[rstest]
    #[serial_test::serial]
    fn filter_defaults_to_configured_level() {
        let _env = EnvVarGuard::remove("RUST_LOG");
        let filter = env_filter(Verbosity::Verbose);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn verbosity_deserialises_lowercase() {
        let v: Verbosity = serde_json::from_str("\"verbose\"").expect("parse");
        assert_eq!(v, Verbosity::Verbose);
        assert!(serde_json::from_str::<Verbosity>("\"silly\"").is_err());
    }

    #[test]
    fn file_writer_appends_to_printer_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = printerd_lib::QueueLayout::new(dir.path()).log_file();
        std::fs::write(&log, "earlier run\n").expect("seed log");

        let (writer, guard) = file_writer(dir.path()).expect("open log");
        let subscriber = fmt().with_ansi(false).with_writer(writer).finish();
        tracing::subscriber::with_default(subscriber, || {
            info!(file = "a.pdf", "Printing");
        });
        drop(guard);

        let contents = std::fs::read_to_string(&log).expect("read log");
        assert!(contents.starts_with("earlier run\n"), "log was truncated: {contents}");
        assert!(contents.contains("Printing"));
        assert!(contents.contains("file=\"a.pdf\""));
    }

    #[test]
    fn file_writer_fails_when_log_dir_is_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("queue");
        std::fs::write(&blocker, b"").expect("write blocker");
        assert!(file_writer(&blocker).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn init_logging_writes_console_and_file() {
        let _env = EnvVarGuard::remove("RUST_LOG");
        let console = CapturedLogs::default();
        let file = CapturedLogs::default();
        init_with_writers(Verbosity::Info, console.clone(), file.clone()).expect("init");
        info!("captured");
        debug!("hidden");
        let console_out = console.contents();
        let file_out = file.contents();
        assert!(console_out.contains("captured"));
        assert!(file_out.contains("captured"));
        assert!(!file_out.contains("hidden"));
        assert!(!file_out.contains('\u{1b}'), "file output must not contain ANSI codes");
    }
}
