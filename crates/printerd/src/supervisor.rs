//! Task orchestration for printerd.
//!
//! Runs the dispatch loop on its own task, restarting it with exponential
//! backoff if it fails or panics, and turns SIGINT and SIGTERM into a
//! graceful shutdown.

use crate::archive::ensure_archive_dir;
use crate::config::Config;
use crate::dispatch::{Dispatcher, Schedule};
use crate::gateway::{PrintSlot, PrinterGateway};
use backon::{ExponentialBackoff, ExponentialBuilder};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to install {signal} handler: {source}")]
    Signal {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Build a jittered exponential backoff with no maximum attempt count.
///
/// The minimum delay is provided by the caller to allow environment-specific
/// tuning.
pub(crate) fn backoff(min_delay: Duration) -> ExponentialBackoff {
    backon::BackoffBuilder::build(
        ExponentialBuilder::default()
            .with_jitter()
            .with_min_delay(min_delay)
            .without_max_times(),
    )
}

/// Sleep for `d` or return early if `shutdown` is triggered.
///
/// Returns `true` if a shutdown occurred.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<()>, d: Duration) -> bool {
    tokio::select! {
        () = tokio::time::sleep(d) => false,
        _ = shutdown.changed() => true,
    }
}

/// Log the outcome of a supervised task that has finished.
pub(crate) fn log_task_failure(
    name: &str,
    res: &std::result::Result<anyhow::Result<()>, JoinError>,
) {
    match res {
        Ok(Ok(())) => tracing::warn!(task = name, "Task exited"),
        Ok(Err(e)) => {
            tracing::error!(task = name, kind = "inner_error", error = %e, "Task failed");
        }
        Err(e) => tracing::error!(task = name, kind = "join_error", error = %e, "Task failed"),
    }
}

/// Wait up to `grace` for a task to stop on its own, then abort it.
async fn drain_or_abort(
    name: &str,
    handle: &mut JoinHandle<anyhow::Result<()>>,
    grace: Duration,
) {
    match tokio::time::timeout(grace, &mut *handle).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::error!(task = name, error = %e, "Task failed during shutdown"),
        Err(_) => {
            tracing::warn!(
                task = name,
                grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                "Task did not stop in time; aborting"
            );
            handle.abort();
        }
    }
}

/// Supervise a task and respawn it whenever it finishes.
///
/// On shutdown the running task gets `grace` to stop on its own and is
/// aborted after that, so a hung call inside it cannot block exit.
pub async fn supervise_task<F>(
    name: &str,
    mut spawn_fn: F,
    min_delay: Duration,
    grace: Duration,
    mut shutdown: watch::Receiver<()>,
) where
    F: FnMut() -> JoinHandle<anyhow::Result<()>>,
{
    let mut handle = spawn_fn();
    let mut delays = backoff(min_delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                drain_or_abort(name, &mut handle, grace).await;
                break;
            }
            res = &mut handle => {
                log_task_failure(name, &res);
                let delay = delays.next().unwrap_or(min_delay);
                if sleep_or_shutdown(&mut shutdown, delay).await {
                    break;
                }
                if matches!(res, Ok(Ok(()))) {
                    delays = backoff(min_delay);
                }
                tracing::info!(task = name, "Restarting task");
                handle = spawn_fn();
            }
        }
    }
}

/// Create the archive directory up front so that problems are reported early.
///
/// Failure only warns; the mover retries the creation for every file.
async fn prepare_archive_dir(config: &Config) {
    let archive_dir = config.layout().archive_dir();
    if let Err(e) = ensure_archive_dir(&archive_dir).await {
        tracing::warn!(dir = %archive_dir.display(), error = %e, "Cannot create complete directory");
    }
}

fn log_startup(config: &Config) {
    let mode = if config.test_only { "test" } else { "live" };
    tracing::info!(
        mode,
        printer = %config.printer,
        queue = %config.queue_dir.display(),
        "Starting printer service"
    );
}

fn install(kind: SignalKind, name: &'static str) -> Result<Signal> {
    signal(kind).map_err(|source| SupervisorError::Signal {
        signal: name,
        source,
    })
}

/// Start the daemon with the provided configuration.
///
/// Returns once SIGINT or SIGTERM has been received and the dispatch loop has
/// stopped.
///
/// # Errors
///
/// Fails if the signal handlers cannot be installed.
pub async fn run<G>(config: Config, gateway: G) -> Result<()>
where
    G: PrinterGateway + 'static,
{
    let mut sigint = install(SignalKind::interrupt(), "SIGINT")?;
    let mut sigterm = install(SignalKind::terminate(), "SIGTERM")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => tracing::info!(signal = "SIGINT", "Shutting down"),
            _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "Shutting down"),
        }
        let _ = shutdown_tx.send(());
    });

    run_until(config, gateway, shutdown_rx).await;
    Ok(())
}

/// Run the supervised dispatch loop until `shutdown` fires.
pub async fn run_until<G>(config: Config, gateway: G, shutdown: watch::Receiver<()>)
where
    G: PrinterGateway + 'static,
{
    log_startup(&config);
    prepare_archive_dir(&config).await;
    let min_delay = config.restart_min_delay();
    let grace = config.shutdown_grace();
    let cfg = Arc::new(config);
    let slot = Arc::new(PrintSlot::new(gateway));

    let rx = shutdown.clone();
    supervise_task(
        "dispatcher",
        || spawn_dispatcher(cfg.clone(), slot.clone(), rx.clone()),
        min_delay,
        grace,
        shutdown,
    )
    .await;
    tracing::info!("Printer service stopped");
}

fn spawn_dispatcher<G>(
    cfg: Arc<Config>,
    slot: Arc<PrintSlot<G>>,
    shutdown: watch::Receiver<()>,
) -> JoinHandle<anyhow::Result<()>>
where
    G: PrinterGateway + 'static,
{
    tokio::spawn(async move {
        let schedule = Schedule::from_config(&cfg);
        let summary = Dispatcher::new(cfg, slot).run(schedule, shutdown).await;
        tracing::debug!(
            cycles = summary.cycles,
            archived = summary.archived,
            "Dispatcher finished"
        );
        Ok(())
    })
}
