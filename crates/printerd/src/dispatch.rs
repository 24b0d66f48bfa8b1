//! Dispatch loop for printerd.
//!
//! Each cycle scans the queue directory, waits for the settle delay so that
//! writers can finish copying, then prints and archives every discovered file
//! strictly one after another. Failures are isolated: a scan error skips the
//! cycle, a print error leaves that file in the queue to be offered again on
//! the next scan, and an archive error leaves the printed file in place. The
//! loop then pauses for the cycle delay and starts over.
//!
//! The settle delay is a heuristic. Files are not checked for size or mtime
//! stability, so a very slow copy can still be picked up half written.

use crate::archive;
use crate::config::Config;
use crate::gateway::{PrintSlot, PrinterGateway};
use crate::scanner;
use printerd_lib::{QueueLayout, WorkItem};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};

/// Observable state of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Listing the queue directory.
    Scanning,
    /// Waiting for writers to finish before touching discovered files.
    Settling,
    /// Handling file `index` (1-based) of `total`.
    Processing { index: usize, total: usize },
    /// Waiting for the next cycle.
    Cycling,
    /// The loop has exited after a stop request or its cycle bound.
    Stopped,
}

/// Timing of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Wait between scanning and processing.
    pub settle_delay: Duration,
    /// Wait between the end of a cycle and the next scan.
    pub cycle_delay: Duration,
    /// Stop after this many cycles; `None` runs until stopped.
    pub max_cycles: Option<u64>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(5),
            cycle_delay: Duration::from_secs(30),
            max_cycles: None,
        }
    }
}

impl Schedule {
    /// Unbounded schedule using the delays from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            cycle_delay: config.cycle_delay(),
            max_cycles: None,
        }
    }

    /// Drop both delays so cycles run back to back.
    #[must_use]
    pub fn with_zero_delays(mut self) -> Self {
        self.settle_delay = Duration::ZERO;
        self.cycle_delay = Duration::ZERO;
        self
    }

    /// Bound the loop to `cycles` cycles.
    #[must_use]
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }
}

/// Outcome of a single cycle.
///
/// File lists hold display names in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    /// Number of work items the scan returned.
    pub discovered: usize,
    /// Files the spooler accepted.
    pub printed: Vec<String>,
    /// Files handled in test-only mode without a print call.
    pub simulated: Vec<String>,
    /// Files moved to the archive directory.
    pub archived: Vec<String>,
    /// Files whose print call failed; they remain queued.
    pub print_failures: Vec<String>,
    /// Files that could not be archived; they remain queued.
    pub archive_failures: Vec<String>,
    /// The queue directory could not be listed.
    pub scan_failed: bool,
    /// A stop request cut the cycle short.
    pub interrupted: bool,
}

impl CycleReport {
    fn new(cycle: u64) -> Self {
        Self {
            cycle,
            ..Self::default()
        }
    }
}

/// Totals accumulated across all cycles of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub cycles: u64,
    pub printed: usize,
    pub simulated: usize,
    pub archived: usize,
    pub print_failures: usize,
    pub archive_failures: usize,
    pub scan_failures: usize,
}

impl DispatchSummary {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.printed += report.printed.len();
        self.simulated += report.simulated.len();
        self.archived += report.archived.len();
        self.print_failures += report.print_failures.len();
        self.archive_failures += report.archive_failures.len();
        if report.scan_failed {
            self.scan_failures += 1;
        }
    }
}

/// Hooks used to observe dispatcher progress during tests.
#[derive(Default)]
pub struct DispatchHooks {
    /// Signalled after each successful scan.
    pub scanned: Option<Arc<Notify>>,
    /// Receives the report of every finished cycle.
    pub reports: Option<mpsc::UnboundedSender<CycleReport>>,
}

impl DispatchHooks {
    fn notify_scanned(&self) {
        if let Some(n) = &self.scanned {
            n.notify_waiters();
        }
    }

    fn publish(&self, report: &CycleReport) {
        if let Some(tx) = &self.reports {
            let _ = tx.send(report.clone());
        }
    }
}

/// Tracks the shutdown signal across suspension points.
struct StopSignal {
    rx: watch::Receiver<()>,
    stopped: bool,
}

impl StopSignal {
    fn new(rx: watch::Receiver<()>) -> Self {
        Self { rx, stopped: false }
    }

    /// Returns whether a stop was requested or the sender went away.
    fn is_stopped(&mut self) -> bool {
        if !self.stopped {
            self.stopped = !matches!(self.rx.has_changed(), Ok(false));
        }
        self.stopped
    }

    /// Sleep for `delay` or return early on stop. Returns `true` if stopped.
    async fn sleep(&mut self, delay: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        tokio::select! {
            () = tokio::time::sleep(delay) => false,
            _ = self.rx.changed() => {
                self.stopped = true;
                true
            }
        }
    }
}

/// Drives the scan, settle, print and archive cycle.
pub struct Dispatcher<G> {
    config: Arc<Config>,
    layout: QueueLayout,
    slot: Arc<PrintSlot<G>>,
    hooks: DispatchHooks,
    phase: watch::Sender<Phase>,
}

impl<G: PrinterGateway> Dispatcher<G> {
    pub fn new(config: Arc<Config>, slot: Arc<PrintSlot<G>>) -> Self {
        let layout = config.layout();
        let (phase, _) = watch::channel(Phase::Scanning);
        Self {
            config,
            layout,
            slot,
            hooks: DispatchHooks::default(),
            phase,
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: DispatchHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Subscribe to phase transitions.
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.send_replace(phase);
    }

    /// Run cycles until `shutdown` fires or the schedule's bound is reached.
    ///
    /// Dropping the sender half of `shutdown` also stops the loop. A stop is
    /// honoured during the settle and cycle delays and between files; a print
    /// already handed to the gateway is allowed to finish.
    pub async fn run(self, schedule: Schedule, shutdown: watch::Receiver<()>) -> DispatchSummary {
        let mut stop = StopSignal::new(shutdown);
        let mut summary = DispatchSummary::default();
        loop {
            if stop.is_stopped() {
                break;
            }
            let report = self
                .cycle(summary.cycles + 1, schedule.settle_delay, &mut stop)
                .await;
            summary.record(&report);
            self.hooks.publish(&report);
            if schedule.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            self.set_phase(Phase::Cycling);
            if stop.sleep(schedule.cycle_delay).await {
                break;
            }
        }
        self.set_phase(Phase::Stopped);
        tracing::debug!(cycles = summary.cycles, "Dispatch loop stopped");
        summary
    }

    /// Run a single cycle without waiting for the cycle delay afterwards.
    pub async fn run_cycle(&self, cycle: u64, settle_delay: Duration) -> CycleReport {
        let (_tx, rx) = watch::channel(());
        let mut stop = StopSignal::new(rx);
        let report = self.cycle(cycle, settle_delay, &mut stop).await;
        self.hooks.publish(&report);
        report
    }

    async fn cycle(&self, cycle: u64, settle_delay: Duration, stop: &mut StopSignal) -> CycleReport {
        let mut report = CycleReport::new(cycle);

        self.set_phase(Phase::Scanning);
        tracing::debug!(cycle, "Checking queue");
        let items = match scanner::scan(self.layout.queue_dir()).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(cycle, error = %e, "Queue scan failed; skipping cycle");
                report.scan_failed = true;
                return report;
            }
        };
        report.discovered = items.len();
        self.hooks.notify_scanned();

        self.set_phase(Phase::Settling);
        report.interrupted = stop.sleep(settle_delay).await;

        let total = items.len();
        for (index, item) in items.iter().enumerate() {
            if report.interrupted || stop.is_stopped() {
                report.interrupted = true;
                break;
            }
            self.set_phase(Phase::Processing {
                index: index + 1,
                total,
            });
            self.process(item, &mut report).await;
        }

        if report.discovered > 0 || report.interrupted {
            tracing::info!(
                cycle,
                discovered = report.discovered,
                archived = report.archived.len(),
                failed = report.print_failures.len() + report.archive_failures.len(),
                interrupted = report.interrupted,
                "Cycle complete"
            );
        } else {
            tracing::debug!(cycle, "Queue empty");
        }
        report
    }

    async fn process(&self, item: &WorkItem, report: &mut CycleReport) {
        let file = item.display_name().into_owned();
        let printer = self.config.printer.as_str();

        if self.config.test_only {
            tracing::info!(file = %file, printer, "Test only; not sent to printer");
            report.simulated.push(file.clone());
        } else {
            match self.slot.submit(&item.path, printer).await {
                Ok(receipt) => {
                    tracing::info!(
                        file = %file,
                        printer,
                        job = receipt.job_id.as_deref().unwrap_or("-"),
                        "Printing"
                    );
                    report.printed.push(file.clone());
                }
                Err(e) => {
                    tracing::error!(
                        file = %file,
                        printer,
                        error = %e,
                        "Print failed; file stays queued for the next cycle"
                    );
                    report.print_failures.push(file);
                    return;
                }
            }
        }

        match archive::archive(item, &self.layout).await {
            Ok(dest) => {
                tracing::info!(file = %file, dest = %dest.display(), "Moved to complete directory");
                report.archived.push(file);
            }
            Err(e) => {
                tracing::error!(
                    file = %file,
                    error = %e,
                    "Archive failed; file stays queued and will be printed again"
                );
                report.archive_failures.push(file);
            }
        }
    }
}

/// Handle to a dispatcher running on its own task.
///
/// # Examples
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use printerd::config::Config;
/// # use printerd::dispatch::{DispatchHandle, Dispatcher, Schedule};
/// # use printerd::gateway::{CupsGateway, PrintSlot};
/// # async fn example(config: Arc<Config>) {
/// let slot = Arc::new(PrintSlot::new(CupsGateway::default()));
/// let schedule = Schedule::from_config(&config);
/// let handle = DispatchHandle::spawn(Dispatcher::new(config, slot), schedule);
/// // ... later
/// let summary = handle.shutdown().await.expect("dispatcher task");
/// println!("ran {} cycles", summary.cycles);
/// # }
/// ```
pub struct DispatchHandle {
    shutdown: watch::Sender<()>,
    phase: watch::Receiver<Phase>,
    task: JoinHandle<DispatchSummary>,
}

impl DispatchHandle {
    /// Start `dispatcher` on a new task.
    pub fn spawn<G>(dispatcher: Dispatcher<G>, schedule: Schedule) -> Self
    where
        G: PrinterGateway + 'static,
    {
        let (shutdown, rx) = watch::channel(());
        let phase = dispatcher.subscribe_phase();
        let task = tokio::spawn(dispatcher.run(schedule, rx));
        Self {
            shutdown,
            phase,
            task,
        }
    }

    /// Current phase of the loop.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Ask the loop to stop at its next suspension point.
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }

    /// Wait for the loop to finish on its own, e.g. after a bounded schedule.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] if the dispatcher task panicked.
    pub async fn join(self) -> Result<DispatchSummary, JoinError> {
        let Self { shutdown, task, .. } = self;
        let res = task.await;
        drop(shutdown);
        res
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] if the dispatcher task panicked.
    pub async fn shutdown(self) -> Result<DispatchSummary, JoinError> {
        self.stop();
        self.join().await
    }
}
