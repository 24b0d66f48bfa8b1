//! Scripted printer gateway for tests.
//!
//! [`ScriptedPrinter`] records every job it receives and can be told to
//! refuse particular files. Clones share state, so a test can keep one handle
//! while the dispatcher owns another.

#![expect(clippy::expect_used, reason = "lock poisoning is a test bug")]

use printerd::gateway::{PrintError, PrintReceipt, PrinterGateway};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A job the scripted printer was asked to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintCall {
    pub path: PathBuf,
    pub printer: String,
}

impl PrintCall {
    /// File name of the submitted document.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<PrintCall>,
    failing: HashSet<String>,
    printers: Vec<String>,
    list_fails: bool,
    in_flight: usize,
    max_in_flight: usize,
}

/// In-memory [`PrinterGateway`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrinter {
    state: Arc<Mutex<State>>,
    latency: Duration,
}

impl ScriptedPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every print by `latency` before answering.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Printers reported by [`PrinterGateway::list_printers`].
    #[must_use]
    pub fn with_printers<I, S>(self, printers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().printers = printers.into_iter().map(Into::into).collect();
        self
    }

    /// Make printer enumeration fail.
    pub fn fail_listing(&self) {
        self.lock().list_fails = true;
    }

    /// Refuse every job whose file name is `name`.
    pub fn fail_on(&self, name: &str) {
        self.lock().failing.insert(name.to_owned());
    }

    /// Accept jobs for `name` again.
    pub fn recover(&self, name: &str) {
        self.lock().failing.remove(name);
    }

    /// All jobs received so far, including refused ones.
    pub fn calls(&self) -> Vec<PrintCall> {
        self.lock().calls.clone()
    }

    /// File names of all jobs received so far, in order.
    pub fn printed_names(&self) -> Vec<String> {
        self.lock().calls.iter().map(PrintCall::file_name).collect()
    }

    /// Number of jobs received for `name`.
    pub fn attempts(&self, name: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.file_name() == name)
            .count()
    }

    /// Highest number of jobs that were ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("printer state lock")
    }
}

impl PrinterGateway for ScriptedPrinter {
    async fn list_printers(&self) -> Result<Vec<String>, PrintError> {
        let state = self.lock();
        if state.list_fails {
            return Err(PrintError::List(String::from("scheduler is not running")));
        }
        Ok(state.printers.clone())
    }

    async fn print(&self, path: &Path, printer: &str) -> Result<PrintReceipt, PrintError> {
        let call = PrintCall {
            path: path.to_path_buf(),
            printer: printer.to_owned(),
        };
        let name = call.file_name();
        let job = {
            let mut state = self.lock();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.calls.push(call);
            state.calls.len()
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut state = self.lock();
        state.in_flight -= 1;
        if state.failing.contains(&name) {
            return Err(PrintError::Rejected {
                printer: printer.to_owned(),
                reason: format!("refused {name}"),
            });
        }
        Ok(PrintReceipt {
            job_id: Some(format!("{printer}-{job}")),
        })
    }
}
