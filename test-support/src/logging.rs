//! Logging utilities for tests.
//!
//! [`CapturedLogs`] is an in-memory [`MakeWriter`] whose contents can be
//! inspected after the code under test has logged.

#![expect(clippy::expect_used, reason = "lock poisoning is a test bug")]

use serde_json::Value;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Shared in-memory log sink.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
    }

    /// Parse the captured output as JSON lines, skipping anything else.
    pub fn json_events(&self) -> Vec<Value> {
        self.contents()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Captured JSON events at `level` (e.g. `"ERROR"`).
    pub fn events_at(&self, level: &str) -> Vec<Value> {
        self.json_events()
            .into_iter()
            .filter(|v| v["level"] == level)
            .collect()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Subscriber that writes JSON events matching `filter` into `logs`.
///
/// Install it with [`tracing::subscriber::set_default`] to scope it to the
/// current thread; this never reads `RUST_LOG`.
///
/// # Examples
///
/// ```rust,no_run
/// use test_support::logging::{CapturedLogs, json_subscriber};
///
/// let logs = CapturedLogs::default();
/// let _guard = tracing::subscriber::set_default(json_subscriber(&logs, "debug"));
/// tracing::info!(file = "a.pdf", "Printing");
/// assert_eq!(logs.json_events().len(), 1);
/// ```
pub fn json_subscriber(logs: &CapturedLogs, filter: &str) -> impl Subscriber + Send + Sync {
    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(fmt::layer().json().with_writer(logs.clone()))
}
