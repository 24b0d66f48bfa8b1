//! Helper utilities for daemon tests.
//!
//! Provides constructors for temporary daemon configurations rooted in a
//! [`TempDir`] and helpers for populating the queue.

#![expect(clippy::expect_used, reason = "simplify test setup")]

use printerd::config::Config;
use printerd::logging::Verbosity;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Printer name used by [`temp_config`].
pub const TEST_PRINTER: &str = "test-printer";

/// Build a [`Config`] whose queue directory lives inside `tmp`.
///
/// The queue directory is created. Both loop delays are zero, restarts wait
/// one millisecond and a stopping dispatcher is aborted after 100ms, so
/// tests never sleep for real.
pub fn temp_config(tmp: &TempDir) -> Config {
    let queue_dir = tmp.path().join("queue");
    std::fs::create_dir_all(&queue_dir).expect("create queue dir");
    Config {
        printer: TEST_PRINTER.into(),
        queue_dir,
        test_only: false,
        verbosity: Verbosity::Debug,
        settle_delay_ms: 0,
        cycle_delay_ms: 0,
        restart_min_delay_ms: 1,
        shutdown_grace_ms: 100,
    }
}

/// Write a small PDF-looking file named `name` into `dir`.
pub fn write_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.4\n%%EOF\n").expect("write pdf");
    path
}

/// Sorted names of the regular files directly inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
