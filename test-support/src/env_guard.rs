//! Scoped environment overrides for tests.
//!
//! Configuration reads `PRINTERD_*` variables, so tests that touch them must
//! run under `#[serial_test::serial]` and undo their changes. An
//! [`EnvVarGuard`] records the previous value of one variable and puts it back
//! when dropped; [`scrub_env`] hides every variable sharing a prefix.

use std::ffi::{OsStr, OsString};

/// Restores one environment variable to its earlier state on drop.
#[derive(Debug)]
#[must_use = "the variable is restored as soon as the guard is dropped"]
pub struct EnvVarGuard {
    key: OsString,
    previous: Option<OsString>,
}

impl EnvVarGuard {
    /// Set `key` to `value` until the guard is dropped.
    pub fn set(key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        Self::replace(key.as_ref(), Some(value.as_ref()))
    }

    /// Unset `key` until the guard is dropped.
    pub fn remove(key: impl AsRef<OsStr>) -> Self {
        Self::replace(key.as_ref(), None)
    }

    fn replace(key: &OsStr, value: Option<&OsStr>) -> Self {
        let previous = std::env::var_os(key);
        write_var(key, value);
        Self {
            key: key.to_os_string(),
            previous,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        write_var(&self.key, self.previous.as_deref());
    }
}

/// Unset every variable whose name starts with `prefix`.
///
/// Dropping the returned guards brings the variables back.
pub fn scrub_env(prefix: &str) -> Vec<EnvVarGuard> {
    let keys: Vec<OsString> = std::env::vars_os()
        .map(|(key, _)| key)
        .filter(|key| key.to_string_lossy().starts_with(prefix))
        .collect();
    keys.into_iter().map(EnvVarGuard::remove).collect()
}

fn write_var(key: &OsStr, value: Option<&OsStr>) {
    // SAFETY: callers hold the serial_test lock, so no other test thread reads
    // or writes the environment concurrently.
    unsafe {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}
