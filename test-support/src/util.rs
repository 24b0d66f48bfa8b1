//! Utility helpers for asynchronous tests.
//!
//! Provides functions to synchronize with background tasks in tests.

use std::path::Path;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Pause between polls in [`wait_until`].
pub const POLL_DELAY: Duration = Duration::from_millis(10);

/// Wait for a file to appear within the given number of tries.
///
/// # Examples
///
/// ```rust,ignore
/// use std::path::Path;
/// use std::time::Duration;
/// use test_support::wait_for_file;
///
/// let path = Path::new("/tmp/queue/complete/a.pdf");
/// let found = wait_for_file(path, 5, Duration::from_millis(10)).await;
/// assert!(found);
/// ```
pub async fn wait_for_file(path: &Path, tries: u32, delay: Duration) -> bool {
    for _ in 0..tries {
        if path.exists() {
            return true;
        }
        sleep(delay).await;
    }
    path.exists()
}

/// Poll `cond` every [`POLL_DELAY`] until it holds or `timeout` elapses.
///
/// Returns the final value of `cond`.
pub async fn wait_until<F>(timeout: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        sleep(POLL_DELAY).await;
    }
    cond()
}
