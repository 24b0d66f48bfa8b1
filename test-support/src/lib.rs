//! Test support utilities.
//!
//! Shared fixtures for the printerd test suites: temporary queue
//! configurations, a scripted printer, environment guards and log capture.

pub mod daemon;
pub mod env_guard;
pub mod logging;
pub mod printer;
pub mod util;

pub use daemon::{temp_config, write_pdf};
pub use printer::ScriptedPrinter;
pub use util::{POLL_DELAY, wait_for_file, wait_until};
