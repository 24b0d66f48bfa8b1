//! Cucumber step definitions for the printerd behaviour suite.

pub mod config_steps;
pub mod dispatch_steps;

pub use config_steps::ConfigWorld;
pub use dispatch_steps::DispatchWorld;
