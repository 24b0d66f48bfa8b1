#![cfg_attr(docsrs, feature(doc_cfg))]

//! Library components for the printerd daemon.
//!
//! # Overview
//! This crate exposes:
//! - [`config::Config`] — validated daemon configuration assembled from CLI
//!   flags, `PRINTERD_*` environment variables and an optional TOML file.
//! - [`scanner`] and [`archive`] — the filesystem side of the print queue.
//! - [`gateway`] — the printer abstraction and its CUPS implementation.
//! - [`dispatch`] — the scan, settle, print and archive cycle.
//! - [`supervisor`] — process-level orchestration and shutdown handling.
//!
//! # Examples
//! ```rust,no_run
//! use printerd::config::{CliArgs, Config};
//! use clap::Parser;
//!
//! let args = CliArgs::parse();
//! let cfg = Config::from_cli(&args).expect("configuration must be valid");
//! println!("queue: {}", cfg.queue_dir.display());
//! ```
pub mod archive;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod logging;
pub mod scanner;
pub mod supervisor;
