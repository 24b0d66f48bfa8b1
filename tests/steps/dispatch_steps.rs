//! Behavioural test steps for the dispatch loop.
//!
//! Scenarios run one cycle at a time against a temporary queue directory and
//! a scripted printer, then inspect the queue and archive contents.
#![expect(
    clippy::expect_used,
    reason = "test harness: fail fast on setup/IO errors"
)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cucumber::{World, given, then, when};
use printerd::config::Config;
use printerd::dispatch::Dispatcher;
use printerd::gateway::PrintSlot;
use tempfile::TempDir;
use test_support::daemon::file_names;
use test_support::{ScriptedPrinter, temp_config, write_pdf};

#[derive(World, Default)]
pub struct DispatchWorld {
    dir: Option<TempDir>,
    cfg: Option<Config>,
    printer: ScriptedPrinter,
    cycles: u64,
}

impl std::fmt::Debug for DispatchWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchWorld")
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl DispatchWorld {
    fn cfg(&self) -> &Config {
        self.cfg.as_ref().expect("queue should be initialised")
    }

    fn queue(&self) -> PathBuf {
        self.cfg().queue_dir.clone()
    }

    fn archive(&self) -> PathBuf {
        self.cfg().layout().archive_dir()
    }
}

fn names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[given(regex = r#"^a queue containing "([^"]*)"$"#)]
fn queue_containing(world: &mut DispatchWorld, files: String) {
    let dir = TempDir::new().expect("tempdir");
    let cfg = temp_config(&dir);
    for name in names(&files) {
        if name.ends_with(".pdf") {
            write_pdf(&cfg.queue_dir, &name);
        } else {
            fs::write(cfg.queue_dir.join(&name), b"text").expect("write file");
        }
    }
    world.dir = Some(dir);
    world.cfg = Some(cfg);
}

#[given(regex = r#"^a directory named "([^"]+)" in the queue$"#)]
fn directory_in_queue(world: &mut DispatchWorld, name: String) {
    fs::create_dir(world.queue().join(name)).expect("create dir");
}

#[given(regex = r#"^the printer refuses "([^"]+)"$"#)]
fn printer_refuses(world: &mut DispatchWorld, name: String) {
    world.printer.fail_on(&name);
}

#[given("test only mode")]
fn test_only_mode(world: &mut DispatchWorld) {
    world.cfg.as_mut().expect("queue should be initialised").test_only = true;
}

#[when(regex = r#"^the printer recovers "([^"]+)"$"#)]
fn printer_recovers(world: &mut DispatchWorld, name: String) {
    world.printer.recover(&name);
}

#[when("one dispatch cycle runs")]
async fn one_cycle(world: &mut DispatchWorld) {
    world.cycles += 1;
    let dispatcher = Dispatcher::new(
        Arc::new(world.cfg().clone()),
        Arc::new(PrintSlot::new(world.printer.clone())),
    );
    tokio::time::timeout(
        Duration::from_secs(30),
        dispatcher.run_cycle(world.cycles, Duration::ZERO),
    )
    .await
    .expect("cycle should finish");
}

#[then(regex = r#"^the printer received "([^"]+)"$"#)]
fn printer_received(world: &mut DispatchWorld, files: String) {
    assert_eq!(world.printer.printed_names(), names(&files));
}

#[then("the printer received nothing")]
fn printer_received_nothing(world: &mut DispatchWorld) {
    assert!(world.printer.calls().is_empty());
}

#[then(regex = r#"^the archive contains "([^"]+)"$"#)]
fn archive_contains(world: &mut DispatchWorld, files: String) {
    assert_eq!(file_names(&world.archive()), names(&files));
}

#[then(regex = r#"^the queue contains "([^"]+)"$"#)]
fn queue_contains(world: &mut DispatchWorld, files: String) {
    assert_eq!(file_names(&world.queue()), names(&files));
}

#[then("the queue is empty")]
fn queue_is_empty(world: &mut DispatchWorld) {
    assert!(file_names(&world.queue()).is_empty());
}

#[then(regex = r#"^"([^"]+)" is still a directory in the queue$"#)]
fn still_directory(world: &mut DispatchWorld, name: String) {
    assert!(world.queue().join(name).is_dir());
}
