//! Behavioural steps for daemon configuration loading.
#![expect(
    clippy::expect_used,
    clippy::needless_pass_by_value,
    reason = "simplify test failure output"
)]

use cucumber::{World, given, then, when};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use clap::Parser;
use printerd::config::{CliArgs, Config, ConfigError};
use test_support::env_guard::{EnvVarGuard, scrub_env};

#[derive(Debug, Default, World)]
pub struct ConfigWorld {
    dir: Option<TempDir>,
    queue: Option<PathBuf>,
    file: Option<PathBuf>,
    result: Option<Result<Config, ConfigError>>,
    // Field order matters: the scrub guards restore first, then `ambient`.
    env: Vec<EnvVarGuard>,
    ambient: Option<EnvVarGuard>,
}

impl ConfigWorld {
    fn queue_arg(&self) -> String {
        self.queue
            .as_ref()
            .expect("queue path set")
            .display()
            .to_string()
    }

    fn configure(&mut self, argv: &[&str]) {
        let args = CliArgs::try_parse_from(argv).expect("arguments parse");
        self.result = Some(Config::from_cli(&args));
    }
}

/// Hide ambient `PRINTERD_*` overrides for the rest of the scenario.
fn isolate_env(world: &mut ConfigWorld) {
    if world.env.is_empty() {
        world.env = scrub_env("PRINTERD_");
    }
}

#[given(regex = r#"^a PRINTERD_PRINTER override of "([^"]+)"$"#)]
fn ambient_printer(world: &mut ConfigWorld, printer: String) {
    world.ambient = Some(EnvVarGuard::set("PRINTERD_PRINTER", printer));
}

#[given("a queue directory")]
fn queue_directory(world: &mut ConfigWorld) {
    isolate_env(world);
    let dir = TempDir::new().expect("create temp dir");
    world.queue = Some(dir.path().to_path_buf());
    world.dir = Some(dir);
}

#[given("a queue path that is a regular file")]
fn queue_is_file(world: &mut ConfigWorld) {
    isolate_env(world);
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("queue");
    fs::write(&path, b"").expect("write file");
    world.queue = Some(path);
    world.dir = Some(dir);
}

#[given(regex = r#"^a configuration file naming printer "([^"]+)"$"#)]
fn config_file(world: &mut ConfigWorld, printer: String) {
    let dir = world.dir.as_ref().expect("temp dir set");
    let path = dir.path().join("printerd.toml");
    fs::write(&path, format!("printer = '{printer}'\n")).expect("write file");
    world.file = Some(path);
}

#[when(regex = r#"^the daemon is configured with printer "([^"]+)"$"#)]
fn configured_with_printer(world: &mut ConfigWorld, printer: String) {
    let queue = world.queue_arg();
    world.configure(&["printerd", "-q", queue.as_str(), "-p", printer.as_str()]);
}

#[when(regex = r#"^the daemon is configured with printer "([^"]+)" and flags "([^"]+)"$"#)]
fn configured_with_flags(world: &mut ConfigWorld, printer: String, flags: String) {
    let queue = world.queue_arg();
    let mut argv = vec!["printerd", "-q", queue.as_str(), "-p", printer.as_str()];
    argv.extend(flags.split_whitespace());
    world.configure(&argv);
}

#[when("the daemon is configured without a printer")]
fn configured_without_printer(world: &mut ConfigWorld) {
    let queue = world.queue_arg();
    world.configure(&["printerd", "-q", queue.as_str()]);
}

#[when("the daemon is configured from the file")]
fn configured_from_file(world: &mut ConfigWorld) {
    let queue = world.queue_arg();
    let file = world
        .file
        .as_ref()
        .expect("config file set")
        .display()
        .to_string();
    world.configure(&["printerd", "-q", queue.as_str(), "-c", file.as_str()]);
}

#[then(regex = r#"^the configured printer is "([^"]+)"$"#)]
fn configured_printer(world: &mut ConfigWorld, expected: String) {
    match world.result.as_ref() {
        Some(Ok(cfg)) => assert_eq!(cfg.printer, expected),
        other => panic!("expected success, got {other:?}"),
    }
}

#[then(regex = r"^the configured mode is (test|live)$")]
fn configured_mode(world: &mut ConfigWorld, mode: String) {
    match world.result.as_ref() {
        Some(Ok(cfg)) => assert_eq!(cfg.test_only, mode == "test"),
        other => panic!("expected success, got {other:?}"),
    }
}

#[then("no PRINTERD_ variable is visible")]
fn env_is_clean(_world: &mut ConfigWorld) {
    let leaked: Vec<String> = std::env::vars()
        .map(|(key, _)| key)
        .filter(|key| key.starts_with("PRINTERD_"))
        .collect();
    assert!(leaked.is_empty(), "leaked overrides: {leaked:?}");
}

#[then(regex = r#"^configuration fails with "([^"]+)"$"#)]
fn configuration_fails(world: &mut ConfigWorld, message: String) {
    match world.result.take() {
        Some(Err(err)) => assert!(
            err.to_string().contains(&message),
            "unexpected error: {err}"
        ),
        other => panic!("expected error, got {other:?}"),
    }
}
