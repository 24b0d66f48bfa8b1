//! Entry point for the printerd daemon binary.
//! Watches a queue directory for PDF files and sends each one to the
//! configured printer, archiving it once the spooler accepts the job.

use clap::{CommandFactory, Parser};
use printerd::config::{CliArgs, Config};
use printerd::gateway::{CupsGateway, write_printer_list};
use std::io::Write;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let gateway = CupsGateway::default();

    if args.list {
        return list_printers(&gateway).await;
    }

    let config = match Config::from_cli(&args) {
        Ok(cfg) => cfg,
        Err(err) => CliArgs::command().error(err.kind(), err).exit(),
    };

    let _log_guard = match printerd::logging::init(config.verbosity, &config.queue_dir) {
        Ok(guard) => guard,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "printerd: cannot initialise logging: {err}");
            return ExitCode::FAILURE;
        }
    };

    match printerd::supervisor::run(config, gateway).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Printer service failed");
            ExitCode::FAILURE
        }
    }
}

async fn list_printers(gateway: &CupsGateway) -> ExitCode {
    let mut out = Vec::new();
    if let Err(err) = write_printer_list(gateway, &mut out).await {
        let _ = writeln!(std::io::stderr(), "printerd: {err}");
        return ExitCode::FAILURE;
    }
    match std::io::stdout().lock().write_all(&out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
