pub mod config;
pub mod console;
pub mod controller;

use crate::config::ReaderSettings;
use crate::console::Console;
use crate::controller::gilrs_backend::GilrsBackend;
use crate::controller::{ControllerHandle, ReaderError, Shutdown};
use color_eyre::Result;
use std::io;
use std::process::ExitCode;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    setup()?;

    let settings = ReaderSettings::default();
    let mut console = Console::new(io::stdout());
    if let Err(e) = console.set_title(&settings.console_title) {
        warn!("Unable to set console title: {}", e);
    }

    let backend = match GilrsBackend::new() {
        Ok(backend) => backend,
        Err(e) => return report_failure(ReaderError::AcquisitionError(e.to_string())),
    };

    let handle = match ControllerHandle::start(backend, console, settings) {
        Ok(handle) => handle,
        Err(e) => return report_failure(e),
    };

    let (shutdown, _console) = handle.run_until(interrupted()).await;
    match shutdown {
        Shutdown::Cancelled => {
            info!("Exiting after interrupt");
            Ok(ExitCode::SUCCESS)
        }
        Shutdown::Failed(e) => report_failure(e),
    }
}

fn report_failure(e: ReaderError) -> Result<ExitCode> {
    error!("{}", e);
    Console::new(io::stdout()).line(&e.to_string())?;
    Ok(ExitCode::FAILURE)
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env();
    Ok(())
}

/// Diagnostics go to stderr so they never interleave with the report on stdout
fn setup_logging_env() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(Level::WARN);

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}
