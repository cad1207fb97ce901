mod board_paths;
pub mod cache;
mod cli;
pub mod engine;
pub mod error;
mod io_atomic;
pub mod paths;
pub mod settings;
pub mod sync;
pub mod tasks;
mod utils;

use clap::Parser;
use std::process::ExitCode;

pub use engine::{EditResolution, EngineEvent, TaskEngine};
pub use error::{EngineError, Result};
pub use settings::{EngineSettings, GrammarKind};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,taskboard_lib=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() -> ExitCode {
    init_tracing();
    let cli = cli::Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(error) => {
            tracing::error!(error = %error, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli::execute(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
