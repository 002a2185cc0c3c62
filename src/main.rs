use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use booth_harvest::{
    cli::state_code_from_args, harvest, info_time, Config, EciClient, TreeWriter,
};
use chrono::Local;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(config.log_file.as_deref()) {
        eprintln!("Couldn't open log file: {e}");
        return ExitCode::FAILURE;
    }

    let start_time = Local::now();
    let state_cd = match state_code_from_args(std::env::args().skip(1)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let code = match run(&config, &state_cd).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(state_cd = %state_cd, error = %e, "harvest aborted");
            ExitCode::FAILURE
        }
    };
    info_time!(start_time, "Full program time:");
    code
}

/// Console output, plus an appending plain-text copy when `log_file` is set.
fn init_logging(log_file: Option<&Path>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

async fn run(config: &Config, state_cd: &str) -> booth_harvest::Result<()> {
    let writer = TreeWriter::new(&config.output_dir);
    let client = EciClient::connect(config)?;

    let report = harvest(&client, &writer, state_cd).await?;
    report.log_summary();
    if report.is_complete() {
        info!(state_cd, "harvest complete");
    } else {
        warn!(state_cd, skipped = report.skipped.len(), "partial harvest, some branches were skipped");
    }
    Ok(())
}
