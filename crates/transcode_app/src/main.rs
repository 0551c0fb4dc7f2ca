mod cli;
mod commands;
mod config;
mod logging;
mod render;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use monitor_logging::monitor_info;
use transcode_engine::ensure_state_dir;

use cli::Cli;
use config::AppConfig;
use logging::LogDestination;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load(&cli.global)?;
    ensure_state_dir(&config.state_dir).with_context(|| {
        format!(
            "cannot use state directory {}",
            config.state_dir.display()
        )
    })?;
    logging::initialize(
        LogDestination::from_verbose(config.log_to_terminal),
        config.log_level,
        &config.state_dir,
    );
    monitor_info!(
        "transcode {:?}, state in {:?}, log at {:?}",
        cli.command,
        config.state_dir,
        logging::log_path(&config.state_dir)
    );

    // One thread is plenty: the monitor is a single task and all IO is async.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(commands::execute(cli.command, config))
}
