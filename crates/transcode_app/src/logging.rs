//! Logger initialization for the `transcode` binary.
//!
//! Logs go to `transcode.log` in the state directory so they never interleave with the
//! progress lines on stdout. `--verbose` mirrors them to stderr as well.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOG_FILENAME: &str = "transcode.log";

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogDestination {
    /// Write to the log file in the state directory.
    File,
    /// Write to both the log file and stderr.
    Both,
}

impl LogDestination {
    pub(crate) fn from_verbose(verbose: bool) -> Self {
        if verbose {
            LogDestination::Both
        } else {
            LogDestination::File
        }
    }
}

/// Initialize the global logger. The state directory must already exist.
pub(crate) fn initialize(destination: LogDestination, level: LevelFilter, state_dir: &Path) {
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if destination == LogDestination::Both {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    if let Some(file_logger) = create_file_logger(level, config, state_dir) {
        loggers.push(file_logger);
    }
    if loggers.is_empty() {
        return;
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

pub(crate) fn log_path(state_dir: &Path) -> PathBuf {
    state_dir.join(LOG_FILENAME)
}

fn create_file_logger(
    level: LevelFilter,
    config: Config,
    state_dir: &Path,
) -> Option<Box<WriteLogger<File>>> {
    let path = log_path(state_dir);
    match File::options().create(true).append(true).open(&path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not open log file at {:?}: {}", path, err);
            None
        }
    }
}
