use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use transcode_core::TranscodeOption;

#[derive(Debug, Parser)]
#[command(name = "transcode")]
#[command(about = "Submit videos to a transcoding backend and follow their progress.")]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) global: GlobalArgs,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Default, Args)]
pub(crate) struct GlobalArgs {
    /// RON config file (default: ./transcode.ron, skipped when missing)
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:3000
    #[arg(long, global = true)]
    pub(crate) backend_url: Option<String>,

    /// Directory holding the persisted job handle and the log file
    #[arg(long, global = true)]
    pub(crate) state_dir: Option<PathBuf>,

    /// Delay between liveness probes while the connection is lost, in milliseconds
    #[arg(long, global = true)]
    pub(crate) retry_interval_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub(crate) log_level: Option<String>,

    /// Also write log output to the terminal
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Upload a video and follow the transcoding job until it ends.
    Submit {
        /// Video file to upload
        file: PathBuf,

        /// Output preset, see `transcode options`
        #[arg(long, default_value_t = TranscodeOption::default())]
        option: TranscodeOption,

        /// Optional user id sent with the upload
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Reattach to the job left running by an earlier session.
    Watch,
    /// Cancel the persisted job.
    Cancel,
    /// Show the persisted job, if any, without contacting the backend.
    Status,
    /// List the available output presets.
    Options,
}
