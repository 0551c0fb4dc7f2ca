use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use monitor_logging::{monitor_info, monitor_warn};
use transcode_core::{TranscodeOption, TranscodeRequest};
use transcode_engine::{
    FileHandleStore, HandleStore, JobMonitor, MonitorHandle, ReqwestBackend, TranscodeBackend,
};

use crate::cli::Command;
use crate::config::AppConfig;
use crate::render::{outcome, Goal, Outcome, Renderer};

/// Exit status after Ctrl-C, following the shell convention for SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

pub(crate) async fn execute(command: Command, config: AppConfig) -> anyhow::Result<ExitCode> {
    let store = FileHandleStore::new(config.state_dir.clone());
    match command {
        Command::Options => {
            print_options();
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            match store.load() {
                Some(handle) => println!("Active transcoding job: {}", handle.job_id()),
                None => println!("No active transcoding job."),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Submit {
            file,
            option,
            user_id,
        } => {
            if let Some(handle) = store.load() {
                bail!(
                    "job {} is still active; follow it with `transcode watch` or stop it with `transcode cancel`",
                    handle.job_id()
                );
            }
            if !file.is_file() {
                bail!("{} is not a readable file", file.display());
            }
            let mut request = TranscodeRequest::new(file, option);
            if let Some(user_id) = user_id.or(config.user_id.clone()) {
                request = request.with_user_id(user_id);
            }
            let monitor = spawn(&config, store)?;
            monitor.start(request);
            follow(monitor, Goal::Finish).await
        }
        Command::Watch => {
            if store.load().is_none() {
                println!("No active transcoding job.");
                return Ok(ExitCode::SUCCESS);
            }
            let monitor = spawn(&config, store)?;
            monitor.resume();
            follow(monitor, Goal::Finish).await
        }
        Command::Cancel => {
            let monitor = spawn(&config, store)?;
            monitor.resume();
            monitor.cancel();
            follow(monitor, Goal::Cancel).await
        }
    }
}

fn spawn(config: &AppConfig, store: FileHandleStore) -> anyhow::Result<MonitorHandle> {
    let backend = ReqwestBackend::new(config.backend.clone())
        .with_context(|| format!("cannot use backend url {:?}", config.backend.base_url))?;
    let backend: Arc<dyn TranscodeBackend> = Arc::new(backend);
    monitor_info!("using backend {}", config.backend.base_url);
    Ok(JobMonitor::spawn(
        backend,
        Box::new(store),
        config.monitor.clone(),
    ))
}

/// Prints view changes until the job reaches an outcome or the user interrupts.
async fn follow(monitor: MonitorHandle, goal: Goal) -> anyhow::Result<ExitCode> {
    let mut views = monitor.subscribe();
    let mut renderer = Renderer::new();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let result = loop {
        let view = views.borrow_and_update().clone();
        for line in renderer.render(&view) {
            print_line(&line);
        }
        if let Some(result) = outcome(goal, &view) {
            break Some(result);
        }
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    monitor_warn!("job monitor stopped unexpectedly");
                    break None;
                }
            }
            _ = &mut interrupt => {
                println!("Interrupted. The job keeps running; resume with `transcode watch`.");
                monitor.shutdown().await;
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
        }
    };

    monitor.shutdown().await;
    match result {
        Some(Outcome::Completed) | Some(Outcome::Cancelled) => Ok(ExitCode::SUCCESS),
        Some(Outcome::Failed(message)) => {
            eprintln!("{message}");
            Ok(ExitCode::FAILURE)
        }
        None => bail!("job monitor stopped before the job finished"),
    }
}

fn print_line(line: &str) {
    println!("{} {}", chrono::Local::now().format("%H:%M:%S"), line);
}

fn print_options() {
    for option in TranscodeOption::ALL {
        let marker = if option == TranscodeOption::default() {
            " (default)"
        } else {
            ""
        };
        println!("{:<20} {}{}", option.as_str(), option.label(), marker);
    }
}
