//! Settings resolution for the `transcode` binary.
//!
//! Precedence, lowest first: built-in defaults, `transcode.ron`, the
//! `TRANSCODE_BACKEND_URL` environment variable, command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use log::LevelFilter;
use ron::extensions::Extensions;
use serde::Deserialize;
use transcode_engine::{BackendSettings, MonitorSettings};

use crate::cli::GlobalArgs;

pub(crate) const DEFAULT_CONFIG_FILE: &str = "transcode.ron";
pub(crate) const DEFAULT_STATE_DIR: &str = ".transcode";
pub(crate) const BACKEND_URL_ENV: &str = "TRANSCODE_BACKEND_URL";

/// Shape of `transcode.ron`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) backend_url: Option<String>,
    pub(crate) state_dir: Option<PathBuf>,
    pub(crate) retry_interval_ms: Option<u64>,
    pub(crate) connect_timeout_secs: Option<u64>,
    pub(crate) request_timeout_secs: Option<u64>,
    pub(crate) upload_timeout_secs: Option<u64>,
    pub(crate) max_event_bytes: Option<usize>,
    pub(crate) user_id: Option<String>,
    pub(crate) log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct AppConfig {
    pub(crate) backend: BackendSettings,
    pub(crate) monitor: MonitorSettings,
    pub(crate) state_dir: PathBuf,
    pub(crate) user_id: Option<String>,
    pub(crate) log_level: LevelFilter,
    pub(crate) log_to_terminal: bool,
}

impl AppConfig {
    pub(crate) fn load(global: &GlobalArgs) -> anyhow::Result<Self> {
        let file = match &global.config {
            Some(path) => read_file_config(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    read_file_config(default_path)?
                } else {
                    FileConfig::default()
                }
            }
        };
        let env_url = std::env::var(BACKEND_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        Self::resolve(file, env_url, global)
    }

    pub(crate) fn resolve(
        file: FileConfig,
        env_url: Option<String>,
        global: &GlobalArgs,
    ) -> anyhow::Result<Self> {
        let mut backend = BackendSettings::default();
        if let Some(url) = global.backend_url.clone().or(env_url).or(file.backend_url) {
            backend.base_url = url;
        }
        if let Some(secs) = file.connect_timeout_secs {
            backend.connect_timeout = positive_secs("connect_timeout_secs", secs)?;
        }
        if let Some(secs) = file.request_timeout_secs {
            backend.request_timeout = positive_secs("request_timeout_secs", secs)?;
        }
        if let Some(secs) = file.upload_timeout_secs {
            backend.upload_timeout = positive_secs("upload_timeout_secs", secs)?;
        }
        if let Some(bytes) = file.max_event_bytes {
            if bytes == 0 {
                bail!("max_event_bytes must be greater than zero");
            }
            backend.max_event_bytes = bytes;
        }

        let mut monitor = MonitorSettings::default();
        if let Some(ms) = global.retry_interval_ms.or(file.retry_interval_ms) {
            if ms == 0 {
                bail!("retry interval must be greater than zero");
            }
            monitor.retry_interval = Duration::from_millis(ms);
        }

        let log_level = match global.log_level.as_deref().or(file.log_level.as_deref()) {
            Some(name) => monitor_logging::parse_level(name)
                .ok_or_else(|| anyhow!("unknown log level {name:?}"))?,
            None => monitor_logging::default_level(),
        };

        let state_dir = global
            .state_dir
            .clone()
            .or(file.state_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));

        Ok(Self {
            backend,
            monitor,
            state_dir,
            user_id: file.user_id.filter(|id| !id.trim().is_empty()),
            log_level,
            log_to_terminal: global.verbose,
        })
    }
}

fn read_file_config(path: &Path) -> anyhow::Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_file_config(&content).with_context(|| format!("invalid config file {}", path.display()))
}

pub(crate) fn parse_file_config(content: &str) -> anyhow::Result<FileConfig> {
    let options = ron::Options::default().with_default_extension(Extensions::IMPLICIT_SOME);
    Ok(options.from_str(content)?)
}

fn positive_secs(field: &str, secs: u64) -> anyhow::Result<Duration> {
    if secs == 0 {
        bail!("{field} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}
