use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use monitor_logging::{monitor_info, monitor_warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use transcode_core::{JobHandle, JobId};

const HANDLE_FILENAME: &str = "transcoding_job.json";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    StateDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Ensure the state directory exists; create if missing.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::StateDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
    }
    Ok(())
}

/// Writes `{dir}/{filename}` through a synced temp file and an atomic rename, so a
/// crash leaves either the old or the new content.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_state_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Durable home of the one job handle a client tracks.
pub trait HandleStore: Send {
    /// Missing or unreadable state loads as `None`.
    fn load(&self) -> Option<JobHandle>;
    fn save(&self, handle: &JobHandle) -> Result<(), PersistError>;
    /// Clearing an empty store is a no-op.
    fn clear(&self) -> Result<(), PersistError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedHandle {
    transcoding_job_id: String,
}

/// Keeps the handle as `{"transcodingJobId": "..."}` in a JSON file.
#[derive(Debug, Clone)]
pub struct FileHandleStore {
    dir: PathBuf,
}

impl FileHandleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(HANDLE_FILENAME)
    }
}

impl HandleStore for FileHandleStore {
    fn load(&self) -> Option<JobHandle> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                monitor_warn!("Failed to read job handle from {:?}: {}", path, err);
                return None;
            }
        };

        let persisted: PersistedHandle = match serde_json::from_str(&content) {
            Ok(persisted) => persisted,
            Err(err) => {
                monitor_warn!("Failed to parse job handle from {:?}: {}", path, err);
                return None;
            }
        };

        let Some(job_id) = JobId::new(&persisted.transcoding_job_id) else {
            monitor_warn!("Ignoring empty job id in {:?}", path);
            return None;
        };
        monitor_info!("Loaded persisted job {} from {:?}", job_id, path);
        Some(JobHandle::new(job_id))
    }

    fn save(&self, handle: &JobHandle) -> Result<(), PersistError> {
        let persisted = PersistedHandle {
            transcoding_job_id: handle.job_id().as_str().to_string(),
        };
        let content = serde_json::to_vec(&persisted)?;
        AtomicFileWriter::new(self.dir.clone()).write(HANDLE_FILENAME, &content)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
