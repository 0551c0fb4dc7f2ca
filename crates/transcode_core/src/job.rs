use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Extension the backend uses for transcoded output files.
const ARTIFACT_EXTENSION: &str = "mp4";

/// Opaque identifier the backend assigns to a transcoding job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Returns `None` for an empty or all-whitespace identifier. Anything else is
    /// kept byte for byte, since the backend matches ids exactly.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the output file the backend writes for this job.
    pub fn artifact_file_name(&self) -> String {
        format!("{}.{}", self.0, ARTIFACT_EXTENSION)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The lookup key for the one job a client tracks at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    job_id: JobId,
}

impl JobHandle {
    pub fn new(job_id: JobId) -> Self {
        Self { job_id }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn into_job_id(self) -> JobId {
        self.job_id
    }
}

/// Output presets offered by the transcoding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TranscodeOption {
    #[default]
    Uhd4kH264,
    Uhd4kVpx,
    FullHdH264,
    FullHdVpx,
    HdH264,
}

impl TranscodeOption {
    pub const ALL: [TranscodeOption; 5] = [
        TranscodeOption::Uhd4kH264,
        TranscodeOption::Uhd4kVpx,
        TranscodeOption::FullHdH264,
        TranscodeOption::FullHdVpx,
        TranscodeOption::HdH264,
    ];

    /// Wire value sent as the `transcodingOption` form field.
    pub fn as_str(self) -> &'static str {
        match self {
            TranscodeOption::Uhd4kH264 => "3840x2160-libx264",
            TranscodeOption::Uhd4kVpx => "3840x2160-libvpx",
            TranscodeOption::FullHdH264 => "1920x1080-libx264",
            TranscodeOption::FullHdVpx => "1920x1080-libvpx",
            TranscodeOption::HdH264 => "1280x720-libx264",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TranscodeOption::Uhd4kH264 => "4K - 3840x2160 - libx264 (MP4)",
            TranscodeOption::Uhd4kVpx => "4K - 3840x2160 - libvpx (WebM)",
            TranscodeOption::FullHdH264 => "1080p - 1920x1080 - libx264 (MP4)",
            TranscodeOption::FullHdVpx => "1080p - 1920x1080 - libvpx (WebM)",
            TranscodeOption::HdH264 => "720p - 1280x720 - libx264 (MP4)",
        }
    }
}

impl fmt::Display for TranscodeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transcoding option {0:?}")]
pub struct ParseOptionError(pub String);

impl FromStr for TranscodeOption {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TranscodeOption::ALL
            .into_iter()
            .find(|option| option.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseOptionError(s.to_string()))
    }
}

/// A ready local file plus the options to transcode it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub file_path: PathBuf,
    pub option: TranscodeOption,
    pub user_id: Option<String>,
}

impl TranscodeRequest {
    pub fn new(file_path: impl Into<PathBuf>, option: TranscodeOption) -> Self {
        Self {
            file_path: file_path.into(),
            option,
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}
