/// One update pushed by the backend on the progress stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Progress { percent: f64 },
    Done,
    Error { percent: f64, message: Option<String> },
}

/// Identifies one opened progress stream. Signals from an older session are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamSession(pub u64);

impl StreamSession {
    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}
