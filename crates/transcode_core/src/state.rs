use crate::view_model::MonitorView;
use crate::{JobHandle, JobId, ReconnectSupervisor, StreamSession};

/// Where the tracked job is in its lifecycle, from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobPhase {
    #[default]
    Idle,
    Submitting,
    Running,
    Cancelling,
    Completed,
    /// Backend reported an error. The handle is kept until cleanup finishes.
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitorState {
    pub(crate) handle: Option<JobHandle>,
    pub(crate) phase: JobPhase,
    pub(crate) supervisor: ReconnectSupervisor,
    pub(crate) session: StreamSession,
    pub(crate) stream_open: bool,
    pub(crate) percent: u8,
    pub(crate) status: String,
    pub(crate) error_message: Option<String>,
    pub(crate) server_error: bool,
    pub(crate) server_alive_message: Option<String>,
    pub(crate) transcoding: bool,
    pub(crate) pending_cleanup: Option<JobId>,
    dirty: bool,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Option<&JobHandle> {
        self.handle.as_ref()
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn supervisor(&self) -> &ReconnectSupervisor {
        &self.supervisor
    }

    pub fn is_stream_open(&self) -> bool {
        self.stream_open
    }

    pub fn view(&self) -> MonitorView {
        let connection = self.supervisor.state();
        MonitorView {
            phase: self.phase,
            job_id: self.handle.as_ref().map(|handle| handle.job_id().clone()),
            percent: self.percent,
            status: self.status.clone(),
            connection,
            connection_status: connection.status_text().to_string(),
            server_alive_message: self.server_alive_message.clone(),
            error_message: self.error_message.clone(),
            server_error: self.server_error,
            job_failed: self.phase == JobPhase::Failed,
            transcoding: self.transcoding,
            can_cancel: self.phase == JobPhase::Running && self.handle.is_some(),
            failed_probes: self.supervisor.failed_probes(),
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether the view changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn set_progress(&mut self, status: impl Into<String>, percent: f64) {
        self.status = status.into();
        self.percent = round_percent(percent);
    }
}

fn round_percent(percent: f64) -> u8 {
    if percent.is_nan() {
        return 0;
    }
    percent.round().clamp(0.0, 100.0) as u8
}
