use crate::{ConnectionState, JobId, JobPhase};

/// Read-only status exposed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MonitorView {
    pub phase: JobPhase,
    pub job_id: Option<JobId>,
    pub percent: u8,
    pub status: String,
    pub connection: ConnectionState,
    pub connection_status: String,
    pub server_alive_message: Option<String>,
    pub error_message: Option<String>,
    pub server_error: bool,
    pub job_failed: bool,
    pub transcoding: bool,
    pub can_cancel: bool,
    pub failed_probes: u64,
}

impl MonitorView {
    /// True once the job reached an outcome and nothing is pending on the client.
    pub fn is_settled(&self) -> bool {
        match self.phase {
            JobPhase::Completed | JobPhase::Cancelled => true,
            JobPhase::Failed => self.job_id.is_none(),
            JobPhase::Idle => self.job_id.is_none() && !self.transcoding,
            JobPhase::Submitting | JobPhase::Running | JobPhase::Cancelling => false,
        }
    }
}
