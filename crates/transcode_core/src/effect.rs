use crate::{JobHandle, JobId, RetryEpoch, StreamSession, TranscodeRequest};

/// Side effects requested by [`crate::update`]. They must be executed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Submit(TranscodeRequest),
    PersistHandle(JobHandle),
    ClearHandle,
    /// Open a progress stream, closing any previous one first.
    OpenStream {
        session: StreamSession,
        job_id: JobId,
    },
    CloseStream,
    /// Arm the fixed-interval retry timer, cancelling any previous one first.
    ArmRetry { epoch: RetryEpoch },
    DisarmRetry,
    ProbeHealth { epoch: RetryEpoch },
    CancelJob { job_id: JobId },
    DeleteArtifact {
        job_id: JobId,
        file_name: String,
        reason: CleanupReason,
    },
}

/// Why an artifact delete was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanupReason {
    /// The backend reported the job failed.
    JobFailed,
    /// The connection died and the server came back; the partial output is reclaimed.
    ConnectionAbandoned,
}
