use crate::{
    CleanupReason, JobHandle, JobId, ProgressEvent, RetryEpoch, StreamSession, TranscodeRequest,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Startup: the handle persisted by a previous run, if any.
    Resume(Option<JobHandle>),
    /// User asked to transcode a file.
    SubmitRequested(TranscodeRequest),
    /// Backend accepted the submission.
    SubmitAccepted { job_id: JobId },
    /// Upload or validation failed.
    SubmitFailed { message: String },
    /// The progress connection for `session` is established.
    StreamOpened { session: StreamSession },
    /// The backend pushed a progress event on `session`.
    StreamEvent {
        session: StreamSession,
        event: ProgressEvent,
    },
    /// The progress connection for `session` failed or was ended by the server.
    StreamLost {
        session: StreamSession,
        reason: String,
    },
    /// The retry timer for `epoch` fired.
    RetryTick { epoch: RetryEpoch },
    /// A liveness probe started by `epoch` completed.
    ProbeFinished {
        epoch: RetryEpoch,
        result: Result<(), String>,
    },
    /// User asked to cancel the active job.
    CancelRequested,
    /// The remote cancel call completed. `Ok` carries the server message.
    CancelFinished {
        job_id: JobId,
        result: Result<String, String>,
    },
    /// A best-effort artifact delete completed.
    CleanupFinished {
        job_id: JobId,
        reason: CleanupReason,
        result: Result<(), String>,
    },
    /// Owner is going away; release the stream and the timer.
    Teardown,
    NoOp,
}
