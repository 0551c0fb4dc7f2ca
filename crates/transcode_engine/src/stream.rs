use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use monitor_logging::monitor_debug;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use transcode_core::{JobId, StreamSession};

use crate::{StreamSignal, TranscodeBackend};

/// Receives the signals of an open [`ProgressStream`].
pub trait SignalSink: Send + Sync {
    fn emit(&self, session: StreamSession, signal: StreamSignal);
}

/// One live progress subscription for a job.
///
/// The connection runs on its own task. Closing (or dropping) the stream cancels the
/// task and waits for an emit already in progress, so the sink sees nothing once
/// [`ProgressStream::close`] has returned, on any runtime flavor. `close` must not be
/// called from inside [`SignalSink::emit`].
pub struct ProgressStream {
    session: StreamSession,
    job_id: JobId,
    token: CancellationToken,
    // Held across each emit; close takes it after cancelling.
    gate: Arc<Mutex<()>>,
    task: Option<JoinHandle<()>>,
}

impl ProgressStream {
    /// Starts the subscription. Must be called from within a tokio runtime.
    pub fn open(
        backend: Arc<dyn TranscodeBackend>,
        job_id: JobId,
        session: StreamSession,
        sink: Arc<dyn SignalSink>,
    ) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let gate = Arc::new(Mutex::new(()));
        let task_gate = Arc::clone(&gate);
        let mut signals = backend.progress(&job_id);
        monitor_debug!("opening progress stream {:?} for {}", session, job_id);

        let task = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    next = signals.next() => next,
                };
                let Some(signal) = next else {
                    break;
                };
                let last = matches!(signal, StreamSignal::Lost { .. });
                {
                    let _emitting = task_gate.lock().unwrap_or_else(PoisonError::into_inner);
                    if task_token.is_cancelled() {
                        break;
                    }
                    sink.emit(session, signal);
                }
                if last {
                    break;
                }
            }
        });

        Self {
            session,
            job_id,
            token,
            gate,
            task: Some(task),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }

    /// Idempotent.
    pub fn close(&mut self) {
        self.token.cancel();
        drop(self.gate.lock().unwrap_or_else(PoisonError::into_inner));
        if let Some(task) = self.task.take() {
            task.abort();
            monitor_debug!("closed progress stream {:?} for {}", self.session, self.job_id);
        }
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        self.close();
    }
}
