use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use monitor_logging::{monitor_debug, monitor_error, monitor_info, monitor_warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use transcode_core::{
    update, Effect, MonitorState, MonitorView, Msg, RetryEpoch, StreamSession, TranscodeRequest,
};

use crate::{HandleStore, ProgressStream, RetryTimer, SignalSink, StreamSignal, TickSink, TranscodeBackend};

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Constant delay between liveness probes while the connection is lost.
    pub retry_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(5),
        }
    }
}

enum Inbox {
    Msg(Msg),
    /// Load the persisted handle and resume it.
    Resume,
}

/// Forwards stream signals and timer ticks into the monitor's inbox.
#[derive(Clone)]
struct InboxSink {
    tx: mpsc::UnboundedSender<Inbox>,
}

impl SignalSink for InboxSink {
    fn emit(&self, session: StreamSession, signal: StreamSignal) {
        let msg = match signal {
            StreamSignal::Opened => Msg::StreamOpened { session },
            StreamSignal::Event(event) => Msg::StreamEvent { session, event },
            StreamSignal::Lost { reason } => Msg::StreamLost { session, reason },
        };
        let _ = self.tx.send(Inbox::Msg(msg));
    }
}

impl TickSink for InboxSink {
    fn tick(&self, epoch: RetryEpoch) {
        let _ = self.tx.send(Inbox::Msg(Msg::RetryTick { epoch }));
    }
}

/// Runtime half of the job monitor.
///
/// Owns the state machine, the persisted handle, the one progress stream and the one
/// retry timer. Runs as a single task that handles one message at a time; every
/// network call runs on its own task and reports back through the inbox.
pub struct JobMonitor {
    state: MonitorState,
    backend: Arc<dyn TranscodeBackend>,
    store: Box<dyn HandleStore>,
    settings: MonitorSettings,
    stream: Option<ProgressStream>,
    retry: Option<RetryTimer>,
    sink: InboxSink,
    view_tx: watch::Sender<MonitorView>,
}

impl JobMonitor {
    /// Spawns the monitor on the current tokio runtime.
    pub fn spawn(
        backend: Arc<dyn TranscodeBackend>,
        store: Box<dyn HandleStore>,
        settings: MonitorSettings,
    ) -> MonitorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = MonitorState::new();
        let (view_tx, view_rx) = watch::channel(state.view());
        let monitor = JobMonitor {
            state,
            backend,
            store,
            settings,
            stream: None,
            retry: None,
            sink: InboxSink { tx: tx.clone() },
            view_tx,
        };
        let task = tokio::spawn(monitor.run(rx));
        MonitorHandle {
            inbox: tx,
            view_rx,
            task: Some(task),
        }
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Inbox>) {
        while let Some(item) = inbox.recv().await {
            match item {
                Inbox::Resume => {
                    let handle = self.store.load();
                    self.dispatch(Msg::Resume(handle));
                }
                Inbox::Msg(msg) => {
                    let teardown = matches!(msg, Msg::Teardown);
                    self.dispatch(msg);
                    if teardown {
                        break;
                    }
                }
            }
        }
        monitor_debug!("job monitor stopped");
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        for effect in effects {
            self.execute(effect);
        }
        if self.state.consume_dirty() {
            self.view_tx.send_replace(self.state.view());
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Submit(request) => {
                monitor_info!(
                    "Submitting {:?} as {}",
                    request.file_path,
                    request.option
                );
                let backend = Arc::clone(&self.backend);
                self.spawn_call(async move {
                    match backend.submit(&request).await {
                        Ok(job_id) => Msg::SubmitAccepted { job_id },
                        Err(err) => Msg::SubmitFailed {
                            message: err.message,
                        },
                    }
                });
            }
            Effect::PersistHandle(handle) => {
                if let Err(err) = self.store.save(&handle) {
                    monitor_error!("Failed to persist job {}: {}", handle.job_id(), err);
                }
            }
            Effect::ClearHandle => {
                if let Err(err) = self.store.clear() {
                    monitor_error!("Failed to clear persisted job: {}", err);
                }
            }
            Effect::OpenStream { session, job_id } => {
                self.close_stream();
                let sink: Arc<dyn SignalSink> = Arc::new(self.sink.clone());
                self.stream = Some(ProgressStream::open(
                    Arc::clone(&self.backend),
                    job_id,
                    session,
                    sink,
                ));
            }
            Effect::CloseStream => self.close_stream(),
            Effect::ArmRetry { epoch } => {
                self.disarm_retry();
                monitor_info!(
                    "Connection lost; probing backend every {:?}",
                    self.settings.retry_interval
                );
                let sink: Arc<dyn TickSink> = Arc::new(self.sink.clone());
                self.retry = Some(RetryTimer::arm(self.settings.retry_interval, epoch, sink));
            }
            Effect::DisarmRetry => self.disarm_retry(),
            Effect::ProbeHealth { epoch } => {
                let backend = Arc::clone(&self.backend);
                self.spawn_call(async move {
                    let result = backend.health_check().await.map_err(|err| err.to_string());
                    Msg::ProbeFinished { epoch, result }
                });
            }
            Effect::CancelJob { job_id } => {
                let backend = Arc::clone(&self.backend);
                self.spawn_call(async move {
                    let result = backend.cancel(&job_id).await.map_err(|err| err.message);
                    Msg::CancelFinished { job_id, result }
                });
            }
            Effect::DeleteArtifact {
                job_id,
                file_name,
                reason,
            } => {
                monitor_info!("Deleting artifact {} ({:?})", file_name, reason);
                let backend = Arc::clone(&self.backend);
                self.spawn_call(async move {
                    let result = backend
                        .delete_artifact(&file_name)
                        .await
                        .map_err(|err| err.to_string());
                    Msg::CleanupFinished {
                        job_id,
                        reason,
                        result,
                    }
                });
            }
        }
    }

    fn spawn_call<F>(&self, call: F)
    where
        F: Future<Output = Msg> + Send + 'static,
    {
        let tx = self.sink.tx.clone();
        tokio::spawn(async move {
            let msg = call.await;
            if tx.send(Inbox::Msg(msg)).is_err() {
                monitor_debug!("monitor gone before call completed");
            }
        });
    }

    fn close_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
    }

    fn disarm_retry(&mut self) {
        if let Some(mut timer) = self.retry.take() {
            timer.disarm();
        }
    }
}

impl Drop for JobMonitor {
    fn drop(&mut self) {
        if self.stream.is_some() || self.retry.is_some() {
            monitor_warn!("job monitor dropped with live connection; releasing");
        }
        self.close_stream();
        self.disarm_retry();
    }
}

/// UI-facing handle to a running [`JobMonitor`].
///
/// Dropping the handle tears the monitor down; the persisted job survives for a later
/// [`MonitorHandle::resume`].
pub struct MonitorHandle {
    inbox: mpsc::UnboundedSender<Inbox>,
    view_rx: watch::Receiver<MonitorView>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn start(&self, request: TranscodeRequest) {
        self.send(Msg::SubmitRequested(request));
    }

    pub fn cancel(&self) {
        self.send(Msg::CancelRequested);
    }

    /// Reopens the progress stream for a job persisted by an earlier run, if any.
    pub fn resume(&self) {
        let _ = self.inbox.send(Inbox::Resume);
    }

    pub fn view(&self) -> MonitorView {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorView> {
        self.view_rx.clone()
    }

    /// Waits until the view satisfies `predicate`. Returns `None` if the monitor stopped.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&MonitorView) -> bool,
    ) -> Option<MonitorView> {
        let mut rx = self.view_rx.clone();
        let view = rx.wait_for(predicate).await.ok()?;
        Some(view.clone())
    }

    /// Tears the monitor down and waits for it to release the stream and timer.
    pub async fn shutdown(mut self) {
        self.send(Msg::Teardown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, msg: Msg) {
        if self.inbox.send(Inbox::Msg(msg)).is_err() {
            monitor_warn!("job monitor is no longer running");
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.inbox.send(Inbox::Msg(Msg::Teardown));
        }
    }
}
