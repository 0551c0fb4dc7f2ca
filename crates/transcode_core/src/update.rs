use monitor_logging::{monitor_debug, monitor_info, monitor_warn};

use crate::{
    CleanupReason, Effect, JobHandle, JobPhase, MonitorState, Msg, ProbeVerdict, ProgressEvent,
    StreamSession,
};

const MSG_UPLOADING: &str = "Uploading and transcoding video...";
const MSG_STARTED: &str = "Transcoding started...";
const MSG_RESUMING: &str = "Resuming transcoding job...";
const MSG_COMPLETED: &str = "Transcoding completed!";
const MSG_FAILED: &str = "Error during transcoding";
const MSG_SERVER_ALIVE: &str = "Server is live again! Reconnecting...";
const MSG_NO_FILE: &str = "Please select a video file to upload.";
const MSG_ALREADY_ACTIVE: &str = "A transcoding job is already active.";
const MSG_NOTHING_TO_CANCEL: &str = "No active transcoding job to cancel.";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: MonitorState, msg: Msg) -> (MonitorState, Vec<Effect>) {
    let before = state.view();
    let effects = match msg {
        Msg::Resume(None) => Vec::new(),
        Msg::Resume(Some(handle)) => {
            if state.handle.is_some() || state.phase == JobPhase::Submitting {
                monitor_debug!("resume ignored; already tracking a job");
                return (state, Vec::new());
            }
            monitor_info!("resuming transcoding job {}", handle.job_id());
            state.handle = Some(handle);
            state.phase = JobPhase::Running;
            state.status = MSG_RESUMING.to_string();
            state.error_message = None;
            let mut effects = Vec::with_capacity(2);
            open_stream(&mut state, &mut effects);
            effects
        }
        Msg::SubmitRequested(request) => {
            if state.handle.is_some() || state.phase == JobPhase::Submitting {
                state.error_message = Some(MSG_ALREADY_ACTIVE.to_string());
                Vec::new()
            } else if request.file_path.as_os_str().is_empty() {
                state.error_message = Some(MSG_NO_FILE.to_string());
                Vec::new()
            } else {
                state.phase = JobPhase::Submitting;
                state.transcoding = true;
                state.server_error = false;
                state.error_message = None;
                state.server_alive_message = None;
                state.set_progress(MSG_UPLOADING, 0.0);
                vec![Effect::Submit(request)]
            }
        }
        Msg::SubmitAccepted { job_id } => {
            if state.phase != JobPhase::Submitting {
                monitor_warn!("submission accepted as {} but none was pending", job_id);
                return (state, Vec::new());
            }
            monitor_info!("transcoding job {} accepted", job_id);
            let handle = JobHandle::new(job_id);
            state.handle = Some(handle.clone());
            state.phase = JobPhase::Running;
            state.transcoding = false;
            state.error_message = None;
            state.set_progress(MSG_STARTED, 0.0);
            let mut effects = vec![Effect::PersistHandle(handle)];
            open_stream(&mut state, &mut effects);
            effects
        }
        Msg::SubmitFailed { message } => {
            if state.phase == JobPhase::Submitting {
                state.phase = JobPhase::Idle;
                state.transcoding = false;
                state.status.clear();
                state.percent = 0;
                state.error_message = Some(format!("Error uploading video: {message}"));
            }
            Vec::new()
        }
        Msg::StreamOpened { session } => {
            if is_current(&state, session) {
                state.supervisor.stream_opened();
                state.server_alive_message = None;
            }
            Vec::new()
        }
        Msg::StreamEvent { session, event } => {
            if !is_current(&state, session) {
                monitor_debug!("dropping event from stale stream {:?}", session);
                return (state, Vec::new());
            }
            apply_progress_event(&mut state, event)
        }
        Msg::StreamLost { session, reason } => {
            if !is_current(&state, session) {
                return (state, Vec::new());
            }
            monitor_warn!("progress stream lost: {}", reason);
            state.stream_open = false;
            state.server_error = true;
            state.transcoding = false;
            let mut effects = vec![Effect::CloseStream];
            if let Some(epoch) = state.supervisor.connection_lost() {
                effects.push(Effect::ArmRetry { epoch });
            }
            effects
        }
        Msg::RetryTick { epoch } => {
            if state.supervisor.tick(epoch) {
                vec![Effect::ProbeHealth { epoch }]
            } else {
                Vec::new()
            }
        }
        Msg::ProbeFinished { epoch, result } => {
            let verdict = state.supervisor.probe_finished(epoch, result.is_ok());
            match verdict {
                ProbeVerdict::Recovered => {
                    monitor_info!("backend reachable again");
                    state.server_error = false;
                    state.server_alive_message = Some(MSG_SERVER_ALIVE.to_string());
                    let mut effects = vec![Effect::DisarmRetry];
                    match state.handle.clone() {
                        Some(handle) => {
                            open_stream(&mut state, &mut effects);
                            let job_id = handle.into_job_id();
                            effects.push(Effect::DeleteArtifact {
                                file_name: job_id.artifact_file_name(),
                                job_id,
                                reason: CleanupReason::ConnectionAbandoned,
                            });
                        }
                        None => {
                            state.supervisor.stop();
                        }
                    }
                    effects
                }
                ProbeVerdict::StillDown => {
                    if let Err(reason) = result {
                        monitor_debug!("backend still unreachable: {}", reason);
                    }
                    Vec::new()
                }
                ProbeVerdict::Stale => Vec::new(),
            }
        }
        Msg::CancelRequested => match (state.phase, active_job_id(&state)) {
            (JobPhase::Cancelling, _) => Vec::new(),
            (JobPhase::Running, Some(job_id)) => {
                monitor_info!("cancelling transcoding job {}", job_id);
                state.phase = JobPhase::Cancelling;
                state.transcoding = false;
                let mut effects = Vec::with_capacity(3);
                release_connection(&mut state, &mut effects);
                effects.push(Effect::CancelJob { job_id });
                effects
            }
            _ => {
                state.error_message = Some(MSG_NOTHING_TO_CANCEL.to_string());
                Vec::new()
            }
        },
        Msg::CancelFinished { job_id, result } => {
            let matches_handle = state
                .handle
                .as_ref()
                .is_some_and(|handle| *handle.job_id() == job_id);
            if state.phase != JobPhase::Cancelling || !matches_handle {
                monitor_debug!("ignoring stale cancel result for {}", job_id);
                return (state, Vec::new());
            }
            match result {
                Ok(message) => {
                    monitor_info!("transcoding job {} cancelled", job_id);
                    state.handle = None;
                    state.phase = JobPhase::Cancelled;
                    state.error_message = None;
                    state.server_error = false;
                    state.set_progress(message, 0.0);
                    vec![Effect::ClearHandle]
                }
                Err(message) => {
                    monitor_warn!("cancel of {} failed: {}", job_id, message);
                    state.phase = JobPhase::Running;
                    state.error_message = Some(format!("Error canceling transcoding: {message}"));
                    let mut effects = Vec::with_capacity(2);
                    open_stream(&mut state, &mut effects);
                    effects
                }
            }
        }
        Msg::CleanupFinished {
            job_id,
            reason,
            result,
        } => {
            match &result {
                Ok(()) => monitor_info!("deleted artifact of {} ({:?})", job_id, reason),
                Err(message) => {
                    monitor_warn!("artifact cleanup of {} failed: {}", job_id, message)
                }
            }
            if reason == CleanupReason::JobFailed
                && state.pending_cleanup.as_ref() == Some(&job_id)
            {
                state.pending_cleanup = None;
                let holds_job = state
                    .handle
                    .as_ref()
                    .is_some_and(|handle| *handle.job_id() == job_id);
                if holds_job {
                    state.handle = None;
                    vec![Effect::ClearHandle]
                } else {
                    Vec::new()
                }
            } else {
                Vec::new()
            }
        }
        Msg::Teardown => {
            let mut effects = Vec::with_capacity(2);
            release_connection(&mut state, &mut effects);
            state.transcoding = false;
            effects
        }
        Msg::NoOp => Vec::new(),
    };

    if state.view() != before {
        state.mark_dirty();
    }
    (state, effects)
}

fn apply_progress_event(state: &mut MonitorState, event: ProgressEvent) -> Vec<Effect> {
    match event {
        ProgressEvent::Progress { percent } => {
            if state.phase != JobPhase::Running {
                return Vec::new();
            }
            state.set_progress("", percent);
            state.status = format!("Processing: {}% done", state.percent);
            state.transcoding = true;
            Vec::new()
        }
        ProgressEvent::Done => {
            monitor_info!("transcoding job finished");
            state.handle = None;
            state.phase = JobPhase::Completed;
            state.transcoding = false;
            state.set_progress(MSG_COMPLETED, 100.0);
            let mut effects = Vec::with_capacity(3);
            release_connection(state, &mut effects);
            effects.push(Effect::ClearHandle);
            effects
        }
        ProgressEvent::Error { percent, message } => {
            let Some(job_id) = active_job_id(state) else {
                return Vec::new();
            };
            monitor_warn!(
                "transcoding job {} failed at {}%: {}",
                job_id,
                percent,
                message.as_deref().unwrap_or("no details")
            );
            state.phase = JobPhase::Failed;
            state.transcoding = false;
            state.server_error = true;
            state.error_message = message;
            state.set_progress(MSG_FAILED, percent);
            state.pending_cleanup = Some(job_id.clone());
            let mut effects = Vec::with_capacity(3);
            release_connection(state, &mut effects);
            effects.push(Effect::DeleteArtifact {
                file_name: job_id.artifact_file_name(),
                job_id,
                reason: CleanupReason::JobFailed,
            });
            effects
        }
    }
}

fn active_job_id(state: &MonitorState) -> Option<crate::JobId> {
    state.handle.as_ref().map(|handle| handle.job_id().clone())
}

fn is_current(state: &MonitorState, session: StreamSession) -> bool {
    state.stream_open && session == state.session
}

/// Opens a fresh stream session for the tracked handle.
fn open_stream(state: &mut MonitorState, effects: &mut Vec<Effect>) {
    let Some(job_id) = active_job_id(state) else {
        return;
    };
    if state.stream_open {
        effects.push(Effect::CloseStream);
    }
    state.session = state.session.next();
    state.stream_open = true;
    state.supervisor.stream_opening();
    state.percent = 0;
    effects.push(Effect::OpenStream {
        session: state.session,
        job_id,
    });
}

/// Closes the stream and stops the supervisor, disarming its timer if armed.
fn release_connection(state: &mut MonitorState, effects: &mut Vec<Effect>) {
    if state.stream_open {
        state.stream_open = false;
        effects.push(Effect::CloseStream);
    }
    if state.supervisor.stop() {
        effects.push(Effect::DisarmRetry);
    }
}
