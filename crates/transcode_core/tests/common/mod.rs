#![allow(dead_code)]

use std::sync::Once;

use transcode_core::{
    update, Effect, JobId, MonitorState, Msg, ProgressEvent, RetryEpoch, StreamSession,
    TranscodeOption, TranscodeRequest,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(monitor_logging::initialize_for_tests);
}

pub fn job(id: &str) -> JobId {
    JobId::new(id).expect("valid job id")
}

pub fn request() -> TranscodeRequest {
    TranscodeRequest::new("clip.mov", TranscodeOption::FullHdH264).with_user_id("user-1")
}

/// Submits a request and lets the backend accept it as `id`.
pub fn running_job(id: &str) -> (MonitorState, StreamSession) {
    let (state, _) = update(MonitorState::new(), Msg::SubmitRequested(request()));
    let (state, effects) = update(state, Msg::SubmitAccepted { job_id: job(id) });
    let session = opened_session(&effects).expect("stream opened");
    let (state, _) = update(state, Msg::StreamOpened { session });
    (state, session)
}

pub fn opened_session(effects: &[Effect]) -> Option<StreamSession> {
    effects.iter().find_map(|effect| match effect {
        Effect::OpenStream { session, .. } => Some(*session),
        _ => None,
    })
}

pub fn armed_epoch(effects: &[Effect]) -> Option<RetryEpoch> {
    effects.iter().find_map(|effect| match effect {
        Effect::ArmRetry { epoch } => Some(*epoch),
        _ => None,
    })
}

pub fn progress(state: MonitorState, session: StreamSession, percent: f64) -> MonitorState {
    let (state, _) = update(
        state,
        Msg::StreamEvent {
            session,
            event: ProgressEvent::Progress { percent },
        },
    );
    state
}

/// Drops the stream for `session` and returns the armed retry epoch.
pub fn lose_connection(state: MonitorState, session: StreamSession) -> (MonitorState, RetryEpoch) {
    let (state, effects) = update(
        state,
        Msg::StreamLost {
            session,
            reason: "connection reset".to_string(),
        },
    );
    let epoch = armed_epoch(&effects).expect("retry armed");
    (state, epoch)
}

pub fn count_deletes(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|effect| matches!(effect, Effect::DeleteArtifact { .. }))
        .count()
}
