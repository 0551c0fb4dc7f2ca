use transcode_core::{JobPhase, MonitorView};

/// How a command ended, derived from the monitor view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Completed,
    Cancelled,
    Failed(String),
}

/// Which terminal states end the current command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Goal {
    /// Follow the job until the backend finishes it (submit, watch).
    Finish,
    /// Stop once a cancel request was answered.
    Cancel,
}

pub(crate) fn outcome(goal: Goal, view: &MonitorView) -> Option<Outcome> {
    if goal == Goal::Cancel && view.phase == JobPhase::Running {
        return view.error_message.clone().map(Outcome::Failed);
    }
    // A failed job stays unsettled until its orphaned output is cleaned up.
    if !view.is_settled() {
        return None;
    }
    match view.phase {
        JobPhase::Completed => Some(Outcome::Completed),
        JobPhase::Cancelled => Some(Outcome::Cancelled),
        JobPhase::Failed => Some(Outcome::Failed(
            view.error_message
                .clone()
                .unwrap_or_else(|| view.status.clone()),
        )),
        _ => view.error_message.clone().map(Outcome::Failed),
    }
}

/// Turns successive views into the lines worth printing.
///
/// Only fields that changed since the previous view produce output, so a watch
/// loop stays quiet while nothing happens.
#[derive(Debug, Default)]
pub(crate) struct Renderer {
    last: Option<MonitorView>,
}

impl Renderer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn render(&mut self, view: &MonitorView) -> Vec<String> {
        let previous = self.last.take().unwrap_or_default();
        let mut lines = Vec::new();

        if view.job_id != previous.job_id {
            if let Some(job_id) = &view.job_id {
                lines.push(format!("Job: {job_id}"));
            }
        }
        if view.status != previous.status && !view.status.is_empty() {
            lines.push(view.status.clone());
        }
        if view.connection_status != previous.connection_status
            && !view.connection_status.is_empty()
        {
            lines.push(format!("[{}]", view.connection_status));
        }
        if view.server_alive_message != previous.server_alive_message {
            if let Some(message) = &view.server_alive_message {
                lines.push(message.clone());
            }
        }
        if view.error_message != previous.error_message {
            if let Some(message) = &view.error_message {
                lines.push(format!("Error: {message}"));
            }
        }

        self.last = Some(view.clone());
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use transcode_core::{ConnectionState, JobId};

    fn running(percent: u8) -> MonitorView {
        MonitorView {
            phase: JobPhase::Running,
            job_id: JobId::new("abc123"),
            percent,
            status: format!("Processing: {percent}% done"),
            connection: ConnectionState::Connected,
            connection_status: "Connected".to_string(),
            ..MonitorView::default()
        }
    }

    #[test]
    fn first_view_prints_job_and_status() {
        let mut renderer = Renderer::new();
        assert_eq!(
            renderer.render(&running(10)),
            vec![
                "Job: abc123".to_string(),
                "Processing: 10% done".to_string(),
                "[Connected]".to_string(),
            ]
        );
    }

    #[test]
    fn unchanged_fields_are_not_repeated() {
        let mut renderer = Renderer::new();
        renderer.render(&running(10));
        assert_eq!(
            renderer.render(&running(55)),
            vec!["Processing: 55% done".to_string()]
        );
        assert!(renderer.render(&running(55)).is_empty());
    }

    #[test]
    fn connection_loss_and_recovery_are_reported() {
        let mut renderer = Renderer::new();
        renderer.render(&running(55));

        let lost = MonitorView {
            connection: ConnectionState::Lost,
            connection_status: "Connection lost. Reconnecting...".to_string(),
            server_error: true,
            ..running(55)
        };
        assert_eq!(
            renderer.render(&lost),
            vec!["[Connection lost. Reconnecting...]".to_string()]
        );

        let back = MonitorView {
            server_alive_message: Some("Server is live again! Reconnecting...".to_string()),
            ..running(55)
        };
        assert_eq!(
            renderer.render(&back),
            vec![
                "[Connected]".to_string(),
                "Server is live again! Reconnecting...".to_string(),
            ]
        );
    }

    #[test]
    fn outcome_follows_phase() {
        let completed = MonitorView {
            phase: JobPhase::Completed,
            ..MonitorView::default()
        };
        assert_eq!(outcome(Goal::Finish, &completed), Some(Outcome::Completed));

        let failed_pending_cleanup = MonitorView {
            phase: JobPhase::Failed,
            job_id: JobId::new("abc123"),
            error_message: Some("ffmpeg exited".to_string()),
            ..MonitorView::default()
        };
        assert_eq!(outcome(Goal::Finish, &failed_pending_cleanup), None);

        let failed = MonitorView {
            job_id: None,
            ..failed_pending_cleanup
        };
        assert_eq!(
            outcome(Goal::Finish, &failed),
            Some(Outcome::Failed("ffmpeg exited".to_string()))
        );

        let rejected = MonitorView {
            error_message: Some("Error uploading video: Unsupported format".to_string()),
            ..MonitorView::default()
        };
        assert_eq!(
            outcome(Goal::Finish, &rejected),
            Some(Outcome::Failed(
                "Error uploading video: Unsupported format".to_string()
            ))
        );

        let idle_with_job = MonitorView {
            job_id: JobId::new("abc123"),
            ..rejected
        };
        assert!(!idle_with_job.is_settled());
        assert_eq!(outcome(Goal::Finish, &idle_with_job), None);
    }

    #[test]
    fn cancel_failure_ends_only_the_cancel_command() {
        let view = MonitorView {
            error_message: Some("Error canceling transcoding: Job not found".to_string()),
            ..running(40)
        };
        assert_eq!(outcome(Goal::Finish, &view), None);
        assert_eq!(
            outcome(Goal::Cancel, &view),
            Some(Outcome::Failed(
                "Error canceling transcoding: Job not found".to_string()
            ))
        );
    }
}
