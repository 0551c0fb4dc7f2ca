use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use transcode_core::{
    ConnectionState, JobHandle, JobId, JobPhase, MonitorView, TranscodeOption, TranscodeRequest,
};
use transcode_engine::{
    BackendSettings, FileHandleStore, HandleStore, JobMonitor, MonitorHandle, MonitorSettings,
    ReqwestBackend, TranscodeBackend,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(10);

struct Harness {
    server: MockServer,
    temp: TempDir,
    monitor: MonitorHandle,
}

impl Harness {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();
        let monitor = spawn_monitor(&server, &temp);
        Self {
            server,
            temp,
            monitor,
        }
    }

    fn store(&self) -> FileHandleStore {
        FileHandleStore::new(self.temp.path().join("state"))
    }

    fn video(&self) -> PathBuf {
        let file = self.temp.path().join("clip.mov");
        std::fs::write(&file, b"fake video bytes").unwrap();
        file
    }

    fn submit(&self) {
        let request = TranscodeRequest::new(self.video(), TranscodeOption::FullHdH264);
        self.monitor.start(request);
    }

    async fn wait_for(&self, predicate: impl FnMut(&MonitorView) -> bool) -> MonitorView {
        tokio::time::timeout(WAIT, self.monitor.wait_for(predicate))
            .await
            .expect("view did not reach the expected state in time")
            .expect("monitor stopped")
    }

    async fn requests_to(&self, verb: &str, target: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.method.as_str() == verb && request.url.path() == target)
            .count()
    }

    /// Polls until at least `count` matching requests arrived.
    async fn await_requests(&self, verb: &str, target: &str, count: usize) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while self.requests_to(verb, target).await < count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {count} {verb} {target}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

fn spawn_monitor(server: &MockServer, temp: &TempDir) -> MonitorHandle {
    let backend: Arc<dyn TranscodeBackend> = Arc::new(
        ReqwestBackend::new(BackendSettings {
            base_url: server.uri(),
            ..BackendSettings::default()
        })
        .expect("backend"),
    );
    let store = FileHandleStore::new(temp.path().join("state"));
    JobMonitor::spawn(
        backend,
        Box::new(store),
        MonitorSettings {
            retry_interval: Duration::from_millis(50),
        },
    )
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream")
}

async fn accept_upload(server: &MockServer, job_id: &str) {
    Mock::given(method("POST"))
        .and(path("/video/transcoding"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transcodingJobId": job_id
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn job_survives_a_dropped_connection_and_completes() {
    let harness = Harness::start().await;
    accept_upload(&harness.server, "abc123").await;
    Mock::given(method("GET"))
        .and(path("/video/progress"))
        .and(query_param("jobId", "abc123"))
        .respond_with(sse("data: {\"percent\": 10}\n\ndata: {\"percent\": 55}\n\n"))
        .up_to_n_times(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/progress"))
        .and(query_param("jobId", "abc123"))
        .respond_with(sse("data: {\"percent\": 80}\n\ndata: {\"done\": true}\n\n"))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/health-check"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/health-check"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&harness.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/video/abc123.mp4"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&harness.server)
        .await;

    harness.submit();

    let done = harness
        .wait_for(|view| view.phase == JobPhase::Completed)
        .await;
    assert_eq!(done.status, "Transcoding completed!");
    assert_eq!(done.percent, 100);
    assert_eq!(done.job_id, None);
    assert_eq!(done.connection, ConnectionState::Disconnected);
    assert!(!done.server_error);
    assert!(!done.can_cancel);

    harness.await_requests("DELETE", "/video/abc123.mp4", 1).await;
    assert_eq!(harness.requests_to("GET", "/video/health-check").await, 3);
    assert_eq!(harness.requests_to("GET", "/video/progress").await, 2);
    assert_eq!(harness.requests_to("POST", "/video/transcoding").await, 1);
    assert_eq!(harness.store().load(), None);
}

#[tokio::test]
async fn persisted_job_is_resumed_without_resubmitting() {
    let harness = Harness::start().await;
    harness
        .store()
        .save(&JobHandle::new(JobId::new("abc123").unwrap()))
        .unwrap();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/progress"))
        .and(query_param("jobId", "abc123"))
        .respond_with(sse("data: {\"percent\": 40}\n\ndata: {\"done\": true}\n\n"))
        .mount(&harness.server)
        .await;

    harness.monitor.resume();

    let done = harness
        .wait_for(|view| view.phase == JobPhase::Completed)
        .await;
    assert_eq!(done.status, "Transcoding completed!");
    assert_eq!(harness.store().load(), None);
}

#[tokio::test]
async fn resume_without_persisted_job_stays_idle() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    harness.monitor.resume();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let view = harness.monitor.view();
    assert_eq!(view.phase, JobPhase::Idle);
    assert_eq!(view.job_id, None);
}

#[tokio::test]
async fn cancel_during_recovery_stops_probing() {
    let harness = Harness::start().await;
    accept_upload(&harness.server, "abc123").await;
    Mock::given(method("GET"))
        .and(path("/video/progress"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/health-check"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&harness.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/video/cancel-transcoding"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Transcoding job cancelled"
        })))
        .expect(1)
        .mount(&harness.server)
        .await;

    harness.submit();
    harness.wait_for(|view| view.failed_probes >= 1).await;

    harness.monitor.cancel();
    let cancelled = harness
        .wait_for(|view| view.phase == JobPhase::Cancelled)
        .await;
    assert_eq!(cancelled.status, "Transcoding job cancelled");
    assert_eq!(cancelled.percent, 0);
    assert_eq!(cancelled.connection, ConnectionState::GaveUp);
    assert_eq!(cancelled.connection_status, "Reconnection stopped.");
    assert_eq!(harness.store().load(), None);

    // A probe already in flight at cancel time may still land.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let probes = harness.requests_to("GET", "/video/health-check").await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(harness.requests_to("GET", "/video/health-check").await, probes);
}

#[tokio::test]
async fn second_cancel_while_pending_is_ignored() {
    let harness = Harness::start().await;
    accept_upload(&harness.server, "abc123").await;
    Mock::given(method("GET"))
        .and(path("/video/progress"))
        .respond_with(sse("data: {\"percent\": 5}\n\n").set_delay(Duration::from_secs(5)))
        .mount(&harness.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/video/cancel-transcoding"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": "Transcoding job cancelled" }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&harness.server)
        .await;

    harness.submit();
    harness.wait_for(|view| view.can_cancel).await;

    harness.monitor.cancel();
    harness.monitor.cancel();

    harness
        .wait_for(|view| view.phase == JobPhase::Cancelled)
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        harness.requests_to("DELETE", "/video/cancel-transcoding").await,
        1
    );
}

#[tokio::test]
async fn failed_cancel_keeps_watching_the_job() {
    let harness = Harness::start().await;
    accept_upload(&harness.server, "abc123").await;
    Mock::given(method("GET"))
        .and(path("/video/progress"))
        .respond_with(sse("data: {\"percent\": 5}\n\n").set_delay(Duration::from_secs(5)))
        .mount(&harness.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/video/cancel-transcoding"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Job not found"
        })))
        .mount(&harness.server)
        .await;

    harness.submit();
    harness.wait_for(|view| view.can_cancel).await;
    harness.monitor.cancel();

    let view = harness.wait_for(|view| view.error_message.is_some()).await;
    assert_eq!(
        view.error_message.as_deref(),
        Some("Error canceling transcoding: Job not found")
    );
    assert_eq!(view.phase, JobPhase::Running);
    assert_eq!(view.job_id, JobId::new("abc123"));
    harness.await_requests("GET", "/video/progress", 2).await;
    assert!(harness.store().load().is_some());
}

#[tokio::test]
async fn backend_error_deletes_output_once_and_forgets_job() {
    let harness = Harness::start().await;
    accept_upload(&harness.server, "abc123").await;
    Mock::given(method("GET"))
        .and(path("/video/progress"))
        .respond_with(sse(
            "data: {\"percent\": 30}\n\ndata: {\"error\": true, \"percent\": 30, \"message\": \"ffmpeg exited\"}\n\n",
        ))
        .mount(&harness.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/video/abc123.mp4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.server)
        .await;

    harness.submit();

    let failed = harness
        .wait_for(|view| view.phase == JobPhase::Failed && view.job_id.is_none())
        .await;
    assert!(failed.job_failed);
    assert!(failed.server_error);
    assert_eq!(failed.status, "Error during transcoding");
    assert_eq!(failed.percent, 30);
    assert_eq!(failed.error_message.as_deref(), Some("ffmpeg exited"));
    assert_eq!(harness.store().load(), None);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.requests_to("DELETE", "/video/abc123.mp4").await, 1);
    assert_eq!(harness.requests_to("GET", "/video/health-check").await, 0);
}

#[tokio::test]
async fn rejected_upload_reports_server_message() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/video/transcoding"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "Unsupported format"
        })))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/progress"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    harness.submit();

    let view = harness.wait_for(|view| view.error_message.is_some()).await;
    assert_eq!(
        view.error_message.as_deref(),
        Some("Error uploading video: Unsupported format")
    );
    assert_eq!(view.phase, JobPhase::Idle);
    assert!(!view.transcoding);
    assert_eq!(harness.store().load(), None);
}

#[tokio::test]
async fn shutdown_keeps_the_handle_for_a_later_resume() {
    let harness = Harness::start().await;
    accept_upload(&harness.server, "abc123").await;
    Mock::given(method("GET"))
        .and(path("/video/progress"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/health-check"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&harness.server)
        .await;

    harness.submit();
    harness
        .wait_for(|view| view.connection.is_recovering())
        .await;

    let Harness {
        server,
        temp,
        monitor,
    } = harness;
    monitor.shutdown().await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    let probes = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/video/health-check")
        .count();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let later = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/video/health-check")
        .count();
    assert_eq!(later, probes);

    let store = FileHandleStore::new(temp.path().join("state"));
    assert_eq!(
        store.load(),
        Some(JobHandle::new(JobId::new("abc123").unwrap()))
    );
}
