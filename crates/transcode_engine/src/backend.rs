use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use monitor_logging::{monitor_debug, monitor_warn};
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use transcode_core::{JobId, TranscodeRequest};
use url::Url;

use crate::sse::{decode_progress_data, SseDecoder, DEFAULT_MAX_EVENT_BYTES};
use crate::{BackendError, FailureKind, StreamSignal};

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applies to health checks, cancel and delete calls.
    pub request_timeout: Duration,
    /// Applies to the multipart upload.
    pub upload_timeout: Duration,
    /// Largest single event accepted on the progress stream.
    pub max_event_bytes: usize,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(30 * 60),
            max_event_bytes: DEFAULT_MAX_EVENT_BYTES,
        }
    }
}

/// The remote transcoding service, as seen by the job monitor.
#[async_trait::async_trait]
pub trait TranscodeBackend: Send + Sync {
    /// Uploads the file and returns the id of the accepted job.
    async fn submit(&self, request: &TranscodeRequest) -> Result<JobId, BackendError>;

    /// Liveness probe. `Ok` means the backend answered with a 2xx status.
    async fn health_check(&self) -> Result<(), BackendError>;

    /// Asks the backend to stop the job. Returns the server's message.
    async fn cancel(&self, job_id: &JobId) -> Result<String, BackendError>;

    /// Best-effort removal of an output file.
    async fn delete_artifact(&self, file_name: &str) -> Result<(), BackendError>;

    /// Lazily connects to the job's progress stream. Connection failures surface as
    /// [`StreamSignal::Lost`]; the sequence ends after it.
    fn progress(&self, job_id: &JobId) -> BoxStream<'static, StreamSignal>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    transcoding_job_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelBody<'a> {
    transcoding_job_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    base: Url,
    client: reqwest::Client,
    stream_client: reqwest::Client,
    settings: BackendSettings,
}

impl ReqwestBackend {
    pub fn new(settings: BackendSettings) -> Result<Self, BackendError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|err| BackendError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::new(
                FailureKind::InvalidUrl,
                format!("{base} cannot be used as a base url"),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| BackendError::new(FailureKind::Network, err.to_string()))?;
        // The progress stream stays open for the whole job, so it gets no overall timeout.
        let stream_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| BackendError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            base,
            client,
            stream_client,
            settings,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn progress_url(&self, job_id: &JobId) -> Url {
        let mut url = self.endpoint(&["video", "progress"]);
        url.query_pairs_mut().append_pair("jobId", job_id.as_str());
        url
    }
}

#[async_trait::async_trait]
impl TranscodeBackend for ReqwestBackend {
    async fn submit(&self, request: &TranscodeRequest) -> Result<JobId, BackendError> {
        let path = &request.file_path;
        let io_error =
            |err: std::io::Error| BackendError::new(FailureKind::Io, format!("{}: {err}", path.display()));
        let file = tokio::fs::File::open(path).await.map_err(io_error)?;
        let length = file.metadata().await.map_err(io_error)?.len();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("video")
            .to_string();

        let mut form = Form::new()
            .part(
                "video",
                // Streamed from disk; videos are routinely larger than memory allows.
                Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
                    .file_name(file_name),
            )
            .text("transcodingOption", request.option.as_str());
        if let Some(user_id) = &request.user_id {
            form = form.text("userId", user_id.clone());
        }

        let response = self
            .client
            .post(self.endpoint(&["video", "transcoding"]))
            .timeout(self.settings.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body: SubmitResponse = read_json(response).await?;
        JobId::new(&body.transcoding_job_id).ok_or_else(|| {
            BackendError::new(FailureKind::Decode, "backend returned an empty job id")
        })
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .get(self.endpoint(&["video", "health-check"]))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response).await.map(|_| ())
    }

    async fn cancel(&self, job_id: &JobId) -> Result<String, BackendError> {
        let response = self
            .client
            .delete(self.endpoint(&["video", "cancel-transcoding"]))
            .json(&CancelBody {
                transcoding_job_id: job_id.as_str(),
            })
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body: MessageBody = read_json(response).await?;
        Ok(body
            .message
            .unwrap_or_else(|| "Transcoding cancelled.".to_string()))
    }

    async fn delete_artifact(&self, file_name: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.endpoint(&["video", file_name]))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response).await.map(|_| ())
    }

    fn progress(&self, job_id: &JobId) -> BoxStream<'static, StreamSignal> {
        let request = self
            .stream_client
            .get(self.progress_url(job_id))
            .header(ACCEPT, "text/event-stream");
        progress_signals(request, self.settings.max_event_bytes).boxed()
    }
}

enum SseState {
    Connect(RequestBuilder),
    Reading {
        body: BoxStream<'static, reqwest::Result<Bytes>>,
        decoder: SseDecoder,
        pending: VecDeque<StreamSignal>,
    },
    Finished,
}

/// Turns one event-stream request into signals: `Opened`, events, then a final `Lost`.
fn progress_signals(
    request: RequestBuilder,
    max_event_bytes: usize,
) -> impl futures_util::Stream<Item = StreamSignal> {
    stream::unfold(SseState::Connect(request), move |mut state| async move {
        loop {
            match state {
                SseState::Connect(request) => {
                    let response = match request.send().await {
                        Ok(response) => response,
                        Err(err) => return Some((lost(map_reqwest_error(err)), SseState::Finished)),
                    };
                    let status = response.status();
                    if !status.is_success() {
                        let err = BackendError::new(
                            FailureKind::HttpStatus(status.as_u16()),
                            status.to_string(),
                        );
                        return Some((lost(err), SseState::Finished));
                    }
                    let next = SseState::Reading {
                        body: response.bytes_stream().boxed(),
                        decoder: SseDecoder::with_max_event_bytes(max_event_bytes),
                        pending: VecDeque::new(),
                    };
                    return Some((StreamSignal::Opened, next));
                }
                SseState::Reading {
                    mut body,
                    mut decoder,
                    mut pending,
                } => {
                    if let Some(signal) = pending.pop_front() {
                        let next = SseState::Reading {
                            body,
                            decoder,
                            pending,
                        };
                        return Some((signal, next));
                    }
                    match body.next().await {
                        Some(Ok(chunk)) => {
                            let payloads = match decoder.push(&chunk) {
                                Ok(payloads) => payloads,
                                Err(err) => {
                                    let err = BackendError::new(FailureKind::Decode, err.to_string());
                                    return Some((lost(err), SseState::Finished));
                                }
                            };
                            for payload in payloads {
                                match decode_progress_data(&payload) {
                                    Ok(event) => pending.push_back(StreamSignal::Event(event)),
                                    Err(err) => {
                                        monitor_warn!("skipping progress event {:?}: {}", payload, err)
                                    }
                                }
                            }
                            state = SseState::Reading {
                                body,
                                decoder,
                                pending,
                            };
                        }
                        Some(Err(err)) => {
                            return Some((lost(map_reqwest_error(err)), SseState::Finished))
                        }
                        None => {
                            monitor_debug!("server closed the progress stream");
                            let reason = "server closed the progress stream".to_string();
                            return Some((StreamSignal::Lost { reason }, SseState::Finished));
                        }
                    }
                }
                SseState::Finished => return None,
            }
        }
    })
}

fn lost(err: BackendError) -> StreamSignal {
    StreamSignal::Lost {
        reason: err.to_string(),
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    // Prefer the server's own explanation when the error body carries one.
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageBody>(&text)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| status.to_string());
    Err(BackendError::new(
        FailureKind::HttpStatus(status.as_u16()),
        message,
    ))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|err| BackendError::new(FailureKind::Decode, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        return BackendError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return BackendError::new(FailureKind::InvalidUrl, err.to_string());
    }
    BackendError::new(FailureKind::Network, err.to_string())
}
