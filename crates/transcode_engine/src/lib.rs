//! Transcode engine: backend IO, progress streaming and the job monitor runtime.
mod backend;
mod monitor;
mod persist;
mod retry;
mod sse;
mod stream;
mod types;

pub use backend::{BackendSettings, ReqwestBackend, TranscodeBackend};
pub use monitor::{JobMonitor, MonitorHandle, MonitorSettings};
pub use persist::{ensure_state_dir, AtomicFileWriter, FileHandleStore, HandleStore, PersistError};
pub use retry::{RetryTimer, TickSink};
pub use sse::{decode_progress_data, DecodeError, SseDecoder, DEFAULT_MAX_EVENT_BYTES};
pub use stream::{ProgressStream, SignalSink};
pub use types::{BackendError, FailureKind, StreamSignal};
