//! Transcode core: pure job-monitor state machine and view-model helpers.
mod connection;
mod effect;
mod event;
mod job;
mod msg;
mod state;
mod supervisor;
mod update;
mod view_model;

pub use connection::{ConnectionEvent, ConnectionState};
pub use effect::{CleanupReason, Effect};
pub use event::{ProgressEvent, StreamSession};
pub use job::{JobHandle, JobId, ParseOptionError, TranscodeOption, TranscodeRequest};
pub use msg::Msg;
pub use state::{JobPhase, MonitorState};
pub use supervisor::{ProbeVerdict, ReconnectSupervisor, RetryEpoch};
pub use update::update;
pub use view_model::MonitorView;
