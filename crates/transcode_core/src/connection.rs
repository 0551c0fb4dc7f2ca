/// Health of the progress connection, as tracked by the reconnect supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Lost,
    Reconnecting,
    GaveUp,
}

/// Inputs that drive [`ConnectionState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEvent {
    /// A progress stream is being opened.
    Open,
    /// The stream reported that the server accepted the connection.
    Opened,
    /// The stream failed or the server ended it.
    StreamFailed,
    /// A retry tick started a liveness probe.
    ProbeStarted,
    ProbeFailed,
    ProbeSucceeded,
    /// Recovery was stopped by the owner while still lost.
    Abandon,
    /// The stream was closed on purpose.
    Close,
}

impl ConnectionState {
    /// Transition table. Returns `None` when `event` is not valid in this state.
    pub fn on(self, event: ConnectionEvent) -> Option<ConnectionState> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        match (self, event) {
            (S::Disconnected | S::GaveUp, E::Open) => Some(S::Connecting),
            // Reopening after a successful probe keeps the recovered state.
            (S::Connected, E::Open) => Some(S::Connected),
            (S::Connecting | S::Connected, E::Opened) => Some(S::Connected),
            (S::Connecting | S::Connected, E::StreamFailed) => Some(S::Lost),
            (S::Lost | S::Reconnecting, E::ProbeStarted) => Some(S::Reconnecting),
            (S::Reconnecting, E::ProbeFailed) => Some(S::Reconnecting),
            (S::Reconnecting, E::ProbeSucceeded) => Some(S::Connected),
            (S::Lost | S::Reconnecting, E::Abandon) => Some(S::GaveUp),
            (_, E::Close) => Some(S::Disconnected),
            _ => None,
        }
    }

    /// True while the supervisor owns recovery.
    pub fn is_recovering(self) -> bool {
        matches!(self, ConnectionState::Lost | ConnectionState::Reconnecting)
    }

    pub fn status_text(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Lost | ConnectionState::Reconnecting => {
                "Connection lost. Reconnecting..."
            }
            ConnectionState::GaveUp => "Reconnection stopped.",
        }
    }
}
