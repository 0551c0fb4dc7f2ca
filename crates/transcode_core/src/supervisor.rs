use monitor_logging::monitor_debug;

use crate::{ConnectionEvent, ConnectionState};

/// Identifies one armed retry timer. Ticks and probe results from an older epoch are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RetryEpoch(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// Backend reachable again; the timer must be disarmed.
    Recovered,
    /// Backend still down; keep the timer armed.
    StillDown,
    /// Result belongs to a timer that is no longer armed.
    Stale,
}

/// Retry policy for a lost progress connection.
///
/// The supervisor only decides. Arming the timer and running the probe are effects
/// executed by the runtime. Retries are unbounded: a failed probe never moves the
/// supervisor closer to giving up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconnectSupervisor {
    state: ConnectionState,
    epoch: RetryEpoch,
    armed: bool,
    probe_in_flight: bool,
    failed_probes: u64,
}

impl ReconnectSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn epoch(&self) -> RetryEpoch {
        self.epoch
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Failed probes in the current recovery cycle. Informational only.
    pub fn failed_probes(&self) -> u64 {
        self.failed_probes
    }

    fn apply(&mut self, event: ConnectionEvent) -> bool {
        match self.state.on(event) {
            Some(next) => {
                if next != self.state {
                    monitor_debug!("connection {:?} -> {:?} on {:?}", self.state, next, event);
                }
                self.state = next;
                true
            }
            None => {
                monitor_debug!("connection ignored {:?} while {:?}", event, self.state);
                false
            }
        }
    }

    pub fn stream_opening(&mut self) -> bool {
        self.apply(ConnectionEvent::Open)
    }

    pub fn stream_opened(&mut self) -> bool {
        self.apply(ConnectionEvent::Opened)
    }

    /// Handles a failed stream. Returns the epoch of the timer to arm, or `None` when
    /// the loss does not apply (already recovering, or nothing was connected).
    pub fn connection_lost(&mut self) -> Option<RetryEpoch> {
        if !self.apply(ConnectionEvent::StreamFailed) {
            return None;
        }
        self.epoch = RetryEpoch(self.epoch.0 + 1);
        self.armed = true;
        self.probe_in_flight = false;
        self.failed_probes = 0;
        Some(self.epoch)
    }

    /// Returns true when this tick should start a liveness probe.
    ///
    /// A tick is skipped while a previous probe is still in flight.
    pub fn tick(&mut self, epoch: RetryEpoch) -> bool {
        if !self.armed || epoch != self.epoch || self.probe_in_flight {
            return false;
        }
        if !self.apply(ConnectionEvent::ProbeStarted) {
            return false;
        }
        self.probe_in_flight = true;
        true
    }

    pub fn probe_finished(&mut self, epoch: RetryEpoch, reachable: bool) -> ProbeVerdict {
        if !self.armed || epoch != self.epoch || !self.probe_in_flight {
            return ProbeVerdict::Stale;
        }
        self.probe_in_flight = false;
        if reachable {
            self.apply(ConnectionEvent::ProbeSucceeded);
            self.armed = false;
            ProbeVerdict::Recovered
        } else {
            self.apply(ConnectionEvent::ProbeFailed);
            self.failed_probes += 1;
            ProbeVerdict::StillDown
        }
    }

    /// Stops supervision and closes the connection state.
    ///
    /// Returns true if a retry timer was armed and must be disarmed by the caller.
    pub fn stop(&mut self) -> bool {
        let was_armed = self.armed;
        self.armed = false;
        self.probe_in_flight = false;
        if self.state.is_recovering() {
            self.apply(ConnectionEvent::Abandon);
        } else {
            self.apply(ConnectionEvent::Close);
        }
        was_armed
    }
}
