use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use transcode_core::RetryEpoch;

/// Shortest period a timer will run at; a zero period would spin.
const MIN_PERIOD: Duration = Duration::from_millis(10);

pub trait TickSink: Send + Sync {
    fn tick(&self, epoch: RetryEpoch);
}

/// Fixed-interval retry timer. The first tick fires one full interval after arming.
///
/// Dropping the timer disarms it.
pub struct RetryTimer {
    epoch: RetryEpoch,
    task: Option<JoinHandle<()>>,
}

impl RetryTimer {
    pub fn arm(interval: Duration, epoch: RetryEpoch, sink: Arc<dyn TickSink>) -> Self {
        let period = interval.max(MIN_PERIOD);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                sink.tick(epoch);
            }
        });
        Self {
            epoch,
            task: Some(task),
        }
    }

    pub fn epoch(&self) -> RetryEpoch {
        self.epoch
    }

    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    /// Idempotent.
    pub fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
