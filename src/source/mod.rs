//! Reading sources. Dropping a receiver ends its subscription.

pub mod iio;
pub mod push;
pub mod simulated;

use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::error::{SensorError, SensorResult};
use crate::sensor::{Cadence, SensorDescriptor, SensorKind, SensorReading, TrackedKind};

pub use iio::IioSource;
pub use push::PushSource;
pub use simulated::SimulatedSource;

pub type ReadingReceiver = mpsc::Receiver<SensorReading>;

/// Per-subscription channel depth. Samples beyond this are dropped.
pub const CHANNEL_CAPACITY: usize = 64;

/// Floor for polled sources so `Cadence::Fastest` does not spin
pub const MIN_POLL_PERIOD: Duration = Duration::from_millis(5);

pub trait ReadingSource: Send + Sync {
    /// Every sensor the host exposes, in host order
    fn discover(&self) -> Vec<SensorDescriptor>;

    /// The host's default sensor for `kind`
    fn resolve(&self, kind: TrackedKind) -> Option<SensorDescriptor> {
        let kind = SensorKind::from(kind);
        self.discover().into_iter().find(|d| d.kind == kind)
    }

    /// Start delivering readings for `descriptor` at roughly `cadence`
    fn open(&self, descriptor: &SensorDescriptor, cadence: Cadence)
        -> SensorResult<ReadingReceiver>;
}

impl<S: ReadingSource + ?Sized> ReadingSource for Arc<S> {
    fn discover(&self) -> Vec<SensorDescriptor> {
        (**self).discover()
    }

    fn resolve(&self, kind: TrackedKind) -> Option<SensorDescriptor> {
        (**self).resolve(kind)
    }

    fn open(
        &self,
        descriptor: &SensorDescriptor,
        cadence: Cadence,
    ) -> SensorResult<ReadingReceiver> {
        (**self).open(descriptor, cadence)
    }
}

impl<S: ReadingSource + ?Sized> ReadingSource for Box<S> {
    fn discover(&self) -> Vec<SensorDescriptor> {
        (**self).discover()
    }

    fn resolve(&self, kind: TrackedKind) -> Option<SensorDescriptor> {
        (**self).resolve(kind)
    }

    fn open(
        &self,
        descriptor: &SensorDescriptor,
        cadence: Cadence,
    ) -> SensorResult<ReadingReceiver> {
        (**self).open(descriptor, cadence)
    }
}

/// Spawn a producer that calls `sample` once per tick and forwards the result.
///
/// The task ends as soon as the receiving side is dropped.
pub(crate) fn spawn_poll_loop<F>(
    label: String,
    period: Duration,
    sample: F,
) -> SensorResult<ReadingReceiver>
where
    F: FnMut() -> Option<SensorReading> + Send + 'static,
{
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| SensorError::SourceUnavailable(format!("no tokio runtime: {}", e)))?;
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    runtime.spawn(poll_loop(label, period.max(MIN_POLL_PERIOD), tx, sample));
    Ok(rx)
}

async fn poll_loop<F>(label: String, period: Duration, tx: mpsc::Sender<SensorReading>, mut sample: F)
where
    F: FnMut() -> Option<SensorReading>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sample_count = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tx.closed() => break,
        }

        let Some(reading) = sample() else {
            continue;
        };

        match tx.try_send(reading) {
            Ok(_) => {
                sample_count += 1;
                if sample_count % 100 == 0 {
                    log::debug!("[{}] {} samples", label, sample_count);
                }
            }
            Err(TrySendError::Closed(_)) => break,
            Err(TrySendError::Full(_)) => {
                // Channel full, drop this sample
            }
        }
    }

    log::debug!("[{}] Subscription closed after {} samples", label, sample_count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_poll_loop_stops_when_receiver_dropped() {
        // The sender lives inside the producer closure, so it drops with the task
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let mut rx = spawn_poll_loop("test".into(), Duration::from_millis(5), move || {
            let _alive = &done_tx;
            Some(SensorReading::new(SensorKind::Light, vec![1.0]))
        })
        .unwrap();

        assert!(rx.recv().await.is_some());
        drop(rx);

        let closed = tokio::time::timeout(Duration::from_secs(1), done_rx).await;
        assert!(matches!(closed, Ok(Err(_))));
    }

    #[test]
    fn test_spawn_requires_runtime() {
        let result = spawn_poll_loop("orphan".into(), Duration::from_millis(5), || None);
        assert!(matches!(result, Err(SensorError::SourceUnavailable(_))));
    }
}
