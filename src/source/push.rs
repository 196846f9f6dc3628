use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::SensorResult;
use crate::sensor::{Cadence, SensorDescriptor, SensorKind, SensorReading, TrackedKind};
use crate::source::{ReadingReceiver, ReadingSource, CHANNEL_CAPACITY};

/// Source fed from outside: a host callback, a JNI bridge or a test.
///
/// Readings handed to [`PushSource::push`] fan out to every open
/// subscription of the same kind. The cadence hint is left to the feeder.
#[derive(Debug, Default)]
pub struct PushSource {
    sensors: Mutex<Vec<SensorDescriptor>>,
    defaults: Mutex<Vec<SensorDescriptor>>,
    subscribers: Mutex<Vec<(SensorKind, mpsc::Sender<SensorReading>)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PushSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sensors(sensors: Vec<SensorDescriptor>) -> Self {
        Self {
            sensors: Mutex::new(sensors),
            ..Self::default()
        }
    }

    /// Add a sensor to the inventory
    pub fn register(&self, descriptor: SensorDescriptor) {
        lock(&self.sensors).push(descriptor);
    }

    /// Add a sensor and mark it as the host default for its kind
    pub fn register_default(&self, descriptor: SensorDescriptor) {
        let mut defaults = lock(&self.defaults);
        defaults.retain(|d| d.kind != descriptor.kind);
        defaults.push(descriptor.clone());
        drop(defaults);
        self.register(descriptor);
    }

    /// Deliver `reading` to every open subscription of its kind.
    ///
    /// Returns how many subscriptions accepted it.
    pub fn push(&self, reading: SensorReading) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|(_, tx)| !tx.is_closed());

        let mut delivered = 0;
        for (kind, tx) in subscribers.iter() {
            if *kind != reading.kind {
                continue;
            }
            match tx.try_send(reading.clone()) {
                Ok(_) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    log::trace!("Dropping {:?} reading, subscriber is full", kind);
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Number of subscriptions whose receiver is still alive
    pub fn open_subscriptions(&self) -> usize {
        lock(&self.subscribers)
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }
}

impl ReadingSource for PushSource {
    fn discover(&self) -> Vec<SensorDescriptor> {
        lock(&self.sensors).clone()
    }

    fn resolve(&self, kind: TrackedKind) -> Option<SensorDescriptor> {
        let kind = SensorKind::from(kind);
        let explicit = lock(&self.defaults).iter().find(|d| d.kind == kind).cloned();
        explicit.or_else(|| self.discover().into_iter().find(|d| d.kind == kind))
    }

    fn open(
        &self,
        descriptor: &SensorDescriptor,
        _cadence: Cadence,
    ) -> SensorResult<ReadingReceiver> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        lock(&self.subscribers).push((descriptor.kind, tx));
        Ok(rx)
    }
}
