use std::future::poll_fn;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Poll;
use tokio::task::JoinHandle;

use crate::error::SensorResult;
use crate::sensor::{Cadence, SensorDescriptor, SensorReading, TrackedKind};
use crate::source::{ReadingReceiver, ReadingSource};
use crate::store::LatestReadingStore;

/// Lifecycle state of the manager's subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// No subscriptions open (created, or backgrounded)
    Inactive,
    /// Subscriptions open, readings flow into the store
    Active,
}

/// Applies readings to the store while its activation is open.
///
/// Each activation gets a fresh gate. Closing it under the same lock the
/// handler holds while updating guarantees nothing lands afterwards.
#[derive(Debug, Clone)]
pub struct ReadingHandler {
    store: LatestReadingStore,
    gate: Arc<Mutex<bool>>,
}

impl ReadingHandler {
    pub fn new(store: LatestReadingStore) -> Self {
        Self {
            store,
            gate: Arc::new(Mutex::new(true)),
        }
    }

    fn gate(&self) -> MutexGuard<'_, bool> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dispatch one reading by kind. Returns whether the store changed.
    pub fn on_reading(&self, reading: SensorReading) -> bool {
        let open = self.gate();
        if !*open {
            return false;
        }

        let Ok(kind) = TrackedKind::try_from(reading.kind) else {
            log::trace!("Ignoring reading for untracked sensor kind {:?}", reading.kind);
            return false;
        };

        match self.store.update(kind, &reading.values) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Dropping reading: {}", e);
                false
            }
        }
    }

    pub fn close(&self) {
        *self.gate() = false;
    }

    pub fn is_open(&self) -> bool {
        *self.gate()
    }
}

/// One open subscription. The receiver sits outside the consumer task so
/// closing drops it right away, without waiting for the task to be polled.
#[derive(Debug)]
struct Subscription {
    kind: TrackedKind,
    receiver: Arc<Mutex<Option<ReadingReceiver>>>,
    task: JoinHandle<()>,
}

impl Subscription {
    fn spawn(
        runtime: &tokio::runtime::Handle,
        kind: TrackedKind,
        rx: ReadingReceiver,
        handler: ReadingHandler,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(Some(rx)));
        let slot = receiver.clone();
        let task = runtime.spawn(async move {
            while let Some(reading) = next_reading(&slot).await {
                handler.on_reading(reading);
            }
        });
        Self {
            kind,
            receiver,
            task,
        }
    }

    fn close(self) {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.task.abort();
    }
}

async fn next_reading(slot: &Mutex<Option<ReadingReceiver>>) -> Option<SensorReading> {
    poll_fn(|cx| match slot.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
        Some(rx) => rx.poll_recv(cx),
        None => Poll::Ready(None),
    })
    .await
}

#[derive(Debug)]
struct Activation {
    handler: ReadingHandler,
    subscriptions: Vec<Subscription>,
}

/// Resolved default sensor per tracked kind
#[derive(Debug, Clone, Default)]
pub struct ResolvedSensors {
    slots: [Option<SensorDescriptor>; 3],
}

impl ResolvedSensors {
    pub fn get(&self, kind: TrackedKind) -> Option<&SensorDescriptor> {
        self.slots[kind.index()].as_ref()
    }

    fn set(&mut self, kind: TrackedKind, descriptor: Option<SensorDescriptor>) {
        self.slots[kind.index()] = descriptor;
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackedKind, &SensorDescriptor)> {
        TrackedKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|d| (kind, d)))
    }
}

pub struct SubscriptionManager<S: ReadingSource> {
    source: S,
    store: LatestReadingStore,
    cadence: Cadence,
    inventory: Vec<SensorDescriptor>,
    resolved: ResolvedSensors,
    activation: Option<Activation>,
}

impl<S: ReadingSource> SubscriptionManager<S> {
    /// Discover the inventory and resolve the tracked kinds. Opens nothing.
    pub fn new(source: S, store: LatestReadingStore, cadence: Cadence) -> Self {
        let inventory = source.discover();

        let mut resolved = ResolvedSensors::default();
        for kind in TrackedKind::ALL {
            let descriptor = source.resolve(kind);
            match &descriptor {
                Some(d) => log::info!("Resolved {} sensor: {} ({})", kind, d.name, d.vendor),
                None => log::info!("No {} sensor on this device", kind),
            }
            resolved.set(kind, descriptor);
        }

        log::info!("Discovered {} sensors", inventory.len());

        Self {
            source,
            store,
            cadence,
            inventory,
            resolved,
            activation: None,
        }
    }

    pub fn inventory(&self) -> &[SensorDescriptor] {
        &self.inventory
    }

    pub fn resolved(&self) -> &ResolvedSensors {
        &self.resolved
    }

    pub fn is_available(&self, kind: TrackedKind) -> bool {
        self.resolved.get(kind).is_some()
    }

    pub fn store(&self) -> &LatestReadingStore {
        &self.store
    }

    pub fn state(&self) -> SubscriptionState {
        if self.activation.is_some() {
            SubscriptionState::Active
        } else {
            SubscriptionState::Inactive
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    /// Kinds with an open subscription
    pub fn active_kinds(&self) -> Vec<TrackedKind> {
        self.activation
            .as_ref()
            .map(|a| a.subscriptions.iter().map(|sub| sub.kind).collect())
            .unwrap_or_default()
    }

    /// Open one subscription per resolved sensor. No-op while already active.
    ///
    /// Must be called from within a tokio runtime. A sensor whose
    /// subscription fails to open is logged and skipped.
    pub fn activate(&mut self) -> SensorResult<()> {
        if self.activation.is_some() {
            log::debug!("Subscriptions already active, ignoring activate");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            crate::error::SensorError::SourceUnavailable(format!("no tokio runtime: {}", e))
        })?;

        let handler = ReadingHandler::new(self.store.clone());
        let mut subscriptions = Vec::new();

        for (kind, descriptor) in self.resolved.iter() {
            let rx = match self.source.open(descriptor, self.cadence) {
                Ok(rx) => rx,
                Err(e) => {
                    log::warn!("Failed to subscribe to {} sensor {}: {}", kind, descriptor.name, e);
                    continue;
                }
            };

            log::debug!("Subscribed to {} sensor {} at {:?}", kind, descriptor.name, self.cadence);
            subscriptions.push(Subscription::spawn(&runtime, kind, rx, handler.clone()));
        }

        log::info!("Activated {} sensor subscriptions", subscriptions.len());
        self.activation = Some(Activation {
            handler,
            subscriptions,
        });
        Ok(())
    }

    /// Close every open subscription. Safe to call when inactive.
    ///
    /// Receivers are dropped before this returns, so sources see the
    /// subscriptions as closed immediately.
    pub fn deactivate(&mut self) {
        let Some(activation) = self.activation.take() else {
            return;
        };

        activation.handler.close();
        let count = activation.subscriptions.len();
        for subscription in activation.subscriptions {
            subscription.close();
        }
        log::info!("Deactivated {} sensor subscriptions", count);
    }
}

impl<S: ReadingSource> Drop for SubscriptionManager<S> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl<S: ReadingSource> std::fmt::Debug for SubscriptionManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("cadence", &self.cadence)
            .field("inventory", &self.inventory.len())
            .field("resolved", &self.resolved)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{SensorKind, SensorReading};
    use crate::source::PushSource;
    use crate::store::placeholder;

    #[test]
    fn test_handler_ignores_untracked() {
        let store = LatestReadingStore::new();
        let handler = ReadingHandler::new(store.clone());

        let applied = handler.on_reading(SensorReading::new(SensorKind::Unsupported, vec![1.0]));
        assert!(!applied);
        for kind in TrackedKind::ALL {
            assert_eq!(store.read(kind), placeholder(kind));
        }
    }

    #[test]
    fn test_handler_closed_gate() {
        let store = LatestReadingStore::new();
        let handler = ReadingHandler::new(store.clone());

        assert!(handler.on_reading(SensorReading::new(SensorKind::Light, vec![3.0])));
        handler.close();
        assert!(!handler.is_open());
        assert!(!handler.on_reading(SensorReading::new(SensorKind::Light, vec![4.0])));
        assert_eq!(store.read(TrackedKind::Light), "Light: 3.0");
    }

    #[test]
    fn test_handler_drops_malformed() {
        let store = LatestReadingStore::new();
        let handler = ReadingHandler::new(store.clone());
        let applied = handler.on_reading(SensorReading::new(SensorKind::Accelerometer, vec![1.0]));
        assert!(!applied);
        assert_eq!(store.samples(TrackedKind::Accelerometer), 0);
    }

    #[test]
    fn test_activate_outside_runtime_fails() {
        let source = PushSource::with_sensors(vec![SensorDescriptor::new("l", "L", 5, "V")]);
        let mut manager = SubscriptionManager::new(source, LatestReadingStore::new(), Cadence::Normal);
        assert!(manager.activate().is_err());
        assert!(!manager.is_active());
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let source = Arc::new(PushSource::with_sensors(vec![
            SensorDescriptor::new("l", "L", 5, "V"),
            SensorDescriptor::new("g", "G", 4, "V"),
        ]));
        let mut manager =
            SubscriptionManager::new(source.clone(), LatestReadingStore::new(), Cadence::Normal);

        assert_eq!(manager.state(), SubscriptionState::Inactive);
        assert!(!manager.is_available(TrackedKind::Accelerometer));

        manager.activate().unwrap();
        assert_eq!(manager.state(), SubscriptionState::Active);
        assert_eq!(
            manager.active_kinds(),
            vec![TrackedKind::Light, TrackedKind::Gyroscope]
        );
        assert_eq!(source.open_subscriptions(), 2);

        manager.deactivate();
        assert_eq!(manager.state(), SubscriptionState::Inactive);
        assert!(manager.active_kinds().is_empty());

        // Deactivating twice is harmless
        manager.deactivate();
    }

    #[tokio::test]
    async fn test_deactivate_releases_subscriptions_immediately() {
        let source = Arc::new(PushSource::with_sensors(vec![SensorDescriptor::new(
            "a", "Accel", 1, "V",
        )]));
        let store = LatestReadingStore::new();
        let mut manager = SubscriptionManager::new(source.clone(), store.clone(), Cadence::Normal);

        manager.activate().unwrap();
        assert_eq!(source.open_subscriptions(), 1);

        manager.deactivate();
        // No yield to the runtime in between
        assert_eq!(source.open_subscriptions(), 0);
        let reading = SensorReading::new(SensorKind::Accelerometer, vec![1.0, 2.0, 3.0]);
        assert_eq!(source.push(reading), 0);
        assert_eq!(store.samples(TrackedKind::Accelerometer), 0);
    }
}
