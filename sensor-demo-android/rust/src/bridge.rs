use lazy_static::lazy_static;
use sensor_demo_rs::view::{unavailable_message, ViewModel};
use sensor_demo_rs::{
    Cadence, LatestReadingStore, PushSource, ReadingSource, SensorDescriptor, SensorKind,
    SensorReading, SubscriptionManager, TrackedKind,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Runtime;

use crate::error::{BResult, BridgeError};

type Manager = SubscriptionManager<Arc<PushSource>>;

/// One activity's worth of sensor state.
///
/// Kotlin registers the device sensors, calls `start`, then forwards
/// `onResume`/`onPause` and every `SensorEvent`.
pub struct SensorBridge {
    // Dropped before the runtime that drives its consumer tasks
    manager: Mutex<Option<Manager>>,
    source: Arc<PushSource>,
    store: LatestReadingStore,
    runtime: Runtime,
}

impl SensorBridge {
    pub fn new() -> BResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("sensor-demo")
            .enable_time()
            .build()
            .map_err(|e| BridgeError::Internal(format!("Failed to build runtime: {}", e)))?;

        Ok(Self {
            manager: Mutex::new(None),
            source: Arc::new(PushSource::new()),
            store: LatestReadingStore::new(),
            runtime,
        })
    }

    fn manager(&self) -> BResult<MutexGuard<'_, Option<Manager>>> {
        self.manager
            .lock()
            .map_err(|_| BridgeError::Internal("Failed to acquire manager lock".to_string()))
    }

    /// Add one entry of `SensorManager.getSensorList(TYPE_ALL)`
    pub fn register_sensor(
        &self,
        name: &str,
        type_code: i32,
        vendor: &str,
        is_default: bool,
    ) -> BResult<()> {
        if self.manager()?.is_some() {
            return Err(BridgeError::AlreadyStarted);
        }

        let id = format!("android:{}", self.source.discover().len());
        let descriptor = SensorDescriptor::new(&id, name, type_code, vendor);
        if is_default {
            self.source.register_default(descriptor);
        } else {
            self.source.register(descriptor);
        }
        Ok(())
    }

    /// Discover and resolve the registered sensors. Call once, after registration.
    pub fn start(&self) -> BResult<()> {
        let mut slot = self.manager()?;
        if slot.is_some() {
            return Err(BridgeError::AlreadyStarted);
        }
        *slot = Some(SubscriptionManager::new(
            self.source.clone(),
            self.store.clone(),
            Cadence::Normal,
        ));
        Ok(())
    }

    pub fn on_resume(&self) -> BResult<()> {
        let mut slot = self.manager()?;
        let manager = slot.as_mut().ok_or(BridgeError::NotStarted)?;
        let _runtime = self.runtime.enter();
        manager.activate()?;
        Ok(())
    }

    pub fn on_pause(&self) -> BResult<()> {
        let mut slot = self.manager()?;
        let manager = slot.as_mut().ok_or(BridgeError::NotStarted)?;
        manager.deactivate();
        Ok(())
    }

    pub fn is_active(&self) -> BResult<bool> {
        Ok(self.manager()?.as_ref().is_some_and(|m| m.is_active()))
    }

    /// Forward one `SensorEvent`. Returns how many subscriptions took it.
    pub fn on_sensor_changed(&self, type_code: i32, values: Vec<f32>, timestamp_ns: i64) -> usize {
        let reading = SensorReading::new(SensorKind::from_type_code(type_code), values)
            .with_timestamp(timestamp_ns as f64 / 1e9);
        self.source.push(reading)
    }

    /// Accuracy changes carry nothing the demo displays
    pub fn on_accuracy_changed(&self, _type_code: i32, _accuracy: i32) {}

    /// Line to render for the tracked kind with this platform type code
    pub fn read_value(&self, type_code: i32) -> BResult<String> {
        let kind = TrackedKind::try_from(SensorKind::from_type_code(type_code)).map_err(|_| {
            BridgeError::InvalidParameters(format!("sensor type {} is not tracked", type_code))
        })?;

        let slot = self.manager()?;
        let Some(manager) = slot.as_ref() else {
            return Ok(unavailable_message(kind).to_string());
        };

        let snapshot = self.store.snapshot();
        let model = ViewModel {
            resolved: manager.resolved(),
            snapshot: &snapshot,
            inventory: manager.inventory(),
        };
        Ok(model.reading_line(kind).to_string())
    }

    pub fn inventory_json(&self) -> BResult<String> {
        serde_json::to_string(&self.source.discover())
            .map_err(|_| BridgeError::Internal("JSON serialization failed".to_string()))
    }

    pub fn store(&self) -> &LatestReadingStore {
        &self.store
    }
}

lazy_static! {
    static ref BRIDGES: Mutex<HashMap<i64, Arc<SensorBridge>>> = Mutex::new(HashMap::new());
}

static NEXT_HANDLE: AtomicI64 = AtomicI64::new(1);

fn bridges() -> BResult<MutexGuard<'static, HashMap<i64, Arc<SensorBridge>>>> {
    BRIDGES
        .lock()
        .map_err(|_| BridgeError::Internal("Failed to acquire bridge registry lock".to_string()))
}

/// Create a bridge and return the handle Kotlin keeps for it
pub fn create_bridge() -> BResult<i64> {
    let bridge = Arc::new(SensorBridge::new()?);
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    bridges()?.insert(handle, bridge);
    Ok(handle)
}

pub fn get_bridge(handle: i64) -> BResult<Arc<SensorBridge>> {
    bridges()?
        .get(&handle)
        .cloned()
        .ok_or(BridgeError::UnknownHandle(handle))
}

/// Returns whether the handle was live
pub fn destroy_bridge(handle: i64) -> BResult<bool> {
    let removed = bridges()?.remove(&handle);
    if let Some(bridge) = &removed {
        bridge.on_pause().ok();
    }
    Ok(removed.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    const TYPE_ACCELEROMETER: i32 = 1;
    const TYPE_MAGNETIC_FIELD: i32 = 2;
    const TYPE_GYROSCOPE: i32 = 4;
    const TYPE_LIGHT: i32 = 5;

    fn wait_for_samples(bridge: &SensorBridge, kind: TrackedKind, count: u64) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while bridge.store().samples(kind) < count {
            assert!(Instant::now() < deadline, "timed out waiting for {} samples", kind);
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn accel_only_bridge() -> SensorBridge {
        let bridge = SensorBridge::new().unwrap();
        bridge
            .register_sensor("BMI160 Accelerometer", TYPE_ACCELEROMETER, "Bosch", true)
            .unwrap();
        bridge
            .register_sensor("AK09918 Magnetometer", TYPE_MAGNETIC_FIELD, "AKM", true)
            .unwrap();
        bridge.start().unwrap();
        bridge
    }

    #[test]
    fn test_lifecycle_and_readings() {
        let bridge = accel_only_bridge();

        assert_eq!(bridge.read_value(TYPE_LIGHT).unwrap(), "Light sensor not available");
        assert_eq!(
            bridge.read_value(TYPE_ACCELEROMETER).unwrap(),
            "Sensor speed not available"
        );

        bridge.on_resume().unwrap();
        assert!(bridge.is_active().unwrap());
        assert_eq!(
            bridge.on_sensor_changed(TYPE_ACCELEROMETER, vec![1.0, 2.0, 3.0], 5_000_000_000),
            1
        );
        wait_for_samples(&bridge, TrackedKind::Accelerometer, 1);

        assert_eq!(
            bridge.read_value(TYPE_ACCELEROMETER).unwrap(),
            "Accelerometer: X=1.0, Y=2.0, Z=3.0"
        );
        assert_eq!(
            bridge.read_value(TYPE_GYROSCOPE).unwrap(),
            "Gyroscope sensor not available"
        );

        bridge.on_pause().unwrap();
        assert!(!bridge.is_active().unwrap());
        assert_eq!(
            bridge.on_sensor_changed(TYPE_ACCELEROMETER, vec![9.0, 9.0, 9.0], 6_000_000_000),
            0
        );
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(bridge.store().samples(TrackedKind::Accelerometer), 1);
    }

    #[test]
    fn test_untracked_events_ignored() {
        let bridge = accel_only_bridge();
        bridge.on_resume().unwrap();
        assert_eq!(bridge.on_sensor_changed(TYPE_MAGNETIC_FIELD, vec![1.0, 1.0, 1.0], 0), 0);
        bridge.on_accuracy_changed(TYPE_ACCELEROMETER, 3);
        assert!(bridge.read_value(TYPE_MAGNETIC_FIELD).is_err());
    }

    #[test]
    fn test_start_rules() {
        let bridge = SensorBridge::new().unwrap();
        assert!(matches!(bridge.on_resume(), Err(BridgeError::NotStarted)));

        bridge.start().unwrap();
        assert!(matches!(bridge.start(), Err(BridgeError::AlreadyStarted)));
        assert!(matches!(
            bridge.register_sensor("Late", TYPE_LIGHT, "X", true),
            Err(BridgeError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_inventory_json() {
        let bridge = accel_only_bridge();
        let json: serde_json::Value = serde_json::from_str(&bridge.inventory_json().unwrap()).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], "BMI160 Accelerometer");
        assert_eq!(entries[1]["type_code"], TYPE_MAGNETIC_FIELD);
        assert_eq!(entries[1]["vendor"], "AKM");
    }

    #[test]
    fn test_handle_registry() {
        let first = create_bridge().unwrap();
        let second = create_bridge().unwrap();
        assert_ne!(first, second);

        get_bridge(first).unwrap().start().unwrap();
        // Instances are independent
        assert!(get_bridge(second).unwrap().start().is_ok());

        assert!(destroy_bridge(first).unwrap());
        assert!(!destroy_bridge(first).unwrap());
        assert!(matches!(get_bridge(first), Err(BridgeError::UnknownHandle(_))));
        assert!(destroy_bridge(second).unwrap());
    }
}
