// Latest formatted reading per tracked kind, published through a watch channel

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{SensorError, SensorResult};
use crate::sensor::TrackedKind;

/// Initial entry shown until the first reading of a kind arrives
pub fn placeholder(kind: TrackedKind) -> &'static str {
    match kind {
        TrackedKind::Light => "Sensor light not available",
        TrackedKind::Accelerometer => "Sensor speed not available",
        TrackedKind::Gyroscope => "Sensor gyroscope not available",
    }
}

/// Format axis values into the display string for `kind`.
///
/// Values beyond the kind's axis count are ignored; too few is an error.
pub fn format_reading(kind: TrackedKind, values: &[f32]) -> SensorResult<String> {
    let expected = kind.axis_count();
    if values.len() < expected {
        return Err(SensorError::MalformedReading {
            kind: kind.into(),
            expected,
            got: values.len(),
        });
    }

    let text = match kind {
        TrackedKind::Light => format!("Light: {:?}", values[0]),
        TrackedKind::Accelerometer => format!(
            "Accelerometer: X={:?}, Y={:?}, Z={:?}",
            values[0], values[1], values[2]
        ),
        TrackedKind::Gyroscope => format!(
            "Gyroscope: X={:?}, Y={:?}, Z={:?}",
            values[0], values[1], values[2]
        ),
    };
    Ok(text)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingEntry {
    pub display: String,
    /// Readings applied to this entry since the store was created
    pub samples: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReadingEntry {
    fn placeholder(kind: TrackedKind) -> Self {
        Self {
            display: placeholder(kind).to_string(),
            samples: 0,
            updated_at: None,
        }
    }

    pub fn has_reading(&self) -> bool {
        self.samples > 0
    }
}

/// Consistent copy of every entry at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    entries: [ReadingEntry; 3],
}

impl StoreSnapshot {
    fn new() -> Self {
        Self {
            entries: TrackedKind::ALL.map(ReadingEntry::placeholder),
        }
    }

    pub fn entry(&self, kind: TrackedKind) -> &ReadingEntry {
        &self.entries[kind.index()]
    }

    pub fn display(&self, kind: TrackedKind) -> &str {
        &self.entry(kind).display
    }
}

#[derive(Debug, Clone)]
pub struct LatestReadingStore {
    tx: Arc<watch::Sender<StoreSnapshot>>,
}

impl LatestReadingStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StoreSnapshot::new());
        Self { tx: Arc::new(tx) }
    }

    /// Replace the entry for `kind` with the formatted `values`
    pub fn update(&self, kind: TrackedKind, values: &[f32]) -> SensorResult<()> {
        let display = format_reading(kind, values)?;
        self.tx.send_modify(|snapshot| {
            let entry = &mut snapshot.entries[kind.index()];
            entry.display = display;
            entry.samples += 1;
            entry.updated_at = Some(Utc::now());
        });
        Ok(())
    }

    pub fn read(&self, kind: TrackedKind) -> String {
        self.tx.borrow().display(kind).to_string()
    }

    pub fn samples(&self, kind: TrackedKind) -> u64 {
        self.tx.borrow().entry(kind).samples
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver that is notified after every update
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for LatestReadingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_placeholders() {
        let store = LatestReadingStore::new();
        for kind in TrackedKind::ALL {
            assert_eq!(store.read(kind), placeholder(kind));
            assert!(store.read(kind).contains("not available"));
            assert_eq!(store.samples(kind), 0);
        }
    }

    #[test]
    fn test_update_formats_values() {
        let store = LatestReadingStore::new();

        store.update(TrackedKind::Light, &[12.5]).unwrap();
        store
            .update(TrackedKind::Accelerometer, &[1.0, 2.0, 3.0])
            .unwrap();
        store
            .update(TrackedKind::Gyroscope, &[0.25, -0.5, 0.0])
            .unwrap();

        assert_eq!(store.read(TrackedKind::Light), "Light: 12.5");
        assert_eq!(
            store.read(TrackedKind::Accelerometer),
            "Accelerometer: X=1.0, Y=2.0, Z=3.0"
        );
        assert_eq!(
            store.read(TrackedKind::Gyroscope),
            "Gyroscope: X=0.25, Y=-0.5, Z=0.0"
        );
    }

    #[test]
    fn test_update_replaces_whole_entry() {
        let store = LatestReadingStore::new();
        store
            .update(TrackedKind::Accelerometer, &[1.0, 2.0, 3.0])
            .unwrap();
        store
            .update(TrackedKind::Accelerometer, &[7.0, 8.0, 9.0])
            .unwrap();

        let text = store.read(TrackedKind::Accelerometer);
        assert_eq!(text, "Accelerometer: X=7.0, Y=8.0, Z=9.0");
        assert!(!text.contains("1.0"));
        assert_eq!(store.samples(TrackedKind::Accelerometer), 2);
    }

    #[test]
    fn test_malformed_reading_leaves_entry() {
        let store = LatestReadingStore::new();
        let err = store.update(TrackedKind::Gyroscope, &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            SensorError::MalformedReading {
                expected: 3,
                got: 1,
                ..
            }
        ));
        assert_eq!(
            store.read(TrackedKind::Gyroscope),
            placeholder(TrackedKind::Gyroscope)
        );
        assert_eq!(store.samples(TrackedKind::Gyroscope), 0);
    }

    #[test]
    fn test_extra_values_ignored() {
        assert_eq!(
            format_reading(TrackedKind::Light, &[3.0, 99.0]).unwrap(),
            "Light: 3.0"
        );
    }

    #[test]
    fn test_clones_share_state() {
        let store = LatestReadingStore::new();
        let view_handle = store.clone();
        store.update(TrackedKind::Light, &[40.0]).unwrap();
        assert_eq!(view_handle.read(TrackedKind::Light), "Light: 40.0");
        assert!(view_handle.snapshot().entry(TrackedKind::Light).has_reading());
    }

    #[test]
    fn test_update_stamps_entry() {
        let store = LatestReadingStore::new();
        assert!(store.snapshot().entry(TrackedKind::Gyroscope).updated_at.is_none());

        let before = Utc::now();
        store.update(TrackedKind::Gyroscope, &[0.0, 0.0, 1.0]).unwrap();
        let stamped = store.snapshot().entry(TrackedKind::Gyroscope).updated_at;
        assert!(stamped.is_some_and(|at| at >= before));
    }

    #[test]
    fn test_independent_stores() {
        let a = LatestReadingStore::new();
        let b = LatestReadingStore::new();
        a.update(TrackedKind::Light, &[1.0]).unwrap();
        assert_eq!(b.read(TrackedKind::Light), placeholder(TrackedKind::Light));
    }

    #[tokio::test]
    async fn test_subscribers_notified() {
        let store = LatestReadingStore::new();
        let mut rx = store.subscribe();

        store.update(TrackedKind::Light, &[5.0]).unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().display(TrackedKind::Light), "Light: 5.0");
    }
}
