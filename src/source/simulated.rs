use std::f64::consts::PI;

use crate::error::{SensorError, SensorResult};
use crate::sensor::{
    type_code, Cadence, SensorDescriptor, SensorKind, SensorReading, TrackedKind,
};
use crate::source::{spawn_poll_loop, ReadingReceiver, ReadingSource, MIN_POLL_PERIOD};

const VENDOR: &str = "sensor-demo";

/// Synthetic device for hosts without motion sensors.
///
/// Only the kinds passed to [`SimulatedSource::new`] are present; a
/// magnetometer and a barometer always show up in the inventory but are
/// never tracked.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    present: Vec<TrackedKind>,
}

impl SimulatedSource {
    pub fn new(present: &[TrackedKind]) -> Self {
        let present = TrackedKind::ALL
            .into_iter()
            .filter(|kind| present.contains(kind))
            .collect();
        Self { present }
    }

    /// Device exposing all three tracked kinds
    pub fn full() -> Self {
        Self::new(&TrackedKind::ALL)
    }

    fn descriptor(kind: TrackedKind) -> SensorDescriptor {
        let name = match kind {
            TrackedKind::Light => "Simulated Light Sensor",
            TrackedKind::Accelerometer => "Simulated Accelerometer",
            TrackedKind::Gyroscope => "Simulated Gyroscope",
        };
        SensorDescriptor::new(&format!("sim:{}", kind), name, kind.type_code(), VENDOR)
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::full()
    }
}

impl ReadingSource for SimulatedSource {
    fn discover(&self) -> Vec<SensorDescriptor> {
        let mut sensors: Vec<SensorDescriptor> =
            self.present.iter().map(|&k| Self::descriptor(k)).collect();
        sensors.push(SensorDescriptor::new(
            "sim:magnetometer",
            "Simulated Magnetometer",
            type_code::MAGNETIC_FIELD,
            VENDOR,
        ));
        sensors.push(SensorDescriptor::new(
            "sim:barometer",
            "Simulated Barometer",
            type_code::PRESSURE,
            VENDOR,
        ));
        sensors
    }

    fn open(
        &self,
        descriptor: &SensorDescriptor,
        cadence: Cadence,
    ) -> SensorResult<ReadingReceiver> {
        let kind = TrackedKind::try_from(descriptor.kind)?;
        if !self.present.contains(&kind) {
            return Err(SensorError::SourceUnavailable(format!(
                "simulated device has no {} sensor",
                kind
            )));
        }

        let period = cadence.period().max(MIN_POLL_PERIOD);
        let step = period.as_secs_f64();
        let mut t = 0.0;

        spawn_poll_loop(descriptor.id.clone(), period, move || {
            t += step;
            Some(SensorReading::new(SensorKind::from(kind), waveform(kind, t)))
        })
    }
}

/// Smooth synthetic signal for `kind` at time `t` seconds
pub fn waveform(kind: TrackedKind, t: f64) -> Vec<f32> {
    let values = match kind {
        TrackedKind::Light => vec![250.0 + (t * 0.5).sin() * 50.0],
        TrackedKind::Accelerometer => vec![
            (t * 2.0 * PI).sin() * 0.5,
            (t * 2.0 * PI).cos() * 0.3,
            9.81 + (t * PI).sin() * 0.1,
        ],
        TrackedKind::Gyroscope => vec![
            (t * 0.5).sin() * 0.05,
            (t * 0.3).cos() * 0.03,
            t.sin() * 0.1,
        ],
    };
    values.into_iter().map(|v| v as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inventory_contains_present_and_extras() {
        let source = SimulatedSource::new(&[TrackedKind::Gyroscope, TrackedKind::Light]);
        let sensors = source.discover();

        let names: Vec<&str> = sensors.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Simulated Light Sensor",
                "Simulated Gyroscope",
                "Simulated Magnetometer",
                "Simulated Barometer",
            ]
        );
        assert!(sensors.iter().all(|s| s.vendor == VENDOR));
        assert_eq!(sensors[2].kind, SensorKind::Unsupported);
    }

    #[test]
    fn test_resolve_absent_kind() {
        let source = SimulatedSource::new(&[TrackedKind::Accelerometer]);
        assert!(source.resolve(TrackedKind::Light).is_none());
        assert!(source.resolve(TrackedKind::Gyroscope).is_none());
        let accel = source.resolve(TrackedKind::Accelerometer).unwrap();
        assert_eq!(accel.type_code, type_code::ACCELEROMETER);
    }

    #[test]
    fn test_waveform_shapes() {
        for kind in TrackedKind::ALL {
            assert_eq!(waveform(kind, 1.3).len(), kind.axis_count());
        }
        let accel = waveform(TrackedKind::Accelerometer, 0.0);
        assert_relative_eq!(accel[2], 9.81, epsilon = 1e-4);
    }

    #[tokio::test]
    async fn test_open_delivers_readings() {
        let source = SimulatedSource::full();
        let gyro = source.resolve(TrackedKind::Gyroscope).unwrap();
        let mut rx = source.open(&gyro, Cadence::Fastest).unwrap();

        let reading = rx.recv().await.unwrap();
        assert_eq!(reading.kind, SensorKind::Gyroscope);
        assert_eq!(reading.values.len(), 3);
    }

    #[tokio::test]
    async fn test_open_rejects_untracked() {
        let source = SimulatedSource::full();
        let magnetometer = source
            .discover()
            .into_iter()
            .find(|s| s.kind == SensorKind::Unsupported)
            .unwrap();
        assert!(source.open(&magnetometer, Cadence::Normal).is_err());
    }
}
