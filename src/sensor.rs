use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::SensorError;

/// Platform type codes, using the Android `Sensor.TYPE_*` numbering.
pub mod type_code {
    pub const ACCELEROMETER: i32 = 1;
    pub const MAGNETIC_FIELD: i32 = 2;
    pub const GYROSCOPE: i32 = 4;
    pub const LIGHT: i32 = 5;
    pub const PRESSURE: i32 = 6;
    pub const PROXIMITY: i32 = 8;
    pub const RELATIVE_HUMIDITY: i32 = 12;
    pub const AMBIENT_TEMPERATURE: i32 = 13;
}

/// Kind of a physical or virtual sensor exposed by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Light,
    Accelerometer,
    Gyroscope,
    Unsupported,
}

impl SensorKind {
    pub fn from_type_code(code: i32) -> Self {
        match code {
            type_code::LIGHT => SensorKind::Light,
            type_code::ACCELEROMETER => SensorKind::Accelerometer,
            type_code::GYROSCOPE => SensorKind::Gyroscope,
            _ => SensorKind::Unsupported,
        }
    }
}

/// The three kinds the demo tracks and renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum TrackedKind {
    Light,
    Accelerometer,
    Gyroscope,
}

impl TrackedKind {
    /// Display order
    pub const ALL: [TrackedKind; 3] = [
        TrackedKind::Light,
        TrackedKind::Accelerometer,
        TrackedKind::Gyroscope,
    ];

    /// Number of axis values a reading of this kind carries
    pub fn axis_count(self) -> usize {
        match self {
            TrackedKind::Light => 1,
            TrackedKind::Accelerometer | TrackedKind::Gyroscope => 3,
        }
    }

    pub fn type_code(self) -> i32 {
        match self {
            TrackedKind::Light => type_code::LIGHT,
            TrackedKind::Accelerometer => type_code::ACCELEROMETER,
            TrackedKind::Gyroscope => type_code::GYROSCOPE,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            TrackedKind::Light => 0,
            TrackedKind::Accelerometer => 1,
            TrackedKind::Gyroscope => 2,
        }
    }
}

impl From<TrackedKind> for SensorKind {
    fn from(kind: TrackedKind) -> Self {
        match kind {
            TrackedKind::Light => SensorKind::Light,
            TrackedKind::Accelerometer => SensorKind::Accelerometer,
            TrackedKind::Gyroscope => SensorKind::Gyroscope,
        }
    }
}

impl TryFrom<SensorKind> for TrackedKind {
    type Error = SensorError;

    fn try_from(kind: SensorKind) -> Result<Self, Self::Error> {
        match kind {
            SensorKind::Light => Ok(TrackedKind::Light),
            SensorKind::Accelerometer => Ok(TrackedKind::Accelerometer),
            SensorKind::Gyroscope => Ok(TrackedKind::Gyroscope),
            SensorKind::Unsupported => Err(SensorError::UnsupportedKind(kind)),
        }
    }
}

impl fmt::Display for TrackedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackedKind::Light => "light",
            TrackedKind::Accelerometer => "accelerometer",
            TrackedKind::Gyroscope => "gyroscope",
        };
        f.write_str(name)
    }
}

/// One sensor as discovered on the host. Owned by the source, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDescriptor {
    /// Source-specific identifier (sysfs device, platform handle, ...)
    pub id: String,
    pub kind: SensorKind,
    pub name: String,
    pub vendor: String,
    pub type_code: i32,
}

impl SensorDescriptor {
    pub fn new(id: &str, name: &str, type_code: i32, vendor: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: SensorKind::from_type_code(type_code),
            name: name.to_string(),
            vendor: vendor.to_string(),
            type_code,
        }
    }
}

/// A single delivered sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub kind: SensorKind,
    pub values: Vec<f32>,
    pub timestamp: f64,
}

impl SensorReading {
    pub fn new(kind: SensorKind, values: Vec<f32>) -> Self {
        Self {
            kind,
            values,
            timestamp: current_timestamp(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Sampling cadence hint, matching the Android `SENSOR_DELAY_*` classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Cadence {
    #[default]
    Normal,
    Ui,
    Game,
    Fastest,
}

impl Cadence {
    pub fn period(self) -> Duration {
        match self {
            Cadence::Normal => Duration::from_micros(200_000),
            Cadence::Ui => Duration::from_micros(66_667),
            Cadence::Game => Duration::from_micros(20_000),
            Cadence::Fastest => Duration::ZERO,
        }
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
