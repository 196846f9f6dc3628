// Sensor demo core
// Reads ambient light, accelerometer and gyroscope through a pluggable
// reading source and keeps the latest formatted value per kind.

pub mod config;
pub mod error;
pub mod manager;
pub mod sensor;
pub mod source;
pub mod store;
pub mod view;

pub use error::{SensorError, SensorResult};
pub use manager::{ReadingHandler, ResolvedSensors, SubscriptionManager, SubscriptionState};
pub use sensor::{Cadence, SensorDescriptor, SensorKind, SensorReading, TrackedKind};
pub use source::{IioSource, PushSource, ReadingSource, SimulatedSource};
pub use store::{LatestReadingStore, StoreSnapshot};
