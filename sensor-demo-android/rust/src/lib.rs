// Sensor Demo Android JNI Library
// Lets a Kotlin activity drive the sensor demo core: the activity forwards
// its SensorManager inventory and events, Rust owns the subscription
// lifecycle and the latest-reading store.

pub mod android_jni;
pub mod bridge;
pub mod error;

pub use bridge::SensorBridge;
pub use error::{BResult, BridgeError};
