use jni::JNIEnv;
use sensor_demo_rs::SensorError;
use thiserror::Error;

/// Bridge error types
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge already started")]
    AlreadyStarted,

    #[error("Bridge not started")]
    NotStarted,

    #[error("Unknown bridge handle: {0}")]
    UnknownHandle(i64),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("JNI error: {0}")]
    JniError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<jni::errors::Error> for BridgeError {
    fn from(e: jni::errors::Error) -> Self {
        BridgeError::JniError(e.to_string())
    }
}

/// Result type for JNI operations
pub type BResult<T> = Result<T, BridgeError>;

/// Throw Java exception from Rust error
pub fn throw_java_exception(env: &mut JNIEnv, error: &BridgeError) -> BResult<()> {
    let exception_class = match error {
        BridgeError::AlreadyStarted | BridgeError::NotStarted => "java/lang/IllegalStateException",
        BridgeError::UnknownHandle(_) | BridgeError::InvalidParameters(_) => {
            "java/lang/IllegalArgumentException"
        }
        BridgeError::Sensor(_) | BridgeError::JniError(_) | BridgeError::Internal(_) => {
            "java/lang/RuntimeException"
        }
    };

    let message = error.to_string();
    env.throw_new(exception_class, message)
        .map_err(|_| BridgeError::JniError("Failed to throw exception".to_string()))?;

    Ok(())
}
