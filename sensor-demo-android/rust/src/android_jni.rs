use crate::bridge::{create_bridge, destroy_bridge, get_bridge};
use crate::error::{throw_java_exception, BResult, BridgeError};
use jni::objects::{JClass, JFloatArray, JString};
use jni::sys::{jboolean, jfloat, jint, jlong, jstring, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;
use std::sync::Once;

static LOGGER: Once = Once::new();

/// Route `log` output to logcat on device; a no-op on the host
fn init_logging() {
    LOGGER.call_once(|| {
        #[cfg(target_os = "android")]
        {
            let _ = android_log::init("SensorDemo");
        }
    });
}

fn throw(env: &mut JNIEnv, error: &BridgeError) {
    log::error!("{}", error);
    let _ = throw_java_exception(env, error);
}

fn status(env: &mut JNIEnv, result: BResult<()>) -> jint {
    match result {
        Ok(_) => 0,
        Err(e) => {
            throw(env, &e);
            -1
        }
    }
}

fn string_result(env: &mut JNIEnv, result: BResult<String>) -> jstring {
    let text = match result {
        Ok(text) => text,
        Err(e) => {
            throw(env, &e);
            return std::ptr::null_mut();
        }
    };
    match env.new_string(&text) {
        Ok(jstr) => jstr.into_raw(),
        Err(_) => {
            throw(
                env,
                &BridgeError::JniError("Failed to create Java string".to_string()),
            );
            std::ptr::null_mut()
        }
    }
}

/// JNI: Create a bridge instance
/// Returns: handle (> 0), or 0 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_example_sensordemo_SensorBridge_nativeCreate(
    mut env: JNIEnv,
    _class: JClass,
) -> jlong {
    init_logging();
    match create_bridge() {
        Ok(handle) => {
            log::info!("Created sensor bridge {}", handle);
            handle
        }
        Err(e) => {
            throw(&mut env, &e);
            0
        }
    }
}

/// JNI: Release a bridge instance, closing its subscriptions
#[no_mangle]
pub extern "C" fn Java_com_example_sensordemo_SensorBridge_nativeDestroy(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jint {
    let result = destroy_bridge(handle).map(|existed| {
        if !existed {
            log::warn!("Destroying unknown sensor bridge {}", handle);
        }
    });
    status(&mut env, result)
}

/// JNI: Register one sensor from `SensorManager.getSensorList(Sensor.TYPE_ALL)`
/// Parameters: name, type code, vendor, whether it is `getDefaultSensor(type)`
/// Returns: 0 on success, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_example_sensordemo_SensorBridge_nativeRegisterSensor(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    name: JString,
    type_code: jint,
    vendor: JString,
    is_default: jboolean,
) -> jint {
    let result = register_sensor_impl(&mut env, handle, &name, type_code, &vendor, is_default);
    status(&mut env, result)
}

fn register_sensor_impl(
    env: &mut JNIEnv,
    handle: jlong,
    name: &JString,
    type_code: jint,
    vendor: &JString,
    is_default: jboolean,
) -> BResult<()> {
    let name: String = env.get_string(name)?.into();
    let vendor: String = env.get_string(vendor)?.into();
    get_bridge(handle)?.register_sensor(&name, type_code, &vendor, is_default != JNI_FALSE)
}

/// JNI: All sensors registered; resolve the tracked kinds
#[no_mangle]
pub extern "C" fn Java_com_example_sensordemo_SensorBridge_nativeStart(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jint {
    let result = get_bridge(handle).and_then(|bridge| bridge.start());
    status(&mut env, result)
}

/// JNI: Activity.onResume
#[no_mangle]
pub extern "C" fn Java_com_example_sensordemo_SensorBridge_nativeOnResume(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jint {
    let result = get_bridge(handle).and_then(|bridge| bridge.on_resume());
    status(&mut env, result)
}

/// JNI: Activity.onPause
#[no_mangle]
pub extern "C" fn Java_com_example_sensordemo_SensorBridge_nativeOnPause(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jint {
    let result = get_bridge(handle).and_then(|bridge| bridge.on_pause());
    status(&mut env, result)
}

/// JNI: SensorEventListener.onSensorChanged
/// Parameters: sensor type code, event values, event timestamp (ns)
/// Returns: number of subscriptions the reading reached, -1 on error
#[no_mangle]
pub extern "C" fn Java_com_example_sensordemo_SensorBridge_nativeOnSensorChanged(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    type_code: jint,
    values: JFloatArray,
    timestamp_ns: jlong,
) -> jint {
    match on_sensor_changed_impl(&mut env, handle, type_code, &values, timestamp_ns) {
        Ok(delivered) => delivered as jint,
        Err(e) => {
            throw(&mut env, &e);
            -1
        }
    }
}

fn on_sensor_changed_impl(
    env: &mut JNIEnv,
    handle: jlong,
    type_code: jint,
    values: &JFloatArray,
    timestamp_ns: jlong,
) -> BResult<usize> {
    let len = env.get_array_length(values)?;
    let mut buf: Vec<jfloat> = vec![0.0; len.max(0) as usize];
    env.get_float_array_region(values, 0, &mut buf)?;
    Ok(get_bridge(handle)?.on_sensor_changed(type_code, buf, timestamp_ns))
}

/// JNI: SensorEventListener.onAccuracyChanged (inert)
#[no_mangle]
pub extern "C" fn Java_com_example_sensordemo_SensorBridge_nativeOnAccuracyChanged(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
    type_code: jint,
    accuracy: jint,
) {
    if let Ok(bridge) = get_bridge(handle) {
        bridge.on_accuracy_changed(type_code, accuracy);
    }
}

/// JNI: Line to render for a tracked sensor type
/// Returns: reading or "not available" text, null on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_example_sensordemo_SensorBridge_nativeReadValue(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    type_code: jint,
) -> jstring {
    let result = get_bridge(handle).and_then(|bridge| bridge.read_value(type_code));
    string_result(&mut env, result)
}

/// JNI: Whether subscriptions are currently open
#[no_mangle]
pub extern "C" fn Java_com_example_sensordemo_SensorBridge_nativeIsActive(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jboolean {
    match get_bridge(handle).and_then(|bridge| bridge.is_active()) {
        Ok(true) => JNI_TRUE,
        Ok(false) => JNI_FALSE,
        Err(e) => {
            throw(&mut env, &e);
            JNI_FALSE
        }
    }
}

/// JNI: Device inventory as a JSON array of {id, kind, name, vendor, type_code}
#[no_mangle]
pub extern "C" fn Java_com_example_sensordemo_SensorBridge_nativeInventoryJson(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jstring {
    let result = get_bridge(handle).and_then(|bridge| bridge.inventory_json());
    string_result(&mut env, result)
}
