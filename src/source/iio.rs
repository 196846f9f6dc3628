//! Linux Industrial I/O sensors read through sysfs
//!
//! Layout: `<root>/iio:deviceN/{name, in_<family>_<axis>_raw, in_<family>_scale, ...}`.
//! Each (device, channel family) pair becomes one descriptor whose id is
//! `iio:deviceN/in_<family>`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SensorError, SensorResult};
use crate::sensor::{type_code, Cadence, SensorDescriptor, SensorKind, SensorReading, TrackedKind};
use crate::source::{spawn_poll_loop, ReadingReceiver, ReadingSource};

pub const DEFAULT_IIO_ROOT: &str = "/sys/bus/iio/devices";

/// Channel prefixes we classify, in inventory order
const FAMILIES: &[(&str, i32)] = &[
    ("in_illuminance", type_code::LIGHT),
    ("in_accel", type_code::ACCELEROMETER),
    ("in_anglvel", type_code::GYROSCOPE),
    ("in_magn", type_code::MAGNETIC_FIELD),
    ("in_pressure", type_code::PRESSURE),
    ("in_proximity", type_code::PROXIMITY),
    ("in_humidityrelative", type_code::RELATIVE_HUMIDITY),
    ("in_temp", type_code::AMBIENT_TEMPERATURE),
];

#[derive(Debug, Clone)]
pub struct IioSource {
    root: PathBuf,
}

impl IioSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn device_dirs(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("No IIO devices under {:?}: {}", self.root, e);
                return Vec::new();
            }
        };

        let mut devices: Vec<(u32, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let index = name.strip_prefix("iio:device")?.parse().ok()?;
                Some((index, entry.path()))
            })
            .collect();
        devices.sort_by_key(|(index, _)| *index);
        devices.into_iter().map(|(_, path)| path).collect()
    }

    fn describe_device(&self, dir: &Path) -> Vec<SensorDescriptor> {
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = read_trimmed(&dir.join("name")).unwrap_or_else(|_| dir_name.clone());
        let vendor = vendor_of(dir);

        let files: Vec<String> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(e) => {
                log::warn!("Failed to list {:?}: {}", dir, e);
                return Vec::new();
            }
        };

        FAMILIES
            .iter()
            .filter(|(prefix, code)| family_present(&files, prefix, *code))
            .map(|(prefix, code)| {
                SensorDescriptor::new(&format!("{}/{}", dir_name, prefix), &name, *code, &vendor)
            })
            .collect()
    }

    fn channel_reader(&self, descriptor: &SensorDescriptor) -> SensorResult<ChannelReader> {
        let kind = TrackedKind::try_from(descriptor.kind)?;
        let (device, prefix) = descriptor.id.split_once('/').ok_or_else(|| {
            SensorError::SourceUnavailable(format!("not an IIO sensor id: {}", descriptor.id))
        })?;
        let dir = self.root.join(device);

        let axes = channel_candidates(kind, prefix)
            .iter()
            .map(|candidates| AxisReader::open_first(&dir, prefix, candidates))
            .collect::<SensorResult<Vec<_>>>()?;

        Ok(ChannelReader { kind, axes })
    }
}

impl Default for IioSource {
    fn default() -> Self {
        Self::new(DEFAULT_IIO_ROOT)
    }
}

impl ReadingSource for IioSource {
    fn discover(&self) -> Vec<SensorDescriptor> {
        self.device_dirs()
            .iter()
            .flat_map(|dir| self.describe_device(dir))
            .collect()
    }

    fn open(
        &self,
        descriptor: &SensorDescriptor,
        cadence: Cadence,
    ) -> SensorResult<ReadingReceiver> {
        let reader = self.channel_reader(descriptor)?;
        let label = descriptor.id.clone();
        let mut failures = 0u64;

        spawn_poll_loop(label.clone(), cadence.period(), move || match reader.sample() {
            Ok(reading) => Some(reading),
            Err(e) => {
                failures += 1;
                if failures == 1 || failures % 50 == 0 {
                    log::warn!("[{}] read failed ({} so far): {}", label, failures, e);
                }
                None
            }
        })
    }
}

/// Channel names per value, in preference order
fn channel_candidates(kind: TrackedKind, prefix: &str) -> Vec<Vec<String>> {
    match kind {
        // Single-channel drivers often index it: in_illuminance0_input
        TrackedKind::Light => vec![vec![prefix.to_string(), format!("{}0", prefix)]],
        TrackedKind::Accelerometer | TrackedKind::Gyroscope => ["x", "y", "z"]
            .iter()
            .map(|axis| vec![format!("{}_{}", prefix, axis)])
            .collect(),
    }
}

fn has_channel(files: &[String], channel: &str) -> bool {
    files
        .iter()
        .any(|f| f.strip_prefix(channel).is_some_and(|rest| rest == "_input" || rest == "_raw"))
}

/// Tracked families count only when every value has a channel we can read;
/// `in_illuminance_ir_raw` alone is not a light sensor
fn family_present(files: &[String], prefix: &str, code: i32) -> bool {
    match TrackedKind::try_from(SensorKind::from_type_code(code)) {
        Ok(kind) => channel_candidates(kind, prefix)
            .iter()
            .all(|candidates| candidates.iter().any(|c| has_channel(files, c))),
        Err(_) => files.iter().any(|f| is_value_file(f, prefix)),
    }
}

/// `in_accel_x_raw` belongs to `in_accel`; `in_accelerometer_raw` does not
fn is_value_file(file: &str, prefix: &str) -> bool {
    let Some(rest) = file.strip_prefix(prefix) else {
        return false;
    };
    let is_value = rest.ends_with("_raw") || rest.ends_with("_input");
    is_value && (rest.starts_with('_') || rest.chars().next().is_some_and(|c| c.is_ascii_digit()))
}

/// Vendor prefix from the devicetree `compatible` string, e.g. `st,lsm6dsx`
fn vendor_of(dir: &Path) -> String {
    fs::read(dir.join("of_node").join("compatible"))
        .ok()
        .and_then(|bytes| {
            let first = bytes.split(|b| *b == 0).next()?.to_vec();
            let compatible = String::from_utf8(first).ok()?;
            let (vendor, _) = compatible.split_once(',')?;
            Some(vendor.trim().to_string())
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn read_trimmed(path: &Path) -> SensorResult<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| SensorError::io(path.display().to_string(), e))
}

fn read_number(path: &Path) -> SensorResult<f64> {
    let text = read_trimmed(path)?;
    text.parse().map_err(|_| SensorError::Parse {
        path: path.display().to_string(),
        value: text,
    })
}

/// First of `candidates` that exists, parsed as a number
fn read_optional(dir: &Path, candidates: &[String]) -> SensorResult<Option<f64>> {
    for name in candidates {
        let path = dir.join(name);
        if path.exists() {
            return read_number(&path).map(Some);
        }
    }
    Ok(None)
}

#[derive(Debug)]
struct AxisReader {
    value_path: PathBuf,
    scale: f64,
    offset: f64,
}

impl AxisReader {
    /// Prefers the processed `_input` file; falls back to `_raw` with scale and offset
    fn open(dir: &Path, prefix: &str, channel: &str) -> SensorResult<Self> {
        let input = dir.join(format!("{}_input", channel));
        if input.exists() {
            return Ok(Self {
                value_path: input,
                scale: 1.0,
                offset: 0.0,
            });
        }

        let raw = dir.join(format!("{}_raw", channel));
        if !raw.exists() {
            return Err(SensorError::SourceUnavailable(format!(
                "{} has no {} channel",
                dir.display(),
                channel
            )));
        }

        let scale = read_optional(
            dir,
            &[format!("{}_scale", channel), format!("{}_scale", prefix)],
        )?
        .unwrap_or(1.0);
        let offset = read_optional(
            dir,
            &[format!("{}_offset", channel), format!("{}_offset", prefix)],
        )?
        .unwrap_or(0.0);

        Ok(Self {
            value_path: raw,
            scale,
            offset,
        })
    }

    fn open_first(dir: &Path, prefix: &str, candidates: &[String]) -> SensorResult<Self> {
        let mut last_error = None;
        for channel in candidates {
            match Self::open(dir, prefix, channel) {
                Ok(reader) => return Ok(reader),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            SensorError::SourceUnavailable(format!("{} has no {} channel", dir.display(), prefix))
        }))
    }

    fn read(&self) -> SensorResult<f32> {
        let raw = read_number(&self.value_path)?;
        Ok(((raw + self.offset) * self.scale) as f32)
    }
}

#[derive(Debug)]
struct ChannelReader {
    kind: TrackedKind,
    axes: Vec<AxisReader>,
}

impl ChannelReader {
    fn sample(&self) -> SensorResult<SensorReading> {
        let values = self
            .axes
            .iter()
            .map(AxisReader::read)
            .collect::<SensorResult<Vec<f32>>>()?;
        Ok(SensorReading::new(SensorKind::from(self.kind), values))
    }
}
