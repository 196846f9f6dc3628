use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

use crate::sensor::{Cadence, TrackedKind};
use crate::source::{iio::DEFAULT_IIO_ROOT, IioSource, ReadingSource, SimulatedSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SourceKind {
    /// Synthetic sensors
    #[default]
    Sim,
    /// Linux Industrial I/O devices in sysfs
    Iio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Interactive terminal view
    #[default]
    Terminal,
    /// Print tracked readings as they change
    Headless,
    /// Print the inventory once and exit
    List { json: bool },
}

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub source: SourceKind,
    pub iio_root: PathBuf,
    pub sim_sensors: Vec<TrackedKind>,
    pub cadence: Cadence,
    pub mode: OutputMode,
    /// None runs until quit
    pub duration: Option<Duration>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            iio_root: PathBuf::from(DEFAULT_IIO_ROOT),
            sim_sensors: TrackedKind::ALL.to_vec(),
            cadence: Cadence::default(),
            mode: OutputMode::default(),
            duration: None,
        }
    }
}

impl DemoConfig {
    pub fn build_source(&self) -> Box<dyn ReadingSource> {
        match self.source {
            SourceKind::Sim => Box::new(SimulatedSource::new(&self.sim_sensors)),
            SourceKind::Iio => Box::new(IioSource::new(self.iio_root.clone())),
        }
    }

    /// Default log filter; the terminal view stays quiet so logs do not tear the screen
    pub fn default_log_filter(&self) -> &'static str {
        match self.mode {
            OutputMode::Terminal => "warn",
            OutputMode::Headless | OutputMode::List { .. } => "info",
        }
    }
}
