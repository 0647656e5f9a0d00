//! High-level configuration of the profiler in terms of physical qualities.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};
use crate::params::{MeterMode, MIN_SOURCE_VOLTAGE_MV, MAX_SOURCE_VOLTAGE_MV};

#[derive(Debug, Clone, PartialEq)]
pub struct ProfilerConfiguration {
    /// Port the instrument is connected to. If `None`, exactly one instrument must be
    /// discoverable.
    pub port: Option<String>,
    pub mode: MeterMode,
    /// Output voltage of the source meter, in mV. Also used to convert current to power
    /// in ampere meter mode, where it should match the external supply.
    pub source_voltage_mv: u32,
    /// Time between two polls of the driver. The instrument buffers several seconds of
    /// samples on its own, so this mostly trades CPU time for pause latency.
    pub fetch_interval: Duration,
    /// Time to wait after configuring the instrument before sampling begins.
    pub settle_time: Duration,
    /// If set, every closed measurement window is appended to this CSV file.
    pub log_path: Option<PathBuf>,
    /// If set, only the most recent samples covering this duration are retained.
    pub retention: Option<Duration>,
    /// Nominal sample rate of the instrument, in Hz.
    pub sample_rate: u32,
}

impl Default for ProfilerConfiguration {
    fn default() -> Self {
        Self {
            port: None,
            mode: MeterMode::default(),
            source_voltage_mv: 3300,
            fetch_interval: Duration::from_millis(100),
            settle_time: Duration::from_secs(1),
            log_path: None,
            retention: None,
            sample_rate: 100_000,
        }
    }
}

impl ProfilerConfiguration {
    pub fn validate(&self) -> Result<()> {
        validate_source_voltage(self.source_voltage_mv)?;
        if self.fetch_interval.is_zero() {
            return Err(Error::Configuration("fetch interval must be non-zero".into()))
        }
        if self.retention.is_some_and(|retention| retention.is_zero()) {
            return Err(Error::Configuration("retention must be non-zero".into()))
        }
        if self.sample_rate == 0 {
            return Err(Error::Configuration("sample rate must be non-zero".into()))
        }
        Ok(())
    }

    /// Number of samples to retain, or `None` if the buffer is unbounded.
    pub fn buffer_capacity(&self) -> Option<usize> {
        self.retention.map(|retention|
            ((retention.as_secs_f64() * self.sample_rate as f64).ceil() as usize).max(1))
    }
}

pub(crate) fn validate_source_voltage(millivolts: u32) -> Result<()> {
    if !(MIN_SOURCE_VOLTAGE_MV..=MAX_SOURCE_VOLTAGE_MV).contains(&millivolts) {
        return Err(Error::Configuration(format!(
            "source voltage {} mV outside of {}..={} mV",
            millivolts, MIN_SOURCE_VOLTAGE_MV, MAX_SOURCE_VOLTAGE_MV)))
    }
    Ok(())
}
