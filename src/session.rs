//! Energy metrics over a closed measurement window.
//!
//! Samples are in µA and the source voltage in mV; every metric is reported in milli-units
//! (mA, mW, mWh, mC).

use std::time::Instant;

use crate::{Error, Result};
use crate::buffer::SampleBuffer;

/// Bounds of a measurement window, taken from a monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeasurementWindow {
    start: Option<Instant>,
    stop: Option<Instant>,
}

impl MeasurementWindow {
    /// `stop` is clamped so that it never precedes `start`.
    pub fn closed(start: Instant, stop: Instant) -> MeasurementWindow {
        MeasurementWindow { start: Some(start), stop: Some(stop.max(start)) }
    }

    pub fn start_time(&self) -> Option<Instant> {
        self.start
    }

    pub fn stop_time(&self) -> Option<Instant> {
        self.stop
    }

    pub fn is_closed(&self) -> bool {
        self.start.is_some() && self.stop.is_some()
    }

    pub(crate) fn open(&mut self, now: Instant) {
        self.start = Some(now);
        self.stop = None;
    }

    pub(crate) fn close(&mut self, now: Instant) {
        if let Some(start) = self.start {
            self.stop = Some(now.max(start));
        }
    }

    pub fn duration_s(&self) -> Result<f64> {
        match (self.start, self.stop) {
            (Some(start), Some(stop)) => Ok(stop.saturating_duration_since(start).as_secs_f64()),
            _ => Err(Error::InvalidWindow),
        }
    }
}

/// Aggregate view over a sample buffer and the window it was collected in.
#[derive(Debug, Clone, Copy)]
pub struct Measurement<'a> {
    samples: &'a SampleBuffer,
    window: &'a MeasurementWindow,
    source_voltage_mv: u32,
}

impl<'a> Measurement<'a> {
    pub fn new(samples: &'a SampleBuffer, window: &'a MeasurementWindow, source_voltage_mv: u32)
            -> Measurement<'a> {
        Measurement { samples, window, source_voltage_mv }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn min_current_ma(&self) -> Result<f64> {
        self.samples.min().map(|min| min as f64 / 1000.0).ok_or(Error::EmptyBuffer)
    }

    pub fn max_current_ma(&self) -> Result<f64> {
        self.samples.max().map(|max| max as f64 / 1000.0).ok_or(Error::EmptyBuffer)
    }

    /// Average current, or zero if there are no samples.
    pub fn average_current_ma(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0
        }
        (self.samples.sum() as f64 / self.samples.len() as f64) / 1000.0
    }

    pub fn average_power_mw(&self) -> f64 {
        (self.source_voltage_mv as f64 / 1000.0) * self.average_current_ma()
    }

    pub fn duration_s(&self) -> Result<f64> {
        self.window.duration_s()
    }

    pub fn average_energy_mwh(&self) -> Result<f64> {
        Ok(self.average_power_mw() * (self.duration_s()? / 3600.0))
    }

    pub fn average_charge_mc(&self) -> Result<f64> {
        Ok(self.average_current_ma() * self.duration_s()?)
    }

    /// Average current of each consecutive group of `chunk_size` samples, in mA.
    /// The last group may be shorter.
    pub fn chunk_averages(&self, chunk_size: usize) -> Result<Vec<f64>> {
        if chunk_size == 0 {
            return Err(Error::Configuration("chunk size must be non-zero".into()))
        }
        let mut averages = Vec::with_capacity(self.samples.len().div_ceil(chunk_size));
        let (mut sum, mut count) = (0i64, 0usize);
        for sample in self.samples.iter() {
            sum += sample as i64;
            count += 1;
            if count == chunk_size {
                averages.push(sum as f64 / count as f64 / 1000.0);
                (sum, count) = (0, 0);
            }
        }
        if count > 0 {
            averages.push(sum as f64 / count as f64 / 1000.0);
        }
        Ok(averages)
    }

    pub fn summary(&self) -> Result<Summary> {
        Ok(Summary {
            sample_count: self.sample_count(),
            discarded: self.samples.discarded(),
            duration_s: self.duration_s()?,
            min_current_ma: self.min_current_ma().ok(),
            max_current_ma: self.max_current_ma().ok(),
            average_current_ma: self.average_current_ma(),
            average_power_mw: self.average_power_mw(),
            average_energy_mwh: self.average_energy_mwh()?,
            average_charge_mc: self.average_charge_mc()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub sample_count: usize,
    pub discarded: u64,
    pub duration_s: f64,
    pub min_current_ma: Option<f64>,
    pub max_current_ma: Option<f64>,
    pub average_current_ma: f64,
    pub average_power_mw: f64,
    pub average_energy_mwh: f64,
    pub average_charge_mc: f64,
}
