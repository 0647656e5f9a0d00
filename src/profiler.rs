use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::{Error, Result};
use crate::sys::{Connector, Driver};
use crate::config::{ProfilerConfiguration, validate_source_voltage};
use crate::params::{Calibration, MeterMode, PowerState};
use crate::buffer::SampleBuffer;
use crate::session::{Measurement, MeasurementWindow, Summary};
use crate::sink::SampleLog;
use crate::gate::{EngineState, Gate, GateGuard};
use crate::engine::{Sampler, Shared};

/// Measures the current drawn by a device under test over user-delimited windows. Every
/// operation is ordered with respect to the sampler's poll iterations.
#[derive(Debug)]
pub struct Profiler<D: Driver + 'static> {
    gate: Arc<Gate<Shared<D>>>,
    sampler: Mutex<Option<JoinHandle<()>>>,
}

impl<D: Driver + 'static> Profiler<D> {
    /// Open the instrument at `config.port`, or the only discoverable one if no port is given.
    pub fn open<C>(connector: &C, config: ProfilerConfiguration) -> Result<Profiler<D>>
            where C: Connector<Driver = D> {
        config.validate()?;
        let port = match &config.port {
            Some(port) => port.clone(),
            None => discover_port(connector)?,
        };
        log::debug!("profiler: opening {}", port);
        let driver = connector.open(&port)?;
        Profiler::with_driver(driver, config)
    }

    /// Verify and configure an already opened instrument, then start the sampler paused.
    pub fn with_driver(mut driver: D, config: ProfilerConfiguration) -> Result<Profiler<D>> {
        config.validate()?;
        let calibration = match driver.read_calibration() {
            Ok(calibration) => calibration,
            Err(Error::Calibration(reason)) => return Err(Error::Calibration(reason)),
            Err(error) => return Err(Error::Calibration(error.to_string())),
        };
        calibration.verify().map_err(Error::Calibration)?;
        log::debug!("profiler: calibration {:?}", calibration);

        driver.set_mode(config.mode)?;
        driver.set_source_voltage(config.source_voltage_mv)?;
        log::debug!("profiler: {} at {} mV", config.mode, config.source_voltage_mv);

        let log = match &config.log_path {
            Some(path) => Some(SampleLog::create(path)?),
            None => None,
        };
        thread::sleep(config.settle_time);

        let buffer = SampleBuffer::with_capacity(config.buffer_capacity());
        let gate = Arc::new(Gate::new(
            Shared::new(driver, calibration, config.source_voltage_mv, buffer, log)));
        let sampler = Sampler::new(gate.clone(), config.fetch_interval).run()?;
        Ok(Profiler { gate, sampler: Mutex::new(Some(sampler)) })
    }

    // reports a sampler failure once, to whichever command comes next
    fn command(&self) -> Result<GateGuard<'_, Shared<D>>> {
        let mut shared = self.gate.lock();
        if let Some(error) = shared.fault.take() {
            return Err(error)
        }
        Ok(shared)
    }

    fn with_device<F>(&self, f: F) -> Result<bool>
            where F: FnOnce(&mut D) -> Result<()> {
        let mut shared = self.command()?;
        match shared.driver.as_mut() {
            Some(driver) => { f(driver)?; Ok(true) }
            None => Ok(false),
        }
    }

    /// Open a new measurement window. Returns `false` if one is already open, in which case
    /// neither the samples nor the start time are touched.
    pub fn start_measuring(&self) -> Result<bool> {
        let mut shared = self.command()?;
        if shared.state() == EngineState::Sampling {
            return Ok(false)
        }
        if !shared.sampler_running {
            return Err(Error::Halted)
        }
        let Some(driver) = shared.driver.as_mut() else { return Err(Error::Halted) };
        driver.start()?;
        shared.buffer.clear();
        shared.window.open(Instant::now());
        shared.set_state(EngineState::Sampling);
        log::debug!("profiler: measuring");
        Ok(true)
    }

    /// Close the current measurement window, waiting for an in-flight poll to complete.
    /// Returns `false` if no window was open.
    pub fn stop_measuring(&self) -> Result<bool> {
        let mut shared = self.command()?;
        close_window(&mut shared)
    }

    pub fn enable_power(&self) -> Result<bool> {
        self.with_device(|driver| driver.set_power(PowerState::On))
    }

    pub fn disable_power(&self) -> Result<bool> {
        self.with_device(|driver| driver.set_power(PowerState::Off))
    }

    pub fn use_source_meter(&self) -> Result<bool> {
        self.with_device(|driver| driver.set_mode(MeterMode::SourceMeter))
    }

    pub fn use_ampere_meter(&self) -> Result<bool> {
        self.with_device(|driver| driver.set_mode(MeterMode::AmpereMeter))
    }

    pub fn set_source_voltage(&self, millivolts: u32) -> Result<bool> {
        validate_source_voltage(millivolts)?;
        let mut shared = self.command()?;
        let Some(driver) = shared.driver.as_mut() else { return Ok(false) };
        driver.set_source_voltage(millivolts)?;
        shared.source_voltage_mv = millivolts;
        Ok(true)
    }

    fn measure<R, F>(&self, f: F) -> R
            where F: FnOnce(&Measurement) -> R {
        let shared = self.gate.lock();
        f(&Measurement::new(&shared.buffer, &shared.window, shared.source_voltage_mv))
    }

    pub fn state(&self) -> EngineState {
        self.gate.lock().state()
    }

    pub fn calibration(&self) -> Calibration {
        self.gate.lock().calibration.clone()
    }

    pub fn source_voltage_mv(&self) -> u32 {
        self.gate.lock().source_voltage_mv
    }

    pub fn window(&self) -> MeasurementWindow {
        self.gate.lock().window
    }

    pub fn sample_count(&self) -> usize {
        self.measure(|measurement| measurement.sample_count())
    }

    pub fn samples(&self) -> Vec<i32> {
        self.gate.lock().buffer.to_vec()
    }

    pub fn min_current_ma(&self) -> Result<f64> {
        self.measure(|measurement| measurement.min_current_ma())
    }

    pub fn max_current_ma(&self) -> Result<f64> {
        self.measure(|measurement| measurement.max_current_ma())
    }

    pub fn average_current_ma(&self) -> f64 {
        self.measure(|measurement| measurement.average_current_ma())
    }

    pub fn average_power_mw(&self) -> f64 {
        self.measure(|measurement| measurement.average_power_mw())
    }

    pub fn measurement_duration_s(&self) -> Result<f64> {
        self.measure(|measurement| measurement.duration_s())
    }

    pub fn average_energy_mwh(&self) -> Result<f64> {
        self.measure(|measurement| measurement.average_energy_mwh())
    }

    pub fn average_charge_mc(&self) -> Result<f64> {
        self.measure(|measurement| measurement.average_charge_mc())
    }

    pub fn chunk_averages(&self, chunk_size: usize) -> Result<Vec<f64>> {
        self.measure(|measurement| measurement.chunk_averages(chunk_size))
    }

    pub fn summary(&self) -> Result<Summary> {
        self.measure(|measurement| measurement.summary())
    }

    /// Stop the sampler, close any open window, power down the device under test, and release
    /// the instrument. Errors are logged, not returned. Calling this more than once is harmless.
    pub fn teardown(&self) {
        let sampler = self.sampler.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.gate.halt();
        {
            let mut shared = self.gate.lock();
            if let Some(error) = shared.fault.take() {
                log::warn!("profiler: sampler had failed: {}", error);
            }
            if let Err(error) = close_window(&mut shared) {
                log::warn!("profiler: cannot stop measuring: {}", error);
                shared.set_state(EngineState::Stopped);
                shared.window.close(Instant::now());
            }
        }
        if let Some(sampler) = sampler {
            log::debug!("profiler: joining sampler");
            if sampler.join().is_err() {
                log::error!("profiler: sampler panicked");
            }
        }
        let mut shared = self.gate.lock();
        if let Some(mut driver) = shared.driver.take() {
            if let Err(error) = driver.set_power(PowerState::Off) {
                log::warn!("profiler: cannot disable power: {}", error);
            }
            drop(driver);
            log::debug!("profiler: released device");
        }
    }
}

impl<D: Driver + 'static> Drop for Profiler<D> {
    fn drop(&mut self) {
        self.teardown()
    }
}

fn discover_port<C: Connector>(connector: &C) -> Result<String> {
    let mut ports = connector.discover()?;
    match ports.len() {
        0 => Err(Error::NotFound),
        1 => {
            let port = ports.remove(0);
            log::debug!("profiler: found instrument at {}", port);
            Ok(port)
        }
        _ => {
            log::warn!("profiler: too many instruments connected: {:?}", ports);
            Err(Error::Ambiguous(ports))
        }
    }
}

fn close_window<D: Driver>(shared: &mut GateGuard<'_, Shared<D>>) -> Result<bool> {
    if shared.state() != EngineState::Sampling {
        return Ok(false)
    }
    // the window stays open until the instrument has actually stopped
    let now = Instant::now();
    if let Some(driver) = shared.driver.as_mut() {
        driver.stop()?;
    }
    shared.set_state(EngineState::Stopped);
    shared.window.close(now);
    log::debug!("profiler: stopped with {} samples", shared.buffer.len());
    if let Some(log) = &shared.log {
        log.append(shared.buffer.iter())?;
    }
    Ok(true)
}
