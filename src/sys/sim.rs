//! Simulated instrument, for exercising the profiler without hardware attached.
//!
//! Raw data produced by [`Simulator::poll`] is a sequence of little-endian 32-bit words, one per
//! sample, each holding the current in µA.

use std::f32::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{Error, Result};
use crate::params::{Calibration, MeterMode, PowerState};

/// Instrument commands that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetMode,
    SetSourceVoltage,
    SetPower,
    Start,
    Stop,
}

#[derive(Debug, Clone, Default)]
struct SimState {
    failures: Vec<(Command, usize)>,
    mode: MeterMode,
    source_voltage_mv: u32,
    power: PowerState,
    running: bool,
    starts: usize,
    stops: usize,
    polls: usize,
    produced: usize,
}

impl SimState {
    fn check(&mut self, command: Command) -> Result<()> {
        match self.failures.iter_mut().find(|(failing, count)| *failing == command && *count > 0) {
            Some((_, count)) => {
                *count -= 1;
                Err(Error::driver(format!("simulated {:?} failure", command)))
            }
            None => Ok(()),
        }
    }
}

/// Handle for inspecting a [`Simulator`] and injecting command failures, usable after the
/// simulator is moved into a profiler.
#[derive(Debug, Clone, Default)]
pub struct SimulatorProbe(Arc<Mutex<SimState>>);

impl SimulatorProbe {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> MeterMode { self.lock().mode }
    pub fn source_voltage_mv(&self) -> u32 { self.lock().source_voltage_mv }
    pub fn power(&self) -> PowerState { self.lock().power }
    pub fn is_running(&self) -> bool { self.lock().running }
    pub fn starts(&self) -> usize { self.lock().starts }
    pub fn stops(&self) -> usize { self.lock().stops }
    pub fn polls(&self) -> usize { self.lock().polls }
    /// Total number of samples handed out by `poll`.
    pub fn produced(&self) -> usize { self.lock().produced }

    /// Whether the simulator has been dropped, i.e. the device handle was released.
    pub fn is_released(&self) -> bool {
        Arc::strong_count(&self.0) == 1
    }

    /// Make the next `count` invocations of `command` fail without effect.
    pub fn fail_next(&self, command: Command, count: usize) {
        let mut state = self.lock();
        state.failures.retain(|(failing, _)| *failing != command);
        state.failures.push((command, count));
    }
}

pub struct Simulator {
    probe: SimulatorProbe,
    waveform: Box<dyn FnMut(u64) -> i32 + Send>,
    sample_index: u64,
    samples_per_poll: usize,
    calibration: Calibration,
    fail_after: Option<usize>,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("sample_index", &self.sample_index)
            .field("samples_per_poll", &self.samples_per_poll)
            .field("state", &*self.probe.lock())
            .finish_non_exhaustive()
    }
}

impl Simulator {
    /// Create a simulator whose current at sample `n` is `waveform(n)`, in µA.
    pub fn new<F>(waveform: F) -> Simulator
            where F: FnMut(u64) -> i32 + Send + 'static {
        Simulator {
            probe: SimulatorProbe::default(),
            waveform: Box::new(waveform),
            sample_index: 0,
            samples_per_poll: 100,
            calibration: Calibration { calibrated: true, ..Default::default() },
            fail_after: None,
        }
    }

    pub fn constant(micro_amps: i32) -> Simulator {
        Simulator::new(move |_| micro_amps)
    }

    /// A device under test drawing `mean ± amplitude` µA, repeating every `period` samples.
    pub fn sine(mean: i32, amplitude: i32, period: u64) -> Simulator {
        let period = period.max(1);
        Simulator::new(move |index| {
            let phase = (index % period) as f32 / period as f32 * 2.0 * PI;
            mean + (phase.sin() * amplitude as f32) as i32
        })
    }

    pub fn with_samples_per_poll(mut self, samples_per_poll: usize) -> Simulator {
        self.samples_per_poll = samples_per_poll;
        self
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Simulator {
        self.calibration = calibration;
        self
    }

    /// Make every poll after the first `polls` fail.
    pub fn failing_after(mut self, polls: usize) -> Simulator {
        self.fail_after = Some(polls);
        self
    }

    pub fn probe(&self) -> SimulatorProbe {
        self.probe.clone()
    }
}

impl super::Driver for Simulator {
    fn read_calibration(&mut self) -> Result<Calibration> {
        Ok(self.calibration.clone())
    }

    fn set_mode(&mut self, mode: MeterMode) -> Result<()> {
        log::debug!("sim: set_mode({})", mode);
        let mut state = self.probe.lock();
        state.check(Command::SetMode)?;
        state.mode = mode;
        Ok(())
    }

    fn set_source_voltage(&mut self, millivolts: u32) -> Result<()> {
        log::debug!("sim: set_source_voltage({} mV)", millivolts);
        let mut state = self.probe.lock();
        state.check(Command::SetSourceVoltage)?;
        state.source_voltage_mv = millivolts;
        Ok(())
    }

    fn set_power(&mut self, state: PowerState) -> Result<()> {
        log::debug!("sim: set_power({:?})", state);
        let mut sim_state = self.probe.lock();
        sim_state.check(Command::SetPower)?;
        sim_state.power = state;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let mut state = self.probe.lock();
        state.check(Command::Start)?;
        state.running = true;
        state.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.probe.lock();
        state.check(Command::Stop)?;
        state.running = false;
        state.stops += 1;
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<u8>> {
        let mut state = self.probe.lock();
        state.polls += 1;
        if self.fail_after.is_some_and(|fail_after| state.polls > fail_after) {
            return Err(Error::driver("simulated poll failure"))
        }
        if !state.running {
            return Ok(Vec::new())
        }
        let mut data = Vec::with_capacity(self.samples_per_poll * 4);
        for _ in 0..self.samples_per_poll {
            let sample = (self.waveform)(self.sample_index);
            self.sample_index += 1;
            data.extend_from_slice(&sample.to_le_bytes());
        }
        state.produced += self.samples_per_poll;
        log::trace!("sim: polled {} samples", self.samples_per_poll);
        Ok(data)
    }

    fn decode(&mut self, data: &[u8]) -> Vec<i32> {
        data.chunks_exact(4)
            .map(|word| i32::from_le(bytemuck::pod_read_unaligned(word)))
            .collect()
    }
}

/// Connector that "discovers" a fixed set of ports, each backed by a fresh simulator.
pub struct SimConnector {
    ports: Vec<String>,
    make: Box<dyn Fn(&str) -> Simulator + Send + Sync>,
}

impl SimConnector {
    pub fn new<F>(ports: &[&str], make: F) -> SimConnector
            where F: Fn(&str) -> Simulator + Send + Sync + 'static {
        SimConnector {
            ports: ports.iter().map(|&port| port.to_owned()).collect(),
            make: Box::new(make),
        }
    }
}

impl super::Connector for SimConnector {
    type Driver = Simulator;

    fn discover(&self) -> Result<Vec<String>> {
        Ok(self.ports.clone())
    }

    fn open(&self, identifier: &str) -> Result<Simulator> {
        if !self.ports.iter().any(|port| port == identifier) {
            return Err(Error::connection(format!("no instrument at {}", identifier)))
        }
        Ok((self.make)(identifier))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sys::{Connector, Driver};

    #[test]
    fn test_idle_poll_is_empty() {
        let mut sim = Simulator::constant(1000);
        assert!(sim.poll().unwrap().is_empty());
        assert_eq!(sim.probe().polls(), 1);
    }

    #[test]
    fn test_poll_decode() {
        let mut sim = Simulator::new(|index| index as i32 * 10 - 20).with_samples_per_poll(4);
        sim.start().unwrap();
        let data = sim.poll().unwrap();
        assert_eq!(data.len(), 16);
        assert_eq!(sim.decode(&data), vec![-20, -10, 0, 10]);
        let data = sim.poll().unwrap();
        assert_eq!(sim.decode(&data), vec![20, 30, 40, 50]);
        assert_eq!(sim.probe().produced(), 8);
    }

    #[test]
    fn test_decode_ignores_partial_word() {
        let mut sim = Simulator::constant(0);
        assert_eq!(sim.decode(&[0xe8, 0x03, 0x00, 0x00, 0xff]), vec![1000]);
    }

    #[test]
    fn test_sine_stays_in_range() {
        let mut sim = Simulator::sine(5000, 1000, 64).with_samples_per_poll(256);
        sim.start().unwrap();
        let data = sim.poll().unwrap();
        let samples = sim.decode(&data);
        assert!(samples.iter().all(|&sample| (4000..=6000).contains(&sample)));
        assert!(samples.iter().any(|&sample| sample > 5900));
    }

    #[test]
    fn test_failing_after() {
        let mut sim = Simulator::constant(1).failing_after(2);
        assert!(sim.poll().is_ok());
        assert!(sim.poll().is_ok());
        assert!(matches!(sim.poll(), Err(Error::Driver(_))));
    }

    #[test]
    fn test_failing_command() {
        let mut sim = Simulator::constant(1);
        let probe = sim.probe();
        probe.fail_next(Command::Start, 2);
        assert!(matches!(sim.start(), Err(Error::Driver(_))));
        assert!(matches!(sim.start(), Err(Error::Driver(_))));
        assert!(!probe.is_running());
        assert_eq!(probe.starts(), 0);
        sim.start().unwrap();
        assert!(probe.is_running());
        probe.fail_next(Command::SetPower, 1);
        assert!(sim.set_power(PowerState::On).is_err());
        assert_eq!(probe.power(), PowerState::Off);
        sim.stop().unwrap();
    }

    #[test]
    fn test_release_detected() {
        let sim = Simulator::constant(1);
        let probe = sim.probe();
        assert!(!probe.is_released());
        drop(sim);
        assert!(probe.is_released());
    }

    #[test]
    fn test_connector() {
        let connector = SimConnector::new(&["/dev/ttyACM0"], |_| Simulator::constant(1));
        assert_eq!(connector.discover().unwrap(), vec!["/dev/ttyACM0".to_owned()]);
        assert!(connector.open("/dev/ttyACM0").is_ok());
        assert!(matches!(connector.open("/dev/ttyACM1"), Err(Error::Connection(_))));
    }
}
