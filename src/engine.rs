use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::{Error, Result};
use crate::sys::Driver;
use crate::params::Calibration;
use crate::buffer::SampleBuffer;
use crate::session::MeasurementWindow;
use crate::sink::SampleLog;
use crate::gate::Gate;

/// State shared between the profiler and the sampler thread. Only accessed through the gate.
#[derive(Debug)]
pub(crate) struct Shared<D> {
    /// `None` once the device has been released.
    pub driver: Option<D>,
    pub calibration: Calibration,
    pub source_voltage_mv: u32,
    pub buffer: SampleBuffer,
    pub window: MeasurementWindow,
    pub log: Option<SampleLog>,
    /// Error that stopped the sampler, until some profiler operation reports it.
    pub fault: Option<Error>,
    pub sampler_running: bool,
}

impl<D: Driver> Shared<D> {
    pub fn new(driver: D, calibration: Calibration, source_voltage_mv: u32,
               buffer: SampleBuffer, log: Option<SampleLog>) -> Shared<D> {
        Shared {
            driver: Some(driver),
            calibration,
            source_voltage_mv,
            buffer,
            window: MeasurementWindow::default(),
            log,
            fault: None,
            sampler_running: true,
        }
    }

    /// Move whatever the driver has accumulated into the buffer.
    fn fetch(&mut self) -> Result<usize> {
        let Some(driver) = self.driver.as_mut() else { return Ok(0) };
        let data = driver.poll()?;
        if data.is_empty() {
            return Ok(0)
        }
        let samples = driver.decode(&data);
        let discarded = self.buffer.extend(&samples);
        if discarded > 0 && self.buffer.discarded() == discarded as u64 {
            log::warn!("sampler: buffer full at {} samples, discarding oldest",
                self.buffer.len());
        }
        Ok(samples.len())
    }
}

pub(crate) struct Sampler<D> {
    gate: Arc<Gate<Shared<D>>>,
    fetch_interval: Duration,
}

impl<D: Driver + 'static> Sampler<D> {
    pub fn new(gate: Arc<Gate<Shared<D>>>, fetch_interval: Duration) -> Sampler<D> {
        Sampler { gate, fetch_interval }
    }

    pub fn run(self) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("powerprof-sampler".into())
            .spawn(move || {
                log::debug!("sampler: started");
                let result = self.sample();
                let mut shared = self.gate.lock();
                shared.sampler_running = false;
                if let Err(error) = result {
                    log::error!("sampler: stopped: {}", error);
                    shared.fault = Some(error);
                } else {
                    log::debug!("sampler: done");
                }
            })?;
        Ok(handle)
    }

    fn sample(&self) -> Result<()> {
        while !self.gate.is_halted() {
            let Some(mut shared) = self.gate.wait_sampling() else { break };
            let fetched = shared.fetch()?;
            if fetched > 0 {
                log::trace!("sampler: fetched {} samples ({} buffered)",
                    fetched, shared.buffer.len());
            }
            drop(shared);
            thread::sleep(self.fetch_interval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gate::EngineState;
    use crate::sim::Simulator;
    use crate::sys::Driver;

    fn gate(simulator: Simulator) -> Arc<Gate<Shared<Simulator>>> {
        Arc::new(Gate::new(Shared::new(
            simulator, Calibration::default(), 3300, SampleBuffer::new(), None)))
    }

    #[test]
    fn test_sampler_appends_while_sampling() {
        let simulator = Simulator::new(|index| index as i32).with_samples_per_poll(10);
        let probe = simulator.probe();
        let gate = gate(simulator);
        let handle = Sampler::new(gate.clone(), Duration::from_millis(1)).run().unwrap();
        {
            let mut shared = gate.lock();
            shared.driver.as_mut().unwrap().start().unwrap();
            shared.set_state(EngineState::Sampling);
        }
        while probe.produced() < 50 {
            thread::sleep(Duration::from_millis(1));
        }
        gate.lock().set_state(EngineState::Stopped);
        let samples = gate.lock().buffer.to_vec();
        assert_eq!(samples.len(), probe.produced());
        assert!(samples.iter().enumerate().all(|(index, &sample)| sample == index as i32));
        gate.halt();
        handle.join().unwrap();
        assert!(!gate.lock().sampler_running);
    }

    #[test]
    fn test_sampler_records_fault() {
        let mut simulator = Simulator::constant(1).failing_after(0);
        simulator.start().unwrap();
        let gate = gate(simulator);
        let handle = Sampler::new(gate.clone(), Duration::from_millis(1)).run().unwrap();
        gate.lock().set_state(EngineState::Sampling);
        handle.join().unwrap();
        let shared = gate.lock();
        assert!(matches!(shared.fault, Some(Error::Driver(_))));
        assert!(!shared.sampler_running);
    }
}
