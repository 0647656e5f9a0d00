use crate::Result;
use crate::params::{Calibration, MeterMode, PowerState};

/// Finds and opens instruments.
pub trait Connector {
    type Driver: Driver;

    /// Identifiers (usually serial port names) of every attached instrument.
    fn discover(&self) -> Result<Vec<String>>;

    fn open(&self, identifier: &str) -> Result<Self::Driver>;
}

/// Blocking interface to an open instrument.
///
/// Every call is expected to return in bounded time. A call that hangs stalls the sampler
/// and any profiler operation waiting for it.
pub trait Driver: Send {
    fn read_calibration(&mut self) -> Result<Calibration>;

    fn set_mode(&mut self, mode: MeterMode) -> Result<()>;
    fn set_source_voltage(&mut self, millivolts: u32) -> Result<()>;
    fn set_power(&mut self, state: PowerState) -> Result<()>;

    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;

    /// Fetch raw data received since the previous poll; possibly empty.
    fn poll(&mut self) -> Result<Vec<u8>>;
    /// Convert raw data into current samples in µA, in the order they were taken.
    fn decode(&mut self, data: &[u8]) -> Vec<i32>;
}

pub mod sim;
