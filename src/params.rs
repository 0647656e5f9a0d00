//! Low-level parameters of the instrument: operating mode, DUT power, calibration.

use std::fmt;

/// Lowest voltage the source meter can supply.
pub const MIN_SOURCE_VOLTAGE_MV: u32 = 800;
/// Highest voltage the source meter can supply.
pub const MAX_SOURCE_VOLTAGE_MV: u32 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeterMode {
    /// The instrument powers the device under test and measures the current it draws.
    #[default]
    SourceMeter,
    /// The instrument is placed in series with an external supply and only measures.
    AmpereMeter,
}

impl fmt::Display for MeterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceMeter => write!(f, "source meter"),
            Self::AmpereMeter => write!(f, "ampere meter"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    #[default]
    Off,
    On,
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on { PowerState::On } else { PowerState::Off }
    }
}

/// Calibration data stored in the instrument, read once when the device is opened.
///
/// The sampling engine treats this as opaque; it is only used to verify that the connection
/// is talking to a working, calibrated instrument. Decoding raw samples is the driver's job.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub calibrated: bool,
    /// Shunt resistances for each measurement range, in ohms.
    pub resistors: [f32; 5],
    pub gain_offsets: [f32; 5],
    pub user_gains: [f32; 5],
    pub hardware_revision: Option<u32>,
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration {
            calibrated: false,
            resistors: [1031.64, 101.65, 10.15, 0.94, 0.043],
            gain_offsets: [0.0; 5],
            user_gains: [1.0; 5],
            hardware_revision: None,
        }
    }
}

impl Calibration {
    /// Check that the data could have come from a real instrument.
    ///
    /// A device that answers the calibration request with zeroed or non-finite shunt values
    /// is most likely not the instrument we expect at the other end of the port.
    pub fn verify(&self) -> Result<(), String> {
        for (range, &resistor) in self.resistors.iter().enumerate() {
            if !resistor.is_finite() || resistor <= 0.0 {
                return Err(format!("range {} shunt resistance is {}", range, resistor))
            }
        }
        for (range, &gain) in self.user_gains.iter().enumerate() {
            if !gain.is_finite() || gain == 0.0 {
                return Err(format!("range {} user gain is {}", range, gain))
            }
        }
        Ok(())
    }
}
