mod sys;
mod config;
mod params;
mod buffer;
mod session;
mod sink;
mod gate;
mod engine;
mod profiler;

use std::io;

#[derive(Debug)]
pub enum Error {
    NotFound,
    Ambiguous(Vec<String>),
    Connection(Box<dyn std::error::Error + Sync + Send + 'static>),
    Calibration(String),
    Driver(Box<dyn std::error::Error + Sync + Send + 'static>),
    EmptyBuffer,
    InvalidWindow,
    Halted,
    Configuration(String),
    Io(io::Error),
    Csv(csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Calibration,
    Driver,
    EmptyBuffer,
    InvalidWindow,
    Configuration,
    Io,
}

impl Error {
    pub fn connection<E>(error: E) -> Error
            where E: Into<Box<dyn std::error::Error + Sync + Send + 'static>> {
        Error::Connection(error.into())
    }

    pub fn driver<E>(error: E) -> Error
            where E: Into<Box<dyn std::error::Error + Sync + Send + 'static>> {
        Error::Driver(error.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound | Self::Ambiguous(_) | Self::Connection(_) =>
                ErrorKind::Connection,
            Self::Calibration(_) =>
                ErrorKind::Calibration,
            Self::Driver(_) | Self::Halted =>
                ErrorKind::Driver,
            Self::EmptyBuffer =>
                ErrorKind::EmptyBuffer,
            Self::InvalidWindow =>
                ErrorKind::InvalidWindow,
            Self::Configuration(_) =>
                ErrorKind::Configuration,
            Self::Io(_) | Self::Csv(_) =>
                ErrorKind::Io,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::NotFound =>
                write!(f, "device not connected"),
            Self::Ambiguous(ports) =>
                write!(f, "more than one device connected: {}", ports.join(", ")),
            Self::Connection(error) =>
                write!(f, "cannot open device: {}", error),
            Self::Calibration(reason) =>
                write!(f, "device verification failed: {}", reason),
            Self::Driver(error) =>
                write!(f, "driver error: {}", error),
            Self::EmptyBuffer =>
                write!(f, "no samples in buffer"),
            Self::InvalidWindow =>
                write!(f, "measurement window is not closed"),
            Self::Halted =>
                write!(f, "sampler is not running"),
            Self::Configuration(reason) =>
                write!(f, "invalid configuration: {}", reason),
            Self::Io(io_error) =>
                write!(f, "I/O error: {}", io_error),
            Self::Csv(csv_error) =>
                write!(f, "CSV error: {}", csv_error),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connection(error) | Self::Driver(error) => Some(error.as_ref()),
            Self::Io(io_error) => Some(io_error),
            Self::Csv(csv_error) => Some(csv_error),
            _ => None
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(error) => error,
            Err(error) => Error::Io(error),
        }
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Error::Csv(error)
    }
}

pub type Result<T> =
    core::result::Result<T, Error>;

pub use sys::{
    Connector,
    Driver,
};

pub mod sim {
    pub use crate::sys::sim::{
        Command,
        SimConnector,
        Simulator,
        SimulatorProbe,
    };
}

pub use config::ProfilerConfiguration;

pub use params::{
    MeterMode,
    PowerState,
    Calibration,
    MIN_SOURCE_VOLTAGE_MV,
    MAX_SOURCE_VOLTAGE_MV,
};

pub use buffer::SampleBuffer;

pub use session::{
    MeasurementWindow,
    Measurement,
    Summary,
};

pub use sink::SampleLog;

pub use gate::EngineState;

pub use profiler::Profiler;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::NotFound.kind(), ErrorKind::Connection);
        assert_eq!(Error::Ambiguous(vec!["a".into(), "b".into()]).kind(), ErrorKind::Connection);
        assert_eq!(Error::Calibration("x".into()).kind(), ErrorKind::Calibration);
        assert_eq!(Error::driver("poll failed").kind(), ErrorKind::Driver);
        assert_eq!(Error::EmptyBuffer.kind(), ErrorKind::EmptyBuffer);
        assert_eq!(Error::InvalidWindow.kind(), ErrorKind::InvalidWindow);
    }

    #[test]
    fn test_io_error_roundtrip() {
        let error = io::Error::new(io::ErrorKind::Other, Error::EmptyBuffer);
        assert!(matches!(Error::from(error), Error::EmptyBuffer));
        let error = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(matches!(Error::from(error), Error::Io(_)));
    }

    #[test]
    fn test_ambiguous_display() {
        let error = Error::Ambiguous(vec!["/dev/ttyACM0".into(), "/dev/ttyACM2".into()]);
        assert_eq!(error.to_string(), "more than one device connected: /dev/ttyACM0, /dev/ttyACM2");
    }
}
