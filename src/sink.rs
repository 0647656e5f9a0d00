//! CSV log of raw samples.
//!
//! The file starts with a `ts,avg1000` header. Each closed measurement window appends one row
//! per sample, in buffer order: the local time the window was flushed, formatted as
//! `DD-MM-YYYY HH:MM:SS.ffffff`, and the raw current in µA.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::Result;

const HEADER: [&str; 2] = ["ts", "avg1000"];
const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S%.6f";

#[derive(Debug)]
pub struct SampleLog {
    path: PathBuf,
}

impl SampleLog {
    /// Create (or truncate) the log file and write the header row.
    pub fn create(path: impl AsRef<Path>) -> Result<SampleLog> {
        let path = path.as_ref().to_owned();
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(HEADER)?;
        writer.flush()?;
        log::info!("sample log: created '{}'", path.display());
        Ok(SampleLog { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append every sample as one row, all stamped with the current local time.
    pub fn append<I>(&self, samples: I) -> Result<usize>
            where I: IntoIterator<Item = i32> {
        let file: File = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let mut count = 0;
        for sample in samples {
            writer.write_record([timestamp.as_str(), sample.to_string().as_str()])?;
            count += 1;
        }
        writer.flush()?;
        log::debug!("sample log: appended {} rows to '{}'", count, self.path.display());
        Ok(count)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        let log = SampleLog::create(&path).unwrap();
        assert_eq!(log.path(), path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ts,avg1000\n");
    }

    #[test]
    fn test_append_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        let log = SampleLog::create(&path).unwrap();
        assert_eq!(log.append([1000, -20, 3000]).unwrap(), 3);
        assert_eq!(log.append([]).unwrap(), 0);
        assert_eq!(log.append([42]).unwrap(), 1);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap(), vec!["ts", "avg1000"]);
        let rows = reader.records().collect::<core::result::Result<Vec<_>, _>>().unwrap();
        let values = rows.iter().map(|row| row[1].parse::<i32>().unwrap()).collect::<Vec<_>>();
        assert_eq!(values, vec![1000, -20, 3000, 42]);
        for row in rows.iter() {
            chrono::NaiveDateTime::parse_from_str(&row[0], TIMESTAMP_FORMAT).unwrap();
            assert_eq!(row[0].len(), "18-10-2026 12:00:00.000000".len());
        }
    }

    #[test]
    fn test_create_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        SampleLog::create(&path).unwrap().append([1, 2]).unwrap();
        SampleLog::create(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ts,avg1000\n");
    }
}
