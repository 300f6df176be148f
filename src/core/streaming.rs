//! Streaming ingestion for the DDoS flow analyzer.
//!
//! Large inputs are read incrementally and emitted as fixed-size batches of
//! normalized records, so the window grouper can be fed without
//! materializing the whole file. The whole-file path reuses the same
//! reader, so both callers share one code path.

use std::fs::File;
use std::path::Path;

use csv::{Reader, ReaderBuilder, StringRecord};
use log::{debug, info};
use thiserror::Error;

use crate::core::normalizer::{LogRecord, RecordNormalizer};
use crate::models::ColumnMap;

/// Default number of records per emitted batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Errors that terminate an ingestion run
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Incremental CSV reader emitting batches of normalized records.
///
/// Rows that fail normalization are skipped with a warning and counted;
/// read failures of the underlying source are terminal for the run.
#[derive(Debug)]
pub struct StreamingReader {
    path: String,
    reader: Option<Reader<File>>,
    normalizer: RecordNormalizer,
    batch_size: usize,
    row: usize,
    rejected: u64,
}

impl StreamingReader {
    /// Open a flow log file for batched reading.
    ///
    /// # Arguments
    ///
    /// * `path` - The CSV file to read
    /// * `columns` - Column-name mapping for the source format
    /// * `batch_size` - Records per emitted batch; the final batch may be partial
    pub fn open(
        path: &Path,
        columns: &ColumnMap,
        batch_size: usize,
    ) -> Result<Self, IngestError> {
        let display = path.display().to_string();

        // Flexible parsing: ragged rows are a row-level defect handled by
        // the normalizer, not a reason to abort the run.
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|source| IngestError::Open {
                path: display.clone(),
                source,
            })?;
        let headers = reader
            .headers()
            .map_err(|source| IngestError::Open {
                path: display.clone(),
                source,
            })?
            .clone();

        Ok(Self {
            path: display,
            reader: Some(reader),
            normalizer: RecordNormalizer::new(columns, &headers),
            batch_size: batch_size.max(1),
            row: 0,
            rejected: 0,
        })
    }

    /// Emit the next batch of normalized records.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(batch))` with up to `batch_size` records
    /// * `Ok(None)` at end of input or after [`stop`](Self::stop)
    /// * `Err(IngestError)` on a source read failure; the run must abort
    pub fn next_batch(&mut self) -> Result<Option<Vec<LogRecord>>, IngestError> {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Ok(None),
        };

        let mut batch = Vec::with_capacity(self.batch_size);
        let mut raw = StringRecord::new();
        let mut eof = false;
        while batch.len() < self.batch_size {
            let more = reader.read_record(&mut raw).map_err(|source| {
                IngestError::Read {
                    path: self.path.clone(),
                    source,
                }
            })?;
            if !more {
                eof = true;
                break;
            }
            self.row += 1;
            match self.normalizer.normalize(&raw, self.row) {
                Ok(record) => batch.push(record),
                Err(_) => self.rejected += 1,
            }
        }
        if eof {
            self.reader = None;
        }

        if batch.is_empty() {
            Ok(None)
        } else {
            debug!("emitting batch of {} records", batch.len());
            Ok(Some(batch))
        }
    }

    /// Stop the reader: no further batches are emitted and the underlying
    /// file handle is released. Any partially read batch is discarded.
    pub fn stop(&mut self) {
        self.reader = None;
    }

    /// Rows skipped so far due to normalization failures
    pub fn rejected_rows(&self) -> u64 {
        self.rejected
    }

    /// Data rows consumed so far, valid or not
    pub fn rows_read(&self) -> usize {
        self.row
    }
}

/// Read a whole flow log file into memory.
///
/// Returns the normalized records and the count of rejected rows. Shares
/// the batched reader with the streaming path.
pub fn read_flow_file(
    path: &Path,
    columns: &ColumnMap,
) -> Result<(Vec<LogRecord>, u64), IngestError> {
    let mut reader = StreamingReader::open(path, columns, DEFAULT_BATCH_SIZE)?;
    let mut records = Vec::new();
    while let Some(batch) = reader.next_batch()? {
        records.extend(batch);
    }
    info!(
        "read {} records from {} ({} rows rejected)",
        records.len(),
        path.display(),
        reader.rejected_rows()
    );
    Ok((records, reader.rejected_rows()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "timestamp,src_ip,dst_ip,fwd_packets,flow_duration,total_length,label\n";

    fn write_fixture(rows: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        for i in 0..rows {
            writeln!(
                file,
                "{},203.0.113.{},198.51.100.7,1,0.5,512,BENIGN",
                1543660200 + i as i64,
                i % 4
            )
            .unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_batches_cover_input_with_final_partial() {
        let file = write_fixture(2503);
        let mut reader =
            StreamingReader::open(file.path(), &ColumnMap::default(), 1000).unwrap();

        let mut sizes = Vec::new();
        while let Some(batch) = reader.next_batch().unwrap() {
            sizes.push(batch.len());
        }
        assert_eq!(sizes, vec![1000, 1000, 503]);
        assert!(reader.next_batch().unwrap().is_none());
        assert_eq!(reader.rejected_rows(), 0);
    }

    #[test]
    fn test_invalid_rows_are_skipped_not_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        writeln!(file, "1543660200,203.0.113.5,198.51.100.7,1,0.5,512,BENIGN").unwrap();
        // Missing source address
        writeln!(file, "1543660201,,198.51.100.7,1,0.5,512,BENIGN").unwrap();
        // Ragged short row
        writeln!(file, "1543660202,203.0.113.5").unwrap();
        writeln!(file, "1543660203,203.0.113.6,198.51.100.7,2,0.5,512,BENIGN").unwrap();
        file.flush().unwrap();

        let (records, rejected) =
            read_flow_file(file.path(), &ColumnMap::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(rejected, 2);
        assert_eq!(records[1].request_count, 2);
    }

    #[test]
    fn test_stop_halts_emission() {
        let file = write_fixture(500);
        let mut reader =
            StreamingReader::open(file.path(), &ColumnMap::default(), 100).unwrap();

        assert!(reader.next_batch().unwrap().is_some());
        reader.stop();
        assert!(reader.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_terminal() {
        let err = StreamingReader::open(
            Path::new("/nonexistent/flows.csv"),
            &ColumnMap::default(),
            100,
        )
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/flows.csv"));
    }

    #[test]
    fn test_whole_file_and_streamed_records_match() {
        let file = write_fixture(137);
        let (whole, _) = read_flow_file(file.path(), &ColumnMap::default()).unwrap();

        let mut reader =
            StreamingReader::open(file.path(), &ColumnMap::default(), 10).unwrap();
        let mut streamed = Vec::new();
        while let Some(batch) = reader.next_batch().unwrap() {
            streamed.extend(batch);
        }

        assert_eq!(whole.len(), streamed.len());
        for (a, b) in whole.iter().zip(&streamed) {
            assert_eq!(a.timestamp, b.timestamp);
            assert_eq!(a.source, b.source);
        }
    }
}
