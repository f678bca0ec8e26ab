//! CSV reading file source
//!
//! Reads files of the form
//!
//! ```text
//! time,site,device,metric,unit,value
//! 2025-01-01 00:00:00 +0000 UTC,site_0,device_000,temp,C,21.4
//! 2025-01-01 00:00:00 +0000 UTC,site_0,device_000,hum,%,40.2
//! ```
//!
//! one chunk at a time without loading the whole file. Columns may appear in
//! any order and extra columns are ignored. An empty `value` cell reads as
//! NaN, which the aggregator does not count.

use csv::StringRecord;
use sensorstat_core::time::parse_timestamp;
use sensorstat_core::{Column, Record, RecordBatch, Schema};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::SourceError;
use crate::limits::READ_BUFFER_BYTES;
use crate::source::{ChunkSize, ChunkSource};

/// A CSV file read in chunks of `chunk_size` rows
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    chunk_size: ChunkSize,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, chunk_size: ChunkSize) -> Self {
        Self {
            path: path.into(),
            chunk_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }
}

impl ChunkSource for CsvSource {
    type Chunks = CsvChunkReader<BufReader<File>>;

    fn open(&self) -> Result<Self::Chunks, SourceError> {
        debug!(path = %self.path.display(), "opening CSV source");
        let file = File::open(&self.path)?;
        CsvChunkReader::new(
            BufReader::with_capacity(READ_BUFFER_BYTES, file),
            self.chunk_size,
        )
    }
}

/// Position of each reading column within a CSV row
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    time: usize,
    site: usize,
    device: usize,
    metric: usize,
    unit: usize,
    value: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self, SourceError> {
        let find = |column: Column| {
            headers
                .iter()
                .position(|h| h.trim() == column.name())
                .ok_or_else(|| SourceError::MissingColumn(column.name().to_string()))
        };
        Ok(Self {
            time: find(Column::Time)?,
            site: find(Column::Site)?,
            device: find(Column::Device)?,
            metric: find(Column::Metric)?,
            unit: find(Column::Unit)?,
            value: find(Column::Value)?,
        })
    }
}

/// Streaming chunk reader over any CSV byte stream
pub struct CsvChunkReader<R: Read> {
    reader: csv::Reader<R>,
    index: ColumnIndex,
    schema: Arc<Schema>,
    chunk_size: usize,
    record: StringRecord,
    rows_read: u64,
    done: bool,
}

impl<R: Read> CsvChunkReader<R> {
    /// Read the header row and prepare to stream chunks.
    pub fn new(reader: R, chunk_size: ChunkSize) -> Result<Self, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let index = ColumnIndex::from_headers(&headers)?;

        Ok(Self {
            reader,
            index,
            schema: Arc::new(Schema::sensor()),
            chunk_size: chunk_size.get(),
            record: StringRecord::new(),
            rows_read: 0,
            done: false,
        })
    }

    /// Data rows read so far in this pass
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn parse_row(&self) -> Result<Record, SourceError> {
        let line = self
            .record
            .position()
            .map(|p| p.line())
            .unwrap_or(self.rows_read + 1);
        let field = |i: usize| self.record.get(i).unwrap_or("");

        let time = parse_timestamp(field(self.index.time)).map_err(|e| SourceError::Parse {
            line,
            reason: e.to_string(),
        })?;

        let raw_value = field(self.index.value);
        let value = if raw_value.is_empty() {
            f64::NAN
        } else {
            raw_value.parse::<f64>().map_err(|_| SourceError::Parse {
                line,
                reason: format!("invalid value '{}'", raw_value),
            })?
        };

        Ok(Record::new(
            time,
            field(self.index.site),
            field(self.index.device),
            field(self.index.metric),
            field(self.index.unit),
            value,
        ))
    }

    fn read_chunk(&mut self) -> Result<Option<RecordBatch>, SourceError> {
        let mut rows = Vec::with_capacity(self.chunk_size.min(4096));
        while rows.len() < self.chunk_size {
            if !self.reader.read_record(&mut self.record)? {
                break;
            }
            self.rows_read += 1;
            rows.push(self.parse_row()?);
        }
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(RecordBatch::new(Arc::clone(&self.schema), rows)))
    }
}

impl<R: Read> Iterator for CsvChunkReader<R> {
    type Item = Result<RecordBatch, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_chunk() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                // A failed pass is not resumed
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
