//! Rewindable chunk sources
//!
//! A [`ChunkSource`] hands out bounded batches of readings. Every call to
//! [`ChunkSource::open`] starts again from the first row, which is what lets
//! the outlier scan make a second pass without keeping the first pass's rows
//! in memory.

use sensorstat_core::{Record, RecordBatch, Schema};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::error::SourceError;
use crate::limits::DEFAULT_CHUNK_SIZE;

/// A tabular input that can be read chunk by chunk, from the start, any number of times.
pub trait ChunkSource {
    /// Iterator over the chunks of one pass.
    type Chunks: Iterator<Item = Result<RecordBatch, SourceError>>;

    /// Begin a fresh pass from the first row.
    fn open(&self) -> Result<Self::Chunks, SourceError>;
}

impl<S: ChunkSource + ?Sized> ChunkSource for &S {
    type Chunks = S::Chunks;

    fn open(&self) -> Result<Self::Chunks, SourceError> {
        (**self).open()
    }
}

/// Maximum number of rows per chunk; always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkSize(NonZeroUsize);

impl ChunkSize {
    pub fn new(rows: usize) -> Result<Self, SourceError> {
        NonZeroUsize::new(rows)
            .map(ChunkSize)
            .ok_or(SourceError::InvalidChunkSize(rows))
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        match NonZeroUsize::new(DEFAULT_CHUNK_SIZE) {
            Some(n) => ChunkSize(n),
            None => ChunkSize(NonZeroUsize::MIN),
        }
    }
}

impl TryFrom<usize> for ChunkSize {
    type Error = SourceError;

    fn try_from(rows: usize) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}

/// Readings held in memory, served in fixed-size chunks
#[derive(Debug, Clone)]
pub struct MemorySource {
    records: Arc<[Record]>,
    schema: Arc<Schema>,
    chunk_size: ChunkSize,
}

impl MemorySource {
    pub fn new(records: Vec<Record>, chunk_size: ChunkSize) -> Self {
        Self {
            records: records.into(),
            schema: Arc::new(Schema::sensor()),
            chunk_size,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }
}

impl ChunkSource for MemorySource {
    type Chunks = MemoryChunks;

    fn open(&self) -> Result<Self::Chunks, SourceError> {
        Ok(MemoryChunks {
            records: Arc::clone(&self.records),
            schema: Arc::clone(&self.schema),
            chunk_size: self.chunk_size.get(),
            position: 0,
        })
    }
}

/// One pass over a [`MemorySource`]
#[derive(Debug)]
pub struct MemoryChunks {
    records: Arc<[Record]>,
    schema: Arc<Schema>,
    chunk_size: usize,
    position: usize,
}

impl Iterator for MemoryChunks {
    type Item = Result<RecordBatch, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.records.len() {
            return None;
        }
        let end = (self.position + self.chunk_size).min(self.records.len());
        let rows = self.records[self.position..end].to_vec();
        self.position = end;
        Some(Ok(RecordBatch::new(Arc::clone(&self.schema), rows)))
    }
}
