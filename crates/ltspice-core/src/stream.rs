//! Streaming reader for large raw files
//!
//! This module reads the sample matrix in chunks of points instead of
//! decoding the whole file upfront.
//!
//! Design principles:
//! - Only the header is parsed at open() time
//! - Points are read on-demand during iteration, never split across chunks
//! - Peak memory is O(chunk_size * num_signals), not O(file_size)
//! - Column-major (`fastaccess`) files are rejected at open time

use crate::header::parse_header;
use crate::line_reader::Utf16LineReader;
use crate::sample_reader::{allocate_vectors, SampleSource};
use crate::types::{Layout, Metadata, RawError, ReadOptions, Result, VectorData};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, instrument, trace};

/// Default chunk size (maximum number of points per chunk)
pub const DEFAULT_CHUNK_SIZE: usize = 10000;

/// A chunk of data from the streaming reader
#[derive(Debug, Clone)]
pub struct DataChunk {
    /// Index of this chunk (0-based)
    pub chunk_index: usize,
    /// Points covered by this chunk as `(start, end)`, end exclusive
    pub point_range: (usize, usize),
    /// Signal data for this chunk
    pub data: HashMap<String, VectorData>,
}

impl DataChunk {
    /// Number of points in this chunk
    pub fn len(&self) -> usize {
        self.point_range.1 - self.point_range.0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Streaming reader for raw files
pub struct RawStreamReader<R> {
    source: SampleSource<R>,
    metadata: Metadata,
    /// Maximum points per chunk
    chunk_size: usize,
    /// Current chunk index
    current_chunk: usize,
    /// First point of the next chunk
    next_point: usize,
    /// Cap on samples reserved per vector before a chunk is read
    prealloc_limit: usize,
    /// Signal filter (None = all signals)
    signal_filter: Option<HashSet<String>>,
    /// Whether we've reached end of data or hit an error
    finished: bool,
}

impl RawStreamReader<BufReader<File>> {
    /// Open a file for streaming read
    ///
    /// Only parses the header. Data is read on-demand.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: usize) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|source| RawError::Open {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), chunk_size)
    }
}

impl<R: Read> RawStreamReader<R> {
    pub fn from_reader(reader: R, chunk_size: usize) -> Result<Self> {
        Self::from_reader_with_options(reader, chunk_size, &ReadOptions::default())
    }

    pub fn from_reader_with_options(
        reader: R,
        chunk_size: usize,
        options: &ReadOptions,
    ) -> Result<Self> {
        let mut lines = Utf16LineReader::new(reader, options.max_line_len);
        let metadata = parse_header(&mut lines)?;

        if metadata.layout() == Layout::ColumnMajor {
            return Err(RawError::Unsupported(
                "column-major (fastaccess) files cannot be streamed by point".into(),
            ));
        }

        info!(
            signals = metadata.variables.len(),
            points = metadata.num_points,
            chunk_size,
            "Stream reader opened"
        );

        let source = SampleSource::new(lines, metadata.section);
        Ok(Self {
            source,
            metadata,
            chunk_size: chunk_size.max(1),
            current_chunk: 0,
            next_point: 0,
            prealloc_limit: options.prealloc_limit,
            signal_filter: None,
            finished: false,
        })
    }

    /// Set signal filter to only read specific signals
    pub fn with_signals(mut self, signals: Vec<String>) -> Self {
        self.signal_filter = Some(signals.into_iter().collect());
        self
    }

    /// Get file metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Number of points consumed so far
    pub fn points_read(&self) -> usize {
        self.next_point
    }

    /// Check if signal should be included based on filter
    #[inline]
    fn should_include_signal(&self, name: &str) -> bool {
        self.signal_filter
            .as_ref()
            .map(|f| f.contains(name))
            .unwrap_or(true)
    }

    fn read_chunk(&mut self) -> Result<Option<DataChunk>> {
        let num_points = self.metadata.num_points;
        if self.finished || self.next_point >= num_points {
            self.finished = true;
            return Ok(None);
        }

        let start = self.next_point;
        let end = start.saturating_add(self.chunk_size).min(num_points);
        let capacity = (end - start).min(self.prealloc_limit);
        let mut vectors = allocate_vectors(&self.metadata.variables, capacity);
        for point in start..end {
            self.source
                .read_row(point, &self.metadata.variables, &mut vectors)?;
        }
        self.next_point = end;

        let data = self
            .metadata
            .variables
            .iter()
            .zip(vectors)
            .filter(|(var, _)| self.should_include_signal(&var.name))
            .map(|(var, vector)| (var.name.clone(), vector))
            .collect();

        Ok(Some(DataChunk {
            chunk_index: self.current_chunk,
            point_range: (start, end),
            data,
        }))
    }
}

impl<R: Read> Iterator for RawStreamReader<R> {
    type Item = Result<DataChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_chunk() {
            Ok(Some(chunk)) => {
                trace!(
                    chunk = chunk.chunk_index,
                    start = chunk.point_range.0,
                    end = chunk.point_range.1,
                    "Chunk built"
                );
                self.current_chunk += 1;
                Some(Ok(chunk))
            }
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Open a file for streaming read with default chunk size
pub fn read_stream<P: AsRef<Path>>(path: P) -> Result<RawStreamReader<BufReader<File>>> {
    RawStreamReader::open(path, DEFAULT_CHUNK_SIZE)
}

/// Open a file for streaming read with custom chunk size
pub fn read_stream_chunked<P: AsRef<Path>>(
    path: P,
    chunk_size: usize,
) -> Result<RawStreamReader<BufReader<File>>> {
    RawStreamReader::open(path, chunk_size)
}

/// Open a file for streaming read with signal filter
pub fn read_stream_signals<P: AsRef<Path>>(
    path: P,
    signals: &[&str],
    chunk_size: usize,
) -> Result<RawStreamReader<BufReader<File>>> {
    let reader = RawStreamReader::open(path, chunk_size)?;
    Ok(reader.with_signals(signals.iter().map(|s| s.to_string()).collect()))
}
