//! # LTspice Raw File Reader - Core Library
//!
//! A library for decoding LTspice `.raw` waveform files.
//!
//! ## Format
//!
//! - Header: `key: value` lines and a variable table, written as 16-bit
//!   little-endian code units and ended by a `Binary:` or `Values:` line
//! - Body: one field per variable per point; 4-byte float32, 8-byte float64
//!   or 16-byte complex float64 pairs, little-endian
//!
//! ## Features
//!
//! - Memory-mapped file I/O for files on disk
//! - Decoding from any `std::io::Read` stream
//! - Row-major and column-major (`fastaccess`) sample layouts
//! - Streaming reader for processing very large files
//! - Structured logging via `tracing` for diagnostics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ltspice_core::{read, VectorData};
//!
//! let result = read("simulation.raw").unwrap();
//! println!("Plot: {}", result.metadata.plotname);
//!
//! // Access by name
//! if let Some(VectorData::Real(vout)) = result.get("V(out)") {
//!     println!("V(out): {} points", vout.len());
//! }
//!
//! // Declared order
//! for (var, data) in result.iter() {
//!     println!("{}: {} bytes/sample, {} points", var.name, var.width, data.len());
//! }
//! ```
//!
//! ## Streaming for Large Files
//!
//! ```rust,no_run
//! use ltspice_core::read_stream;
//!
//! let reader = read_stream("large_file.raw").unwrap();
//! for chunk in reader {
//!     let chunk = chunk.unwrap();
//!     println!("Chunk {}: {:?}", chunk.chunk_index, chunk.point_range);
//! }
//! ```
//!
//! ## Enabling Logging
//!
//! This library uses `tracing` for structured logging. To see log output,
//! initialize a tracing subscriber in your application:
//!
//! ```rust,ignore
//! // Add tracing-subscriber to your Cargo.toml
//! tracing_subscriber::fmt::init();
//!
//! // Now library logs will be visible
//! let result = ltspice_core::read("simulation.raw").unwrap();
//! ```

mod header;
mod line_reader;
mod parser;
mod sample_reader;
mod stream;
mod types;

use std::io::Read;
use std::path::Path;

// Re-export public types
pub use types::{
    // Core result types
    Dataset,
    DataSection,
    FieldWidth,
    Flags,
    HeaderFields,
    Layout,
    Metadata,
    // Error types
    RawError,
    // Configuration
    ReadOptions,
    Result,
    Variable,
    VectorData,
    // Constants
    BINARY_MARKER,
    DEFAULT_MAX_LINE_LEN,
    DEFAULT_PREALLOC_LIMIT,
    MAX_FIELD_WIDTH,
    VALUES_MARKER,
};

// Re-export the header line reader for callers with their own framing
pub use line_reader::Utf16LineReader;

// Re-export streaming types
pub use stream::{
    read_stream, read_stream_chunked, read_stream_signals, DataChunk, RawStreamReader,
    DEFAULT_CHUNK_SIZE,
};

// ============================================================================
// Public API Functions
// ============================================================================

/// Read a raw file from disk.
///
/// The file is memory-mapped for the duration of the call and released on
/// every return path.
///
/// # Arguments
/// * `path` - Path to the `.raw` file
///
/// # Returns
/// * `Ok(Dataset)` - Parsed simulation data
/// * `Err(RawError)` - The first error encountered; no partial data
///
/// # Example
/// ```rust,no_run
/// let result = ltspice_core::read("simulation.raw").unwrap();
/// println!("Title: {}", result.metadata.title);
///
/// if let Some(vout) = result.get("V(out)") {
///     println!("V(out): {} points", vout.len());
/// }
/// ```
pub fn read<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    parser::read_impl(path.as_ref(), &ReadOptions::default())
}

/// Read a raw file from disk with custom options.
pub fn read_with_options<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<Dataset> {
    parser::read_impl(path.as_ref(), options)
}

/// Decode a raw file from an open byte stream.
///
/// The header is read two bytes at a time, so wrap unbuffered sources such
/// as `File` in a `BufReader`. The caller keeps ownership of the stream.
pub fn read_from<R: Read>(reader: R) -> Result<Dataset> {
    parser::decode(reader, &ReadOptions::default())
}

/// Decode a raw file from an open byte stream with custom options.
pub fn read_from_with_options<R: Read>(reader: R, options: &ReadOptions) -> Result<Dataset> {
    parser::decode(reader, options)
}

/// Decode a raw file already held in memory.
///
/// Like [`read`], a binary section shorter than the header declares is
/// rejected before any sample is decoded.
pub fn read_bytes(data: &[u8]) -> Result<Dataset> {
    parser::decode_slice(data, &ReadOptions::default())
}

/// Parse only the header of a raw file on disk.
pub fn read_header<P: AsRef<Path>>(path: P) -> Result<Metadata> {
    parser::read_header_impl(path.as_ref(), &ReadOptions::default())
}

/// Parse only the header from an open byte stream.
///
/// On success the stream is positioned at the first byte of the sample
/// section.
pub fn read_header_from<R: Read>(reader: R) -> Result<Metadata> {
    parser::decode_header(reader, &ReadOptions::default())
}
