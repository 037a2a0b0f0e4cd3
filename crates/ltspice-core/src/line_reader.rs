//! Line reader for the 16-bit little-endian header encoding
//!
//! Each header line is a run of 2-byte code units terminated by the unit
//! 0x000A. No bytes past the terminator are consumed, so the inner reader
//! is left positioned at the first byte after the current line.

use crate::types::{RawError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{ErrorKind, Read};

const LINE_FEED: u16 = 0x000A;

pub struct Utf16LineReader<R> {
    inner: R,
    max_line_len: usize,
    units: Vec<u16>,
    lines_read: usize,
    failed: bool,
}

impl<R: Read> Utf16LineReader<R> {
    pub fn new(inner: R, max_line_len: usize) -> Self {
        Self {
            inner,
            max_line_len,
            units: Vec::with_capacity(128),
            lines_read: 0,
            failed: false,
        }
    }

    /// Read the next line without its terminator.
    ///
    /// A stream that ends before the terminator is an error, not an empty
    /// last line.
    pub fn read_line(&mut self) -> Result<String> {
        self.units.clear();
        loop {
            let unit = match self.inner.read_u16::<LittleEndian>() {
                Ok(unit) => unit,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Err(RawError::UnexpectedEof)
                }
                Err(e) => return Err(RawError::Read(e)),
            };
            if unit == LINE_FEED {
                break;
            }
            self.units.push(unit);
            if self.units.len() > self.max_line_len {
                return Err(RawError::LineTooLong {
                    max: self.max_line_len,
                });
            }
        }
        self.lines_read += 1;
        Ok(String::from_utf16_lossy(&self.units))
    }

    /// Number of complete lines returned so far
    #[inline]
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Iterator for Utf16LineReader<R> {
    type Item = Result<String>;

    /// Yields lines until the first error, then stops.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let line = self.read_line();
        if line.is_err() {
            self.failed = true;
        }
        Some(line)
    }
}
