//! Sample matrix reader
//!
//! Decodes the section after the header terminator into one vector per
//! variable. Field widths come from the frozen [`Metadata`], so the header
//! must be fully parsed before the first sample is read.

use crate::line_reader::Utf16LineReader;
use crate::types::{
    DataSection, FieldWidth, Layout, Metadata, RawError, Result, Variable, VectorData,
    MAX_FIELD_WIDTH,
};
use byteorder::{ByteOrder, LittleEndian};
use num_complex::Complex64;
use std::io::{ErrorKind, Read};
use tracing::debug;

// ============================================================================
// Field Decoding
// ============================================================================

/// One decoded field
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Sample {
    Real(f64),
    Complex(Complex64),
}

/// Decode a little-endian field; `bytes` holds at least `width.bytes()`
#[inline]
pub(crate) fn decode_field(width: FieldWidth, bytes: &[u8]) -> Sample {
    match width {
        FieldWidth::Single => Sample::Real(LittleEndian::read_f32(&bytes[..4]) as f64),
        FieldWidth::Double => Sample::Real(LittleEndian::read_f64(&bytes[..8])),
        FieldWidth::Complex => Sample::Complex(Complex64::new(
            LittleEndian::read_f64(&bytes[..8]),
            LittleEndian::read_f64(&bytes[8..16]),
        )),
    }
}

fn parse_text_sample(text: &str, var: &Variable, point: usize) -> Result<Sample> {
    let invalid = || RawError::InvalidSample {
        point,
        variable: var.name.clone(),
        text: text.to_string(),
    };

    if var.width.is_complex() {
        let (re, im) = text.split_once(',').ok_or_else(invalid)?;
        let re = re.trim().parse().map_err(|_| invalid())?;
        let im = im.trim().parse().map_err(|_| invalid())?;
        Ok(Sample::Complex(Complex64::new(re, im)))
    } else {
        text.parse().map(Sample::Real).map_err(|_| invalid())
    }
}

/// Append a sample to the vector of its column
#[inline]
pub(crate) fn push_sample(vector: &mut VectorData, sample: Sample) {
    match (vector, sample) {
        (VectorData::Real(v), Sample::Real(x)) => v.push(x),
        (VectorData::Complex(v), Sample::Complex(c)) => v.push(c),
        (VectorData::Real(v), Sample::Complex(c)) => v.push(c.re),
        (VectorData::Complex(v), Sample::Real(x)) => v.push(Complex64::new(x, 0.0)),
    }
}

// ============================================================================
// Sample Source
// ============================================================================

/// Where samples come from once the header has been consumed
pub(crate) enum SampleSource<R> {
    Binary {
        reader: R,
        /// Reused for every field, sized for the widest one
        scratch: [u8; MAX_FIELD_WIDTH],
    },
    Values {
        lines: Utf16LineReader<R>,
    },
}

impl<R: Read> SampleSource<R> {
    pub(crate) fn new(lines: Utf16LineReader<R>, section: DataSection) -> Self {
        match section {
            DataSection::Binary => SampleSource::Binary {
                reader: lines.into_inner(),
                scratch: [0u8; MAX_FIELD_WIDTH],
            },
            DataSection::Values => SampleSource::Values { lines },
        }
    }

    /// Read exactly one field for `var`
    pub(crate) fn read_sample(&mut self, point: usize, var: &Variable) -> Result<Sample> {
        let truncated = || RawError::Truncated {
            point,
            variable: var.name.clone(),
        };

        match self {
            SampleSource::Binary { reader, scratch } => {
                let field = &mut scratch[..var.width.bytes()];
                match reader.read_exact(field) {
                    Ok(()) => Ok(decode_field(var.width, field)),
                    Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(truncated()),
                    Err(e) => Err(RawError::Read(e)),
                }
            }
            SampleSource::Values { lines } => loop {
                let line = match lines.read_line() {
                    Ok(line) => line,
                    Err(RawError::UnexpectedEof) => return Err(truncated()),
                    Err(e) => return Err(e),
                };
                let tokens: Vec<&str> = line.split_whitespace().collect();
                if tokens.is_empty() {
                    continue;
                }
                return match (var.index, tokens.as_slice()) {
                    // The first variable of a point is prefixed with the point index
                    (0, &[index, text]) if index.parse::<usize>() == Ok(point) => {
                        parse_text_sample(text, var, point)
                    }
                    (1.., &[text]) => parse_text_sample(text, var, point),
                    _ => Err(RawError::InvalidSample {
                        point,
                        variable: var.name.clone(),
                        text: line.trim().to_string(),
                    }),
                };
            },
        }
    }

    /// Read one point across all variables into `vectors`
    pub(crate) fn read_row(
        &mut self,
        point: usize,
        variables: &[Variable],
        vectors: &mut [VectorData],
    ) -> Result<()> {
        for (var, vector) in variables.iter().zip(vectors.iter_mut()) {
            let sample = self.read_sample(point, var)?;
            push_sample(vector, sample);
        }
        Ok(())
    }
}

/// Allocate one empty vector per variable
pub(crate) fn allocate_vectors(variables: &[Variable], capacity: usize) -> Vec<VectorData> {
    variables
        .iter()
        .map(|v| VectorData::with_capacity(v.width, capacity))
        .collect()
}

/// Decode the whole sample section
pub(crate) fn decode_samples<R: Read>(
    source: &mut SampleSource<R>,
    meta: &Metadata,
    prealloc_limit: usize,
) -> Result<Vec<VectorData>> {
    let num_points = meta.num_points;
    let mut vectors = allocate_vectors(&meta.variables, num_points.min(prealloc_limit));

    match meta.layout() {
        Layout::RowMajor => {
            for point in 0..num_points {
                source.read_row(point, &meta.variables, &mut vectors)?;
            }
        }
        Layout::ColumnMajor => {
            for (var, vector) in meta.variables.iter().zip(vectors.iter_mut()) {
                for point in 0..num_points {
                    let sample = source.read_sample(point, var)?;
                    push_sample(vector, sample);
                }
            }
        }
    }

    debug!(
        points = num_points,
        variables = vectors.len(),
        layout = ?meta.layout(),
        "Samples decoded"
    );

    Ok(vectors)
}

// ============================================================================
// Tests
// ============================================================================
