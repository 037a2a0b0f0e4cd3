//! LTspice raw file decoder
//!
//! Drives the header parser and then the sample reader over one input.

use crate::header::parse_header;
use crate::line_reader::Utf16LineReader;
use crate::sample_reader::{decode_samples, SampleSource};
use crate::types::{DataSection, Dataset, Layout, Metadata, RawError, ReadOptions, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, instrument};

// ============================================================================
// Stream decoding
// ============================================================================

/// Decode a complete raw file from a byte stream
pub(crate) fn decode<R: Read>(reader: R, options: &ReadOptions) -> Result<Dataset> {
    let mut lines = Utf16LineReader::new(reader, options.max_line_len);
    let metadata = parse_header(&mut lines)?;
    log_header(&metadata);

    let mut source = SampleSource::new(lines, metadata.section);
    let vectors = decode_samples(&mut source, &metadata, options.prealloc_limit)?;
    Ok(Dataset { metadata, vectors })
}

/// Decode a raw file held entirely in memory.
///
/// The body length is known up front, so a short binary section is
/// reported before any vector is allocated.
pub(crate) fn decode_slice(data: &[u8], options: &ReadOptions) -> Result<Dataset> {
    let mut lines = Utf16LineReader::new(data, options.max_line_len);
    let metadata = parse_header(&mut lines)?;
    log_header(&metadata);

    let mut prealloc = options.prealloc_limit;
    if metadata.section == DataSection::Binary {
        let available = lines.get_ref().len();
        match metadata.body_len() {
            Some(expected) if expected <= available => prealloc = metadata.num_points,
            _ => return Err(truncation_at(&metadata, available)),
        }
    }

    let mut source = SampleSource::new(lines, metadata.section);
    let vectors = decode_samples(&mut source, &metadata, prealloc)?;
    Ok(Dataset { metadata, vectors })
}

/// Header only
pub(crate) fn decode_header<R: Read>(reader: R, options: &ReadOptions) -> Result<Metadata> {
    let mut lines = Utf16LineReader::new(reader, options.max_line_len);
    parse_header(&mut lines)
}

/// Locate the first field that does not fit in `available` bytes
fn truncation_at(meta: &Metadata, available: usize) -> RawError {
    let located = match meta.layout() {
        Layout::RowMajor => {
            let row_width = meta.row_width().max(1);
            let point = available / row_width;
            let mut rest = available % row_width;
            meta.variables
                .iter()
                .find(|v| {
                    if rest < v.width.bytes() {
                        true
                    } else {
                        rest -= v.width.bytes();
                        false
                    }
                })
                .map(|v| (point, v))
        }
        Layout::ColumnMajor => {
            let mut rest = available;
            let mut found = None;
            for v in &meta.variables {
                let column = meta.num_points.saturating_mul(v.width.bytes());
                if rest < column {
                    found = Some((rest / v.width.bytes(), v));
                    break;
                }
                rest -= column;
            }
            found
        }
    };

    let (point, variable) = located
        .map(|(point, v)| (point, v.name.clone()))
        .unwrap_or_default();
    RawError::Truncated { point, variable }
}

fn log_header(meta: &Metadata) {
    debug!(
        title = %meta.title,
        plotname = %meta.plotname,
        flags = %meta.flags.raw(),
        points = meta.num_points,
        variables = meta.variables.len(),
        section = ?meta.section,
        extra_fields = meta.fields.len(),
        "Header parsed"
    );
}

// ============================================================================
// Main entry points
// ============================================================================

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| RawError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Main raw file reader - maps the file and decodes it
#[instrument(skip_all, fields(path = %path.display()))]
pub(crate) fn read_impl(path: &Path, options: &ReadOptions) -> Result<Dataset> {
    let file = open(path)?;
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| RawError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        bytes = mmap.len(),
        mb = mmap.len() as f64 / 1_048_576.0,
        "Raw file mapped"
    );

    let dataset = decode_slice(&mmap, options)?;

    info!(
        points = dataset.len(),
        variables = dataset.vectors.len(),
        "Raw file decoded"
    );
    Ok(dataset)
}

/// Parse only the header of a raw file on disk
#[instrument(skip_all, fields(path = %path.display()))]
pub(crate) fn read_header_impl(path: &Path, options: &ReadOptions) -> Result<Metadata> {
    let file = open(path)?;
    decode_header(BufReader::new(file), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldWidth, Flags, HeaderFields, Variable};

    fn meta(flags: &str, widths: &[FieldWidth], num_points: usize) -> Metadata {
        Metadata {
            title: String::new(),
            date: String::new(),
            plotname: String::new(),
            command: String::new(),
            offset: None,
            flags: Flags::parse(flags),
            declared_variables: None,
            num_points,
            variables: widths
                .iter()
                .enumerate()
                .map(|(index, &width)| Variable {
                    index,
                    name: format!("v{}", index),
                    kind: "voltage".into(),
                    width,
                })
                .collect(),
            section: DataSection::Binary,
            fields: HeaderFields::default(),
        }
    }

    fn located(err: RawError) -> (usize, String) {
        match err {
            RawError::Truncated { point, variable } => (point, variable),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_truncation_row_major() {
        let m = meta("real", &[FieldWidth::Double, FieldWidth::Single], 10);
        // two full rows, then the 8-byte field of row 2 fits, the 4-byte one does not
        assert_eq!(located(truncation_at(&m, 24 + 8 + 2)), (2, "v1".into()));
        assert_eq!(located(truncation_at(&m, 24 + 3)), (2, "v0".into()));
    }

    #[test]
    fn test_truncation_column_major() {
        let m = meta(
            "real fastaccess",
            &[FieldWidth::Double, FieldWidth::Single],
            10,
        );
        assert_eq!(located(truncation_at(&m, 80 + 13)), (3, "v1".into()));
        assert_eq!(located(truncation_at(&m, 17)), (2, "v0".into()));
    }
}
