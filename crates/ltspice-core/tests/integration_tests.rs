//! Integration tests for ltspice-core
//!
//! Inputs are synthesized in memory:
//! - test_read: Basic decoding through every entry point
//! - test_formats: Field widths, flags and section variants
//! - test_errors: Truncated and malformed inputs
//! - test_stream: Streaming API

use ltspice_core::{
    read, read_bytes, read_from, read_from_with_options, read_header, read_header_from,
    read_stream_chunked, read_stream_signals, DataChunk, DataSection, FieldWidth, RawError,
    RawStreamReader, ReadOptions, VectorData,
};
use num_complex::Complex64;
use std::io::{self, ErrorKind, Read};
use std::path::PathBuf;

// =============================================================================
// Test helpers
// =============================================================================

fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn header(flags: &str, num_points: usize, variables: &[(&str, &str)]) -> String {
    let mut text = format!(
        "Title: * /tmp/test.asc\n\
         Date: Fri Mar  1 12:00:00 2024\n\
         Plotname: Transient Analysis\n\
         Flags: {}\n\
         No. Variables: {}\n\
         No. Points: {:>12}\n\
         Offset:   0.0000000000000000e+000\n\
         Command: Linear Technology Corporation LTspice XVII\n\
         Variables:\n",
        flags,
        variables.len(),
        num_points
    );
    for (i, (name, kind)) in variables.iter().enumerate() {
        text.push_str(&format!("\t{}\t{}\t{}\n", i, name, kind));
    }
    text.push_str("Binary:\n");
    text
}

/// Two columns (8-byte time, 4-byte voltage) and three known rows
fn mixed_width_file() -> Vec<u8> {
    let mut bytes = utf16(&header(
        "real forward",
        3,
        &[("time", "time"), ("V(out)", "voltage")],
    ));
    for (t, v) in [(0.0f64, 1.5f32), (1.0e-6, -0.25), (2.0e-6, 3.0)] {
        bytes.extend_from_slice(&t.to_le_bytes());
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "ltspice_test_{}_{}.raw",
        name,
        std::process::id()
    ));
    std::fs::write(&path, bytes).unwrap();
    path
}

fn assert_mixed_width_values(result: &ltspice_core::Dataset) {
    assert_eq!(
        result.get("time"),
        Some(&VectorData::Real(vec![0.0, 1.0e-6, 2.0e-6]))
    );
    assert_eq!(
        result.get("V(out)"),
        Some(&VectorData::Real(vec![1.5, -0.25, 3.0]))
    );
}

// =============================================================================
// Test: Basic Reading
// =============================================================================

#[test]
fn test_mixed_widths_from_stream() {
    let bytes = mixed_width_file();
    let result = read_from(bytes.as_slice()).unwrap();

    assert_mixed_width_values(&result);
    assert_eq!(result.variables()[0].width, FieldWidth::Double);
    assert_eq!(result.variables()[1].width, FieldWidth::Single);
}

#[test]
fn test_mixed_widths_from_bytes() {
    let result = read_bytes(&mixed_width_file()).unwrap();
    assert_mixed_width_values(&result);
}

#[test]
fn test_mixed_widths_from_file() {
    let path = temp_file("mixed", &mixed_width_file());
    let result = read(&path);
    let _ = std::fs::remove_file(&path);

    let result = result.unwrap();
    assert_mixed_width_values(&result);
    assert_eq!(result.metadata.title, "* /tmp/test.asc");
    assert_eq!(result.metadata.plotname, "Transient Analysis");
    assert_eq!(
        result.metadata.command,
        "Linear Technology Corporation LTspice XVII"
    );
    assert_eq!(result.metadata.section, DataSection::Binary);
}

#[test]
fn test_every_vector_has_point_count_length() {
    let vars = [
        ("time", "time"),
        ("V(in)", "voltage"),
        ("V(out)", "voltage"),
        ("I(R1)", "device_current"),
    ];
    let num_points = 17;
    let mut bytes = utf16(&header("real forward", num_points, &vars));
    for i in 0..num_points {
        bytes.extend_from_slice(&(i as f64).to_le_bytes());
        for j in 1..vars.len() {
            bytes.extend_from_slice(&((i * j) as f32).to_le_bytes());
        }
    }

    let result = read_from(bytes.as_slice()).unwrap();
    assert_eq!(result.vectors.len(), vars.len());
    assert_eq!(result.len(), num_points);
    for (var, vector) in result.iter() {
        assert_eq!(vector.len(), num_points, "length of {}", var.name);
    }
    assert_eq!(
        result.get("I(R1)").unwrap().as_real().unwrap()[5],
        15.0
    );
}

#[test]
fn test_declared_order_is_kept() {
    let vars = [("b", "voltage"), ("a", "voltage"), ("c", "voltage")];
    let mut bytes = utf16(&header("real double", 1, &vars));
    for v in [1.0f64, 2.0, 3.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }

    let result = read_from(bytes.as_slice()).unwrap();
    let names: Vec<_> = result.iter().map(|(v, _)| v.name.as_str()).collect();
    assert_eq!(names, ["b", "a", "c"]);
    let indices: Vec<_> = result.variables().iter().map(|v| v.index).collect();
    assert_eq!(indices, [0, 1, 2]);
    assert_eq!(result.vectors[1], VectorData::Real(vec![2.0]));
}

#[test]
fn test_zero_points() {
    let bytes = utf16(&header(
        "real forward",
        0,
        &[("time", "time"), ("V(out)", "voltage")],
    ));
    let result = read_from(bytes.as_slice()).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.vectors.len(), 2);
    assert!(result.vectors.iter().all(|v| v.is_empty()));

    let result = read_bytes(&bytes).unwrap();
    assert!(result.vectors.iter().all(|v| v.is_empty()));
}

#[test]
fn test_into_map() {
    let map = read_from(mixed_width_file().as_slice())
        .unwrap()
        .into_map();
    assert_eq!(map.len(), 2);
    assert_eq!(map["V(out)"], VectorData::Real(vec![1.5, -0.25, 3.0]));
}

#[test]
fn test_unknown_keys_preserved() {
    let text = header("real", 0, &[("time", "time")]).replacen(
        "Variables:\n",
        "Backannotation: u1 N001 N002\nFuture Key: some value\nVariables:\n",
        1,
    );
    let meta = read_header_from(utf16(&text).as_slice()).unwrap();
    assert_eq!(meta.fields.get("Future Key"), Some("some value"));
    assert_eq!(meta.fields.get("backannotation"), Some("u1 N001 N002"));
    assert_eq!(meta.fields.len(), 2);
}

#[test]
fn test_header_only_leaves_stream_at_body() {
    let bytes = mixed_width_file();
    let mut stream = bytes.as_slice();
    let meta = read_header_from(&mut stream).unwrap();
    assert_eq!(meta.num_points, 3);
    assert_eq!(stream.len(), meta.body_len().unwrap());

    let mut first = [0u8; 8];
    stream.read_exact(&mut first).unwrap();
    assert_eq!(f64::from_le_bytes(first), 0.0);
}

#[test]
fn test_read_header_from_file() {
    let path = temp_file("header", &mixed_width_file());
    let meta = read_header(&path);
    let _ = std::fs::remove_file(&path);

    let meta = meta.unwrap();
    assert_eq!(meta.variables.len(), 2);
    assert_eq!(meta.flags.raw(), "real forward");
    assert_eq!(meta.row_width(), 12);
}

// =============================================================================
// Test: Format Variants
// =============================================================================

#[test]
fn test_complex_fields_keep_both_components() {
    let mut bytes = utf16(&header(
        "complex forward log",
        2,
        &[("frequency", "frequency"), ("V(out)", "voltage")],
    ));
    let rows = [
        (Complex64::new(1.0e3, 0.0), Complex64::new(0.5, -0.5)),
        (Complex64::new(1.0e4, 0.0), Complex64::new(0.25, -0.75)),
    ];
    for (f, v) in rows {
        for c in [f, v] {
            bytes.extend_from_slice(&c.re.to_le_bytes());
            bytes.extend_from_slice(&c.im.to_le_bytes());
        }
    }

    let result = read_from(bytes.as_slice()).unwrap();
    assert!(result.metadata.is_complex());
    assert!(result
        .variables()
        .iter()
        .all(|v| v.width == FieldWidth::Complex));

    let vout = result.get("V(out)").unwrap();
    assert_eq!(
        vout.as_complex().unwrap(),
        &[Complex64::new(0.5, -0.5), Complex64::new(0.25, -0.75)]
    );
    assert_eq!(vout.real_parts(), vec![0.5, 0.25]);
    assert_eq!(
        result.get("frequency").unwrap().real_parts(),
        vec![1.0e3, 1.0e4]
    );
}

#[test]
fn test_double_flag_widens_every_column() {
    let mut bytes = utf16(&header(
        "real forward double",
        2,
        &[("time", "time"), ("V(out)", "voltage")],
    ));
    for v in [0.0f64, 0.1, 1.0e-9, 0.2] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }

    let result = read_from(bytes.as_slice()).unwrap();
    assert_eq!(result.metadata.row_width(), 16);
    assert_eq!(result.get("V(out)"), Some(&VectorData::Real(vec![0.1, 0.2])));
}

#[test]
fn test_fastaccess_column_major() {
    let mut bytes = utf16(&header(
        "real forward fastaccess",
        3,
        &[("time", "time"), ("V(out)", "voltage")],
    ));
    for t in [0.0f64, 1.0, 2.0] {
        bytes.extend_from_slice(&t.to_le_bytes());
    }
    for v in [10.0f32, 11.0, 12.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }

    for result in [read_from(bytes.as_slice()), read_bytes(&bytes)] {
        let result = result.unwrap();
        assert_eq!(result.get("time"), Some(&VectorData::Real(vec![0.0, 1.0, 2.0])));
        assert_eq!(
            result.get("V(out)"),
            Some(&VectorData::Real(vec![10.0, 11.0, 12.0]))
        );
    }
}

#[test]
fn test_values_section() {
    let text = header("real forward", 2, &[("time", "time"), ("V(out)", "voltage")])
        .replace("Binary:\n", "Values:\n")
        + "0\t0.000000000000000e+000\n\t1.500000e+000\n1\t1.000000000000000e-006\n\t-2.500000e-001\n";
    let bytes = utf16(&text);

    for result in [read_from(bytes.as_slice()), read_bytes(&bytes)] {
        let result = result.unwrap();
        assert_eq!(result.metadata.section, DataSection::Values);
        assert_mixed_prefix(&result);
    }
}

fn assert_mixed_prefix(result: &ltspice_core::Dataset) {
    assert_eq!(result.get("time"), Some(&VectorData::Real(vec![0.0, 1.0e-6])));
    assert_eq!(result.get("V(out)"), Some(&VectorData::Real(vec![1.5, -0.25])));
}

// =============================================================================
// Test: Error Handling
// =============================================================================

#[test]
fn test_nonexistent_file() {
    let result = read("/nonexistent/path/file.raw");
    assert!(matches!(result, Err(RawError::Open { .. })));
}

#[test]
fn test_empty_path() {
    assert!(read("").is_err());
}

#[test]
fn test_empty_file() {
    let path = temp_file("empty", &[]);
    let result = read(&path);
    let _ = std::fs::remove_file(&path);
    assert!(matches!(result, Err(RawError::UnexpectedEof)));
}

#[test]
fn test_line_too_long() {
    let text = header("real", 1, &[("time", "time")])
        .replacen("* /tmp/test.asc", &"x".repeat(200), 1);
    let options = ReadOptions::new().with_max_line_len(64);
    let result = read_from_with_options(utf16(&text).as_slice(), &options);
    assert!(matches!(result, Err(RawError::LineTooLong { max: 64 })));
}

#[test]
fn test_wrong_encoding_is_line_too_long() {
    // 8-bit text never produces a 0x000A code unit
    let text = "Title: ascii\nNo. Points: 1\n".repeat(400);
    let result = read_from(text.as_bytes());
    assert!(matches!(result, Err(RawError::LineTooLong { .. })));
}

#[test]
fn test_header_without_terminator() {
    let text = header("real", 1, &[("time", "time")]).replace("Binary:\n", "");
    let result = read_from(utf16(&text).as_slice());
    assert!(matches!(result, Err(RawError::UnexpectedEof)));
}

#[test]
fn test_short_body_is_truncation() {
    let mut bytes = mixed_width_file();
    bytes.truncate(bytes.len() - 2);

    match read_from(bytes.as_slice()) {
        Err(RawError::Truncated { point, variable }) => {
            assert_eq!(point, 2);
            assert_eq!(variable, "V(out)");
        }
        other => panic!("expected truncation, got {:?}", other.map(|d| d.len())),
    }

    match read_bytes(&bytes) {
        Err(RawError::Truncated { point, variable }) => {
            assert_eq!(point, 2);
            assert_eq!(variable, "V(out)");
        }
        other => panic!("expected truncation, got {:?}", other.map(|d| d.len())),
    }

    let path = temp_file("short", &bytes);
    let result = read(&path);
    let _ = std::fs::remove_file(&path);
    assert!(matches!(result, Err(RawError::Truncated { .. })));
}

#[test]
fn test_body_missing_entirely() {
    let bytes = utf16(&header("real", 1000, &[("time", "time")]));
    assert!(matches!(
        read_from(bytes.as_slice()),
        Err(RawError::Truncated { point: 0, .. })
    ));
}

#[test]
fn test_huge_point_count_fails_without_allocating() {
    let bytes = utf16(&header("real", usize::MAX / 2, &[("time", "time")]));
    assert!(matches!(
        read_bytes(&bytes),
        Err(RawError::Truncated { point: 0, .. })
    ));
    assert!(matches!(
        read_from(bytes.as_slice()),
        Err(RawError::Truncated { point: 0, .. })
    ));
}

/// Serves `data`, then fails every read with a non-EOF error
struct FaultyReader {
    data: Vec<u8>,
    pos: usize,
}

impl Read for FaultyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.data.len() {
            return Err(io::Error::new(ErrorKind::Other, "device fault"));
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[test]
fn test_io_fault_in_body_is_read_error() {
    let mut data = mixed_width_file();
    data.truncate(data.len() - 12);
    let result = read_from(FaultyReader { data, pos: 0 });
    match result {
        Err(RawError::Read(e)) => assert_eq!(e.kind(), ErrorKind::Other),
        other => panic!("expected read error, got {:?}", other.map(|d| d.len())),
    }
}

#[test]
fn test_values_index_line_without_sample() {
    let text = header("real forward", 1, &[("time", "time"), ("V(out)", "voltage")])
        .replace("Binary:\n", "Values:\n")
        + "0\n\t2.5\n\t3.5\n";
    assert!(matches!(
        read_from(utf16(&text).as_slice()),
        Err(RawError::InvalidSample { point: 0, .. })
    ));
}

#[test]
fn test_malformed_variable_row() {
    let text = header("real", 1, &[("time", "time"), ("V(out)", "voltage")])
        .replace("\t1\tV(out)\tvoltage\n", "\tone\tV(out)\tvoltage\n");
    let result = read_from(utf16(&text).as_slice());
    assert!(matches!(result, Err(RawError::Metadata(_))));
}

#[test]
fn test_error_messages() {
    let err = read("/nonexistent/path/file.raw").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/path/file.raw"));

    let err = RawError::Truncated {
        point: 4,
        variable: "V(out)".into(),
    };
    assert_eq!(
        err.to_string(),
        "sample data truncated at point 4, variable 'V(out)'"
    );
}

// =============================================================================
// Test: Streaming API
// =============================================================================

#[test]
fn test_stream_total_points_match() {
    let num_points = 250;
    let mut bytes = utf16(&header(
        "real forward",
        num_points,
        &[("time", "time"), ("V(out)", "voltage")],
    ));
    for i in 0..num_points {
        bytes.extend_from_slice(&(i as f64).to_le_bytes());
        bytes.extend_from_slice(&(i as f32 * 0.5).to_le_bytes());
    }
    let path = temp_file("stream", &bytes);

    let full = read(&path).unwrap();
    let streamed: usize = read_stream_chunked(&path, 64)
        .unwrap()
        .map(|chunk| chunk.unwrap().len())
        .sum();
    let filtered: Vec<_> = read_stream_signals(&path, &["V(out)"], 100)
        .unwrap()
        .map(|chunk| chunk.unwrap())
        .collect();
    let _ = std::fs::remove_file(&path);

    assert_eq!(streamed, full.len());
    assert_eq!(filtered.len(), 3);
    assert!(filtered.iter().all(|c| c.data.len() == 1));

    let joined: Vec<f64> = filtered
        .iter()
        .flat_map(|c| c.data["V(out)"].real_parts())
        .collect();
    assert_eq!(
        Some(&VectorData::Real(joined)),
        full.get("V(out)")
    );
}

#[test]
fn test_stream_hostile_point_count_with_huge_chunk() {
    let bytes = utf16(&header("real", usize::MAX / 2, &[("time", "time")]));
    let mut reader = RawStreamReader::from_reader(bytes.as_slice(), usize::MAX).unwrap();
    assert!(matches!(
        reader.next(),
        Some(Err(RawError::Truncated { point: 0, .. }))
    ));
}

#[test]
fn test_stream_truncated_body_collects_to_error() {
    let mut bytes = mixed_width_file();
    bytes.truncate(bytes.len() - 2);
    let path = temp_file("stream_short", &bytes);

    let collected: ltspice_core::Result<Vec<DataChunk>> =
        read_stream_chunked(&path, 1).unwrap().collect();
    let _ = std::fs::remove_file(&path);

    assert!(matches!(
        collected,
        Err(RawError::Truncated { point: 2, .. })
    ));
}
