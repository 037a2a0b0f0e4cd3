//! Common types, errors, and constants for LTspice raw file decoding

use num_complex::Complex64;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Default upper bound on a header line, in 16-bit code units
pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

/// Default cap on the number of samples reserved per vector before reading
pub const DEFAULT_PREALLOC_LIMIT: usize = 1 << 20;

/// Widest binary field the sample decoder understands (complex pair)
pub const MAX_FIELD_WIDTH: usize = 16;

/// Terminator substring for a binary sample section
pub const BINARY_MARKER: &str = "binary";
/// Terminator substring for a text sample section
pub const VALUES_MARKER: &str = "values";

pub const FLAG_COMPLEX: &str = "complex";
pub const FLAG_DOUBLE: &str = "double";
pub const FLAG_FAST_ACCESS: &str = "fastaccess";

// ============================================================================
// Enums
// ============================================================================

/// Byte width of one binary sample field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldWidth {
    /// 4-byte float32, promoted to f64 on decode
    Single,
    /// 8-byte float64
    Double,
    /// 16-byte pair of float64 (real, imaginary)
    Complex,
}

impl FieldWidth {
    /// Number of bytes this field occupies in the sample matrix
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            FieldWidth::Single => 4,
            FieldWidth::Double => 8,
            FieldWidth::Complex => 16,
        }
    }

    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, FieldWidth::Complex)
    }
}

impl TryFrom<usize> for FieldWidth {
    type Error = RawError;

    fn try_from(bytes: usize) -> Result<Self> {
        match bytes {
            4 => Ok(FieldWidth::Single),
            8 => Ok(FieldWidth::Double),
            16 => Ok(FieldWidth::Complex),
            other => Err(RawError::Metadata(format!(
                "unsupported field width: {} bytes",
                other
            ))),
        }
    }
}

impl std::fmt::Display for FieldWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bytes())
    }
}

/// Which kind of line ended the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataSection {
    #[default]
    Binary,
    /// Samples follow as text lines in the header encoding
    Values,
}

/// Order of fields in the sample matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One row per point, one field per variable (the usual case)
    RowMajor,
    /// All points of variable 0, then variable 1, ... (`fastaccess`)
    ColumnMajor,
}

/// Vector data - either real or complex
#[derive(Debug, Clone, PartialEq)]
pub enum VectorData {
    Real(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl VectorData {
    pub(crate) fn with_capacity(width: FieldWidth, capacity: usize) -> Self {
        if width.is_complex() {
            VectorData::Complex(Vec::with_capacity(capacity))
        } else {
            VectorData::Real(Vec::with_capacity(capacity))
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VectorData::Real(v) => v.len(),
            VectorData::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, VectorData::Complex(_))
    }

    pub fn as_real(&self) -> Option<&[f64]> {
        match self {
            VectorData::Real(v) => Some(v),
            VectorData::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&[Complex64]> {
        match self {
            VectorData::Complex(v) => Some(v),
            VectorData::Real(_) => None,
        }
    }

    /// Real component of every sample.
    ///
    /// For complex vectors this is the first 8 bytes of each field, the
    /// same value a plain double decode of the field would give.
    pub fn real_parts(&self) -> Vec<f64> {
        match self {
            VectorData::Real(v) => v.clone(),
            VectorData::Complex(v) => v.iter().map(|c| c.re).collect(),
        }
    }

    /// Magnitude of every sample (absolute value for real vectors)
    pub fn magnitude(&self) -> Vec<f64> {
        match self {
            VectorData::Real(v) => v.iter().map(|x| x.abs()).collect(),
            VectorData::Complex(v) => v.iter().map(|c| c.norm()).collect(),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for LTspice raw file decoding
#[derive(Debug, Error)]
pub enum RawError {
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("header line longer than {max} code units")]
    LineTooLong { max: usize },

    #[error("unexpected end of input inside the header")]
    UnexpectedEof,

    #[error("read error: {0}")]
    Read(#[from] io::Error),

    #[error("metadata format error: {0}")]
    Metadata(String),

    #[error("sample data truncated at point {point}, variable '{variable}'")]
    Truncated { point: usize, variable: String },

    #[error("invalid sample '{text}' at point {point}, variable '{variable}'")]
    InvalidSample {
        point: usize,
        variable: String,
        text: String,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, RawError>;

// ============================================================================
// Configuration
// ============================================================================

/// Knobs for a single decode call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Header line bound in 16-bit code units
    pub max_line_len: usize,
    /// Cap on capacity reserved per vector before any sample is read
    pub prealloc_limit: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE_LEN,
            prealloc_limit: DEFAULT_PREALLOC_LIMIT,
        }
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    pub fn with_prealloc_limit(mut self, prealloc_limit: usize) -> Self {
        self.prealloc_limit = prealloc_limit;
        self
    }
}

// ============================================================================
// Header Structures
// ============================================================================

/// The `Flags:` header line, verbatim and tokenized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    raw: String,
    tokens: Vec<String>,
}

impl Flags {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            tokens: raw.split_whitespace().map(str::to_lowercase).collect(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Lower-cased whitespace separated tokens
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Case-insensitive token membership
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t.eq_ignore_ascii_case(token))
    }

    pub fn is_complex(&self) -> bool {
        self.contains(FLAG_COMPLEX)
    }

    pub fn is_double(&self) -> bool {
        self.contains(FLAG_DOUBLE)
    }

    pub fn is_fast_access(&self) -> bool {
        self.contains(FLAG_FAST_ACCESS)
    }
}

/// Header lines whose keys the decoder does not interpret.
///
/// Kept in file order; a key may repeat (e.g. `Backannotation`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    entries: Vec<(String, String)>,
}

impl HeaderFields {
    pub(crate) fn push(&mut self, key: &str, value: &str) {
        self.entries.push((key.to_string(), value.to_string()));
    }

    /// First value stored under `key` (case-insensitive)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored under `key` (case-insensitive), in file order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One declared output channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Column position, equal to declaration order
    pub index: usize,
    pub name: String,
    /// Type token from the variable table (`time`, `voltage`, ...), verbatim
    pub kind: String,
    pub width: FieldWidth,
}

/// Parsed header
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub title: String,
    pub date: String,
    pub plotname: String,
    pub command: String,
    pub offset: Option<f64>,
    pub flags: Flags,
    /// `No. Variables`, when the header declared it
    pub declared_variables: Option<usize>,
    pub num_points: usize,
    pub variables: Vec<Variable>,
    pub section: DataSection,
    /// Unrecognised `key: value` lines
    pub fields: HeaderFields,
}

impl Metadata {
    /// Text sample sections are always written point by point
    pub fn layout(&self) -> Layout {
        if self.section == DataSection::Binary && self.flags.is_fast_access() {
            Layout::ColumnMajor
        } else {
            Layout::RowMajor
        }
    }

    pub fn is_complex(&self) -> bool {
        self.flags.is_complex()
    }

    /// Bytes per point across all variables
    pub fn row_width(&self) -> usize {
        self.variables.iter().map(|v| v.width.bytes()).sum()
    }

    /// Expected size of the sample section in bytes.
    ///
    /// `None` for text sections or when the product overflows.
    pub fn body_len(&self) -> Option<usize> {
        match self.section {
            DataSection::Binary => self.num_points.checked_mul(self.row_width()),
            DataSection::Values => None,
        }
    }

    /// First variable declared under `name`
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Result of decoding one raw file
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub metadata: Metadata,
    /// One vector per variable, parallel to `metadata.variables`
    pub vectors: Vec<VectorData>,
}

impl Dataset {
    /// Get signal data by variable name
    pub fn get(&self, name: &str) -> Option<&VectorData> {
        let idx = self
            .metadata
            .variables
            .iter()
            .position(|v| v.name == name)?;
        self.vectors.get(idx)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.metadata.variables
    }

    /// Variables paired with their data, in declared order
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &VectorData)> {
        self.metadata.variables.iter().zip(self.vectors.iter())
    }

    /// Number of points per vector
    pub fn len(&self) -> usize {
        self.metadata.num_points
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.num_points == 0
    }

    /// Drop ordering and key the vectors by variable name
    pub fn into_map(self) -> HashMap<String, VectorData> {
        self.metadata
            .variables
            .into_iter()
            .map(|v| v.name)
            .zip(self.vectors)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_width_try_from() {
        assert_eq!(FieldWidth::try_from(4).unwrap(), FieldWidth::Single);
        assert_eq!(FieldWidth::try_from(8).unwrap(), FieldWidth::Double);
        assert_eq!(FieldWidth::try_from(16).unwrap(), FieldWidth::Complex);
        assert!(matches!(
            FieldWidth::try_from(2),
            Err(RawError::Metadata(_))
        ));
        assert!(FieldWidth::try_from(12).is_err());
    }

    #[test]
    fn test_flags_case_insensitive() {
        let flags = Flags::parse("Complex Forward FastAccess");
        assert!(flags.is_complex());
        assert!(flags.is_fast_access());
        assert!(!flags.is_double());
        assert_eq!(flags.raw(), "Complex Forward FastAccess");
        assert_eq!(flags.tokens(), ["complex", "forward", "fastaccess"]);
    }

    #[test]
    fn test_header_fields_repeat() {
        let mut fields = HeaderFields::default();
        fields.push("Backannotation", "u1 a");
        fields.push("Backannotation", "u2 b");
        fields.push("Extra", "x");
        assert_eq!(fields.get("backannotation"), Some("u1 a"));
        assert_eq!(fields.get_all("BACKANNOTATION").count(), 2);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get("missing"), None);
    }

    #[test]
    fn test_vector_data_views() {
        let complex = VectorData::Complex(vec![Complex64::new(3.0, 4.0)]);
        assert_eq!(complex.real_parts(), vec![3.0]);
        assert_eq!(complex.magnitude(), vec![5.0]);
        assert!(complex.as_real().is_none());

        let real = VectorData::Real(vec![-1.5, 2.0]);
        assert_eq!(real.as_real(), Some(&[-1.5, 2.0][..]));
        assert_eq!(real.magnitude(), vec![1.5, 2.0]);
        assert_eq!(real.len(), 2);
    }
}
