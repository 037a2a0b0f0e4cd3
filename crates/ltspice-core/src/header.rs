//! Raw file header parsing
//!
//! The header is a list of `key: value` lines followed by a variable table
//! (`index name type` rows) and ends with a `Binary:` or `Values:` line.

use crate::line_reader::Utf16LineReader;
use crate::types::{
    DataSection, FieldWidth, Flags, HeaderFields, Metadata, RawError, Result, Variable,
    BINARY_MARKER, VALUES_MARKER,
};
use std::io::Read;
use tracing::debug;

/// Classify a header line as the end of the header
fn terminator(line: &str) -> Option<DataSection> {
    let lower = line.trim().to_lowercase();
    if lower.contains(BINARY_MARKER) {
        Some(DataSection::Binary)
    } else if lower.contains(VALUES_MARKER) {
        Some(DataSection::Values)
    } else {
        None
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| RawError::Metadata(format!("invalid {}: '{}'", key, value.trim())))
}

/// Variable table row before widths are known
#[derive(Debug)]
struct VariableRow {
    name: String,
    kind: String,
}

fn parse_variable_row(line: &str) -> Result<VariableRow> {
    let mut tokens = line.split_whitespace();
    let (Some(index), Some(name), Some(kind)) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(RawError::Metadata(format!(
            "malformed variable row: '{}'",
            line.trim()
        )));
    };
    index.parse::<usize>().map_err(|_| {
        RawError::Metadata(format!("invalid variable index in row: '{}'", line.trim()))
    })?;
    Ok(VariableRow {
        name: name.to_string(),
        kind: kind.to_string(),
    })
}

/// Byte width of a column, decided once the whole header is known.
///
/// The scale axis is always column 0 and is written as float64 whatever
/// its type token says (`time`, `frequency`, or a swept source in `.dc`),
/// so position rather than the token picks the 8-byte column.
fn column_width(flags: &Flags, column: usize) -> Result<FieldWidth> {
    let bytes = if flags.is_complex() {
        16
    } else if flags.is_double() || column == 0 {
        8
    } else {
        4
    };
    FieldWidth::try_from(bytes)
}

/// Accumulates header lines into [`Metadata`]
#[derive(Debug, Default)]
pub(crate) struct HeaderBuilder {
    title: String,
    date: String,
    plotname: String,
    command: String,
    offset: Option<f64>,
    flags: Flags,
    declared_variables: Option<usize>,
    num_points: Option<usize>,
    rows: Vec<VariableRow>,
    in_variables: bool,
    fields: HeaderFields,
}

impl HeaderBuilder {
    /// Whether the next line still belongs to the variable table
    fn expects_row(&self, line: &str) -> bool {
        if !self.in_variables {
            return false;
        }
        match self.declared_variables {
            Some(n) => self.rows.len() < n,
            None => line.starts_with(char::is_whitespace),
        }
    }

    pub(crate) fn push_line(&mut self, line: &str) -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }

        if self.expects_row(line) {
            let row = parse_variable_row(line)?;
            self.rows.push(row);
            return Ok(());
        }
        self.in_variables = false;

        let Some((key, value)) = line.split_once(':') else {
            return Err(RawError::Metadata(format!(
                "unrecognised header line: '{}'",
                line.trim()
            )));
        };
        let key = key.trim();
        let value = value.trim();

        match key.to_ascii_lowercase().as_str() {
            "title" => self.title = value.to_string(),
            "date" => self.date = value.to_string(),
            "plotname" => self.plotname = value.to_string(),
            "command" => self.command = value.to_string(),
            "flags" => self.flags = Flags::parse(value),
            "no. variables" => self.declared_variables = Some(parse_count(key, value)?),
            "no. points" => self.num_points = Some(parse_count(key, value)?),
            "offset" => {
                let offset = value.parse().map_err(|_| {
                    RawError::Metadata(format!("invalid {}: '{}'", key, value))
                })?;
                self.offset = Some(offset);
            }
            "variables" => {
                self.in_variables = true;
                self.rows.clear();
            }
            _ => {
                debug!(key, value, "Unrecognised header field kept");
                self.fields.push(key, value);
            }
        }
        Ok(())
    }

    /// Freeze the header and derive every column's byte width
    pub(crate) fn finish(self, section: DataSection) -> Result<Metadata> {
        let num_points = self
            .num_points
            .ok_or_else(|| RawError::Metadata("missing 'No. Points'".into()))?;

        if self.rows.is_empty() {
            return Err(RawError::Metadata("no variables declared".into()));
        }
        if let Some(n) = self.declared_variables {
            if n != self.rows.len() {
                return Err(RawError::Metadata(format!(
                    "'No. Variables' is {} but the table lists {}",
                    n,
                    self.rows.len()
                )));
            }
        }

        let flags = self.flags;
        let variables = self
            .rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| -> Result<Variable> {
                Ok(Variable {
                    index,
                    name: row.name,
                    kind: row.kind,
                    width: column_width(&flags, index)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Metadata {
            title: self.title,
            date: self.date,
            plotname: self.plotname,
            command: self.command,
            offset: self.offset,
            flags,
            declared_variables: self.declared_variables,
            num_points,
            variables,
            section,
            fields: self.fields,
        })
    }
}

/// Read header lines up to and including the terminator line
pub(crate) fn parse_header<R: Read>(lines: &mut Utf16LineReader<R>) -> Result<Metadata> {
    let mut builder = HeaderBuilder::default();
    loop {
        let line = lines.read_line()?;
        if let Some(section) = terminator(&line) {
            debug!(line = lines.lines_read(), ?section, "Header terminator");
            return builder.finish(section);
        }
        builder.push_line(&line)?;
    }
}
