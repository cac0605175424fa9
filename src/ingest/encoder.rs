//! Conversion of validated CSV records into COPY text-format payload.
//!
//! One record in, one `\t`-separated line out. Every field is checked against
//! the destination column's declared type before it is written, so a bad cell
//! fails here with the column name and line number instead of surfacing as an
//! opaque server error mid-stream.

use chrono::NaiveDate;
use csv::StringRecord;

use crate::db::schema::{SqlType, TableSchema};
use crate::error::IngestError;

/// Null marker of the COPY text format
const COPY_NULL: &str = "\\N";

pub struct CopyEncoder<'a> {
    schema: &'a TableSchema,
    null_token: &'a str,
}

impl<'a> CopyEncoder<'a> {
    pub fn new(schema: &'a TableSchema, null_token: &'a str) -> Self {
        Self { schema, null_token }
    }

    /// Encode one record as a COPY line appended to `out`.
    ///
    /// The record must have exactly the schema's column count; each field is
    /// coerced to its destination type or to NULL when it equals the
    /// configured null token.
    pub fn encode_record(
        &self,
        line: u64,
        record: &StringRecord,
        out: &mut String,
    ) -> Result<(), IngestError> {
        if record.len() != self.schema.column_count() {
            return Err(IngestError::ColumnCount {
                line,
                expected: self.schema.column_count(),
                found: record.len(),
            });
        }

        for (idx, (column, field)) in self.schema.columns.iter().zip(record.iter()).enumerate() {
            if idx > 0 {
                out.push('\t');
            }

            if field == self.null_token {
                if !column.nullable {
                    return Err(IngestError::NullViolation {
                        line,
                        column: column.name.to_string(),
                    });
                }
                out.push_str(COPY_NULL);
                continue;
            }

            let trimmed = field.trim();
            match column.sql_type {
                SqlType::Text => escape_text(field, out),
                SqlType::Date => {
                    Self::coerce(line, column.name, trimmed, "DATE", |v| {
                        NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok()
                    })?;
                    out.push_str(trimmed);
                }
                SqlType::Integer => {
                    Self::coerce(line, column.name, trimmed, "INTEGER", |v| {
                        v.parse::<i32>().is_ok()
                    })?;
                    out.push_str(trimmed);
                }
                SqlType::Numeric => {
                    Self::coerce(line, column.name, trimmed, "NUMERIC", is_decimal)?;
                    out.push_str(trimmed);
                }
                SqlType::DoublePrecision => {
                    Self::coerce(line, column.name, trimmed, "DOUBLE PRECISION", is_decimal)?;
                    out.push_str(trimmed);
                }
            }
        }

        out.push('\n');
        Ok(())
    }

    fn coerce(
        line: u64,
        column: &str,
        value: &str,
        expected: &'static str,
        valid: impl Fn(&str) -> bool,
    ) -> Result<(), IngestError> {
        if valid(value) {
            Ok(())
        } else {
            Err(IngestError::TypeCoercion {
                line,
                column: column.to_string(),
                value: value.to_string(),
                expected,
            })
        }
    }
}

/// Accept plain decimal notation. Rejects the special float spellings
/// (`inf`, `NaN`) that `f64::from_str` would otherwise let through.
fn is_decimal(value: &str) -> bool {
    value.parse::<f64>().map(|v| v.is_finite()).unwrap_or(false)
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

/// Escape a text field for COPY text format.
///
/// Backslash, tab, newline and carriage return are the only characters the
/// format treats specially.
fn escape_text(field: &str, out: &mut String) {
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
}
