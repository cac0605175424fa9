use std::io::Read;

use csv::{ReaderBuilder, StringRecord};

use crate::error::IngestError;

/// Configuration for delimited file reading
#[derive(Debug, Clone)]
pub struct DelimitedConfig {
    pub delimiter: u8,
    pub quote: u8,
    pub has_header: bool,
    /// Literal token that represents SQL NULL in the source file.
    pub null_token: String,
}

impl Default for DelimitedConfig {
    fn default() -> Self {
        // The DVF export: comma-delimited, double-quoted, header row present,
        // empty cells meaning NULL.
        Self {
            delimiter: b',',
            quote: b'"',
            has_header: true,
            null_token: String::new(),
        }
    }
}

/// Streaming record source over a delimited UTF-8 input.
///
/// Wraps the `csv` crate's reader and yields records with their 1-based file
/// line number. Column-count checking is left to the caller (the reader runs
/// in flexible mode) so that the error can name the offending line.
pub struct RecordSource<R: Read> {
    reader: csv::Reader<R>,
    record: StringRecord,
}

impl<R: Read> RecordSource<R> {
    pub fn new(input: R, config: &DelimitedConfig) -> Self {
        let reader = ReaderBuilder::new()
            .delimiter(config.delimiter)
            .quote(config.quote)
            // Headers are consumed explicitly via read_header so that the
            // schema layer can run its strict validation.
            .has_headers(false)
            .flexible(true)
            .from_reader(input);

        Self {
            reader,
            record: StringRecord::new(),
        }
    }

    /// Read the header row. Must be called before the first `next_record`
    /// when the format declares a header.
    pub fn read_header(&mut self) -> Result<StringRecord, IngestError> {
        match self.next_record()? {
            Some((_, record)) => Ok(record),
            None => Err(IngestError::Malformed {
                line: 1,
                message: "file is empty, expected a header row".to_string(),
            }),
        }
    }

    /// Read the next record, returning it with the line number it started at.
    ///
    /// Returns `Ok(None)` at end of input. Malformed byte sequences abort
    /// with an encoding error rather than being lossily decoded.
    pub fn next_record(&mut self) -> Result<Option<(u64, StringRecord)>, IngestError> {
        let line = self.reader.position().line();

        match self.reader.read_record(&mut self.record) {
            Ok(true) => Ok(Some((line, self.record.clone()))),
            Ok(false) => Ok(None),
            Err(e) => match e.kind() {
                csv::ErrorKind::Utf8 { .. } => Err(IngestError::Encoding { line }),
                _ => Err(IngestError::Malformed {
                    line,
                    message: e.to_string(),
                }),
            },
        }
    }

    /// Byte offset of the reader within the input, for progress reporting.
    pub fn byte_offset(&self) -> u64 {
        self.reader.position().byte()
    }
}
