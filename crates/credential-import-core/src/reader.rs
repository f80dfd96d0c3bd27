//! Rewindable CSV reader.
//!
//! [`TabularReader`] wraps any `Read + Seek` stream and hands out lazy
//! [`Rows`] iterators. A row sequence may only be started from the very
//! beginning of the stream: after a partial read the caller must
//! [`rewind`](TabularReader::rewind) before asking for rows again, otherwise
//! [`ReadError::StreamPosition`] is returned.
//!
//! Field counts are strict. Headers are trimmed, values are passed through
//! untouched, and blank lines are skipped.

use std::collections::HashMap;
use std::io::{self, Read, Seek};

use crate::error::ReadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Start,
    Unquoted,
    Quoted,
    /// A quote seen inside a quoted field: either an escape or the close.
    QuoteInQuoted,
}

/// Strict quoting check run over the raw bytes as they stream past.
///
/// The csv parser accepts bare quotes inside unquoted fields and lets a
/// quoted field run to end of input. Both are rejected here, and the line
/// of the first violation is kept for [`Rows`] to report.
struct QuoteCheck<R> {
    inner: R,
    state: FieldState,
    line: u64,
    open_line: u64,
    violation: Option<(u64, &'static str)>,
}

impl<R> QuoteCheck<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            state: FieldState::Start,
            line: 1,
            open_line: 1,
            violation: None,
        }
    }

    fn flag(&mut self, line: u64, reason: &'static str) {
        if self.violation.is_none() {
            self.violation = Some((line, reason));
        }
    }

    fn scan(&mut self, bytes: &[u8]) {
        for &b in bytes {
            let terminator = b == b',' || b == b'\n' || b == b'\r';
            self.state = match (self.state, b) {
                (FieldState::Start, b'"') => {
                    self.open_line = self.line;
                    FieldState::Quoted
                }
                (FieldState::Quoted, b'"') => FieldState::QuoteInQuoted,
                (FieldState::Quoted, _) => FieldState::Quoted,
                (FieldState::QuoteInQuoted, b'"') => FieldState::Quoted,
                (_, _) if terminator => FieldState::Start,
                (FieldState::Unquoted, b'"') => {
                    self.flag(self.line, "quote inside an unquoted field");
                    FieldState::Unquoted
                }
                (FieldState::QuoteInQuoted, _) => {
                    self.flag(self.line, "text after a closing quote");
                    FieldState::Unquoted
                }
                (_, _) => FieldState::Unquoted,
            };
            if b == b'\n' {
                self.line += 1;
            }
        }
    }

    fn finish(&mut self) {
        if self.state == FieldState::Quoted {
            self.flag(self.open_line, "unterminated quoted field");
        }
    }

    /// First violation on a line before `line`.
    fn violation_before(&self, line: u64) -> Option<(u64, &'static str)> {
        self.violation.filter(|(at, _)| *at < line)
    }
}

impl<R: Read> Read for QuoteCheck<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.finish();
        } else {
            self.scan(&buf[..n]);
        }
        Ok(n)
    }
}

/// A single data row: column name to raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    line: u64,
    fields: HashMap<String, String>,
}

impl Row {
    pub fn new(line: u64, fields: HashMap<String, String>) -> Self {
        Self { line, fields }
    }

    /// 1-based line number of the row in the input.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Raw value of a column, if the column exists.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Value of a column when it is present and not blank.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.trim().is_empty())
    }
}

/// Wraps a rewindable byte stream holding comma-separated text.
pub struct TabularReader<R> {
    inner: R,
}

impl<R: Read + Seek> TabularReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Current byte offset of the underlying stream.
    pub fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    /// Seek the underlying stream back to its start.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.inner.rewind()
    }

    /// Column names of the first row, or `None` for empty input.
    ///
    /// Leaves the stream rewound.
    pub fn header(&mut self) -> Result<Option<Vec<String>>, ReadError> {
        let header = {
            let rows = self.rows()?;
            rows.header().map(<[String]>::to_vec)
        };
        self.rewind()?;
        Ok(header)
    }

    /// Start a lazy pass over the data rows.
    ///
    /// # Errors
    ///
    /// [`ReadError::StreamPosition`] if the stream is not at offset 0, or
    /// [`ReadError::Malformed`] if the header row itself cannot be parsed.
    pub fn rows(&mut self) -> Result<Rows<'_, R>, ReadError> {
        let position = self.inner.stream_position()?;
        if position != 0 {
            return Err(ReadError::StreamPosition { position });
        }
        Rows::new(&mut self.inner)
    }

    /// Direct access to the wrapped stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

/// Lazy iterator over the data rows of one pass.
pub struct Rows<'a, R> {
    csv: csv::Reader<QuoteCheck<&'a mut R>>,
    header: Option<Vec<String>>,
    record: csv::StringRecord,
    done: bool,
}

impl<'a, R: Read> Rows<'a, R> {
    fn new(inner: &'a mut R) -> Result<Self, ReadError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::Headers)
            .from_reader(QuoteCheck::new(inner));

        let headers = csv.headers()?;
        let header: Option<Vec<String>> = if headers.is_empty() {
            None
        } else {
            Some(headers.iter().map(str::to_string).collect())
        };

        let next_line = csv.position().line();
        if let Some((line, reason)) = csv.get_ref().violation_before(next_line) {
            return Err(ReadError::malformed(line, reason));
        }

        Ok(Self {
            csv,
            header,
            record: csv::StringRecord::new(),
            done: false,
        })
    }

    /// Column names, or `None` when the input held no rows at all.
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }
}

impl<'a, R: Read> Iterator for Rows<'a, R> {
    type Item = Result<Row, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let header = match &self.header {
            Some(h) => h,
            None => {
                self.done = true;
                return None;
            }
        };

        match self.csv.read_record(&mut self.record) {
            Ok(true) => {
                let next_line = self.csv.position().line();
                if let Some((line, reason)) = self.csv.get_ref().violation_before(next_line) {
                    self.done = true;
                    return Some(Err(ReadError::malformed(line, reason)));
                }
                let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                let fields = header
                    .iter()
                    .cloned()
                    .zip(self.record.iter().map(str::to_string))
                    .collect();
                Some(Ok(Row::new(line, fields)))
            }
            Ok(false) => {
                self.done = true;
                self.csv
                    .get_ref()
                    .violation
                    .map(|(line, reason)| Err(ReadError::malformed(line, reason)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(ReadError::from(e)))
            }
        }
    }
}
