//! Streaming CSV row parsing
//!
//! Accumulates decoded text across chunk boundaries and yields one object per
//! complete CSV row. Newlines inside quoted fields do not terminate a row, so
//! line splitting tracks quote state rather than scanning for bare `\n`.
//! The unterminated tail of the input is held back verbatim, quoting intact,
//! until later text completes it.

use crate::error::{Error, Result};
use crate::types::{JsonValue, Row};

/// Incremental parser from decoded text to complete CSV rows
///
/// The first complete line becomes the header. Every subsequent row must have
/// exactly as many fields as the header; a mismatch is a fatal error carrying
/// both sides for diagnosis.
#[derive(Debug, Default)]
pub struct CsvRowParser {
    headers: Option<Vec<String>>,
    pending: String,
}

impl CsvRowParser {
    /// Create a parser with no header seen yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Header fields, once the first complete line has arrived
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Feed decoded text, returning every row it completes
    pub fn feed(&mut self, text: &str) -> Result<Vec<Row>> {
        self.pending.push_str(text);

        let mut rows = Vec::new();
        for line in split_complete_lines(&mut self.pending) {
            // Bulk extracts end with a newline; a blank line is a terminator,
            // not a row.
            if line.is_empty() {
                continue;
            }
            if let Some(row) = self.take_line(&line)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Flush the held-back tail at end of input, yielding a final row if the
    /// file did not end with a newline
    pub fn finish(&mut self) -> Result<Option<Row>> {
        let mut tail = std::mem::take(&mut self.pending);
        if tail.ends_with('\r') {
            tail.pop();
        }
        if tail.is_empty() {
            return Ok(None);
        }
        self.take_line(&tail)
    }

    /// Consume one complete logical line: the first becomes the header, the
    /// rest become rows
    fn take_line(&mut self, line: &str) -> Result<Option<Row>> {
        let fields = parse_fields(line);
        match &self.headers {
            None => {
                self.headers = Some(fields);
                Ok(None)
            }
            Some(headers) => {
                if fields.len() != headers.len() {
                    return Err(Error::NonRectangularCsvRow {
                        header: headers.clone(),
                        row: fields,
                    });
                }
                let mut row = Row::new();
                for (header, field) in headers.iter().zip(fields) {
                    row.insert(header.clone(), JsonValue::String(field));
                }
                Ok(Some(row))
            }
        }
    }
}

/// Split every complete logical line off the front of `pending`, leaving the
/// unterminated tail in place.
///
/// A line is complete at an unquoted `\n`; a `\r` immediately before it is
/// stripped. Quote state toggles on every `"`, which handles the `""` escape
/// as well since it toggles twice.
fn split_complete_lines(pending: &mut String) -> Vec<String> {
    let bytes = pending.as_bytes();
    let mut lines = Vec::new();
    let mut in_quotes = false;
    let mut line_start = 0;
    let mut consumed = 0;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => {
                let mut end = i;
                if end > line_start && bytes[end - 1] == b'\r' {
                    end -= 1;
                }
                lines.push(pending[line_start..end].to_string());
                line_start = i + 1;
                consumed = i + 1;
            }
            _ => {}
        }
    }

    if consumed > 0 {
        pending.drain(..consumed);
    }
    lines
}

/// Split one logical line into fields, honoring quoting and the `""` escape
fn parse_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                in_quotes = true;
            }
        } else if c == ',' && !in_quotes {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }

    fields.push(current);
    fields
}
