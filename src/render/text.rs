//! Human-readable output.
//!
//! One line per record, fields separated by spaces: metadata, operation name
//! (requests and notifications), header, then the body. Lists in the body are
//! flattened. Blobs are quoted with escapes and cut to the limit, with the
//! full length appended:
//! ```text
//! 2020-05-01T10:00:00Z WRITE {Len:46 Opcode:16 ...} {Fh:1 ...} "ab"... 6
//! ```

use std::fmt::Write as _;
use std::io::Write;

use super::{write_line, Render};
use crate::codec::{escape_bytes, Value};
use crate::error::Result;
use crate::Record;

/// Format one record as a text line (without the newline).
pub fn format_record(record: &Record, limit: usize) -> String {
    let mut line = String::new();
    for meta in &record.meta {
        push_value(&mut line, &Value::from(meta), limit);
    }
    if let Some(name) = &record.opname {
        push_field(&mut line, name);
    }
    push_field(&mut line, &record.header.to_string());
    for value in &record.body {
        push_value(&mut line, value, limit);
    }
    line
}

fn push_field(line: &mut String, field: &str) {
    if !line.is_empty() {
        line.push(' ');
    }
    line.push_str(field);
}

fn push_value(line: &mut String, value: &Value, limit: usize) {
    match value {
        Value::List(items) => {
            for item in items {
                push_value(line, item, limit);
            }
        }
        Value::Bytes(data) => {
            if !line.is_empty() {
                line.push(' ');
            }
            if limit > 0 && data.len() > limit {
                let _ = write!(line, "\"{}\"... {}", escape_bytes(&data[..limit]), data.len());
            } else {
                let _ = write!(line, "\"{}\"", escape_bytes(data));
            }
        }
        Value::Timestamp(ts) => push_field(line, &ts.to_rfc3339()),
        other => push_field(line, &other.to_string()),
    }
}

/// Text line per record.
pub struct TextRenderer<W> {
    out: W,
    limit: usize,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W, limit: usize) -> Self {
        Self { out, limit }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Render for TextRenderer<W> {
    fn render(&mut self, record: &Record) -> Result<()> {
        let line = format_record(record, self.limit);
        write_line(&mut self.out, line.as_bytes())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
