//! NDJSON output.
//!
//! One object per record:
//! ```text
//! {"Truncated":false,"Msg":[[<meta>..],"LOOKUP",{<in header>},[<body>..]]}
//! {"Truncated":false,"Msg":[[<meta>..],{<out header>},[<body>..]]}
//! {"Truncated":false,"Msg":[[<meta>..],{<out header>},"<base64 bytes>"]}
//! ```
//! The last form is a reply whose request was never seen. Byte blobs are
//! written as standard base64.

use std::io::Write;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use super::{write_line, Render};
use crate::codec::Value;
use crate::error::Result;
use crate::Record;

/// Serialization view of a record's message parts.
pub struct MsgView<'a> {
    record: &'a Record,
    meta: Vec<Value>,
    limit: usize,
    with_opname: bool,
}

impl<'a> MsgView<'a> {
    pub fn new(record: &'a Record, limit: usize) -> Self {
        Self {
            record,
            meta: record.meta.iter().map(Value::from).collect(),
            limit,
            with_opname: true,
        }
    }

    /// Leave the operation name out of the sequence.
    pub fn without_opname(mut self) -> Self {
        self.with_opname = false;
        self
    }

    /// Whether any blob gets cut by the limit.
    pub fn truncated(&self) -> bool {
        self.meta
            .iter()
            .chain(&self.record.body)
            .any(|v| v.exceeds(self.limit))
    }
}

struct Seq<'a> {
    values: &'a [Value],
    limit: usize,
}

impl Serialize for Seq<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.values.len()))?;
        for value in self.values {
            seq.serialize_element(&value.limited(self.limit))?;
        }
        seq.end()
    }
}

impl Serialize for MsgView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let record = self.record;
        let opname = record.opname.as_deref().filter(|_| self.with_opname);

        let mut seq = serializer.serialize_seq(Some(3 + opname.is_some() as usize))?;
        seq.serialize_element(&Seq {
            values: &self.meta,
            limit: self.limit,
        })?;
        if let Some(name) = opname {
            seq.serialize_element(name)?;
        }
        seq.serialize_element(&record.header)?;
        match (record.is_orphan(), record.body.as_slice()) {
            (true, [raw]) => seq.serialize_element(&raw.limited(self.limit))?,
            (_, body) => seq.serialize_element(&Seq {
                values: body,
                limit: self.limit,
            })?,
        }
        seq.end()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct JsonRecord<'a> {
    truncated: bool,
    msg: &'a MsgView<'a>,
}

/// One JSON object per record.
pub struct JsonRenderer<W> {
    out: W,
    limit: usize,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W, limit: usize) -> Self {
        Self { out, limit }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Render for JsonRenderer<W> {
    fn render(&mut self, record: &Record) -> Result<()> {
        let msg = MsgView::new(record, self.limit);
        let line = serde_json::to_vec(&JsonRecord {
            truncated: msg.truncated(),
            msg: &msg,
        })?;
        write_line(&mut self.out, &line)
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
