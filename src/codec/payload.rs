//! Message body decoders.
//!
//! Most bodies follow their opcode's item list ([`Decoder::Items`]). A few
//! have shapes an item list cannot express and get a dedicated decoder:
//!
//! - `BATCH_FORGET` requests: a count followed by that many entries
//! - `READDIR` / `READDIRPLUS` replies: packed directory records
//! - `LISTXATTR` replies: NUL-separated attribute names
//!
//! Anything unknown is passed through as [`Decoder::Raw`].

use bytes::Bytes;

use super::dirent::{parse_dirents, DirEntry};
use super::layout::{decode_items, decode_struct};
use super::value::Value;
use crate::abi::layout::{BATCH_FORGET_IN, FORGET_ONE};
use crate::abi::Item;
use crate::error::{ParsefuseError, Result};
use crate::protocol::ByteOrder;

/// How to decode one kind of message body.
#[derive(Debug, Clone, Copy)]
pub enum Decoder {
    /// Walk a fixed item list.
    Items(&'static [Item]),
    BatchForget,
    Readdir,
    ReaddirPlus,
    ListXattr,
    /// Keep the body as bytes.
    Raw,
}

impl Decoder {
    /// Decode a message body (the bytes after the FUSE header).
    ///
    /// # Errors
    ///
    /// Only `BATCH_FORGET` can fail, when the body is shorter than its
    /// declared entry count.
    pub fn decode(&self, body: &[u8], order: ByteOrder) -> Result<Vec<Value>> {
        Ok(match *self {
            Decoder::Items(items) => decode_items(items, body, order),
            Decoder::BatchForget => decode_batch_forget(body, order)?,
            Decoder::Readdir => decode_dirents(body, false, order),
            Decoder::ReaddirPlus => decode_dirents(body, true, order),
            Decoder::ListXattr => decode_listxattr(body),
            Decoder::Raw => raw(body),
        })
    }
}

/// The whole body as a single blob, or nothing if empty.
pub fn raw(body: &[u8]) -> Vec<Value> {
    if body.is_empty() {
        Vec::new()
    } else {
        vec![Value::Bytes(Bytes::copy_from_slice(body))]
    }
}

/// Decode `fuse_batch_forget_in` and its `fuse_forget_one` entries.
pub fn decode_batch_forget(body: &[u8], order: ByteOrder) -> Result<Vec<Value>> {
    let header = decode_struct(&BATCH_FORGET_IN, body, order).ok_or_else(|| {
        ParsefuseError::Structural(format!(
            "BATCH_FORGET body of {} bytes is shorter than its header",
            body.len()
        ))
    })?;
    let count = header.unsigned("Count").unwrap_or(0);

    let rest = &body[BATCH_FORGET_IN.size()..];
    let need = count.saturating_mul(FORGET_ONE.size() as u64);
    if (rest.len() as u64) < need {
        return Err(ParsefuseError::Structural(format!(
            "BATCH_FORGET declares {count} entries but carries {} bytes",
            rest.len()
        )));
    }

    let need = need as usize;
    let forgets = rest[..need]
        .chunks_exact(FORGET_ONE.size())
        .filter_map(|chunk| decode_struct(&FORGET_ONE, chunk, order))
        .map(Value::Struct)
        .collect();

    let mut values = vec![Value::Struct(header), Value::List(forgets)];
    values.extend(raw(&rest[need..]));
    Ok(values)
}

/// Decode a directory listing: the records, then any unparsed tail.
pub fn decode_dirents(body: &[u8], plus: bool, order: ByteOrder) -> Vec<Value> {
    let (entries, rest) = parse_dirents(body, plus, order);
    let mut values = Vec::with_capacity(2);
    if !entries.is_empty() {
        values.push(Value::List(
            entries.into_iter().map(DirEntry::into_value).collect(),
        ));
    }
    values.extend(raw(rest));
    values
}

/// Split a `LISTXATTR` reply into attribute names.
///
/// Every name is NUL-terminated, so the final split segment is empty and
/// dropped. An unterminated tail is kept as bytes.
pub fn decode_listxattr(body: &[u8]) -> Vec<Value> {
    if body.is_empty() {
        return Vec::new();
    }
    let mut segments: Vec<&[u8]> = body.split(|&b| b == 0).collect();
    let tail = segments.pop().unwrap_or_default();

    let mut values = vec![Value::List(
        segments
            .into_iter()
            .map(|name| Value::Text(Bytes::copy_from_slice(name)))
            .collect(),
    )];
    values.extend(raw(tail));
    values
}
