//! Directory listing decoding.
//!
//! READDIR replies are a packed run of variable-size records, each padded to
//! an 8-byte boundary:
//! ```text
//! ┌──────────────────────────────┬────────────┬─────────┐
//! │ fuse_dirent (24 bytes)       │ name       │ padding │
//! │ ino, off, namelen, type      │ namelen    │ 0..7    │
//! └──────────────────────────────┴────────────┴─────────┘
//! ```
//! READDIRPLUS prefixes every record with a `fuse_entry_out`.

use bytes::Bytes;

use super::layout::decode_struct;
use super::value::{Struct, Value};
use crate::abi::layout::{DIRENT, ENTRY_OUT};
use crate::protocol::ByteOrder;

/// Byte offset of `namelen` inside `fuse_dirent`.
const NAMELEN_OFFSET: usize = 16;

/// One decoded directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// `fuse_entry_out`, READDIRPLUS only.
    pub entry: Option<Struct>,
    pub dirent: Struct,
    pub name: Bytes,
}

impl DirEntry {
    pub fn into_value(self) -> Value {
        let mut parts = Vec::with_capacity(3);
        if let Some(entry) = self.entry {
            parts.push(Value::Struct(entry));
        }
        parts.push(Value::Struct(self.dirent));
        parts.push(Value::Text(self.name));
        Value::List(parts)
    }
}

/// Size of a record holding a name of `namelen` bytes, padding included.
#[inline]
pub fn record_size(namelen: usize) -> usize {
    DIRENT.size() + namelen + ((8 - (namelen & 7)) & 7)
}

/// Split a directory listing into records.
///
/// Returns the decoded records and the bytes that did not form a complete
/// record. Never fails.
pub fn parse_dirents(buf: &[u8], plus: bool, order: ByteOrder) -> (Vec<DirEntry>, &[u8]) {
    let extra = if plus { ENTRY_OUT.size() } else { 0 };
    let mut entries = Vec::new();
    let mut rest = buf;

    while rest.len() >= extra + DIRENT.size() {
        let namelen = order.read_u32(&rest[extra + NAMELEN_OFFSET..]) as usize;
        let size = extra + record_size(namelen);
        if rest.len() < size {
            tracing::debug!(
                need = size,
                have = rest.len(),
                "partial directory record"
            );
            break;
        }

        let entry = if plus {
            decode_struct(&ENTRY_OUT, rest, order)
        } else {
            None
        };
        let Some(dirent) = decode_struct(&DIRENT, &rest[extra..], order) else {
            break;
        };
        let name_start = extra + DIRENT.size();
        entries.push(DirEntry {
            entry,
            dirent,
            name: Bytes::copy_from_slice(&rest[name_start..name_start + namelen]),
        });
        rest = &rest[size..];
    }

    (entries, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirent(ino: u64, off: u64, name: &[u8], typ: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&ino.to_le_bytes());
        buf.extend_from_slice(&off.to_le_bytes());
        buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
        buf.extend_from_slice(&typ.to_le_bytes());
        buf.extend_from_slice(name);
        buf.resize(record_size(name.len()), 0);
        buf
    }

    #[test]
    fn test_record_size_padding() {
        assert_eq!(record_size(5), 24 + 5 + 3);
        assert_eq!(record_size(8), 24 + 8);
        assert_eq!(record_size(1), 32);
        assert_eq!(record_size(0), 24);
    }

    #[test]
    fn test_two_records() {
        let mut buf = dirent(1, 1, b"hello", 4);
        buf.extend(dirent(2, 2, b"abcdefgh", 8));
        assert_eq!(buf.len(), 32 + 32);

        let (entries, rest) = parse_dirents(&buf, false, ByteOrder::Little);
        assert!(rest.is_empty());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, Bytes::from_static(b"hello"));
        assert_eq!(entries[0].dirent.unsigned("Ino"), Some(1));
        assert_eq!(entries[1].name, Bytes::from_static(b"abcdefgh"));
        assert_eq!(entries[1].dirent.unsigned("Type"), Some(8));
        assert!(entries[1].entry.is_none());
    }

    #[test]
    fn test_partial_record_left_over() {
        let mut buf = dirent(1, 1, b"a", 4);
        let second = dirent(2, 2, b"truncated", 8);
        buf.extend_from_slice(&second[..30]);

        let (entries, rest) = parse_dirents(&buf, false, ByteOrder::Little);
        assert_eq!(entries.len(), 1);
        assert_eq!(rest, &second[..30]);
    }

    #[test]
    fn test_short_tail_left_over() {
        let mut buf = dirent(1, 1, b"a", 4);
        buf.extend_from_slice(&[0xAA; 10]);

        let (entries, rest) = parse_dirents(&buf, false, ByteOrder::Little);
        assert_eq!(entries.len(), 1);
        assert_eq!(rest, &[0xAA; 10]);
    }

    #[test]
    fn test_plus_records_carry_entry_out() {
        let mut record = vec![0u8; ENTRY_OUT.size()];
        record[0] = 42;
        record.extend(dirent(42, 1, b"file", 8));

        let mut buf = record.clone();
        buf.extend_from_slice(&record);

        let (entries, rest) = parse_dirents(&buf, true, ByteOrder::Little);
        assert!(rest.is_empty());
        assert_eq!(entries.len(), 2);
        let entry = entries[0].entry.as_ref().unwrap();
        assert_eq!(entry.unsigned("Nodeid"), Some(42));
        assert_eq!(entries[0].name, Bytes::from_static(b"file"));

        match entries[1].clone().into_value() {
            Value::List(parts) => assert_eq!(parts.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_listing() {
        let (entries, rest) = parse_dirents(&[], true, ByteOrder::Little);
        assert!(entries.is_empty());
        assert!(rest.is_empty());
    }
}
