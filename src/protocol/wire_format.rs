//! FUSE message headers and framing constants.
//!
//! Every FUSE message starts with its own total length, so the length field
//! of a dump frame is the first field of the kernel header:
//! ```text
//! request  (fuse_in_header, 40 bytes)
//! ┌────────┬────────┬──────────┬──────────┬──────┬──────┬──────┬─────────┐
//! │ len    │ opcode │ unique   │ nodeid   │ uid  │ gid  │ pid  │ padding │
//! │ u32    │ u32    │ u64      │ u64      │ u32  │ u32  │ u32  │ u32     │
//! └────────┴────────┴──────────┴──────────┴──────┴──────┴──────┴─────────┘
//! response (fuse_out_header, 16 bytes)
//! ┌────────┬────────┬──────────┐
//! │ len    │ error  │ unique   │
//! │ u32    │ i32    │ u64      │
//! └────────┴────────┴──────────┘
//! ```
//!
//! Byte order is whatever the capture was taken with (see [`ByteOrder`]).

use std::fmt;

use serde::Serialize;

use super::ByteOrder;
use crate::error::{ParsefuseError, Result};

/// Size of the length (or item count) field.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Values of the leading field below this are item counts (dump format 2).
///
/// The smallest FUSE message is a bare `fuse_out_header` of 16 bytes, so a
/// length can never be mistaken for a count below this value.
pub const ITEM_COUNT_LIMIT: u32 = 16;

/// Size of `fuse_in_header`.
pub const IN_HEADER_SIZE: usize = 40;

/// Size of `fuse_out_header`.
pub const OUT_HEADER_SIZE: usize = 16;

/// Size of a timestamp metadata item: length, seconds, nanoseconds.
pub const TIMESTAMP_ITEM_SIZE: usize = LENGTH_FIELD_SIZE + 8 + 4;

const _: () = assert!(IN_HEADER_SIZE > OUT_HEADER_SIZE, "header size assertion fails");
const _: () = assert!(OUT_HEADER_SIZE as u32 == ITEM_COUNT_LIMIT);

/// Direction tag of a captured message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Read from `/dev/fuse` by the filesystem: a kernel request.
    Request,
    /// Written to `/dev/fuse` by the filesystem: a reply.
    Response,
}

impl Direction {
    /// Tag byte for requests.
    pub const REQUEST_TAG: u8 = b'R';
    /// Tag byte for responses.
    pub const RESPONSE_TAG: u8 = b'W';

    /// Map a tag byte to a direction.
    pub fn from_tag(tag: u8, offset: u64) -> Result<Self> {
        match tag {
            Self::REQUEST_TAG => Ok(Direction::Request),
            Self::RESPONSE_TAG => Ok(Direction::Response),
            other => Err(ParsefuseError::UnknownDirection {
                tag: other as char,
                offset,
            }),
        }
    }

    /// The tag byte written in dumps.
    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            Direction::Request => Self::REQUEST_TAG,
            Direction::Response => Self::RESPONSE_TAG,
        }
    }
}

/// Decoded `fuse_in_header`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InHeader {
    pub len: u32,
    pub opcode: u32,
    pub unique: u64,
    pub nodeid: u64,
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
    pub padding: u32,
}

impl InHeader {
    /// Create a header for a request of `body_len` payload bytes.
    pub fn new(opcode: u32, unique: u64, nodeid: u64, body_len: usize) -> Self {
        Self {
            len: (IN_HEADER_SIZE + body_len) as u32,
            opcode,
            unique,
            nodeid,
            uid: 0,
            gid: 0,
            pid: 0,
            padding: 0,
        }
    }

    /// Decode from the front of `buf`.
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(mut buf: &[u8], order: ByteOrder) -> Option<Self> {
        if buf.len() < IN_HEADER_SIZE {
            return None;
        }
        let buf = &mut buf;
        Some(Self {
            len: order.get_u32(buf),
            opcode: order.get_u32(buf),
            unique: order.get_u64(buf),
            nodeid: order.get_u64(buf),
            uid: order.get_u32(buf),
            gid: order.get_u32(buf),
            pid: order.get_u32(buf),
            padding: order.get_u32(buf),
        })
    }

    /// Encode in the given byte order.
    pub fn encode(&self, order: ByteOrder) -> Vec<u8> {
        let mut buf = Vec::with_capacity(IN_HEADER_SIZE);
        order.put_u32(&mut buf, self.len);
        order.put_u32(&mut buf, self.opcode);
        order.put_u64(&mut buf, self.unique);
        order.put_u64(&mut buf, self.nodeid);
        order.put_u32(&mut buf, self.uid);
        order.put_u32(&mut buf, self.gid);
        order.put_u32(&mut buf, self.pid);
        order.put_u32(&mut buf, self.padding);
        buf
    }
}

/// Decoded `fuse_out_header`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutHeader {
    pub len: u32,
    pub error: i32,
    pub unique: u64,
}

impl OutHeader {
    /// Create a header for a reply of `body_len` payload bytes.
    pub fn new(unique: u64, error: i32, body_len: usize) -> Self {
        Self {
            len: (OUT_HEADER_SIZE + body_len) as u32,
            error,
            unique,
        }
    }

    /// Decode from the front of `buf`.
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(mut buf: &[u8], order: ByteOrder) -> Option<Self> {
        if buf.len() < OUT_HEADER_SIZE {
            return None;
        }
        let buf = &mut buf;
        Some(Self {
            len: order.get_u32(buf),
            error: order.get_i32(buf),
            unique: order.get_u64(buf),
        })
    }

    /// Encode in the given byte order.
    pub fn encode(&self, order: ByteOrder) -> Vec<u8> {
        let mut buf = Vec::with_capacity(OUT_HEADER_SIZE);
        order.put_u32(&mut buf, self.len);
        order.put_i32(&mut buf, self.error);
        order.put_u64(&mut buf, self.unique);
        buf
    }
}

/// Either header, as carried by a decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Header {
    In(InHeader),
    Out(OutHeader),
}

impl Header {
    /// Correlation identifier.
    #[inline]
    pub fn unique(&self) -> u64 {
        match self {
            Header::In(h) => h.unique,
            Header::Out(h) => h.unique,
        }
    }

    /// Total message length as declared by the header.
    #[inline]
    pub fn len(&self) -> u32 {
        match self {
            Header::In(h) => h.len,
            Header::Out(h) => h.len,
        }
    }
}

/// Build a complete request message: header followed by `body`.
///
/// The header's `len` is taken as given, so callers can build malformed
/// messages on purpose.
pub fn build_request(header: &InHeader, body: &[u8], order: ByteOrder) -> Vec<u8> {
    let mut buf = header.encode(order);
    buf.extend_from_slice(body);
    buf
}

/// Build a complete response message: header followed by `body`.
pub fn build_response(header: &OutHeader, body: &[u8], order: ByteOrder) -> Vec<u8> {
    let mut buf = header.encode(order);
    buf.extend_from_slice(body);
    buf
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Header::In(h) => write!(
                f,
                "{{Len:{} Opcode:{} Unique:{} Nodeid:{} Uid:{} Gid:{} Pid:{} Padding:{}}}",
                h.len, h.opcode, h.unique, h.nodeid, h.uid, h.gid, h.pid, h.padding
            ),
            Header::Out(h) => write!(
                f,
                "{{Len:{} Error:{} Unique:{}}}",
                h.len, h.error, h.unique
            ),
        }
    }
}
