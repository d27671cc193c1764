//! Byte order selection and primitive extraction.
//!
//! A dump records the FUSE traffic of the machine it was taken on, so every
//! multi-byte field (framing lengths and ABI structures alike) is stored in
//! that machine's byte order. The order is chosen once per run and applied
//! uniformly.
//!
//! Reads go through `bytes::Buf`, which handles unaligned slices; payloads
//! are windows at arbitrary offsets of a growable buffer, so no alignment is
//! ever assumed.
//!
//! # Example
//!
//! ```
//! use parsefuse::protocol::ByteOrder;
//!
//! let bytes = [0x01, 0x00, 0x00, 0x00];
//! assert_eq!(ByteOrder::Little.read_u32(&bytes), 1);
//! assert_eq!(ByteOrder::Big.read_u32(&bytes), 0x0100_0000);
//! ```

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut};
use serde::Serialize;

use crate::error::ParsefuseError;

/// Byte order of the captured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Whatever the host uses.
    #[default]
    Native,
    /// Little endian.
    Little,
    /// Big endian.
    Big,
}

impl ByteOrder {
    /// The byte order of the machine running the dissector.
    pub fn host() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// Resolve `Native` into a concrete order.
    #[inline]
    pub fn resolve(self) -> Self {
        match self {
            ByteOrder::Native => Self::host(),
            concrete => concrete,
        }
    }

    /// Check whether values can be read without swapping.
    #[inline]
    pub fn is_host(self) -> bool {
        self.resolve() == Self::host()
    }

    /// Take a `u16` from the front of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if fewer than 2 bytes remain.
    #[inline]
    pub fn get_u16<B: Buf>(self, buf: &mut B) -> u16 {
        match self.resolve() {
            ByteOrder::Big => buf.get_u16(),
            _ => buf.get_u16_le(),
        }
    }

    /// Take a `u32` from the front of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if fewer than 4 bytes remain.
    #[inline]
    pub fn get_u32<B: Buf>(self, buf: &mut B) -> u32 {
        match self.resolve() {
            ByteOrder::Big => buf.get_u32(),
            _ => buf.get_u32_le(),
        }
    }

    /// Take a `u64` from the front of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if fewer than 8 bytes remain.
    #[inline]
    pub fn get_u64<B: Buf>(self, buf: &mut B) -> u64 {
        match self.resolve() {
            ByteOrder::Big => buf.get_u64(),
            _ => buf.get_u64_le(),
        }
    }

    /// Take an `i32` from the front of `buf`.
    #[inline]
    pub fn get_i32<B: Buf>(self, buf: &mut B) -> i32 {
        match self.resolve() {
            ByteOrder::Big => buf.get_i32(),
            _ => buf.get_i32_le(),
        }
    }

    /// Take an `i64` from the front of `buf`.
    #[inline]
    pub fn get_i64<B: Buf>(self, buf: &mut B) -> i64 {
        match self.resolve() {
            ByteOrder::Big => buf.get_i64(),
            _ => buf.get_i64_le(),
        }
    }

    /// Read a `u32` from the leading bytes of a slice.
    #[inline]
    pub fn read_u32(self, mut buf: &[u8]) -> u32 {
        self.get_u32(&mut buf)
    }

    /// Read a `u64` from the leading bytes of a slice.
    #[inline]
    pub fn read_u64(self, mut buf: &[u8]) -> u64 {
        self.get_u64(&mut buf)
    }

    /// Append a `u16` in this byte order.
    #[inline]
    pub fn put_u16<B: BufMut>(self, buf: &mut B, value: u16) {
        match self.resolve() {
            ByteOrder::Big => buf.put_u16(value),
            _ => buf.put_u16_le(value),
        }
    }

    /// Append a `u32` in this byte order.
    #[inline]
    pub fn put_u32<B: BufMut>(self, buf: &mut B, value: u32) {
        match self.resolve() {
            ByteOrder::Big => buf.put_u32(value),
            _ => buf.put_u32_le(value),
        }
    }

    /// Append a `u64` in this byte order.
    #[inline]
    pub fn put_u64<B: BufMut>(self, buf: &mut B, value: u64) {
        match self.resolve() {
            ByteOrder::Big => buf.put_u64(value),
            _ => buf.put_u64_le(value),
        }
    }

    /// Append an `i32` in this byte order.
    #[inline]
    pub fn put_i32<B: BufMut>(self, buf: &mut B, value: i32) {
        match self.resolve() {
            ByteOrder::Big => buf.put_i32(value),
            _ => buf.put_i32_le(value),
        }
    }
}

impl FromStr for ByteOrder {
    type Err = ParsefuseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(ByteOrder::Native),
            "le" | "little" => Ok(ByteOrder::Little),
            "be" | "big" => Ok(ByteOrder::Big),
            other => Err(ParsefuseError::UnknownByteOrder(other.to_string())),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ByteOrder::Native => "native",
            ByteOrder::Little => "le",
            ByteOrder::Big => "be",
        })
    }
}
