//! Framed reader for extracting whole messages from a dump stream.
//!
//! Uses a single `bytes::BytesMut` buffer that is reused across messages.
//! A message is located by a 4-byte length field preceded by `leadup` bytes
//! (the direction tag, when present). Reading is two-phase:
//! - read just enough to see the length field
//! - read the rest of the message
//!
//! Consumed bytes are only moved (compacted to the front of the buffer) when
//! there is no room left at the tail, and the buffer only grows when a
//! single message exceeds its capacity. Messages are handed out as borrowed
//! windows into the buffer, valid until the next read.
//!
//! # Example
//!
//! ```
//! use parsefuse::protocol::{ByteOrder, FrameReader};
//!
//! // 'R' tag, then a message that declares its own length of 6 bytes.
//! let dump = [b'R', 6, 0, 0, 0, 0xAA, 0xBB];
//! let mut reader = FrameReader::new(&dump[..], ByteOrder::Little);
//!
//! let message = reader.next_message(1, false).unwrap().unwrap();
//! assert_eq!(message, &dump[..]);
//! assert!(reader.next_message(1, false).unwrap().is_none());
//! ```

use std::io::{ErrorKind, Read};
use std::ops::Range;

use bytes::BytesMut;

use super::wire_format::{IN_HEADER_SIZE, ITEM_COUNT_LIMIT, LENGTH_FIELD_SIZE};
use super::ByteOrder;
use crate::error::{ParsefuseError, Result};

/// Default buffer capacity (64KB).
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Smallest capacity accepted: a direction tag plus a request header.
pub const MIN_CAPACITY: usize = 1 + IN_HEADER_SIZE;

/// Reader that yields one complete framed message per call.
pub struct FrameReader<R> {
    /// Byte source (file, stdin, in-memory slice).
    source: R,
    /// Backing storage; its length is the capacity.
    buffer: BytesMut,
    /// End of the bytes read from the source.
    filled: usize,
    /// Start of the unconsumed bytes.
    offset: usize,
    /// Stream position of `buffer[0]`.
    base: u64,
    /// Byte order of the length fields.
    order: ByteOrder,
}

impl<R: Read> FrameReader<R> {
    /// Create a reader with the default capacity.
    pub fn new(source: R, order: ByteOrder) -> Self {
        Self::with_capacity(source, order, DEFAULT_CAPACITY)
    }

    /// Create a reader with a custom initial capacity.
    ///
    /// Capacities below [`MIN_CAPACITY`] are raised to it.
    pub fn with_capacity(source: R, order: ByteOrder, capacity: usize) -> Self {
        Self {
            source,
            buffer: BytesMut::zeroed(capacity.max(MIN_CAPACITY)),
            filled: 0,
            offset: 0,
            base: 0,
            order,
        }
    }

    /// Extract the next message.
    ///
    /// `leadup` is the number of bytes before the 4-byte length field. With
    /// `counting` set, a field value below 16 is an item count: only the
    /// `leadup + 4` prefix is returned and the caller reads the items itself.
    ///
    /// Returns:
    /// - `Ok(Some(message))` with the whole frame, length field included
    /// - `Ok(None)` if the stream ended cleanly between messages
    /// - `Err(...)` on a short read, a malformed length, or an I/O fault
    pub fn next_message(&mut self, leadup: usize, counting: bool) -> Result<Option<&[u8]>> {
        let window = self.next_window(leadup, counting)?;
        Ok(window.map(|range| &self.buffer[range]))
    }

    /// Like [`next_message`](Self::next_message), but returns the position of
    /// the message inside the buffer. The range stays valid until the next
    /// read.
    pub(crate) fn next_window(
        &mut self,
        leadup: usize,
        counting: bool,
    ) -> Result<Option<Range<usize>>> {
        let prefix = leadup + LENGTH_FIELD_SIZE;
        let mut fresh = self.filled - self.offset;

        if fresh == 0 || self.offset + prefix > self.capacity() {
            self.compact();
        }
        if fresh < prefix {
            if !self.fill(prefix - fresh)? {
                if fresh == 0 {
                    return Ok(None);
                }
                return Err(ParsefuseError::ShortRead {
                    offset: self.position(),
                });
            }
            fresh = self.filled - self.offset;
        }

        let measure = self.order.read_u32(&self.buffer[self.offset + leadup..]);
        let mut len = leadup;
        if counting && measure < ITEM_COUNT_LIMIT {
            len += LENGTH_FIELD_SIZE;
        } else {
            len += measure as usize;
            if len < prefix {
                return Err(ParsefuseError::Structural(format!(
                    "length {} at offset {} does not cover its own field",
                    measure,
                    self.position() + leadup as u64
                )));
            }
            if self.offset + len > self.capacity() {
                self.compact();
                if len > self.capacity() {
                    self.grow(len);
                }
            }
            if fresh < len && !self.fill(len - fresh)? {
                return Err(ParsefuseError::ShortRead {
                    offset: self.position(),
                });
            }
        }

        let start = self.offset;
        self.offset += len;
        Ok(Some(start..start + len))
    }

    /// Borrow a window previously returned by `next_window`.
    #[inline]
    pub(crate) fn window(&self, range: Range<usize>) -> &[u8] {
        &self.buffer[range]
    }

    /// Read at least `request` bytes into the free tail.
    ///
    /// Returns `Ok(false)` if the source was already exhausted.
    fn fill(&mut self, request: usize) -> Result<bool> {
        let free = self.capacity() - self.filled;
        if request > free {
            return Err(ParsefuseError::Structural(format!(
                "requested {} bytes with only {} free in the read buffer",
                request, free
            )));
        }

        let mut read = 0;
        while read < request {
            match self.source.read(&mut self.buffer[self.filled + read..]) {
                Ok(0) if read == 0 => return Ok(false),
                Ok(0) => {
                    return Err(ParsefuseError::ShortRead {
                        offset: self.position(),
                    })
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.filled += read;
        Ok(true)
    }

    /// Move unconsumed bytes to the front of the buffer.
    fn compact(&mut self) {
        if self.offset == 0 {
            return;
        }
        self.buffer.copy_within(self.offset..self.filled, 0);
        self.filled -= self.offset;
        self.base += self.offset as u64;
        self.offset = 0;
    }

    fn grow(&mut self, capacity: usize) {
        tracing::debug!(
            from = self.capacity(),
            to = capacity,
            "growing read buffer for oversized message"
        );
        self.buffer.resize(capacity, 0);
    }
}

impl<R> FrameReader<R> {
    /// Current buffer capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Stream offset of the next unconsumed byte.
    #[inline]
    pub fn position(&self) -> u64 {
        self.base + self.offset as u64
    }

    /// Number of bytes read from the source but not yet consumed.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.filled - self.offset
    }

    /// Byte order used for length fields.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Consume the reader, returning the source.
    pub fn into_inner(self) -> R {
        self.source
    }
}

/// Preferred buffer capacity for reading `file`.
///
/// The file system's I/O block size when it exceeds [`DEFAULT_CAPACITY`],
/// otherwise the default.
pub fn io_block_size(file: &std::fs::File) -> usize {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        if let Ok(meta) = file.metadata() {
            let blksize = meta.blksize() as usize;
            if blksize > DEFAULT_CAPACITY {
                return blksize;
            }
        }
    }
    #[cfg(not(unix))]
    let _ = file;

    DEFAULT_CAPACITY
}
