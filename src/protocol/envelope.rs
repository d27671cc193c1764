//! Dump format envelopes.
//!
//! A dump is a sequence of framed FUSE messages, each preceded by a
//! direction tag. Two framing generations exist:
//!
//! ```text
//! format 1:  ┌─────┬────────────────────────────┐
//!            │ dir │ FUSE message (len first)   │
//!            └─────┴────────────────────────────┘
//!
//! format 2:  ┌─────┬───────┬────────┬─────┬────────┬──────────────┐
//!            │ dir │ count │ item 1 │ ... │ item n │ FUSE message │
//!            └─────┴───────┴────────┴─────┴────────┴──────────────┘
//!            count = n + 1 (the message is the last item), count < 16
//!            item  = len u32 (counting itself) + data
//! ```
//!
//! A format 2 reader also accepts format 1 framing: a leading value of 16
//! or more cannot be an item count, so it is the message length itself.
//! The first metadata item carries the capture timestamp.

use std::fmt;
use std::io::Read;
use std::ops::Range;
use std::str::FromStr;

use bytes::Bytes;

use super::frame_reader::FrameReader;
use super::wire_format::{
    Direction, ITEM_COUNT_LIMIT, LENGTH_FIELD_SIZE, TIMESTAMP_ITEM_SIZE,
};
use super::ByteOrder;
use crate::error::{ParsefuseError, Result};

/// Framing generation of a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpFormat {
    /// Direction tag followed by the bare message.
    V1,
    /// Direction tag, item count, metadata items, message.
    #[default]
    V2,
}

impl FromStr for DumpFormat {
    type Err = ParsefuseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1" | "1.0" => Ok(DumpFormat::V1),
            "2" | "2.0" => Ok(DumpFormat::V2),
            other => Err(ParsefuseError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for DumpFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DumpFormat::V1 => "1",
            DumpFormat::V2 => "2",
        })
    }
}

/// Capture time of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub secs: u64,
    pub nanos: u32,
}

impl Timestamp {
    /// RFC 3339 rendering in UTC with up to nanosecond precision.
    ///
    /// Trailing zeros of the fraction are dropped, and so is the fraction
    /// itself when zero: `2020-05-01T10:00:00.5Z`, `2020-05-01T10:00:00Z`.
    pub fn to_rfc3339(&self) -> String {
        let Some(dt) = i64::try_from(self.secs)
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, self.nanos))
        else {
            return format!("{}.{:09}", self.secs, self.nanos);
        };
        let mut out = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
        let fraction = dt.timestamp_subsec_nanos() % 1_000_000_000;
        if fraction > 0 {
            let digits = format!("{fraction:09}");
            out.push('.');
            out.push_str(digits.trim_end_matches('0'));
        }
        out.push('Z');
        out
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

/// Envelope metadata item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Meta {
    /// Capture timestamp (first item, when sized as one).
    Timestamp(Timestamp),
    /// Any other item, length prefix stripped.
    Blob(Bytes),
}

/// One message as read from the dump.
#[derive(Debug)]
pub struct Envelope<'a> {
    /// Stream offset of the direction tag.
    pub offset: u64,
    pub direction: Direction,
    pub meta: Vec<Meta>,
    /// Undecoded FUSE message, starting with its header.
    pub payload: &'a [u8],
}

/// Reader yielding one [`Envelope`] per message.
pub struct EnvelopeReader<R> {
    frames: FrameReader<R>,
    format: DumpFormat,
}

impl<R: Read> EnvelopeReader<R> {
    /// Wrap a frame reader.
    pub fn new(frames: FrameReader<R>, format: DumpFormat) -> Self {
        Self { frames, format }
    }

    /// Dump format being read.
    pub fn format(&self) -> DumpFormat {
        self.format
    }

    /// Underlying frame reader.
    pub fn frames(&self) -> &FrameReader<R> {
        &self.frames
    }

    /// Read the next message.
    ///
    /// Returns `Ok(None)` when the dump ends cleanly between messages.
    pub fn next_envelope(&mut self) -> Result<Option<Envelope<'_>>> {
        match self.format {
            DumpFormat::V1 => self.next_v1(),
            DumpFormat::V2 => self.next_v2(),
        }
    }

    fn next_v1(&mut self) -> Result<Option<Envelope<'_>>> {
        let offset = self.frames.position();
        let Some(message) = self.frames.next_message(1, false)? else {
            return Ok(None);
        };
        let direction = Direction::from_tag(message[0], offset)?;

        Ok(Some(Envelope {
            offset,
            direction,
            meta: Vec::new(),
            payload: &message[1..],
        }))
    }

    fn next_v2(&mut self) -> Result<Option<Envelope<'_>>> {
        let order = self.frames.byte_order();
        let offset = self.frames.position();
        let Some(head) = self.frames.next_window(1, true)? else {
            return Ok(None);
        };
        let (tag, count) = {
            let head = self.frames.window(head.clone());
            (head[0], order.read_u32(&head[1..]))
        };
        let direction = Direction::from_tag(tag, offset)?;

        if count >= ITEM_COUNT_LIMIT {
            // Format 1 framing: the count field is the message length.
            return Ok(Some(Envelope {
                offset,
                direction,
                meta: Vec::new(),
                payload: self.frames.window(head.start + 1..head.end),
            }));
        }

        let mut meta = Vec::with_capacity(count.saturating_sub(1) as usize);
        for index in 1..count {
            let item = self.read_item(offset)?;
            let item = self.frames.window(item);
            if index == 1 && item.len() == TIMESTAMP_ITEM_SIZE {
                meta.push(Meta::Timestamp(Timestamp {
                    secs: order.read_u64(&item[LENGTH_FIELD_SIZE..]),
                    nanos: order.read_u32(&item[LENGTH_FIELD_SIZE + 8..]),
                }));
            } else {
                if index == 1 {
                    tracing::debug!(
                        offset,
                        size = item.len(),
                        "first metadata item is not a timestamp"
                    );
                }
                meta.push(Meta::Blob(Bytes::copy_from_slice(
                    &item[LENGTH_FIELD_SIZE..],
                )));
            }
        }

        let payload = self.read_item(offset)?;
        Ok(Some(Envelope {
            offset,
            direction,
            meta,
            payload: self.frames.window(payload),
        }))
    }

    /// Read an item that must be present.
    fn read_item(&mut self, offset: u64) -> Result<Range<usize>> {
        self.frames
            .next_window(0, false)?
            .ok_or(ParsefuseError::ShortRead { offset })
    }
}

/// Frame a FUSE message in dump format 1.
pub fn build_message_v1(direction: Direction, message: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + message.len());
    buf.push(direction.tag());
    buf.extend_from_slice(message);
    buf
}

/// Frame a FUSE message in dump format 2 with the given metadata items.
///
/// # Panics
///
/// Panics if `meta` has 15 or more items (the count must stay below 16).
pub fn build_message_v2(
    direction: Direction,
    meta: &[Meta],
    message: &[u8],
    order: ByteOrder,
) -> Vec<u8> {
    assert!(meta.len() + 1 < ITEM_COUNT_LIMIT as usize, "too many metadata items");

    let mut buf = Vec::with_capacity(1 + LENGTH_FIELD_SIZE + message.len());
    buf.push(direction.tag());
    order.put_u32(&mut buf, meta.len() as u32 + 1);
    for item in meta {
        match item {
            Meta::Timestamp(ts) => {
                order.put_u32(&mut buf, TIMESTAMP_ITEM_SIZE as u32);
                order.put_u64(&mut buf, ts.secs);
                order.put_u32(&mut buf, ts.nanos);
            }
            Meta::Blob(blob) => {
                order.put_u32(&mut buf, (LENGTH_FIELD_SIZE + blob.len()) as u32);
                buf.extend_from_slice(blob);
            }
        }
    }
    buf.extend_from_slice(message);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame_reader::tests::ChunkedReader;
    use crate::protocol::{InHeader, OutHeader, OUT_HEADER_SIZE};

    const ORDER: ByteOrder = ByteOrder::Little;

    fn request(unique: u64, body: &[u8]) -> Vec<u8> {
        let mut message = InHeader::new(1, unique, 1, body.len()).encode(ORDER);
        message.extend_from_slice(body);
        message
    }

    fn reader(dump: &[u8], format: DumpFormat) -> EnvelopeReader<&[u8]> {
        EnvelopeReader::new(FrameReader::new(dump, ORDER), format)
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("1".parse::<DumpFormat>().unwrap(), DumpFormat::V1);
        assert_eq!("2.0".parse::<DumpFormat>().unwrap(), DumpFormat::V2);
        assert_eq!(DumpFormat::default(), DumpFormat::V2);

        let err = "3".parse::<DumpFormat>().unwrap_err();
        assert!(err.to_string().contains("unknown fusedump format version 3"));
    }

    #[test]
    fn test_v1_envelope() {
        let message = request(7, b"name\0");
        let dump = build_message_v1(Direction::Request, &message);

        let mut envelopes = reader(&dump, DumpFormat::V1);
        let envelope = envelopes.next_envelope().unwrap().unwrap();
        assert_eq!(envelope.direction, Direction::Request);
        assert!(envelope.meta.is_empty());
        assert_eq!(envelope.payload, &message[..]);
        assert_eq!(envelope.offset, 0);

        assert!(envelopes.next_envelope().unwrap().is_none());
    }

    #[test]
    fn test_v2_timestamp_and_blobs() {
        let message = request(8, b"");
        let meta = vec![
            Meta::Timestamp(Timestamp { secs: 1_700_000_000, nanos: 123 }),
            Meta::Blob(Bytes::from_static(b"aux")),
        ];
        let dump = build_message_v2(Direction::Request, &meta, &message, ORDER);

        let mut envelopes = reader(&dump, DumpFormat::V2);
        let envelope = envelopes.next_envelope().unwrap().unwrap();
        assert_eq!(envelope.meta, meta);
        assert_eq!(envelope.payload, &message[..]);
    }

    #[test]
    fn test_v2_first_item_not_a_timestamp() {
        let message = request(9, b"");
        let meta = vec![Meta::Blob(Bytes::from_static(b"odd sized"))];
        let dump = build_message_v2(Direction::Request, &meta, &message, ORDER);

        let mut envelopes = reader(&dump, DumpFormat::V2);
        let envelope = envelopes.next_envelope().unwrap().unwrap();
        assert_eq!(envelope.meta, meta);
    }

    #[test]
    fn test_v2_count_zero_and_one() {
        let message = request(10, b"x\0");
        for count in [0u32, 1] {
            let mut dump = vec![b'R'];
            ORDER.put_u32(&mut dump, count);
            dump.extend_from_slice(&message);

            let mut envelopes = reader(&dump, DumpFormat::V2);
            let envelope = envelopes.next_envelope().unwrap().unwrap();
            assert!(envelope.meta.is_empty());
            assert_eq!(envelope.payload, &message[..]);
        }
    }

    #[test]
    fn test_v2_count_fifteen_reads_fifteen_items() {
        let message = request(11, b"");
        let meta: Vec<Meta> = (0..14u8)
            .map(|i| Meta::Blob(Bytes::from(vec![i; i as usize])))
            .collect();
        let dump = build_message_v2(Direction::Request, &meta, &message, ORDER);
        assert_eq!(ORDER.read_u32(&dump[1..]), 15);

        let mut envelopes = reader(&dump, DumpFormat::V2);
        let envelope = envelopes.next_envelope().unwrap().unwrap();
        assert_eq!(envelope.meta.len(), 14);
        assert_eq!(envelope.payload, &message[..]);
        assert!(envelopes.next_envelope().unwrap().is_none());
    }

    #[test]
    fn test_v2_sixteen_is_a_length() {
        // A bare out header is exactly 16 bytes.
        let message = OutHeader::new(12, 0, 0).encode(ORDER);
        assert_eq!(message.len(), OUT_HEADER_SIZE);
        let dump = build_message_v1(Direction::Response, &message);

        let mut envelopes = reader(&dump, DumpFormat::V2);
        let envelope = envelopes.next_envelope().unwrap().unwrap();
        assert_eq!(envelope.direction, Direction::Response);
        assert!(envelope.meta.is_empty());
        assert_eq!(envelope.payload.len(), 16);
        assert_eq!(envelope.payload, &message[..]);
    }

    #[test]
    fn test_v2_missing_payload_is_short_read() {
        let mut dump = vec![b'R'];
        ORDER.put_u32(&mut dump, 2);
        ORDER.put_u32(&mut dump, 16);
        ORDER.put_u64(&mut dump, 1);
        ORDER.put_u32(&mut dump, 0);

        let mut envelopes = reader(&dump, DumpFormat::V2);
        let err = envelopes.next_envelope().unwrap_err();
        assert!(matches!(err, ParsefuseError::ShortRead { offset: 0 }));
    }

    #[test]
    fn test_unknown_direction() {
        let message = request(13, b"");
        let mut dump = build_message_v1(Direction::Request, &message);
        dump[0] = b'Q';

        let mut envelopes = reader(&dump, DumpFormat::V1);
        assert!(matches!(
            envelopes.next_envelope().unwrap_err(),
            ParsefuseError::UnknownDirection { tag: 'Q', .. }
        ));
    }

    #[test]
    fn test_mixed_stream_trickled() {
        let mut dump = Vec::new();
        let mut expected = Vec::new();
        for i in 0..10u64 {
            let message = request(i, &vec![b'a'; i as usize * 11]);
            let meta = vec![Meta::Timestamp(Timestamp { secs: i, nanos: 0 })];
            if i % 2 == 0 {
                dump.extend(build_message_v2(Direction::Request, &meta, &message, ORDER));
            } else {
                dump.extend(build_message_v1(Direction::Request, &message));
            }
            expected.push(message);
        }

        let mut envelopes = EnvelopeReader::new(
            FrameReader::with_capacity(ChunkedReader::new(&dump, 3), ORDER, 64),
            DumpFormat::V2,
        );
        let mut got = Vec::new();
        while let Some(envelope) = envelopes.next_envelope().unwrap() {
            got.push((envelope.meta.len(), envelope.payload.to_vec()));
        }

        assert_eq!(got.len(), 10);
        for (i, (meta_len, payload)) in got.into_iter().enumerate() {
            assert_eq!(meta_len, if i % 2 == 0 { 1 } else { 0 });
            assert_eq!(payload, expected[i]);
        }
    }

    #[test]
    fn test_timestamp_rendering() {
        let ts = Timestamp { secs: 0, nanos: 5 };
        assert_eq!(ts.to_rfc3339(), "1970-01-01T00:00:00.000000005Z");

        let ts = Timestamp {
            secs: 1_588_327_200,
            nanos: 500_000_000,
        };
        assert_eq!(ts.to_rfc3339(), "2020-05-01T10:00:00.5Z");

        let ts = Timestamp {
            secs: 1_588_327_200,
            nanos: 123_450_000,
        };
        assert_eq!(ts.to_rfc3339(), "2020-05-01T10:00:00.12345Z");

        let ts = Timestamp {
            secs: 1_588_327_200,
            nanos: 0,
        };
        assert_eq!(ts.to_rfc3339(), "2020-05-01T10:00:00Z");
    }
}
