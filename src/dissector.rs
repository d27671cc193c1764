//! Dissector builder and decoding loop.
//!
//! The [`Dissector`] owns everything one pass over a dump needs: the
//! envelope reader (and through it the frame buffer), the decoder table and
//! the table of outstanding requests. Each call to
//! [`next_record`](Dissector::next_record):
//! 1. Reads the next envelope
//! 2. Decodes the FUSE header for its direction
//! 3. Requests: decodes the body and remembers the request by unique id
//! 4. Replies: looks up the request to pick the body decoder
//!
//! # Example
//!
//! ```
//! use parsefuse::protocol::{build_message_v1, build_request, ByteOrder, Direction, DumpFormat, InHeader};
//! use parsefuse::{abi, Dissector};
//!
//! let request = build_request(&InHeader::new(abi::GETATTR, 1, 1, 0), &[], ByteOrder::Little);
//! let dump = build_message_v1(Direction::Request, &request);
//!
//! let mut dissector = Dissector::builder()
//!     .byte_order(ByteOrder::Little)
//!     .dump_format(DumpFormat::V1)
//!     .build(dump.as_slice());
//!
//! let record = dissector.next_record()?.unwrap();
//! assert_eq!(record.opname.as_deref(), Some("GETATTR"));
//! assert!(dissector.next_record()?.is_none());
//! # Ok::<(), parsefuse::ParsefuseError>(())
//! ```

use std::borrow::Cow;
use std::io::Read;

use bytes::Bytes;

use crate::codec::Value;
use crate::dispatch::{DecoderTable, PendingRequest, PendingRequests};
use crate::error::{ParsefuseError, Result};
use crate::protocol::{
    ByteOrder, Direction, DumpFormat, EnvelopeReader, FrameReader, Header, InHeader, Meta,
    OutHeader, DEFAULT_CAPACITY, IN_HEADER_SIZE, OUT_HEADER_SIZE,
};

/// Settings for one pass over a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DissectorConfig {
    /// Byte order of framing fields and FUSE structures.
    pub byte_order: ByteOrder,
    pub dump_format: DumpFormat,
    /// Initial frame buffer size.
    pub buffer_capacity: usize,
}

impl Default for DissectorConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Native,
            dump_format: DumpFormat::V2,
            buffer_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Builder for a [`Dissector`].
#[derive(Debug, Clone, Default)]
pub struct DissectorBuilder {
    config: DissectorConfig,
}

impl DissectorBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the byte order.
    ///
    /// Default: native
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.config.byte_order = order;
        self
    }

    /// Set the dump format.
    ///
    /// Default: format 2
    pub fn dump_format(mut self, format: DumpFormat) -> Self {
        self.config.dump_format = format;
        self
    }

    /// Set the initial buffer capacity.
    ///
    /// Default: 64 KiB. Pass [`io_block_size`](crate::protocol::io_block_size)
    /// for file sources.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Build a dissector over `source`.
    pub fn build<R: Read>(self, source: R) -> Dissector<R> {
        Dissector::new(source, self.config)
    }
}

/// One decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Stream offset of the message's direction tag.
    pub offset: u64,
    pub direction: Direction,
    pub meta: Vec<Meta>,
    /// Request opcode; for replies, the opcode of the answered request.
    pub opcode: Option<u32>,
    /// Operation name shown with the record: set for requests and
    /// notifications.
    pub opname: Option<Cow<'static, str>>,
    pub header: Header,
    pub body: Vec<Value>,
}

impl Record {
    #[inline]
    pub fn unique(&self) -> u64 {
        self.header.unique()
    }

    /// A reply that matched no outstanding request.
    pub fn is_orphan(&self) -> bool {
        self.direction == Direction::Response && self.opcode.is_none() && self.opname.is_none()
    }
}

/// Decoder for a whole dump.
pub struct Dissector<R> {
    envelopes: EnvelopeReader<R>,
    order: ByteOrder,
    decoders: DecoderTable,
    pending: PendingRequests,
    failed: bool,
}

impl Dissector<std::io::Empty> {
    /// Create a dissector builder.
    pub fn builder() -> DissectorBuilder {
        DissectorBuilder::new()
    }
}

impl<R: Read> Dissector<R> {
    /// Create a dissector with explicit settings.
    pub fn new(source: R, config: DissectorConfig) -> Self {
        let frames = FrameReader::with_capacity(source, config.byte_order, config.buffer_capacity);
        Self {
            envelopes: EnvelopeReader::new(frames, config.dump_format),
            order: config.byte_order,
            decoders: DecoderTable::new(),
            pending: PendingRequests::new(),
            failed: false,
        }
    }

    /// Decode the next message.
    ///
    /// Returns `Ok(None)` at the clean end of the dump.
    ///
    /// # Errors
    ///
    /// Short reads, structural faults and unknown direction tags are fatal;
    /// the dissector should not be polled again after an error.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let Some(envelope) = self.envelopes.next_envelope()? else {
            return Ok(None);
        };
        let offset = envelope.offset;
        let payload = envelope.payload;
        let meta = envelope.meta;

        let record = match envelope.direction {
            Direction::Request => {
                decode_request(&self.decoders, &mut self.pending, self.order, offset, payload)?
            }
            Direction::Response => {
                decode_reply(&self.decoders, &mut self.pending, self.order, offset, payload)?
            }
        };
        Ok(Some(Record { meta, ..record }))
    }

    /// Requests still waiting for a reply.
    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn dump_format(&self) -> DumpFormat {
        self.envelopes.format()
    }

    /// Bytes consumed from the source so far.
    pub fn position(&self) -> u64 {
        self.envelopes.frames().position()
    }
}

impl<R: Read> Iterator for Dissector<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self.next_record().transpose();
        if matches!(next, Some(Err(_))) {
            self.failed = true;
        }
        next
    }
}

fn decode_request(
    decoders: &DecoderTable,
    pending: &mut PendingRequests,
    order: ByteOrder,
    offset: u64,
    payload: &[u8],
) -> Result<Record> {
    let header = InHeader::decode(payload, order).ok_or_else(|| {
        ParsefuseError::Structural(format!(
            "request at offset {offset} is {} bytes, shorter than fuse_in_header",
            payload.len()
        ))
    })?;
    let body = &payload[IN_HEADER_SIZE..];
    let values = decoders.request(header.opcode).decode(body, order)?;

    if let Some(request) = PendingRequest::classify(decoders, header.opcode, body, order) {
        pending.record(header.unique, request);
    }

    Ok(Record {
        offset,
        direction: Direction::Request,
        meta: Vec::new(),
        opcode: Some(header.opcode),
        opname: Some(decoders.name(header.opcode)),
        header: Header::In(header),
        body: values,
    })
}

fn decode_reply(
    decoders: &DecoderTable,
    pending: &mut PendingRequests,
    order: ByteOrder,
    offset: u64,
    payload: &[u8],
) -> Result<Record> {
    let header = OutHeader::decode(payload, order).ok_or_else(|| {
        ParsefuseError::Structural(format!(
            "reply at offset {offset} is {} bytes, shorter than fuse_out_header",
            payload.len()
        ))
    })?;
    let body = &payload[OUT_HEADER_SIZE..];
    let mut record = Record {
        offset,
        direction: Direction::Response,
        meta: Vec::new(),
        opcode: None,
        opname: None,
        header: Header::Out(header),
        body: Vec::new(),
    };

    // Notifications travel with unique 0 and the notify code in `error`.
    if header.unique == 0 && header.error > 0 {
        if let Some((name, decoder)) = decoders.notification(header.error as u32) {
            record.opname = Some(Cow::Borrowed(name));
            record.body = decoder.decode(body, order)?;
            return Ok(record);
        }
    }

    match pending.take(header.unique) {
        Some(request) => {
            let decoder = request.reply_decoder(decoders, body.len());
            record.opcode = Some(request.opcode);
            record.body = decoder.decode(body, order)?;
        }
        None => {
            tracing::debug!(offset, unique = header.unique, "reply without a request");
            record.body = vec![Value::Bytes(Bytes::copy_from_slice(body))];
        }
    }
    Ok(record)
}

/// Decode an entire dump into memory.
pub fn dissect_all<R: Read>(source: R, config: DissectorConfig) -> Result<Vec<Record>> {
    Dissector::new(source, config).collect()
}
