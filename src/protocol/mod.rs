//! Protocol module - byte order, framing, envelopes and FUSE headers.
//!
//! This module turns a raw dump stream into undecoded FUSE messages:
//! - Byte order aware primitive extraction
//! - Frame reader for whole messages over partial reads
//! - Dump format 1/2 envelopes with capture metadata
//! - `fuse_in_header` / `fuse_out_header` decoding

mod byte_order;
mod envelope;
mod frame_reader;
mod wire_format;

pub use byte_order::ByteOrder;
pub use envelope::{
    build_message_v1, build_message_v2, DumpFormat, Envelope, EnvelopeReader, Meta, Timestamp,
};
pub use frame_reader::{io_block_size, FrameReader, DEFAULT_CAPACITY, MIN_CAPACITY};
pub use wire_format::{
    build_request, build_response, Direction, Header, InHeader, OutHeader, IN_HEADER_SIZE,
    ITEM_COUNT_LIMIT, LENGTH_FIELD_SIZE, OUT_HEADER_SIZE, TIMESTAMP_ITEM_SIZE,
};
