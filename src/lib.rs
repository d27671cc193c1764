//! # parsefuse
//!
//! Offline dissector for recorded FUSE traffic.
//!
//! A FUSE dump is the byte stream exchanged over `/dev/fuse`, captured with a
//! direction tag in front of every message. This crate reconstructs each
//! message: its opcode, header and opcode-specific body.
//!
//! ## Architecture
//!
//! - **Framing** ([`protocol`]): whole messages out of an arbitrarily chunked
//!   stream, dump formats 1 and 2, byte order, FUSE headers
//! - **Tables** ([`abi`]): opcode names and structure layouts for one
//!   protocol version
//! - **Decoding** ([`codec`], [`dispatch`]): body decoders and the
//!   request/reply correlation that selects them
//! - **Output** ([`render`]): text, NDJSON and request/reply pairs
//!
//! ## Example
//!
//! ```
//! use parsefuse::protocol::{build_message_v2, build_request, ByteOrder, Direction, InHeader};
//! use parsefuse::{abi, Dissector};
//!
//! let lookup = build_request(&InHeader::new(abi::LOOKUP, 1, 1, 4), b"foo\0", ByteOrder::Little);
//! let dump = build_message_v2(Direction::Request, &[], &lookup, ByteOrder::Little);
//!
//! let dissector = Dissector::builder()
//!     .byte_order(ByteOrder::Little)
//!     .build(dump.as_slice());
//! for record in dissector {
//!     let record = record?;
//!     assert_eq!(record.opname.as_deref(), Some("LOOKUP"));
//!     assert_eq!(record.body[0].to_string(), "foo");
//! }
//! # Ok::<(), parsefuse::ParsefuseError>(())
//! ```

pub mod abi;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod render;

mod dissector;

pub use dissector::{dissect_all, Dissector, DissectorBuilder, DissectorConfig, Record};
pub use error::{ParsefuseError, Result};
