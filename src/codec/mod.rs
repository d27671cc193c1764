//! Codec module - decoding of FUSE message bodies.
//!
//! This module turns the bytes after a FUSE header into [`Value`]s:
//!
//! - [`decode_struct`] / [`decode_items`] - layout-driven structure decoding
//! - [`parse_dirents`] - packed directory records
//! - [`Decoder`] - the per-opcode body decoder, including irregular shapes
//!
//! # Example
//!
//! ```
//! use parsefuse::abi::{Item, layout::GETXATTR_IN};
//! use parsefuse::codec::{decode_items, Value};
//! use parsefuse::protocol::ByteOrder;
//!
//! let body = [0u8, 0x10, 0, 0, 0, 0, 0, 0, b'u', b'.', b'a', 0];
//! let values = decode_items(
//!     &[Item::Struct(&GETXATTR_IN), Item::Name],
//!     &body,
//!     ByteOrder::Little,
//! );
//! assert_eq!(values[0].as_struct().unwrap().unsigned("Size"), Some(4096));
//! assert_eq!(values[1].to_string(), "u.a");
//! ```

mod dirent;
mod layout;
mod payload;
mod value;

pub use dirent::{parse_dirents, record_size, DirEntry};
pub use layout::{decode_items, decode_struct};
pub use payload::{decode_batch_forget, decode_dirents, decode_listxattr, raw, Decoder};
pub use value::{escape_bytes, Field, Limited, Struct, Value};
