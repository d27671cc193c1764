//! Decoder table keyed by opcode.
//!
//! Built once from the compiled opcode table. Lookups never fail: opcodes
//! unknown to this build decode as [`Decoder::Raw`].
//!
//! # Example
//!
//! ```
//! use parsefuse::abi;
//! use parsefuse::dispatch::DecoderTable;
//!
//! let table = DecoderTable::new();
//! assert_eq!(table.name(abi::LOOKUP), "LOOKUP");
//! assert_eq!(table.name(999), "OP#999");
//! ```

use std::borrow::Cow;
use std::collections::HashMap;

use crate::abi::{self, Item, Notification, Opcode};
use crate::codec::Decoder;

/// Request and reply decoders for one opcode.
struct OpcodeEntry {
    op: &'static Opcode,
    request: Decoder,
    reply: Decoder,
}

/// Opcode to decoder mapping.
pub struct DecoderTable {
    opcodes: HashMap<u32, OpcodeEntry>,
    notifications: HashMap<u32, &'static Notification>,
}

impl DecoderTable {
    /// Build the table from the compiled FUSE tables.
    pub fn new() -> Self {
        let opcodes = abi::OPCODES
            .iter()
            .map(|op| {
                let entry = OpcodeEntry {
                    op,
                    request: request_decoder(op),
                    reply: reply_decoder(op),
                };
                (op.code, entry)
            })
            .collect();
        let notifications = abi::NOTIFICATIONS.iter().map(|n| (n.code, n)).collect();

        Self {
            opcodes,
            notifications,
        }
    }

    /// Display name of an opcode, `OP#<n>` when unknown.
    pub fn name(&self, opcode: u32) -> Cow<'static, str> {
        match self.opcodes.get(&opcode) {
            Some(entry) => Cow::Borrowed(entry.op.name),
            None => Cow::Owned(format!("OP#{opcode}")),
        }
    }

    /// Whether the opcode is known to this build.
    pub fn contains(&self, opcode: u32) -> bool {
        self.opcodes.contains_key(&opcode)
    }

    /// Whether requests with this opcode are ever answered.
    pub fn expects_reply(&self, opcode: u32) -> bool {
        self.opcodes
            .get(&opcode)
            .map_or(true, |entry| entry.op.reply.is_some())
    }

    /// Decoder for request bodies.
    pub fn request(&self, opcode: u32) -> Decoder {
        self.opcodes
            .get(&opcode)
            .map_or(Decoder::Raw, |entry| entry.request)
    }

    /// Decoder for reply bodies.
    pub fn reply(&self, opcode: u32) -> Decoder {
        self.opcodes
            .get(&opcode)
            .map_or(Decoder::Raw, |entry| entry.reply)
    }

    /// Name and decoder of a notification code.
    pub fn notification(&self, code: u32) -> Option<(&'static str, Decoder)> {
        self.notifications
            .get(&code)
            .map(|n| (n.name, Decoder::Items(n.body)))
    }

    /// Number of known opcodes.
    pub fn len(&self) -> usize {
        self.opcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opcodes.is_empty()
    }
}

impl Default for DecoderTable {
    fn default() -> Self {
        Self::new()
    }
}

fn request_decoder(op: &'static Opcode) -> Decoder {
    match op.code {
        abi::BATCH_FORGET => Decoder::BatchForget,
        _ => Decoder::Items(op.request),
    }
}

fn reply_decoder(op: &'static Opcode) -> Decoder {
    match op.code {
        abi::READDIR => Decoder::Readdir,
        abi::READDIRPLUS => Decoder::ReaddirPlus,
        abi::LISTXATTR => Decoder::ListXattr,
        _ => match op.reply {
            Some(items) => Decoder::Items(items),
            None => Decoder::Raw,
        },
    }
}

/// Reply shape of a size query (`GETXATTR` / `LISTXATTR` with size 0).
pub const SIZE_QUERY_REPLY: &[Item] = &[Item::Struct(&abi::layout::GETXATTR_OUT)];
