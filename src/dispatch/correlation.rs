//! Request/response correlation.
//!
//! FUSE replies do not repeat the opcode; only the `unique` id ties a reply
//! to its request. [`PendingRequests`] remembers every outstanding request
//! until its reply shows up.
//!
//! `GETXATTR` and `LISTXATTR` change reply shape depending on the request:
//! with `size == 0` the kernel asks for the value size only and the reply is
//! a `fuse_getxattr_out`, otherwise it carries the data itself. The pending
//! entry keeps that flag so the reply can be decoded accordingly.

use std::collections::HashMap;

use crate::abi::{self, layout::GETXATTR_OUT};
use crate::codec::Decoder;
use crate::protocol::ByteOrder;

use super::registry::{DecoderTable, SIZE_QUERY_REPLY};

/// An outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub opcode: u32,
    /// Request asked for the reply size only.
    pub size_query: bool,
}

impl PendingRequest {
    /// Classify a request for the table.
    ///
    /// Returns `None` for requests that are never answered.
    pub fn classify(
        table: &DecoderTable,
        opcode: u32,
        body: &[u8],
        order: ByteOrder,
    ) -> Option<Self> {
        if !table.expects_reply(opcode) {
            return None;
        }
        let size_query = match opcode {
            abi::GETXATTR | abi::LISTXATTR => body.len() >= 4 && order.read_u32(body) == 0,
            _ => false,
        };
        Some(Self { opcode, size_query })
    }

    /// Pick the decoder for a reply body of `body_len` bytes.
    pub fn reply_decoder(&self, table: &DecoderTable, body_len: usize) -> Decoder {
        if self.size_query {
            if body_len == GETXATTR_OUT.size() {
                return Decoder::Items(SIZE_QUERY_REPLY);
            }
            tracing::debug!(
                opcode = self.opcode,
                body_len,
                "size query reply does not look like getxattr_out"
            );
        }
        table.reply(self.opcode)
    }
}

/// Outstanding requests keyed by unique id.
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: HashMap<u64, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a request. A repeated id replaces the earlier entry.
    pub fn record(&mut self, unique: u64, pending: PendingRequest) {
        if let Some(previous) = self.entries.insert(unique, pending) {
            tracing::debug!(unique, previous = previous.opcode, "unique id reused");
        }
    }

    /// Remove and return the request a reply answers.
    pub fn take(&mut self, unique: u64) -> Option<PendingRequest> {
        self.entries.remove(&unique)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unique ids still waiting for a reply, in ascending order.
    pub fn outstanding(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
