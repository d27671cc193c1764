//! Dispatch module - choosing a decoder for each message.
//!
//! Provides:
//! - [`DecoderTable`] - maps opcodes to request and reply decoders
//! - [`PendingRequests`] - pairs replies with the requests they answer

mod correlation;
mod registry;

pub use correlation::{PendingRequest, PendingRequests};
pub use registry::{DecoderTable, SIZE_QUERY_REPLY};
