//! Error types for parsefuse.

use thiserror::Error;

/// Main error type for all dissector operations.
///
/// Every variant is fatal: a capture is expected to be well formed, so a
/// broken stream aborts decoding instead of being resynchronised.
#[derive(Debug, Error)]
pub enum ParsefuseError {
    /// I/O error while reading the dump or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (JSON renderers only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The stream ended inside a message.
    #[error("short read: stream ends inside the message starting at offset {offset}")]
    ShortRead { offset: u64 },

    /// Structural invariant violated (bad length field, header too short, etc.).
    #[error("Structural error: {0}")]
    Structural(String),

    /// Direction tag is neither `R` nor `W`.
    #[error("unknown direction {tag:?} at offset {offset}")]
    UnknownDirection { tag: char, offset: u64 },

    /// Unsupported dump format selector.
    #[error("unknown fusedump format version {0}")]
    UnknownFormat(String),

    /// Unsupported byte order selector.
    #[error("unknown bytesex {0}")]
    UnknownByteOrder(String),

    /// Unsupported output format selector.
    #[error("unknown output format {0}")]
    UnknownOutputFormat(String),
}

/// Result type alias using ParsefuseError.
pub type Result<T> = std::result::Result<T, ParsefuseError>;
