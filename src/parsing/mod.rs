//! Feed message parsing
//!
//! Decodes raw text payloads into typed `FeedEvent`s.
//! Pure: no side effects, never panics, every failure is a `ParseError`.

pub mod envelope;

pub use envelope::{parse_message, BulkPrices, EventKind, FeedEvent, WirePrice};

use thiserror::Error;

/// Why a payload was rejected
///
/// `InvalidJson`, `NotAnObject`, `MissingType` and `UnknownType` cover
/// payloads that cannot be classified; `Shape` covers a recognised `type`
/// whose required fields are missing or malformed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing \"type\" discriminator")]
    MissingType,

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("malformed {kind} message: {reason}")]
    Shape { kind: EventKind, reason: String },
}

impl ParseError {
    /// True when the `type` was recognised but the body was malformed
    #[inline]
    pub fn is_shape(&self) -> bool {
        matches!(self, ParseError::Shape { .. })
    }
}
