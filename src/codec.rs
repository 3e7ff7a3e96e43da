//! Serialization codec boundary.
//!
//! The engine treats field serialization as an opaque byte encoder/decoder
//! pair. The shipped implementation is JSON; anything that round-trips a
//! [`Fields`] mapping satisfies the contract.

use thiserror::Error;

use crate::value::Fields;

/// Errors raised by a codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The field mapping could not be encoded.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The stored bytes could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Encodes and decodes an entity's field mapping.
///
/// Implementations must round-trip every [`crate::Value`] variant, including
/// nested maps.
pub trait Codec: Send + Sync {
    /// Serialize a field mapping to bytes.
    fn encode(&self, fields: &Fields) -> Result<Vec<u8>, CodecError>;

    /// Deserialize bytes back into a field mapping.
    fn decode(&self, bytes: &[u8]) -> Result<Fields, CodecError>;
}

/// JSON codec backed by serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, fields: &Fields) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(fields).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Fields, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
