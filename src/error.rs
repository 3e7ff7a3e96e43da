//! Error types for kvorm.
//!
//! All errors are strongly typed using thiserror. "Not found" is not an
//! error: lookups return `Ok(None)` for absent or logically expired
//! entities.

use thiserror::Error;

use crate::codec::CodecError;
use crate::store::StoreError;

/// Top-level error type for kvorm operations.
#[derive(Debug, Error)]
pub enum KvormError {
    /// A system name was referenced that was never registered.
    #[error("Unknown system: \"{name}\" was never registered")]
    UnknownSystem {
        /// The name that failed to resolve.
        name: String,
    },

    /// Random id reservation collided too many times in a row.
    #[error("Unable to reserve a random id for model \"{type_name}\" after {attempts} attempts")]
    IdReservationExhausted {
        /// Entity type the reservation was for.
        type_name: String,
        /// Number of consecutive collisions before giving up.
        attempts: u32,
    },

    /// Stored bytes failed to decode. Distinct from "not found" so callers
    /// can tell "never existed" from "damaged".
    #[error("Corrupt record at {key}: {reason}")]
    CorruptRecord {
        /// The store key holding the damaged bytes.
        key: String,
        /// Decoder diagnostic.
        reason: String,
    },

    /// Field encoding failed before anything was written.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Underlying store or batch failure, propagated as-is. Retry policy
    /// belongs to the store implementation, not the entity engine.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl KvormError {
    /// Returns true if this is an unknown-system error.
    #[must_use]
    pub const fn is_unknown_system(&self) -> bool {
        matches!(self, Self::UnknownSystem { .. })
    }

    /// Returns true if id reservation ran out of attempts.
    #[must_use]
    pub const fn is_id_reservation_exhausted(&self) -> bool {
        matches!(self, Self::IdReservationExhausted { .. })
    }

    /// Returns true if a stored record failed to decode.
    #[must_use]
    pub const fn is_corrupt_record(&self) -> bool {
        matches!(self, Self::CorruptRecord { .. })
    }

    /// Returns true if the underlying store reported a failure.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Result type alias for kvorm operations.
pub type KvormResult<T> = Result<T, KvormError>;
