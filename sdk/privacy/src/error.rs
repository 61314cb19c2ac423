//! Error taxonomy for the shielded pool primitives.
//!
//! Every validation error is raised at the point of detection; nothing is
//! silently clamped. All variants are cheap to clone so callers can retry
//! recoverable operations (e.g. trying another reading key on decryption).

use thiserror::Error;

/// Errors produced by field, key, cipher and tree operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrivacyError {
    /// A value falls outside the outer field or the curve subgroup
    #[error("Value out of range: {0}")]
    FieldRange(String),

    /// Wrong-length or otherwise unparseable input (ciphertext, hex, point)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Signature has the wrong length or reduces to a zero key
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// The padding sentinel did not survive decryption
    #[error("Decryption integrity check failed: recovered value has non-zero padding bits")]
    DecryptionIntegrity,

    /// The commitment tree holds its maximum number of triads
    #[error("Tree capacity exceeded: {capacity} triads already inserted")]
    CapacityExceeded { capacity: u64 },

    /// Sender-side and recipient-side stealth derivations disagree
    #[error("Stealth child key does not match its root keypair and blinding")]
    ChildKeyMismatch,

    /// Requested leaf has not been inserted
    #[error("Leaf index {index} out of range (tree holds {len} leaves)")]
    LeafIndexOutOfRange { index: u64, len: u64 },

    /// The arithmetic hash rejected its inputs
    #[error("Hash error: {0}")]
    Hash(String),

    /// A persisted tree could not be decoded or failed validation
    #[error("Invalid tree snapshot: {0}")]
    InvalidSnapshot(String),

    /// Filesystem failure while persisting or loading a tree
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PrivacyError {
    fn from(err: std::io::Error) -> Self {
        PrivacyError::Io(err.to_string())
    }
}

/// Result type for privacy operations
pub type Result<T> = std::result::Result<T, PrivacyError>;
