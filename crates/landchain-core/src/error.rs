//! Error types for the ledger
//!
//! - Chain validation failures, located by block index
//! - Rejected records and peer addresses
//! - Persistence failures

use crate::block::RecordError;
use crate::hash::HashError;

/// Main ledger error type
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Record failed validation
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] RecordError),

    /// Peer address could not be parsed
    #[error("invalid node address: {0:?}")]
    InvalidNodeAddress(String),

    /// A chain must contain at least the genesis block
    #[error("chain is empty")]
    EmptyChain,

    /// Genesis block has the wrong index or a predecessor
    #[error("invalid genesis block")]
    InvalidGenesis,

    /// Block index does not follow its predecessor
    #[error("index gap at block {index}")]
    IndexGap { index: u64 },

    /// `previous_hash` does not match the preceding block
    #[error("broken link at block {index}")]
    BrokenLink { index: u64 },

    /// Stored hash or Merkle root does not match the contents
    #[error("hash mismatch at block {index}")]
    HashMismatch { index: u64 },

    /// Proof does not satisfy the difficulty
    #[error("invalid proof of work at block {index}")]
    InvalidProof { index: u64 },

    /// Stored chain is intact but its proofs are weaker than configured
    #[error(
        "chain stored at {path} fails difficulty {difficulty} at block {index}; \
         start with the difficulty it was mined at"
    )]
    BelowDifficulty {
        path: String,
        index: u64,
        difficulty: u32,
    },

    /// Hashing failed
    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    /// Persistence failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl ChainError {
    /// Whether the error was caused by caller input rather than node state
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRecord(_) | Self::InvalidNodeAddress(_))
    }
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem error
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot could not be encoded or decoded
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
