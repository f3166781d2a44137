//! Landchain Core
//!
//! Ledger of land-certificate transfers sealed into proof-of-work blocks.
//!
//! # Core Concepts
//!
//! - [`LandRecord`]: one ownership transfer of a parcel
//! - [`Block`]: records sealed under a Merkle root, linked by SHA-256
//! - [`Blockchain`]: chain, pending records and registered peers
//! - [`valid_chain`]: full validation used before adopting a peer chain
//! - [`ChainStore`]: JSON snapshot persistence
//!
//! # Example
//!
//! ```rust,ignore
//! use landchain_core::{Blockchain, LandRecord};
//!
//! let mut chain = Blockchain::new(3)?;
//! chain.new_transaction(LandRecord::new("P-1", "Budi", "Sari", "Bandung"))?;
//! let block = chain.mine("node-a")?;
//! println!("forged block {} ({})", block.index, block.hash.short());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod block;
mod chain;
mod error;
mod hash;
mod merkle;
mod pow;
mod store;

// Re-exports
pub use block::{Block, BlockData, LandRecord, RecordError, GENESIS_NOTE, MINING_REWARD_ID};
pub use chain::{parse_node_address, valid_chain, Blockchain, MiningTarget, RecordEntry};
pub use error::{ChainError, StoreError};
pub use hash::{canonical_json, sha256_hex, BlockHash, HashError};
pub use merkle::{InclusionProof, RecordMerkleTree, Sha256Hasher};
pub use pow::{proof_of_work, valid_proof, DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
pub use store::{ChainStore, Snapshot, DEFAULT_FILE_NAME};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
