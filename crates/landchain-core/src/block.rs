//! Blocks and land records
//!
//! A [`Block`] seals a batch of [`LandRecord`]s. Its hash covers every
//! field except the hash itself, serialized as canonical JSON.

use crate::hash::{BlockHash, HashError};
use crate::merkle::RecordMerkleTree;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parcel id used for mining reward records
pub const MINING_REWARD_ID: &str = "MINING_REWARD";

/// Note carried by the genesis block
pub const GENESIS_NOTE: &str = "Genesis Block";

/// One ownership transfer of a land parcel
///
/// Field names match the JSON accepted by the `/transactions/new` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandRecord {
    /// Parcel identifier
    pub id_tanah: String,
    /// Previous owner
    pub pemilik_lama: String,
    /// New owner
    pub pemilik_baru: String,
    /// Location of the parcel
    pub lokasi: String,
    /// Hex SHA-256 of the uploaded certificate, if any
    #[serde(default)]
    pub file_hash: Option<String>,
    /// Download path of the uploaded certificate, if any
    #[serde(default)]
    pub file_url: Option<String>,
    /// When the transfer was submitted
    pub timestamp: DateTime<Utc>,
}

impl LandRecord {
    /// Create a record timestamped now
    #[must_use]
    pub fn new(
        id_tanah: impl Into<String>,
        pemilik_lama: impl Into<String>,
        pemilik_baru: impl Into<String>,
        lokasi: impl Into<String>,
    ) -> Self {
        Self {
            id_tanah: id_tanah.into(),
            pemilik_lama: pemilik_lama.into(),
            pemilik_baru: pemilik_baru.into(),
            lokasi: lokasi.into(),
            file_hash: None,
            file_url: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach an uploaded certificate
    #[must_use]
    pub fn with_file(mut self, file_hash: impl Into<String>, file_url: impl Into<String>) -> Self {
        self.file_hash = Some(file_hash.into());
        self.file_url = Some(file_url.into());
        self
    }

    /// Reward record queued by the node that mined a block
    #[must_use]
    pub fn mining_reward(node_id: &str) -> Self {
        Self::new(MINING_REWARD_ID, "SYSTEM", node_id, "Server Node")
    }

    /// Check that all required text fields are present
    ///
    /// # Errors
    /// Returns the name of the first empty field
    pub fn validate(&self) -> Result<(), RecordError> {
        let fields = [
            ("id_tanah", &self.id_tanah),
            ("pemilik_lama", &self.pemilik_lama),
            ("pemilik_baru", &self.pemilik_baru),
            ("lokasi", &self.lokasi),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(RecordError::MissingField(name));
            }
        }
        Ok(())
    }

    /// Hash used as the record's Merkle leaf
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn leaf_hash(&self) -> Result<BlockHash, HashError> {
        BlockHash::compute_serializable(self)
    }
}

/// Record validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Required field missing or blank
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Payload of a block
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockData {
    /// Free-form note, set on the genesis block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Transfers sealed in this block
    #[serde(default)]
    pub records: Vec<LandRecord>,
    /// Merkle root over `records` leaf hashes
    #[serde(default)]
    pub merkle_root: BlockHash,
}

impl BlockData {
    /// Payload of the genesis block
    #[must_use]
    pub fn genesis() -> Self {
        Self {
            note: Some(GENESIS_NOTE.to_string()),
            ..Self::default()
        }
    }

    /// Seal a list of records, computing their Merkle root
    ///
    /// # Errors
    /// Returns error if a record cannot be hashed
    pub fn from_records(records: Vec<LandRecord>) -> Result<Self, HashError> {
        let merkle_root = Self::merkle_tree(&records)?.root();
        Ok(Self {
            note: None,
            records,
            merkle_root,
        })
    }

    /// Merkle tree over the given records
    ///
    /// # Errors
    /// Returns error if a record cannot be hashed
    pub fn merkle_tree(records: &[LandRecord]) -> Result<RecordMerkleTree, HashError> {
        let leaves = records
            .iter()
            .map(LandRecord::leaf_hash)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RecordMerkleTree::from_leaves(&leaves))
    }
}

/// A sealed block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, genesis is 1
    pub index: u64,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Sealed payload
    pub data: BlockData,
    /// Hash of the preceding block (zero for genesis)
    pub previous_hash: BlockHash,
    /// Proof-of-work value
    pub proof: u64,
    /// Reserved for alternative mining loops, always 0 today
    #[serde(default)]
    pub nonce: u64,
    /// Hash over all other fields
    pub hash: BlockHash,
}

/// Hashed view of a block: every field but `hash`
#[derive(Serialize)]
struct BlockHeader<'a> {
    index: u64,
    timestamp: &'a DateTime<Utc>,
    data: &'a BlockData,
    previous_hash: &'a BlockHash,
    proof: u64,
    nonce: u64,
}

impl Block {
    /// Create a block and compute its hash
    ///
    /// # Errors
    /// Returns error if the block cannot be serialized for hashing
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        data: BlockData,
        previous_hash: BlockHash,
        proof: u64,
    ) -> Result<Self, HashError> {
        let mut block = Self {
            index,
            timestamp,
            data,
            previous_hash,
            proof,
            nonce: 0,
            hash: BlockHash::default(),
        };
        block.hash = block.compute_hash()?;
        Ok(block)
    }

    /// First block of every chain
    ///
    /// # Errors
    /// Returns error if the block cannot be serialized for hashing
    pub fn genesis() -> Result<Self, HashError> {
        Self::new(1, Utc::now(), BlockData::genesis(), BlockHash::default(), 0)
    }

    /// Recompute the hash from the current field values
    ///
    /// # Errors
    /// Returns error if the block cannot be serialized for hashing
    pub fn compute_hash(&self) -> Result<BlockHash, HashError> {
        BlockHash::compute_serializable(&BlockHeader {
            index: self.index,
            timestamp: &self.timestamp,
            data: &self.data,
            previous_hash: &self.previous_hash,
            proof: self.proof,
            nonce: self.nonce,
        })
    }

    /// Whether the stored hash matches the block's contents
    #[must_use]
    pub fn verify_hash(&self) -> bool {
        self.compute_hash().is_ok_and(|h| h == self.hash)
    }

    /// Whether the stored Merkle root matches the sealed records
    #[must_use]
    pub fn verify_merkle_root(&self) -> bool {
        BlockData::merkle_tree(&self.data.records)
            .is_ok_and(|tree| tree.root() == self.data.merkle_root)
    }
}
