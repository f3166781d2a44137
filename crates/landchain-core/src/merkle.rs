//! Merkle tree over the records of a block
//!
//! [`RecordMerkleTree`] wraps `rs_merkle` with [`BlockHash`] leaves so a
//! single transfer can be proven to belong to a block without shipping
//! the whole record list.

use crate::hash::BlockHash;
use rs_merkle::{Hasher, MerkleProof, MerkleTree};
use serde::{Deserialize, Serialize};

/// SHA-256 hasher adapter for `rs_merkle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    type Hash = [u8; 32];

    #[inline]
    fn hash(data: &[u8]) -> Self::Hash {
        *BlockHash::compute(data).as_bytes()
    }
}

/// Merkle tree built from record hashes
pub struct RecordMerkleTree {
    inner: MerkleTree<Sha256Hasher>,
    leaf_count: usize,
}

impl std::fmt::Debug for RecordMerkleTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordMerkleTree")
            .field("leaf_count", &self.leaf_count)
            .field("root", &self.root())
            .finish()
    }
}

impl RecordMerkleTree {
    /// Build from leaf hashes
    #[must_use]
    pub fn from_leaves(leaves: &[BlockHash]) -> Self {
        let leaves: Vec<_> = leaves.iter().map(|h| *h.as_bytes()).collect();
        Self {
            inner: MerkleTree::from_leaves(&leaves),
            leaf_count: leaves.len(),
        }
    }

    /// Root hash of the tree
    ///
    /// Returns zero hash for empty tree.
    #[must_use]
    pub fn root(&self) -> BlockHash {
        self.inner.root().map_or_else(BlockHash::default, BlockHash::new)
    }

    /// Number of leaves
    #[inline]
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Inclusion proof for the leaf at `leaf_index`
    ///
    /// Returns `None` when the index is out of range.
    #[must_use]
    pub fn proof(&self, leaf_index: usize) -> Option<InclusionProof> {
        if leaf_index >= self.leaf_count {
            return None;
        }
        let proof = self.inner.proof(&[leaf_index]);
        Some(InclusionProof {
            leaf_index,
            total_leaves: self.leaf_count,
            hashes: proof
                .proof_hashes()
                .iter()
                .map(|h| BlockHash::new(*h))
                .collect(),
        })
    }
}

/// Serializable Merkle inclusion proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Position of the leaf in the block's record list
    pub leaf_index: usize,
    /// Number of records in the block
    pub total_leaves: usize,
    /// Sibling hashes, bottom-up
    pub hashes: Vec<BlockHash>,
}

impl InclusionProof {
    /// Verify that `leaf` sits at `leaf_index` under `root`
    #[must_use]
    pub fn verify(&self, leaf: BlockHash, root: BlockHash) -> bool {
        if self.leaf_index >= self.total_leaves {
            return false;
        }
        let hashes: Vec<[u8; 32]> = self.hashes.iter().map(|h| *h.as_bytes()).collect();
        MerkleProof::<Sha256Hasher>::new(hashes).verify(
            *root.as_bytes(),
            &[self.leaf_index],
            &[*leaf.as_bytes()],
            self.total_leaves,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_hashes(n: usize) -> Vec<BlockHash> {
        (0..n)
            .map(|i| BlockHash::compute(i.to_string().as_bytes()))
            .collect()
    }

    #[test]
    fn empty_tree_has_zero_root() {
        let tree = RecordMerkleTree::from_leaves(&[]);
        assert_eq!(tree.leaf_count(), 0);
        assert!(tree.root().is_zero());
        assert!(tree.proof(0).is_none());
    }

    #[test]
    fn root_is_deterministic_and_order_sensitive() {
        let leaves = make_hashes(5);
        let a = RecordMerkleTree::from_leaves(&leaves);
        let b = RecordMerkleTree::from_leaves(&leaves);
        assert_eq!(a.root(), b.root());

        let mut reversed = leaves.clone();
        reversed.reverse();
        assert_ne!(a.root(), RecordMerkleTree::from_leaves(&reversed).root());
    }

    #[test]
    fn proof_verifies_for_every_leaf() {
        let leaves = make_hashes(7);
        let tree = RecordMerkleTree::from_leaves(&leaves);
        for (i, leaf) in leaves.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert!(proof.verify(*leaf, tree.root()), "leaf {i}");
        }
    }

    #[test]
    fn proof_fails_for_wrong_leaf_or_root() {
        let leaves = make_hashes(8);
        let tree = RecordMerkleTree::from_leaves(&leaves);
        let proof = tree.proof(3).unwrap();

        assert!(!proof.verify(leaves[4], tree.root()));
        assert!(!proof.verify(leaves[3], BlockHash::compute(b"other")));
    }

    #[test]
    fn proof_survives_json() {
        let leaves = make_hashes(4);
        let tree = RecordMerkleTree::from_leaves(&leaves);
        let proof = tree.proof(2).unwrap();
        let json = serde_json::to_string(&proof).unwrap();
        let decoded: InclusionProof = serde_json::from_str(&json).unwrap();
        assert!(decoded.verify(leaves[2], tree.root()));
    }
}
