//! The ledger
//!
//! [`Blockchain`] owns the blocks, the pending records and the peer set.
//! When opened over a [`ChainStore`] every mutation is saved first and
//! only applied in memory once the save succeeded.

use crate::block::{Block, BlockData, LandRecord};
use crate::error::ChainError;
use crate::hash::BlockHash;
use crate::merkle::InclusionProof;
use crate::pow::{proof_of_work, valid_proof};
use crate::store::{ChainStore, Snapshot};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tip of the chain a miner works against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningTarget {
    /// Proof of the last block
    pub last_proof: u64,
    /// Hash of the last block
    pub tip: BlockHash,
    /// Difficulty in force
    pub difficulty: u32,
}

impl MiningTarget {
    /// Search for a proof (CPU bound)
    #[must_use]
    pub fn solve(&self) -> u64 {
        proof_of_work(self.last_proof, self.difficulty)
    }
}

/// A parcel transfer located in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Index of the block holding the record
    pub block_index: u64,
    /// Hash of that block
    pub block_hash: BlockHash,
    /// Merkle root of that block's records
    pub merkle_root: BlockHash,
    /// The transfer
    pub record: LandRecord,
    /// Inclusion proof of the record under `merkle_root`
    pub proof: InclusionProof,
}

/// Land-certificate ledger
#[derive(Debug)]
pub struct Blockchain {
    chain: Vec<Block>,
    pending: Vec<LandRecord>,
    nodes: BTreeSet<String>,
    difficulty: u32,
    store: Option<ChainStore>,
}

impl Blockchain {
    /// In-memory ledger holding only a genesis block
    ///
    /// # Errors
    /// Returns error if the genesis block cannot be hashed
    pub fn new(difficulty: u32) -> Result<Self, ChainError> {
        Ok(Self {
            chain: vec![Block::genesis()?],
            pending: Vec::new(),
            nodes: BTreeSet::new(),
            difficulty,
            store: None,
        })
    }

    /// Open a persistent ledger
    ///
    /// Loads the stored snapshot when it exists and validates against
    /// `difficulty`. A corrupt or tampered snapshot is moved aside (see
    /// [`ChainStore::quarantine`]) and a fresh genesis chain is written.
    ///
    /// # Errors
    /// Returns [`ChainError::BelowDifficulty`] if the stored chain is
    /// intact but was mined at a lower difficulty, leaving the file alone.
    /// Returns error if the fresh chain cannot be persisted.
    pub fn open(store: ChainStore, difficulty: u32) -> Result<Self, ChainError> {
        let loaded = match store.load() {
            Ok(Some(snapshot)) => match valid_chain(&snapshot.chain, difficulty) {
                Ok(()) => Some(snapshot),
                Err(ChainError::InvalidProof { index }) if valid_chain(&snapshot.chain, 0).is_ok() => {
                    return Err(ChainError::BelowDifficulty {
                        path: store.path().display().to_string(),
                        index,
                        difficulty,
                    });
                }
                Err(e) => {
                    tracing::warn!(path = %store.path().display(), error = %e, "stored chain is invalid, starting fresh");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(path = %store.path().display(), error = %e, "stored chain is unreadable, starting fresh");
                None
            }
        };

        match loaded {
            Some(snapshot) => {
                tracing::info!(
                    path = %store.path().display(),
                    blocks = snapshot.chain.len(),
                    pending = snapshot.pending.len(),
                    "chain loaded"
                );
                Ok(Self {
                    chain: snapshot.chain,
                    pending: snapshot.pending,
                    nodes: snapshot.nodes,
                    difficulty,
                    store: Some(store),
                })
            }
            None => {
                if let Some(moved) = store.quarantine()? {
                    tracing::warn!(moved_to = %moved.display(), "previous chain file kept aside");
                }
                let mut fresh = Self::new(difficulty)?;
                store.save(&fresh.snapshot())?;
                fresh.store = Some(store);
                Ok(fresh)
            }
        }
    }

    /// Last block of the chain
    #[inline]
    #[must_use]
    pub fn last_block(&self) -> &Block {
        // the chain always holds at least the genesis block
        &self.chain[self.chain.len() - 1]
    }

    /// All blocks, genesis first
    #[inline]
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    /// Number of blocks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false: a ledger holds at least its genesis block
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Records waiting for the next block
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &[LandRecord] {
        &self.pending
    }

    /// Registered peers
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &BTreeSet<String> {
        &self.nodes
    }

    /// Difficulty in force
    #[inline]
    #[must_use]
    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Queue a record for the next block
    ///
    /// Returns the index of the block that will hold it.
    ///
    /// # Errors
    /// Returns error if the record is incomplete or cannot be persisted
    pub fn new_transaction(&mut self, record: LandRecord) -> Result<u64, ChainError> {
        record.validate()?;
        let id_tanah = record.id_tanah.clone();
        let mut next = self.snapshot();
        next.pending.push(record);
        self.commit(next)?;
        tracing::debug!(%id_tanah, "record queued");
        Ok(self.last_block().index + 1)
    }

    /// Seal all pending records into a new block
    ///
    /// The proof is taken as given; use [`Blockchain::mine`] or
    /// [`Blockchain::commit_mined`] to have it checked.
    ///
    /// # Errors
    /// Returns error if the block cannot be hashed or persisted
    pub fn new_block(&mut self, proof: u64) -> Result<Block, ChainError> {
        self.forge(proof, None)
    }

    fn forge(&mut self, proof: u64, reward: Option<LandRecord>) -> Result<Block, ChainError> {
        let last = self.last_block();
        let (index, previous_hash) = (last.index + 1, last.hash);
        let mut records = self.pending.clone();
        records.extend(reward);
        let data = BlockData::from_records(records)?;
        let block = Block::new(index, Utc::now(), data, previous_hash, proof)?;

        let mut next = self.snapshot();
        next.pending.clear();
        next.chain.push(block.clone());
        self.commit(next)?;
        tracing::info!(
            index = block.index,
            hash = %block.hash.short(),
            records = block.data.records.len(),
            "block forged"
        );
        Ok(block)
    }

    /// Current mining target
    #[must_use]
    pub fn mining_target(&self) -> MiningTarget {
        let last = self.last_block();
        MiningTarget {
            last_proof: last.proof,
            tip: last.hash,
            difficulty: self.difficulty,
        }
    }

    /// Commit a proof found against `target`
    ///
    /// Returns `Ok(None)` when the chain moved on since the target was
    /// taken or the proof does not satisfy it; the caller should mine again.
    ///
    /// # Errors
    /// Returns error if the block cannot be hashed or persisted
    pub fn commit_mined(
        &mut self,
        target: &MiningTarget,
        proof: u64,
        node_id: &str,
    ) -> Result<Option<Block>, ChainError> {
        if self.mining_target() != *target {
            tracing::debug!(stale = %target.tip.short(), "chain moved while mining");
            return Ok(None);
        }
        if !valid_proof(target.last_proof, proof, target.difficulty) {
            return Ok(None);
        }
        self.forge(proof, Some(LandRecord::mining_reward(node_id)))
            .map(Some)
    }

    /// Mine a block synchronously: proof-of-work, reward record, forge
    ///
    /// # Errors
    /// Returns error if the block cannot be hashed or persisted
    pub fn mine(&mut self, node_id: &str) -> Result<Block, ChainError> {
        loop {
            let target = self.mining_target();
            let proof = target.solve();
            if let Some(block) = self.commit_mined(&target, proof, node_id)? {
                return Ok(block);
            }
        }
    }

    /// Register a peer
    ///
    /// Accepts `http://host:port/...`, `host:port` or a bare host and
    /// stores the `host[:port]` part. Returns whether the peer is new.
    ///
    /// # Errors
    /// Returns error if the address is empty or malformed, or cannot be
    /// persisted
    pub fn register_node(&mut self, address: &str) -> Result<bool, ChainError> {
        Ok(self.register_nodes([address])? == 1)
    }

    /// Register several peers at once
    ///
    /// Every address is parsed before any is stored, so one bad entry
    /// leaves the peer set untouched. Returns how many peers are new.
    ///
    /// # Errors
    /// Returns the first malformed address, or error if the peer set
    /// cannot be persisted
    pub fn register_nodes<I, S>(&mut self, addresses: I) -> Result<usize, ChainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = addresses
            .into_iter()
            .map(|a| parse_node_address(a.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut next = self.snapshot();
        let before = next.nodes.len();
        next.nodes.extend(parsed);
        let added = next.nodes.len() - before;
        if added > 0 {
            self.commit(next)?;
        }
        Ok(added)
    }

    /// Adopt `candidate` if it is strictly longer than the local chain
    /// and valid
    ///
    /// Pending records already sealed in the adopted chain are dropped.
    ///
    /// # Errors
    /// Returns error if the candidate is longer but invalid, or the new
    /// chain cannot be persisted
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<bool, ChainError> {
        if candidate.len() <= self.chain.len() {
            return Ok(false);
        }
        valid_chain(&candidate, self.difficulty)?;

        let sealed: Vec<&LandRecord> = candidate
            .iter()
            .flat_map(|b| b.data.records.iter())
            .collect();
        let pending = self
            .pending
            .iter()
            .filter(|r| !sealed.contains(r))
            .cloned()
            .collect();

        let (old_len, new_len) = (self.chain.len(), candidate.len());
        self.commit(Snapshot {
            chain: candidate,
            pending,
            nodes: self.nodes.clone(),
        })?;
        tracing::info!(old_len, new_len, "chain replaced by longer valid chain");
        Ok(true)
    }

    /// Ownership history of a parcel, oldest transfer first
    ///
    /// # Errors
    /// Returns error if a block's records cannot be hashed
    pub fn history(&self, id_tanah: &str) -> Result<Vec<RecordEntry>, ChainError> {
        let mut entries = Vec::new();
        for block in &self.chain {
            if !block.data.records.iter().any(|r| r.id_tanah == id_tanah) {
                continue;
            }
            let tree = BlockData::merkle_tree(&block.data.records)?;
            for (i, record) in block.data.records.iter().enumerate() {
                if record.id_tanah != id_tanah {
                    continue;
                }
                if let Some(proof) = tree.proof(i) {
                    entries.push(RecordEntry {
                        block_index: block.index,
                        block_hash: block.hash,
                        merkle_root: block.data.merkle_root,
                        record: record.clone(),
                        proof,
                    });
                }
            }
        }
        Ok(entries)
    }

    /// Current state as a persistable snapshot
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            chain: self.chain.clone(),
            pending: self.pending.clone(),
            nodes: self.nodes.clone(),
        }
    }

    /// Persist `next` and only then make it current
    fn commit(&mut self, next: Snapshot) -> Result<(), ChainError> {
        if let Some(store) = &self.store {
            store.save(&next)?;
        }
        let Snapshot { chain, pending, nodes } = next;
        self.chain = chain;
        self.pending = pending;
        self.nodes = nodes;
        Ok(())
    }
}

/// Validate a full chain
///
/// # Errors
/// Returns the first violation found, located by block index
pub fn valid_chain(blocks: &[Block], difficulty: u32) -> Result<(), ChainError> {
    let genesis = blocks.first().ok_or(ChainError::EmptyChain)?;
    if genesis.index != 1 || !genesis.previous_hash.is_zero() {
        return Err(ChainError::InvalidGenesis);
    }
    if !genesis.verify_hash() || !genesis.verify_merkle_root() {
        return Err(ChainError::HashMismatch { index: genesis.index });
    }

    for pair in blocks.windows(2) {
        let (prev, block) = (&pair[0], &pair[1]);
        if block.index != prev.index + 1 {
            return Err(ChainError::IndexGap { index: block.index });
        }
        if block.previous_hash != prev.hash {
            return Err(ChainError::BrokenLink { index: block.index });
        }
        if !block.verify_hash() || !block.verify_merkle_root() {
            return Err(ChainError::HashMismatch { index: block.index });
        }
        if !valid_proof(prev.proof, block.proof, difficulty) {
            return Err(ChainError::InvalidProof { index: block.index });
        }
    }
    Ok(())
}

/// Reduce a peer address to its `host[:port]` authority
///
/// # Errors
/// Returns error if no usable authority can be extracted
pub fn parse_node_address(address: &str) -> Result<String, ChainError> {
    let invalid = || ChainError::InvalidNodeAddress(address.to_string());
    let trimmed = address.trim();
    let rest = match trimmed.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() => rest,
        Some(_) => return Err(invalid()),
        None => trimmed,
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit('@').next().unwrap_or_default();

    if authority.is_empty() || authority.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    if let Some((host, port)) = authority.rsplit_once(':') {
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(invalid());
        }
    }
    Ok(authority.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DIFFICULTY: u32 = 1;

    fn record(id: &str, to: &str) -> LandRecord {
        LandRecord::new(id, "Budi", to, "Bandung")
    }

    #[test]
    fn new_chain_has_genesis_only() {
        let chain = Blockchain::new(DIFFICULTY).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.last_block().index, 1);
        assert!(chain.pending().is_empty());
        assert!(valid_chain(chain.blocks(), DIFFICULTY).is_ok());
    }

    #[test]
    fn new_transaction_returns_next_block_index() {
        let mut chain = Blockchain::new(DIFFICULTY).unwrap();
        assert_eq!(chain.new_transaction(record("P-1", "Sari")).unwrap(), 2);
        assert_eq!(chain.pending().len(), 1);
    }

    #[test]
    fn new_transaction_rejects_incomplete_record() {
        let mut chain = Blockchain::new(DIFFICULTY).unwrap();
        let err = chain.new_transaction(record("P-1", "")).unwrap_err();
        assert!(err.is_client_error());
        assert!(chain.pending().is_empty());
    }

    #[test]
    fn mine_seals_pending_and_reward() {
        let mut chain = Blockchain::new(DIFFICULTY).unwrap();
        chain.new_transaction(record("P-1", "Sari")).unwrap();
        let block = chain.mine("node-a").unwrap();

        assert_eq!(block.index, 2);
        assert_eq!(block.previous_hash, chain.blocks()[0].hash);
        assert_eq!(block.data.records.len(), 2);
        assert_eq!(block.data.records[1].pemilik_baru, "node-a");
        assert!(chain.pending().is_empty());
        assert!(valid_chain(chain.blocks(), DIFFICULTY).is_ok());
    }

    #[test]
    fn commit_mined_rejects_stale_target() {
        let mut chain = Blockchain::new(DIFFICULTY).unwrap();
        let target = chain.mining_target();
        let proof = target.solve();
        chain.mine("other").unwrap();

        assert!(chain.commit_mined(&target, proof, "me").unwrap().is_none());
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn commit_mined_rejects_bad_proof() {
        let mut chain = Blockchain::new(4).unwrap();
        let target = chain.mining_target();
        let bad = (0..).find(|p| !valid_proof(target.last_proof, *p, 4)).unwrap();
        assert!(chain.commit_mined(&target, bad, "me").unwrap().is_none());
        assert!(chain.pending().is_empty());
    }

    #[test]
    fn valid_chain_detects_tampering() {
        let mut chain = Blockchain::new(DIFFICULTY).unwrap();
        chain.new_transaction(record("P-1", "Sari")).unwrap();
        chain.mine("n").unwrap();
        chain.mine("n").unwrap();
        let blocks = chain.blocks().to_vec();

        let mut tampered = blocks.clone();
        tampered[1].data.records[0].pemilik_baru = "Mallory".into();
        assert!(matches!(
            valid_chain(&tampered, DIFFICULTY),
            Err(ChainError::HashMismatch { index: 2 })
        ));

        let mut relinked = blocks.clone();
        relinked[2].previous_hash = BlockHash::compute(b"elsewhere");
        relinked[2].hash = relinked[2].compute_hash().unwrap();
        assert!(matches!(
            valid_chain(&relinked, DIFFICULTY),
            Err(ChainError::BrokenLink { index: 3 })
        ));

        let mut gap = blocks.clone();
        gap.remove(1);
        assert!(matches!(
            valid_chain(&gap, DIFFICULTY),
            Err(ChainError::IndexGap { index: 3 })
        ));

        assert!(matches!(valid_chain(&[], DIFFICULTY), Err(ChainError::EmptyChain)));
    }

    #[test]
    fn valid_chain_detects_forged_merkle_root() {
        let mut chain = Blockchain::new(DIFFICULTY).unwrap();
        chain.new_transaction(record("P-1", "Sari")).unwrap();
        chain.mine("n").unwrap();
        let mut blocks = chain.blocks().to_vec();
        blocks[1].data.merkle_root = BlockHash::compute(b"forged");
        blocks[1].hash = blocks[1].compute_hash().unwrap();
        assert!(matches!(
            valid_chain(&blocks, DIFFICULTY),
            Err(ChainError::HashMismatch { index: 2 })
        ));
    }

    #[test]
    fn valid_chain_detects_bad_proof() {
        let mut chain = Blockchain::new(4).unwrap();
        let bad = (0..).find(|p| !valid_proof(0, *p, 4)).unwrap();
        chain.new_block(bad).unwrap();
        assert!(matches!(
            valid_chain(chain.blocks(), 4),
            Err(ChainError::InvalidProof { index: 2 })
        ));
    }

    #[test]
    fn replace_chain_only_adopts_longer_valid_chains() {
        let mut local = Blockchain::new(DIFFICULTY).unwrap();
        let mut remote = Blockchain::new(DIFFICULTY).unwrap();
        remote.mine("r").unwrap();
        remote.mine("r").unwrap();

        assert!(!remote.replace_chain(local.blocks().to_vec()).unwrap());

        let mut forged = remote.blocks().to_vec();
        forged[2].proof += 1;
        assert!(local.replace_chain(forged).is_err());
        assert_eq!(local.len(), 1);

        assert!(local.replace_chain(remote.blocks().to_vec()).unwrap());
        assert_eq!(local.blocks(), remote.blocks());
    }

    #[test]
    fn replace_chain_drops_already_sealed_pending() {
        let shared = record("P-1", "Sari");
        let mut local = Blockchain::new(DIFFICULTY).unwrap();
        local.new_transaction(shared.clone()).unwrap();
        local.new_transaction(record("P-2", "Ayu")).unwrap();

        let mut remote = Blockchain::new(DIFFICULTY).unwrap();
        remote.new_transaction(shared).unwrap();
        remote.mine("r").unwrap();

        assert!(local.replace_chain(remote.blocks().to_vec()).unwrap());
        assert_eq!(local.pending().len(), 1);
        assert_eq!(local.pending()[0].id_tanah, "P-2");
    }

    #[test]
    fn register_node_normalizes_addresses() {
        let mut chain = Blockchain::new(DIFFICULTY).unwrap();
        assert!(chain.register_node("http://192.168.0.5:5000").unwrap());
        assert!(!chain.register_node("192.168.0.5:5000").unwrap());
        assert!(chain.register_node("https://peer.example/chain").unwrap());
        assert_eq!(
            chain.nodes().iter().cloned().collect::<Vec<_>>(),
            vec!["192.168.0.5:5000".to_string(), "peer.example".to_string()]
        );
    }

    #[test]
    fn register_nodes_is_all_or_nothing() {
        let mut chain = Blockchain::new(DIFFICULTY).unwrap();
        let err = chain
            .register_nodes(["127.0.0.1:5001", "bad host:x"])
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidNodeAddress(_)));
        assert!(chain.nodes().is_empty());

        let added = chain
            .register_nodes(["127.0.0.1:5001", "http://127.0.0.1:5001/", "127.0.0.1:5002"])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(chain.nodes().len(), 2);
    }

    #[test]
    fn parse_node_address_rejects_garbage() {
        for bad in ["", "   ", "http://", "://host", "host:notaport", ":5000", "a b:1"] {
            assert!(parse_node_address(bad).is_err(), "{bad:?}");
        }
        assert_eq!(parse_node_address("localhost:5001").unwrap(), "localhost:5001");
    }

    #[test]
    fn history_tracks_transfers_with_proofs() {
        let mut chain = Blockchain::new(DIFFICULTY).unwrap();
        chain.new_transaction(LandRecord::new("P-7", "Budi", "Sari", "Bandung")).unwrap();
        chain.new_transaction(record("P-8", "Ayu")).unwrap();
        chain.mine("n").unwrap();
        chain.new_transaction(LandRecord::new("P-7", "Sari", "Rina", "Bandung")).unwrap();
        chain.mine("n").unwrap();

        let history = chain.history("P-7").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].block_index, 2);
        assert_eq!(history[0].record.pemilik_baru, "Sari");
        assert_eq!(history[1].block_index, 3);
        assert_eq!(history[1].record.pemilik_baru, "Rina");
        for entry in &history {
            let leaf = entry.record.leaf_hash().unwrap();
            assert!(entry.proof.verify(leaf, entry.merkle_root));
        }
        assert!(chain.history("missing").unwrap().is_empty());
    }
}
