//! Shared node state

use crate::config::NodeConfig;
use crate::error::ApiError;
use crate::peers::{ChainSource, HttpChainSource};
use landchain_core::{Block, Blockchain, ChainError, ChainStore};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// State handed to every handler
///
/// The ledger sits behind a synchronous mutex. It is never held across an
/// `.await`; mutations that touch the disk run on the blocking pool.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The ledger
    pub chain: Arc<Mutex<Blockchain>>,
    /// Identifier credited in mining reward records
    pub node_id: Arc<str>,
    /// Source of peer chains for consensus
    pub peers: Arc<dyn ChainSource>,
    /// Directory of uploaded certificates
    pub upload_dir: Arc<PathBuf>,
    /// Request body limit
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Assemble state from parts
    #[must_use]
    pub fn new(
        chain: Blockchain,
        node_id: impl Into<Arc<str>>,
        peers: Arc<dyn ChainSource>,
        upload_dir: PathBuf,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            chain: Arc::new(Mutex::new(chain)),
            node_id: node_id.into(),
            peers,
            upload_dir: Arc::new(upload_dir),
            max_upload_bytes,
        }
    }

    /// Open the persistent ledger and upload directory described by `config`
    ///
    /// # Errors
    /// Returns error if the data directory cannot be prepared
    pub fn from_config(config: &NodeConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(config.upload_dir())?;
        let chain = Blockchain::open(ChainStore::new(config.storage_path()), config.difficulty)?;
        let peers = Arc::new(HttpChainSource::new(Duration::from_millis(
            config.peer_timeout_ms,
        )));
        Ok(Self::new(
            chain,
            new_node_id(),
            peers,
            config.upload_dir(),
            config.max_upload_bytes,
        ))
    }

    /// Run a ledger mutation on the blocking pool
    ///
    /// # Errors
    /// Returns the mutation's error, or an internal error if the task panicked
    pub async fn write<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Blockchain) -> Result<T, ChainError> + Send + 'static,
        T: Send + 'static,
    {
        let chain = Arc::clone(&self.chain);
        let result = tokio::task::spawn_blocking(move || f(&mut chain.lock())).await?;
        Ok(result?)
    }

    /// Mine one block
    ///
    /// Proof-of-work runs off the async workers against a snapshot of the
    /// tip. If the chain moved meanwhile (another block or an adopted peer
    /// chain) the search restarts on the new tip.
    ///
    /// # Errors
    /// Returns error if the block cannot be persisted
    pub async fn mine(&self) -> Result<Block, ApiError> {
        loop {
            let target = self.chain.lock().mining_target();
            let proof = tokio::task::spawn_blocking(move || target.solve()).await?;
            let node_id = Arc::clone(&self.node_id);
            let mined = self
                .write(move |chain| chain.commit_mined(&target, proof, &node_id))
                .await?;
            if let Some(block) = mined {
                return Ok(block);
            }
        }
    }
}

/// Random node identifier: UUID v4 as 32 hex chars
#[must_use]
pub fn new_node_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
