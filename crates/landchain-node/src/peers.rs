//! Peer chains and consensus
//!
//! Consensus is "longest valid chain wins": every registered peer is
//! asked for its chain concurrently and the longest candidate that
//! validates replaces the local chain.

use crate::error::{ApiError, PeerError};
use crate::state::AppState;
use async_trait::async_trait;
use landchain_core::Block;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body of `GET /chain`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResponse {
    /// Blocks, genesis first
    pub chain: Vec<Block>,
    /// Number of blocks
    pub length: usize,
}

/// Where peer chains come from
#[async_trait]
pub trait ChainSource: Send + Sync + std::fmt::Debug {
    /// Fetch the full chain of `node` (`host[:port]`)
    async fn fetch_chain(&self, node: &str) -> Result<Vec<Block>, PeerError>;
}

/// Fetches chains over HTTP
#[derive(Debug, Clone)]
pub struct HttpChainSource {
    client: reqwest::Client,
}

impl HttpChainSource {
    /// Client with a per-request timeout
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

#[async_trait]
impl ChainSource for HttpChainSource {
    async fn fetch_chain(&self, node: &str) -> Result<Vec<Block>, PeerError> {
        let url = format!("http://{node}/chain");
        let request_error = |source| PeerError::Request {
            node: node.to_string(),
            source,
        };
        let response = self.client.get(&url).send().await.map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(PeerError::Status {
                node: node.to_string(),
                status: status.as_u16(),
            });
        }
        let body: ChainResponse = response.json().await.map_err(request_error)?;
        if body.length != body.chain.len() {
            return Err(PeerError::InvalidChain {
                node: node.to_string(),
                reason: format!("length {} but {} blocks", body.length, body.chain.len()),
            });
        }
        Ok(body.chain)
    }
}

/// Run consensus against all registered peers
///
/// Returns whether the local chain was replaced. Unreachable peers and
/// invalid chains are logged and skipped.
///
/// # Errors
/// Returns error only if adopting a chain fails locally (persistence)
pub async fn resolve_conflicts(state: &AppState) -> Result<bool, ApiError> {
    let (nodes, local_len) = {
        let chain = state.chain.lock();
        (chain.nodes().clone(), chain.len())
    };
    if nodes.is_empty() {
        tracing::debug!("no peers registered, nothing to resolve");
        return Ok(false);
    }

    let fetches = nodes.iter().map(|node| async move {
        (node.as_str(), state.peers.fetch_chain(node).await)
    });
    let mut candidates: Vec<(&str, Vec<Block>)> = Vec::new();
    for (node, result) in futures::future::join_all(fetches).await {
        match result {
            Ok(chain) if chain.len() > local_len => candidates.push((node, chain)),
            Ok(chain) => tracing::debug!(peer = node, length = chain.len(), "peer chain not longer"),
            Err(e) => tracing::warn!(peer = node, error = %e, "peer unavailable"),
        }
    }
    candidates.sort_by_key(|(_, chain)| std::cmp::Reverse(chain.len()));

    for (node, candidate) in candidates {
        let length = candidate.len();
        match state.write(move |chain| chain.replace_chain(candidate)).await {
            Ok(true) => {
                tracing::info!(peer = node, length, "adopted peer chain");
                return Ok(true);
            }
            Ok(false) => {}
            Err(ApiError::Chain(e)) if !matches!(e, landchain_core::ChainError::Store(_)) => {
                tracing::warn!(peer = node, error = %e, "rejected peer chain");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(false)
}
