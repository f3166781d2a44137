//! Testing utilities for the landchain workspace
//!
//! Shared fixtures: sample records, pre-mined chains and in-process nodes.

#![allow(missing_docs)]

use landchain_core::{Blockchain, ChainStore, LandRecord};
use landchain_node::{build_router, AppState, HttpChainSource};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Difficulty that keeps mining fast in tests
pub const TEST_DIFFICULTY: u32 = 1;

pub fn sample_record(id_tanah: &str) -> LandRecord {
    LandRecord::new(id_tanah, "Budi Santoso", "Sari Dewi", "Jl. Merdeka 10, Bandung")
}

pub fn mined_chain(blocks: usize) -> Blockchain {
    let mut chain = Blockchain::new(TEST_DIFFICULTY).unwrap();
    for i in 0..blocks {
        chain.new_transaction(sample_record(&format!("P-{i}"))).unwrap();
        chain.mine("fixture-node").unwrap();
    }
    chain
}

/// A node served on an ephemeral local port
pub struct TestNode {
    pub addr: SocketAddr,
    pub state: AppState,
    pub data_dir: TempDir,
}

impl TestNode {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// `host:port` as registered with peers
    pub fn authority(&self) -> String {
        self.addr.to_string()
    }
}

pub async fn spawn_node() -> TestNode {
    spawn_node_with_limit(1024 * 1024).await
}

pub async fn spawn_node_with_limit(max_upload_bytes: usize) -> TestNode {
    let data_dir = tempfile::tempdir().unwrap();
    let chain = Blockchain::open(
        ChainStore::new(data_dir.path().join("chain_data.json")),
        TEST_DIFFICULTY,
    )
    .unwrap();
    let state = AppState::new(
        chain,
        landchain_node::new_node_id(),
        Arc::new(HttpChainSource::new(Duration::from_secs(2))),
        data_dir.path().join("uploads"),
        max_upload_bytes,
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state.clone());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    TestNode {
        addr,
        state,
        data_dir,
    }
}
