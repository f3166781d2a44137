//! Landchain Node
//!
//! HTTP node around the [`landchain_core`] ledger:
//! - Accepts land-certificate transfers (JSON or form upload)
//! - Mines blocks with proof-of-work
//! - Serves uploaded certificates
//! - Registers peers and adopts the longest valid chain among them
//!
//! # Example
//!
//! ```rust,ignore
//! use landchain_node::{build_router, AppState, NodeConfig};
//!
//! let config = NodeConfig::new();
//! let app = build_router(AppState::from_config(&config)?);
//! let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
//! axum::serve(listener, app).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod peers;
pub mod state;

pub use config::{Cli, ConfigError, LogFormat, NodeConfig, DEFAULT_PORT};
pub use error::{ApiError, PeerError};
pub use http::build_router;
pub use peers::{resolve_conflicts, ChainResponse, ChainSource, HttpChainSource};
pub use state::{new_node_id, AppState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
