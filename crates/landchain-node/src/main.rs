#![forbid(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use landchain_node::{build_router, logging, AppState, Cli, NodeConfig};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(&cli)?;
    logging::init(config.log_format)?;

    let state = AppState::from_config(&config).context("failed to open ledger")?;
    {
        let chain = state.chain.lock();
        info!(
            node_id = %state.node_id,
            blocks = chain.len(),
            difficulty = chain.difficulty(),
            data_dir = %config.data_dir.display(),
            "ledger ready"
        );
    }

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("bind failed on {}:{}", config.host, config.port))?;
    info!("landchain-node listening on {}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("server failed")?;
    info!("landchain-node stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown signal received");
}
