//! Process entry point: wires a [`pebblechain_wallet::Account`], a
//! [`pebblechain_network::Node`], the gossip transport and the Controller's
//! JSON-RPC server together, the way the pedagogical source's `main.py`
//! wires a Qt UI, a ZeroMQ socket pair and a `Node` object together — minus
//! the UI, which lives in `gui-wallet` and talks to the RPC surface instead.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use pebblechain_core::config::ConfigBuilder;
use pebblechain_network::{transport, Node, NodeEvent};
use pebblechain_wallet::Account;

/// A pebblechain full node: gossip transport, consensus engine and
/// Controller RPC server in one process.
#[derive(Parser)]
#[command(name = "pebblechain", about = "Pebblechain full node", version)]
struct Cli {
    /// Port the gossip publisher binds on.
    #[arg(default_value_t = 5000)]
    port: u16,

    /// Peer endpoint (host:port) to connect to at startup. May be given
    /// more than once.
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Socket address the Controller's JSON-RPC server binds.
    #[arg(long, default_value = "127.0.0.1:8787")]
    rpc_addr: SocketAddr,

    /// Leading hex-zero character count a block hash must meet.
    #[arg(long)]
    difficulty: Option<u32>,

    /// Coinbase subsidy paid to the miner of each block.
    #[arg(long)]
    block_reward: Option<f64>,

    /// Directory wallet files are written under.
    #[arg(long)]
    wallets_dir: Option<PathBuf>,

    /// Load an existing wallet file instead of generating a fresh account.
    #[arg(long)]
    wallet: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let port = cli.port;
    let peers = cli.peers;
    let rpc_addr = cli.rpc_addr;

    let mut builder = ConfigBuilder::new().bind_port(port);
    if let Some(difficulty) = cli.difficulty {
        builder = builder.difficulty(difficulty);
    }
    if let Some(reward) = cli.block_reward {
        builder = builder.block_reward(reward);
    }
    if let Some(dir) = cli.wallets_dir {
        builder = builder.wallets_dir(dir);
    }
    let config = builder.finish();

    std::fs::create_dir_all(&config.wallets_dir)?;

    let account = match &cli.wallet {
        Some(path) => Account::from_file(path)?,
        None => Account::generate(),
    };
    let wallet_path = config.wallets_dir.join(format!("{}.json", account.address()));
    account.to_file(&wallet_path)?;
    tracing::info!(address = %account.address(), wallet = %wallet_path.display(), "account ready");

    // A node starts in `NoChain` (§4.6); the first mine or `consensus`
    // exchange transitions it to `Synced`.
    let (node, outbound_rx) = Node::new(account, config);

    spawn_event_logger(&node);

    let transport_node = node.clone();
    let transport_handle = tokio::spawn(async move {
        if let Err(e) = transport::run(transport_node, port, peers, outbound_rx).await {
            tracing::error!(error = %e, "gossip transport exited");
        }
    });

    let rpc_handle = pebblechain_rpc::serve(node.clone(), rpc_addr).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, cleaning up");

    rpc_handle.stop().ok();
    transport_handle.abort();

    if let Err(e) = std::fs::remove_file(&wallet_path) {
        tracing::warn!(error = %e, wallet = %wallet_path.display(), "failed to remove wallet file on shutdown");
    }

    Ok(())
}

/// Logs every [`NodeEvent`] at the point the UI's event hooks would have
/// fired, giving the structured-logging ambient stack a concrete consumer
/// even with no GUI attached.
fn spawn_event_logger(node: &Node) {
    let mut events = node.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                NodeEvent::BlockAccepted(block) => {
                    tracing::info!(index = block.index, hash = ?block.hashval, "block accepted");
                }
                NodeEvent::TransactionAccepted(tx) => {
                    tracing::info!(sender = %tx.sender, receiver = %tx.receiver, amount = tx.amount, "transaction accepted");
                }
                NodeEvent::PeerAdded(address) => {
                    tracing::info!(%address, "peer added");
                }
                NodeEvent::ChainAdopted { len } => {
                    tracing::info!(len, "adopted a longer peer chain");
                }
            }
        }
    });
}
