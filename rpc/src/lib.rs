//! Pebblechain RPC
//!
//! The Controller facade: a thin JSON-RPC surface over [`pebblechain_network::Node`]
//! standing in for the source's Qt signal/slot-wired UI layer. Every method
//! here is a direct translation of a button or dialog in that UI — submit a
//! transaction, request a mine, add a peer, inspect the chain — plus an
//! event subscription replacing the Qt `Signal`s the UI used to react to
//! background state changes.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult, SubscriptionResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{PendingSubscriptionSink, Server, ServerHandle, SubscriptionMessage};
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};

use pebblechain_network::{Node, NodeEvent};

/// A mined block, transaction or peer addition, serialised for subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeEventDto {
    BlockAccepted { block: serde_json::Value },
    TransactionAccepted { transaction: serde_json::Value },
    PeerAdded { address: String },
    ChainAdopted { len: usize },
}

impl From<NodeEvent> for NodeEventDto {
    fn from(event: NodeEvent) -> Self {
        match event {
            NodeEvent::BlockAccepted(block) => NodeEventDto::BlockAccepted {
                block: block.to_dict(),
            },
            NodeEvent::TransactionAccepted(tx) => NodeEventDto::TransactionAccepted {
                transaction: tx.to_dict(),
            },
            NodeEvent::PeerAdded(address) => NodeEventDto::PeerAdded { address },
            NodeEvent::ChainAdopted { len } => NodeEventDto::ChainAdopted { len },
        }
    }
}

#[rpc(server, namespace = "pebblechain")]
pub trait Controller {
    /// Signs and queues a transaction paying `receiver`, gossiping it to peers.
    #[method(name = "submitTransaction")]
    async fn submit_transaction(&self, receiver: String, amount: f64) -> RpcResult<serde_json::Value>;

    /// Mines the pending pool into a new block and reconciles with peers.
    #[method(name = "requestMine")]
    async fn request_mine(&self) -> RpcResult<serde_json::Value>;

    /// Registers a peer and gossips this node's chain to it.
    #[method(name = "addPeer")]
    async fn add_peer(&self, address: String) -> RpcResult<()>;

    /// The current chain as a JSON array of blocks.
    #[method(name = "snapshot")]
    async fn snapshot(&self) -> RpcResult<serde_json::Value>;

    /// This node's P2PKH address.
    #[method(name = "address")]
    async fn address(&self) -> RpcResult<String>;

    /// Streams [`NodeEventDto`]s as they occur, replacing the source's Qt
    /// signal/slot wiring between the network thread and the UI.
    #[subscription(name = "subscribeEvents" => "events", item = NodeEventDto)]
    async fn subscribe_events(&self) -> SubscriptionResult;
}

pub struct ControllerImpl {
    node: Node,
}

impl ControllerImpl {
    pub fn new(node: Node) -> Self {
        Self { node }
    }
}

fn to_rpc_error(err: pebblechain_core::Error) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(-32000, err.to_string(), None::<()>)
}

#[async_trait]
impl ControllerServer for ControllerImpl {
    async fn submit_transaction(&self, receiver: String, amount: f64) -> RpcResult<serde_json::Value> {
        let tx = self
            .node
            .submit_transaction(receiver, amount)
            .map_err(to_rpc_error)?;
        Ok(tx.to_dict())
    }

    async fn request_mine(&self) -> RpcResult<serde_json::Value> {
        let block = self.node.mine_and_reconcile().await.map_err(to_rpc_error)?;
        Ok(block.to_dict())
    }

    async fn add_peer(&self, address: String) -> RpcResult<()> {
        self.node.add_peer(address).map_err(to_rpc_error)
    }

    async fn snapshot(&self) -> RpcResult<serde_json::Value> {
        self.node.snapshot().map_err(to_rpc_error)
    }

    async fn address(&self) -> RpcResult<String> {
        Ok(self.node.address())
    }

    async fn subscribe_events(&self, pending: PendingSubscriptionSink) -> SubscriptionResult {
        let sink = pending.accept().await?;
        let mut receiver = self.node.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = receiver.recv().await {
                let dto: NodeEventDto = event.into();
                let Ok(message) = SubscriptionMessage::from_json(&dto) else {
                    continue;
                };
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        });
        Ok(())
    }
}

/// Starts the Controller's JSON-RPC server bound to `addr`, returning a
/// handle the caller can `stop()` for clean shutdown.
pub async fn serve(node: Node, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
    let server = Server::builder().build(addr).await?;
    let controller = Arc::new(ControllerImpl::new(node));
    let handle = server.start(controller.into_rpc());
    tracing::info!(%addr, "Controller JSON-RPC listening");
    Ok(handle)
}
