//! Gossipsub transport: the libp2p analogue of the ZeroMQ PUB/SUB sockets
//! this crate's consensus protocol was originally built on. Every node
//! publishes and subscribes on one empty-string topic, so any message
//! reaches every peer it is connected to.

use std::time::Duration;

use futures::StreamExt;
use libp2p::gossipsub::{self, IdentTopic, MessageAuthenticity};
use libp2p::swarm::{NetworkBehaviour, SwarmEvent};
use libp2p::{identity, Multiaddr, PeerId, SwarmBuilder};
use tokio::sync::mpsc;

use pebblechain_core::error::{Error, Result};

use crate::node::Node;
use crate::wire::Frame;

#[derive(NetworkBehaviour)]
struct PebblechainBehaviour {
    gossipsub: gossipsub::Behaviour,
}

/// Binds `/ip4/0.0.0.0/tcp/<port>`, dials every address in `peers`, and runs
/// forever: incoming gossip is decoded into [`Frame`]s and handed to `node`;
/// frames `node` wants to publish are drained from `outbound` and gossiped.
pub async fn run(
    node: Node,
    port: u16,
    peers: Vec<String>,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
) -> Result<()> {
    let local_key = identity::Keypair::generate_ed25519();
    let local_peer_id = PeerId::from(local_key.public());
    tracing::info!(%local_peer_id, "starting gossip transport");

    let gossipsub_config = gossipsub::ConfigBuilder::default()
        .heartbeat_interval(Duration::from_secs(1))
        .build()
        .map_err(|_| Error::Other("invalid gossipsub config"))?;
    let gossipsub = gossipsub::Behaviour::new(MessageAuthenticity::Signed(local_key.clone()), gossipsub_config)
        .map_err(|_| Error::Other("failed to build gossipsub behaviour"))?;

    let mut swarm = SwarmBuilder::with_existing_identity(local_key)
        .with_tokio()
        .with_tcp(
            Default::default(),
            libp2p::noise::Config::new,
            libp2p::yamux::Config::default,
        )
        .map_err(|_| Error::Other("failed to configure tcp transport"))?
        .with_behaviour(|_| PebblechainBehaviour { gossipsub })
        .map_err(|_| Error::Other("failed to attach behaviour"))?
        .build();

    let topic = IdentTopic::new("");
    swarm
        .behaviour_mut()
        .gossipsub
        .subscribe(&topic)
        .map_err(|_| Error::Other("failed to subscribe to topic"))?;

    let listen_addr: Multiaddr = format!("/ip4/0.0.0.0/tcp/{port}")
        .parse()
        .map_err(|_| Error::Other("invalid listen address"))?;
    swarm
        .listen_on(listen_addr)
        .map_err(|_| Error::Other("failed to bind listen address"))?;

    for peer in peers {
        match parse_peer_multiaddr(&peer) {
            Ok(addr) => {
                if let Err(e) = swarm.dial(addr) {
                    tracing::warn!(peer, error = %e, "failed to dial peer");
                }
            }
            Err(e) => tracing::warn!(peer, error = %e, "invalid peer address"),
        }
    }

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let bytes = frame.to_bytes();
                if let Err(e) = swarm.behaviour_mut().gossipsub.publish(topic.clone(), bytes) {
                    tracing::warn!(error = %e, "failed to publish gossip frame");
                }
            }
            event = swarm.select_next_some() => {
                if let SwarmEvent::Behaviour(PebblechainBehaviourEvent::Gossipsub(gossipsub::Event::Message {
                    message, ..
                })) = event
                {
                    match Frame::from_slice(&message.data) {
                        Ok(frame) => {
                            if let Err(e) = node.handle_frame(frame) {
                                tracing::warn!(error = %e, "failed to handle gossip frame");
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "received malformed gossip frame"),
                    }
                }
            }
        }
    }

    Ok(())
}

fn parse_peer_multiaddr(address: &str) -> Result<Multiaddr> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or(Error::Other("peer address must be host:port"))?;
    format!("/ip4/{host}/tcp/{port}")
        .parse()
        .map_err(|_| Error::Other("invalid peer address"))
}
