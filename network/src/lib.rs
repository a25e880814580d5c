//! Pebblechain Network
//!
//! Gossip-based peer-to-peer transport and the longest-valid-chain
//! reconciliation protocol built on top of it.

pub mod node;
pub mod transport;
pub mod wire;

pub use node::{Node, NodeEvent};
pub use wire::Frame;
