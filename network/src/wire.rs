//! The gossip wire format: `{"operation": "...", "parameters": {...}}`.
//!
//! This is a hand-rolled (de)serialisation rather than a tagged `serde` enum
//! because `parameters` is `null` for [`Frame::Consensus`] and the key order
//! and shape otherwise need to match what every peer on the network already
//! sends — there is no freedom to pick a more "natural" Rust encoding here.

use pebblechain_core::error::{Error, Result};

/// One gossip message exchanged between nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A transaction a peer wants mined into the next block, carried whole
    /// (including its signature) so recipients can verify it themselves.
    AddTransaction { transaction: serde_json::Value },
    /// A peer introducing itself with its full chain, to be sanitised and
    /// adopted if it is valid.
    AddPeer {
        address: String,
        blockchain: serde_json::Value,
    },
    /// "What's your chain length?" broadcast, answered by [`Frame::ConsensusResp`].
    Consensus,
    /// A reply to [`Frame::Consensus`] carrying the responder's full chain.
    ConsensusResp { blockchain: serde_json::Value },
    /// A single newly mined block.
    AddBlock { block: serde_json::Value },
}

impl Frame {
    pub fn to_value(&self) -> serde_json::Value {
        let (operation, parameters) = match self {
            Frame::AddTransaction { transaction } => (
                "add_transaction",
                serde_json::json!({ "transaction": transaction }),
            ),
            Frame::AddPeer { address, blockchain } => (
                "add_peer",
                serde_json::json!({
                    "address": address,
                    "blockchain": blockchain,
                }),
            ),
            Frame::Consensus => ("consensus", serde_json::Value::Null),
            Frame::ConsensusResp { blockchain } => (
                "consensus_resp",
                serde_json::json!({ "blockchain": blockchain }),
            ),
            Frame::AddBlock { block } => ("add_block", serde_json::json!({ "block": block })),
        };
        serde_json::json!({
            "operation": operation,
            "parameters": parameters,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.to_value()).expect("frame serialises to valid JSON")
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let operation = value
            .get("operation")
            .and_then(|v| v.as_str())
            .ok_or(Error::Other("frame missing 'operation'"))?;
        let parameters = value.get("parameters").cloned().unwrap_or(serde_json::Value::Null);

        let field = |name: &'static str| -> Result<serde_json::Value> {
            parameters
                .get(name)
                .cloned()
                .ok_or(Error::Other("frame missing expected parameter"))
        };
        let field_str = |name: &'static str| -> Result<String> {
            Ok(field(name)?
                .as_str()
                .ok_or(Error::Other("expected string parameter"))?
                .to_string())
        };
        match operation {
            "add_transaction" => Ok(Frame::AddTransaction {
                transaction: field("transaction")?,
            }),
            "add_peer" => Ok(Frame::AddPeer {
                address: field_str("address")?,
                blockchain: field("blockchain")?,
            }),
            "consensus" => Ok(Frame::Consensus),
            "consensus_resp" => Ok(Frame::ConsensusResp {
                blockchain: field("blockchain")?,
            }),
            "add_block" => Ok(Frame::AddBlock { block: field("block")? }),
            _ => Err(Error::Other("unknown operation")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consensus_round_trips_with_null_parameters() {
        let frame = Frame::Consensus;
        let value = frame.to_value();
        assert_eq!(value["parameters"], serde_json::Value::Null);
        assert_eq!(Frame::from_value(value).unwrap(), frame);
    }

    #[test]
    fn add_transaction_round_trips() {
        let frame = Frame::AddTransaction {
            transaction: serde_json::json!({
                "sender": "alice",
                "receiver": "bob",
                "amount": 12.5,
                "timestamp": 0.0,
                "tx_number": null,
                "signature": null,
            }),
        };
        let bytes = frame.to_bytes();
        assert_eq!(Frame::from_slice(&bytes).unwrap(), frame);
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let value = serde_json::json!({ "operation": "do_a_barrel_roll", "parameters": null });
        assert!(Frame::from_value(value).is_err());
    }
}
