//! Value-transfer records.
//!
//! A [`Transaction`] is a flat, UTXO-free transfer: `sender` pays `amount` to
//! `receiver`. Balances are never checked here — see the Non-goals in the
//! crate's top-level documentation.

use serde::{Deserialize, Serialize};

use crate::crypto::{self, Signer};
use crate::error::Result;

/// Reserved sender literal marking a coinbase (block-reward) transaction.
pub const COINBASE_SENDER: &str = "NETWORK_ADMIN";

/// A transfer of value from `sender` to `receiver`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    pub timestamp: f64,
    pub tx_number: Option<u64>,
    pub signature: Option<String>,
}

impl Transaction {
    /// Builds an unsigned, not-yet-included transaction.
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: f64,
        timestamp: f64,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            timestamp,
            tx_number: None,
            signature: None,
        }
    }

    /// Builds the synthetic miner-reward transaction paid to `receiver`.
    pub fn coinbase(receiver: impl Into<String>, amount: f64, timestamp: f64) -> Self {
        Self::new(COINBASE_SENDER, receiver, amount, timestamp)
    }

    /// `true` if this is the synthetic block-reward transaction, exempt from
    /// signature verification.
    pub fn is_coinbase(&self) -> bool {
        self.sender == COINBASE_SENDER
    }

    /// The canonical pre-signature message: `sender`, `receiver`, `amount`
    /// and `timestamp` as a JSON object with keys in sorted order (`tx_number`
    /// and `signature` are never part of it).
    fn canonical_message(&self) -> Vec<u8> {
        let value = serde_json::json!({
            "sender": self.sender,
            "receiver": self.receiver,
            "amount": self.amount,
            "timestamp": self.timestamp,
        });
        serde_json::to_vec(&value).expect("transaction canonicalises to valid JSON")
    }

    /// Signs this transaction with `signer`, setting [`Transaction::signature`].
    pub fn sign(&mut self, signer: &dyn Signer) {
        let message = self.canonical_message();
        let sig = signer.sign(&message);
        self.signature = Some(crypto::base64_encode(&sig));
    }

    /// `true` iff this is a coinbase transaction, or `signature` recovers to
    /// an address matching `sender`.
    pub fn verify(&self) -> bool {
        if self.is_coinbase() {
            return true;
        }
        let Some(sig_b64) = &self.signature else {
            return false;
        };
        let Ok(sig_bytes) = crypto::base64_decode(sig_b64) else {
            return false;
        };
        crypto::verify_signature(&sig_bytes, &self.canonical_message(), &self.sender)
    }

    /// Serializes to the wire `{"sender", "receiver", ...}` dict.
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("transaction serializes")
    }

    /// Deserializes from the wire dict produced by [`Transaction::to_dict`].
    pub fn from_dict(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::{PublicKey, Secp256k1, SecretKey};

    struct TestSigner {
        secret: SecretKey,
        public: PublicKey,
    }

    impl TestSigner {
        fn new() -> Self {
            let bytes = crypto::gen_private_key();
            let secret = SecretKey::from_slice(&bytes).unwrap();
            let secp = Secp256k1::new();
            let public = PublicKey::from_secret_key(&secp, &secret);
            Self { secret, public }
        }
    }

    impl Signer for TestSigner {
        fn sign(&self, message: &[u8]) -> [u8; 65] {
            crypto::sign_recoverable(&self.secret, message)
        }

        fn address(&self) -> String {
            crypto::p2pkh_address(&self.public)
        }
    }

    #[test]
    fn coinbase_verifies_without_signature() {
        let tx = Transaction::coinbase("addr", 50.0, 0.0);
        assert!(tx.verify());
    }

    #[test]
    fn signed_transaction_verifies() {
        let signer = TestSigner::new();
        let mut tx = Transaction::new(signer.address(), "receiver", 10.0, 1234.5);
        tx.sign(&signer);
        assert!(tx.verify());
    }

    #[test]
    fn tampered_amount_fails_verification() {
        let signer = TestSigner::new();
        let mut tx = Transaction::new(signer.address(), "receiver", 10.0, 1234.5);
        tx.sign(&signer);
        tx.amount = 999.0;
        assert!(!tx.verify());
    }

    #[test]
    fn missing_signature_fails_verification() {
        let signer = TestSigner::new();
        let tx = Transaction::new(signer.address(), "receiver", 10.0, 1234.5);
        assert!(!tx.verify());
    }

    #[test]
    fn dict_round_trip_preserves_equality() {
        let signer = TestSigner::new();
        let mut tx = Transaction::new(signer.address(), "receiver", 10.0, 1234.5);
        tx.sign(&signer);
        let round_tripped = Transaction::from_dict(tx.to_dict()).unwrap();
        assert_eq!(tx, round_tripped);
    }
}
