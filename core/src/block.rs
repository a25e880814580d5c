//! Proof-of-work blocks.
//!
//! A [`Block`] chains to its predecessor via `previous_hash`, carries an
//! ordered set of [`Transaction`]s, and is only valid once [`Block::mine`]
//! has found a `nonce` whose hash meets the difficulty target and the miner
//! has [`Block::sign`]ed it.
//!
//! Two distinct canonical forms are used by this module and neither is
//! optional to preserve: [`Block::canon_for_hash`] (a flat string
//! concatenation) feeds the proof-of-work hash, while
//! [`Block::canon_for_sig`] (sorted-key JSON) feeds the miner's signature.
//! They differ because the pedagogical source this crate is derived from
//! hashes and signs blocks through two different code paths; collapsing them
//! into one would silently change what every existing signature commits to.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::crypto::{self, Signer};
use crate::tx::Transaction;

/// Current time as seconds-since-epoch, the real-number timestamp shape
/// used throughout the wire format. Shared with [`crate::chain`] so every
/// freshly minted transaction or block is stamped consistently.
pub(crate) fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs_f64()
}

/// An ordered container of transactions linked into the chain by
/// proof-of-work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    pub nonce: u64,
    pub timestamp: f64,
    pub miner: Option<String>,
    pub hashval: Option<String>,
    pub transactions: Vec<Transaction>,
    pub signature: Option<String>,
}

impl Block {
    /// Builds an unmined, unsigned block stamped with the current time.
    pub fn new(
        index: u64,
        previous_hash: impl Into<String>,
        miner: Option<String>,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            index,
            previous_hash: previous_hash.into(),
            nonce: 0,
            timestamp: now_ts(),
            miner,
            hashval: None,
            transactions,
            signature: None,
        }
    }

    /// Appends `transaction`, stamping its `tx_number` with its 0-based
    /// position in this block (assigned from the length prior to the push).
    pub fn add_transaction(&mut self, mut transaction: Transaction) {
        transaction.tx_number = Some(self.transactions.len() as u64);
        self.transactions.push(transaction);
    }

    /// The flat string concatenation hashed for proof-of-work:
    /// `index || previous_hash || nonce || timestamp || miner`, followed for
    /// every transaction by `sender || receiver || amount`.
    pub fn canon_for_hash(&self) -> String {
        let mut s = String::new();
        s.push_str(&self.index.to_string());
        s.push_str(&self.previous_hash);
        s.push_str(&self.nonce.to_string());
        s.push_str(&self.timestamp.to_string());
        s.push_str(self.miner.as_deref().unwrap_or(""));
        for tx in &self.transactions {
            s.push_str(&tx.sender);
            s.push_str(&tx.receiver);
            s.push_str(&tx.amount.to_string());
        }
        s
    }

    /// The sorted-key JSON object signed by the miner: every field except
    /// `signature`, including `hashval` and the full transaction list.
    fn canon_for_sig(&self) -> serde_json::Value {
        serde_json::json!({
            "index": self.index,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
            "timestamp": self.timestamp,
            "miner": self.miner,
            "hashval": self.hashval,
            "transactions": self.transactions,
        })
    }

    /// Recomputes the SHA-256 hex digest of [`Block::canon_for_hash`].
    pub fn compute_hash(&self) -> String {
        hex::encode(crypto::sha256(self.canon_for_hash().as_bytes()))
    }

    /// Increments `nonce` from its current value until [`Block::compute_hash`]
    /// has `difficulty` leading hex zeros, sets `hashval`, and returns it.
    pub fn mine(&mut self, difficulty: u32) -> String {
        let target = "0".repeat(difficulty as usize);
        loop {
            let candidate = self.compute_hash();
            if candidate.starts_with(&target) {
                self.hashval = Some(candidate.clone());
                return candidate;
            }
            self.nonce = self.nonce.wrapping_add(1);
        }
    }

    /// `true` if `hashval` is present, matches [`Block::compute_hash`], and
    /// has `difficulty` leading hex zeros.
    pub fn hash_is_valid(&self, difficulty: u32) -> bool {
        let Some(hashval) = &self.hashval else {
            return false;
        };
        *hashval == self.compute_hash() && hashval.starts_with(&"0".repeat(difficulty as usize))
    }

    /// Signs [`Block::canon_for_sig`] with `signer`, setting `signature`.
    pub fn sign(&mut self, signer: &dyn Signer) {
        let message =
            serde_json::to_vec(&self.canon_for_sig()).expect("block canonicalises to valid JSON");
        let sig = signer.sign(&message);
        self.signature = Some(crypto::base64_encode(&sig));
    }

    /// `true` iff: the signature recovers to `miner`; every transaction
    /// verifies (coinbase transactions are exempt); and `hashval` matches
    /// the recomputed hash. Does *not* check the difficulty target — that is
    /// [`Block::hash_is_valid`]'s job.
    pub fn verify(&self) -> bool {
        let Some(miner) = &self.miner else {
            return false;
        };
        let Some(sig_b64) = &self.signature else {
            return false;
        };
        let Ok(sig_bytes) = crypto::base64_decode(sig_b64) else {
            return false;
        };
        let message = match serde_json::to_vec(&self.canon_for_sig()) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        if !crypto::verify_signature(&sig_bytes, &message, miner) {
            return false;
        }
        if !self.transactions.iter().all(Transaction::verify) {
            return false;
        }
        self.hashval.as_deref() == Some(self.compute_hash().as_str())
    }

    /// Serializes to the wire block dict.
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("block serializes")
    }

    /// Deserializes from the wire dict produced by [`Block::to_dict`].
    pub fn from_dict(value: serde_json::Value) -> crate::error::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::Transaction;
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
    fn mining_meets_difficulty_and_matches_hashval() {
        let mut block = Block::new(0, "", None, Vec::new());
        block.mine(2);
        assert!(block.hash_is_valid(2));
        assert!(block.hashval.unwrap().starts_with("00"));
    }

    #[test]
    fn signed_mined_block_verifies() {
        let signer = TestSigner::new();
        let coinbase = Transaction::coinbase(signer.address(), 50.0, 0.0);
        let mut block = Block::new(1, "deadbeef", Some(signer.address()), vec![coinbase]);
        block.mine(1);
        block.sign(&signer);
        assert!(block.verify());
    }

    #[test]
    fn mutated_amount_after_mining_fails_verify_and_hash() {
        let signer = TestSigner::new();
        let coinbase = Transaction::coinbase(signer.address(), 50.0, 0.0);
        let mut block = Block::new(1, "deadbeef", Some(signer.address()), vec![coinbase]);
        block.mine(1);
        block.sign(&signer);

        block.transactions[0].amount = 999.0;
        assert!(!block.verify());
        assert!(!block.hash_is_valid(1));
    }

    #[test]
    fn dict_round_trip_preserves_hash() {
        let signer = TestSigner::new();
        let coinbase = Transaction::coinbase(signer.address(), 50.0, 0.0);
        let mut block = Block::new(1, "deadbeef", Some(signer.address()), vec![coinbase]);
        block.mine(1);
        block.sign(&signer);

        let round_tripped = Block::from_dict(block.to_dict()).unwrap();
        assert_eq!(block, round_tripped);
        assert_eq!(block.compute_hash(), round_tripped.compute_hash());
    }

    #[test]
    fn add_transaction_assigns_sequential_tx_numbers() {
        let mut block = Block::new(0, "", None, Vec::new());
        block.add_transaction(Transaction::new("a", "b", 1.0, 0.0));
        block.add_transaction(Transaction::new("c", "d", 2.0, 0.0));
        assert_eq!(block.transactions[0].tx_number, Some(0));
        assert_eq!(block.transactions[1].tx_number, Some(1));
    }
}
