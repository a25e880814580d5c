//! Append-only chain state.
//!
//! [`Chain`] links [`Block`]s by hash and keeps a pending-transaction pool,
//! but deliberately stops there: it does not track balances, spendable
//! outputs, or any notion of account state. Teaching the gossip/consensus
//! layer above does not require it, and the pedagogical source this is
//! derived from never built one either.

use crate::block::{now_ts, Block};
use crate::crypto::Signer;
use crate::tx::Transaction;

/// A linear sequence of mined, linked blocks plus a pool of transactions
/// waiting to be mined into the next one.
#[derive(Debug, Clone)]
pub struct Chain {
    pub difficulty: u32,
    pub block_reward: f64,
    pub blocks: Vec<Block>,
    pub tx_pool: Vec<Transaction>,
}

impl Chain {
    /// Mines and signs an empty genesis block (index 0, `previous_hash`
    /// empty, no transactions, `miner` absent) and starts a chain from it.
    pub fn create(difficulty: u32, signer: &dyn Signer, block_reward: f64) -> Self {
        let mut genesis = Block::new(0, "", None, Vec::new());
        genesis.mine(difficulty);
        genesis.sign(signer);

        Self {
            difficulty,
            block_reward,
            blocks: vec![genesis],
            tx_pool: Vec::new(),
        }
    }

    /// The most recently accepted block.
    pub fn head(&self) -> &Block {
        self.blocks.last().expect("chain is never empty once created")
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The full block list as the wire array gossiped in `add_peer` and
    /// `consensus_resp` frames.
    pub fn blocks_to_dict(&self) -> serde_json::Value {
        serde_json::Value::Array(self.blocks.iter().map(Block::to_dict).collect())
    }

    /// Queues `transaction` for the next mined block, skipping it if an
    /// identically-signed transaction is already pending. Returns `true` if
    /// the transaction was newly queued, `false` if it was a duplicate.
    pub fn add_transaction(&mut self, transaction: Transaction) -> bool {
        if self
            .tx_pool
            .iter()
            .any(|pending| pending.signature == transaction.signature)
        {
            return false;
        }
        self.tx_pool.push(transaction);
        true
    }

    /// Builds a block from the pending pool plus a coinbase reward for
    /// `miner_address`, mines and signs it with `signer`, and appends it if
    /// valid. Returns `None` without mining anything if the pool is empty.
    /// The pool is cleared whether or not the mined block is accepted,
    /// matching the source this is derived from: a failed mine still
    /// discards whatever was queued.
    pub fn mine_block(&mut self, signer: &dyn Signer, miner_address: impl Into<String>) -> Option<Block> {
        if self.tx_pool.is_empty() {
            return None;
        }
        let miner_address = miner_address.into();
        let mut pending: Vec<Transaction> = self.tx_pool.drain(..).collect();
        pending.push(Transaction::coinbase(miner_address.clone(), self.block_reward, now_ts()));

        let head = self.head();
        let mut candidate = Block::new(head.index + 1, head.compute_hash(), Some(miner_address), Vec::new());
        for tx in pending {
            candidate.add_transaction(tx);
        }
        candidate.mine(self.difficulty);
        candidate.sign(signer);

        self.try_add_block(candidate.clone()).then_some(candidate)
    }

    /// Validates and appends a block received from a peer. Clears the local
    /// tx pool on acceptance (transactions it contained may now be stale or
    /// already mined by the peer) but leaves it untouched on rejection.
    pub fn add_block_from_peer(&mut self, block: Block) -> bool {
        let accepted = self.try_add_block(block);
        if accepted {
            self.tx_pool.clear();
        }
        accepted
    }

    /// The acceptance gate every new block — locally mined or from a peer —
    /// must pass: non-decreasing timestamp, sequential index, matching
    /// `previous_hash`, and a valid proof-of-work hash.
    fn try_add_block(&mut self, block: Block) -> bool {
        let head = self.head();
        if block.timestamp < head.timestamp {
            return false;
        }
        if block.index != head.index + 1 {
            return false;
        }
        if block.previous_hash != head.compute_hash() {
            return false;
        }
        if !block.hash_is_valid(self.difficulty) {
            return false;
        }
        self.blocks.push(block);
        true
    }

    /// `true` if the genesis block meets the difficulty target and every
    /// subsequent block links to its predecessor's hash with a valid index
    /// and proof-of-work.
    pub fn is_valid(&self) -> bool {
        let Some(genesis) = self.blocks.first() else {
            return false;
        };
        if !genesis.hash_is_valid(self.difficulty) {
            return false;
        }
        for pair in self.blocks.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            if curr.index != prev.index + 1 {
                return false;
            }
            if curr.previous_hash != prev.compute_hash() {
                return false;
            }
            if curr.timestamp < prev.timestamp {
                return false;
            }
            if !curr.hash_is_valid(self.difficulty) {
                return false;
            }
        }
        true
    }

    /// Replaces this chain's blocks wholesale with `blocks`, replaying every
    /// acceptance check rather than trusting the replacement outright.
    /// Returns `false` (leaving `self` untouched) if the replacement is not a
    /// strict improvement or fails validation.
    pub fn replace_with(&mut self, blocks: Vec<Block>) -> bool {
        if blocks.len() <= self.blocks.len() {
            return false;
        }
        let candidate = Self {
            difficulty: self.difficulty,
            block_reward: self.block_reward,
            blocks,
            tx_pool: Vec::new(),
        };
        if !candidate.is_valid() {
            return false;
        }
        self.blocks = candidate.blocks;
        self.tx_pool.clear();
        true
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
            let bytes = crate::crypto::gen_private_key();
            let secret = SecretKey::from_slice(&bytes).unwrap();
            let secp = Secp256k1::new();
            let public = PublicKey::from_secret_key(&secp, &secret);
            Self { secret, public }
        }
    }

    impl Signer for TestSigner {
        fn sign(&self, message: &[u8]) -> [u8; 65] {
            crate::crypto::sign_recoverable(&self.secret, message)
        }

        fn address(&self) -> String {
            crate::crypto::p2pkh_address(&self.public)
        }
    }

    #[test]
    fn genesis_chain_is_valid() {
        let signer = TestSigner::new();
        let chain = Chain::create(1, &signer, 50.0);
        assert_eq!(chain.len(), 1);
        assert!(chain.is_valid());
    }

    #[test]
    fn mining_empty_pool_returns_none_and_chain_does_not_grow() {
        let signer = TestSigner::new();
        let mut chain = Chain::create(1, &signer, 50.0);
        assert!(chain.mine_block(&signer, signer.address()).is_none());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn mining_appends_and_clears_pool() {
        let signer = TestSigner::new();
        let mut chain = Chain::create(1, &signer, 50.0);
        chain.add_transaction(Transaction::coinbase("someone", 1.0, 0.0));
        assert_eq!(chain.tx_pool.len(), 1);

        let mined = chain.mine_block(&signer, signer.address());
        assert!(mined.is_some());
        assert_eq!(chain.len(), 2);
        assert!(chain.tx_pool.is_empty());
        assert!(chain.is_valid());
    }

    #[test]
    fn duplicate_signature_not_queued_twice() {
        let signer = TestSigner::new();
        let mut chain = Chain::create(1, &signer, 50.0);
        let mut tx = Transaction::new(signer.address(), "receiver", 1.0, 1.0);
        tx.sign(&signer);
        chain.add_transaction(tx.clone());
        chain.add_transaction(tx);
        assert_eq!(chain.tx_pool.len(), 1);
    }

    #[test]
    fn block_with_wrong_previous_hash_is_rejected() {
        let signer = TestSigner::new();
        let mut chain = Chain::create(1, &signer, 50.0);
        let mut bogus = Block::new(1, "not-the-real-hash", Some(signer.address()), vec![Transaction::coinbase(signer.address(), 50.0, 0.0)]);
        bogus.mine(1);
        bogus.sign(&signer);
        assert!(!chain.add_block_from_peer(bogus));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn replace_with_shorter_chain_is_rejected() {
        let signer = TestSigner::new();
        let mut chain = Chain::create(1, &signer, 50.0);
        chain.add_transaction(Transaction::coinbase("someone", 1.0, 0.0));
        chain.mine_block(&signer, signer.address());
        let shorter = vec![chain.blocks[0].clone()];
        assert!(!chain.replace_with(shorter));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn replace_with_longer_valid_chain_is_accepted() {
        let signer = TestSigner::new();
        let mut local = Chain::create(1, &signer, 50.0);
        let mut remote = Chain::create(1, &signer, 50.0);
        remote.blocks = local.blocks.clone();
        remote.add_transaction(Transaction::coinbase("someone", 1.0, 0.0));
        remote.mine_block(&signer, signer.address());
        remote.add_transaction(Transaction::coinbase("someone-else", 1.0, 0.0));
        remote.mine_block(&signer, signer.address());

        assert!(local.replace_with(remote.blocks.clone()));
        assert_eq!(local.len(), 3);
    }
}
