//! End-to-end coverage across `Transaction`, `Block` and `Chain` together,
//! exercising the scenarios in the wider workspace's consensus
//! documentation rather than any single module in isolation.

use pebblechain_core::block::Block;
use pebblechain_core::chain::Chain;
use pebblechain_core::crypto::{self, Signer};
use pebblechain_core::tx::Transaction;
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
fn genesis_plus_one_transaction_mines_two_entry_block() {
    let miner = TestSigner::new();
    let sender = TestSigner::new();
    let mut chain = Chain::create(1, &miner, 50.0);

    let mut tx = Transaction::new(sender.address(), "bob", 10.0, 1.0);
    tx.sign(&sender);
    chain.add_transaction(tx);

    let mined = chain.mine_block(&miner, miner.address());
    assert!(mined.is_some());
    assert_eq!(chain.len(), 2);

    let head = chain.head();
    assert_eq!(head.transactions.len(), 2);
    assert_eq!(head.transactions[0].tx_number, Some(0));
    assert_eq!(head.transactions[1].tx_number, Some(1));
    assert!(head.transactions[1].is_coinbase());
    assert!(head.hashval.as_deref().unwrap().starts_with('0'));
}

#[test]
fn chain_json_round_trip_preserves_validity() {
    let miner = TestSigner::new();
    let mut chain = Chain::create(1, &miner, 50.0);
    chain.add_transaction(Transaction::coinbase("someone", 1.0, 0.0));
    chain.mine_block(&miner, miner.address());

    let dict = chain.blocks_to_dict();
    let blocks: Vec<Block> = dict
        .as_array()
        .unwrap()
        .iter()
        .cloned()
        .map(Block::from_dict)
        .collect::<Result<_, _>>()
        .unwrap();

    let mut rebuilt = Chain::create(chain.difficulty, &miner, chain.block_reward);
    rebuilt.blocks = blocks;
    assert_eq!(rebuilt.is_valid(), chain.is_valid());
    assert_eq!(rebuilt.len(), chain.len());
}

#[test]
fn tampering_after_mining_is_rejected_on_reimport() {
    let miner = TestSigner::new();
    let mut chain = Chain::create(1, &miner, 50.0);
    chain.add_transaction(Transaction::coinbase("someone", 1.0, 0.0));
    chain.mine_block(&miner, miner.address());

    let mut blocks = chain.blocks.clone();
    blocks[1].transactions[0].amount += 1.0;

    let mut tampered = Chain {
        difficulty: chain.difficulty,
        block_reward: chain.block_reward,
        blocks,
        tx_pool: Vec::new(),
    };
    assert!(!tampered.is_valid());
    assert!(!tampered.blocks[1].verify());

    // A peer offering this tampered block is rejected outright.
    let bogus_head = tampered.blocks.pop().unwrap();
    let mut fresh = Chain::create(1, &miner, 50.0);
    assert!(!fresh.add_block_from_peer(bogus_head));
    assert_eq!(fresh.len(), 1);
}
