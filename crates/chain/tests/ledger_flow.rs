//! End-to-end ledger flow: mine, transfer, settle, validate, tamper.

use powchain_chain::{Blockchain, BlockchainConfig, BlockchainError};
use powchain_core::{Address, Hash, Keypair, Transaction};

fn setup() -> (Blockchain, Keypair, Keypair, Address) {
    let blockchain = Blockchain::new();
    let alice = Keypair::generate();
    let bob = Keypair::generate();
    let miner = Keypair::generate().address();
    (blockchain, alice, bob, miner)
}

#[test]
fn transfer_settles_after_mining() {
    let (mut blockchain, alice, bob, miner) = setup();

    blockchain
        .mine_pending_transactions(&alice.address())
        .unwrap();
    assert_eq!(blockchain.balance_of(&alice.address()), 100.0);

    let tx = Transaction::new(alice.address(), bob.address(), 30.0)
        .signed(&alice)
        .unwrap();
    blockchain.add_transaction(tx).unwrap();
    blockchain.mine_pending_transactions(&miner).unwrap();

    assert_eq!(blockchain.balance_of(&alice.address()), 100.0 - 30.0);
    assert_eq!(blockchain.balance_of(&bob.address()), 30.0);
    assert_eq!(blockchain.balance_of(&miner), 100.0);
    assert_eq!(blockchain.height(), 2);
    assert!(blockchain.pending_transactions().is_empty());
    assert!(blockchain.is_chain_valid());
}

#[test]
fn mined_hashes_meet_default_difficulty() {
    let (mut blockchain, alice, _, _) = setup();
    blockchain
        .mine_pending_transactions(&alice.address())
        .unwrap();
    blockchain
        .mine_pending_transactions(&alice.address())
        .unwrap();

    for block in &blockchain.chain()[1..] {
        assert!(block.hash.to_hex().starts_with("00"));
        assert_eq!(block.hash, block.calculate_hash());
    }
}

#[test]
fn tampering_any_block_hash_is_detected() {
    let (mut blockchain, alice, bob, miner) = setup();
    blockchain
        .mine_pending_transactions(&alice.address())
        .unwrap();
    let tx = Transaction::new(alice.address(), bob.address(), 30.0)
        .signed(&alice)
        .unwrap();
    blockchain.add_transaction(tx).unwrap();
    blockchain.mine_pending_transactions(&miner).unwrap();
    assert!(blockchain.is_chain_valid());

    for height in 1..blockchain.chain().len() {
        let mut blocks = blockchain.chain().to_vec();
        blocks[height].hash = Hash::from_bytes([0xab; 32]);

        let tampered = Blockchain::from_blocks(blocks, blockchain.config().clone()).unwrap();
        assert!(!tampered.is_chain_valid(), "tampered block {height} accepted");
    }

    // The ledger the copies came from is untouched.
    assert!(blockchain.is_chain_valid());
}

#[test]
fn tampered_transfer_amount_is_detected() {
    let (mut blockchain, alice, bob, miner) = setup();
    blockchain
        .mine_pending_transactions(&alice.address())
        .unwrap();
    let tx = Transaction::new(alice.address(), bob.address(), 30.0)
        .signed(&alice)
        .unwrap();
    blockchain.add_transaction(tx).unwrap();
    blockchain.mine_pending_transactions(&miner).unwrap();

    let mut blocks = blockchain.chain().to_vec();
    blocks[2].transactions[0].amount = 3.0;
    let tampered = Blockchain::from_blocks(blocks, blockchain.config().clone()).unwrap();
    assert!(!tampered.is_chain_valid());
}

#[test]
fn overspend_leaves_pending_pool_unchanged() {
    let (mut blockchain, alice, bob, _) = setup();
    blockchain
        .mine_pending_transactions(&alice.address())
        .unwrap();

    let ok = Transaction::new(alice.address(), bob.address(), 10.0)
        .signed(&alice)
        .unwrap();
    blockchain.add_transaction(ok).unwrap();
    let before = blockchain.pending_transactions().to_vec();

    let too_much = Transaction::new(alice.address(), bob.address(), 500.0)
        .signed(&alice)
        .unwrap();
    let err = blockchain.add_transaction(too_much).unwrap_err();

    assert!(matches!(err, BlockchainError::InsufficientFunds { .. }));
    assert_eq!(blockchain.pending_transactions(), before.as_slice());
}

#[test]
fn unfunded_sender_is_rejected() {
    let (mut blockchain, alice, bob, _) = setup();
    let tx = Transaction::new(alice.address(), bob.address(), 1.0)
        .signed(&alice)
        .unwrap();

    assert_eq!(
        blockchain.add_transaction(tx),
        Err(BlockchainError::InsufficientFunds {
            required: 1.0,
            available: 0.0
        })
    );
}

#[test]
fn custom_config_controls_reward() {
    let mut blockchain = Blockchain::with_config(BlockchainConfig {
        difficulty: 1,
        mining_reward: 12.5,
    });
    let miner = Address::new("0xminer");

    blockchain.mine_pending_transactions(&miner).unwrap();
    blockchain.mine_pending_transactions(&miner).unwrap();

    assert_eq!(blockchain.balance_of(&miner), 25.0);
    assert_eq!(blockchain.stats().total_transactions, 2);
    assert!(blockchain.is_chain_valid());
}

#[test]
fn committed_transfer_has_merkle_proof() {
    let (mut blockchain, alice, bob, miner) = setup();
    blockchain
        .mine_pending_transactions(&alice.address())
        .unwrap();
    let tx = Transaction::new(alice.address(), bob.address(), 30.0)
        .signed(&alice)
        .unwrap();
    blockchain.add_transaction(tx.clone()).unwrap();
    let block = blockchain.mine_pending_transactions(&miner).unwrap().clone();

    let root = block.merkle_root.unwrap();
    let proof = block.transaction_proof(0).unwrap();
    assert_eq!(proof.leaf, tx.encode());
    assert!(powchain_core::verify_proof(&root, &proof));
}
