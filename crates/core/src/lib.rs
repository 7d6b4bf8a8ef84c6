//! Core proof-of-work ledger primitives for powchain.
//!
//! This crate provides the fundamental types used throughout the ledger:
//! - A from-scratch Keccak sponge hash used for every commitment
//! - Merkle trees over transaction encodings
//! - secp256k1 keys, addresses and recoverable signatures
//! - Transactions
//! - Blocks and proof-of-work mining

pub mod block;
pub mod crypto;
pub mod hash;
pub mod merkle;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use block::{
    current_timestamp, meets_difficulty, Block, BlockError, CancelToken, MiningError,
    GENESIS_HASH, GENESIS_TIMESTAMP,
};
pub use crypto::{Address, CryptoError, Keypair, PublicKey, Signature};
pub use hash::{hash, hash_concat, Hash, H256};
pub use merkle::{merkle_root, verify_proof, MerkleError, MerkleNode, MerkleProof, MerkleTree};
pub use transaction::{Transaction, TransactionError};
