//! Blocks, proof-of-work hashing and mining.

use crate::hash::{hash_concat, Hash};
use crate::merkle::{MerkleError, MerkleProof, MerkleTree};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info};

/// 2023-01-01T00:00:00Z.
pub const GENESIS_TIMESTAMP: u64 = 1_672_531_200;

/// Sentinel hash carried by the genesis block. Genesis is never mined.
pub const GENESIS_HASH: Hash = Hash::ZERO;

/// Nonces tried between cancellation/deadline checks.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Errors that can occur while constructing a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("merkle error: {0}")]
    Merkle(#[from] MerkleError),
}

/// Reasons a bounded nonce search stopped without a solution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiningError {
    #[error("mining cancelled after nonce {nonce}")]
    Cancelled { nonce: u64 },
    #[error("mining deadline passed at nonce {nonce}")]
    DeadlineExceeded { nonce: u64 },
    #[error("the genesis block is not mined")]
    Genesis,
}

/// Get the current Unix timestamp.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs()
}

/// Whether the hex form of `hash` starts with at least `difficulty` zeros.
pub fn meets_difficulty(hash: &Hash, difficulty: usize) -> bool {
    hash.to_hex().bytes().take_while(|&c| c == b'0').count() >= difficulty
}

/// Proof-of-work hash over the decimal nonce followed by the commitment.
pub fn proof_of_work_hash(nonce: u64, merkle_root: &Hash) -> Hash {
    hash_concat(&[nonce.to_string().as_bytes(), merkle_root.as_ref()])
}

enum StopReason {
    Cancelled,
    Deadline,
}

/// Shared flag used to stop a running nonce search from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that any search holding this token stops.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A timestamped batch of transactions secured by proof of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Transactions committed by this block.
    pub transactions: Vec<Transaction>,
    /// Hash of the previous block; `None` marks the genesis block.
    pub previous_hash: Option<Hash>,
    /// Merkle root over the transactions' canonical encodings.
    pub merkle_root: Option<Hash>,
    /// Proof-of-work hash.
    pub hash: Hash,
    /// Nonce found by mining.
    pub nonce: u64,
}

impl Block {
    /// Create a new block. A block without a parent is constructed inert:
    /// no commitment and the sentinel hash.
    pub fn new(
        timestamp: u64,
        transactions: Vec<Transaction>,
        previous_hash: Option<Hash>,
    ) -> Result<Self, BlockError> {
        if previous_hash.is_none() {
            return Ok(Self {
                timestamp,
                transactions,
                previous_hash: None,
                merkle_root: None,
                hash: GENESIS_HASH,
                nonce: 0,
            });
        }

        let tree = MerkleTree::new(transactions.iter().map(Transaction::encode))?;
        let merkle_root = tree.root();

        Ok(Self {
            timestamp,
            transactions,
            previous_hash,
            merkle_root: Some(merkle_root),
            hash: proof_of_work_hash(0, &merkle_root),
            nonce: 0,
        })
    }

    /// Create the genesis block.
    pub fn genesis() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            transactions: Vec::new(),
            previous_hash: None,
            merkle_root: None,
            hash: GENESIS_HASH,
            nonce: 0,
        }
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_none()
    }

    /// Get the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Recompute the hash from the nonce and stored commitment.
    /// Does not touch the stored hash.
    pub fn calculate_hash(&self) -> Hash {
        match &self.merkle_root {
            Some(root) => proof_of_work_hash(self.nonce, root),
            None => GENESIS_HASH,
        }
    }

    /// Search nonces until the hash meets `difficulty`. Unbounded.
    pub fn mine(&mut self, difficulty: usize) {
        if self.search(difficulty, || None).is_err() {
            debug!("genesis block left unmined");
        }
    }

    /// Search nonces until the hash meets `difficulty`, giving up when
    /// `cancel` fires or `deadline` passes. On failure the block keeps the
    /// last nonce tried and must not be appended.
    pub fn mine_until(
        &mut self,
        difficulty: usize,
        cancel: &CancelToken,
        deadline: Option<Instant>,
    ) -> Result<(), MiningError> {
        self.search(difficulty, || {
            if cancel.is_cancelled() {
                Some(StopReason::Cancelled)
            } else if deadline.is_some_and(|d| Instant::now() >= d) {
                Some(StopReason::Deadline)
            } else {
                None
            }
        })
    }

    fn search<F>(&mut self, difficulty: usize, mut should_stop: F) -> Result<(), MiningError>
    where
        F: FnMut() -> Option<StopReason>,
    {
        let merkle_root = self.merkle_root.ok_or(MiningError::Genesis)?;
        let started = Instant::now();
        let mut attempts: u64 = 0;

        debug!(difficulty, tx_count = self.tx_count(), "mining block");

        while !meets_difficulty(&self.hash, difficulty) {
            if attempts % CANCEL_CHECK_INTERVAL == 0 {
                if let Some(reason) = should_stop() {
                    let nonce = self.nonce;
                    return Err(match reason {
                        StopReason::Cancelled => MiningError::Cancelled { nonce },
                        StopReason::Deadline => MiningError::DeadlineExceeded { nonce },
                    });
                }
            }
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = proof_of_work_hash(self.nonce, &merkle_root);
            attempts += 1;
        }

        info!(
            nonce = self.nonce,
            hash = %self.hash,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "mined block"
        );
        Ok(())
    }

    /// True iff every transaction validates.
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions.iter().all(Transaction::is_valid)
    }

    /// Verify the stored merkle root matches the transactions.
    pub fn verify_merkle_root(&self) -> bool {
        match &self.merkle_root {
            Some(stored) => self
                .merkle_tree()
                .is_some_and(|tree| tree.root() == *stored),
            None => self.transactions.is_empty(),
        }
    }

    fn merkle_tree(&self) -> Option<MerkleTree> {
        MerkleTree::new(self.transactions.iter().map(Transaction::encode)).ok()
    }

    /// Sibling-path proof that the transaction at `index` is committed.
    pub fn transaction_proof(&self, index: usize) -> Option<MerkleProof> {
        self.merkle_tree()?.proof(index)
    }

    /// Heuristic membership check against the block's merkle tree.
    /// See [`MerkleTree::contains`] for why a `false` is not conclusive.
    pub fn includes(&self, tx: &Transaction) -> bool {
        self.merkle_tree()
            .is_some_and(|tree| tree.contains(&tx.encode()))
    }
}
