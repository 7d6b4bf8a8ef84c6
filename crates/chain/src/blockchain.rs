//! Main ledger orchestration.
//!
//! The ledger owns the chain and the pending pool. Blocks are only ever
//! created by mining the pending pool, and balances are derived by replaying
//! the chain; nothing else is stored.

use crate::mempool::Mempool;
use powchain_core::{
    current_timestamp, meets_difficulty, Address, Block, BlockError, CancelToken, Hash,
    MiningError, Transaction,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockchainError {
    #[error("transaction must include sender and recipient addresses")]
    InvalidEndpoints,

    #[error("cannot add invalid transaction to the chain")]
    InvalidSignature,

    #[error("transaction amount must be positive (got {0})")]
    InvalidAmount(f64),

    #[error("insufficient funds (required {required}, available {available})")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("pending transactions exceed balance (pending {pending}, amount {amount}, available {available})")]
    PendingExceedsBalance {
        pending: f64,
        amount: f64,
        available: f64,
    },

    #[error("a chain needs at least the genesis block")]
    EmptyChain,

    #[error("block error: {0}")]
    Block(#[from] BlockError),

    #[error("mining error: {0}")]
    Mining(#[from] MiningError),
}

pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockchainConfig {
    /// Leading hex zeros required of every mined block hash.
    pub difficulty: usize,
    /// Amount credited by each coinbase.
    pub mining_reward: f64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            difficulty: 2,
            mining_reward: 100.0,
        }
    }
}

/// Proof-of-work ledger.
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// Blocks in order; index 0 is always genesis.
    chain: Vec<Block>,
    /// Accepted transactions waiting for the next block.
    mempool: Mempool,
    config: BlockchainConfig,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Create a ledger holding only the genesis block, with default settings.
    pub fn new() -> Self {
        Self::with_config(BlockchainConfig::default())
    }

    /// Create a ledger holding only the genesis block.
    pub fn with_config(config: BlockchainConfig) -> Self {
        Self {
            chain: vec![Block::genesis()],
            mempool: Mempool::new(),
            config,
        }
    }

    /// Rebuild a ledger around blocks produced elsewhere, for example a
    /// chain read back from JSON. The blocks are not checked; call
    /// [`Blockchain::is_chain_valid`] before trusting them.
    pub fn from_blocks(blocks: Vec<Block>, config: BlockchainConfig) -> Result<Self> {
        if blocks.is_empty() {
            return Err(BlockchainError::EmptyChain);
        }
        Ok(Self {
            chain: blocks,
            mempool: Mempool::new(),
            config,
        })
    }

    /// All blocks, genesis first.
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }

    /// Get the current chain height (genesis is height 0).
    pub fn height(&self) -> u64 {
        (self.chain.len() - 1) as u64
    }

    /// Get the latest block.
    pub fn latest_block(&self) -> &Block {
        // The chain always holds at least the genesis block.
        &self.chain[self.chain.len() - 1]
    }

    /// Get pending transactions in arrival order.
    pub fn pending_transactions(&self) -> &[Transaction] {
        self.mempool.as_slice()
    }

    /// Replay the chain and sum everything sent to and from `address`.
    pub fn balance_of(&self, address: &Address) -> f64 {
        self.chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .fold(0.0, |balance, tx| {
                let mut balance = balance;
                if tx.from.as_ref() == Some(address) {
                    balance -= tx.amount;
                }
                if tx.to == *address {
                    balance += tx.amount;
                }
                balance
            })
    }

    /// Validate a transaction and queue it for the next block.
    ///
    /// On error the pending pool is left untouched.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<()> {
        if let Err(e) = self.validate_transaction(&tx) {
            warn!(error = %e, to = %tx.to, amount = tx.amount, "rejected transaction");
            return Err(e);
        }

        debug!(
            hash = %tx.calculate_hash(),
            to = %tx.to,
            amount = tx.amount,
            "accepted transaction"
        );
        self.mempool.add(tx);
        Ok(())
    }

    fn validate_transaction(&self, tx: &Transaction) -> Result<()> {
        let sender = match &tx.from {
            Some(sender) if !sender.is_empty() && !tx.to.is_empty() => sender,
            _ => return Err(BlockchainError::InvalidEndpoints),
        };

        if !tx.is_valid() {
            return Err(BlockchainError::InvalidSignature);
        }

        if tx.amount.is_nan() || tx.amount <= 0.0 {
            return Err(BlockchainError::InvalidAmount(tx.amount));
        }

        let available = self.balance_of(sender);
        if available < tx.amount {
            return Err(BlockchainError::InsufficientFunds {
                required: tx.amount,
                available,
            });
        }

        let pending = self.mempool.pending_outgoing(sender);
        if pending + tx.amount > available {
            return Err(BlockchainError::PendingExceedsBalance {
                pending,
                amount: tx.amount,
                available,
            });
        }

        Ok(())
    }

    /// Mine every pending transaction plus a coinbase paying `reward_address`
    /// into a new block and append it. Blocks until a nonce is found.
    pub fn mine_pending_transactions(&mut self, reward_address: &Address) -> Result<&Block> {
        let mut block = self.candidate_block(reward_address)?;
        block.mine(self.config.difficulty);
        Ok(self.append(block))
    }

    /// Like [`Blockchain::mine_pending_transactions`], but gives up when
    /// `cancel` fires or `deadline` passes. A search that gives up leaves the
    /// chain and the pending pool exactly as they were.
    pub fn mine_pending_transactions_until(
        &mut self,
        reward_address: &Address,
        cancel: &CancelToken,
        deadline: Option<Instant>,
    ) -> Result<&Block> {
        let mut block = self.candidate_block(reward_address)?;
        if let Err(e) = block.mine_until(self.config.difficulty, cancel, deadline) {
            warn!(error = %e, pending = self.mempool.len(), "mining stopped");
            return Err(e.into());
        }
        Ok(self.append(block))
    }

    /// Pending transactions followed by the coinbase, linked to the tip.
    fn candidate_block(&self, reward_address: &Address) -> Result<Block> {
        let mut transactions = self.mempool.as_slice().to_vec();
        transactions.push(Transaction::coinbase(
            reward_address.clone(),
            self.config.mining_reward,
        ));

        Ok(Block::new(
            current_timestamp(),
            transactions,
            Some(self.latest_block().hash),
        )?)
    }

    fn append(&mut self, block: Block) -> &Block {
        info!(
            height = self.chain.len(),
            hash = %block.hash,
            nonce = block.nonce,
            tx_count = block.tx_count(),
            "appended block"
        );
        self.chain.push(block);
        self.mempool.clear();
        self.latest_block()
    }

    /// Check the whole chain: genesis, every stored hash, every link, every
    /// transaction, every commitment and every proof of work.
    pub fn is_chain_valid(&self) -> bool {
        match self.chain.first() {
            Some(first) if *first == Block::genesis() => {}
            _ => {
                warn!("genesis block mismatch");
                return false;
            }
        }

        for (index, pair) in self.chain.windows(2).enumerate() {
            let (previous, block) = (&pair[0], &pair[1]);
            let height = index + 1;

            if block.hash != block.calculate_hash() {
                warn!(height, "stored hash does not match contents");
                return false;
            }
            if block.previous_hash != Some(previous.hash) {
                warn!(height, "block does not link to its predecessor");
                return false;
            }
            if !block.has_valid_transactions() {
                warn!(height, "block carries an invalid transaction");
                return false;
            }
            if !block.verify_merkle_root() {
                warn!(height, "merkle root does not match transactions");
                return false;
            }
            if !meets_difficulty(&block.hash, self.config.difficulty) {
                warn!(height, "block hash misses the difficulty target");
                return false;
            }
        }

        true
    }

    /// Get ledger statistics.
    pub fn stats(&self) -> BlockchainStats {
        let latest = self.latest_block();
        BlockchainStats {
            height: self.height(),
            latest_block_hash: latest.hash,
            latest_timestamp: latest.timestamp,
            pending_transactions: self.mempool.len(),
            total_transactions: self.chain.iter().map(Block::tx_count).sum(),
            difficulty: self.config.difficulty,
        }
    }
}

/// Ledger statistics.
#[derive(Debug, Clone, Serialize)]
pub struct BlockchainStats {
    /// Current chain height.
    pub height: u64,
    /// Hash of the latest block.
    pub latest_block_hash: Hash,
    /// Timestamp of the latest block.
    pub latest_timestamp: u64,
    /// Number of pending transactions.
    pub pending_transactions: usize,
    /// Transactions committed across all blocks.
    pub total_transactions: usize,
    /// Configured difficulty.
    pub difficulty: usize,
}
