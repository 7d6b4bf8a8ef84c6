//! Pending transaction pool.
//!
//! The pool keeps accepted transactions in arrival order until the next
//! block is mined. Validation happens in the ledger before `add`.

use powchain_core::{Address, Hash, Transaction};
use std::collections::HashSet;

/// Ordered pool of transactions waiting to be mined.
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of transactions in the pool.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Check if a transaction with this hash is pending.
    pub fn contains(&self, tx_hash: &Hash) -> bool {
        self.transactions
            .iter()
            .any(|tx| tx.calculate_hash() == *tx_hash)
    }

    /// Append a transaction.
    pub fn add(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Total amount `sender` has already committed to pending transfers.
    pub fn pending_outgoing(&self, sender: &Address) -> f64 {
        self.transactions
            .iter()
            .filter(|tx| tx.from.as_ref() == Some(sender))
            .map(|tx| tx.amount)
            .sum()
    }

    /// Iterate pending transactions in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    /// Borrow all pending transactions in arrival order.
    pub fn as_slice(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Remove and return every pending transaction.
    pub fn take_all(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.transactions)
    }

    /// Clear all transactions from the pool.
    pub fn clear(&mut self) {
        self.transactions.clear();
    }

    /// Get pool statistics.
    pub fn stats(&self) -> MempoolStats {
        let senders: HashSet<&Address> = self
            .transactions
            .iter()
            .filter_map(|tx| tx.from.as_ref())
            .collect();

        MempoolStats {
            total_transactions: self.len(),
            unique_senders: senders.len(),
            total_amount: self.transactions.iter().map(|tx| tx.amount).sum(),
        }
    }
}

/// Pool statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct MempoolStats {
    /// Total number of transactions.
    pub total_transactions: usize,
    /// Number of unique senders.
    pub unique_senders: usize,
    /// Sum of all pending amounts.
    pub total_amount: f64,
}
