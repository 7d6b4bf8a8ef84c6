//! Ledger orchestration for powchain.
//!
//! This crate ties the core primitives into a working ledger:
//! - **Blockchain**: the chain, mining of pending transactions, balances and validation
//! - **Mempool**: ordered pool of accepted transactions waiting for a block
//!
//! # Example
//!
//! ```rust,no_run
//! use powchain_chain::Blockchain;
//! use powchain_core::{Keypair, Transaction};
//!
//! let alice = Keypair::generate();
//! let bob = Keypair::generate();
//!
//! let mut blockchain = Blockchain::new();
//! blockchain.mine_pending_transactions(&alice.address()).unwrap();
//!
//! let tx = Transaction::new(alice.address(), bob.address(), 30.0)
//!     .signed(&alice)
//!     .unwrap();
//! blockchain.add_transaction(tx).unwrap();
//! blockchain.mine_pending_transactions(&alice.address()).unwrap();
//!
//! assert_eq!(blockchain.balance_of(&bob.address()), 30.0);
//! assert!(blockchain.is_chain_valid());
//! ```

pub mod blockchain;
pub mod mempool;

pub use blockchain::{Blockchain, BlockchainConfig, BlockchainError, BlockchainStats};
pub use mempool::{Mempool, MempoolStats};
