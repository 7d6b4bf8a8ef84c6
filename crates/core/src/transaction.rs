//! Transaction types and signing.

use crate::block::current_timestamp;
use crate::crypto::{Address, CryptoError, Keypair, Signature};
use crate::hash::{hash, Hash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sender marker written into the canonical encoding of a coinbase.
pub const COINBASE_SENDER: &str = "0";

/// Errors that can occur during transaction operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("signature error: {0}")]
    Signature(#[from] CryptoError),
    #[error("cannot sign transactions for other wallets (sender {sender}, signer {signer})")]
    ForeignSigner { sender: Address, signer: Address },
    #[error("coinbase transactions are not signed")]
    CoinbaseNotSigned,
    #[error("transaction is already signed")]
    AlreadySigned,
}

/// A value transfer on the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's address (None for a coinbase reward).
    pub from: Option<Address>,
    /// Recipient's address.
    pub to: Address,
    /// Value to transfer.
    pub amount: f64,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Recoverable signature over [`Transaction::calculate_hash`].
    pub signature: Option<Signature>,
}

impl Transaction {
    /// Create a new unsigned transfer stamped with the current time.
    pub fn new(from: Address, to: Address, amount: f64) -> Self {
        Self::with_timestamp(Some(from), to, amount, current_timestamp())
    }

    /// Create an unsigned transaction with an explicit timestamp.
    pub fn with_timestamp(from: Option<Address>, to: Address, amount: f64, timestamp: u64) -> Self {
        Self {
            from,
            to,
            amount,
            timestamp,
            signature: None,
        }
    }

    /// Create a reward transaction with no sender.
    pub fn coinbase(to: Address, amount: f64) -> Self {
        Self::with_timestamp(None, to, amount, current_timestamp())
    }

    /// Whether this transaction mints value rather than moving it.
    pub fn is_coinbase(&self) -> bool {
        self.from.is_none()
    }

    /// Canonical byte encoding: `sender || recipient || amount || timestamp`.
    ///
    /// This is the signed pre-image. Field order and number formatting are
    /// frozen; changing either invalidates every existing signature.
    pub fn encode(&self) -> Vec<u8> {
        let sender = self
            .from
            .as_ref()
            .map(Address::as_str)
            .unwrap_or(COINBASE_SENDER);
        format!("{}{}{}{}", sender, self.to, self.amount, self.timestamp).into_bytes()
    }

    /// Hash of the canonical encoding.
    pub fn calculate_hash(&self) -> Hash {
        hash(&self.encode())
    }

    /// Sign the transaction with the sender's keypair.
    pub fn sign(&mut self, keypair: &Keypair) -> Result<(), TransactionError> {
        let sender = self.from.as_ref().ok_or(TransactionError::CoinbaseNotSigned)?;
        if self.signature.is_some() {
            return Err(TransactionError::AlreadySigned);
        }

        let signer = keypair.address();
        if *sender != signer {
            return Err(TransactionError::ForeignSigner {
                sender: sender.clone(),
                signer,
            });
        }

        self.signature = Some(keypair.sign_hash(&self.calculate_hash()));
        Ok(())
    }

    /// Sign with a hex-encoded private key supplied by a wallet.
    pub fn sign_with_private_key_hex(&mut self, private_key: &str) -> Result<(), TransactionError> {
        let keypair = Keypair::from_private_key_hex(private_key)?;
        self.sign(&keypair)
    }

    /// Create a signed transaction.
    pub fn signed(mut self, keypair: &Keypair) -> Result<Self, TransactionError> {
        self.sign(keypair)?;
        Ok(self)
    }

    /// Check the signature against the claimed sender.
    ///
    /// The signer's key is recovered from the signature, its address compared
    /// to `from`, and only then is the signature verified against that key.
    /// Any failure along the way yields `false`. A coinbase is always valid.
    pub fn is_valid(&self) -> bool {
        let Some(sender) = &self.from else {
            return true;
        };
        let Some(signature) = &self.signature else {
            return false;
        };

        let digest = self.calculate_hash();
        let Ok(public_key) = signature.recover(&digest) else {
            return false;
        };
        if public_key.to_address() != *sender {
            return false;
        }

        public_key.verify(&digest, signature).is_ok()
    }
}
