//! secp256k1 primitives for signing, verification and public-key recovery.

use crate::hash::{hash, Hash};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{All, Message, PublicKey as SecpPublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Shared signing/verification context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Number of trailing hash bytes kept as the address.
pub const ADDRESS_LEN: usize = 20;

/// Length of a recoverable signature: `r || s || recovery_id`.
pub const SIGNATURE_LEN: usize = 65;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("public key recovery failed")]
    RecoveryFailed,
    #[error("signature verification failed")]
    VerificationFailed,
}

/// An address on the ledger.
///
/// Addresses cross the boundary as plain strings. Those derived from a key
/// are `0x` followed by the lowercase hex of the last 20 bytes of the hash of
/// the uncompressed public key.
#[derive(Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wrap an address string as supplied by a caller.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Get the address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the address string is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A recoverable ECDSA signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_LEN]);

mod signature_serde {
    use super::SIGNATURE_LEN;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; SIGNATURE_LEN], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; SIGNATURE_LEN], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != SIGNATURE_LEN {
            return Err(serde::de::Error::custom("signature must be 65 bytes"));
        }
        let mut arr = [0u8; SIGNATURE_LEN];
        arr.copy_from_slice(&bytes);
        Ok(arr)
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        signature_serde::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Signature(signature_serde::deserialize(deserializer)?))
    }
}

impl Signature {
    /// Create a signature from raw bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    /// Convert to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string (with or without 0x prefix).
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidSignature)?;
        let arr: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature)?;
        Ok(Self(arr))
    }

    fn decode(&self) -> Result<RecoverableSignature, CryptoError> {
        let recovery_id = RecoveryId::from_i32(i32::from(self.0[64]))
            .map_err(|_| CryptoError::InvalidSignature)?;
        RecoverableSignature::from_compact(&self.0[..64], recovery_id)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// Recover the public key that produced this signature over `hash`.
    pub fn recover(&self, hash: &Hash) -> Result<PublicKey, CryptoError> {
        let signature = self.decode()?;
        let message = Message::from_digest(hash.0);
        SECP256K1_CONTEXT
            .recover_ecdsa(&message, &signature)
            .map(PublicKey)
            .map_err(|_| CryptoError::RecoveryFailed)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// A public key for signature verification.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "public_key_serde")] pub SecpPublicKey);

mod public_key_serde {
    use secp256k1::PublicKey;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(key: &PublicKey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(key.serialize()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<PublicKey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        PublicKey::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

impl PublicKey {
    /// Parse a compressed or uncompressed SEC1 encoding.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        SecpPublicKey::from_slice(bytes)
            .map(PublicKey)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Derive the address from this public key.
    /// The 0x04 tag of the uncompressed encoding is not hashed.
    pub fn to_address(&self) -> Address {
        let uncompressed = self.0.serialize_uncompressed();
        let digest = hash(&uncompressed[1..]);
        Address(format!(
            "0x{}",
            hex::encode(&digest.0[digest.0.len() - ADDRESS_LEN..])
        ))
    }

    /// Get the uncompressed (65-byte) encoding of the public key.
    pub fn to_uncompressed(&self) -> [u8; 65] {
        self.0.serialize_uncompressed()
    }

    /// Hex of the compressed (33-byte) encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.serialize())
    }

    /// Verify a signature over `hash` against this public key.
    pub fn verify(&self, hash: &Hash, signature: &Signature) -> Result<(), CryptoError> {
        let signature = signature.decode()?.to_standard();
        let message = Message::from_digest(hash.0);
        SECP256K1_CONTEXT
            .verify_ecdsa(&message, &signature, &self.0)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0.serialize()[..8]))
    }
}

/// A keypair for signing and verification.
pub struct Keypair {
    secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey(SecpPublicKey::from_secret_key(
            &SECP256K1_CONTEXT,
            &secret_key,
        ));
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a keypair from a private key (32 bytes).
    pub fn from_private_key(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret_key =
            SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Create a keypair from a hex-encoded private key (with or without 0x prefix).
    pub fn from_private_key_hex(s: &str) -> Result<Self, CryptoError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        Self::from_private_key(&arr)
    }

    /// Get the private key bytes.
    pub fn private_key(&self) -> [u8; 32] {
        self.secret_key.secret_bytes()
    }

    /// Get the private key as hex.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.private_key())
    }

    /// Get the address derived from the public key.
    pub fn address(&self) -> Address {
        self.public_key.to_address()
    }

    /// Sign a hash directly, producing a recoverable signature.
    pub fn sign_hash(&self, hash: &Hash) -> Signature {
        let message = Message::from_digest(hash.0);
        let signature = SECP256K1_CONTEXT.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes[..64].copy_from_slice(&compact);
        bytes[64] = recovery_id.to_i32() as u8;
        Signature(bytes)
    }

    /// Verify a signature against our public key.
    pub fn verify(&self, hash: &Hash, signature: &Signature) -> Result<(), CryptoError> {
        self.public_key.verify(hash, signature)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let kp = Keypair::generate();
        let addr = kp.address();
        assert!(addr.as_str().starts_with("0x"));
        assert_eq!(addr.as_str().len(), 2 + ADDRESS_LEN * 2);
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = Keypair::generate();
        let digest = hash(b"hello world");
        let sig = kp.sign_hash(&digest);
        assert!(kp.verify(&digest, &sig).is_ok());
    }

    #[test]
    fn test_recover_public_key() {
        let kp = Keypair::generate();
        let digest = hash(b"recover me");
        let sig = kp.sign_hash(&digest);

        let recovered = sig.recover(&digest).unwrap();
        assert_eq!(recovered, kp.public_key);
        assert_eq!(recovered.to_address(), kp.address());
    }

    #[test]
    fn test_wrong_message_fails() {
        let kp = Keypair::generate();
        let sig = kp.sign_hash(&hash(b"hello"));
        assert_eq!(
            kp.verify(&hash(b"world"), &sig),
            Err(CryptoError::VerificationFailed)
        );
    }

    #[test]
    fn test_wrong_message_recovers_other_key() {
        let kp = Keypair::generate();
        let sig = kp.sign_hash(&hash(b"hello"));
        match sig.recover(&hash(b"world")) {
            Ok(key) => assert_ne!(key, kp.public_key),
            Err(err) => assert_eq!(err, CryptoError::RecoveryFailed),
        }
    }

    #[test]
    fn test_wrong_key_fails() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        let digest = hash(b"hello");
        let sig = kp1.sign_hash(&digest);
        assert!(kp2.verify(&digest, &sig).is_err());
    }

    #[test]
    fn test_invalid_recovery_id() {
        let kp = Keypair::generate();
        let digest = hash(b"hello");
        let mut sig = kp.sign_hash(&digest);
        sig.0[64] = 7;
        assert_eq!(sig.recover(&digest), Err(CryptoError::InvalidSignature));
    }

    #[test]
    fn test_signature_hex_roundtrip() {
        let kp = Keypair::generate();
        let sig = kp.sign_hash(&hash(b"hex"));
        let parsed = Signature::from_hex(&sig.to_string()).unwrap();
        assert_eq!(sig, parsed);
        assert_eq!(
            Signature::from_hex("abcd"),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn test_keypair_from_private_key() {
        let kp1 = Keypair::generate();
        let private_key = kp1.private_key();
        let kp2 = Keypair::from_private_key(&private_key).unwrap();
        assert_eq!(kp1.address(), kp2.address());
    }

    #[test]
    fn test_keypair_from_private_key_hex() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::from_private_key_hex(&kp1.private_key_hex()).unwrap();
        assert_eq!(kp1.public_key, kp2.public_key);

        assert!(matches!(
            Keypair::from_private_key_hex("not hex"),
            Err(CryptoError::InvalidPrivateKey)
        ));
        assert!(matches!(
            Keypair::from_private_key_hex(&"00".repeat(32)),
            Err(CryptoError::InvalidPrivateKey)
        ));
    }

    #[test]
    fn test_known_address_derivation() {
        // Private key 1 maps to the generator point G.
        let mut sk = [0u8; 32];
        sk[31] = 1;
        let kp = Keypair::from_private_key(&sk).unwrap();
        let uncompressed = kp.public_key.to_uncompressed();
        assert_eq!(uncompressed[0], 0x04);
        assert_eq!(
            kp.public_key.to_hex(),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );

        let digest = hash(&uncompressed[1..]);
        let expected = format!("0x{}", hex::encode(&digest.0[12..]));
        assert_eq!(kp.address().as_str(), expected);
    }

    #[test]
    fn test_public_key_serde_roundtrip() {
        let kp = Keypair::generate();
        let json = serde_json::to_string(&kp.public_key).unwrap();
        let parsed: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, kp.public_key);
    }
}
