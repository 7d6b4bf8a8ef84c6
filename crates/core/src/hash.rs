//! Keccak sponge hashing for all ledger commitments.
//!
//! The primitive is the Keccak-f[1600] permutation run as a sponge with a
//! 136-byte rate, a 32-byte output and the `0x06` domain-separation byte,
//! which makes its output identical to SHA3-256.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named alias for a 32-byte(u8) array, used to represent a 256-bit hash.
pub type H256 = [u8; 32];

/// Bytes absorbed per permutation.
pub const RATE: usize = 136;

/// Digest length in bytes.
pub const OUTPUT_LEN: usize = 32;

const LANES: usize = 25;
const ROUNDS: usize = 24;
const DOMAIN_PAD: u8 = 0x06;
const FINAL_PAD: u8 = 0x80;

const ROUND_CONSTANTS: [u64; ROUNDS] = [
    0x0000_0000_0000_0001,
    0x0000_0000_0000_8082,
    0x8000_0000_0000_808a,
    0x8000_0000_8000_8000,
    0x0000_0000_0000_808b,
    0x0000_0000_8000_0001,
    0x8000_0000_8000_8081,
    0x8000_0000_0000_8009,
    0x0000_0000_0000_008a,
    0x0000_0000_0000_0088,
    0x0000_0000_8000_8009,
    0x0000_0000_8000_000a,
    0x0000_0000_8000_808b,
    0x8000_0000_0000_008b,
    0x8000_0000_0000_8089,
    0x8000_0000_0000_8003,
    0x8000_0000_0000_8002,
    0x8000_0000_0000_0080,
    0x0000_0000_0000_800a,
    0x8000_0000_8000_000a,
    0x8000_0000_8000_8081,
    0x8000_0000_0000_8080,
    0x0000_0000_8000_0001,
    0x8000_0000_8000_8008,
];

/// Rotation offsets in rho+pi traversal order.
const RHO: [u32; 24] = [
    1, 3, 6, 10, 15, 21, 28, 36, 45, 55, 2, 14, 27, 41, 56, 8, 25, 43, 62, 18, 39, 61, 20, 44,
];

/// Lane visited at each step of the pi traversal, starting from lane 1.
const PI: [usize; 24] = [
    10, 7, 11, 17, 18, 3, 5, 16, 8, 21, 24, 4, 15, 23, 19, 13, 12, 2, 20, 14, 22, 9, 6, 1,
];

/// Sponge state for a single digest computation.
///
/// Created fresh for every call to [`hash`] and dropped afterwards.
struct HashState {
    lanes: [u64; LANES],
}

impl HashState {
    fn new() -> Self {
        Self { lanes: [0u64; LANES] }
    }

    /// XOR one rate-sized block into the first 17 lanes, then permute.
    fn absorb_block(&mut self, block: &[u8; RATE]) {
        for (lane, chunk) in self.lanes.iter_mut().zip(block.chunks_exact(8)) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            *lane ^= u64::from_le_bytes(word);
        }
        self.permute();
    }

    /// Absorb `data` in full blocks, then a final padded block.
    ///
    /// Padding always gets its own trailing block, so input that is an exact
    /// multiple of the rate (including empty input) absorbs one extra block.
    fn absorb(&mut self, data: &[u8]) {
        let mut chunks = data.chunks_exact(RATE);
        let mut block = [0u8; RATE];
        for chunk in &mut chunks {
            block.copy_from_slice(chunk);
            self.absorb_block(&block);
        }

        let tail = chunks.remainder();
        block = [0u8; RATE];
        block[..tail.len()].copy_from_slice(tail);
        block[tail.len()] ^= DOMAIN_PAD;
        block[RATE - 1] ^= FINAL_PAD;
        self.absorb_block(&block);
    }

    /// Read the digest out of the rate region. The output fits in a single
    /// rate block, so no further permutation is needed.
    fn squeeze(&self) -> H256 {
        let mut out = [0u8; OUTPUT_LEN];
        for (chunk, lane) in out.chunks_exact_mut(8).zip(self.lanes.iter()) {
            chunk.copy_from_slice(&lane.to_le_bytes());
        }
        out
    }

    fn permute(&mut self) {
        let a = &mut self.lanes;
        for round_constant in ROUND_CONSTANTS {
            // theta
            let mut parity = [0u64; 5];
            for (x, p) in parity.iter_mut().enumerate() {
                *p = a[x] ^ a[x + 5] ^ a[x + 10] ^ a[x + 15] ^ a[x + 20];
            }
            for x in 0..5 {
                let d = parity[(x + 4) % 5] ^ parity[(x + 1) % 5].rotate_left(1);
                for y in (0..LANES).step_by(5) {
                    a[y + x] ^= d;
                }
            }

            // rho + pi
            let mut carried = a[1];
            for (&lane, &rotation) in PI.iter().zip(RHO.iter()) {
                let next = a[lane];
                a[lane] = carried.rotate_left(rotation);
                carried = next;
            }

            // chi
            for y in (0..LANES).step_by(5) {
                let mut row = [0u64; 5];
                row.copy_from_slice(&a[y..y + 5]);
                for x in 0..5 {
                    a[y + x] = row[x] ^ (!row[(x + 1) % 5] & row[(x + 2) % 5]);
                }
            }

            // iota
            a[0] ^= round_constant;
        }
    }
}

/// A wrapper type for H256 with Display and Debug formatting.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash(pub H256);

impl Hash {
    /// The zero hash (all zeros).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a new Hash from raw bytes.
    pub fn from_bytes(bytes: H256) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &H256 {
        &self.0
    }

    /// Convert to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string (with or without 0x prefix).
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash(0x{})", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<H256> for Hash {
    fn from(bytes: H256) -> Self {
        Self(bytes)
    }
}

impl From<Hash> for H256 {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Hash arbitrary data.
pub fn hash(data: &[u8]) -> Hash {
    let mut state = HashState::new();
    state.absorb(data);
    Hash(state.squeeze())
}

/// Hash multiple pieces of data by concatenating them.
pub fn hash_concat(parts: &[&[u8]]) -> Hash {
    hash(&parts.concat())
}
