//! Content addressing.
//!
//! Every immutable object in the store (tables, root values, commits) is
//! identified by a [`ContentHash`]: the first 20 bytes of the SHA-256 of a
//! canonical byte encoding produced through [`ContentHasher`]. Equal hashes
//! mean equal content, which is what lets the merge engine skip whole tables
//! and roots without looking at a single row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// ContentHash
// ---------------------------------------------------------------------------

/// A 20-byte content hash.
///
/// Stored as raw bytes for cheap comparison and `Copy` semantics. Displays as
/// 40 lowercase hex characters. The derived ordering is byte-lexicographic,
/// which is also the ordering of the hex strings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 20]);

impl ContentHash {
    /// The zero hash, used as a sentinel for "no object".
    pub const ZERO: Self = Self([0; 20]);

    /// Create a hash from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Return `true` if this is the zero hash.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Hash an arbitrary byte string.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = ContentHasher::new();
        hasher.write_bytes(bytes);
        hasher.finish()
    }

    /// First `n` hex characters, for log lines and short display.
    #[must_use]
    pub fn short(&self, n: usize) -> String {
        let mut s = self.to_string();
        s.truncate(n);
        s
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

impl FromStr for ContentHash {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(StoreError::InvalidHash {
                value: s.to_owned(),
                reason: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        let mut bytes = [0u8; 20];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_digit(chunk[0]).ok_or_else(|| invalid_digit(s, chunk[0]))?;
            let lo = hex_digit(chunk[1]).ok_or_else(|| invalid_digit(s, chunk[1]))?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn invalid_digit(s: &str, b: u8) -> StoreError {
    StoreError::InvalidHash {
        value: s.to_owned(),
        reason: format!("invalid hex digit '{}'", b as char),
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// ContentHasher
// ---------------------------------------------------------------------------

/// Incremental builder for a [`ContentHash`].
///
/// All variable-length writes are length-prefixed so that concatenations of
/// different field splits can never collide (`"ab" + "c"` vs `"a" + "bc"`).
#[derive(Clone, Default)]
pub struct ContentHasher(Sha256);

impl ContentHasher {
    /// Start a new hash.
    #[must_use]
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    /// Write a single tag byte (used to separate variants).
    pub fn write_tag(&mut self, tag: u8) {
        self.0.update([tag]);
    }

    /// Write a fixed-width integer.
    pub fn write_u64(&mut self, v: u64) {
        self.0.update(v.to_be_bytes());
    }

    /// Write a length-prefixed byte string.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_u64(bytes.len() as u64);
        self.0.update(bytes);
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    /// Write another hash.
    pub fn write_hash(&mut self, h: &ContentHash) {
        self.0.update(h.as_bytes());
    }

    /// Finish and truncate the digest to 20 bytes.
    #[must_use]
    pub fn finish(self) -> ContentHash {
        let digest = self.0.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[..20]);
        ContentHash(bytes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
