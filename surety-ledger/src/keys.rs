//! Deterministic trip-key derivation
//!
//! A trip's key is a pure function of `(carrier, name, scheduled time)`:
//! re-deriving it from the same inputs always yields the same 32-byte key,
//! so callers can address a trip without ever holding a reference to it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::types::Identity;

/// Collision-resistant composite key for a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripKey([u8; 32]);

impl TripKey {
    /// Derive the key for `(carrier, name, scheduled_at_ms)`.
    ///
    /// Fields are length-prefixed before hashing so that e.g.
    /// `("ab", "c")` and `("a", "bc")` cannot collide.
    pub fn derive(carrier: &Identity, name: &str, scheduled_at_ms: i64) -> Self {
        let mut hasher = Sha256::new();

        let carrier_bytes = carrier.as_bytes();
        hasher.update((carrier_bytes.len() as u64).to_be_bytes());
        hasher.update(carrier_bytes);

        hasher.update((name.len() as u64).to_be_bytes());
        hasher.update(name.as_bytes());

        hasher.update(scheduled_at_ms.to_be_bytes());

        Self(hasher.finalize().into())
    }

    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw key bytes (storage key form)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TripKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
