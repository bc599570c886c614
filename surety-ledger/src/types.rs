//! Core types for the ledger
//!
//! All persisted types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (u64 minor units for money)

use crate::keys::TripKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque party identifier (carrier, policyholder, or owner identity)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Create new identity
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get as bytes (storage key form)
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registered carrier offering trips
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Carrier {
    /// Carrier identity (unique key)
    pub id: Identity,

    /// Display name
    pub name: String,

    /// Registration flag
    pub is_registered: bool,

    /// Funding flag; registration always resets this to false
    pub is_funded: bool,
}

/// Trip status code, written only via the oracle-facing status operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TripStatus {
    /// No status reported yet (treated as on-time)
    Unknown = 0,
    /// Reported on time
    OnTime = 10,
    /// Disrupted, attributable to the carrier
    LateCarrier = 20,
    /// Disrupted by weather
    LateWeather = 30,
    /// Disrupted by a technical fault
    LateTechnical = 40,
    /// Disrupted for any other reason
    LateOther = 50,
}

impl Default for TripStatus {
    fn default() -> Self {
        TripStatus::Unknown
    }
}

/// A carrier's offered service instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    /// Deterministic composite key, see [`TripKey::derive`]
    pub key: TripKey,

    /// Trip name
    pub name: String,

    /// Owning carrier identity
    pub carrier: Identity,

    /// Registration flag
    pub is_registered: bool,

    /// Current status code
    pub status: TripStatus,

    /// Scheduled time (milliseconds since Unix epoch); part of the key
    pub scheduled_at_ms: i64,

    /// Last-updated time, bumped on every status report
    pub updated_at_ms: i64,
}

/// Per-policy lifecycle
///
/// `Purchased -> Settled` (via credit) is independent of
/// `Purchased/Settled -> Paid` (via withdrawal). `Paid` is terminal and
/// reachable at most once; the balance credit commits in the same write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PolicyStatus {
    /// Purchased, not yet processed for payout
    Purchased = 1,
    /// Marked settled by a credit pass
    Settled = 2,
    /// Payout credited to the holder's balance (terminal)
    Paid = 3,
}

/// Protection contract purchased against a specific trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Buying policyholder
    pub holder: Identity,

    /// Face value in minor units
    pub amount: u64,

    /// Lifecycle state
    pub status: PolicyStatus,
}

impl Policy {
    /// Whether the policy has been processed for payout
    pub fn is_settled(&self) -> bool {
        self.status != PolicyStatus::Purchased
    }

    /// Whether the payout has already been credited
    pub fn is_paid(&self) -> bool {
        self.status == PolicyStatus::Paid
    }
}

/// Buyer of policies, accumulating a withdrawable balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policyholder {
    /// Policyholder identity
    pub id: Identity,

    /// Registration flag (set lazily on first purchase)
    pub is_registered: bool,

    /// Withdrawable balance in minor units; only ever credited here
    pub balance: u64,
}

/// Payout rule: 150% of face value, integer arithmetic, truncating.
///
/// Computed as `amount + amount / 2`, which equals `amount * 3 / 2` for
/// every u64 without the intermediate multiplication overflowing.
pub fn payout(face_value: u64) -> crate::Result<u64> {
    face_value
        .checked_add(face_value / 2)
        .ok_or_else(|| crate::Error::InvalidAmount(format!("payout overflows for {}", face_value)))
}

/// Notification emitted by a mutating operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Notification ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Emission timestamp
    pub emitted_at: DateTime<Utc>,

    /// What happened
    pub kind: NotificationKind,
}

impl Notification {
    /// Wrap a kind in a fresh envelope
    pub fn new(kind: NotificationKind) -> Self {
        Self {
            id: Uuid::now_v7(),
            emitted_at: Utc::now(),
            kind,
        }
    }
}

/// Notification payloads, one per observable state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Carrier record upserted
    CarrierRegistered {
        /// Carrier identity
        carrier: Identity,
    },

    /// Carrier funded
    CarrierFunded {
        /// Carrier identity
        carrier: Identity,
    },

    /// Trip record upserted
    TripRegistered {
        /// Trip name
        name: String,
        /// Owning carrier
        carrier: Identity,
        /// Derived trip key
        key: TripKey,
    },

    /// Policy appended to a trip's list
    PolicyPurchased {
        /// Buying policyholder
        holder: Identity,
        /// Trip key
        key: TripKey,
        /// Face value
        amount: u64,
    },

    /// Policy marked settled with its computed payout announced
    PolicyCredited {
        /// Policyholder owed the payout
        holder: Identity,
        /// Trip name
        trip_name: String,
        /// Owning carrier
        carrier: Identity,
        /// Computed payout (150% of face value)
        amount: u64,
    },

    /// Payout credited to the holder's withdrawable balance
    PolicyholderWithdrawn {
        /// Credited policyholder
        holder: Identity,
        /// Trip name
        trip_name: String,
        /// Owning carrier
        carrier: Identity,
        /// Credited payout
        amount: u64,
    },

    /// Trip status reported by the external oracle
    TripStatusRecorded {
        /// Trip key
        key: TripKey,
        /// Reported status
        status: TripStatus,
    },
}
