//! TripSurety Ledger Core
//!
//! Authoritative ledger for carriers, trips, trip-disruption insurance
//! policies, and policyholder balances. An external authorization layer
//! performs multi-party consensus before calling in; this crate performs
//! local precondition checks and unconditional state mutation once they
//! pass.
//!
//! # Architecture
//!
//! - **Access Gate**: owner identity plus a global enabled flag gating
//!   every mutation except the flag toggle itself
//! - **Entity Registry**: carriers, trips (deterministic composite keys),
//!   and lazily-created policyholders
//! - **Policy Ledger**: ordered policy lists per trip
//! - **Payout Engine**: 150% truncating payouts, settled announcements,
//!   exactly-once balance credits
//! - **Single Writer**: one actor serializes all mutations; each external
//!   call is one atomic storage commit
//!
//! # Invariants
//!
//! - Trip keys are a pure function of `(carrier, name, scheduled time)`
//! - Policyholder balances only increase, and only via the payout engine
//! - A `Paid` policy never pays again
//! - A failed precondition commits nothing

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use keys::TripKey;
pub use ledger::Ledger;
pub use storage::Storage;
pub use types::{
    payout, Carrier, Identity, Notification, NotificationKind, Policy, PolicyStatus, Policyholder,
    Trip, TripStatus,
};
