//! Main ledger orchestration layer
//!
//! Ties together storage, the single-writer actor, the notification
//! stream, and metrics into the public API. Mutations dispatch through the
//! actor (one atomic commit per call); reads go straight to storage, which
//! only ever exposes committed state.
//!
//! # Example
//!
//! ```no_run
//! use surety_ledger::{Config, Identity, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> surety_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let carrier = Identity::new("CARRIER-1");
//!     ledger.register_carrier("Northwind", carrier.clone()).await?;
//!     let key = ledger.register_trip("TS-100", carrier, 1_700_000_000_000).await?;
//!     ledger.purchase_policy(Identity::new("H-1"), key, 10).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    keys::TripKey,
    metrics::Metrics,
    types::{
        Carrier, Identity, Notification, NotificationKind, Policy, Policyholder, Trip, TripStatus,
    },
    Config, Error, Result, Storage,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

/// Main ledger interface
pub struct Ledger {
    /// Actor handle for mutations
    handle: LedgerHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Notification stream
    events: broadcast::Sender<Notification>,

    /// Metrics collector
    metrics: Metrics,
}

impl Ledger {
    /// Open ledger with configuration.
    ///
    /// On a fresh data directory the gate starts enabled and
    /// `config.owner` becomes the stored owner; reopening preserves both.
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let handle = spawn_ledger_actor(storage.clone());
        let (events, _) = broadcast::channel(config.events.channel_capacity);
        let metrics = Metrics::new().map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            handle,
            storage,
            events,
            metrics,
        })
    }

    /// Subscribe to the notification stream
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn emit(&self, kind: NotificationKind) -> Notification {
        let notification = Notification::new(kind);
        // No subscribers is fine; the notification is still returned
        let _ = self.events.send(notification.clone());
        notification
    }

    // Access gate

    /// Whether mutating operations are currently permitted
    pub fn is_enabled(&self) -> Result<bool> {
        self.storage.is_enabled()
    }

    /// Stored owner identity
    pub fn owner(&self) -> Result<Identity> {
        self.storage.owner()
    }

    /// Flip the access gate (owner only, callable regardless of gate state)
    pub async fn set_enabled(&self, caller: Identity, enabled: bool) -> Result<()> {
        self.handle.set_enabled(caller, enabled).await
    }

    /// Transfer ownership (owner only)
    pub async fn set_owner(&self, caller: Identity, new_owner: Identity) -> Result<()> {
        self.handle.set_owner(caller, new_owner).await
    }

    // Entity registry

    /// Upsert a carrier record; re-registration resets the funded flag
    pub async fn register_carrier(
        &self,
        name: impl Into<String>,
        id: Identity,
    ) -> Result<Notification> {
        let kind = self.handle.register_carrier(name.into(), id).await?;
        self.metrics.carriers_registered.inc();
        Ok(self.emit(kind))
    }

    /// Mark a registered carrier as funded
    pub async fn fund_carrier(&self, id: Identity) -> Result<Notification> {
        let kind = self.handle.fund_carrier(id).await?;
        self.metrics.carriers_funded.inc();
        Ok(self.emit(kind))
    }

    /// Upsert a trip and return its derived key
    pub async fn register_trip(
        &self,
        name: impl Into<String>,
        carrier: Identity,
        scheduled_at_ms: i64,
    ) -> Result<TripKey> {
        let (key, kind) = self
            .handle
            .register_trip(name.into(), carrier, scheduled_at_ms)
            .await?;
        self.metrics.trips_registered.inc();
        self.emit(kind);
        Ok(key)
    }

    /// Record a trip-status report from the external oracle
    pub async fn record_trip_status(
        &self,
        key: TripKey,
        status: TripStatus,
        reported_at_ms: i64,
    ) -> Result<Notification> {
        let kind = self
            .handle
            .record_trip_status(key, status, reported_at_ms)
            .await?;
        Ok(self.emit(kind))
    }

    // Policy ledger

    /// Purchase a policy against a registered trip
    pub async fn purchase_policy(
        &self,
        holder: Identity,
        key: TripKey,
        amount: u64,
    ) -> Result<Notification> {
        let start = Instant::now();
        let kind = self.handle.purchase_policy(holder, key, amount).await?;
        self.metrics.policies_purchased.inc();
        self.metrics.record_op_duration(start.elapsed().as_secs_f64());
        Ok(self.emit(kind))
    }

    /// Policies under a trip key, in purchase order
    pub fn list_policies(&self, key: &TripKey) -> Result<Vec<Policy>> {
        self.storage.list_policies(key)
    }

    // Payout engine

    /// Mark every policy under the trip settled and announce its payout;
    /// balances are untouched
    pub async fn credit_trip(&self, key: TripKey) -> Result<Vec<Notification>> {
        let start = Instant::now();
        let kinds = self.handle.credit_trip(key).await?;
        self.metrics.policies_credited.inc_by(kinds.len() as u64);
        self.metrics.record_op_duration(start.elapsed().as_secs_f64());
        Ok(kinds.into_iter().map(|kind| self.emit(kind)).collect())
    }

    /// Credit payouts for the holder's not-yet-paid policies under the
    /// trip; each policy pays at most once, ever
    pub async fn withdraw_for(&self, holder: Identity, key: TripKey) -> Result<Vec<Notification>> {
        let start = Instant::now();
        let kinds = self.handle.withdraw_for(holder, key).await?;
        for kind in &kinds {
            if let NotificationKind::PolicyholderWithdrawn { amount, .. } = kind {
                self.metrics.record_payout(*amount);
            }
        }
        self.metrics.record_op_duration(start.elapsed().as_secs_f64());
        Ok(kinds.into_iter().map(|kind| self.emit(kind)).collect())
    }

    // Reads

    /// Carrier record
    pub fn get_carrier(&self, id: &Identity) -> Result<Carrier> {
        self.storage
            .carrier(id)?
            .ok_or_else(|| Error::CarrierNotFound(id.to_string()))
    }

    /// Trip record
    pub fn get_trip(&self, key: &TripKey) -> Result<Trip> {
        self.storage
            .trip(key)?
            .ok_or_else(|| Error::TripNotFound(key.to_string()))
    }

    /// Policyholder record
    pub fn get_policyholder(&self, id: &Identity) -> Result<Policyholder> {
        self.storage
            .policyholder(id)?
            .ok_or_else(|| Error::PolicyholderNotFound(id.to_string()))
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}
