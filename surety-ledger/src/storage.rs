//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `meta` - owner identity and the access-gate flag
//! - `carriers` - carrier records (key: identity)
//! - `trips` - trip records (key: 32-byte trip key)
//! - `policies` - ordered policy list per trip (key: 32-byte trip key)
//! - `holders` - policyholder records with balances (key: identity)
//!
//! Every mutating operation is one read-check-write cycle committed through
//! a single `WriteBatch`: a failed precondition returns before anything is
//! staged, so partial state can never become visible. The single-writer
//! actor (see `actor`) serializes all mutations, so read-modify-write here
//! never races.

use crate::{
    error::{Error, Result},
    keys::TripKey,
    types::{
        payout, Carrier, Identity, NotificationKind, Policy, PolicyStatus, Policyholder, Trip,
        TripStatus,
    },
    Config,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, DB};
use std::sync::Arc;

/// Column family names
const CF_META: &str = "meta";
const CF_CARRIERS: &str = "carriers";
const CF_TRIPS: &str = "trips";
const CF_POLICIES: &str = "policies";
const CF_HOLDERS: &str = "holders";

/// Meta keys
const META_OWNER: &[u8] = b"owner";
const META_ENABLED: &[u8] = b"enabled";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database; stores `config.owner` and enables the gate
    /// on first open only (reopen preserves both).
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_META, Self::cf_options_meta()),
            ColumnFamilyDescriptor::new(CF_CARRIERS, Self::cf_options_registry()),
            ColumnFamilyDescriptor::new(CF_TRIPS, Self::cf_options_registry()),
            ColumnFamilyDescriptor::new(CF_POLICIES, Self::cf_options_policies()),
            ColumnFamilyDescriptor::new(CF_HOLDERS, Self::cf_options_registry()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let storage = Self { db: Arc::new(db) };
        storage.bootstrap(&config.owner)?;

        tracing::info!(path = %path.display(), "Opened ledger storage");

        Ok(storage)
    }

    fn cf_options_meta() -> Options {
        Options::default()
    }

    fn cf_options_registry() -> Options {
        let mut opts = Options::default();
        // Registries are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_policies() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Initialize owner and gate on first open
    fn bootstrap(&self, owner: &Identity) -> Result<()> {
        let cf = self.cf_handle(CF_META)?;
        if self.db.get_cf(cf, META_OWNER)?.is_some() {
            return Ok(());
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(cf, META_OWNER, bincode::serialize(owner)?);
        batch.put_cf(cf, META_ENABLED, [1u8]);
        self.db.write(batch)?;

        tracing::info!(owner = %owner, "Ledger initialized");
        Ok(())
    }

    // Access gate

    /// Whether mutating operations are currently permitted
    pub fn is_enabled(&self) -> Result<bool> {
        let cf = self.cf_handle(CF_META)?;
        let value = self
            .db
            .get_cf(cf, META_ENABLED)?
            .ok_or_else(|| Error::Storage("Gate flag missing".to_string()))?;
        Ok(value.first() == Some(&1))
    }

    /// Stored owner identity
    pub fn owner(&self) -> Result<Identity> {
        let cf = self.cf_handle(CF_META)?;
        let value = self
            .db
            .get_cf(cf, META_OWNER)?
            .ok_or_else(|| Error::Storage("Owner missing".to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    fn require_owner(&self, caller: &Identity) -> Result<()> {
        if *caller != self.owner()? {
            return Err(Error::NotOwner(caller.to_string()));
        }
        Ok(())
    }

    fn require_enabled(&self) -> Result<()> {
        if !self.is_enabled()? {
            return Err(Error::NotEnabled);
        }
        Ok(())
    }

    /// Flip the gate. Owner-only, and deliberately callable while the gate
    /// is off: this is the only escape hatch.
    pub fn set_enabled(&self, caller: &Identity, enabled: bool) -> Result<()> {
        self.require_owner(caller)?;

        let cf = self.cf_handle(CF_META)?;
        self.db
            .put_cf(cf, META_ENABLED, [if enabled { 1u8 } else { 0u8 }])?;

        tracing::info!(enabled, "Access gate updated");
        Ok(())
    }

    /// Transfer ownership. Owner-only (the upstream behavior allowed anyone
    /// to reassign ownership; that defect is fixed here).
    pub fn set_owner(&self, caller: &Identity, new_owner: &Identity) -> Result<()> {
        self.require_owner(caller)?;

        let cf = self.cf_handle(CF_META)?;
        self.db.put_cf(cf, META_OWNER, bincode::serialize(new_owner)?)?;

        tracing::info!(new_owner = %new_owner, "Ownership transferred");
        Ok(())
    }

    // Entity registry

    /// Upsert a carrier record. Re-registration resets the funded flag;
    /// callers that need idempotence must not re-register funded carriers.
    pub fn register_carrier(&self, name: &str, id: &Identity) -> Result<NotificationKind> {
        self.require_enabled()?;

        let carrier = Carrier {
            id: id.clone(),
            name: name.to_string(),
            is_registered: true,
            is_funded: false,
        };

        let cf = self.cf_handle(CF_CARRIERS)?;
        self.db.put_cf(cf, id.as_bytes(), bincode::serialize(&carrier)?)?;

        tracing::info!(carrier = %id, name, "Carrier registered");

        Ok(NotificationKind::CarrierRegistered { carrier: id.clone() })
    }

    /// Mark a registered carrier as funded
    pub fn fund_carrier(&self, id: &Identity) -> Result<NotificationKind> {
        self.require_enabled()?;

        let cf = self.cf_handle(CF_CARRIERS)?;
        let value = self
            .db
            .get_cf(cf, id.as_bytes())?
            .ok_or_else(|| Error::CarrierNotRegistered(id.to_string()))?;

        let mut carrier: Carrier = bincode::deserialize(&value)?;
        carrier.is_funded = true;

        self.db.put_cf(cf, id.as_bytes(), bincode::serialize(&carrier)?)?;

        tracing::info!(carrier = %id, "Carrier funded");

        Ok(NotificationKind::CarrierFunded { carrier: id.clone() })
    }

    /// Upsert a trip record under its derived key
    pub fn register_trip(
        &self,
        name: &str,
        carrier: &Identity,
        scheduled_at_ms: i64,
    ) -> Result<(TripKey, NotificationKind)> {
        self.require_enabled()?;

        let key = TripKey::derive(carrier, name, scheduled_at_ms);
        let trip = Trip {
            key,
            name: name.to_string(),
            carrier: carrier.clone(),
            is_registered: true,
            status: TripStatus::default(),
            scheduled_at_ms,
            updated_at_ms: scheduled_at_ms,
        };

        let cf = self.cf_handle(CF_TRIPS)?;
        self.db.put_cf(cf, key.as_bytes(), bincode::serialize(&trip)?)?;

        tracing::info!(trip = %key, carrier = %carrier, name, "Trip registered");

        let kind = NotificationKind::TripRegistered {
            name: name.to_string(),
            carrier: carrier.clone(),
            key,
        };
        Ok((key, kind))
    }

    /// Record a status report from the external oracle
    pub fn record_trip_status(
        &self,
        key: &TripKey,
        status: TripStatus,
        reported_at_ms: i64,
    ) -> Result<NotificationKind> {
        self.require_enabled()?;

        let mut trip = self
            .trip(key)?
            .ok_or_else(|| Error::TripNotRegistered(key.to_string()))?;

        trip.status = status;
        trip.updated_at_ms = reported_at_ms;

        let cf = self.cf_handle(CF_TRIPS)?;
        self.db.put_cf(cf, key.as_bytes(), bincode::serialize(&trip)?)?;

        tracing::info!(trip = %key, ?status, "Trip status recorded");

        Ok(NotificationKind::TripStatusRecorded { key: *key, status })
    }

    // Policy ledger

    /// Append a policy to a trip's list, creating the policyholder lazily.
    /// Both writes commit in one batch.
    pub fn purchase_policy(
        &self,
        holder: &Identity,
        key: &TripKey,
        amount: u64,
    ) -> Result<NotificationKind> {
        self.require_enabled()?;

        if amount == 0 {
            return Err(Error::InvalidAmount("face value must be positive".to_string()));
        }

        if self.trip(key)?.is_none() {
            return Err(Error::TripNotRegistered(key.to_string()));
        }

        let mut policies = self.policies(key)?;
        policies.push(Policy {
            holder: holder.clone(),
            amount,
            status: PolicyStatus::Purchased,
        });

        let holder_record = match self.policyholder(holder)? {
            Some(existing) => existing,
            None => Policyholder {
                id: holder.clone(),
                is_registered: true,
                balance: 0,
            },
        };

        let mut batch = WriteBatch::default();
        let cf_policies = self.cf_handle(CF_POLICIES)?;
        batch.put_cf(cf_policies, key.as_bytes(), bincode::serialize(&policies)?);
        let cf_holders = self.cf_handle(CF_HOLDERS)?;
        batch.put_cf(cf_holders, holder.as_bytes(), bincode::serialize(&holder_record)?);
        self.db.write(batch)?;

        tracing::info!(holder = %holder, trip = %key, amount, "Policy purchased");

        Ok(NotificationKind::PolicyPurchased {
            holder: holder.clone(),
            key: *key,
            amount,
        })
    }

    /// Policies under a trip key, in purchase order
    pub fn list_policies(&self, key: &TripKey) -> Result<Vec<Policy>> {
        self.policies(key)
    }

    // Payout engine

    /// Mark every policy under the trip settled and announce its computed
    /// payout. Balances are not touched; already-paid policies keep their
    /// terminal state but are still announced.
    pub fn credit_trip(&self, key: &TripKey) -> Result<Vec<NotificationKind>> {
        self.require_enabled()?;

        let trip = self
            .trip(key)?
            .ok_or_else(|| Error::TripNotRegistered(key.to_string()))?;

        let mut policies = self.policies(key)?;
        let mut kinds = Vec::with_capacity(policies.len());

        for policy in &mut policies {
            if policy.status == PolicyStatus::Purchased {
                policy.status = PolicyStatus::Settled;
            }

            kinds.push(NotificationKind::PolicyCredited {
                holder: policy.holder.clone(),
                trip_name: trip.name.clone(),
                carrier: trip.carrier.clone(),
                amount: payout(policy.amount)?,
            });
        }

        let cf = self.cf_handle(CF_POLICIES)?;
        self.db.put_cf(cf, key.as_bytes(), bincode::serialize(&policies)?)?;

        tracing::info!(trip = %key, policies = kinds.len(), "Trip credited");

        Ok(kinds)
    }

    /// Credit the payout for each of the holder's not-yet-paid policies
    /// under the trip, transitioning each to `Paid` in the same batch as
    /// the balance increment. Repeat calls skip paid policies.
    pub fn withdraw_for(&self, holder: &Identity, key: &TripKey) -> Result<Vec<NotificationKind>> {
        self.require_enabled()?;

        // Unknown trips match no policies; tolerate rather than reject so
        // external retries stay cheap.
        let trip = match self.trip(key)? {
            Some(trip) => trip,
            None => return Ok(Vec::new()),
        };

        let mut policies = self.policies(key)?;
        let mut kinds = Vec::new();
        let mut credited: u64 = 0;

        for policy in &mut policies {
            if policy.holder != *holder || policy.is_paid() {
                continue;
            }

            let amount = payout(policy.amount)?;
            credited = credited
                .checked_add(amount)
                .ok_or_else(|| Error::InvalidAmount("balance overflow".to_string()))?;
            policy.status = PolicyStatus::Paid;

            kinds.push(NotificationKind::PolicyholderWithdrawn {
                holder: holder.clone(),
                trip_name: trip.name.clone(),
                carrier: trip.carrier.clone(),
                amount,
            });
        }

        if kinds.is_empty() {
            return Ok(kinds);
        }

        let mut holder_record = match self.policyholder(holder)? {
            Some(existing) => existing,
            None => Policyholder {
                id: holder.clone(),
                is_registered: true,
                balance: 0,
            },
        };
        holder_record.balance = holder_record
            .balance
            .checked_add(credited)
            .ok_or_else(|| Error::InvalidAmount("balance overflow".to_string()))?;

        let mut batch = WriteBatch::default();
        let cf_policies = self.cf_handle(CF_POLICIES)?;
        batch.put_cf(cf_policies, key.as_bytes(), bincode::serialize(&policies)?);
        let cf_holders = self.cf_handle(CF_HOLDERS)?;
        batch.put_cf(cf_holders, holder.as_bytes(), bincode::serialize(&holder_record)?);
        self.db.write(batch)?;

        tracing::info!(
            holder = %holder,
            trip = %key,
            credited,
            policies = kinds.len(),
            "Payouts credited to balance"
        );

        Ok(kinds)
    }

    // Reads

    /// Carrier record, if registered
    pub fn carrier(&self, id: &Identity) -> Result<Option<Carrier>> {
        let cf = self.cf_handle(CF_CARRIERS)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Trip record, if registered
    pub fn trip(&self, key: &TripKey) -> Result<Option<Trip>> {
        let cf = self.cf_handle(CF_TRIPS)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Policyholder record, if known
    pub fn policyholder(&self, id: &Identity) -> Result<Option<Policyholder>> {
        let cf = self.cf_handle(CF_HOLDERS)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn policies(&self, key: &TripKey) -> Result<Vec<Policy>> {
        let cf = self.cf_handle(CF_POLICIES)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(value) => Ok(bincode::deserialize(&value)?),
            None => Ok(Vec::new()),
        }
    }
}
