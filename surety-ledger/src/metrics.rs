//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_carriers_registered_total` - Carrier registrations
//! - `ledger_carriers_funded_total` - Carrier fundings
//! - `ledger_trips_registered_total` - Trip registrations
//! - `ledger_policies_purchased_total` - Policies purchased
//! - `ledger_policies_credited_total` - Policies announced by credit passes
//! - `ledger_payouts_total` - Payouts credited to balances
//! - `ledger_payout_amount_total` - Sum of credited payout amounts
//! - `ledger_op_duration_seconds` - Operation latency histogram

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Carrier registrations
    pub carriers_registered: IntCounter,

    /// Carrier fundings
    pub carriers_funded: IntCounter,

    /// Trip registrations
    pub trips_registered: IntCounter,

    /// Policies purchased
    pub policies_purchased: IntCounter,

    /// Policies announced by credit passes
    pub policies_credited: IntCounter,

    /// Payouts credited to balances
    pub payouts: IntCounter,

    /// Sum of credited payout amounts (minor units)
    pub payout_amount: IntCounter,

    /// Operation latency histogram
    pub op_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let carriers_registered = IntCounter::with_opts(Opts::new(
            "ledger_carriers_registered_total",
            "Carrier registrations",
        ))?;
        registry.register(Box::new(carriers_registered.clone()))?;

        let carriers_funded = IntCounter::with_opts(Opts::new(
            "ledger_carriers_funded_total",
            "Carrier fundings",
        ))?;
        registry.register(Box::new(carriers_funded.clone()))?;

        let trips_registered = IntCounter::with_opts(Opts::new(
            "ledger_trips_registered_total",
            "Trip registrations",
        ))?;
        registry.register(Box::new(trips_registered.clone()))?;

        let policies_purchased = IntCounter::with_opts(Opts::new(
            "ledger_policies_purchased_total",
            "Policies purchased",
        ))?;
        registry.register(Box::new(policies_purchased.clone()))?;

        let policies_credited = IntCounter::with_opts(Opts::new(
            "ledger_policies_credited_total",
            "Policies announced by credit passes",
        ))?;
        registry.register(Box::new(policies_credited.clone()))?;

        let payouts = IntCounter::with_opts(Opts::new(
            "ledger_payouts_total",
            "Payouts credited to balances",
        ))?;
        registry.register(Box::new(payouts.clone()))?;

        let payout_amount = IntCounter::with_opts(Opts::new(
            "ledger_payout_amount_total",
            "Sum of credited payout amounts",
        ))?;
        registry.register(Box::new(payout_amount.clone()))?;

        let op_duration = Histogram::with_opts(
            HistogramOpts::new("ledger_op_duration_seconds", "Operation latency").buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250,
            ]),
        )?;
        registry.register(Box::new(op_duration.clone()))?;

        Ok(Self {
            carriers_registered,
            carriers_funded,
            trips_registered,
            policies_purchased,
            policies_credited,
            payouts,
            payout_amount,
            op_duration,
            registry,
        })
    }

    /// Record a payout credited to a balance
    pub fn record_payout(&self, amount: u64) {
        self.payouts.inc();
        self.payout_amount.inc_by(amount);
    }

    /// Record operation latency
    pub fn record_op_duration(&self, duration_seconds: f64) {
        self.op_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
