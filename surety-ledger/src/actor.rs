//! Actor-based concurrency for the ledger
//!
//! The original host environment serialized every external call for free.
//! Outside it, the same discipline is made explicit with a single-writer
//! actor: every mutation is one mailbox message, handled to completion
//! against one atomic storage commit before the next message is taken.
//! Readers observe only committed state.
//!
//! ```text
//! callers ──clone──▶ LedgerHandle ──mpsc──▶ LedgerActor ──▶ Storage
//!                         ▲                     │
//!                         └──── oneshot reply ──┘
//! ```

use crate::{
    keys::TripKey,
    types::{Identity, NotificationKind, TripStatus},
    Error, Result, Storage,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Flip the access gate
    SetEnabled {
        /// Calling identity
        caller: Identity,
        /// New gate state
        enabled: bool,
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Transfer ownership
    SetOwner {
        /// Calling identity
        caller: Identity,
        /// New owner
        new_owner: Identity,
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Upsert a carrier
    RegisterCarrier {
        /// Display name
        name: String,
        /// Carrier identity
        id: Identity,
        /// Reply channel
        response: oneshot::Sender<Result<NotificationKind>>,
    },

    /// Fund a registered carrier
    FundCarrier {
        /// Carrier identity
        id: Identity,
        /// Reply channel
        response: oneshot::Sender<Result<NotificationKind>>,
    },

    /// Upsert a trip
    RegisterTrip {
        /// Trip name
        name: String,
        /// Owning carrier
        carrier: Identity,
        /// Scheduled time (ms since epoch)
        scheduled_at_ms: i64,
        /// Reply channel
        response: oneshot::Sender<Result<(TripKey, NotificationKind)>>,
    },

    /// Record an oracle status report
    RecordTripStatus {
        /// Trip key
        key: TripKey,
        /// Reported status
        status: TripStatus,
        /// Report time (ms since epoch)
        reported_at_ms: i64,
        /// Reply channel
        response: oneshot::Sender<Result<NotificationKind>>,
    },

    /// Append a policy
    PurchasePolicy {
        /// Buying policyholder
        holder: Identity,
        /// Trip key
        key: TripKey,
        /// Face value
        amount: u64,
        /// Reply channel
        response: oneshot::Sender<Result<NotificationKind>>,
    },

    /// Settle and announce payouts for a trip
    CreditTrip {
        /// Trip key
        key: TripKey,
        /// Reply channel
        response: oneshot::Sender<Result<Vec<NotificationKind>>>,
    },

    /// Pay out a holder's policies under a trip
    WithdrawFor {
        /// Policyholder
        holder: Identity,
        /// Trip key
        key: TripKey,
        /// Reply channel
        response: oneshot::Sender<Result<Vec<NotificationKind>>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
pub struct LedgerActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(storage: Arc<Storage>, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { storage, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if matches!(msg, LedgerMessage::Shutdown) {
                break;
            }
            self.handle_message(msg);
        }
    }

    /// Handle a single message. Each arm is one atomic storage operation;
    /// the reply carries its result, and a dropped receiver is ignored.
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::SetEnabled {
                caller,
                enabled,
                response,
            } => {
                let _ = response.send(self.storage.set_enabled(&caller, enabled));
            }

            LedgerMessage::SetOwner {
                caller,
                new_owner,
                response,
            } => {
                let _ = response.send(self.storage.set_owner(&caller, &new_owner));
            }

            LedgerMessage::RegisterCarrier { name, id, response } => {
                let _ = response.send(self.storage.register_carrier(&name, &id));
            }

            LedgerMessage::FundCarrier { id, response } => {
                let _ = response.send(self.storage.fund_carrier(&id));
            }

            LedgerMessage::RegisterTrip {
                name,
                carrier,
                scheduled_at_ms,
                response,
            } => {
                let _ = response.send(self.storage.register_trip(&name, &carrier, scheduled_at_ms));
            }

            LedgerMessage::RecordTripStatus {
                key,
                status,
                reported_at_ms,
                response,
            } => {
                let _ = response.send(self.storage.record_trip_status(&key, status, reported_at_ms));
            }

            LedgerMessage::PurchasePolicy {
                holder,
                key,
                amount,
                response,
            } => {
                let _ = response.send(self.storage.purchase_policy(&holder, &key, amount));
            }

            LedgerMessage::CreditTrip { key, response } => {
                let _ = response.send(self.storage.credit_trip(&key));
            }

            LedgerMessage::WithdrawFor {
                holder,
                key,
                response,
            } => {
                let _ = response.send(self.storage.withdraw_for(&holder, &key));
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        msg: LedgerMessage,
        rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Flip the access gate
    pub async fn set_enabled(&self, caller: Identity, enabled: bool) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerMessage::SetEnabled {
                caller,
                enabled,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Transfer ownership
    pub async fn set_owner(&self, caller: Identity, new_owner: Identity) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerMessage::SetOwner {
                caller,
                new_owner,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Upsert a carrier
    pub async fn register_carrier(&self, name: String, id: Identity) -> Result<NotificationKind> {
        let (tx, rx) = oneshot::channel();
        self.request(LedgerMessage::RegisterCarrier { name, id, response: tx }, rx)
            .await
    }

    /// Fund a registered carrier
    pub async fn fund_carrier(&self, id: Identity) -> Result<NotificationKind> {
        let (tx, rx) = oneshot::channel();
        self.request(LedgerMessage::FundCarrier { id, response: tx }, rx)
            .await
    }

    /// Upsert a trip
    pub async fn register_trip(
        &self,
        name: String,
        carrier: Identity,
        scheduled_at_ms: i64,
    ) -> Result<(TripKey, NotificationKind)> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerMessage::RegisterTrip {
                name,
                carrier,
                scheduled_at_ms,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Record an oracle status report
    pub async fn record_trip_status(
        &self,
        key: TripKey,
        status: TripStatus,
        reported_at_ms: i64,
    ) -> Result<NotificationKind> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerMessage::RecordTripStatus {
                key,
                status,
                reported_at_ms,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Append a policy
    pub async fn purchase_policy(
        &self,
        holder: Identity,
        key: TripKey,
        amount: u64,
    ) -> Result<NotificationKind> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerMessage::PurchasePolicy {
                holder,
                key,
                amount,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Settle and announce payouts for a trip
    pub async fn credit_trip(&self, key: TripKey) -> Result<Vec<NotificationKind>> {
        let (tx, rx) = oneshot::channel();
        self.request(LedgerMessage::CreditTrip { key, response: tx }, rx)
            .await
    }

    /// Pay out a holder's policies under a trip
    pub async fn withdraw_for(&self, holder: Identity, key: TripKey) -> Result<Vec<NotificationKind>> {
        let (tx, rx) = oneshot::channel();
        self.request(LedgerMessage::WithdrawFor { holder, key, response: tx }, rx)
            .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(storage: Arc<Storage>) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
