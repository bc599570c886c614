//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// The first five variants are precondition failures: they abort the call
/// before anything is written, so no partial state can ever commit.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller is not the stored owner
    #[error("Caller is not the owner: {0}")]
    NotOwner(String),

    /// Operations are disabled by the access gate
    #[error("Ledger operations are disabled")]
    NotEnabled,

    /// Funding attempted for an unknown carrier
    #[error("Carrier not registered: {0}")]
    CarrierNotRegistered(String),

    /// Operation addressed a trip key with no registered trip
    #[error("Trip not registered: {0}")]
    TripNotRegistered(String),

    /// Amount failed validation (zero face value, payout overflow)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Carrier lookup miss on a read path
    #[error("Carrier not found: {0}")]
    CarrierNotFound(String),

    /// Trip lookup miss on a read path
    #[error("Trip not found: {0}")]
    TripNotFound(String),

    /// Policyholder lookup miss on a read path
    #[error("Policyholder not found: {0}")]
    PolicyholderNotFound(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
