//! Error types

use thiserror::Error;

use crate::Ticker;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("Invalid email: {0:?}")]
    InvalidEmail(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Identity store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether retrying on a later tick may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Io(_))
    }
}

/// Push delivery errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Channel {0} is closed")]
    Closed(String),

    #[error("Channel {0} outbound queue is full")]
    Backpressure(String),
}

/// Virtual trade errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Quantity must be positive")]
    InvalidQuantity,

    #[error("No current price for {0}")]
    PriceUnavailable(Ticker),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: String, available: String },

    #[error("Insufficient shares of {ticker}: need {needed}, have {held}")]
    InsufficientShares { ticker: Ticker, needed: u32, held: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type DeliveryResult<T> = Result<T, DeliveryError>;
pub type LedgerResult<T> = Result<T, LedgerError>;
