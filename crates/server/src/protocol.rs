//! Client command protocol
//!
//! Inbound frames are JSON objects tagged by `type`, e.g.
//! `{"type": "register", "email": "a@b.io"}`.

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use stockwatch_core::{CoreError, LedgerError, StoreError, TradeSide};

/// Client-to-server commands
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Register {
        email: String,
    },
    /// Replaces the whole subscription set
    Subscribe {
        tickers: Vec<String>,
    },
    /// Replaces the thresholds for one ticker; neither bound clears it
    SetAlert {
        ticker: String,
        #[serde(default)]
        above: Option<Decimal>,
        #[serde(default)]
        below: Option<Decimal>,
    },
    ClearAlert {
        ticker: String,
    },
    Trade {
        ticker: String,
        side: TradeSide,
        quantity: i64,
    },
    Portfolio,
    Ping,
}

impl ClientMessage {
    pub fn parse(text: &str) -> SessionResult<Self> {
        serde_json::from_str(text).map_err(|e| SessionError::Malformed(e.to_string()))
    }

    /// Whether the command needs a registered session
    pub fn requires_session(&self) -> bool {
        !matches!(self, ClientMessage::Register { .. } | ClientMessage::Ping)
    }
}

/// Per-command session errors; reported to the client, never fatal
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Not registered: send a register command first")]
    NotRegistered,

    #[error("Too many login attempts, retry in {0}s")]
    RateLimited(u64),

    #[error("Alert thresholds must be positive")]
    InvalidThreshold,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type SessionResult<T> = Result<T, SessionError>;
