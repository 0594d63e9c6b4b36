//! Identity store capability
//!
//! The fan-out engine and the session layer only see this trait; whether the
//! backing store is durable or in-memory is decided once at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{AlertThreshold, Identity, Portfolio, StoreResult, Ticker, Watchlist};

/// Everything persisted for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub identity: Identity,
    #[serde(flatten)]
    pub watchlist: Watchlist,
    pub portfolio: Portfolio,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(identity: Identity, portfolio: Portfolio) -> Self {
        Self {
            identity,
            watchlist: Watchlist::default(),
            portfolio,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    async fn find_or_create(&self, identity: &Identity) -> StoreResult<UserRecord>;

    async fn watchlist(&self, identity: &Identity) -> StoreResult<Watchlist>;

    async fn set_subscriptions(
        &self,
        identity: &Identity,
        tickers: BTreeSet<Ticker>,
    ) -> StoreResult<Watchlist>;

    /// Replace the whole threshold map; empty thresholds are dropped
    async fn set_alert_thresholds(
        &self,
        identity: &Identity,
        thresholds: BTreeMap<Ticker, AlertThreshold>,
    ) -> StoreResult<Watchlist>;

    async fn portfolio(&self, identity: &Identity) -> StoreResult<Portfolio>;

    async fn save_portfolio(&self, identity: &Identity, portfolio: Portfolio) -> StoreResult<()>;
}
