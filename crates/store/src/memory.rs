//! In-memory identity store

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

use stockwatch_core::{
    AlertThreshold, Identity, IdentityStore, Portfolio, StoreError, StoreResult, Ticker,
    UserRecord, Watchlist,
};

/// Process-lifetime store backed by a concurrent map
#[derive(Debug)]
pub struct MemoryStore {
    users: DashMap<Identity, UserRecord>,
    starting_cash: Decimal,
}

impl MemoryStore {
    pub fn new(starting_cash: Decimal) -> Self {
        Self::with_records(starting_cash, Vec::new())
    }

    pub fn with_records(starting_cash: Decimal, records: Vec<UserRecord>) -> Self {
        let users = DashMap::new();
        for record in records {
            users.insert(record.identity.clone(), record);
        }
        Self {
            users,
            starting_cash,
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Copy of every record, for persistence
    pub fn records(&self) -> Vec<UserRecord> {
        self.users.iter().map(|e| e.value().clone()).collect()
    }

    /// Fresh record for `identity`, not yet inserted
    pub(crate) fn new_record(&self, identity: &Identity) -> UserRecord {
        UserRecord::new(identity.clone(), Portfolio::with_cash(self.starting_cash))
    }

    pub(crate) fn get(&self, identity: &Identity) -> StoreResult<UserRecord> {
        self.read(identity, UserRecord::clone)
    }

    pub(crate) fn contains(&self, identity: &Identity) -> bool {
        self.users.contains_key(identity)
    }

    /// Insert or replace a whole record
    pub(crate) fn put(&self, record: UserRecord) {
        self.users.insert(record.identity.clone(), record);
    }

    fn update<T>(
        &self,
        identity: &Identity,
        f: impl FnOnce(&mut UserRecord) -> T,
    ) -> StoreResult<T> {
        let mut entry = self
            .users
            .get_mut(identity)
            .ok_or_else(|| StoreError::UnknownIdentity(identity.to_string()))?;
        Ok(f(entry.value_mut()))
    }

    fn read<T>(&self, identity: &Identity, f: impl FnOnce(&UserRecord) -> T) -> StoreResult<T> {
        self.users
            .get(identity)
            .map(|entry| f(entry.value()))
            .ok_or_else(|| StoreError::UnknownIdentity(identity.to_string()))
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find_or_create(&self, identity: &Identity) -> StoreResult<UserRecord> {
        Ok(self
            .users
            .entry(identity.clone())
            .or_insert_with(|| self.new_record(identity))
            .value()
            .clone())
    }

    async fn watchlist(&self, identity: &Identity) -> StoreResult<Watchlist> {
        self.read(identity, |r| r.watchlist.clone())
    }

    async fn set_subscriptions(
        &self,
        identity: &Identity,
        tickers: BTreeSet<Ticker>,
    ) -> StoreResult<Watchlist> {
        self.update(identity, |r| replace_subscriptions(r, tickers))
    }

    async fn set_alert_thresholds(
        &self,
        identity: &Identity,
        thresholds: BTreeMap<Ticker, AlertThreshold>,
    ) -> StoreResult<Watchlist> {
        self.update(identity, |r| replace_alerts(r, thresholds))
    }

    async fn portfolio(&self, identity: &Identity) -> StoreResult<Portfolio> {
        self.read(identity, |r| r.portfolio.clone())
    }

    async fn save_portfolio(&self, identity: &Identity, portfolio: Portfolio) -> StoreResult<()> {
        self.update(identity, |r| r.portfolio = portfolio)
    }
}

pub(crate) fn replace_subscriptions(record: &mut UserRecord, tickers: BTreeSet<Ticker>) -> Watchlist {
    record.watchlist.subscriptions = tickers;
    record.watchlist.clone()
}

/// Empty thresholds are dropped rather than stored
pub(crate) fn replace_alerts(
    record: &mut UserRecord,
    thresholds: BTreeMap<Ticker, AlertThreshold>,
) -> Watchlist {
    record.watchlist.alerts = thresholds
        .into_iter()
        .filter(|(_, t)| !t.is_empty())
        .collect();
    record.watchlist.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::from_email("alice@example.com").unwrap()
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let store = MemoryStore::new(Decimal::new(10_000, 0));

        let first = store.find_or_create(&alice()).await.unwrap();
        let second = store.find_or_create(&alice()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(first.portfolio.cash, Decimal::new(10_000, 0));
        assert!(first.watchlist.subscriptions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_identity() {
        let store = MemoryStore::new(Decimal::ZERO);
        let result = store.watchlist(&alice()).await;
        assert!(matches!(result, Err(StoreError::UnknownIdentity(_))));
    }

    #[tokio::test]
    async fn test_watchlist_updates() {
        let store = MemoryStore::new(Decimal::ZERO);
        store.find_or_create(&alice()).await.unwrap();

        let tickers: BTreeSet<Ticker> = [Ticker::Goog, Ticker::Tsla].into_iter().collect();
        store.set_subscriptions(&alice(), tickers.clone()).await.unwrap();

        let mut thresholds = BTreeMap::new();
        thresholds.insert(Ticker::Tsla, AlertThreshold::above(Decimal::new(500, 0)));
        thresholds.insert(Ticker::Goog, AlertThreshold::default());
        store.set_alert_thresholds(&alice(), thresholds).await.unwrap();

        let watchlist = store.watchlist(&alice()).await.unwrap();
        assert_eq!(watchlist.subscriptions, tickers);
        assert_eq!(watchlist.alerts.len(), 1);
        assert!(watchlist.threshold(Ticker::Goog).is_none());
    }
}
