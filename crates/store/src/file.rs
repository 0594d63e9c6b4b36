//! JSON-file-backed identity store
//!
//! The document is loaded once at open and rewritten after every mutation.
//! Reads are served from memory.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use stockwatch_core::{
    AlertThreshold, Identity, IdentityStore, Portfolio, StoreResult, Ticker, UserRecord,
    Watchlist,
};

use crate::memory::{replace_alerts, replace_subscriptions, MemoryStore};

/// On-disk document layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    users: Vec<UserRecord>,
}

/// Durable store persisting every user to one JSON document
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Load the document at `path`; a missing file starts empty
    pub async fn open(path: impl Into<PathBuf>, starting_cash: Decimal) -> StoreResult<Self> {
        let path = path.into();

        let document = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => StoreDocument::default(),
            Ok(bytes) => serde_json::from_slice::<StoreDocument>(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No store file at {:?}, starting empty", path);
                StoreDocument::default()
            }
            Err(e) => {
                error!("Failed to read store file {:?}: {}", path, e);
                return Err(e.into());
            }
        };

        info!("Loaded {} users from {:?}", document.users.len(), path);

        let store = Self {
            path,
            inner: MemoryStore::with_records(starting_cash, document.users),
            write_lock: Mutex::new(()),
        };
        // Fail at open, not on the first login, when the location is unwritable
        store.write_document(None).await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to a copy of the record, write it out, then commit it.
    /// A failed write leaves the in-memory record untouched.
    async fn mutate<T>(
        &self,
        identity: &Identity,
        f: impl FnOnce(&mut UserRecord) -> T,
    ) -> StoreResult<T> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.inner.get(identity)?;
        let output = f(&mut record);
        self.write_document(Some(&record)).await?;
        self.inner.put(record);
        Ok(output)
    }

    /// Rewrite the whole document via a temp file and rename, with `pending`
    /// in place of its committed version. Callers hold `write_lock`.
    async fn write_document(&self, pending: Option<&UserRecord>) -> StoreResult<()> {
        let mut users = self.inner.records();
        if let Some(pending) = pending {
            users.retain(|u| u.identity != pending.identity);
            users.push(pending.clone());
        }
        users.sort_by(|a, b| a.identity.cmp(&b.identity));
        let bytes = serde_json::to_vec_pretty(&StoreDocument { users })?;

        let tmp = self.path.with_extension("json.tmp");
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            error!("Failed to write store file {:?}: {}", tmp, e);
            return Err(e.into());
        }
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("Store written to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for FileStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn find_or_create(&self, identity: &Identity) -> StoreResult<UserRecord> {
        if let Ok(record) = self.inner.get(identity) {
            return Ok(record);
        }

        let _guard = self.write_lock.lock().await;
        // Another writer may have created it while we waited
        if self.inner.contains(identity) {
            return self.inner.get(identity);
        }

        let record = self.inner.new_record(identity);
        self.write_document(Some(&record)).await?;
        self.inner.put(record.clone());
        Ok(record)
    }

    async fn watchlist(&self, identity: &Identity) -> StoreResult<Watchlist> {
        self.inner.watchlist(identity).await
    }

    async fn set_subscriptions(
        &self,
        identity: &Identity,
        tickers: BTreeSet<Ticker>,
    ) -> StoreResult<Watchlist> {
        self.mutate(identity, |r| replace_subscriptions(r, tickers)).await
    }

    async fn set_alert_thresholds(
        &self,
        identity: &Identity,
        thresholds: BTreeMap<Ticker, AlertThreshold>,
    ) -> StoreResult<Watchlist> {
        self.mutate(identity, |r| replace_alerts(r, thresholds)).await
    }

    async fn portfolio(&self, identity: &Identity) -> StoreResult<Portfolio> {
        self.inner.portfolio(identity).await
    }

    async fn save_portfolio(&self, identity: &Identity, portfolio: Portfolio) -> StoreResult<()> {
        self.mutate(identity, |r| r.portfolio = portfolio).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockwatch_core::StoreError;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("stockwatch-{}-{}.json", name, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_reopen_keeps_users() {
        let path = temp_path("reopen");
        let alice = Identity::from_email("alice@example.com").unwrap();

        {
            let store = FileStore::open(&path, Decimal::new(500, 0)).await.unwrap();
            store.find_or_create(&alice).await.unwrap();
            store
                .set_subscriptions(&alice, [Ticker::Nvda].into_iter().collect())
                .await
                .unwrap();
        }

        let reopened = FileStore::open(&path, Decimal::new(500, 0)).await.unwrap();
        let watchlist = reopened.watchlist(&alice).await.unwrap();
        assert!(watchlist.is_subscribed(Ticker::Nvda));
        assert_eq!(
            reopened.portfolio(&alice).await.unwrap().cash,
            Decimal::new(500, 0)
        );

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_missing_fields_load_as_empty() {
        let path = temp_path("lenient");
        let doc = r#"{"users": [{
            "identity": "bob@example.com",
            "subscriptions": null,
            "portfolio": {"cash": "100"},
            "created_at": "2024-01-01T00:00:00Z"
        }]}"#;
        std::fs::write(&path, doc).unwrap();

        let store = FileStore::open(&path, Decimal::ZERO).await.unwrap();
        let bob = Identity::from_email("bob@example.com").unwrap();
        let watchlist = store.watchlist(&bob).await.unwrap();
        assert!(watchlist.subscriptions.is_empty());
        assert!(watchlist.alerts.is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let dir = std::env::temp_dir().join(format!("stockwatch-dir-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir(&dir).unwrap();
        let path = dir.join("users.json");
        let alice = Identity::from_email("alice@example.com").unwrap();
        let bob = Identity::from_email("bob@example.com").unwrap();

        let store = FileStore::open(&path, Decimal::new(1_000, 0)).await.unwrap();
        store.find_or_create(&alice).await.unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let result = store
            .save_portfolio(&alice, Portfolio::with_cash(Decimal::ZERO))
            .await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(
            store.portfolio(&alice).await.unwrap().cash,
            Decimal::new(1_000, 0)
        );

        let result = store
            .set_subscriptions(&alice, [Ticker::Goog].into_iter().collect())
            .await;
        assert!(result.is_err());
        assert!(store.watchlist(&alice).await.unwrap().subscriptions.is_empty());

        // Creation that never reached disk is not remembered
        assert!(store.find_or_create(&bob).await.is_err());
        assert!(store.find_or_create(&bob).await.is_err());
        assert!(matches!(
            store.watchlist(&bob).await,
            Err(StoreError::UnknownIdentity(_))
        ));

        // Once writable again, the retry is persisted
        std::fs::create_dir(&dir).unwrap();
        store.find_or_create(&bob).await.unwrap();
        let reopened = FileStore::open(&path, Decimal::new(1_000, 0)).await.unwrap();
        assert!(reopened.watchlist(&bob).await.is_ok());
        assert!(reopened.watchlist(&alice).await.is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_open_directory_fails() {
        let result = FileStore::open(std::env::temp_dir(), Decimal::ZERO).await;
        assert!(result.is_err());
    }
}
