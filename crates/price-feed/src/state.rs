//! Published price state
//!
//! The whole batch is swapped in one step, so readers never see a mix of
//! two ticks.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use stockwatch_core::{Quote, SimulatorConfig, Ticker};

/// One tick's quotes for every ticker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBatch {
    /// Tick sequence number, 0 for the opening batch
    pub tick: u64,
    pub published_at: DateTime<Utc>,
    pub quotes: BTreeMap<Ticker, Quote>,
}

impl PriceBatch {
    /// Opening batch with no movement
    pub fn opening(config: &SimulatorConfig) -> Self {
        Self {
            tick: 0,
            published_at: Utc::now(),
            quotes: Ticker::ALL
                .iter()
                .map(|t| (*t, Quote::opening(config.initial_price(*t))))
                .collect(),
        }
    }

    pub fn quote(&self, ticker: Ticker) -> Option<&Quote> {
        self.quotes.get(&ticker)
    }
}

/// Current price batch with change notification
#[derive(Debug)]
pub struct PriceBook {
    current: watch::Sender<Arc<PriceBatch>>,

    /// Stats
    update_count: AtomicU64,
    last_update: RwLock<Instant>,
}

impl PriceBook {
    pub fn new(opening: PriceBatch) -> Self {
        let (current, _) = watch::channel(Arc::new(opening));
        Self {
            current,
            update_count: AtomicU64::new(0),
            last_update: RwLock::new(Instant::now()),
        }
    }

    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self::new(PriceBatch::opening(config))
    }

    /// Full current batch
    pub fn snapshot(&self) -> Arc<PriceBatch> {
        Arc::clone(&self.current.borrow())
    }

    /// Current quote for one ticker
    pub fn quote(&self, ticker: Ticker) -> Option<Quote> {
        self.current.borrow().quote(ticker).copied()
    }

    /// Replace the whole batch and wake subscribers
    pub fn publish(&self, batch: PriceBatch) -> Arc<PriceBatch> {
        let batch = Arc::new(batch);
        self.current.send_replace(Arc::clone(&batch));
        self.update_count.fetch_add(1, Ordering::Relaxed);
        *self.last_update.write() = Instant::now();
        batch
    }

    /// Receiver that wakes on every publish; a slow receiver only sees the newest batch
    pub fn subscribe(&self) -> watch::Receiver<Arc<PriceBatch>> {
        self.current.subscribe()
    }

    pub fn stats(&self) -> PriceBookStats {
        PriceBookStats {
            tick: self.current.borrow().tick,
            update_count: self.update_count.load(Ordering::Relaxed),
            last_update_age: self.last_update.read().elapsed(),
        }
    }
}

/// Statistics about the price book
#[derive(Debug, Clone)]
pub struct PriceBookStats {
    pub tick: u64,
    pub update_count: u64,
    pub last_update_age: Duration,
}
