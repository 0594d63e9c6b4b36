//! Per-tick fan-out of price updates and alerts
//!
//! For every registered identity: fetch its watchlist, build one
//! `stockUpdate` restricted to its subscriptions, evaluate alert rules, then
//! push the update followed by the alerts. Failures stay scoped to the
//! identity they happened for.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use stockwatch_core::{
    AlertConfig, DeliveryResult, IdentityStore, QuoteView, ServerEvent, Ticker, Watchlist,
};
use stockwatch_price_feed::PriceBatch;

use crate::registry::{ChannelId, ConnectionRegistry};
use crate::rules::RuleSet;

/// One-way, best-effort delivery to a live channel
pub trait PushChannel: Send + Sync {
    /// Must not block; a closed or congested channel is an error
    fn send(&self, channel: ChannelId, event: ServerEvent) -> DeliveryResult<()>;
}

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub identities: usize,
    pub updates_sent: usize,
    pub alerts_sent: usize,
    pub skipped_empty: usize,
    pub skipped_store: usize,
    pub delivery_failures: usize,
}

/// Fan-out engine driven by price ticks
pub struct FanoutEngine {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn IdentityStore>,
    push: Arc<dyn PushChannel>,
    rules: RuleSet,
}

impl FanoutEngine {
    pub fn new(
        config: &AlertConfig,
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn IdentityStore>,
        push: Arc<dyn PushChannel>,
    ) -> Self {
        Self {
            registry,
            store,
            push,
            rules: RuleSet::new(config),
        }
    }

    /// Messages for one identity this tick; `None` when it has no subscriptions
    pub fn build_messages(&self, batch: &PriceBatch, watchlist: &Watchlist) -> Option<Vec<ServerEvent>> {
        if watchlist.subscriptions.is_empty() {
            return None;
        }

        let mut prices: BTreeMap<Ticker, QuoteView> = BTreeMap::new();
        let mut alerts = Vec::new();

        for ticker in &watchlist.subscriptions {
            let Some(quote) = batch.quote(*ticker) else {
                continue;
            };
            prices.insert(*ticker, QuoteView::from(quote));
            alerts.extend(
                self.rules
                    .evaluate(*ticker, quote, watchlist.threshold(*ticker))
                    .into_iter()
                    .map(ServerEvent::from),
            );
        }

        let mut messages = Vec::with_capacity(1 + alerts.len());
        messages.push(ServerEvent::StockUpdate(prices));
        messages.extend(alerts);
        Some(messages)
    }

    /// Run one fan-out pass over a point-in-time registry snapshot
    pub async fn process_tick(&self, batch: &PriceBatch) -> TickReport {
        let snapshot = self.registry.snapshot();
        let mut report = TickReport {
            tick: batch.tick,
            identities: snapshot.len(),
            ..Default::default()
        };

        // Fetches are independent; issue them together
        let fetches = snapshot.iter().map(|(identity, channel)| async move {
            (identity, channel, self.store.watchlist(identity).await)
        });
        let fetched = join_all(fetches).await;

        for (identity, channel, result) in fetched {
            let watchlist = match result {
                Ok(watchlist) => watchlist,
                Err(e) if e.is_transient() => {
                    warn!("Skipping {} for tick {}, retrying next tick: {}", identity, batch.tick, e);
                    report.skipped_store += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Skipping {} for tick {}: {}", identity, batch.tick, e);
                    report.skipped_store += 1;
                    continue;
                }
            };

            let Some(messages) = self.build_messages(batch, &watchlist) else {
                report.skipped_empty += 1;
                continue;
            };

            for event in messages {
                let is_alert = matches!(event, ServerEvent::PriceAlert(_));
                match self.push.send(channel, event) {
                    Ok(()) if is_alert => report.alerts_sent += 1,
                    Ok(()) => report.updates_sent += 1,
                    Err(e) => {
                        debug!("Delivery to {} ({}) failed: {}", identity, channel, e);
                        report.delivery_failures += 1;
                        break;
                    }
                }
            }
        }

        report
    }

    /// Process every published batch until the feed closes or shutdown
    pub async fn run(
        self,
        mut ticks: watch::Receiver<Arc<PriceBatch>>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        info!("Starting fan-out engine with {} alert rules", self.rules.len());

        loop {
            tokio::select! {
                changed = ticks.changed() => {
                    if changed.is_err() {
                        info!("Price feed closed, stopping fan-out");
                        break;
                    }

                    let batch = Arc::clone(&ticks.borrow_and_update());
                    let start = Instant::now();
                    let report = self.process_tick(&batch).await;

                    debug!(
                        "Tick {}: {} identities, {} updates, {} alerts, {} skipped, {} failed in {:?}",
                        report.tick,
                        report.identities,
                        report.updates_sent,
                        report.alerts_sent,
                        report.skipped_empty + report.skipped_store,
                        report.delivery_failures,
                        start.elapsed()
                    );
                }
                _ = &mut shutdown => {
                    info!("Fan-out shutdown requested");
                    break;
                }
            }
        }
    }
}
