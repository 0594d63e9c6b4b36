//! Free-running price simulator

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use stockwatch_core::{Quote, SimulatorConfig, Ticker};

use crate::model::{PriceModel, RandomWalk};
use crate::state::{PriceBatch, PriceBook};

/// Advances every ticker once per tick and publishes the batch
pub struct PriceSimulator {
    config: SimulatorConfig,
    book: Arc<PriceBook>,
    model: Box<dyn PriceModel>,
}

impl PriceSimulator {
    pub fn new(config: SimulatorConfig, book: Arc<PriceBook>) -> Self {
        let model = Box::new(RandomWalk::new(config.max_delta));
        Self::with_model(config, book, model)
    }

    pub fn with_model(
        config: SimulatorConfig,
        book: Arc<PriceBook>,
        model: Box<dyn PriceModel>,
    ) -> Self {
        Self {
            config,
            book,
            model,
        }
    }

    /// Get shared book reference
    pub fn book(&self) -> Arc<PriceBook> {
        Arc::clone(&self.book)
    }

    /// Compute the next batch from the current one and publish it
    pub fn step(&mut self) -> Arc<PriceBatch> {
        let current = self.book.snapshot();
        let floor = self.config.floor;

        let quotes: BTreeMap<Ticker, Quote> = Ticker::ALL
            .iter()
            .map(|ticker| {
                let previous = current
                    .quote(*ticker)
                    .map(|q| q.price)
                    .unwrap_or_else(|| self.config.initial_price(*ticker));
                let delta = self.model.next_delta(*ticker, previous);
                let next = (previous + delta).round_dp(2).max(floor);
                (*ticker, Quote::moved(previous, next))
            })
            .collect();

        self.book.publish(PriceBatch {
            tick: current.tick + 1,
            published_at: Utc::now(),
            quotes,
        })
    }

    /// Tick until shutdown; the period does not adapt to consumer speed
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let period = self.config.tick_interval();
        info!(
            "Starting price simulator ({} model, {:?} period, floor {})",
            self.model.name(),
            period,
            self.config.floor
        );

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; the opening batch covers it
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let batch = self.step();
                    debug!("Published tick {} ({} quotes)", batch.tick, batch.quotes.len());
                }
                _ = &mut shutdown => {
                    info!("Price simulator shutdown requested");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    /// Replays scripted deltas per ticker, zero once exhausted
    struct Scripted {
        deltas: HashMap<Ticker, Vec<Decimal>>,
    }

    impl Scripted {
        fn new(ticker: Ticker, cents: &[i64]) -> Self {
            let mut deltas = HashMap::new();
            deltas.insert(ticker, cents.iter().rev().map(|c| Decimal::new(*c, 2)).collect());
            Self { deltas }
        }
    }

    impl PriceModel for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn next_delta(&mut self, ticker: Ticker, _price: Decimal) -> Decimal {
            self.deltas
                .get_mut(&ticker)
                .and_then(|d| d.pop())
                .unwrap_or(Decimal::ZERO)
        }
    }

    fn config_with(ticker: Ticker, price: Decimal) -> SimulatorConfig {
        let mut config = SimulatorConfig::default();
        config.initial_prices.insert(ticker, price);
        config
    }

    fn simulator(config: SimulatorConfig, model: impl PriceModel + 'static) -> PriceSimulator {
        let book = Arc::new(PriceBook::from_config(&config));
        PriceSimulator::with_model(config, book, Box::new(model))
    }

    #[test]
    fn test_drop_of_six_percent() {
        let config = config_with(Ticker::Goog, Decimal::new(10_000, 2));
        let mut sim = simulator(config, Scripted::new(Ticker::Goog, &[-600]));

        let batch = sim.step();
        let goog = batch.quote(Ticker::Goog).unwrap();

        assert_eq!(batch.tick, 1);
        assert_eq!(goog.price, Decimal::new(9_400, 2));
        assert_eq!(goog.change, Decimal::new(-600, 2));
        assert_eq!(goog.change_percent, Decimal::new(-6, 0));
    }

    #[test]
    fn test_floor_holds() {
        let config = config_with(Ticker::Tsla, Decimal::new(1_200, 2));
        let mut sim = simulator(config, Scripted::new(Ticker::Tsla, &[-500, -500]));

        let first = sim.step();
        let tsla = first.quote(Ticker::Tsla).unwrap();
        assert_eq!(tsla.price, Decimal::new(1_000, 2));
        assert_eq!(tsla.change, Decimal::new(-200, 2));

        let second = sim.step();
        let tsla = second.quote(Ticker::Tsla).unwrap();
        assert_eq!(tsla.price, Decimal::new(1_000, 2));
        assert_eq!(tsla.change, Decimal::ZERO);
        assert_eq!(tsla.change_percent, Decimal::ZERO);
    }

    #[test]
    fn test_percent_uses_previous_tick_only() {
        let config = config_with(Ticker::Amzn, Decimal::new(10_000, 2));
        let mut sim = simulator(config, Scripted::new(Ticker::Amzn, &[1_000, 1_100]));

        sim.step();
        let batch = sim.step();
        let amzn = batch.quote(Ticker::Amzn).unwrap();

        // 110.00 -> 121.00 is +10%, not +21% from the opening price
        assert_eq!(amzn.price, Decimal::new(12_100, 2));
        assert_eq!(amzn.change_percent, Decimal::new(10, 0));
    }

    #[test]
    fn test_step_publishes_every_ticker() {
        let config = SimulatorConfig::default();
        let mut sim = simulator(config, RandomWalk::seeded(Decimal::new(5, 0), 3));

        let batch = sim.step();
        assert_eq!(batch.quotes.len(), Ticker::ALL.len());
        assert_eq!(sim.book().snapshot().tick, 1);
    }

    #[tokio::test]
    async fn test_run_publishes_and_stops() {
        let mut config = SimulatorConfig::default();
        config.tick_interval_ms = 10;
        let sim = simulator(config, RandomWalk::seeded(Decimal::new(5, 0), 9));
        let book = sim.book();
        let mut rx = book.subscribe();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(sim.run(shutdown_rx));

        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("tick within timeout")
            .unwrap();
        assert!(rx.borrow().tick >= 1);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    proptest! {
        #[test]
        fn prop_price_never_below_floor(seed in any::<u64>(), ticks in 1usize..200) {
            let mut config = SimulatorConfig::default();
            config.max_delta = Decimal::new(5_000, 2);
            let floor = config.floor;
            let mut sim = simulator(config.clone(), RandomWalk::seeded(config.max_delta, seed));

            for _ in 0..ticks {
                let before = sim.book().snapshot();
                let batch = sim.step();
                for (ticker, quote) in &batch.quotes {
                    prop_assert!(quote.price >= floor);
                    let previous = before.quote(*ticker).unwrap().price;
                    prop_assert_eq!(quote.change, quote.price - previous);
                    prop_assert_eq!(
                        quote.change_percent,
                        Decimal::ONE_HUNDRED * quote.change / previous
                    );
                }
            }
        }
    }
}
