//! Price movement models

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use stockwatch_core::Ticker;

/// Source of per-tick price deltas
pub trait PriceModel: Send {
    fn name(&self) -> &'static str;

    /// Signed move to apply to `price` this tick
    fn next_delta(&mut self, ticker: Ticker, price: Decimal) -> Decimal;
}

/// Uniform whole-cent random walk in `[-max_delta, +max_delta]`
pub struct RandomWalk {
    max_cents: i64,
    rng: StdRng,
}

impl RandomWalk {
    pub fn new(max_delta: Decimal) -> Self {
        Self::with_rng(max_delta, StdRng::from_entropy())
    }

    /// Reproducible walk for tests and replays
    pub fn seeded(max_delta: Decimal, seed: u64) -> Self {
        Self::with_rng(max_delta, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_delta: Decimal, rng: StdRng) -> Self {
        let max_cents = (max_delta.abs() * Decimal::ONE_HUNDRED)
            .trunc()
            .to_i64()
            .unwrap_or(0);
        Self { max_cents, rng }
    }
}

impl PriceModel for RandomWalk {
    fn name(&self) -> &'static str {
        "random-walk"
    }

    fn next_delta(&mut self, _ticker: Ticker, _price: Decimal) -> Decimal {
        if self.max_cents == 0 {
            return Decimal::ZERO;
        }
        let cents = self.rng.gen_range(-self.max_cents..=self.max_cents);
        Decimal::new(cents, 2)
    }
}
