//! Alert rules evaluated per subscribed ticker

use rust_decimal::Decimal;

use stockwatch_core::{AlertConfig, AlertThreshold, PriceAlert, Quote, Ticker};

/// Rule trait for the different alert conditions
pub trait AlertRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        ticker: Ticker,
        quote: &Quote,
        threshold: Option<&AlertThreshold>,
    ) -> Option<PriceAlert>;
}

/// Fires when |percent change| is strictly above the limit
pub struct SuddenChangeRule {
    limit_pct: Decimal,
}

impl SuddenChangeRule {
    pub fn new(limit_pct: Decimal) -> Self {
        Self { limit_pct }
    }
}

impl AlertRule for SuddenChangeRule {
    fn name(&self) -> &'static str {
        "sudden-change"
    }

    fn evaluate(
        &self,
        ticker: Ticker,
        quote: &Quote,
        _threshold: Option<&AlertThreshold>,
    ) -> Option<PriceAlert> {
        (quote.change_percent.abs() > self.limit_pct)
            .then(|| PriceAlert::sudden_change(ticker, quote.change_percent, quote.price))
    }
}

/// Fires while price >= the user's `above` bound
pub struct ThresholdAboveRule;

impl AlertRule for ThresholdAboveRule {
    fn name(&self) -> &'static str {
        "threshold-above"
    }

    fn evaluate(
        &self,
        ticker: Ticker,
        quote: &Quote,
        threshold: Option<&AlertThreshold>,
    ) -> Option<PriceAlert> {
        let above = threshold?.above?;
        (quote.price >= above).then(|| PriceAlert::threshold_above(ticker, above, quote.price))
    }
}

/// Fires while price <= the user's `below` bound
pub struct ThresholdBelowRule;

impl AlertRule for ThresholdBelowRule {
    fn name(&self) -> &'static str {
        "threshold-below"
    }

    fn evaluate(
        &self,
        ticker: Ticker,
        quote: &Quote,
        threshold: Option<&AlertThreshold>,
    ) -> Option<PriceAlert> {
        let below = threshold?.below?;
        (quote.price <= below).then(|| PriceAlert::threshold_below(ticker, below, quote.price))
    }
}

/// Ordered rule set; alerts come out in rule order
pub struct RuleSet {
    rules: Vec<Box<dyn AlertRule>>,
}

impl RuleSet {
    pub fn new(config: &AlertConfig) -> Self {
        let rules: Vec<Box<dyn AlertRule>> = vec![
            Box::new(SuddenChangeRule::new(config.sudden_change_pct)),
            Box::new(ThresholdAboveRule),
            Box::new(ThresholdBelowRule),
        ];
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every alert that fires for this ticker, no deduplication across ticks
    pub fn evaluate(
        &self,
        ticker: Ticker,
        quote: &Quote,
        threshold: Option<&AlertThreshold>,
    ) -> Vec<PriceAlert> {
        self.rules
            .iter()
            .filter_map(|rule| rule.evaluate(ticker, quote, threshold))
            .collect()
    }
}
