//! Price alert types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Ticker;

/// Condition that produced an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    SuddenChange,
    ThresholdAbove,
    ThresholdBelow,
}

impl AlertKind {
    pub fn name(&self) -> &'static str {
        match self {
            AlertKind::SuddenChange => "sudden-change",
            AlertKind::ThresholdAbove => "threshold-above",
            AlertKind::ThresholdBelow => "threshold-below",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A fired alert for one ticker on one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceAlert {
    pub ticker: Ticker,
    pub kind: AlertKind,
    pub change_percent: Option<Decimal>,
    pub threshold: Option<Decimal>,
    pub price: Option<Decimal>,
}

impl PriceAlert {
    pub fn sudden_change(ticker: Ticker, change_percent: Decimal, price: Decimal) -> Self {
        Self {
            ticker,
            kind: AlertKind::SuddenChange,
            change_percent: Some(change_percent),
            threshold: None,
            price: Some(price),
        }
    }

    pub fn threshold_above(ticker: Ticker, threshold: Decimal, price: Decimal) -> Self {
        Self {
            ticker,
            kind: AlertKind::ThresholdAbove,
            change_percent: None,
            threshold: Some(threshold),
            price: Some(price),
        }
    }

    pub fn threshold_below(ticker: Ticker, threshold: Decimal, price: Decimal) -> Self {
        Self {
            ticker,
            kind: AlertKind::ThresholdBelow,
            change_percent: None,
            threshold: Some(threshold),
            price: Some(price),
        }
    }
}
