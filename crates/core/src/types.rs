//! Core type definitions

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Supported ticker symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Ticker {
    Goog,
    Tsla,
    Amzn,
    Meta,
    Nvda,
}

impl Ticker {
    /// Every ticker the simulator quotes, in display order
    pub const ALL: [Ticker; 5] = [
        Ticker::Goog,
        Ticker::Tsla,
        Ticker::Amzn,
        Ticker::Meta,
        Ticker::Nvda,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Ticker::Goog => "GOOG",
            Ticker::Tsla => "TSLA",
            Ticker::Amzn => "AMZN",
            Ticker::Meta => "META",
            Ticker::Nvda => "NVDA",
        }
    }

    /// Opening price used when no initial price is configured
    pub fn default_price(&self) -> Decimal {
        match self {
            Ticker::Goog => Decimal::new(14_000, 2),
            Ticker::Tsla => Decimal::new(25_000, 2),
            Ticker::Amzn => Decimal::new(18_000, 2),
            Ticker::Meta => Decimal::new(48_000, 2),
            Ticker::Nvda => Decimal::new(90_000, 2),
        }
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Ticker {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Ticker::ALL
            .iter()
            .copied()
            .find(|t| t.symbol().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoreError::UnknownTicker(s.to_string()))
    }
}

impl TryFrom<String> for Ticker {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Latest simulated quote for one ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Decimal,
    /// Absolute change from the previous tick's price
    pub change: Decimal,
    /// Percent change from the previous tick's price
    pub change_percent: Decimal,
}

impl Quote {
    /// Quote with no movement yet
    pub fn opening(price: Decimal) -> Self {
        Self {
            price,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
        }
    }

    /// Quote for `price` measured against `previous`
    pub fn moved(previous: Decimal, price: Decimal) -> Self {
        let change = price - previous;
        let change_percent = if previous.is_zero() {
            Decimal::ZERO
        } else {
            Decimal::ONE_HUNDRED * change / previous
        };
        Self {
            price,
            change,
            change_percent,
        }
    }
}

/// Round half away from zero to two places, as every wire value is
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format a decimal with exactly two fractional digits
pub fn fixed2(value: Decimal) -> String {
    format!("{:.2}", round2(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_parsing() {
        assert_eq!("GOOG".parse::<Ticker>().unwrap(), Ticker::Goog);
        assert_eq!(" tsla ".parse::<Ticker>().unwrap(), Ticker::Tsla);
        assert!(matches!(
            "AAPL".parse::<Ticker>(),
            Err(CoreError::UnknownTicker(_))
        ));
    }

    #[test]
    fn test_ticker_serde() {
        let json = serde_json::to_string(&Ticker::Nvda).unwrap();
        assert_eq!(json, "\"NVDA\"");
        let back: Ticker = serde_json::from_str("\"META\"").unwrap();
        assert_eq!(back, Ticker::Meta);
        let lower: Ticker = serde_json::from_str("\"goog\"").unwrap();
        assert_eq!(lower, Ticker::Goog);
    }

    #[test]
    fn test_quote_moved() {
        let quote = Quote::moved(Decimal::new(10_000, 2), Decimal::new(9_400, 2));
        assert_eq!(quote.change, Decimal::new(-600, 2));
        assert_eq!(quote.change_percent, Decimal::new(-6, 0));
    }

    #[test]
    fn test_fixed2() {
        assert_eq!(fixed2(Decimal::new(94, 0)), "94.00");
        assert_eq!(fixed2(Decimal::new(-6, 0)), "-6.00");
        assert_eq!(fixed2(Decimal::new(123_456, 3)), "123.46");
    }
}
