//! Identities and their per-user watch configuration

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{CoreError, Ticker};

/// A user key: the normalized email address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Normalize and validate an email into an identity
    pub fn from_email(email: &str) -> Result<Self, CoreError> {
        let normalized = email.trim().to_lowercase();

        let mut parts = normalized.split('@');
        let valid = match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => !local.is_empty() && !domain.is_empty(),
            _ => false,
        };

        if !valid {
            return Err(CoreError::InvalidEmail(email.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Optional price bounds for one ticker; either side may be absent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThreshold {
    #[serde(default)]
    pub above: Option<Decimal>,
    #[serde(default)]
    pub below: Option<Decimal>,
}

impl AlertThreshold {
    pub fn above(value: Decimal) -> Self {
        Self {
            above: Some(value),
            below: None,
        }
    }

    pub fn below(value: Decimal) -> Self {
        Self {
            above: None,
            below: Some(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.above.is_none() && self.below.is_none()
    }
}

/// Subscriptions and alert thresholds read by the fan-out engine each tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchlist {
    #[serde(default, deserialize_with = "lenient::tickers")]
    pub subscriptions: BTreeSet<Ticker>,
    #[serde(default, deserialize_with = "lenient::thresholds")]
    pub alerts: BTreeMap<Ticker, AlertThreshold>,
}

impl Watchlist {
    pub fn is_subscribed(&self, ticker: Ticker) -> bool {
        self.subscriptions.contains(&ticker)
    }

    pub fn threshold(&self, ticker: Ticker) -> Option<&AlertThreshold> {
        self.alerts.get(&ticker)
    }

    /// Insert or replace the threshold for a ticker; an empty threshold clears it
    pub fn set_threshold(&mut self, ticker: Ticker, threshold: AlertThreshold) {
        if threshold.is_empty() {
            self.alerts.remove(&ticker);
        } else {
            self.alerts.insert(ticker, threshold);
        }
    }
}

/// Persisted user data may be missing, null or malformed; bad entries are dropped
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::{BTreeMap, BTreeSet};

    use crate::{AlertThreshold, Ticker};

    pub fn tickers<'de, D>(deserializer: D) -> Result<BTreeSet<Ticker>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tickers = match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => BTreeSet::new(),
        };
        Ok(tickers)
    }

    pub fn thresholds<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<Ticker, AlertThreshold>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let thresholds = match Value::deserialize(deserializer)? {
            Value::Object(entries) => entries
                .into_iter()
                .filter_map(|(key, value)| {
                    let ticker = key.parse::<Ticker>().ok()?;
                    let threshold = serde_json::from_value::<AlertThreshold>(value).ok()?;
                    (!threshold.is_empty()).then_some((ticker, threshold))
                })
                .collect(),
            _ => BTreeMap::new(),
        };
        Ok(thresholds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_normalization() {
        let id = Identity::from_email("  Alice@Example.COM ").unwrap();
        assert_eq!(id.as_str(), "alice@example.com");
    }

    #[test]
    fn test_identity_rejects_malformed() {
        for bad in ["", "alice", "@example.com", "alice@", "a@b@c"] {
            assert!(
                matches!(Identity::from_email(bad), Err(CoreError::InvalidEmail(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_threshold_clears_entry() {
        let mut watchlist = Watchlist::default();
        watchlist.set_threshold(Ticker::Tsla, AlertThreshold::above(Decimal::new(500, 0)));
        assert!(watchlist.threshold(Ticker::Tsla).is_some());

        watchlist.set_threshold(Ticker::Tsla, AlertThreshold::default());
        assert!(watchlist.threshold(Ticker::Tsla).is_none());
    }

    #[test]
    fn test_null_fields_read_as_empty() {
        let watchlist: Watchlist =
            serde_json::from_str(r#"{"subscriptions": null, "alerts": null}"#).unwrap();
        assert!(watchlist.subscriptions.is_empty());
        assert!(watchlist.alerts.is_empty());

        let watchlist: Watchlist = serde_json::from_str("{}").unwrap();
        assert_eq!(watchlist, Watchlist::default());
    }

    #[test]
    fn test_malformed_fields_read_as_empty() {
        let watchlist: Watchlist = serde_json::from_str(
            r#"{"subscriptions": "GOOG", "alerts": {"AAPL": {"above": 1}, "TSLA": {"above": "x"}}}"#,
        )
        .unwrap();
        assert_eq!(watchlist, Watchlist::default());

        let watchlist: Watchlist = serde_json::from_str(
            r#"{"subscriptions": ["goog", "AAPL", 7], "alerts": {"NVDA": {"below": 800}, "META": {}}}"#,
        )
        .unwrap();
        assert_eq!(watchlist.subscriptions.len(), 1);
        assert!(watchlist.is_subscribed(Ticker::Goog));
        assert_eq!(watchlist.alerts.len(), 1);
        assert_eq!(
            watchlist.threshold(Ticker::Nvda),
            Some(&AlertThreshold::below(Decimal::new(800, 0)))
        );
    }
}
