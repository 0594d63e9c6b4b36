//! Virtual portfolio types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

use crate::Ticker;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Shares held in one ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub quantity: u32,
    pub average_cost: Decimal,
}

impl Holding {
    pub fn cost_basis(&self) -> Decimal {
        self.average_cost * Decimal::from(self.quantity)
    }
}

/// An executed virtual trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub ticker: Ticker,
    pub side: TradeSide,
    pub quantity: u32,
    pub price: Decimal,
    pub total: Decimal,
    /// Only set for sells
    pub realized_pnl: Option<Decimal>,
    pub executed_at: DateTime<Utc>,
}

/// Cash balance, open holdings and recent trades of one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: Decimal,
    #[serde(default)]
    pub holdings: BTreeMap<Ticker, Holding>,
    #[serde(default)]
    pub history: VecDeque<TradeRecord>,
}

impl Portfolio {
    pub fn with_cash(cash: Decimal) -> Self {
        Self {
            cash,
            holdings: BTreeMap::new(),
            history: VecDeque::new(),
        }
    }

    pub fn holding(&self, ticker: Ticker) -> Option<&Holding> {
        self.holdings.get(&ticker)
    }

    pub fn shares(&self, ticker: Ticker) -> u32 {
        self.holding(ticker).map(|h| h.quantity).unwrap_or(0)
    }

    /// Append a trade, keeping at most `limit` of the newest records
    pub fn record(&mut self, trade: TradeRecord, limit: usize) {
        self.history.push_back(trade);
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }
}
