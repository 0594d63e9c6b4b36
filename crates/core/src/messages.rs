//! Wire messages pushed to clients
//!
//! Every outbound frame is `{"event": <name>, "data": <payload>}`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::{
    fixed2, round2, AlertKind, AlertThreshold, PriceAlert, Quote, Ticker, TradeRecord, TradeSide, Watchlist,
};

/// Per-ticker entry of a `stockUpdate`, fixed two-decimal strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteView {
    pub price: String,
    pub change: String,
    pub change_percent: String,
}

impl From<&Quote> for QuoteView {
    fn from(quote: &Quote) -> Self {
        Self {
            price: fixed2(quote.price),
            change: fixed2(quote.change),
            change_percent: fixed2(quote.change_percent),
        }
    }
}

/// `priceAlert` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub ticker: Ticker,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "as_number")]
    pub change_percent: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "as_number")]
    pub threshold: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "as_number")]
    pub price: Option<Decimal>,
}

impl From<PriceAlert> for AlertPayload {
    fn from(alert: PriceAlert) -> Self {
        Self {
            ticker: alert.ticker,
            kind: alert.kind,
            change_percent: alert.change_percent,
            threshold: alert.threshold,
            price: alert.price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThresholdView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below: Option<String>,
}

impl From<&AlertThreshold> for ThresholdView {
    fn from(threshold: &AlertThreshold) -> Self {
        Self {
            above: threshold.above.map(fixed2),
            below: threshold.below.map(fixed2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchlistView {
    pub subscriptions: Vec<Ticker>,
    pub alerts: BTreeMap<Ticker, ThresholdView>,
}

impl From<&Watchlist> for WatchlistView {
    fn from(watchlist: &Watchlist) -> Self {
        Self {
            subscriptions: watchlist.subscriptions.iter().copied().collect(),
            alerts: watchlist
                .alerts
                .iter()
                .map(|(ticker, threshold)| (*ticker, ThresholdView::from(threshold)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingView {
    pub quantity: u32,
    pub average_cost: String,
    pub price: Option<String>,
    pub market_value: Option<String>,
    pub unrealized_pnl: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioView {
    pub cash: String,
    pub holdings: BTreeMap<Ticker, HoldingView>,
    pub holdings_value: String,
    pub total_value: String,
    pub unrealized_pnl: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeView {
    pub id: String,
    pub ticker: Ticker,
    pub side: TradeSide,
    pub quantity: u32,
    pub price: String,
    pub total: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<String>,
    pub executed_at: String,
}

impl From<&TradeRecord> for TradeView {
    fn from(trade: &TradeRecord) -> Self {
        Self {
            id: trade.id.to_string(),
            ticker: trade.ticker,
            side: trade.side,
            quantity: trade.quantity,
            price: fixed2(trade.price),
            total: fixed2(trade.total),
            realized_pnl: trade.realized_pnl.map(fixed2),
            executed_at: trade.executed_at.to_rfc3339(),
        }
    }
}

/// Server-to-client events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    StockUpdate(BTreeMap<Ticker, QuoteView>),
    PriceAlert(AlertPayload),
    Session {
        email: String,
        watchlist: WatchlistView,
        portfolio: PortfolioView,
    },
    Watchlist(WatchlistView),
    Portfolio(PortfolioView),
    TradeExecuted {
        trade: TradeView,
        portfolio: PortfolioView,
    },
    Error {
        message: String,
    },
    Pong {
        timestamp: i64,
    },
}

impl ServerEvent {
    /// Event name as seen on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::StockUpdate(_) => "stockUpdate",
            ServerEvent::PriceAlert(_) => "priceAlert",
            ServerEvent::Session { .. } => "session",
            ServerEvent::Watchlist(_) => "watchlist",
            ServerEvent::Portfolio(_) => "portfolio",
            ServerEvent::TradeExecuted { .. } => "tradeExecuted",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Pong { .. } => "pong",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}

impl From<PriceAlert> for ServerEvent {
    fn from(alert: PriceAlert) -> Self {
        ServerEvent::PriceAlert(alert.into())
    }
}

fn as_number<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value.and_then(|v| round2(v).to_f64()) {
        Some(v) => serializer.serialize_f64(v),
        None => serializer.serialize_none(),
    }
}
