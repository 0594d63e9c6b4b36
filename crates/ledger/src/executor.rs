//! Trade execution against a user's portfolio

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use stockwatch_core::{
    fixed2, Holding, Identity, IdentityStore, LedgerError, LedgerResult, Portfolio, Ticker,
    TradeRecord, TradeSide,
};
use stockwatch_price_feed::PriceBook;

/// Requested trade; quantity is validated at execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TradeOrder {
    pub ticker: Ticker,
    pub side: TradeSide,
    pub quantity: i64,
}

impl TradeOrder {
    pub fn buy(ticker: Ticker, quantity: i64) -> Self {
        Self {
            ticker,
            side: TradeSide::Buy,
            quantity,
        }
    }

    pub fn sell(ticker: Ticker, quantity: i64) -> Self {
        Self {
            ticker,
            side: TradeSide::Sell,
            quantity,
        }
    }
}

/// Apply `order` at `price` to `portfolio`
///
/// On error the portfolio is left untouched.
pub fn execute(
    portfolio: &mut Portfolio,
    order: &TradeOrder,
    price: Decimal,
    history_limit: usize,
) -> LedgerResult<TradeRecord> {
    let quantity = u32::try_from(order.quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or(LedgerError::InvalidQuantity)?;
    let total = price * Decimal::from(quantity);

    let realized_pnl = match order.side {
        TradeSide::Buy => {
            if total > portfolio.cash {
                return Err(LedgerError::InsufficientFunds {
                    needed: fixed2(total),
                    available: fixed2(portfolio.cash),
                });
            }

            let held = portfolio.holding(order.ticker).copied().unwrap_or(Holding {
                quantity: 0,
                average_cost: Decimal::ZERO,
            });
            let new_quantity = held
                .quantity
                .checked_add(quantity)
                .ok_or(LedgerError::InvalidQuantity)?;
            let average_cost = (held.cost_basis() + total) / Decimal::from(new_quantity);

            portfolio.cash -= total;
            portfolio.holdings.insert(
                order.ticker,
                Holding {
                    quantity: new_quantity,
                    average_cost,
                },
            );
            None
        }
        TradeSide::Sell => {
            let held = portfolio.shares(order.ticker);
            let Some(holding) = portfolio
                .holdings
                .get_mut(&order.ticker)
                .filter(|h| h.quantity >= quantity)
            else {
                return Err(LedgerError::InsufficientShares {
                    ticker: order.ticker,
                    needed: quantity,
                    held,
                });
            };

            let pnl = (price - holding.average_cost) * Decimal::from(quantity);
            holding.quantity -= quantity;
            if holding.quantity == 0 {
                portfolio.holdings.remove(&order.ticker);
            }
            portfolio.cash += total;
            Some(pnl)
        }
    };

    let trade = TradeRecord {
        id: Uuid::new_v4(),
        ticker: order.ticker,
        side: order.side,
        quantity,
        price,
        total,
        realized_pnl,
        executed_at: Utc::now(),
    };
    portfolio.record(trade.clone(), history_limit);

    Ok(trade)
}

/// Executes orders for stored users at the current simulated price
#[derive(Debug, Clone)]
pub struct TradeExecutor {
    history_limit: usize,
}

impl TradeExecutor {
    pub fn new(history_limit: usize) -> Self {
        Self { history_limit }
    }

    /// Load, trade, save. Returns the trade and the updated portfolio
    pub async fn execute_for(
        &self,
        store: &dyn IdentityStore,
        identity: &Identity,
        order: &TradeOrder,
        book: &PriceBook,
    ) -> LedgerResult<(TradeRecord, Portfolio)> {
        let quote = book
            .quote(order.ticker)
            .ok_or(LedgerError::PriceUnavailable(order.ticker))?;

        let mut portfolio = store.portfolio(identity).await?;
        let trade = match execute(&mut portfolio, order, quote.price, self.history_limit) {
            Ok(trade) => trade,
            Err(e) => {
                debug!("Rejected {:?} {} x{} for {}: {}", order.side, order.ticker, order.quantity, identity, e);
                return Err(e);
            }
        };
        store.save_portfolio(identity, portfolio.clone()).await?;

        info!(
            target: "audit",
            trade_id = %trade.id,
            identity = %identity,
            ticker = %trade.ticker,
            side = ?trade.side,
            quantity = trade.quantity,
            price = %trade.price,
            cash = %portfolio.cash,
            "Trade executed"
        );

        Ok((trade, portfolio))
    }
}

impl Default for TradeExecutor {
    fn default() -> Self {
        Self::new(100)
    }
}
