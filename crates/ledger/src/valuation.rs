//! Portfolio valuation at current prices

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use stockwatch_core::{fixed2, HoldingView, Portfolio, PortfolioView};
use stockwatch_price_feed::PriceBatch;

/// Value `portfolio` against `prices`
///
/// A holding without a current price counts at cost and has no unrealized P&L.
pub fn value(portfolio: &Portfolio, prices: &PriceBatch) -> PortfolioView {
    let mut holdings = BTreeMap::new();
    let mut holdings_value = Decimal::ZERO;
    let mut unrealized = Decimal::ZERO;

    for (ticker, holding) in &portfolio.holdings {
        let price = prices.quote(*ticker).map(|q| q.price);
        let market_value = price.map(|p| p * Decimal::from(holding.quantity));
        let pnl = market_value.map(|v| v - holding.cost_basis());

        holdings_value += market_value.unwrap_or_else(|| holding.cost_basis());
        unrealized += pnl.unwrap_or(Decimal::ZERO);

        holdings.insert(
            *ticker,
            HoldingView {
                quantity: holding.quantity,
                average_cost: fixed2(holding.average_cost),
                price: price.map(fixed2),
                market_value: market_value.map(fixed2),
                unrealized_pnl: pnl.map(fixed2),
            },
        );
    }

    PortfolioView {
        cash: fixed2(portfolio.cash),
        holdings,
        holdings_value: fixed2(holdings_value),
        total_value: fixed2(portfolio.cash + holdings_value),
        unrealized_pnl: fixed2(unrealized),
    }
}
