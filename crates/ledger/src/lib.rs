//! Virtual trading ledger
//!
//! Features:
//! - Buy/sell against the current simulated price
//! - Weighted average cost and realized P&L
//! - Capped trade history
//! - Portfolio valuation at current prices

pub mod executor;
pub mod valuation;

pub use executor::{execute, TradeExecutor, TradeOrder};
pub use valuation::value;
