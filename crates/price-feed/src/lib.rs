//! Simulated price feed
//!
//! Features:
//! - Fixed ticker set with configurable opening prices
//! - Pluggable per-tick price models
//! - Floor-protected prices, change measured against the previous tick
//! - Whole-batch publication with latest-value notifications

pub mod model;
pub mod simulator;
pub mod state;

pub use model::{PriceModel, RandomWalk};
pub use simulator::PriceSimulator;
pub use state::{PriceBatch, PriceBook, PriceBookStats};
