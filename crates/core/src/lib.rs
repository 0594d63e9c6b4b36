//! Core types and utilities for the stock watch service
//!
//! This crate provides shared types used across all components:
//! - Ticker and quote definitions
//! - Identities, subscriptions and alert thresholds
//! - Alert and wire message types
//! - Portfolio types for virtual trading
//! - The identity store capability
//! - Configuration and error types

pub mod types;
pub mod watchlist;
pub mod alerts;
pub mod portfolio;
pub mod messages;
pub mod store;
pub mod config;
pub mod errors;

pub use types::*;
pub use watchlist::*;
pub use alerts::*;
pub use portfolio::*;
pub use messages::*;
pub use store::*;
pub use config::*;
pub use errors::*;
