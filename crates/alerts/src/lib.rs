//! Alert evaluation and per-tick fan-out
//!
//! Components:
//! - Registry: identity to live-channel mapping
//! - Rules: sudden-change and threshold alert conditions
//! - Fan-out: per-tick delivery of updates and alerts

pub mod fanout;
pub mod registry;
pub mod rules;

pub use fanout::{FanoutEngine, PushChannel, TickReport};
pub use registry::{ChannelId, ConnectionRegistry, RegistrySnapshot};
pub use rules::{AlertRule, RuleSet, SuddenChangeRule, ThresholdAboveRule, ThresholdBelowRule};
