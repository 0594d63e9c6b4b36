//! Configuration types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::{CoreError, CoreResult, Ticker};

/// WebSocket listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Outbound queue depth per connection
    pub channel_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            channel_buffer: 64,
        }
    }
}

/// Price simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Controls simulator and fan-out cadence
    pub tick_interval_ms: u64,
    /// Simulated prices never drop below this
    pub floor: Decimal,
    /// Largest absolute move per tick
    pub max_delta: Decimal,
    pub initial_prices: BTreeMap<Ticker, Decimal>,
}

impl SimulatorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Opening price for a ticker, never below the floor
    pub fn initial_price(&self, ticker: Ticker) -> Decimal {
        self.initial_prices
            .get(&ticker)
            .copied()
            .unwrap_or_else(|| ticker.default_price())
            .max(self.floor)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            floor: Decimal::new(1_000, 2),
            max_delta: Decimal::new(500, 2),
            initial_prices: Ticker::ALL
                .iter()
                .map(|t| (*t, t.default_price()))
                .collect(),
        }
    }
}

/// Alert rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Sudden-change fires when |percent change| is strictly greater
    pub sudden_change_pct: Decimal,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            sudden_change_pct: Decimal::new(5, 0),
        }
    }
}

/// Identity store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file backing the store; in-memory when absent or unusable
    pub path: Option<PathBuf>,
    pub starting_cash: Decimal,
    /// Trades kept per portfolio
    pub history_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            starting_cash: Decimal::new(10_000, 0),
            history_limit: 100,
        }
    }
}

/// Login rate limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 10,
            window_secs: 60,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub simulator: SimulatorConfig,
    pub alerts: AlertConfig,
    pub store: StoreConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.simulator.tick_interval_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "simulator.tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.simulator.floor <= Decimal::ZERO {
            return Err(CoreError::InvalidConfig(
                "simulator.floor must be positive".to_string(),
            ));
        }
        if self.simulator.max_delta < Decimal::ZERO {
            return Err(CoreError::InvalidConfig(
                "simulator.max_delta must not be negative".to_string(),
            ));
        }
        if self.alerts.sudden_change_pct < Decimal::ZERO {
            return Err(CoreError::InvalidConfig(
                "alerts.sudden_change_pct must not be negative".to_string(),
            ));
        }
        if self.server.channel_buffer == 0 {
            return Err(CoreError::InvalidConfig(
                "server.channel_buffer must be positive".to_string(),
            ));
        }
        if self.rate_limit.enabled && self.rate_limit.window_secs == 0 {
            return Err(CoreError::InvalidConfig(
                "rate_limit.window_secs must be positive".to_string(),
            ));
        }
        if self.rate_limit.enabled && self.rate_limit.max_attempts == 0 {
            return Err(CoreError::InvalidConfig(
                "rate_limit.max_attempts must be positive".to_string(),
            ));
        }
        if self.store.starting_cash < Decimal::ZERO {
            return Err(CoreError::InvalidConfig(
                "store.starting_cash must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
