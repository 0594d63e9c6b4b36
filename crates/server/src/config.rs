//! Configuration loading
//!
//! Layers, lowest first: built-in defaults, optional TOML file
//! (`STOCKWATCH_CONFIG`, default `stockwatch.toml`), then `STOCKWATCH__*`
//! environment variables, e.g. `STOCKWATCH__SIMULATOR__TICK_INTERVAL_MS=500`.

use config::{Config, Environment, File};
use std::env;

use stockwatch_core::AppConfig;

pub const CONFIG_PATH_VAR: &str = "STOCKWATCH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "stockwatch.toml";
pub const ENV_PREFIX: &str = "STOCKWATCH";

/// Load and validate configuration from the process environment
pub fn load_config() -> anyhow::Result<AppConfig> {
    let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_from(&path, environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
}

/// Load from an optional file plus the given environment source
pub fn load_from(path: &str, env: Environment) -> anyhow::Result<AppConfig> {
    let settings = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(env)
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::time::Duration;
    use stockwatch_core::Ticker;

    fn env_from(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    fn temp_file(contents: &str) -> std::path::PathBuf {
        let path = env::temp_dir().join(format!("stockwatch-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_from("/nonexistent/stockwatch.toml", env_from(&[])).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.simulator.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.store.history_limit, 100);
    }

    #[test]
    fn test_file_then_env_override() {
        let path = temp_file(
            r#"
[server]
port = 9001

[simulator]
tick_interval_ms = 250
max_delta = 2.5

[simulator.initial_prices]
GOOG = 150.25
"#,
        );

        let config = load_from(
            path.to_str().unwrap(),
            env_from(&[("STOCKWATCH__SIMULATOR__TICK_INTERVAL_MS", "500")]),
        )
        .unwrap();

        assert_eq!(config.server.port, 9001);
        assert_eq!(config.simulator.tick_interval_ms, 500);
        assert_eq!(config.simulator.max_delta, Decimal::new(25, 1));
        assert_eq!(config.simulator.initial_price(Ticker::Goog), Decimal::new(15_025, 2));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = load_from(
            "/nonexistent/stockwatch.toml",
            env_from(&[("STOCKWATCH__SIMULATOR__TICK_INTERVAL_MS", "0")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("tick_interval_ms"));
    }
}
