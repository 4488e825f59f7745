use serde::{Deserialize, Serialize};

use crate::common::types::AnyResult;
use crate::configs::*;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub party: PartyConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl Config {
    /// Reads `config.toml`, then `config.default.toml`. With neither present the
    /// built-in defaults are used.
    pub fn load() -> AnyResult<Self> {
        let config_path = ["config.toml", "config.default.toml"]
            .into_iter()
            .find(|p| std::path::Path::new(p).exists());

        let Some(config_path) = config_path else {
            crate::log_println!("No config file found, using defaults");
            return Ok(Self::default());
        };

        crate::log_println!("Loading configuration from: {}", config_path);

        let config_str = std::fs::read_to_string(config_path)?;
        if config_str.trim().is_empty() {
            return Err(format!("{} is empty", config_path).into());
        }

        Self::from_toml(&config_str)
    }

    pub fn from_toml(raw: &str) -> AnyResult<Self> {
        let config: Config = toml::from_str(raw)?;
        if config.party.max_party_size < 2 {
            return Err("party.max_party_size must be at least 2".into());
        }
        if !(0.0..=1.0).contains(&config.party.guest_buffering_threshold) {
            return Err("party.guest_buffering_threshold must be between 0 and 1".into());
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9000

            [party]
            grace_period_ms = 5000
            auto_resume = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.party.grace_period_ms, 5000);
        assert!(config.party.auto_resume);
        assert_eq!(config.party.staleness_tolerance_ms, 2000);
        assert_eq!(config.party.chat_retention, 200);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_catalog_entries() {
        let config = Config::from_toml(
            r#"
            [catalog]
            strict = true

            [[catalog.entries]]
            content_ref = "movie:42"
            title = "The Answer"
            "#,
        )
        .unwrap();
        assert!(config.catalog.strict);
        assert_eq!(config.catalog.entries[0].title, "The Answer");
    }

    #[test]
    fn test_rejects_bad_threshold() {
        assert!(Config::from_toml("[party]\nguest_buffering_threshold = 1.5\n").is_err());
    }
}
