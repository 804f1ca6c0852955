use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

impl Config {
    pub fn load() -> AnyResult<Self> {
        let config_path = if std::path::Path::new("config.toml").exists() {
            "config.toml"
        } else if std::path::Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            return Err("config.toml or config.default.toml not found".into());
        };

        crate::log_println!("Loading configuration from: {}", config_path);

        let config_str = std::fs::read_to_string(config_path)?;
        Self::parse(&config_str).map_err(|e| format!("{}: {}", config_path, e).into())
    }

    pub fn parse(config_str: &str) -> AnyResult<Self> {
        if config_str.trim().is_empty() {
            return Err("configuration is empty".into());
        }
        let config: Config = toml::from_str(config_str)?;
        Ok(config)
    }
}
