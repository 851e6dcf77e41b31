//! Configuration loading from TOML.
//!
//! Every section and field is optional; anything left out falls back to the
//! reference defaults. A missing file means "all defaults", an unreadable or
//! malformed one is an error.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::core::{ModelParams, validate_model_params};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "BTC_RETIREMENT_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub price: PriceConfig,
    pub model: ModelParams,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriceConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            url: "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd"
                .to_string(),
            timeout_secs: 10,
            user_agent: concat!("btc-retirement/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents)
                .with_context(|| format!("Invalid config file: {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read config file: {}", path.display())),
        }
    }

    /// Load from `$BTC_RETIREMENT_CONFIG`, falling back to `./config.toml`.
    pub fn load_from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load(path)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Operator mistakes stop startup here instead of failing every request.
    fn validate(&self) -> Result<()> {
        validate_model_params(&self.model).context("Invalid [model] section")?;
        ensure!(
            self.price.timeout_secs > 0,
            "Invalid [price] section: timeout_secs must be > 0"
        );
        Ok(())
    }
}
