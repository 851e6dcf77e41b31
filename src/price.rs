//! BTC/USD spot price sources.
//!
//! The live source is CoinGecko's simple price endpoint:
//! `GET /api/v3/simple/price?ids=bitcoin&vs_currencies=usd`, answering
//! `{"bitcoin":{"usd":<number>}}`. Only `bitcoin.usd` is read.
//!
//! Every call is a single attempt bounded by the client timeout. There is no
//! retry and no caching; a failure aborts the calculation that asked for it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::PriceConfig;
use crate::error::PriceError;

#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    async fn fetch_spot_price(&self) -> Result<f64, PriceError>;
}

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    bitcoin: UsdQuote,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: f64,
}

pub struct CoinGeckoClient {
    http: Client,
    url: String,
}

impl CoinGeckoClient {
    pub fn new(cfg: &PriceConfig) -> Result<Self, PriceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.as_str())
            .build()?;
        Ok(Self {
            http,
            url: cfg.url.clone(),
        })
    }
}

#[async_trait]
impl SpotPriceSource for CoinGeckoClient {
    async fn fetch_spot_price(&self) -> Result<f64, PriceError> {
        let resp = self.http.get(&self.url).send().await.map_err(|e| {
            warn!(url = %self.url, error = %e, timeout = e.is_timeout(), "price request failed");
            PriceError::Request(e)
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(url = %self.url, status = status.as_u16(), "price source returned error status");
            return Err(PriceError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        let price = parse_simple_price(&body)?;
        debug!(price, "fetched BTC spot price");
        Ok(price)
    }
}

/// A price supplied up front, used for offline runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedPrice(pub f64);

#[async_trait]
impl SpotPriceSource for FixedPrice {
    async fn fetch_spot_price(&self) -> Result<f64, PriceError> {
        ensure_positive(self.0)
    }
}

pub fn parse_simple_price(body: &str) -> Result<f64, PriceError> {
    let parsed: SimplePriceResponse =
        serde_json::from_str(body).map_err(|e| PriceError::Malformed(e.to_string()))?;
    ensure_positive(parsed.bitcoin.usd)
}

fn ensure_positive(price: f64) -> Result<f64, PriceError> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(PriceError::NonPositive(price))
    }
}
