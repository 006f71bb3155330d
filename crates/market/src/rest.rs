use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use common::{validate_symbol, Bar, Error, MarketDataProvider, MarketSnapshot, Result};

/// Market data from a JSON HTTP service.
///
/// Expected endpoints, relative to `base_url`:
/// - `GET /quote/{symbol}` → [`MarketSnapshot`]
/// - `GET /bars/{symbol}` → `[Bar]`, oldest first
///
/// A 404 means "no data for this symbol" and maps to `None` / an empty series.
/// Symbols are checked with [`validate_symbol`] before they are put in a path.
pub struct RestMarketData {
    base_url: String,
    http: Client,
}

impl RestMarketData {
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "Fetching market data");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::MarketData(format!("HTTP {status}: {body}")));
        }

        let parsed = serde_json::from_str(&body).map_err(|e| Error::MarketData(e.to_string()))?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl MarketDataProvider for RestMarketData {
    async fn latest_snapshot(&self, symbol: &str) -> Result<Option<MarketSnapshot>> {
        validate_symbol(symbol)?;
        self.get_json(&format!("/quote/{symbol}")).await
    }

    async fn series(&self, symbol: &str) -> Result<Vec<Bar>> {
        validate_symbol(symbol)?;
        Ok(self
            .get_json::<Vec<Bar>>(&format!("/bars/{symbol}"))
            .await?
            .unwrap_or_default())
    }
}
