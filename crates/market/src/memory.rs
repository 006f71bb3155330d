use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{Bar, MarketDataProvider, MarketSnapshot, Result};

use crate::snapshot_from_bars;

/// In-process market data, fed by the caller.
///
/// Snapshots set with [`set_snapshot`](Self::set_snapshot) take precedence
/// over the one derived from the stored bars.
#[derive(Default, Clone)]
pub struct InMemoryMarketData {
    bars: Arc<RwLock<HashMap<String, Vec<Bar>>>>,
    snapshots: Arc<RwLock<HashMap<String, MarketSnapshot>>>,
}

impl InMemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole history of `symbol`.
    pub async fn set_series(&self, symbol: &str, bars: Vec<Bar>) {
        self.bars.write().await.insert(symbol.to_string(), bars);
    }

    /// Append one bar to `symbol`'s history.
    pub async fn push_bar(&self, bar: Bar) {
        self.bars
            .write()
            .await
            .entry(bar.symbol.clone())
            .or_default()
            .push(bar);
    }

    pub async fn set_snapshot(&self, snapshot: MarketSnapshot) {
        self.snapshots
            .write()
            .await
            .insert(snapshot.symbol.clone(), snapshot);
    }

    pub async fn clear_snapshot(&self, symbol: &str) {
        self.snapshots.write().await.remove(symbol);
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryMarketData {
    async fn latest_snapshot(&self, symbol: &str) -> Result<Option<MarketSnapshot>> {
        if let Some(snapshot) = self.snapshots.read().await.get(symbol) {
            return Ok(Some(snapshot.clone()));
        }
        Ok(self
            .bars
            .read()
            .await
            .get(symbol)
            .and_then(|bars| snapshot_from_bars(bars)))
    }

    async fn series(&self, symbol: &str) -> Result<Vec<Bar>> {
        Ok(self.bars.read().await.get(symbol).cloned().unwrap_or_default())
    }
}
