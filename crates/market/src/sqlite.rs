use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use common::{Bar, MarketDataProvider, MarketSnapshot, Result};

use crate::{snapshot_from_bars, AVERAGE_VOLUME_WINDOW};

/// Market data read from the `bars` table, filled by an external ingester.
#[derive(Clone)]
pub struct SqliteMarketData {
    db: SqlitePool,
}

impl SqliteMarketData {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Upsert bars; an existing (symbol, timestamp) row is replaced.
    pub async fn insert_bars(&self, bars: &[Bar]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for bar in bars {
            sqlx::query(
                r#"
                INSERT INTO bars (symbol, timestamp, open, high, low, close, volume)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(symbol, timestamp) DO UPDATE SET
                    open = excluded.open, high = excluded.high, low = excluded.low,
                    close = excluded.close, volume = excluded.volume
                "#,
            )
            .bind(&bar.symbol)
            .bind(bar.timestamp)
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.volume)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(count = bars.len(), "Bars stored");
        Ok(())
    }
}

#[async_trait]
impl MarketDataProvider for SqliteMarketData {
    async fn latest_snapshot(&self, symbol: &str) -> Result<Option<MarketSnapshot>> {
        let mut tail: Vec<Bar> = sqlx::query_as(
            r#"SELECT symbol, timestamp, open, high, low, close, volume
               FROM bars WHERE symbol = ?1 ORDER BY timestamp DESC LIMIT ?2"#,
        )
        .bind(symbol)
        .bind((AVERAGE_VOLUME_WINDOW + 1) as i64)
        .fetch_all(&self.db)
        .await?;
        tail.reverse();
        Ok(snapshot_from_bars(&tail))
    }

    async fn series(&self, symbol: &str) -> Result<Vec<Bar>> {
        let bars = sqlx::query_as(
            r#"SELECT symbol, timestamp, open, high, low, close, volume
               FROM bars WHERE symbol = ?1 ORDER BY timestamp ASC"#,
        )
        .bind(symbol)
        .fetch_all(&self.db)
        .await?;
        Ok(bars)
    }
}
