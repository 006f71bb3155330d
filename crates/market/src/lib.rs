pub mod memory;
pub mod rest;
pub mod sqlite;

pub use memory::InMemoryMarketData;
pub use rest::RestMarketData;
pub use sqlite::SqliteMarketData;

use common::{Bar, MarketSnapshot};

/// Bars averaged (excluding the latest) to derive `average_volume`.
pub const AVERAGE_VOLUME_WINDOW: usize = 20;

/// Derive a snapshot from the tail of a bar series (oldest first).
///
/// Change is measured against the previous bar's close. `average_volume`
/// is the mean volume of up to [`AVERAGE_VOLUME_WINDOW`] bars before the
/// latest one, and `None` when the latest bar is the only one.
pub fn snapshot_from_bars(bars: &[Bar]) -> Option<MarketSnapshot> {
    let (latest, earlier) = bars.split_last()?;

    let (change, change_percent) = match earlier.last() {
        Some(prev) if prev.close != 0.0 => {
            let change = latest.close - prev.close;
            (change, change / prev.close * 100.0)
        }
        Some(prev) => (latest.close - prev.close, 0.0),
        None => (0.0, 0.0),
    };

    let window = &earlier[earlier.len().saturating_sub(AVERAGE_VOLUME_WINDOW)..];
    let average_volume = if window.is_empty() {
        None
    } else {
        Some(window.iter().map(|b| b.volume).sum::<f64>() / window.len() as f64)
    };

    Some(MarketSnapshot {
        symbol: latest.symbol.clone(),
        price: latest.close,
        volume: latest.volume,
        average_volume,
        change,
        change_percent,
        timestamp: latest.timestamp,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, TimeZone, Utc};
    use common::Bar;

    pub fn bars(symbol: &str, closes: &[f64], volumes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&close, &volume))| Bar {
                symbol: symbol.to_string(),
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::bars;
    use super::*;

    #[test]
    fn snapshot_reports_change_against_previous_close() {
        let series = bars("AAPL", &[100.0, 110.0], &[1_000.0, 3_000.0]);
        let snap = snapshot_from_bars(&series).unwrap();
        assert_eq!(snap.price, 110.0);
        assert_eq!(snap.change, 10.0);
        assert!((snap.change_percent - 10.0).abs() < 1e-12);
        assert_eq!(snap.volume, 3_000.0);
        assert_eq!(snap.average_volume, Some(1_000.0));
    }

    #[test]
    fn single_bar_has_no_average_volume() {
        let series = bars("AAPL", &[100.0], &[500.0]);
        let snap = snapshot_from_bars(&series).unwrap();
        assert_eq!(snap.average_volume, None);
        assert_eq!(snap.change, 0.0);
    }

    #[test]
    fn empty_series_has_no_snapshot() {
        assert!(snapshot_from_bars(&[]).is_none());
    }
}
