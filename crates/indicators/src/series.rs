use common::Bar;

/// Column view of a price history, oldest value first.
///
/// Range-based studies (Stochastic, ATR) read `highs` and `lows`; when only
/// closing prices are known those columns repeat the closes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
}

impl PriceSeries {
    pub fn from_closes(closes: Vec<f64>) -> Self {
        Self {
            highs: closes.clone(),
            lows: closes.clone(),
            closes,
        }
    }

    pub fn from_bars(bars: &[Bar]) -> Self {
        Self {
            closes: bars.iter().map(|b| b.close).collect(),
            highs: bars.iter().map(|b| b.high).collect(),
            lows: bars.iter().map(|b| b.low).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// True when every column has the same length.
    pub fn is_aligned(&self) -> bool {
        self.highs.len() == self.closes.len() && self.lows.len() == self.closes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn closes_only_series_mirrors_columns() {
        let s = PriceSeries::from_closes(vec![1.0, 2.0, 3.0]);
        assert_eq!(s.highs, s.closes);
        assert_eq!(s.lows, s.closes);
        assert!(s.is_aligned());
    }

    #[test]
    fn bar_series_takes_ohlc_columns() {
        let bar = Bar {
            symbol: "AAPL".into(),
            timestamp: Utc::now(),
            open: 10.0,
            high: 12.0,
            low: 9.0,
            close: 11.0,
            volume: 1_000.0,
        };
        let s = PriceSeries::from_bars(&[bar]);
        assert_eq!(s.closes, vec![11.0]);
        assert_eq!(s.highs, vec![12.0]);
        assert_eq!(s.lows, vec![9.0]);
    }
}
