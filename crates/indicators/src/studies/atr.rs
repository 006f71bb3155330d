/// Average True Range with Wilder smoothing.
///
/// True range = max(high − low, |high − prev close|, |low − prev close|).
/// The first ATR is the mean of the first `period` true ranges.
#[derive(Debug, Clone)]
pub struct AtrIndicator {
    pub period: usize,
}

impl AtrIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// Latest ATR. Needs `period + 1` bars; slices must share a length.
    pub fn compute(&self, highs: &[f64], lows: &[f64], closes: &[f64]) -> Option<f64> {
        let n = closes.len();
        if self.period == 0 || highs.len() != n || lows.len() != n || n <= self.period {
            return None;
        }

        let true_ranges: Vec<f64> = (1..n)
            .map(|i| {
                let prev_close = closes[i - 1];
                (highs[i] - lows[i])
                    .max((highs[i] - prev_close).abs())
                    .max((lows[i] - prev_close).abs())
            })
            .collect();

        let p = self.period as f64;
        let mut atr = true_ranges[..self.period].iter().sum::<f64>() / p;
        for &tr in &true_ranges[self.period..] {
            atr = (atr * (p - 1.0) + tr) / p;
        }
        Some(atr)
    }
}
