use super::moving_average::sma_series;

/// Stochastic oscillator. %K over `k_period` bars, %D = SMA(`d_period`) of %K.
#[derive(Debug, Clone)]
pub struct StochasticIndicator {
    pub k_period: usize,
    pub d_period: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticValue {
    pub k: f64,
    pub d: f64,
}

impl StochasticIndicator {
    pub fn new(k_period: usize, d_period: usize) -> Self {
        Self { k_period, d_period }
    }

    pub fn min_len(&self) -> usize {
        self.k_period.saturating_add(self.d_period.saturating_sub(1))
    }

    /// Latest %K / %D. All three slices must be the same length.
    /// A zero high-low range reads 50.
    pub fn compute(&self, highs: &[f64], lows: &[f64], closes: &[f64]) -> Option<StochasticValue> {
        if self.k_period == 0 || self.d_period == 0 {
            return None;
        }
        let n = closes.len();
        if highs.len() != n || lows.len() != n || n < self.min_len() {
            return None;
        }

        let percent_k: Vec<f64> = (self.k_period - 1..n)
            .map(|i| {
                let start = i + 1 - self.k_period;
                let highest = highs[start..=i].iter().copied().fold(f64::MIN, f64::max);
                let lowest = lows[start..=i].iter().copied().fold(f64::MAX, f64::min);
                let range = highest - lowest;
                if range == 0.0 {
                    50.0
                } else {
                    100.0 * (closes[i] - lowest) / range
                }
            })
            .collect();

        let k = *percent_k.last()?;
        let d = *sma_series(&percent_k, self.d_period).last()?;
        Some(StochasticValue { k, d })
    }
}
