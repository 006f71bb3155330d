/// Simple Moving Average over the last `period` values.
#[derive(Debug, Clone)]
pub struct SmaIndicator {
    pub period: usize,
}

impl SmaIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// Mean of the last `period` values (oldest first).
    /// Returns `None` if there are fewer than `period` values.
    pub fn compute(&self, values: &[f64]) -> Option<f64> {
        if self.period == 0 || values.len() < self.period {
            return None;
        }
        let window = &values[values.len() - self.period..];
        Some(window.iter().sum::<f64>() / self.period as f64)
    }
}

/// Exponential Moving Average, smoothing factor `2 / (period + 1)`,
/// seeded with the first value of the series.
#[derive(Debug, Clone)]
pub struct EmaIndicator {
    pub period: usize,
}

impl EmaIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// Latest EMA value. Needs at least `period` values.
    pub fn compute(&self, values: &[f64]) -> Option<f64> {
        if self.period == 0 || values.len() < self.period {
            return None;
        }
        ema_series(values, self.period).last().copied()
    }
}

/// Rolling SMA aligned to the input: element `i` is the mean of
/// `values[i + 1 - period..=i]`. The first `period - 1` inputs produce no output.
pub fn sma_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut sum: f64 = values[..period].iter().sum();
    out.push(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out.push(sum / period as f64);
    }
    out
}

/// EMA for every input value, seeded with `values[0]`. Same length as `values`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let Some((&first, rest)) = values.split_first() else {
        return Vec::new();
    };
    if period == 0 {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);

    let mut out = Vec::with_capacity(values.len());
    let mut ema = first;
    out.push(ema);
    for &price in rest {
        ema = price * k + ema * (1.0 - k);
        out.push(ema);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_is_mean_of_last_window() {
        let sma = SmaIndicator::new(3);
        let value = sma.compute(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!((value - 4.0).abs() < 1e-12);
    }

    #[test]
    fn sma_returns_none_when_insufficient_data() {
        assert!(SmaIndicator::new(5).compute(&[1.0, 2.0]).is_none());
        assert!(SmaIndicator::new(0).compute(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn sma_series_matches_point_computation() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let series = sma_series(&values, 4);
        assert_eq!(series.len(), 7);
        let last = SmaIndicator::new(4).compute(&values).unwrap();
        assert!((series[6] - last).abs() < 1e-12);
        assert!((series[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn ema_of_constant_series_is_constant() {
        let ema = EmaIndicator::new(10);
        let value = ema.compute(&[42.0; 25]).unwrap();
        assert!((value - 42.0).abs() < 1e-12);
    }

    #[test]
    fn ema_seeds_with_first_value() {
        // k = 2 / (3 + 1) = 0.5
        let series = ema_series(&[10.0, 20.0, 30.0], 3);
        assert_eq!(series, vec![10.0, 15.0, 22.5]);
    }

    #[test]
    fn ema_needs_period_values() {
        assert!(EmaIndicator::new(5).compute(&[1.0, 2.0, 3.0]).is_none());
    }
}
