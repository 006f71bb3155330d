/// Bollinger Bands: SMA(period) ± `std_dev` population standard deviations.
#[derive(Debug, Clone)]
pub struct BollingerIndicator {
    pub period: usize,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerIndicator {
    pub fn new(period: usize, std_dev: f64) -> Self {
        Self { period, std_dev }
    }

    /// Bands over the last `period` closes. `None` with fewer than `period` values.
    pub fn compute(&self, closes: &[f64]) -> Option<BollingerBands> {
        if self.period == 0 || closes.len() < self.period {
            return None;
        }
        let window = &closes[closes.len() - self.period..];
        let n = self.period as f64;
        let middle = window.iter().sum::<f64>() / n;
        let variance = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / n;
        let width = self.std_dev * variance.sqrt();

        Some(BollingerBands {
            upper: middle + width,
            middle,
            lower: middle - width,
        })
    }
}
