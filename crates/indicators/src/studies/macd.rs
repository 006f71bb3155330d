use super::moving_average::ema_series;

/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// MACD line = EMA(fast) − EMA(slow), Signal = EMA(macd_line, signal).
/// The line starts once the slow EMA has seen `slow` prices.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

/// Latest MACD reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Crossover of the MACD line over its signal line on the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdCross {
    Bullish, // MACD crossed above signal line
    Bearish, // MACD crossed below signal line
    Neutral, // No crossover on the latest bar
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self { fast, slow, signal }
    }

    /// Minimum number of prices before a value is produced. Saturates, so an
    /// oversized window is simply never satisfied.
    pub fn min_len(&self) -> usize {
        self.slow.saturating_add(self.signal)
    }

    /// MACD and signal lines, aligned with each other (same length).
    /// Returns `None` if there isn't enough data.
    pub fn lines(&self, closes: &[f64]) -> Option<(Vec<f64>, Vec<f64>)> {
        if self.fast == 0 || self.slow == 0 || self.signal == 0 {
            return None;
        }
        if closes.len() < self.min_len() {
            return None;
        }

        let fast = ema_series(closes, self.fast);
        let slow = ema_series(closes, self.slow);
        let macd_line: Vec<f64> = (self.slow - 1..closes.len())
            .map(|i| fast[i] - slow[i])
            .collect();
        let signal_line = ema_series(&macd_line, self.signal);

        Some((macd_line, signal_line))
    }

    /// Compute the latest MACD reading from close prices (oldest first).
    pub fn compute(&self, closes: &[f64]) -> Option<MacdValue> {
        let (macd_line, signal_line) = self.lines(closes)?;
        let macd = *macd_line.last()?;
        let signal = *signal_line.last()?;
        Some(MacdValue {
            macd,
            signal,
            histogram: macd - signal,
        })
    }

    /// Detect a crossover between the last two bars.
    pub fn crossover(&self, closes: &[f64]) -> Option<MacdCross> {
        let (macd_line, signal_line) = self.lines(closes)?;
        let n = macd_line.len();
        if n < 2 {
            return None;
        }

        let prev_macd = macd_line[n - 2];
        let curr_macd = macd_line[n - 1];
        let prev_sig = signal_line[n - 2];
        let curr_sig = signal_line[n - 1];

        if prev_macd <= prev_sig && curr_macd > curr_sig {
            Some(MacdCross::Bullish)
        } else if prev_macd >= prev_sig && curr_macd < curr_sig {
            Some(MacdCross::Bearish)
        } else {
            Some(MacdCross::Neutral)
        }
    }
}
