use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use common::{IndicatorConfig, IndicatorKind};

use crate::series::PriceSeries;
use crate::studies::{
    AtrIndicator, BollingerIndicator, EmaIndicator, MacdIndicator, RsiIndicator, SmaIndicator,
    StochasticIndicator,
};

/// Point-in-time indicator reading: only the latest value is reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    /// Main line: the average, RSI, MACD line, middle band, %K or ATR.
    pub value: f64,
    /// Secondary line used for crossing checks (MACD signal, %D).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<f64>,
}

impl IndicatorResult {
    fn value(value: f64) -> Self {
        Self {
            value,
            signal: None,
            upper: None,
            lower: None,
            k: None,
            d: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    config: String,
    closes: Vec<u64>,
    highs: Vec<u64>,
    lows: Vec<u64>,
}

impl CacheKey {
    fn new(series: &PriceSeries, config: &IndicatorConfig) -> Self {
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<u64>>();
        Self {
            config: serde_json::to_string(config).unwrap_or_else(|_| format!("{config:?}")),
            closes: bits(&series.closes),
            highs: bits(&series.highs),
            lows: bits(&series.lows),
        }
    }
}

/// Computes indicators and memoizes results in a bounded LRU cache.
///
/// Each owner (e.g. one alert scheduler) holds its own calculator; there is
/// no process-wide cache.
pub struct IndicatorCalculator {
    cache: Mutex<LruCache<CacheKey, Option<IndicatorResult>>>,
}

impl IndicatorCalculator {
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or_else(|| {
            warn!("Indicator cache capacity 0 requested, using 1");
            NonZeroUsize::MIN
        });
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Latest reading of `config` over `series`.
    ///
    /// Returns `None` when the series is shorter than the indicator's window
    /// (or the parameters are degenerate): the caller cannot evaluate yet.
    pub fn calculate(&self, series: &PriceSeries, config: &IndicatorConfig) -> Option<IndicatorResult> {
        let key = CacheKey::new(series, config);
        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = cache.get(&key) {
                trace!(indicator = %config.kind, "Indicator cache hit");
                return *hit;
            }
        }

        let result = compute(series, config);
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(key, result);
        result
    }

    /// Convenience for close-only data (highs and lows mirror the closes).
    pub fn calculate_closes(&self, closes: &[f64], config: &IndicatorConfig) -> Option<IndicatorResult> {
        self.calculate(&PriceSeries::from_closes(closes.to_vec()), config)
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for IndicatorCalculator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// Uncached computation with conventional defaults for unset parameters.
pub fn compute(series: &PriceSeries, config: &IndicatorConfig) -> Option<IndicatorResult> {
    if !series.is_aligned() {
        return None;
    }
    let closes = &series.closes;

    match config.kind {
        IndicatorKind::Sma => {
            let period = config.period.unwrap_or(14);
            SmaIndicator::new(period).compute(closes).map(IndicatorResult::value)
        }
        IndicatorKind::Ema => {
            let period = config.period.unwrap_or(14);
            EmaIndicator::new(period).compute(closes).map(IndicatorResult::value)
        }
        IndicatorKind::Rsi => {
            let period = config.period.unwrap_or(14);
            RsiIndicator::new(period).compute(closes).map(IndicatorResult::value)
        }
        IndicatorKind::Macd => {
            let macd = MacdIndicator::new(
                config.fast_period.unwrap_or(12),
                config.slow_period.unwrap_or(26),
                config.signal_period.unwrap_or(9),
            );
            macd.compute(closes).map(|v| IndicatorResult {
                signal: Some(v.signal),
                ..IndicatorResult::value(v.macd)
            })
        }
        IndicatorKind::Bollinger => {
            let bb = BollingerIndicator::new(config.period.unwrap_or(20), config.std_dev.unwrap_or(2.0));
            bb.compute(closes).map(|b| IndicatorResult {
                upper: Some(b.upper),
                lower: Some(b.lower),
                ..IndicatorResult::value(b.middle)
            })
        }
        IndicatorKind::Stochastic => {
            let stoch = StochasticIndicator::new(
                config.k_period.unwrap_or(14),
                config.d_period.unwrap_or(3),
            );
            stoch
                .compute(&series.highs, &series.lows, closes)
                .map(|s| IndicatorResult {
                    signal: Some(s.d),
                    k: Some(s.k),
                    d: Some(s.d),
                    ..IndicatorResult::value(s.k)
                })
        }
        IndicatorKind::Atr => {
            let period = config.period.unwrap_or(14);
            AtrIndicator::new(period)
                .compute(&series.highs, &series.lows, closes)
                .map(IndicatorResult::value)
        }
    }
}
