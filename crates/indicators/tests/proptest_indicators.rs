use indicators::{
    IndicatorCalculator, IndicatorConfig, PriceSeries, RsiIndicator, SmaIndicator,
    StochasticIndicator,
};
use proptest::prelude::*;

proptest! {
    /// RSI stays inside [0, 100] for any positive price path.
    #[test]
    fn rsi_is_bounded(
        prices in prop::collection::vec(0.01f64..100_000.0, 15..120),
        period in 2usize..14,
    ) {
        let value = RsiIndicator::new(period).compute(&prices).unwrap();
        prop_assert!((0.0..=100.0).contains(&value), "RSI out of range: {}", value);
    }

    /// On a strictly increasing series the SMA is exactly the mean of the last window.
    #[test]
    fn sma_matches_mean_on_monotone_series(
        start in 1.0f64..1_000.0,
        steps in prop::collection::vec(0.01f64..10.0, 1..80),
        period_seed in 1usize..80,
    ) {
        let mut prices = vec![start];
        for s in &steps {
            let last = *prices.last().unwrap();
            prices.push(last + s);
        }
        let period = 1 + period_seed % prices.len();
        let window = &prices[prices.len() - period..];
        let expected = window.iter().sum::<f64>() / period as f64;
        prop_assert_eq!(SmaIndicator::new(period).compute(&prices), Some(expected));
    }

    /// EMA of a constant series stays at that constant.
    #[test]
    fn ema_of_constant_is_constant(v in 0.01f64..10_000.0, n in 1usize..100, period in 1usize..50) {
        prop_assume!(n >= period);
        let calc = IndicatorCalculator::new(4);
        let result = calc.calculate_closes(&vec![v; n], &IndicatorConfig::ema(period)).unwrap();
        prop_assert!((result.value - v).abs() <= v * 1e-12);
    }

    /// %K and %D stay inside [0, 100] when highs bound the closes from above and lows from below.
    #[test]
    fn stochastic_is_bounded(
        bars in prop::collection::vec((1.0f64..1_000.0, 0.0f64..1.0, 0.0f64..50.0, 0.0f64..50.0), 20..80),
    ) {
        let closes: Vec<f64> = bars.iter().map(|b| b.0).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.0 + b.2).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.0 - b.3 * b.1).collect();
        let series = PriceSeries { closes, highs, lows };
        let v = StochasticIndicator::new(14, 3)
            .compute(&series.highs, &series.lows, &series.closes)
            .unwrap();
        prop_assert!((0.0..=100.0).contains(&v.k));
        prop_assert!((0.0..=100.0 + 1e-9).contains(&v.d));
    }

    /// Any config on any short series either computes or reports "not yet"; never panics.
    #[test]
    fn calculator_never_panics(
        prices in prop::collection::vec(-1_000.0f64..1_000.0, 0..40),
        period in 0usize..30,
    ) {
        let calc = IndicatorCalculator::new(8);
        for cfg in [
            IndicatorConfig::sma(period),
            IndicatorConfig::ema(period),
            IndicatorConfig::rsi(period),
            IndicatorConfig::macd(period, period + 1, period),
            IndicatorConfig::bollinger(period, 2.0),
            IndicatorConfig::stochastic(period, 3),
            IndicatorConfig::atr(period),
        ] {
            let _ = calc.calculate_closes(&prices, &cfg);
        }
    }
}
