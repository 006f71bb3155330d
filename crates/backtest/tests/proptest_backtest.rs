use backtest::{Backtest, Rule, Side, StrategyDefinition, TradeStatus};
use chrono::{Duration, TimeZone, Utc};
use common::Bar;
use proptest::prelude::*;

fn bars(closes: &[f64]) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            symbol: "PROP".into(),
            timestamp: start + Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        })
        .collect()
}

fn definition(entry: Rule, exit: Rule) -> StrategyDefinition {
    StrategyDefinition {
        id: "prop".into(),
        name: "prop".into(),
        description: String::new(),
        parameters: Default::default(),
        entry,
        exit,
    }
}

fn rule() -> impl Strategy<Value = Rule> {
    prop_oneof![
        Just(Rule::Always),
        Just(Rule::Never),
        (1.0f64..200.0).prop_map(|t| Rule::PriceThreshold { side: Side::Above, threshold: t }),
        (1.0f64..200.0).prop_map(|t| Rule::PriceThreshold { side: Side::Below, threshold: t }),
        Just(Rule::RsiThreshold { period: 5, side: Side::Below, threshold: 40.0 }),
        Just(Rule::Custom { expression: "close > sma(3)".into() }),
    ]
}

proptest! {
    /// Whatever the rules: one equity point per bar, drawdowns in [0, 1),
    /// and metrics free of NaN or infinity.
    #[test]
    fn simulation_invariants(
        closes in prop::collection::vec(1.0f64..200.0, 0..120),
        entry in rule(),
        exit in rule(),
        capital in 100.0f64..1e6,
    ) {
        let strategy = definition(entry, exit).compile().unwrap();
        let result = Backtest::new(bars(&closes), strategy, capital).unwrap().run();

        prop_assert_eq!(result.equity_curve.len(), closes.len());
        prop_assert!(result.trades.iter().all(|t| t.status == TradeStatus::Closed && t.quantity >= 1.0));
        prop_assert!(result.open_position.iter().all(|t| t.status == TradeStatus::Open));
        for point in &result.equity_curve {
            prop_assert!(point.equity.is_finite());
            prop_assert!((0.0..1.0).contains(&point.drawdown));
        }

        let m = &result.metrics;
        prop_assert_eq!(m.total_trades, result.trades.len());
        prop_assert!(m.winning_trades + m.losing_trades <= m.total_trades);
        for value in [
            m.win_rate, m.profit_factor, m.max_drawdown, m.sharpe_ratio, m.average_win,
            m.average_loss, m.largest_win, m.largest_loss, m.average_holding_period_days,
        ] {
            prop_assert!(value.is_finite());
        }
        prop_assert!((0.0..=100.0).contains(&m.win_rate));
        prop_assert!(m.profit_factor >= 0.0);
    }

    /// Closed trades are in time order and never overlap.
    #[test]
    fn trades_do_not_overlap(closes in prop::collection::vec(1.0f64..200.0, 2..80)) {
        let strategy = definition(
            Rule::Always,
            Rule::Custom { expression: "close < prev(close)".into() },
        )
        .compile()
        .unwrap();
        let result = Backtest::new(bars(&closes), strategy, 1e6).unwrap().run();
        for pair in result.trades.windows(2) {
            prop_assert!(pair[0].exit_date.unwrap() < pair[1].entry_date);
        }
        for trade in &result.trades {
            prop_assert!(trade.entry_date < trade.exit_date.unwrap());
        }
    }
}
