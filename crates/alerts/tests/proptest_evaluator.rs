use alerts::AlertEvaluator;
use chrono::Utc;
use common::{Alert, AlertCondition, AlertType, MarketSnapshot};
use proptest::prelude::*;

fn alert(alert_type: AlertType, condition: AlertCondition, value: f64) -> Alert {
    let now = Utc::now();
    Alert {
        id: "p".into(),
        user_id: "u".into(),
        symbol: "SYM".into(),
        alert_type,
        condition,
        value,
        message: None,
        indicator: None,
        triggered: false,
        triggered_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn snapshot(price: f64, volume: f64, average_volume: Option<f64>) -> MarketSnapshot {
    MarketSnapshot {
        symbol: "SYM".into(),
        price,
        volume,
        average_volume,
        change: 0.0,
        change_percent: 0.0,
        timestamp: Utc::now(),
    }
}

fn level_condition() -> impl Strategy<Value = AlertCondition> {
    prop_oneof![
        Just(AlertCondition::Above),
        Just(AlertCondition::Below),
        Just(AlertCondition::Equals),
    ]
}

proptest! {
    /// ABOVE and BELOW are strict, mutually exclusive comparisons.
    #[test]
    fn price_above_and_below_are_strict(price in 0.01f64..10_000.0, threshold in 0.01f64..10_000.0) {
        let ev = AlertEvaluator::default();
        let snap = snapshot(price, 0.0, None);
        let above = ev.evaluate(&alert(AlertType::Price, AlertCondition::Above, threshold), &snap, &[]);
        let below = ev.evaluate(&alert(AlertType::Price, AlertCondition::Below, threshold), &snap, &[]);
        prop_assert_eq!(above, price > threshold);
        prop_assert_eq!(below, price < threshold);
        prop_assert!(!(above && below));
    }

    /// A NaN price or threshold never satisfies any condition.
    #[test]
    fn nan_never_fires(value in -1_000.0f64..1_000.0, condition in level_condition(), nan_price in any::<bool>()) {
        let ev = AlertEvaluator::default();
        let (price, threshold) = if nan_price { (f64::NAN, value) } else { (value, f64::NAN) };
        let fired = ev.evaluate(&alert(AlertType::Price, condition, threshold), &snapshot(price, 0.0, None), &[]);
        prop_assert!(!fired);
    }

    /// Without an average, ABOVE k·volume fires exactly when k < 1 (for positive volume).
    #[test]
    fn volume_fallback_compares_against_own_volume(volume in 1.0f64..1e9, k in 0.01f64..5.0) {
        let ev = AlertEvaluator::default();
        let fired = ev.evaluate(&alert(AlertType::Volume, AlertCondition::Above, k), &snapshot(0.0, volume, None), &[]);
        prop_assert_eq!(fired, volume > volume * k);
    }

    /// Technical alerts with no history never fire.
    #[test]
    fn technical_without_history_never_fires(threshold in -1e6f64..1e6, condition in level_condition()) {
        let ev = AlertEvaluator::default();
        let fired = ev.evaluate(&alert(AlertType::Technical, condition, threshold), &snapshot(1.0, 1.0, Some(1.0)), &[]);
        prop_assert!(!fired);
    }
}
