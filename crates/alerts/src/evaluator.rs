use tracing::debug;

use common::{Alert, AlertCondition, AlertType, Bar, IndicatorConfig, MarketSnapshot};
use indicators::{IndicatorCalculator, PriceSeries};

/// Absolute tolerance for `EQUALS` conditions.
pub const EQUALS_TOLERANCE: f64 = 0.01;

/// Decides whether an alert's condition holds against current market data.
///
/// Never fails: missing or insufficient data reads as "not met" and the
/// alert is simply checked again on the next cycle.
pub struct AlertEvaluator {
    calculator: IndicatorCalculator,
}

impl AlertEvaluator {
    pub fn new(calculator: IndicatorCalculator) -> Self {
        Self { calculator }
    }

    pub fn calculator(&self) -> &IndicatorCalculator {
        &self.calculator
    }

    /// `history` is only read by technical alerts and may be empty otherwise.
    pub fn evaluate(&self, alert: &Alert, snapshot: &MarketSnapshot, history: &[Bar]) -> bool {
        if alert.triggered {
            return false;
        }
        match alert.alert_type {
            AlertType::Price => compare(alert.condition, snapshot.price, alert.value),
            AlertType::Volume => self.evaluate_volume(alert, snapshot),
            AlertType::Technical => self.evaluate_technical(alert, history),
        }
    }

    /// Volume against `value × average volume`. Without a known average the
    /// current volume stands in, so the threshold becomes a multiple of the
    /// volume being tested.
    fn evaluate_volume(&self, alert: &Alert, snapshot: &MarketSnapshot) -> bool {
        let average_volume = snapshot.average_volume.unwrap_or(snapshot.volume);
        compare(alert.condition, snapshot.volume, average_volume * alert.value)
    }

    fn evaluate_technical(&self, alert: &Alert, history: &[Bar]) -> bool {
        if history.is_empty() {
            debug!(alert_id = %alert.id, symbol = %alert.symbol, "No history, technical alert not evaluated");
            return false;
        }

        let config = alert
            .indicator
            .clone()
            .unwrap_or_else(|| IndicatorConfig::sma(14));
        let series = PriceSeries::from_bars(history);
        let Some(result) = self.calculator.calculate(&series, &config) else {
            debug!(
                alert_id = %alert.id,
                indicator = %config.kind,
                bars = history.len(),
                "Insufficient history for indicator"
            );
            return false;
        };

        let threshold = alert.value;
        match alert.condition {
            AlertCondition::CrossesAbove => {
                result.value > threshold && result.signal.is_some_and(|s| s <= threshold)
            }
            AlertCondition::CrossesBelow => {
                result.value < threshold && result.signal.is_some_and(|s| s >= threshold)
            }
            condition => compare(condition, result.value, threshold),
        }
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(IndicatorCalculator::default())
    }
}

/// Level comparison. Crossing conditions need a second line and never match here.
fn compare(condition: AlertCondition, observed: f64, threshold: f64) -> bool {
    match condition {
        AlertCondition::Above => observed > threshold,
        AlertCondition::Below => observed < threshold,
        AlertCondition::Equals => (observed - threshold).abs() < EQUALS_TOLERANCE,
        AlertCondition::CrossesAbove | AlertCondition::CrossesBelow => false,
    }
}
