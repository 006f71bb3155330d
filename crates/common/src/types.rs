use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Market data ──────────────────────────────────────────────────────────────

/// One OHLCV bar of a symbol's price history. Series are ordered oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Latest quote for a symbol as reported by the market data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    /// Trailing average volume, when the provider knows it.
    #[serde(default)]
    pub average_volume: Option<f64>,
    /// Absolute change against the previous close.
    #[serde(default)]
    pub change: f64,
    /// Change against the previous close, in percent.
    #[serde(default)]
    pub change_percent: f64,
    pub timestamp: DateTime<Utc>,
}

// ─── Indicators ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IndicatorKind {
    #[default]
    #[serde(rename = "SMA")]
    Sma,
    #[serde(rename = "EMA")]
    Ema,
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "BB")]
    Bollinger,
    #[serde(rename = "STOCH")]
    Stochastic,
    #[serde(rename = "ATR")]
    Atr,
}

impl std::fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndicatorKind::Sma => write!(f, "SMA"),
            IndicatorKind::Ema => write!(f, "EMA"),
            IndicatorKind::Rsi => write!(f, "RSI"),
            IndicatorKind::Macd => write!(f, "MACD"),
            IndicatorKind::Bollinger => write!(f, "BB"),
            IndicatorKind::Stochastic => write!(f, "STOCH"),
            IndicatorKind::Atr => write!(f, "ATR"),
        }
    }
}

/// Which indicator to compute and with which parameters.
/// Unset parameters fall back to the indicator's conventional defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IndicatorConfig {
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    #[serde(default)]
    pub period: Option<usize>,
    #[serde(default)]
    pub fast_period: Option<usize>,
    #[serde(default)]
    pub slow_period: Option<usize>,
    #[serde(default)]
    pub signal_period: Option<usize>,
    #[serde(default)]
    pub std_dev: Option<f64>,
    #[serde(default)]
    pub k_period: Option<usize>,
    #[serde(default)]
    pub d_period: Option<usize>,
}

impl IndicatorConfig {
    /// Largest window accepted from user input.
    pub const MAX_PERIOD: usize = 10_000;

    pub fn new(kind: IndicatorKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.period = Some(period);
        self
    }

    pub fn sma(period: usize) -> Self {
        Self::new(IndicatorKind::Sma).with_period(period)
    }

    pub fn ema(period: usize) -> Self {
        Self::new(IndicatorKind::Ema).with_period(period)
    }

    pub fn rsi(period: usize) -> Self {
        Self::new(IndicatorKind::Rsi).with_period(period)
    }

    pub fn macd(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            kind: IndicatorKind::Macd,
            fast_period: Some(fast),
            slow_period: Some(slow),
            signal_period: Some(signal),
            ..Self::default()
        }
    }

    pub fn bollinger(period: usize, std_dev: f64) -> Self {
        Self {
            kind: IndicatorKind::Bollinger,
            period: Some(period),
            std_dev: Some(std_dev),
            ..Self::default()
        }
    }

    pub fn stochastic(k_period: usize, d_period: usize) -> Self {
        Self {
            kind: IndicatorKind::Stochastic,
            k_period: Some(k_period),
            d_period: Some(d_period),
            ..Self::default()
        }
    }

    pub fn atr(period: usize) -> Self {
        Self::new(IndicatorKind::Atr).with_period(period)
    }

    /// Reject windows outside `1..=MAX_PERIOD` and a non-positive band width.
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("period", self.period),
            ("fast_period", self.fast_period),
            ("slow_period", self.slow_period),
            ("signal_period", self.signal_period),
            ("k_period", self.k_period),
            ("d_period", self.d_period),
        ];
        for (name, value) in windows {
            if let Some(v) = value {
                if v == 0 || v > Self::MAX_PERIOD {
                    return Err(Error::Validation(format!(
                        "{} {name} must be between 1 and {}, got {v}",
                        self.kind,
                        Self::MAX_PERIOD
                    )));
                }
            }
        }
        if let Some(k) = self.std_dev {
            if !(k.is_finite() && k > 0.0) {
                return Err(Error::Validation(format!(
                    "{} std_dev must be a positive number, got {k}",
                    self.kind
                )));
            }
        }
        Ok(())
    }
}

// ─── Alerts ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
pub enum AlertType {
    Price,
    Volume,
    Technical,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::Price => write!(f, "PRICE"),
            AlertType::Volume => write!(f, "VOLUME"),
            AlertType::Technical => write!(f, "TECHNICAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertCondition {
    Above,
    Below,
    Equals,
    /// Only meaningful for technical alerts.
    CrossesAbove,
    /// Only meaningful for technical alerts.
    CrossesBelow,
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertCondition::Above => write!(f, "ABOVE"),
            AlertCondition::Below => write!(f, "BELOW"),
            AlertCondition::Equals => write!(f, "EQUALS"),
            AlertCondition::CrossesAbove => write!(f, "CROSSES_ABOVE"),
            AlertCondition::CrossesBelow => write!(f, "CROSSES_BELOW"),
        }
    }
}

/// A user-owned alert. Once `triggered` it stays triggered; re-arming means
/// creating a new alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub condition: AlertCondition,
    /// Threshold. For volume alerts, a multiple of the average volume.
    pub value: f64,
    pub message: Option<String>,
    /// Indicator evaluated by technical alerts. `None` means SMA(14).
    #[serde(default)]
    pub indicator: Option<IndicatorConfig>,
    pub triggered: bool,
    pub triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the user when creating an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub user_id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub condition: AlertCondition,
    pub value: f64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub indicator: Option<IndicatorConfig>,
}

/// Partial update of an alert. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertPatch {
    #[serde(default)]
    pub condition: Option<AlertCondition>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub triggered: Option<bool>,
    #[serde(default)]
    pub triggered_at: Option<DateTime<Utc>>,
}

impl AlertPatch {
    /// The patch the scheduler persists when an alert fires.
    pub fn trigger(at: DateTime<Utc>) -> Self {
        Self {
            triggered: Some(true),
            triggered_at: Some(at),
            ..Self::default()
        }
    }
}

impl NewAlert {
    /// Validate user input and build the stored alert.
    pub fn into_alert(self, now: DateTime<Utc>) -> Result<Alert> {
        let symbol = self.symbol.trim().to_uppercase();
        validate_symbol(&symbol)?;
        if !self.value.is_finite() {
            return Err(Error::Validation(format!(
                "alert value must be a finite number, got {}",
                self.value
            )));
        }
        check_condition(self.alert_type, self.condition)?;
        if let Some(config) = &self.indicator {
            config.validate()?;
        }

        Ok(Alert {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.user_id,
            symbol,
            alert_type: self.alert_type,
            condition: self.condition,
            value: self.value,
            message: self.message,
            indicator: self.indicator,
            triggered: false,
            triggered_at: None,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Alert {
    /// Apply a patch in place, enforcing the one-way trigger transition and
    /// the same field rules as creation. On error the alert is unchanged.
    pub fn apply(&mut self, patch: AlertPatch, now: DateTime<Utc>) -> Result<()> {
        if let Some(condition) = patch.condition {
            check_condition(self.alert_type, condition)?;
        }
        if let Some(value) = patch.value {
            if !value.is_finite() {
                return Err(Error::Validation(format!(
                    "alert value must be a finite number, got {value}"
                )));
            }
        }

        match patch.triggered {
            Some(false) if self.triggered => {
                return Err(Error::InvalidTransition(format!(
                    "alert '{}' has already triggered and cannot be re-armed",
                    self.id
                )));
            }
            Some(true) if self.triggered => {
                return Err(Error::InvalidTransition(format!(
                    "alert '{}' has already triggered",
                    self.id
                )));
            }
            Some(true) => {
                self.triggered = true;
                self.triggered_at = Some(patch.triggered_at.unwrap_or(now));
            }
            Some(false) | None => {}
        }

        if let Some(condition) = patch.condition {
            self.condition = condition;
        }
        if let Some(value) = patch.value {
            self.value = value;
        }
        if patch.message.is_some() {
            self.message = patch.message;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Ticker symbols are 1 to 32 letters, digits, `.` or `-`, starting with a
/// letter or digit. Symbols end up in provider URLs and SQL parameters.
pub fn validate_symbol(symbol: &str) -> Result<()> {
    let well_formed = (1..=32).contains(&symbol.len())
        && symbol.starts_with(|c: char| c.is_ascii_alphanumeric())
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(Error::Validation(format!("invalid symbol '{symbol}'")))
    }
}

/// Crossing conditions need an indicator signal line, so only TECHNICAL
/// alerts may use them.
fn check_condition(alert_type: AlertType, condition: AlertCondition) -> Result<()> {
    let crossing = matches!(
        condition,
        AlertCondition::CrossesAbove | AlertCondition::CrossesBelow
    );
    if crossing && alert_type != AlertType::Technical {
        return Err(Error::Validation(format!(
            "condition {condition} is only supported for TECHNICAL alerts"
        )));
    }
    Ok(())
}

/// Everything a notifier needs to tell a user that an alert fired.
#[derive(Debug, Clone, Serialize)]
pub struct AlertNotification {
    pub email: String,
    pub alert: Alert,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}

impl AlertNotification {
    pub fn subject(&self) -> String {
        format!(
            "Alert Triggered: {} {} {}",
            self.alert.symbol, self.alert.condition, self.alert.value
        )
    }
}
