use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::{Bar, Error, Result};

use crate::metrics::{compute_metrics, BacktestMetrics};
use crate::rules::BarContext;
use crate::strategy::Strategy;

/// Fraction of current equity committed to each new position.
pub const DEFAULT_POSITION_FRACTION: f64 = 0.02;
/// Fee charged on the notional of every fill.
pub const DEFAULT_FEE_RATE: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// One simulated round trip. For an open trade `pnl` is the unrealized
/// result at the last bar and the exit fields are empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedTrade {
    pub id: String,
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    /// Realized pnl net of exit fees.
    pub pnl: f64,
    pub entry_fees: f64,
    pub exit_fees: f64,
    pub entry_date: DateTime<Utc>,
    pub exit_date: Option<DateTime<Utc>>,
    pub status: TradeStatus,
}

impl SimulatedTrade {
    pub fn holding_days(&self) -> Option<f64> {
        let exit = self.exit_date?;
        Some((exit - self.entry_date).num_milliseconds() as f64 / 86_400_000.0)
    }
}

/// Position held between entry and exit. Closing consumes it, so a trade
/// can only be closed once.
#[derive(Debug, Clone)]
struct OpenPosition {
    id: String,
    symbol: String,
    quantity: f64,
    entry_price: f64,
    entry_fees: f64,
    entry_date: DateTime<Utc>,
}

impl OpenPosition {
    fn unrealized(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity
    }

    fn close(self, bar: &Bar, fee_rate: f64) -> SimulatedTrade {
        let exit_fees = self.quantity * bar.close * fee_rate;
        SimulatedTrade {
            pnl: self.unrealized(bar.close) - exit_fees,
            id: self.id,
            symbol: self.symbol,
            quantity: self.quantity,
            entry_price: self.entry_price,
            exit_price: Some(bar.close),
            entry_fees: self.entry_fees,
            exit_fees,
            entry_date: self.entry_date,
            exit_date: Some(bar.timestamp),
            status: TradeStatus::Closed,
        }
    }

    fn snapshot(&self, last: &Bar) -> SimulatedTrade {
        SimulatedTrade {
            id: self.id.clone(),
            symbol: self.symbol.clone(),
            quantity: self.quantity,
            entry_price: self.entry_price,
            exit_price: None,
            pnl: self.unrealized(last.close),
            entry_fees: self.entry_fees,
            exit_fees: 0.0,
            entry_date: self.entry_date,
            exit_date: None,
            status: TradeStatus::Open,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: DateTime<Utc>,
    /// Realized equity plus the unrealized pnl of any open position.
    pub equity: f64,
    /// Decline from the running equity peak, as a fraction of the peak.
    pub drawdown: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub strategy: String,
    pub initial_capital: f64,
    /// Closed trades, in the order they were closed.
    pub trades: Vec<SimulatedTrade>,
    /// Position still held after the last bar.
    pub open_position: Option<SimulatedTrade>,
    pub metrics: BacktestMetrics,
    /// One point per input bar.
    pub equity_curve: Vec<EquityPoint>,
}

/// Single-position, long-only bar-by-bar simulation.
///
/// On each bar an open position is first checked against the exit rule,
/// and only a flat book is checked against the entry rule, so a position is
/// never closed and reopened on the same bar. Fills happen at the bar close.
pub struct Backtest {
    bars: Vec<Bar>,
    strategy: Strategy,
    initial_capital: f64,
    position_fraction: f64,
    fee_rate: f64,
}

impl Backtest {
    /// `bars` must be in time order. `initial_capital` must be positive.
    pub fn new(bars: Vec<Bar>, strategy: Strategy, initial_capital: f64) -> Result<Self> {
        if !(initial_capital.is_finite() && initial_capital > 0.0) {
            return Err(Error::Validation(format!(
                "initial capital must be a positive number, got {initial_capital}"
            )));
        }
        if bars.windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
            return Err(Error::Validation("bars must be in time order".into()));
        }
        Ok(Self {
            bars,
            strategy,
            initial_capital,
            position_fraction: DEFAULT_POSITION_FRACTION,
            fee_rate: DEFAULT_FEE_RATE,
        })
    }

    /// Override sizing and fees (both fractions, e.g. `0.02` for 2%).
    pub fn with_costs(mut self, position_fraction: f64, fee_rate: f64) -> Self {
        self.position_fraction = position_fraction;
        self.fee_rate = fee_rate;
        self
    }

    pub fn run(&self) -> BacktestResult {
        let closes: Vec<f64> = self.bars.iter().map(|b| b.close).collect();
        let mut trades: Vec<SimulatedTrade> = Vec::new();
        let mut position: Option<OpenPosition> = None;
        let mut equity = self.initial_capital;
        let mut peak = self.initial_capital;
        let mut equity_curve = Vec::with_capacity(self.bars.len());
        let mut opened = 0usize;

        info!(
            strategy = %self.strategy.name(),
            bars = self.bars.len(),
            initial_capital = self.initial_capital,
            "Backtest started"
        );

        for (i, bar) in self.bars.iter().enumerate() {
            let ctx = BarContext::new(&self.bars[..=i], &closes[..=i]);

            if let Some(open) = position.take() {
                if self.strategy.exit.evaluate(&ctx) {
                    let trade = open.close(bar, self.fee_rate);
                    equity += trade.pnl;
                    debug!(
                        trade_id = %trade.id,
                        exit = bar.close,
                        pnl = trade.pnl,
                        equity,
                        "Position closed"
                    );
                    trades.push(trade);
                } else {
                    position = Some(open);
                }
            } else if self.strategy.entry.evaluate(&ctx) {
                let quantity = (equity * self.position_fraction / bar.close).floor();
                if quantity > 0.0 && quantity.is_finite() {
                    opened += 1;
                    let open = OpenPosition {
                        id: format!("trade-{opened}"),
                        symbol: bar.symbol.clone(),
                        quantity,
                        entry_price: bar.close,
                        entry_fees: quantity * bar.close * self.fee_rate,
                        entry_date: bar.timestamp,
                    };
                    debug!(trade_id = %open.id, entry = bar.close, quantity, "Position opened");
                    position = Some(open);
                } else {
                    debug!(price = bar.close, equity, "Entry signal ignored, position size rounds to zero");
                }
            }

            let marked = equity + position.as_ref().map_or(0.0, |p| p.unrealized(bar.close));
            peak = peak.max(marked);
            let drawdown = if peak > 0.0 { (peak - marked) / peak } else { 0.0 };
            equity_curve.push(EquityPoint {
                date: bar.timestamp,
                equity: marked,
                drawdown,
            });
        }

        let open_position = position
            .as_ref()
            .zip(self.bars.last())
            .map(|(p, last)| p.snapshot(last));
        let metrics = compute_metrics(&trades, &equity_curve, self.initial_capital);

        info!(
            strategy = %self.strategy.name(),
            trades = metrics.total_trades,
            total_pnl = metrics.total_pnl,
            max_drawdown_pct = metrics.max_drawdown,
            still_open = open_position.is_some(),
            "Backtest finished"
        );

        BacktestResult {
            strategy: self.strategy.name().to_string(),
            initial_capital: self.initial_capital,
            trades,
            open_position,
            metrics,
            equity_curve,
        }
    }
}
