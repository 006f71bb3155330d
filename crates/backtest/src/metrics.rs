use serde::Serialize;

use crate::simulator::{EquityPoint, SimulatedTrade};

/// Aggregate statistics over the closed trades and equity curve of a run.
/// Ratios with an empty denominator are reported as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of closed trades with positive pnl.
    pub win_rate: f64,
    /// Gross wins / gross losses; 0 when nothing was lost.
    pub profit_factor: f64,
    pub total_pnl: f64,
    pub total_fees: f64,
    /// Largest peak-to-trough decline of the equity curve, in percent.
    pub max_drawdown: f64,
    /// Mean / standard deviation of bar-over-bar returns, not annualized.
    pub sharpe_ratio: f64,
    pub average_win: f64,
    /// Mean loss as a positive amount.
    pub average_loss: f64,
    pub largest_win: f64,
    /// Most negative trade pnl (0 when there were no losers).
    pub largest_loss: f64,
    pub average_holding_period_days: f64,
    pub final_equity: f64,
    /// Change of the final equity over the initial capital, in percent.
    pub total_return: f64,
}

pub fn compute_metrics(
    trades: &[SimulatedTrade],
    equity_curve: &[EquityPoint],
    initial_capital: f64,
) -> BacktestMetrics {
    let wins: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|&p| p < 0.0).collect();

    let gross_wins: f64 = wins.iter().sum();
    let gross_losses: f64 = losses.iter().sum::<f64>().abs();

    let final_equity = equity_curve.last().map_or(initial_capital, |p| p.equity);

    let holding_days: Vec<f64> = trades.iter().filter_map(SimulatedTrade::holding_days).collect();

    BacktestMetrics {
        total_trades: trades.len(),
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        win_rate: ratio(wins.len() as f64 * 100.0, trades.len() as f64),
        profit_factor: ratio(gross_wins, gross_losses),
        total_pnl: trades.iter().map(|t| t.pnl).sum(),
        total_fees: trades.iter().map(|t| t.entry_fees + t.exit_fees).sum(),
        max_drawdown: equity_curve
            .iter()
            .map(|p| p.drawdown)
            .fold(0.0, f64::max)
            * 100.0,
        sharpe_ratio: sharpe_ratio(equity_curve),
        average_win: ratio(gross_wins, wins.len() as f64),
        average_loss: ratio(gross_losses, losses.len() as f64),
        largest_win: wins.iter().copied().fold(0.0, f64::max),
        largest_loss: losses.iter().copied().fold(0.0, f64::min),
        average_holding_period_days: ratio(holding_days.iter().sum(), holding_days.len() as f64),
        final_equity,
        total_return: ratio((final_equity - initial_capital) * 100.0, initial_capital),
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Returns are `(e[i] - e[i-1]) / e[i-1]` with the first bar's return taken
/// as 0; population standard deviation.
pub fn sharpe_ratio(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.is_empty() {
        return 0.0;
    }
    let returns: Vec<f64> = std::iter::once(0.0)
        .chain(
            equity_curve
                .windows(2)
                .map(|w| ratio(w[1].equity - w[0].equity, w[0].equity)),
        )
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        0.0
    } else {
        mean / std_dev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::TradeStatus;
    use chrono::{Duration, TimeZone, Utc};

    fn trade(pnl: f64, days: i64) -> SimulatedTrade {
        let entry = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        SimulatedTrade {
            id: "t".into(),
            symbol: "TEST".into(),
            quantity: 1.0,
            entry_price: 100.0,
            exit_price: Some(100.0 + pnl),
            pnl,
            entry_fees: 0.1,
            exit_fees: 0.1,
            entry_date: entry,
            exit_date: Some(entry + Duration::days(days)),
            status: TradeStatus::Closed,
        }
    }

    fn curve(equities: &[f64]) -> Vec<EquityPoint> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut peak = f64::MIN;
        equities
            .iter()
            .enumerate()
            .map(|(i, &equity)| {
                peak = peak.max(equity);
                EquityPoint {
                    date: start + Duration::days(i as i64),
                    equity,
                    drawdown: (peak - equity) / peak,
                }
            })
            .collect()
    }

    #[test]
    fn mixed_trades() {
        let trades = [trade(30.0, 2), trade(-10.0, 4), trade(10.0, 6), trade(-20.0, 0)];
        let m = compute_metrics(&trades, &curve(&[1_000.0, 1_010.0]), 1_000.0);

        assert_eq!(m.total_trades, 4);
        assert_eq!(m.winning_trades, 2);
        assert_eq!(m.losing_trades, 2);
        assert_eq!(m.win_rate, 50.0);
        assert!((m.profit_factor - 40.0 / 30.0).abs() < 1e-12);
        assert_eq!(m.total_pnl, 10.0);
        assert!((m.total_fees - 0.8).abs() < 1e-12);
        assert_eq!(m.average_win, 20.0);
        assert_eq!(m.average_loss, 15.0);
        assert_eq!(m.largest_win, 30.0);
        assert_eq!(m.largest_loss, -20.0);
        assert_eq!(m.average_holding_period_days, 3.0);
        assert_eq!(m.final_equity, 1_010.0);
        assert!((m.total_return - 1.0).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_is_zero_without_losses() {
        let m = compute_metrics(&[trade(5.0, 1), trade(7.0, 1)], &[], 1_000.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.largest_loss, 0.0);
        assert_eq!(m.average_loss, 0.0);
        assert_eq!(m.win_rate, 100.0);
    }

    #[test]
    fn no_trades_yields_zeroes_not_nan() {
        let m = compute_metrics(&[], &[], 1_000.0);
        assert_eq!(m, BacktestMetrics { final_equity: 1_000.0, ..BacktestMetrics::default() });
    }

    #[test]
    fn max_drawdown_in_percent() {
        let m = compute_metrics(&[], &curve(&[100.0, 120.0, 90.0, 130.0]), 100.0);
        assert!((m.max_drawdown - 25.0).abs() < 1e-12);
    }

    #[test]
    fn sharpe_of_flat_curve_is_zero() {
        assert_eq!(sharpe_ratio(&curve(&[100.0, 100.0, 100.0])), 0.0);
    }

    #[test]
    fn sharpe_matches_hand_computation() {
        // returns: 0, 0.1, -0.1 → mean 0, so Sharpe 0
        assert!(sharpe_ratio(&curve(&[100.0, 110.0, 99.0])).abs() < 1e-12);
        // returns: 0, 0.1 → mean 0.05, population std 0.05 → 1
        assert!((sharpe_ratio(&curve(&[100.0, 110.0])) - 1.0).abs() < 1e-12);
    }
}
