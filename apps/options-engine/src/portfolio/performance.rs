//! Performance metrics over an equity curve and trade log.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

use super::{PortfolioSnapshot, TradeRecord};

/// Summary statistics for one completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Equity at the first snapshot.
    pub initial_value: Decimal,
    /// Equity at the last snapshot.
    pub final_value: Decimal,
    /// Total return as a fraction (0.10 = +10%).
    pub total_return: f64,
    /// Annualized Sharpe ratio of per-period returns.
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough decline as a positive fraction.
    pub max_drawdown: f64,
    /// Profitable trades / total trades.
    pub win_rate: f64,
    /// Number of completed trades.
    pub num_trades: usize,
    /// Largest single-trade realized P&L.
    pub best_trade: Decimal,
    /// Smallest (most negative) single-trade realized P&L.
    pub worst_trade: Decimal,
    /// Gross profit / gross loss. `None` when there are no losing trades.
    pub profit_factor: Option<f64>,
    /// Mean realized P&L per trade.
    pub expectancy: Decimal,
    /// Longest run of consecutive winning trades.
    pub max_consecutive_wins: usize,
    /// Longest run of consecutive losing trades.
    pub max_consecutive_losses: usize,
}

/// Compute a performance report from the snapshot series and trade log.
///
/// The Sharpe ratio uses per-period excess returns over the risk-free rate,
/// annualized by `sqrt(periods_per_year)`. Fewer than three snapshots yield a
/// Sharpe of zero rather than a spurious value.
///
/// # Errors
///
/// Returns [`EngineError::EmptyPortfolio`] when no trades exist.
pub fn performance_report(
    snapshots: &[PortfolioSnapshot],
    trades: &[TradeRecord],
    risk_free_rate: f64,
    periods_per_year: u32,
) -> Result<PerformanceReport, EngineError> {
    if trades.is_empty() {
        return Err(EngineError::EmptyPortfolio);
    }

    let equity: Vec<f64> = snapshots
        .iter()
        .map(|s| s.total_value.to_f64().unwrap_or(0.0))
        .collect();
    let initial_value = snapshots
        .first()
        .map_or(Decimal::ZERO, |s| s.total_value);
    let final_value = snapshots.last().map_or(Decimal::ZERO, |s| s.total_value);

    let total_return = if equity.first().copied().unwrap_or(0.0) > 0.0 {
        equity[equity.len() - 1] / equity[0] - 1.0
    } else {
        0.0
    };

    let sharpe_ratio = sharpe(&equity, risk_free_rate, periods_per_year);
    let max_drawdown = max_drawdown(&equity);

    let wins = trades
        .iter()
        .filter(|t| t.realized_pnl > Decimal::ZERO)
        .count();
    let win_rate = wins as f64 / trades.len() as f64;

    let best_trade = trades
        .iter()
        .map(|t| t.realized_pnl)
        .max()
        .unwrap_or(Decimal::ZERO);
    let worst_trade = trades
        .iter()
        .map(|t| t.realized_pnl)
        .min()
        .unwrap_or(Decimal::ZERO);

    let gross_profit: Decimal = trades
        .iter()
        .filter(|t| t.realized_pnl > Decimal::ZERO)
        .map(|t| t.realized_pnl)
        .sum();
    let gross_loss: Decimal = trades
        .iter()
        .filter(|t| t.realized_pnl < Decimal::ZERO)
        .map(|t| -t.realized_pnl)
        .sum();
    let profit_factor = if gross_loss > Decimal::ZERO {
        Some(
            gross_profit.to_f64().unwrap_or(0.0) / gross_loss.to_f64().unwrap_or(1.0),
        )
    } else {
        None
    };

    let total_pnl: Decimal = trades.iter().map(|t| t.realized_pnl).sum();
    let expectancy = total_pnl / Decimal::from(trades.len() as u64);

    let (max_consecutive_wins, max_consecutive_losses) = streaks(trades);

    Ok(PerformanceReport {
        initial_value,
        final_value,
        total_return,
        sharpe_ratio,
        max_drawdown,
        win_rate,
        num_trades: trades.len(),
        best_trade,
        worst_trade,
        profit_factor,
        expectancy,
        max_consecutive_wins,
        max_consecutive_losses,
    })
}

/// Annualized Sharpe ratio from an equity curve.
fn sharpe(equity: &[f64], risk_free_rate: f64, periods_per_year: u32) -> f64 {
    if equity.len() < 3 {
        return 0.0;
    }
    let rf_per_period = risk_free_rate / f64::from(periods_per_year);
    let returns: Vec<f64> = equity
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0 - rf_per_period)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (returns.len() - 1) as f64;
    let std = variance.sqrt();
    if std < 1e-12 {
        return 0.0;
    }
    mean / std * f64::from(periods_per_year).sqrt()
}

/// Largest peak-to-trough decline as a positive fraction of the peak.
fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst
}

/// Longest win streak and loss streak in trade order. Break-even trades end
/// both streaks.
fn streaks(trades: &[TradeRecord]) -> (usize, usize) {
    let mut max_wins = 0;
    let mut max_losses = 0;
    let mut wins = 0;
    let mut losses = 0;
    for trade in trades {
        if trade.realized_pnl > Decimal::ZERO {
            wins += 1;
            losses = 0;
        } else if trade.realized_pnl < Decimal::ZERO {
            losses += 1;
            wins = 0;
        } else {
            wins = 0;
            losses = 0;
        }
        max_wins = max_wins.max(wins);
        max_losses = max_losses.max(losses);
    }
    (max_wins, max_losses)
}
