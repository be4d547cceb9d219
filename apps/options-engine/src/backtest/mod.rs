//! Time-stepped backtest simulation.
//!
//! [`BacktestEngine`] drives one strategy through a daily tick loop against
//! historical data, settling expirations at intrinsic value, evaluating
//! American early exercise against the binomial continuation value, and
//! snapshotting the portfolio every tick. One engine instance serves one
//! logical task; independent backtests share no mutable state and may run in
//! parallel freely.

mod data;
mod engine;

pub use data::{DataCoverage, HistoricalDataSource};
pub use engine::{BacktestEngine, BacktestState, CancelToken};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::portfolio::{PerformanceReport, PortfolioSnapshot, TradeRecord};

/// Minimum data coverage before the result carries a low-confidence warning.
pub const COVERAGE_WARNING_THRESHOLD: f64 = 0.80;

/// Parameters for one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// First simulated date (inclusive).
    pub start_date: NaiveDate,
    /// Last simulated date (inclusive).
    pub end_date: NaiveDate,
    /// Starting cash.
    pub initial_capital: Decimal,
    /// Underlying symbol being simulated.
    pub underlying: String,
    /// Pricing and commission settings.
    pub engine: EngineConfig,
}

impl BacktestConfig {
    /// Config with engine defaults. Runs are deterministic by construction:
    /// the tick loop prices only through closed-form models.
    #[must_use]
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        initial_capital: Decimal,
        underlying: impl Into<String>,
    ) -> Self {
        Self {
            start_date,
            end_date,
            initial_capital,
            underlying: underlying.into(),
            engine: EngineConfig::default(),
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Per-tick equity snapshots in date order.
    pub snapshots: Vec<PortfolioSnapshot>,
    /// Completed exits in chronological order.
    pub trades: Vec<TradeRecord>,
    /// Summary performance metrics.
    pub performance: PerformanceReport,
    /// How much of the run was priced from real data.
    pub coverage: DataCoverage,
    /// Non-fatal data-quality warnings attached to the result.
    pub warnings: Vec<String>,
    /// Cash remaining at the end of the run.
    pub final_cash: Decimal,
    /// Total equity at the end of the run.
    pub final_value: Decimal,
}
