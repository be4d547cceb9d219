// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Options Engine - Quantitative Analytics and Backtesting Core
//!
//! Prices, analyzes, and backtests multi-leg options strategies on a single
//! underlying. Pure computation: no I/O, no network calls, no ambient global
//! state. External collaborators resolve market data up front and hand it in
//! as plain structures.
//!
//! # Modules
//!
//! - `pricing`: Black-Scholes closed form, Cox-Ross-Rubinstein binomial
//!   trees, Monte Carlo simulation, implied-volatility solving
//! - `volatility`: realized volatility statistics, GARCH(1,1) forecasting,
//!   IV surfaces, term structure, smile
//! - `strategy`: multi-leg strategy construction and validation
//! - `portfolio`: position lifecycle, cash accounting, performance metrics
//! - `risk`: Greek aggregation, Delta-Normal VaR, margin, limits, stress
//! - `backtest`: the time-stepped simulation loop tying it all together
//!
//! # Concurrency
//!
//! The engine is single-threaded and synchronous; the only mutable state is
//! the [`portfolio::PortfolioTracker`] owned by one backtest run. Independent
//! backtests may run in parallel with no shared state. Internally, Monte
//! Carlo paths and stress scenarios fan out over a thread pool but remain
//! deterministic for a fixed seed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Engine Modules
// =============================================================================

/// Time-stepped backtest simulation.
pub mod backtest;

/// Engine configuration and risk limit thresholds.
pub mod config;

/// Error taxonomy shared across the engine.
pub mod error;

/// Core data model: contracts, Greeks, bars, quotes.
pub mod models;

/// Lifecycle, cash accounting, and performance of positions.
pub mod portfolio;

/// Option pricing models and the implied-volatility solver.
pub mod pricing;

/// Portfolio risk aggregation and scenario analysis.
pub mod risk;

/// Strategy construction and validation.
pub mod strategy;

/// Volatility analytics and forecasting.
pub mod volatility;

// =============================================================================
// Re-exports
// =============================================================================

pub use backtest::{
    BacktestConfig, BacktestEngine, BacktestResult, BacktestState, CancelToken, DataCoverage,
    HistoricalDataSource,
};
pub use config::{EngineConfig, RiskLimits};
pub use error::EngineError;
pub use models::{Bar, Greeks, OptionContract, OptionKind, OptionQuote, OptionStyle};
pub use portfolio::{
    PerformanceReport, PortfolioSnapshot, PortfolioTracker, Position, PositionStatus, TradeRecord,
};
pub use pricing::{
    IvSolver, IvSolverConfig, MonteCarloPrice, binomial_price, bs_greeks, bs_price,
    monte_carlo_price,
};
pub use risk::{
    LimitBreach, LimitSeverity, MarginRequirement, StressTestResult, check_limits,
    margin_requirement, portfolio_greeks, stress_test, value_at_risk,
};
pub use strategy::{
    Action, PayoffProfile, Strategy, StrategyBuilder, StrategyLeg, StrategyType, validate,
};
pub use volatility::{
    VolatilitySurface, build_surface, garch_forecast, historical_volatility, volatility_cone,
};
