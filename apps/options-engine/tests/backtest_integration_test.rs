//! End-to-End Backtest Integration Tests
//!
//! Drives complete strategies through the simulation loop against synthetic
//! historical data and checks the cash accounting, settlement, risk, and
//! performance outputs hang together:
//! - Long straddle over a trending price path
//! - Short strangle held to expiration
//! - Deterministic replays of the same run
//! - Risk reporting over the positions a run produces

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::unreadable_literal)]

use chrono::{Days, NaiveDate};
use options_engine::backtest::{BacktestConfig, BacktestEngine, BacktestState, HistoricalDataSource};
use options_engine::portfolio::ExitReason;
use options_engine::strategy::{Action, StrategyBuilder};
use options_engine::{EngineError, OptionKind, RiskLimits, check_limits, portfolio_greeks};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Route engine logs through the test harness; `RUST_LOG=debug` shows the
/// per-tick pricing decisions.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Synthetic underlying series: daily bars drifting from `start_price` by
/// `daily_step` per day.
fn trending_source(
    start: NaiveDate,
    days: u64,
    start_price: Decimal,
    daily_step: Decimal,
) -> HistoricalDataSource {
    let mut source = HistoricalDataSource::new();
    let bars = (0..days).map(|i| {
        let d = start.checked_add_days(Days::new(i)).unwrap();
        let close = start_price + daily_step * Decimal::from(i);
        options_engine::Bar::ohlcv(d, close, close + dec!(100), close - dec!(100), close, dec!(500))
    });
    source.set_underlying(bars);
    source
}

#[test]
fn test_long_straddle_profits_from_large_move() {
    init_tracing();
    let start = date(2026, 1, 2);
    // Spot rallies 500/day from 50000: a 30-day run moves it ~29% up.
    let source = trending_source(start, 60, dec!(50000), dec!(500));
    let expiry = date(2026, 2, 1);

    let strategy = StrategyBuilder::new("BTC")
        .straddle(Action::Buy, dec!(50000), expiry, 1)
        .unwrap();

    let config = BacktestConfig::new(start, date(2026, 2, 15), dec!(100000), "BTC");
    let mut engine = BacktestEngine::new(config, source);
    let result = engine.run(&strategy).unwrap();

    assert_eq!(engine.state(), BacktestState::Completed);

    // The call settles deep in the money at expiry; the put expires
    // worthless. Net of the two premiums the move is large enough to win.
    let settlements: Vec<_> = result
        .trades
        .iter()
        .filter(|t| t.reason == ExitReason::Expiry)
        .collect();
    assert_eq!(settlements.len(), 2);

    let call_settlement = settlements
        .iter()
        .find(|t| t.instrument_id.contains("-C-"))
        .unwrap();
    // 30 days x 500/day above the 50000 strike.
    assert_eq!(call_settlement.exit_price, dec!(15000));

    let put_settlement = settlements
        .iter()
        .find(|t| t.instrument_id.contains("-P-"))
        .unwrap();
    assert_eq!(put_settlement.exit_price, dec!(0));

    let total_pnl: Decimal = result.trades.iter().map(|t| t.realized_pnl).sum();
    assert!(total_pnl > Decimal::ZERO);
    assert!(result.performance.total_return > 0.0);
}

#[test]
fn test_short_strangle_collects_premium_in_flat_market() {
    init_tracing();
    let start = date(2026, 1, 2);
    let source = trending_source(start, 60, dec!(50000), Decimal::ZERO);
    let expiry = date(2026, 2, 1);

    let strategy = StrategyBuilder::new("BTC")
        .strangle(Action::Sell, dec!(42000), dec!(58000), expiry, 1)
        .unwrap();

    let config = BacktestConfig::new(start, date(2026, 2, 15), dec!(100000), "BTC");
    let mut engine = BacktestEngine::new(config, source);
    let result = engine.run(&strategy).unwrap();

    // Both legs expire worthless; the seller keeps both premiums.
    for trade in result
        .trades
        .iter()
        .filter(|t| t.reason == ExitReason::Expiry)
    {
        assert_eq!(trade.exit_price, Decimal::ZERO);
        assert!(trade.realized_pnl > Decimal::ZERO);
    }
    assert!((result.performance.win_rate - 1.0).abs() < 1e-12);
    assert!(result.final_cash > dec!(100000));
}

#[test]
fn test_replay_is_deterministic() {
    init_tracing();
    let start = date(2026, 1, 2);
    let expiry = date(2026, 3, 27);
    let strategy = StrategyBuilder::new("BTC")
        .iron_condor([dec!(40000), dec!(45000), dec!(55000), dec!(60000)], expiry, 1)
        .unwrap();

    let run = || {
        let source = trending_source(start, 40, dec!(50000), dec!(-200));
        let config = BacktestConfig::new(start, date(2026, 2, 10), dec!(100000), "BTC");
        BacktestEngine::new(config, source).run(&strategy).unwrap()
    };

    let first = run();
    let second = run();

    assert_eq!(first.snapshots.len(), second.snapshots.len());
    for (a, b) in first.snapshots.iter().zip(&second.snapshots) {
        assert_eq!(a.date, b.date);
        assert_eq!(a.cash, b.cash);
        assert_eq!(a.total_value, b.total_value);
    }
    assert_eq!(first.final_value, second.final_value);
    assert_eq!(first.coverage.data_hits, second.coverage.data_hits);
    assert_eq!(first.coverage.model_fallbacks, second.coverage.model_fallbacks);
}

#[test]
fn test_model_fallback_flagged_as_low_coverage() {
    init_tracing();
    // No option bars at all: every tick prices from the model.
    let start = date(2026, 1, 2);
    let source = trending_source(start, 20, dec!(50000), dec!(100));
    let strategy = StrategyBuilder::new("BTC")
        .single_leg(OptionKind::Call, Action::Buy, dec!(50000), date(2026, 3, 27), 1)
        .unwrap();

    let config = BacktestConfig::new(start, date(2026, 1, 20), dec!(100000), "BTC");
    let mut engine = BacktestEngine::new(config, source);
    let result = engine.run(&strategy).unwrap();

    assert_eq!(result.coverage.data_hits, 0);
    assert!(result.coverage.ratio() < 0.80);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("coverage"));
}

#[test]
fn test_cancelled_run_is_discardable() {
    init_tracing();
    let start = date(2026, 1, 2);
    let source = trending_source(start, 20, dec!(50000), Decimal::ZERO);
    let strategy = StrategyBuilder::new("BTC")
        .single_leg(OptionKind::Put, Action::Buy, dec!(50000), date(2026, 3, 27), 1)
        .unwrap();

    let config = BacktestConfig::new(start, date(2026, 1, 20), dec!(100000), "BTC");
    let mut engine = BacktestEngine::new(config, source);
    engine.cancel_token().cancel();

    let err = engine.run(&strategy).unwrap_err();
    assert!(matches!(err, EngineError::Cancelled { .. }));
    assert_eq!(engine.state(), BacktestState::Failed);
}

#[test]
fn test_risk_reporting_over_backtest_positions() {
    // Build a small book by hand the way the engine marks it, then push it
    // through the risk calculators.
    init_tracing();
    let start = date(2026, 1, 2);
    let source = trending_source(start, 30, dec!(50000), dec!(100));
    let strategy = StrategyBuilder::new("BTC")
        .straddle(Action::Buy, dec!(50000), date(2026, 6, 26), 1)
        .unwrap();

    let config = BacktestConfig::new(start, date(2026, 1, 10), dec!(100000), "BTC");
    let mut engine = BacktestEngine::new(config, source);
    let result = engine.run(&strategy).unwrap();

    // Greeks were attached every tick; the last snapshot before liquidation
    // carries the aggregate.
    let marked = result
        .snapshots
        .iter()
        .rev()
        .find(|s| s.greeks.is_some())
        .expect("at least one snapshot carries Greeks");
    let greeks = marked.greeks.unwrap();
    // A long ATM straddle is roughly delta-neutral and long gamma/vega.
    assert!(greeks.delta.abs() < 0.5);
    assert!(greeks.gamma > 0.0);
    assert!(greeks.vega > 0.0);

    let breaches = check_limits(&greeks, 0.01, &RiskLimits::default());
    assert!(breaches.is_empty());

    // An empty book aggregates to zero.
    assert_eq!(portfolio_greeks(&[]).delta, 0.0);
}
