//! The tick loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::portfolio::{ExitReason, PortfolioTracker, PositionStatus, performance_report};
use crate::pricing::{bs_greeks, bs_price, continuation_value};
use crate::strategy::Strategy;

use super::data::DataCoverage;
use super::{BacktestConfig, BacktestResult, COVERAGE_WARNING_THRESHOLD, HistoricalDataSource};

/// Cooperative cancellation flag shared between the caller and one run.
///
/// The tick loop checks the flag once per iteration; a cancelled run
/// terminates with [`EngineError::Cancelled`] and its partial state is
/// discardable, not resumable.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; observed at the next tick boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Lifecycle of one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacktestState {
    /// Constructed, not yet run.
    Initialized,
    /// Tick loop in progress.
    Running,
    /// Run finished and produced a result.
    Completed,
    /// Run aborted on an unrecoverable error.
    Failed,
}

/// Drives one strategy through the simulation.
///
/// Owns its [`PortfolioTracker`] for the duration of a run; not internally
/// synchronized.
#[derive(Debug)]
pub struct BacktestEngine {
    config: BacktestConfig,
    data: HistoricalDataSource,
    state: BacktestState,
    cancel: CancelToken,
}

impl BacktestEngine {
    /// Engine over a resolved data source.
    #[must_use]
    pub fn new(config: BacktestConfig, data: HistoricalDataSource) -> Self {
        Self {
            config,
            data,
            state: BacktestState::Initialized,
            cancel: CancelToken::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> BacktestState {
        self.state
    }

    /// Token the caller can use to cancel a run from another thread.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the strategy from the start date to the end date.
    ///
    /// Positions still open at the end of the run are liquidated at their
    /// final mark so realized performance is always well-defined.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] for a malformed date range,
    /// an invalid strategy, or a data source with no underlying series;
    /// [`EngineError::InsufficientFunds`] when the initial capital cannot
    /// cover the entry; [`EngineError::Cancelled`] when the caller cancels
    /// mid-run. Any error leaves the engine in the `Failed` state.
    pub fn run(&mut self, strategy: &Strategy) -> Result<BacktestResult, EngineError> {
        self.state = BacktestState::Running;
        let result = self.run_inner(strategy);
        self.state = match result {
            Ok(_) => BacktestState::Completed,
            Err(_) => BacktestState::Failed,
        };
        result
    }

    fn run_inner(&mut self, strategy: &Strategy) -> Result<BacktestResult, EngineError> {
        if self.config.start_date > self.config.end_date {
            return Err(EngineError::invalid_input(format!(
                "start date {} is after end date {}",
                self.config.start_date, self.config.end_date
            )));
        }
        let report = crate::strategy::validate(strategy, self.config.start_date);
        if !report.is_valid {
            return Err(EngineError::invalid_input(format!(
                "strategy failed validation: {}",
                report.errors.join("; ")
            )));
        }
        if !self.data.has_underlying() {
            return Err(EngineError::invalid_input(
                "data source has no underlying price series",
            ));
        }
        let mut spot = self
            .data
            .spot_at_or_before(self.config.start_date)
            .ok_or_else(|| {
                EngineError::invalid_input(format!(
                    "no underlying price at or before {}",
                    self.config.start_date
                ))
            })?;

        info!(
            strategy = %strategy.name,
            start = %self.config.start_date,
            end = %self.config.end_date,
            capital = %self.config.initial_capital,
            "Backtest started"
        );

        let mut portfolio = PortfolioTracker::new(self.config.initial_capital);
        let mut coverage = DataCoverage::default();
        let mut snapshots = Vec::new();

        self.open_legs(strategy, &mut portfolio, spot, &mut coverage)?;

        let mut date = self.config.start_date;
        loop {
            if self.cancel.is_cancelled() {
                return Err(EngineError::Cancelled { date });
            }

            if let Some(close) = self.data.spot_at_or_before(date) {
                spot = close;
            }
            let spot_f = decimal_to_f64(spot)?;

            self.settle_expirations(&mut portfolio, spot_f, date)?;
            let prices = self.reprice_open_legs(&mut portfolio, spot_f, date, &mut coverage)?;
            self.evaluate_early_exercise(&mut portfolio, spot_f, date)?;

            portfolio.mark_to_market(&prices);
            snapshots.push(portfolio.snapshot(date));

            let all_flat = portfolio.open_positions().next().is_none();
            if all_flat || date >= self.config.end_date {
                break;
            }
            date = date
                .checked_add_days(Days::new(1))
                .ok_or_else(|| EngineError::invalid_input("date overflow"))?;
        }

        self.liquidate_remaining(&mut portfolio, date)?;
        // The loop already snapshotted this date; replace that entry so the
        // daily series has one row per date, now reflecting the liquidation
        // cash flows.
        snapshots.pop();
        snapshots.push(portfolio.snapshot(date));

        let mut warnings = Vec::new();
        if coverage.model_fallbacks > 0 && coverage.ratio() < COVERAGE_WARNING_THRESHOLD {
            let message = format!(
                "historical data coverage {:.1}% is below {:.0}%; results are low-confidence",
                coverage.ratio() * 100.0,
                COVERAGE_WARNING_THRESHOLD * 100.0
            );
            warn!(coverage = coverage.ratio(), "{message}");
            warnings.push(message);
        }

        let performance = performance_report(
            &snapshots,
            &portfolio.trades,
            self.config.engine.risk_free_rate,
            self.config.engine.periods_per_year,
        )?;

        info!(
            ticks = snapshots.len(),
            trades = portfolio.trades.len(),
            final_value = %portfolio.total_value(),
            "Backtest completed"
        );

        Ok(BacktestResult {
            final_cash: portfolio.cash,
            final_value: portfolio.total_value(),
            trades: portfolio.trades,
            snapshots,
            performance,
            coverage,
            warnings,
        })
    }

    /// Open every strategy leg at the start date: explicit premium first,
    /// then historical price, then model price.
    fn open_legs(
        &self,
        strategy: &Strategy,
        portfolio: &mut PortfolioTracker,
        spot: Decimal,
        coverage: &mut DataCoverage,
    ) -> Result<(), EngineError> {
        let date = self.config.start_date;
        let spot_f = decimal_to_f64(spot)?;
        for leg in &strategy.legs {
            let price = if let Some(premium) = leg.premium {
                premium
            } else if let Some(close) =
                self.data.option_price_on(&leg.contract.instrument_id, date)
            {
                coverage.data_hits += 1;
                close
            } else {
                coverage.model_fallbacks += 1;
                self.model_price(&leg.contract, spot_f, date)?
            };
            let notional =
                price * Decimal::from(leg.quantity) * Decimal::from(leg.contract.multiplier);
            let commission = self.config.engine.commission_for(notional);
            portfolio.add_position(
                leg.contract.clone(),
                leg.action,
                leg.quantity,
                price,
                commission,
                date,
            )?;
        }
        Ok(())
    }

    /// Settle every open position whose contract has expired, at intrinsic
    /// value. The only path producing cash without an explicit trade.
    fn settle_expirations(
        &self,
        portfolio: &mut PortfolioTracker,
        spot: f64,
        date: NaiveDate,
    ) -> Result<(), EngineError> {
        let expired: Vec<_> = portfolio
            .open_positions()
            .filter(|p| p.contract.is_expired(date))
            .map(|p| (p.id, p.contract.kind, p.contract.strike))
            .collect();
        for (id, kind, strike) in expired {
            let intrinsic = kind.intrinsic(spot, decimal_to_f64(strike)?);
            debug!(position_id = %id, intrinsic, %date, "Settling expired position");
            portfolio.settle_expired(id, f64_to_decimal(intrinsic)?, date, ExitReason::Expiry)?;
        }
        Ok(())
    }

    /// Price each open leg from historical data when available, the model
    /// otherwise. Greeks always come from Black-Scholes, whatever the price
    /// source.
    fn reprice_open_legs(
        &self,
        portfolio: &mut PortfolioTracker,
        spot: f64,
        date: NaiveDate,
        coverage: &mut DataCoverage,
    ) -> Result<HashMap<String, Decimal>, EngineError> {
        let mut prices = HashMap::new();
        for position in &mut portfolio.positions {
            if position.status != PositionStatus::Open {
                continue;
            }
            let contract = &mut position.contract;
            let strike = decimal_to_f64(contract.strike)?;
            let vol = self
                .data
                .iv_on(date)
                .or(contract.implied_volatility)
                .unwrap_or(self.config.engine.default_volatility);
            let t = contract.time_to_expiry(date);

            let price = if let Some(close) = self.data.option_price_on(&contract.instrument_id, date)
            {
                coverage.data_hits += 1;
                close
            } else {
                coverage.model_fallbacks += 1;
                debug!(
                    instrument = %contract.instrument_id,
                    %date,
                    "No historical price, falling back to model"
                );
                let model = bs_price(
                    spot,
                    strike,
                    t,
                    self.config.engine.risk_free_rate,
                    vol,
                    contract.kind,
                )?;
                f64_to_decimal(model)?
            };

            contract.greeks = Some(bs_greeks(
                spot,
                strike,
                t,
                self.config.engine.risk_free_rate,
                vol,
                contract.kind,
            )?);
            prices.insert(contract.instrument_id.clone(), price);
        }
        Ok(prices)
    }

    /// Exercise American positions whose intrinsic value exceeds the
    /// modeled continuation value.
    fn evaluate_early_exercise(
        &self,
        portfolio: &mut PortfolioTracker,
        spot: f64,
        date: NaiveDate,
    ) -> Result<(), EngineError> {
        let candidates: Vec<_> = portfolio
            .open_positions()
            .filter(|p| p.contract.style == crate::models::OptionStyle::American)
            .map(|p| {
                (
                    p.id,
                    p.contract.kind,
                    p.contract.strike,
                    p.contract.time_to_expiry(date),
                    p.contract.implied_volatility,
                )
            })
            .collect();
        for (id, kind, strike, t, iv) in candidates {
            if t <= 0.0 {
                continue;
            }
            let strike_f = decimal_to_f64(strike)?;
            let intrinsic = kind.intrinsic(spot, strike_f);
            if intrinsic <= 0.0 {
                continue;
            }
            let vol = iv.unwrap_or(self.config.engine.default_volatility);
            let held = continuation_value(
                spot,
                strike_f,
                t,
                self.config.engine.risk_free_rate,
                vol,
                kind,
            )?;
            if intrinsic > held {
                debug!(position_id = %id, intrinsic, continuation = held, %date, "Early exercise");
                portfolio.settle_expired(
                    id,
                    f64_to_decimal(intrinsic)?,
                    date,
                    ExitReason::EarlyExercise,
                )?;
            }
        }
        Ok(())
    }

    /// Close any position still open after the final tick at its last mark.
    fn liquidate_remaining(
        &self,
        portfolio: &mut PortfolioTracker,
        date: NaiveDate,
    ) -> Result<(), EngineError> {
        let open: Vec<_> = portfolio
            .open_positions()
            .map(|p| {
                (
                    p.id,
                    p.quantity,
                    p.mark_price.unwrap_or(p.entry_price),
                    p.contract.multiplier,
                )
            })
            .collect();
        for (id, quantity, price, multiplier) in open {
            let notional = price * Decimal::from(quantity) * Decimal::from(multiplier);
            let commission = self.config.engine.commission_for(notional);
            portfolio.remove_position(id, quantity, price, commission, date)?;
        }
        Ok(())
    }

    fn model_price(
        &self,
        contract: &crate::models::OptionContract,
        spot: f64,
        date: NaiveDate,
    ) -> Result<Decimal, EngineError> {
        let vol = self
            .data
            .iv_on(date)
            .or(contract.implied_volatility)
            .unwrap_or(self.config.engine.default_volatility);
        let price = bs_price(
            spot,
            decimal_to_f64(contract.strike)?,
            contract.time_to_expiry(date),
            self.config.engine.risk_free_rate,
            vol,
            contract.kind,
        )?;
        f64_to_decimal(price)
    }
}

fn decimal_to_f64(value: Decimal) -> Result<f64, EngineError> {
    value
        .to_f64()
        .ok_or_else(|| EngineError::invalid_input(format!("{value} is out of f64 range")))
}

fn f64_to_decimal(value: f64) -> Result<Decimal, EngineError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(8))
        .ok_or_else(|| EngineError::invalid_input(format!("{value} is not representable")))
}
