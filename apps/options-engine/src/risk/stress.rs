//! Full-revaluation stress testing over a shock grid.

use chrono::NaiveDate;
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::portfolio::Position;
use crate::pricing::bs_price;

/// Default price shocks: unshocked plus +/-5% through +/-30%.
pub const DEFAULT_PRICE_SHOCKS: [f64; 9] =
    [-0.30, -0.20, -0.10, -0.05, 0.0, 0.05, 0.10, 0.20, 0.30];

/// Default volatility shocks: -25% through +100%.
pub const DEFAULT_VOL_SHOCKS: [f64; 5] = [-0.25, 0.0, 0.25, 0.50, 1.0];

/// One cell of the stress grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    /// Relative spot shock (-0.10 = spot down 10%).
    pub price_shock: f64,
    /// Relative volatility shock (0.50 = vol up 50%).
    pub vol_shock: f64,
    /// Portfolio P&L under the scenario.
    pub pnl: f64,
    /// P&L as a fraction of the base portfolio value.
    pub pnl_pct: f64,
}

/// All scenarios plus the worst case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestResult {
    /// Every (price shock, vol shock) combination evaluated.
    pub scenarios: Vec<StressScenario>,
    /// The scenario with the largest loss.
    pub worst_case: StressScenario,
}

/// Revalue the portfolio under every combination of price and volatility
/// shock and report P&L per scenario.
///
/// Each position is repriced with Black-Scholes at the shocked spot and
/// volatility; the base value uses the unshocked inputs, so a (0, 0) cell
/// always shows zero P&L. Scenarios are independent and evaluated in
/// parallel.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] when inputs are out of domain, when
/// either shock list is empty, or when a shock would push spot or
/// volatility non-positive.
pub fn stress_test(
    positions: &[Position],
    spot: f64,
    price_shocks: &[f64],
    vol_shocks: &[f64],
    config: &EngineConfig,
    asof: NaiveDate,
) -> Result<StressTestResult, EngineError> {
    EngineError::require_positive("spot", spot)?;
    if price_shocks.is_empty() || vol_shocks.is_empty() {
        return Err(EngineError::invalid_input(
            "stress test requires at least one price shock and one vol shock",
        ));
    }
    if let Some(shock) = price_shocks.iter().find(|&&s| s <= -1.0) {
        return Err(EngineError::invalid_input(format!(
            "price shock {shock} would make spot non-positive"
        )));
    }
    if let Some(shock) = vol_shocks.iter().find(|&&s| s <= -1.0) {
        return Err(EngineError::invalid_input(format!(
            "vol shock {shock} would make volatility non-positive"
        )));
    }

    let base_value = portfolio_model_value(positions, spot, 0.0, config, asof)?;

    let grid: Vec<(f64, f64)> = price_shocks
        .iter()
        .flat_map(|&p| vol_shocks.iter().map(move |&v| (p, v)))
        .collect();

    let scenarios: Vec<StressScenario> = grid
        .par_iter()
        .map(|&(price_shock, vol_shock)| {
            let shocked_spot = spot * (1.0 + price_shock);
            let shocked_value =
                portfolio_model_value(positions, shocked_spot, vol_shock, config, asof)?;
            let pnl = shocked_value - base_value;
            let pnl_pct = if base_value.abs() > 1e-9 {
                pnl / base_value.abs()
            } else {
                0.0
            };
            Ok(StressScenario {
                price_shock,
                vol_shock,
                pnl,
                pnl_pct,
            })
        })
        .collect::<Result<_, EngineError>>()?;

    let worst_case = scenarios
        .iter()
        .copied()
        .min_by(|a, b| a.pnl.total_cmp(&b.pnl))
        .ok_or_else(|| EngineError::invalid_input("empty stress grid"))?;

    info!(
        scenarios = scenarios.len(),
        worst_pnl = worst_case.pnl,
        worst_price_shock = worst_case.price_shock,
        worst_vol_shock = worst_case.vol_shock,
        "Stress test complete"
    );

    Ok(StressTestResult {
        scenarios,
        worst_case,
    })
}

/// Model value of the portfolio at a shocked spot and relative vol shock.
fn portfolio_model_value(
    positions: &[Position],
    spot: f64,
    vol_shock: f64,
    config: &EngineConfig,
    asof: NaiveDate,
) -> Result<f64, EngineError> {
    let mut total = 0.0;
    for position in positions {
        let strike = position
            .contract
            .strike
            .to_f64()
            .ok_or_else(|| EngineError::invalid_input("strike out of f64 range"))?;
        let vol = position
            .contract
            .implied_volatility
            .unwrap_or(config.default_volatility)
            * (1.0 + vol_shock);
        let t = position.contract.time_to_expiry(asof);
        let price = bs_price(
            spot,
            strike,
            t,
            config.risk_free_rate,
            vol,
            position.contract.kind,
        )?;
        total += price
            * position.signed_quantity() as f64
            * f64::from(position.contract.multiplier);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OptionContract, OptionKind, OptionStyle};
    use crate::portfolio::PositionStatus;
    use crate::strategy::Action;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn long_call() -> Position {
        let mut contract = OptionContract::new(
            "BTC",
            OptionKind::Call,
            OptionStyle::European,
            dec!(50000),
            date(2026, 6, 26),
            1,
        );
        contract.implied_volatility = Some(0.6);
        Position {
            id: Uuid::new_v4(),
            contract,
            action: Action::Buy,
            quantity: 1,
            entry_price: dec!(4000),
            entry_date: date(2026, 1, 2),
            status: PositionStatus::Open,
            mark_price: Some(dec!(4000)),
        }
    }

    #[test]
    fn test_zero_shock_cell_is_zero_pnl() {
        let positions = vec![long_call()];
        let result = stress_test(
            &positions,
            50000.0,
            &[0.0],
            &[0.0],
            &EngineConfig::default(),
            date(2026, 1, 2),
        )
        .unwrap();
        assert_eq!(result.scenarios.len(), 1);
        assert!(result.scenarios[0].pnl.abs() < 1e-9);
    }

    #[test]
    fn test_long_call_loses_on_crash() {
        let positions = vec![long_call()];
        let result = stress_test(
            &positions,
            50000.0,
            &[-0.30, 0.0, 0.30],
            &[0.0],
            &EngineConfig::default(),
            date(2026, 1, 2),
        )
        .unwrap();
        assert_eq!(result.scenarios.len(), 3);
        assert!((result.worst_case.price_shock + 0.30).abs() < 1e-12);
        assert!(result.worst_case.pnl < 0.0);
    }

    #[test]
    fn test_long_call_gains_on_vol_spike() {
        let positions = vec![long_call()];
        let result = stress_test(
            &positions,
            50000.0,
            &[0.0],
            &[-0.25, 0.0, 1.0],
            &EngineConfig::default(),
            date(2026, 1, 2),
        )
        .unwrap();
        let vol_up = result
            .scenarios
            .iter()
            .find(|s| (s.vol_shock - 1.0).abs() < 1e-12)
            .unwrap();
        assert!(vol_up.pnl > 0.0);
        // Worst case for a long call is the vol crush.
        assert!((result.worst_case.vol_shock + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_empty_shock_grid_rejected() {
        let positions = vec![long_call()];
        assert!(
            stress_test(
                &positions,
                50000.0,
                &[],
                &[0.0],
                &EngineConfig::default(),
                date(2026, 1, 2),
            )
            .is_err()
        );
    }

    #[test]
    fn test_degenerate_shock_rejected() {
        let positions = vec![long_call()];
        assert!(
            stress_test(
                &positions,
                50000.0,
                &[-1.0],
                &[0.0],
                &EngineConfig::default(),
                date(2026, 1, 2),
            )
            .is_err()
        );
    }
}
