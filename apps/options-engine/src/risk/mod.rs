//! Portfolio-level risk: Greek aggregation, VaR, margin, limits, stress.
//!
//! Every function here is a pure computation over read-only position data;
//! repricing under shocked scenarios goes through the pricing module.

mod limits;
mod stress;

pub use limits::{LimitBreach, LimitSeverity, check_limits};
pub use stress::{
    DEFAULT_PRICE_SHOCKS, DEFAULT_VOL_SHOCKS, StressScenario, StressTestResult, stress_test,
};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::{Greeks, OptionKind};
use crate::portfolio::Position;
use crate::pricing::{norm_inv_cdf, norm_pdf};
use crate::strategy::Action;

/// Sum per-position Greeks into portfolio Greeks, weighted by signed
/// quantity and contract multiplier. Positions without Greeks contribute
/// nothing.
#[must_use]
pub fn portfolio_greeks(positions: &[Position]) -> Greeks {
    let mut total = Greeks::zero();
    for position in positions {
        if let Some(g) = position.contract.greeks {
            let weight =
                position.signed_quantity() as f64 * f64::from(position.contract.multiplier);
            total = total.add(&g.scale(weight));
        }
    }
    total
}

/// Delta-Normal Value-at-Risk and Conditional VaR, both as positive loss
/// magnitudes in currency units.
///
/// Portfolio standard deviation is approximated from the aggregated delta
/// and the underlying's annualized volatility; both figures scale with the
/// square root of the horizon, not linearly.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] when confidence is outside (0, 1),
/// or when spot, volatility, or horizon are out of domain.
pub fn value_at_risk(
    positions: &[Position],
    spot: f64,
    annual_volatility: f64,
    confidence: f64,
    horizon_days: f64,
    periods_per_year: u32,
) -> Result<(f64, f64), EngineError> {
    EngineError::require_positive("spot", spot)?;
    EngineError::require_non_negative("annual_volatility", annual_volatility)?;
    EngineError::require_positive("horizon_days", horizon_days)?;
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(EngineError::invalid_input(format!(
            "confidence must be in (0, 1), got {confidence}"
        )));
    }

    let delta = portfolio_greeks(positions).delta;
    let daily_std =
        delta.abs() * spot * annual_volatility / f64::from(periods_per_year).sqrt();
    let horizon_std = daily_std * horizon_days.sqrt();

    let z = norm_inv_cdf(confidence);
    let var = z * horizon_std;
    // Expected shortfall of a normal at the same confidence.
    let cvar = horizon_std * norm_pdf(z) / (1.0 - confidence);
    Ok((var, cvar))
}

/// Initial and maintenance margin for one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginRequirement {
    /// Margin required to open the position.
    pub initial: Decimal,
    /// Margin required to keep it open (0.75 x initial).
    pub maintenance: Decimal,
}

/// Margin for a single position under the standard short-option rule.
///
/// Long options require premium only. Short options require
/// `max(0.15 x spot - OTM amount, 0.10 x spot) + premium` per contract.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] for a non-positive spot.
pub fn margin_requirement(
    position: &Position,
    spot: Decimal,
) -> Result<MarginRequirement, EngineError> {
    if spot <= Decimal::ZERO {
        return Err(EngineError::invalid_input(format!(
            "spot must be positive, got {spot}"
        )));
    }

    let premium = position.mark_price.unwrap_or(position.entry_price);
    let size = Decimal::from(position.quantity) * Decimal::from(position.contract.multiplier);

    let per_contract = match position.action {
        Action::Buy => premium,
        Action::Sell => {
            let otm = match position.contract.kind {
                OptionKind::Call => (position.contract.strike - spot).max(Decimal::ZERO),
                OptionKind::Put => (spot - position.contract.strike).max(Decimal::ZERO),
            };
            let risk_based = (dec!(0.15) * spot - otm).max(dec!(0.10) * spot);
            risk_based + premium
        }
    };

    let initial = per_contract * size;
    Ok(MarginRequirement {
        initial,
        maintenance: initial * dec!(0.75),
    })
}
