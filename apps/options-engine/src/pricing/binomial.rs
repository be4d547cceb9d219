//! Cox-Ross-Rubinstein binomial tree pricing.
//!
//! Supports European and American exercise. This is the only pricing path in
//! the engine that models early exercise: at each interior node an American
//! option is worth max(continuation value, immediate exercise value).
//! Accuracy grows with `steps` at O(steps^2) cost.

use crate::error::EngineError;
use crate::models::{OptionKind, OptionStyle};

/// Price an option on a CRR binomial tree.
///
/// Up/down factors come from volatility and the step size
/// (`u = exp(sigma * sqrt(dt))`, `d = 1/u`), the risk-neutral up probability
/// from the risk-free rate. Terminal payoffs are backward-induced to the
/// root; American nodes take max(continuation, intrinsic).
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] on non-positive spot/strike,
/// negative time/volatility, or `steps == 0`.
pub fn binomial_price(
    spot: f64,
    strike: f64,
    time_to_expiry: f64,
    risk_free_rate: f64,
    volatility: f64,
    kind: OptionKind,
    style: OptionStyle,
    steps: u32,
) -> Result<f64, EngineError> {
    crr_value(
        spot,
        strike,
        time_to_expiry,
        risk_free_rate,
        volatility,
        kind,
        style,
        steps,
        true,
    )
}

/// Backward induction over a CRR tree.
///
/// `exercisable_now` controls whether the American exercise max applies at
/// the root node. With it disabled the root takes the bare discounted
/// expectation, which is the value of *holding* for one more step and
/// exercising optimally afterward.
fn crr_value(
    spot: f64,
    strike: f64,
    time_to_expiry: f64,
    risk_free_rate: f64,
    volatility: f64,
    kind: OptionKind,
    style: OptionStyle,
    steps: u32,
    exercisable_now: bool,
) -> Result<f64, EngineError> {
    EngineError::require_positive("spot", spot)?;
    EngineError::require_positive("strike", strike)?;
    EngineError::require_non_negative("time_to_expiry", time_to_expiry)?;
    EngineError::require_non_negative("volatility", volatility)?;
    if steps == 0 {
        return Err(EngineError::invalid_input("steps must be at least 1"));
    }

    if time_to_expiry == 0.0 {
        return Ok(kind.intrinsic(spot, strike));
    }

    let n = steps as usize;
    let dt = time_to_expiry / steps as f64;
    let u = (volatility * dt.sqrt()).exp();
    let d = 1.0 / u;
    let growth = (risk_free_rate * dt).exp();
    // Degenerate tree when vol is zero; clamp keeps p a probability.
    let p = if (u - d).abs() < f64::EPSILON {
        0.5
    } else {
        ((growth - d) / (u - d)).clamp(0.0, 1.0)
    };
    let discount = (-risk_free_rate * dt).exp();

    // Terminal layer: spot * u^j * d^(n-j) for j up-moves.
    let mut values: Vec<f64> = (0..=n)
        .map(|j| {
            let terminal_spot = spot * u.powi(j as i32) * d.powi((n - j) as i32);
            kind.intrinsic(terminal_spot, strike)
        })
        .collect();

    // Backward induction, reusing the same buffer layer by layer.
    for i in (0..n).rev() {
        for j in 0..=i {
            let continuation = discount * (p * values[j + 1] + (1.0 - p) * values[j]);
            values[j] = match style {
                OptionStyle::European => continuation,
                OptionStyle::American if i == 0 && !exercisable_now => continuation,
                OptionStyle::American => {
                    let node_spot = spot * u.powi(j as i32) * d.powi((i - j) as i32);
                    continuation.max(kind.intrinsic(node_spot, strike))
                }
            };
        }
    }

    Ok(values[0])
}

/// Value of holding an option rather than exercising it now.
///
/// Prices an American tree whose interior nodes may exercise but whose root
/// may not, so for a deep-ITM option on a positive rate the result drops
/// below intrinsic value — the signal that immediate exercise is optimal.
/// Used by the backtest's per-tick early-exercise check; a modest step count
/// keeps the cost bounded.
///
/// # Errors
///
/// Propagates [`EngineError::InvalidInput`] from the tree validation.
pub fn continuation_value(
    spot: f64,
    strike: f64,
    time_to_expiry: f64,
    risk_free_rate: f64,
    volatility: f64,
    kind: OptionKind,
) -> Result<f64, EngineError> {
    crr_value(
        spot,
        strike,
        time_to_expiry,
        risk_free_rate,
        volatility,
        kind,
        OptionStyle::American,
        128,
        false,
    )
}
