//! Black-Scholes closed-form pricing and analytic Greeks.
//!
//! The `time_to_expiry == 0` boundary returns intrinsic value directly and
//! never touches d1/d2 (division by `sigma * sqrt(t)` would blow up there).
//! The same applies to `volatility == 0`, where the price collapses to the
//! discounted intrinsic value on the forward.

use std::f64::consts::PI;

use crate::error::EngineError;
use crate::models::{Greeks, OptionKind};

/// Standard normal CDF (cumulative distribution function).
#[must_use]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + libm::erf(x / std::f64::consts::SQRT_2))
}

/// Standard normal PDF (probability density function).
#[must_use]
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Inverse standard normal CDF (Acklam's rational approximation).
///
/// Accurate to ~1e-9 over (0, 1); used for VaR z-scores and confidence
/// intervals rather than pricing itself.
#[must_use]
pub fn norm_inv_cdf(p: f64) -> f64 {
    debug_assert!(p > 0.0 && p < 1.0);

    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_690e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Black-Scholes d1 parameter. Caller guarantees `t > 0` and `sigma > 0`.
fn d1(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> f64 {
    ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

fn validate(spot: f64, strike: f64, time_to_expiry: f64, volatility: f64) -> Result<(), EngineError> {
    EngineError::require_positive("spot", spot)?;
    EngineError::require_positive("strike", strike)?;
    EngineError::require_non_negative("time_to_expiry", time_to_expiry)?;
    EngineError::require_non_negative("volatility", volatility)?;
    Ok(())
}

/// Black-Scholes price of a European option.
///
/// At `time_to_expiry == 0` returns intrinsic value (the terminal boundary
/// condition); at `volatility == 0` returns the discounted intrinsic value on
/// the forward. Deterministic, no side effects.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] on non-positive spot/strike or
/// negative time/volatility.
pub fn bs_price(
    spot: f64,
    strike: f64,
    time_to_expiry: f64,
    risk_free_rate: f64,
    volatility: f64,
    kind: OptionKind,
) -> Result<f64, EngineError> {
    validate(spot, strike, time_to_expiry, volatility)?;

    if time_to_expiry == 0.0 {
        return Ok(kind.intrinsic(spot, strike));
    }
    if volatility == 0.0 {
        let discounted_strike = strike * (-risk_free_rate * time_to_expiry).exp();
        return Ok(kind.intrinsic(spot, discounted_strike));
    }

    let d1_val = d1(spot, strike, time_to_expiry, risk_free_rate, volatility);
    let d2_val = d1_val - volatility * time_to_expiry.sqrt();
    let df = (-risk_free_rate * time_to_expiry).exp();

    let price = match kind {
        OptionKind::Call => spot * norm_cdf(d1_val) - strike * df * norm_cdf(d2_val),
        OptionKind::Put => strike * df * norm_cdf(-d2_val) - spot * norm_cdf(-d1_val),
    };
    Ok(price)
}

/// Analytic Black-Scholes Greeks.
///
/// Edge case: at `time_to_expiry == 0` every Greek except delta degrades to 0
/// by convention, and delta becomes a step function of moneyness (0, 0.5, or
/// 1 for calls; mirrored for puts). Backtests hit this boundary on every
/// expiration day, so it must not produce NaN.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] on non-positive spot/strike or
/// negative time/volatility.
pub fn bs_greeks(
    spot: f64,
    strike: f64,
    time_to_expiry: f64,
    risk_free_rate: f64,
    volatility: f64,
    kind: OptionKind,
) -> Result<Greeks, EngineError> {
    validate(spot, strike, time_to_expiry, volatility)?;

    if time_to_expiry == 0.0 || volatility == 0.0 {
        return Ok(terminal_greeks(spot, strike, kind));
    }

    let sqrt_t = time_to_expiry.sqrt();
    let d1_val = d1(spot, strike, time_to_expiry, risk_free_rate, volatility);
    let d2_val = d1_val - volatility * sqrt_t;
    let df = (-risk_free_rate * time_to_expiry).exp();
    let pdf_d1 = norm_pdf(d1_val);

    let delta = match kind {
        OptionKind::Call => norm_cdf(d1_val),
        OptionKind::Put => norm_cdf(d1_val) - 1.0,
    };
    let gamma = pdf_d1 / (spot * volatility * sqrt_t);
    let vega = spot * pdf_d1 * sqrt_t;
    let theta = match kind {
        OptionKind::Call => {
            -spot * pdf_d1 * volatility / (2.0 * sqrt_t)
                - risk_free_rate * strike * df * norm_cdf(d2_val)
        }
        OptionKind::Put => {
            -spot * pdf_d1 * volatility / (2.0 * sqrt_t)
                + risk_free_rate * strike * df * norm_cdf(-d2_val)
        }
    };
    let rho = match kind {
        OptionKind::Call => strike * time_to_expiry * df * norm_cdf(d2_val),
        OptionKind::Put => -strike * time_to_expiry * df * norm_cdf(-d2_val),
    };

    Ok(Greeks::new(delta, gamma, theta, vega, rho))
}

/// Greeks at the expiry boundary: delta is a moneyness step, the rest zero.
fn terminal_greeks(spot: f64, strike: f64, kind: OptionKind) -> Greeks {
    let call_delta = if spot > strike {
        1.0
    } else if spot < strike {
        0.0
    } else {
        0.5
    };
    let delta = match kind {
        OptionKind::Call => call_delta,
        OptionKind::Put => call_delta - 1.0,
    };
    Greeks::new(delta, 0.0, 0.0, 0.0, 0.0)
}
