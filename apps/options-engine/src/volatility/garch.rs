//! GARCH(1,1) variance forecasting.
//!
//! Simplified method-of-moments fit: the long-run variance comes from the
//! sample, persistence from the lag-1 autocorrelation of squared returns,
//! and omega from the stationarity identity
//! `omega = long_run_var * (1 - alpha - beta)`. The forward recursion is
//! `var[t] = omega + alpha * r^2[t-1] + beta * var[t-1]`, which beyond the
//! first step collapses to mean reversion at rate `alpha + beta`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;

/// Minimum number of returns for a fit that is not pure noise.
const MIN_OBSERVATIONS: usize = 20;

/// Fitted GARCH(1,1) parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GarchParams {
    /// Constant term.
    pub omega: f64,
    /// Weight on the last squared return.
    pub alpha: f64,
    /// Weight on the last conditional variance.
    pub beta: f64,
    /// Unconditional (long-run) variance implied by the parameters.
    pub long_run_variance: f64,
}

/// GARCH forecast: fitted parameters plus per-step variance forecasts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarchForecast {
    /// Fitted parameters.
    pub params: GarchParams,
    /// Conditional variance at the end of the sample.
    pub last_variance: f64,
    /// One forecasted variance per step, `horizon` entries.
    pub variances: Vec<f64>,
}

impl GarchForecast {
    /// Annualized volatility forecasts derived from the variance path.
    #[must_use]
    pub fn annualized_vols(&self, periods_per_year: u32) -> Vec<f64> {
        let scale = f64::from(periods_per_year);
        self.variances.iter().map(|v| (v * scale).sqrt()).collect()
    }
}

/// Fit GARCH(1,1) to a return series and forecast `horizon` variances.
///
/// # Errors
///
/// Returns [`EngineError::InsufficientData`] for fewer than 20 returns and
/// [`EngineError::InvalidInput`] for a zero horizon or a degenerate
/// (zero-variance) series.
pub fn garch_forecast(returns: &[f64], horizon: usize) -> Result<GarchForecast, EngineError> {
    if horizon == 0 {
        return Err(EngineError::invalid_input("horizon must be at least 1"));
    }
    if returns.len() < MIN_OBSERVATIONS {
        return Err(EngineError::InsufficientData {
            required: MIN_OBSERVATIONS,
            actual: returns.len(),
        });
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let long_run_var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    if long_run_var <= f64::EPSILON {
        return Err(EngineError::invalid_input(
            "return series has zero variance; GARCH fit is degenerate",
        ));
    }

    // Method of moments: lag-1 autocorrelation of squared returns proxies the
    // ARCH effect; persistence is anchored near the empirical 0.9s and both
    // are clamped into the stationary region alpha + beta < 1.
    let squared: Vec<f64> = returns.iter().map(|r| (r - mean).powi(2)).collect();
    let rho1 = autocorrelation(&squared);
    let alpha = rho1.clamp(0.03, 0.30);
    let beta = (0.97 - alpha).min(0.92).max(0.0);
    let omega = long_run_var * (1.0 - alpha - beta);

    let params = GarchParams {
        omega,
        alpha,
        beta,
        long_run_variance: long_run_var,
    };

    // Filter the sample to get the conditional variance at the last step.
    let mut variance = long_run_var;
    for sq in &squared {
        variance = omega + alpha * sq + beta * variance;
    }
    let last_variance = variance;

    // Forward recursion from the last observed squared return.
    let mut variances = Vec::with_capacity(horizon);
    let last_sq = *squared.last().unwrap_or(&long_run_var);
    let mut next = omega + alpha * last_sq + beta * last_variance;
    variances.push(next);
    for _ in 1..horizon {
        next = omega + (alpha + beta) * next;
        variances.push(next);
    }

    debug!(
        alpha,
        beta,
        omega,
        long_run_var,
        horizon,
        "GARCH(1,1) forecast fitted"
    );

    Ok(GarchForecast {
        params,
        last_variance,
        variances,
    })
}

/// Lag-1 autocorrelation, clamped to [0, 1).
fn autocorrelation(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let denom: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    let num: f64 = values
        .windows(2)
        .map(|w| (w[0] - mean) * (w[1] - mean))
        .sum();
    (num / denom).clamp(0.0, 0.999)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_returns() -> Vec<f64> {
        // Deterministic heteroskedastic-looking series.
        (0..120)
            .map(|i| {
                let base = 0.01 * ((i as f64) * 0.37).sin();
                let regime = if (i / 30) % 2 == 0 { 1.0 } else { 2.5 };
                base * regime
            })
            .collect()
    }

    #[test]
    fn test_forecast_length_matches_horizon() {
        let forecast = garch_forecast(&sample_returns(), 10).unwrap();
        assert_eq!(forecast.variances.len(), 10);
    }

    #[test]
    fn test_stationarity_constraint() {
        let forecast = garch_forecast(&sample_returns(), 5).unwrap();
        let p = forecast.params;
        assert!(p.alpha + p.beta < 1.0);
        assert!(p.omega > 0.0);
        assert!(p.alpha >= 0.0 && p.beta >= 0.0);
    }

    #[test]
    fn test_forecast_reverts_toward_long_run_variance() {
        let forecast = garch_forecast(&sample_returns(), 500).unwrap();
        let last = *forecast.variances.last().unwrap();
        let lr = forecast.params.long_run_variance;
        // Mean reversion: the tail of the forecast approaches long-run var.
        assert!((last - lr).abs() / lr < 0.05);
    }

    #[test]
    fn test_all_variances_positive() {
        let forecast = garch_forecast(&sample_returns(), 50).unwrap();
        assert!(forecast.variances.iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_too_few_returns_rejected() {
        let returns = vec![0.01; 10];
        assert!(matches!(
            garch_forecast(&returns, 5),
            Err(EngineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_zero_variance_rejected() {
        let returns = vec![0.0; 50];
        assert!(garch_forecast(&returns, 5).is_err());
    }

    #[test]
    fn test_zero_horizon_rejected() {
        assert!(garch_forecast(&sample_returns(), 0).is_err());
    }

    #[test]
    fn test_annualized_vols() {
        let forecast = garch_forecast(&sample_returns(), 3).unwrap();
        let vols = forecast.annualized_vols(365);
        assert_eq!(vols.len(), 3);
        for (vol, var) in vols.iter().zip(&forecast.variances) {
            assert!((vol - (var * 365.0).sqrt()).abs() < 1e-12);
        }
    }
}
