//! Implied volatility solver.
//!
//! Hybrid root-finder over [`bs_price`]:
//! - Newton-Raphson seeded by the Brenner-Subrahmanyam approximation for
//!   near-the-money options (2-4 iterations in the typical case)
//! - Bisection for far-from-the-money options where vega is too small for
//!   Newton steps to be stable, and as a fallback on non-convergence
//!
//! The solver fails with [`EngineError::Convergence`] rather than returning
//! NaN; prices below intrinsic are rejected up front as invalid input.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::OptionKind;
use crate::pricing::black_scholes::{bs_greeks, bs_price};

/// Configuration for the IV solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvSolverConfig {
    /// Maximum iterations for either method.
    pub max_iterations: u32,
    /// Convergence tolerance (absolute price error).
    pub tolerance: f64,
    /// Lower volatility search bound.
    pub min_vol: f64,
    /// Upper volatility search bound.
    pub max_vol: f64,
    /// |ln(S/K)| above which the solver goes straight to bisection.
    pub moneyness_threshold: f64,
}

impl Default for IvSolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
            min_vol: 0.001,
            max_vol: 5.0,
            moneyness_threshold: 0.20,
        }
    }
}

/// Implied volatility solver.
#[derive(Debug, Clone, Default)]
pub struct IvSolver {
    config: IvSolverConfig,
}

impl IvSolver {
    /// Create a solver with the given configuration.
    #[must_use]
    pub const fn new(config: IvSolverConfig) -> Self {
        Self { config }
    }

    /// Solve for the volatility that reproduces `observed_price`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidInput`] when inputs are out of domain or the
    ///   observed price is below intrinsic value (no root exists)
    /// - [`EngineError::Convergence`] when no root is found within the
    ///   iteration budget and volatility bounds
    pub fn solve(
        &self,
        observed_price: f64,
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        risk_free_rate: f64,
        kind: OptionKind,
    ) -> Result<f64, EngineError> {
        EngineError::require_positive("observed_price", observed_price)?;
        EngineError::require_positive("spot", spot)?;
        EngineError::require_positive("strike", strike)?;
        EngineError::require_positive("time_to_expiry", time_to_expiry)?;

        // A price below discounted intrinsic has no volatility root.
        let discounted_strike = strike * (-risk_free_rate * time_to_expiry).exp();
        let floor = kind.intrinsic(spot, discounted_strike);
        if observed_price < floor - self.config.tolerance {
            return Err(EngineError::invalid_input(format!(
                "observed price {observed_price:.6} is below intrinsic value {floor:.6}"
            )));
        }

        let log_moneyness = (spot / strike).ln().abs();
        if log_moneyness > self.config.moneyness_threshold {
            return self.bisection(observed_price, spot, strike, time_to_expiry, risk_free_rate, kind);
        }

        let guess = brenner_subrahmanyam(observed_price, spot, time_to_expiry)
            .clamp(self.config.min_vol, self.config.max_vol);
        self.newton_raphson(
            observed_price,
            spot,
            strike,
            time_to_expiry,
            risk_free_rate,
            kind,
            guess,
        )
        .or_else(|_| {
            self.bisection(observed_price, spot, strike, time_to_expiry, risk_free_rate, kind)
        })
    }

    fn newton_raphson(
        &self,
        observed_price: f64,
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        risk_free_rate: f64,
        kind: OptionKind,
        initial_guess: f64,
    ) -> Result<f64, EngineError> {
        let mut sigma = initial_guess;

        for i in 0..self.config.max_iterations {
            let price = bs_price(spot, strike, time_to_expiry, risk_free_rate, sigma, kind)?;
            let error = price - observed_price;
            if error.abs() < self.config.tolerance {
                return Ok(sigma);
            }

            let vega = bs_greeks(spot, strike, time_to_expiry, risk_free_rate, sigma, kind)?.vega;
            if vega.abs() < 1e-12 {
                // Vega has flattened out; Newton steps would explode.
                return Err(EngineError::Convergence {
                    iterations: i,
                    last_error: error.abs(),
                });
            }

            sigma = (sigma - error / vega).clamp(self.config.min_vol, self.config.max_vol);
        }

        let last = bs_price(spot, strike, time_to_expiry, risk_free_rate, sigma, kind)?;
        Err(EngineError::Convergence {
            iterations: self.config.max_iterations,
            last_error: (last - observed_price).abs(),
        })
    }

    fn bisection(
        &self,
        observed_price: f64,
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        risk_free_rate: f64,
        kind: OptionKind,
    ) -> Result<f64, EngineError> {
        let mut low = self.config.min_vol;
        let mut high = self.config.max_vol;

        let price_low = bs_price(spot, strike, time_to_expiry, risk_free_rate, low, kind)?;
        let price_high = bs_price(spot, strike, time_to_expiry, risk_free_rate, high, kind)?;
        if observed_price < price_low || observed_price > price_high {
            return Err(EngineError::invalid_input(format!(
                "observed price {observed_price:.6} outside attainable range \
                 [{price_low:.6}, {price_high:.6}] for vol in [{low}, {high}]"
            )));
        }

        for _ in 0..self.config.max_iterations {
            let mid = f64::midpoint(low, high);
            let price = bs_price(spot, strike, time_to_expiry, risk_free_rate, mid, kind)?;
            let error = price - observed_price;

            if error.abs() < self.config.tolerance || (high - low) < 1e-10 {
                return Ok(mid);
            }
            if error > 0.0 {
                high = mid;
            } else {
                low = mid;
            }
        }

        let mid = f64::midpoint(low, high);
        let last = bs_price(spot, strike, time_to_expiry, risk_free_rate, mid, kind)?;
        Err(EngineError::Convergence {
            iterations: self.config.max_iterations,
            last_error: (last - observed_price).abs(),
        })
    }
}

/// Brenner-Subrahmanyam at-the-money approximation:
/// `sigma ~= price / spot * sqrt(2*pi / T)`.
fn brenner_subrahmanyam(price: f64, spot: f64, time_to_expiry: f64) -> f64 {
    (price / spot) * (2.0 * PI / time_to_expiry).sqrt()
}
