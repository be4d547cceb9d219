//! Monte Carlo pricing under the risk-neutral measure.
//!
//! Simulates geometric Brownian motion paths, averages discounted terminal
//! payoffs, and reports a standard error alongside the point estimate.
//! Paths are generated in fixed-size chunks, each chunk seeded from the base
//! seed and its index, so results are reproducible regardless of how rayon
//! schedules the chunks across threads.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::OptionKind;
use crate::pricing::black_scholes::norm_inv_cdf;

/// Paths per rng chunk. Chunking pins determinism under parallel execution.
const CHUNK_SIZE: u32 = 1024;

/// Result of a Monte Carlo pricing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloPrice {
    /// Discounted mean payoff (the point estimate).
    pub price: f64,
    /// Standard error of the estimate.
    pub std_error: f64,
    /// Lower bound of the 95% confidence interval.
    pub ci_low: f64,
    /// Upper bound of the 95% confidence interval.
    pub ci_high: f64,
    /// Number of simulated paths.
    pub num_paths: u32,
}

/// Price a European option by Monte Carlo simulation.
///
/// `num_steps` controls the time discretization of each path; for a plain
/// terminal payoff one step is exact under GBM, but callers that reuse the
/// path machinery for path-dependent payoffs want finer grids.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] on non-positive spot/strike,
/// negative time/volatility, or zero paths/steps.
pub fn monte_carlo_price(
    spot: f64,
    strike: f64,
    time_to_expiry: f64,
    risk_free_rate: f64,
    volatility: f64,
    kind: OptionKind,
    num_paths: u32,
    num_steps: u32,
    seed: u64,
) -> Result<MonteCarloPrice, EngineError> {
    EngineError::require_positive("spot", spot)?;
    EngineError::require_positive("strike", strike)?;
    EngineError::require_non_negative("time_to_expiry", time_to_expiry)?;
    EngineError::require_non_negative("volatility", volatility)?;
    if num_paths == 0 {
        return Err(EngineError::invalid_input("num_paths must be at least 1"));
    }
    if num_steps == 0 {
        return Err(EngineError::invalid_input("num_steps must be at least 1"));
    }

    if time_to_expiry == 0.0 {
        let intrinsic = kind.intrinsic(spot, strike);
        return Ok(MonteCarloPrice {
            price: intrinsic,
            std_error: 0.0,
            ci_low: intrinsic,
            ci_high: intrinsic,
            num_paths,
        });
    }

    let dt = time_to_expiry / f64::from(num_steps);
    let drift = (risk_free_rate - 0.5 * volatility * volatility) * dt;
    let diffusion = volatility * dt.sqrt();
    let discount = (-risk_free_rate * time_to_expiry).exp();

    let num_chunks = num_paths.div_ceil(CHUNK_SIZE);
    let (sum, sum_sq) = (0..num_chunks)
        .into_par_iter()
        .map(|chunk| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(u64::from(chunk)));
            let paths_in_chunk = CHUNK_SIZE.min(num_paths - chunk * CHUNK_SIZE);
            let mut sum = 0.0f64;
            let mut sum_sq = 0.0f64;
            for _ in 0..paths_in_chunk {
                let mut price = spot;
                for _ in 0..num_steps {
                    let z: f64 = StandardNormal.sample(&mut rng);
                    price *= (drift + diffusion * z).exp();
                }
                let payoff = discount * kind.intrinsic(price, strike);
                sum += payoff;
                sum_sq += payoff * payoff;
            }
            (sum, sum_sq)
        })
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));

    let n = f64::from(num_paths);
    let mean = sum / n;
    let variance = ((sum_sq / n) - mean * mean).max(0.0);
    let std_error = (variance / n).sqrt();
    let z95 = norm_inv_cdf(0.975);

    Ok(MonteCarloPrice {
        price: mean,
        std_error,
        ci_low: mean - z95 * std_error,
        ci_high: mean + z95 * std_error,
        num_paths,
    })
}
