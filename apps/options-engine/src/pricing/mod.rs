//! Option valuation: closed-form, tree, and simulation methods.
//!
//! - [`bs_price`] / [`bs_greeks`]: Black-Scholes closed form with the
//!   expiry-boundary conventions the backtest relies on
//! - [`binomial_price`]: Cox-Ross-Rubinstein tree, the only early-exercise path
//! - [`monte_carlo_price`]: seeded GBM simulation with standard error
//! - [`IvSolver`]: hybrid Newton-Raphson / bisection implied-volatility solver

pub mod black_scholes;
mod binomial;
mod iv;
mod monte_carlo;

pub use black_scholes::{bs_greeks, bs_price, norm_cdf, norm_inv_cdf, norm_pdf};
pub use binomial::{binomial_price, continuation_value};
pub use iv::{IvSolver, IvSolverConfig};
pub use monte_carlo::{MonteCarloPrice, monte_carlo_price};
