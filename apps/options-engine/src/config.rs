//! Engine configuration.
//!
//! One immutable [`EngineConfig`] is constructed at startup and passed by
//! reference into each component's constructor. There is no ambient global
//! state: two engines with different configurations can coexist in the same
//! process.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Immutable engine-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Annualized risk-free rate used for discounting (e.g., 0.05 = 5%).
    pub risk_free_rate: f64,
    /// Volatility assumed when no market or historical estimate is available.
    pub default_volatility: f64,
    /// Commission as a fraction of traded notional (e.g., 0.0003 = 3 bps).
    pub commission_rate: Decimal,
    /// Contract multiplier (1 for crypto-style contracts, 100 for US equity
    /// options).
    pub contract_multiplier: u32,
    /// Trading periods per year used to annualize daily statistics.
    pub periods_per_year: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.05,
            default_volatility: 0.30,
            commission_rate: Decimal::new(3, 4), // 0.0003
            contract_multiplier: 1,
            periods_per_year: 365,
        }
    }
}

impl EngineConfig {
    /// Commission charged on a trade of the given notional value.
    #[must_use]
    pub fn commission_for(&self, notional: Decimal) -> Decimal {
        (notional.abs() * self.commission_rate).round_dp(8)
    }
}

/// Portfolio risk limit thresholds checked by the risk calculator.
///
/// A metric above 80% of its limit raises an early warning; above 100% it is
/// a violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum absolute portfolio delta.
    pub max_delta: f64,
    /// Maximum absolute portfolio gamma.
    pub max_gamma: f64,
    /// Maximum absolute portfolio vega.
    pub max_vega: f64,
    /// Maximum negative theta (daily decay) tolerated, expressed as a
    /// positive magnitude.
    pub max_theta: f64,
    /// Maximum VaR as a fraction of portfolio value (e.g., 0.10 = 10%).
    pub max_var_pct: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_delta: 100.0,
            max_gamma: 50.0,
            max_vega: 10_000.0,
            max_theta: 5_000.0,
            max_var_pct: 0.10,
        }
    }
}
