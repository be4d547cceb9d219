//! Risk limit checks with an early-warning band.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::RiskLimits;
use crate::models::Greeks;

/// Utilization fraction at which a metric starts warning.
const WARNING_BAND: f64 = 0.80;

/// How badly a limit is breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitSeverity {
    /// Metric is at or above 80% of its limit.
    Warning,
    /// Metric is at or above 100% of its limit.
    Violation,
}

/// One metric in breach of its configured limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitBreach {
    /// Metric name (`delta`, `gamma`, `vega`, `theta`, `var_pct`).
    pub metric: String,
    /// Current absolute value of the metric.
    pub value: f64,
    /// Configured limit.
    pub limit: f64,
    /// Fraction of the limit consumed.
    pub utilization: f64,
    /// Warning or violation.
    pub severity: LimitSeverity,
}

/// Compare portfolio Greeks and VaR against configured limits.
///
/// Metrics at or above 80% of a limit produce a warning; at or above 100%,
/// a violation. Metrics below the band are omitted from the result.
#[must_use]
pub fn check_limits(greeks: &Greeks, var_pct: f64, limits: &RiskLimits) -> Vec<LimitBreach> {
    let checks = [
        ("delta", greeks.delta.abs(), limits.max_delta),
        ("gamma", greeks.gamma.abs(), limits.max_gamma),
        ("vega", greeks.vega.abs(), limits.max_vega),
        // Theta limit bounds decay magnitude; positive theta is never a
        // breach.
        ("theta", (-greeks.theta).max(0.0), limits.max_theta),
        ("var_pct", var_pct.abs(), limits.max_var_pct),
    ];

    let mut breaches = Vec::new();
    for (metric, value, limit) in checks {
        if limit <= 0.0 {
            continue;
        }
        let utilization = value / limit;
        let severity = if utilization >= 1.0 {
            LimitSeverity::Violation
        } else if utilization >= WARNING_BAND {
            LimitSeverity::Warning
        } else {
            continue;
        };
        if severity == LimitSeverity::Violation {
            warn!(metric, value, limit, "Risk limit violated");
        }
        breaches.push(LimitBreach {
            metric: metric.to_string(),
            value,
            limit,
            utilization,
            severity,
        });
    }
    breaches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_limits_is_clean() {
        let greeks = Greeks::new(10.0, 1.0, -100.0, 500.0, 0.0);
        let breaches = check_limits(&greeks, 0.02, &RiskLimits::default());
        assert!(breaches.is_empty());
    }

    #[test]
    fn test_warning_band_at_80_pct() {
        let limits = RiskLimits::default(); // max_delta = 100
        let greeks = Greeks::new(85.0, 0.0, 0.0, 0.0, 0.0);
        let breaches = check_limits(&greeks, 0.0, &limits);
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].metric, "delta");
        assert_eq!(breaches[0].severity, LimitSeverity::Warning);
        assert!((breaches[0].utilization - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_violation_at_limit() {
        let limits = RiskLimits::default();
        let greeks = Greeks::new(-120.0, 0.0, 0.0, 0.0, 0.0);
        let breaches = check_limits(&greeks, 0.0, &limits);
        assert_eq!(breaches[0].severity, LimitSeverity::Violation);
    }

    #[test]
    fn test_positive_theta_never_breaches() {
        let limits = RiskLimits::default(); // max_theta = 5000
        let greeks = Greeks::new(0.0, 0.0, 10_000.0, 0.0, 0.0);
        assert!(check_limits(&greeks, 0.0, &limits).is_empty());
    }

    #[test]
    fn test_var_pct_checked() {
        let limits = RiskLimits::default(); // max_var_pct = 0.10
        let breaches = check_limits(&Greeks::zero(), 0.12, &limits);
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].metric, "var_pct");
        assert_eq!(breaches[0].severity, LimitSeverity::Violation);
    }
}
