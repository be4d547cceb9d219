//! Implied volatility surface, term structure, and smile.
//!
//! The surface is a (moneyness x time-to-expiry) grid interpolated from
//! scattered option quotes with inverse-distance weighting; cells with no
//! nearby sample fall back to the nearest neighbor, so the finished surface
//! never contains NaN. A rebuild produces a new surface — consumers never
//! mutate cells in place.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::models::OptionQuote;

/// Number of moneyness grid points.
const MONEYNESS_POINTS: usize = 11;
/// IDW neighborhood radius in normalized grid units.
const IDW_RADIUS: f64 = 0.35;

/// Read-only implied volatility surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilitySurface {
    /// Moneyness axis (strike / spot), ascending.
    pub moneyness: Vec<f64>,
    /// Time-to-expiry axis in years, ascending.
    pub expiries: Vec<f64>,
    /// IV grid indexed `[expiry][moneyness]`; no NaN cells.
    pub grid: Vec<Vec<f64>>,
    /// Spot used for moneyness normalization.
    pub spot: f64,
}

impl VolatilitySurface {
    /// Interpolated IV at an arbitrary (moneyness, time-to-expiry) point.
    ///
    /// Bilinear inside the grid, clamped at the edges.
    #[must_use]
    pub fn iv_at(&self, moneyness: f64, time_to_expiry: f64) -> f64 {
        let (i0, i1, tx) = bracket(&self.expiries, time_to_expiry);
        let (j0, j1, ty) = bracket(&self.moneyness, moneyness);

        let v00 = self.grid[i0][j0];
        let v01 = self.grid[i0][j1];
        let v10 = self.grid[i1][j0];
        let v11 = self.grid[i1][j1];

        let low = v00 + (v01 - v00) * ty;
        let high = v10 + (v11 - v10) * ty;
        low + (high - low) * tx
    }
}

/// Locate `value` on an ascending axis: indices of the bracketing points and
/// the interpolation fraction, clamped to the axis range.
fn bracket(axis: &[f64], value: f64) -> (usize, usize, f64) {
    if axis.len() == 1 || value <= axis[0] {
        return (0, 0, 0.0);
    }
    let last = axis.len() - 1;
    if value >= axis[last] {
        return (last, last, 0.0);
    }
    let hi = axis.partition_point(|&a| a < value).max(1);
    let lo = hi - 1;
    let frac = (value - axis[lo]) / (axis[hi] - axis[lo]);
    (lo, hi, frac)
}

/// Build a volatility surface from an option chain.
///
/// # Errors
///
/// Returns [`EngineError::InsufficientData`] for an empty chain and
/// [`EngineError::InvalidInput`] for a non-positive spot or quotes that have
/// already expired as of `asof`.
pub fn build_surface(
    chain: &[OptionQuote],
    spot: f64,
    asof: NaiveDate,
) -> Result<VolatilitySurface, EngineError> {
    EngineError::require_positive("spot", spot)?;
    if chain.is_empty() {
        return Err(EngineError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    // Scattered samples: (moneyness, tte, iv).
    let mut samples = Vec::with_capacity(chain.len());
    for quote in chain {
        let tte = years_between(asof, quote.expiration)?;
        samples.push((quote.strike / spot, tte, quote.implied_volatility));
    }

    let mut expiries: Vec<f64> = samples.iter().map(|s| s.1).collect();
    expiries.sort_by(|a, b| a.total_cmp(b));
    expiries.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    let m_min = samples.iter().map(|s| s.0).fold(f64::INFINITY, f64::min);
    let m_max = samples
        .iter()
        .map(|s| s.0)
        .fold(f64::NEG_INFINITY, f64::max);
    let moneyness: Vec<f64> = if (m_max - m_min).abs() < 1e-9 {
        vec![m_min]
    } else {
        (0..MONEYNESS_POINTS)
            .map(|i| m_min + (m_max - m_min) * i as f64 / (MONEYNESS_POINTS - 1) as f64)
            .collect()
    };

    // Normalization scales so distances in moneyness and time are comparable.
    let m_span = (m_max - m_min).max(1e-6);
    let t_span = (expiries.last().unwrap_or(&1.0) - expiries.first().unwrap_or(&0.0)).max(1e-6);

    let grid = expiries
        .iter()
        .map(|&t| {
            moneyness
                .iter()
                .map(|&m| interpolate_cell(&samples, m, t, m_span, t_span))
                .collect()
        })
        .collect();

    debug!(
        quotes = chain.len(),
        expiries = expiries.len(),
        moneyness_points = moneyness.len(),
        "Volatility surface rebuilt"
    );

    Ok(VolatilitySurface {
        moneyness,
        expiries,
        grid,
        spot,
    })
}

/// Inverse-distance-weighted IV at a grid cell, nearest neighbor as the
/// fallback for cells with no sample inside the radius.
fn interpolate_cell(
    samples: &[(f64, f64, f64)],
    m: f64,
    t: f64,
    m_span: f64,
    t_span: f64,
) -> f64 {
    let mut weight_sum = 0.0;
    let mut value_sum = 0.0;
    let mut nearest = (f64::INFINITY, 0.0);

    for &(sm, st, iv) in samples {
        let dm = (sm - m) / m_span;
        let dt = (st - t) / t_span;
        let dist_sq = dm * dm + dt * dt;
        if dist_sq < 1e-12 {
            return iv; // Exact hit
        }
        let dist = dist_sq.sqrt();
        if dist < nearest.0 {
            nearest = (dist, iv);
        }
        if dist <= IDW_RADIUS {
            let w = 1.0 / dist_sq;
            weight_sum += w;
            value_sum += w * iv;
        }
    }

    if weight_sum > 0.0 {
        value_sum / weight_sum
    } else {
        nearest.1
    }
}

/// ATM implied volatility per expiry, ascending by expiry.
///
/// For each expiration the quote whose strike is closest to spot is taken as
/// at-the-money.
///
/// # Errors
///
/// Returns [`EngineError::InsufficientData`] for an empty chain and
/// [`EngineError::InvalidInput`] for a non-positive spot.
pub fn term_structure(
    chain: &[OptionQuote],
    spot: f64,
) -> Result<Vec<(NaiveDate, f64)>, EngineError> {
    EngineError::require_positive("spot", spot)?;
    if chain.is_empty() {
        return Err(EngineError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    let mut expiries: Vec<NaiveDate> = chain.iter().map(|q| q.expiration).collect();
    expiries.sort_unstable();
    expiries.dedup();

    let mut points = Vec::with_capacity(expiries.len());
    for expiry in expiries {
        let atm = chain
            .iter()
            .filter(|q| q.expiration == expiry)
            .min_by(|a, b| {
                (a.strike - spot)
                    .abs()
                    .total_cmp(&(b.strike - spot).abs())
            });
        if let Some(quote) = atm {
            points.push((expiry, quote.implied_volatility));
        }
    }
    Ok(points)
}

/// Volatility smile for one expiry: (moneyness, iv) pairs ascending by
/// moneyness.
///
/// # Errors
///
/// Returns [`EngineError::InsufficientData`] when no quote matches the
/// expiry and [`EngineError::InvalidInput`] for a non-positive spot.
pub fn smile(
    chain: &[OptionQuote],
    expiry: NaiveDate,
    spot: f64,
) -> Result<Vec<(f64, f64)>, EngineError> {
    EngineError::require_positive("spot", spot)?;
    let mut points: Vec<(f64, f64)> = chain
        .iter()
        .filter(|q| q.expiration == expiry)
        .map(|q| (q.strike / spot, q.implied_volatility))
        .collect();
    if points.is_empty() {
        return Err(EngineError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(points)
}

/// Year fraction between two dates; expired quotes are invalid input.
fn years_between(asof: NaiveDate, expiry: NaiveDate) -> Result<f64, EngineError> {
    let days = (expiry - asof).num_days();
    if days <= 0 {
        return Err(EngineError::invalid_input(format!(
            "quote expiring {expiry} is not after the valuation date {asof}"
        )));
    }
    Ok(days as f64 / 365.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OptionKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quote(strike: f64, expiration: NaiveDate, iv: f64) -> OptionQuote {
        OptionQuote {
            kind: OptionKind::Call,
            strike,
            expiration,
            implied_volatility: iv,
        }
    }

    fn sample_chain() -> Vec<OptionQuote> {
        let near = date(2026, 3, 27);
        let far = date(2026, 6, 26);
        vec![
            quote(45000.0, near, 0.72),
            quote(50000.0, near, 0.65),
            quote(55000.0, near, 0.70),
            quote(45000.0, far, 0.68),
            quote(50000.0, far, 0.62),
            quote(55000.0, far, 0.66),
        ]
    }

    #[test]
    fn test_surface_has_no_nan_cells() {
        let surface = build_surface(&sample_chain(), 50000.0, date(2026, 1, 2)).unwrap();
        for row in &surface.grid {
            for &cell in row {
                assert!(cell.is_finite());
                assert!(cell > 0.0);
            }
        }
        assert_eq!(surface.expiries.len(), 2);
        assert_eq!(surface.grid.len(), 2);
    }

    #[test]
    fn test_surface_lookup_near_sample() {
        let surface = build_surface(&sample_chain(), 50000.0, date(2026, 1, 2)).unwrap();
        // ATM short-dated cell should sit near the 0.65 quote.
        let near_tte = (date(2026, 3, 27) - date(2026, 1, 2)).num_days() as f64 / 365.0;
        let iv = surface.iv_at(1.0, near_tte);
        assert!((iv - 0.65).abs() < 0.05);
    }

    #[test]
    fn test_surface_clamps_outside_grid() {
        let surface = build_surface(&sample_chain(), 50000.0, date(2026, 1, 2)).unwrap();
        let iv = surface.iv_at(10.0, 50.0);
        assert!(iv.is_finite());
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(build_surface(&[], 50000.0, date(2026, 1, 2)).is_err());
    }

    #[test]
    fn test_expired_quote_rejected() {
        let chain = vec![quote(50000.0, date(2026, 1, 1), 0.6)];
        assert!(build_surface(&chain, 50000.0, date(2026, 1, 2)).is_err());
    }

    #[test]
    fn test_term_structure_ordering_and_atm_selection() {
        let ts = term_structure(&sample_chain(), 50000.0).unwrap();
        assert_eq!(ts.len(), 2);
        assert!(ts[0].0 < ts[1].0);
        // ATM strike is 50000 at both expiries.
        assert!((ts[0].1 - 0.65).abs() < 1e-12);
        assert!((ts[1].1 - 0.62).abs() < 1e-12);
    }

    #[test]
    fn test_smile_sorted_by_moneyness() {
        let points = smile(&sample_chain(), date(2026, 3, 27), 50000.0).unwrap();
        assert_eq!(points.len(), 3);
        assert!(points.windows(2).all(|w| w[0].0 < w[1].0));
        // Smile shape: wings above the ATM point.
        assert!(points[0].1 > points[1].1);
        assert!(points[2].1 > points[1].1);
    }

    #[test]
    fn test_smile_unknown_expiry() {
        assert!(smile(&sample_chain(), date(2027, 1, 1), 50000.0).is_err());
    }
}
