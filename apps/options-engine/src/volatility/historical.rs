//! Realized-volatility statistics over price and volatility time series.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Annualized historical volatility over a trailing window.
///
/// Computes log returns, takes the sample standard deviation of the last
/// `window` returns, and annualizes by the square root of
/// `periods_per_year`.
///
/// # Errors
///
/// Returns [`EngineError::InsufficientData`] when the series is shorter than
/// `window + 1`, and [`EngineError::InvalidInput`] for a zero window or
/// non-positive prices.
pub fn historical_volatility(
    prices: &[f64],
    window: usize,
    periods_per_year: u32,
) -> Result<f64, EngineError> {
    if window == 0 {
        return Err(EngineError::invalid_input("window must be at least 1"));
    }
    if prices.len() < window + 1 {
        return Err(EngineError::InsufficientData {
            required: window + 1,
            actual: prices.len(),
        });
    }

    let returns = log_returns(&prices[prices.len() - window - 1..])?;
    let std_dev = sample_std(&returns);
    Ok(std_dev * f64::from(periods_per_year).sqrt())
}

/// Log returns of consecutive prices.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] when any price is non-positive.
pub fn log_returns(prices: &[f64]) -> Result<Vec<f64>, EngineError> {
    for &p in prices {
        EngineError::require_positive("price", p)?;
    }
    Ok(prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect())
}

/// Sample standard deviation (n-1 denominator).
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

// ============================================
// HV/IV sentiment
// ============================================

/// Descriptive market-sentiment label derived from the IV-HV spread.
///
/// A signal, not a decision rule: implied volatility trading rich to realized
/// says the market is paying up for protection, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolSentiment {
    /// IV far above HV: the market is paying heavily for protection.
    Fear,
    /// IV moderately above HV.
    Caution,
    /// IV and HV roughly in line.
    Neutral,
    /// IV moderately below HV.
    Calm,
    /// IV far below HV: optionality is being given away.
    Greed,
}

/// Classify sentiment from annualized HV and IV levels.
#[must_use]
pub fn compare_hv_iv(hv: f64, iv: f64) -> VolSentiment {
    let spread = iv - hv;
    if spread > 0.15 {
        VolSentiment::Fear
    } else if spread > 0.05 {
        VolSentiment::Caution
    } else if spread >= -0.05 {
        VolSentiment::Neutral
    } else if spread >= -0.15 {
        VolSentiment::Calm
    } else {
        VolSentiment::Greed
    }
}

// ============================================
// Anomaly detection
// ============================================

/// Direction of a volatility anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyDirection {
    /// Value far above the series mean.
    Spike,
    /// Value far below the series mean.
    Drop,
}

/// Severity bucket for a flagged point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalySeverity {
    /// |z| >= 3.5.
    High,
    /// 2.5 < |z| < 3.5.
    Medium,
}

/// One flagged point in a volatility series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolAnomaly {
    /// Index into the input series.
    pub index: usize,
    /// Observed value.
    pub value: f64,
    /// Z-score against the whole series.
    pub z_score: f64,
    /// Spike or drop.
    pub direction: AnomalyDirection,
    /// Severity bucket.
    pub severity: AnomalySeverity,
}

/// Z-score threshold above which a point is flagged.
const ANOMALY_Z: f64 = 2.5;
/// Z-score threshold for high severity.
const HIGH_SEVERITY_Z: f64 = 3.5;

/// Flag points whose z-score against the whole series exceeds 2.5 in
/// magnitude. Returns an empty list for series too short to have a
/// meaningful dispersion.
#[must_use]
pub fn detect_anomalies(vol_series: &[f64]) -> Vec<VolAnomaly> {
    if vol_series.len() < 3 {
        return Vec::new();
    }
    let n = vol_series.len() as f64;
    let mean = vol_series.iter().sum::<f64>() / n;
    let std = sample_std(vol_series);
    if std <= f64::EPSILON {
        return Vec::new();
    }

    vol_series
        .iter()
        .enumerate()
        .filter_map(|(index, &value)| {
            let z = (value - mean) / std;
            if z.abs() <= ANOMALY_Z {
                return None;
            }
            Some(VolAnomaly {
                index,
                value,
                z_score: z,
                direction: if z > 0.0 {
                    AnomalyDirection::Spike
                } else {
                    AnomalyDirection::Drop
                },
                severity: if z.abs() >= HIGH_SEVERITY_Z {
                    AnomalySeverity::High
                } else {
                    AnomalySeverity::Medium
                },
            })
        })
        .collect()
}

// ============================================
// Volatility cone
// ============================================

/// Percentile bands of trailing realized vol for one window size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConeBand {
    /// Trailing window length (periods).
    pub window: usize,
    /// 10th percentile of realized vol across the series.
    pub p10: f64,
    /// 25th percentile.
    pub p25: f64,
    /// Median.
    pub p50: f64,
    /// 75th percentile.
    pub p75: f64,
    /// 90th percentile.
    pub p90: f64,
    /// Most recent trailing-window realized vol.
    pub current: f64,
    /// Percentile rank of the current value within the distribution (0-100).
    pub current_rank: f64,
}

/// Build a volatility cone: for each window size, the 10/25/50/75/90th
/// percentiles of trailing-window realized vol across the whole price
/// series, plus the current value's rank.
///
/// # Errors
///
/// Returns [`EngineError::InsufficientData`] when the series cannot support
/// the largest requested window, and [`EngineError::InvalidInput`] when
/// `windows` is empty.
pub fn volatility_cone(
    prices: &[f64],
    windows: &[usize],
    periods_per_year: u32,
) -> Result<Vec<ConeBand>, EngineError> {
    if windows.is_empty() {
        return Err(EngineError::invalid_input("windows must not be empty"));
    }

    let mut bands = Vec::with_capacity(windows.len());
    for &window in windows {
        // Rolling realized vol for every end position that can fill the window.
        let mut vols = Vec::new();
        for end in (window + 1)..=prices.len() {
            vols.push(historical_volatility(
                &prices[..end],
                window,
                periods_per_year,
            )?);
        }
        if vols.is_empty() {
            return Err(EngineError::InsufficientData {
                required: window + 1,
                actual: prices.len(),
            });
        }

        let current = *vols.last().unwrap_or(&0.0);
        let below = vols.iter().filter(|&&v| v < current).count();
        let rank = 100.0 * below as f64 / vols.len() as f64;

        let mut sorted = vols;
        sorted.sort_by(|a, b| a.total_cmp(b));
        bands.push(ConeBand {
            window,
            p10: percentile(&sorted, 10.0),
            p25: percentile(&sorted, 25.0),
            p50: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            p90: percentile(&sorted, 90.0),
            current,
            current_rank: rank,
        });
    }
    Ok(bands)
}

/// Linear-interpolation percentile of a pre-sorted slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
