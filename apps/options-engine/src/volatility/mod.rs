//! Volatility analytics: realized statistics, forecasting, and surfaces.
//!
//! - Historical volatility, anomaly detection, volatility cones, HV/IV
//!   sentiment
//! - GARCH(1,1) variance forecasting
//! - Implied volatility surface construction, term structure, smile

mod garch;
mod historical;
mod surface;

pub use garch::{GarchForecast, GarchParams, garch_forecast};
pub use historical::{
    AnomalyDirection, AnomalySeverity, ConeBand, VolAnomaly, VolSentiment, compare_hv_iv,
    detect_anomalies, historical_volatility, log_returns, volatility_cone,
};
pub use surface::{VolatilitySurface, build_surface, smile, term_structure};
