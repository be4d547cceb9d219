//! Core data model shared by every engine component.
//!
//! The types here are plain data: no I/O, no framework types, serde-derived
//! so the excluded persistence and API layers can round-trip them without the
//! engine knowing about any schema.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================
// Option Contract Types
// ============================================

/// Option kind (call or put).
///
/// A closed enum everywhere: free-form strings never reach pricing math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionKind {
    /// Call option (right to buy).
    Call,
    /// Put option (right to sell).
    Put,
}

impl OptionKind {
    /// Intrinsic value at the given spot and strike.
    #[must_use]
    pub fn intrinsic(self, spot: f64, strike: f64) -> f64 {
        match self {
            Self::Call => (spot - strike).max(0.0),
            Self::Put => (strike - spot).max(0.0),
        }
    }
}

/// Option style (American or European).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionStyle {
    /// American - can be exercised any time before expiration.
    American,
    /// European - can only be exercised at expiration.
    European,
}

/// Greeks for an option or an aggregated portfolio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// Rate of change of option price with respect to spot.
    /// Range -1.0..=1.0 for individual options.
    pub delta: f64,
    /// Rate of change of delta with respect to spot.
    pub gamma: f64,
    /// Rate of change of option price with respect to time (per year;
    /// typically negative for long options).
    pub theta: f64,
    /// Sensitivity to a 1.0 (100-point) change in volatility.
    pub vega: f64,
    /// Sensitivity to a 1.0 change in the risk-free rate.
    pub rho: f64,
}

impl Greeks {
    /// Create Greeks from the five first-order sensitivities.
    #[must_use]
    pub const fn new(delta: f64, gamma: f64, theta: f64, vega: f64, rho: f64) -> Self {
        Self {
            delta,
            gamma,
            theta,
            vega,
            rho,
        }
    }

    /// All-zero Greeks.
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, 0.0)
    }

    /// Scale by a signed quantity (positive for long, negative for short).
    #[must_use]
    pub fn scale(&self, quantity: f64) -> Self {
        Self {
            delta: self.delta * quantity,
            gamma: self.gamma * quantity,
            theta: self.theta * quantity,
            vega: self.vega * quantity,
            rho: self.rho * quantity,
        }
    }

    /// Component-wise sum with another Greeks.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self {
            delta: self.delta + other.delta,
            gamma: self.gamma + other.gamma,
            theta: self.theta + other.theta,
            vega: self.vega + other.vega,
            rho: self.rho + other.rho,
        }
    }
}

/// A tradable option contract.
///
/// Identity (instrument + strike + expiration + kind) is immutable; the
/// market fields (`mark_price`, `bid`, `ask`, `implied_volatility`, `greeks`)
/// are refreshed every simulation tick and are `None` when no quote exists.
/// Missing market data is always `None`, never zero-as-sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    /// Unique instrument identifier (e.g., `"BTC-50000-C-20260626"`).
    pub instrument_id: String,
    /// Underlying symbol.
    pub underlying: String,
    /// Option kind (call/put).
    pub kind: OptionKind,
    /// Option style (American/European).
    pub style: OptionStyle,
    /// Strike price. Invariant: strictly positive.
    pub strike: Decimal,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Contract multiplier (typically 1 for crypto, 100 for equities).
    pub multiplier: u32,
    /// Current mark price, if quoted.
    pub mark_price: Option<Decimal>,
    /// Best bid, if quoted.
    pub bid: Option<Decimal>,
    /// Best ask, if quoted.
    pub ask: Option<Decimal>,
    /// Implied volatility, if derivable from the mark.
    pub implied_volatility: Option<f64>,
    /// Greeks snapshot; only meaningful when mark price and IV are populated.
    pub greeks: Option<Greeks>,
}

impl OptionContract {
    /// Create a contract with no market data attached.
    #[must_use]
    pub fn new(
        underlying: impl Into<String>,
        kind: OptionKind,
        style: OptionStyle,
        strike: Decimal,
        expiration: NaiveDate,
        multiplier: u32,
    ) -> Self {
        let underlying = underlying.into();
        let kind_tag = match kind {
            OptionKind::Call => 'C',
            OptionKind::Put => 'P',
        };
        let instrument_id = format!(
            "{}-{}-{}-{}",
            underlying,
            strike.normalize(),
            kind_tag,
            expiration.format("%Y%m%d")
        );
        Self {
            instrument_id,
            underlying,
            kind,
            style,
            strike,
            expiration,
            multiplier,
            mark_price: None,
            bid: None,
            ask: None,
            implied_volatility: None,
            greeks: None,
        }
    }

    /// Time to expiry in years from `asof`, clamped at zero.
    #[must_use]
    pub fn time_to_expiry(&self, asof: NaiveDate) -> f64 {
        let days = (self.expiration - asof).num_days();
        (days.max(0) as f64) / 365.0
    }

    /// Whether the contract has expired as of the given date.
    #[must_use]
    pub fn is_expired(&self, asof: NaiveDate) -> bool {
        asof >= self.expiration
    }
}

// ============================================
// Market Data
// ============================================

/// One bar of historical market data handed in by an external provider.
///
/// Optional fields are absent when the source does not carry them; the engine
/// falls back to model prices in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    /// Bar date.
    pub date: NaiveDate,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
    /// Traded volume.
    pub volume: Decimal,
    /// Best bid at the close, if recorded.
    pub bid: Option<Decimal>,
    /// Best ask at the close, if recorded.
    pub ask: Option<Decimal>,
    /// Implied volatility at the close, if recorded.
    pub implied_volatility: Option<f64>,
}

impl Bar {
    /// Bar with only OHLCV populated.
    #[must_use]
    pub const fn ohlcv(
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            bid: None,
            ask: None,
            implied_volatility: None,
        }
    }
}

/// A quoted option used as input to surface construction and chain analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Option kind.
    pub kind: OptionKind,
    /// Strike price.
    pub strike: f64,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Observed implied volatility.
    pub implied_volatility: f64,
}
