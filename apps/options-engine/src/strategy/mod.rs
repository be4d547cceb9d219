//! Multi-leg strategy construction and validation.
//!
//! [`StrategyBuilder`] assembles the supported strategy shapes (single leg,
//! straddle, strangle, iron condor, butterfly); [`validate`] checks the
//! structural invariants without mutating anything. A validated strategy is
//! immutable; derived variants are new values, never in-place edits.

mod builder;
mod payoff;
mod validation;

pub use builder::StrategyBuilder;
pub use payoff::PayoffProfile;
pub use validation::{ValidationReport, validate};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Greeks, OptionContract};

// ============================================
// Leg Types
// ============================================

/// Trade direction for a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Long position (bought).
    Buy,
    /// Short position (sold/written).
    Sell,
}

impl Action {
    /// Signed direction: +1 for buy, -1 for sell.
    #[must_use]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

/// One directional position in an option contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyLeg {
    /// The option contract this leg references.
    pub contract: OptionContract,
    /// Buy or sell.
    pub action: Action,
    /// Number of contracts. Invariant: at least 1.
    pub quantity: u32,
    /// Entry premium per contract, once priced.
    pub premium: Option<Decimal>,
}

impl StrategyLeg {
    /// Create an unpriced leg.
    #[must_use]
    pub const fn new(contract: OptionContract, action: Action, quantity: u32) -> Self {
        Self {
            contract,
            action,
            quantity,
            premium: None,
        }
    }

    /// Attach an entry premium.
    #[must_use]
    pub const fn with_premium(mut self, premium: Decimal) -> Self {
        self.premium = Some(premium);
        self
    }

    /// Signed quantity (positive long, negative short).
    #[must_use]
    pub fn signed_quantity(&self) -> i64 {
        self.action.sign() * i64::from(self.quantity)
    }

    /// Cash flow at entry: negative for debits (buys), positive for credits
    /// (sells). `None` until the leg is priced.
    #[must_use]
    pub fn entry_cash_flow(&self) -> Option<Decimal> {
        let premium = self.premium?;
        let notional =
            premium * Decimal::from(self.quantity) * Decimal::from(self.contract.multiplier);
        Some(match self.action {
            Action::Buy => -notional,
            Action::Sell => notional,
        })
    }
}

// ============================================
// Strategy Types
// ============================================

/// Supported strategy shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    /// One call or put.
    SingleLeg,
    /// Call + put at the same strike and expiry.
    Straddle,
    /// OTM put below an OTM call, same expiry.
    Strangle,
    /// Bull put spread below a bear call spread, four ascending strikes.
    IronCondor,
    /// Symmetric wings around a doubled center strike.
    Butterfly,
}

/// An ordered collection of legs plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Declared shape; validation checks legs against it.
    pub strategy_type: StrategyType,
    /// Ordered legs.
    pub legs: Vec<StrategyLeg>,
}

impl Strategy {
    /// Net entry cash flow across legs (credit positive, debit negative).
    /// `None` until every leg is priced.
    #[must_use]
    pub fn net_premium(&self) -> Option<Decimal> {
        self.legs
            .iter()
            .map(StrategyLeg::entry_cash_flow)
            .sum::<Option<Decimal>>()
    }

    /// Aggregate Greeks across legs, weighted by signed quantity and
    /// multiplier. `None` when no leg carries Greeks.
    #[must_use]
    pub fn aggregate_greeks(&self) -> Option<Greeks> {
        let mut total = Greeks::zero();
        let mut seen = false;
        for leg in &self.legs {
            if let Some(g) = leg.contract.greeks {
                seen = true;
                let weight =
                    leg.signed_quantity() as f64 * f64::from(leg.contract.multiplier);
                total = total.add(&g.scale(weight));
            }
        }
        seen.then_some(total)
    }

    /// A copy of this strategy with scaled leg quantities. The original is
    /// untouched.
    #[must_use]
    pub fn scaled(&self, factor: u32) -> Self {
        let mut copy = self.clone();
        for leg in &mut copy.legs {
            leg.quantity *= factor;
        }
        copy
    }
}
