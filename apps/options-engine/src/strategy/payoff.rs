//! Expiration payoff analysis.
//!
//! Expiration P&L of a strategy is piecewise linear in the settlement price,
//! with kinks only at leg strikes. The extremes therefore sit at a strike, at
//! zero, or along the unbounded ray above the highest strike, and breakevens
//! fall out of linear interpolation between adjacent kinks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::OptionKind;

use super::Strategy;

/// Expiration payoff summary for a fully priced strategy.
///
/// All amounts are per the strategy's leg quantities and multipliers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoffProfile {
    /// Net entry cash flow (credit positive, debit negative).
    pub net_premium: Decimal,
    /// Best possible P&L at expiration; `None` when unbounded.
    pub max_profit: Option<Decimal>,
    /// Worst possible loss at expiration as a positive magnitude; `None`
    /// when unbounded (naked short calls).
    pub max_loss: Option<Decimal>,
    /// Settlement prices where expiration P&L crosses zero, ascending.
    pub breakevens: Vec<Decimal>,
}

impl Strategy {
    /// Expiration payoff profile. `None` until every leg carries an entry
    /// premium, since P&L is meaningless without the entry cash flows.
    #[must_use]
    pub fn payoff_profile(&self) -> Option<PayoffProfile> {
        let net_premium = self.net_premium()?;
        if self.legs.is_empty() {
            return None;
        }

        let mut strikes: Vec<Decimal> = self.legs.iter().map(|l| l.contract.strike).collect();
        strikes.sort_unstable();
        strikes.dedup();

        // Above the highest strike every put is worthless, so the slope of
        // the P&L ray is the net signed call size.
        let right_slope: Decimal = self
            .legs
            .iter()
            .filter(|l| l.contract.kind == OptionKind::Call)
            .map(|l| Decimal::from(l.signed_quantity()) * Decimal::from(l.contract.multiplier))
            .sum();

        let mut points: Vec<(Decimal, Decimal)> = Vec::with_capacity(strikes.len() + 1);
        points.push((Decimal::ZERO, self.expiration_pnl(net_premium, Decimal::ZERO)));
        for &strike in &strikes {
            points.push((strike, self.expiration_pnl(net_premium, strike)));
        }

        let best = points.iter().map(|p| p.1).max().unwrap_or(net_premium);
        let worst = points.iter().map(|p| p.1).min().unwrap_or(net_premium);

        let max_profit = if right_slope > Decimal::ZERO {
            None
        } else {
            Some(best)
        };
        let max_loss = if right_slope < Decimal::ZERO {
            None
        } else {
            Some((-worst).max(Decimal::ZERO))
        };

        let mut breakevens = Vec::new();
        for &(x, p) in &points {
            if p == Decimal::ZERO {
                breakevens.push(x);
            }
        }
        for pair in points.windows(2) {
            let (x1, p1) = pair[0];
            let (x2, p2) = pair[1];
            if p1 * p2 < Decimal::ZERO {
                breakevens.push(x1 + (x2 - x1) * -p1 / (p2 - p1));
            }
        }
        if let Some(&(last_x, last_p)) = points.last() {
            if right_slope != Decimal::ZERO && last_p * right_slope < Decimal::ZERO {
                breakevens.push(last_x - last_p / right_slope);
            }
        }
        breakevens.sort_unstable();
        breakevens.dedup();

        Some(PayoffProfile {
            net_premium,
            max_profit,
            max_loss,
            breakevens,
        })
    }

    /// P&L at expiration for a given settlement price: net entry premium
    /// plus every leg's signed intrinsic value.
    fn expiration_pnl(&self, net_premium: Decimal, spot: Decimal) -> Decimal {
        let mut total = net_premium;
        for leg in &self.legs {
            let intrinsic = match leg.contract.kind {
                OptionKind::Call => (spot - leg.contract.strike).max(Decimal::ZERO),
                OptionKind::Put => (leg.contract.strike - spot).max(Decimal::ZERO),
            };
            let size =
                Decimal::from(leg.signed_quantity()) * Decimal::from(leg.contract.multiplier);
            total += intrinsic * size;
        }
        total
    }
}
