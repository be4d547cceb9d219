//! Strategy builders.
//!
//! Each builder method assembles the legs for one strategy shape and returns
//! a populated [`Strategy`]. Builders check the arguments needed to construct
//! a coherent shape (ordering, positivity); full structural validation lives
//! in [`super::validate`].

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::models::{OptionContract, OptionKind, OptionStyle};

use super::{Action, Strategy, StrategyLeg, StrategyType};

/// Builds the supported multi-leg strategies on one underlying.
#[derive(Debug, Clone)]
pub struct StrategyBuilder {
    underlying: String,
    style: OptionStyle,
    multiplier: u32,
}

impl StrategyBuilder {
    /// Builder for European-style contracts with multiplier 1.
    #[must_use]
    pub fn new(underlying: impl Into<String>) -> Self {
        Self {
            underlying: underlying.into(),
            style: OptionStyle::European,
            multiplier: 1,
        }
    }

    /// Override the exercise style for built contracts.
    #[must_use]
    pub const fn with_style(mut self, style: OptionStyle) -> Self {
        self.style = style;
        self
    }

    /// Override the contract multiplier.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    fn contract(&self, kind: OptionKind, strike: Decimal, expiration: NaiveDate) -> OptionContract {
        OptionContract::new(
            self.underlying.clone(),
            kind,
            self.style,
            strike,
            expiration,
            self.multiplier,
        )
    }

    fn check_strike(strike: Decimal) -> Result<(), EngineError> {
        if strike <= Decimal::ZERO {
            return Err(EngineError::invalid_input(format!(
                "strike must be positive, got {strike}"
            )));
        }
        Ok(())
    }

    fn check_quantity(quantity: u32) -> Result<(), EngineError> {
        if quantity == 0 {
            return Err(EngineError::invalid_input("quantity must be at least 1"));
        }
        Ok(())
    }

    /// One call or put.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] on a non-positive strike or zero
    /// quantity.
    pub fn single_leg(
        &self,
        kind: OptionKind,
        action: Action,
        strike: Decimal,
        expiration: NaiveDate,
        quantity: u32,
    ) -> Result<Strategy, EngineError> {
        Self::check_strike(strike)?;
        Self::check_quantity(quantity)?;

        let verb = match action {
            Action::Buy => "Long",
            Action::Sell => "Short",
        };
        let noun = match kind {
            OptionKind::Call => "call",
            OptionKind::Put => "put",
        };
        Ok(Strategy {
            name: format!("{verb} {noun} {strike}"),
            description: format!("{verb} {quantity}x {strike} {noun} expiring {expiration}"),
            strategy_type: StrategyType::SingleLeg,
            legs: vec![StrategyLeg::new(
                self.contract(kind, strike, expiration),
                action,
                quantity,
            )],
        })
    }

    /// Straddle: call and put at the same strike and expiry, same direction.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] on a non-positive strike or zero
    /// quantity.
    pub fn straddle(
        &self,
        action: Action,
        strike: Decimal,
        expiration: NaiveDate,
        quantity: u32,
    ) -> Result<Strategy, EngineError> {
        Self::check_strike(strike)?;
        Self::check_quantity(quantity)?;

        Ok(Strategy {
            name: format!("Straddle {strike}"),
            description: format!("Call + put at {strike} expiring {expiration}"),
            strategy_type: StrategyType::Straddle,
            legs: vec![
                StrategyLeg::new(
                    self.contract(OptionKind::Call, strike, expiration),
                    action,
                    quantity,
                ),
                StrategyLeg::new(
                    self.contract(OptionKind::Put, strike, expiration),
                    action,
                    quantity,
                ),
            ],
        })
    }

    /// Strangle: put below a call, same expiry, same direction.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] when `put_strike >= call_strike`
    /// (strike ordering), on non-positive strikes, or zero quantity.
    pub fn strangle(
        &self,
        action: Action,
        put_strike: Decimal,
        call_strike: Decimal,
        expiration: NaiveDate,
        quantity: u32,
    ) -> Result<Strategy, EngineError> {
        Self::check_strike(put_strike)?;
        Self::check_strike(call_strike)?;
        Self::check_quantity(quantity)?;
        if put_strike >= call_strike {
            return Err(EngineError::invalid_input(format!(
                "strangle strike ordering violated: put strike {put_strike} must be below \
                 call strike {call_strike}"
            )));
        }

        Ok(Strategy {
            name: format!("Strangle {put_strike}/{call_strike}"),
            description: format!(
                "Put at {put_strike}, call at {call_strike}, expiring {expiration}"
            ),
            strategy_type: StrategyType::Strangle,
            legs: vec![
                StrategyLeg::new(
                    self.contract(OptionKind::Put, put_strike, expiration),
                    action,
                    quantity,
                ),
                StrategyLeg::new(
                    self.contract(OptionKind::Call, call_strike, expiration),
                    action,
                    quantity,
                ),
            ],
        })
    }

    /// Iron condor: long put / short put / short call / long call at four
    /// strictly ascending strikes, same expiry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] unless the four strikes are
    /// strictly ascending and positive, or on zero quantity.
    pub fn iron_condor(
        &self,
        strikes: [Decimal; 4],
        expiration: NaiveDate,
        quantity: u32,
    ) -> Result<Strategy, EngineError> {
        for strike in strikes {
            Self::check_strike(strike)?;
        }
        Self::check_quantity(quantity)?;
        if !strikes.windows(2).all(|w| w[0] < w[1]) {
            return Err(EngineError::invalid_input(format!(
                "iron condor strikes must be strictly ascending, got {strikes:?}"
            )));
        }

        let [low_put, short_put, short_call, high_call] = strikes;
        Ok(Strategy {
            name: format!("Iron condor {low_put}/{short_put}/{short_call}/{high_call}"),
            description: format!(
                "Bull put spread {low_put}/{short_put} + bear call spread \
                 {short_call}/{high_call}, expiring {expiration}"
            ),
            strategy_type: StrategyType::IronCondor,
            legs: vec![
                StrategyLeg::new(
                    self.contract(OptionKind::Put, low_put, expiration),
                    Action::Buy,
                    quantity,
                ),
                StrategyLeg::new(
                    self.contract(OptionKind::Put, short_put, expiration),
                    Action::Sell,
                    quantity,
                ),
                StrategyLeg::new(
                    self.contract(OptionKind::Call, short_call, expiration),
                    Action::Sell,
                    quantity,
                ),
                StrategyLeg::new(
                    self.contract(OptionKind::Call, high_call, expiration),
                    Action::Buy,
                    quantity,
                ),
            ],
        })
    }

    /// Butterfly: buy one wing at each side, sell two at the center, with
    /// symmetric wing widths. All legs share the same kind and expiry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] unless
    /// `lower < center < upper` with symmetric wings, or on zero quantity.
    pub fn butterfly(
        &self,
        kind: OptionKind,
        lower: Decimal,
        center: Decimal,
        upper: Decimal,
        expiration: NaiveDate,
        quantity: u32,
    ) -> Result<Strategy, EngineError> {
        Self::check_strike(lower)?;
        Self::check_strike(center)?;
        Self::check_strike(upper)?;
        Self::check_quantity(quantity)?;
        if !(lower < center && center < upper) {
            return Err(EngineError::invalid_input(format!(
                "butterfly strikes must satisfy lower < center < upper, \
                 got {lower}/{center}/{upper}"
            )));
        }
        if center - lower != upper - center {
            return Err(EngineError::invalid_input(format!(
                "butterfly wings must be symmetric around the center: \
                 {center} - {lower} != {upper} - {center}"
            )));
        }

        Ok(Strategy {
            name: format!("Butterfly {lower}/{center}/{upper}"),
            description: format!(
                "Long wings at {lower} and {upper}, short 2x center at {center}, \
                 expiring {expiration}"
            ),
            strategy_type: StrategyType::Butterfly,
            legs: vec![
                StrategyLeg::new(self.contract(kind, lower, expiration), Action::Buy, quantity),
                StrategyLeg::new(
                    self.contract(kind, center, expiration),
                    Action::Sell,
                    quantity * 2,
                ),
                StrategyLeg::new(self.contract(kind, upper, expiration), Action::Buy, quantity),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 26).unwrap()
    }

    #[test]
    fn test_single_leg() {
        let strategy = StrategyBuilder::new("BTC")
            .single_leg(OptionKind::Call, Action::Buy, dec!(50000), expiry(), 1)
            .unwrap();
        assert_eq!(strategy.strategy_type, StrategyType::SingleLeg);
        assert_eq!(strategy.legs.len(), 1);
        assert_eq!(strategy.legs[0].contract.kind, OptionKind::Call);
    }

    #[test]
    fn test_straddle_shares_strike() {
        let strategy = StrategyBuilder::new("BTC")
            .straddle(Action::Buy, dec!(50000), expiry(), 2)
            .unwrap();
        assert_eq!(strategy.legs.len(), 2);
        assert_eq!(strategy.legs[0].contract.strike, strategy.legs[1].contract.strike);
        assert_ne!(strategy.legs[0].contract.kind, strategy.legs[1].contract.kind);
    }

    #[test]
    fn test_strangle_rejects_wrong_order() {
        let result = StrategyBuilder::new("BTC").strangle(
            Action::Sell,
            dec!(52000),
            dec!(50000),
            expiry(),
            1,
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("strike ordering"));
    }

    #[test]
    fn test_iron_condor_leg_layout() {
        let strategy = StrategyBuilder::new("BTC")
            .iron_condor(
                [dec!(40000), dec!(45000), dec!(55000), dec!(60000)],
                expiry(),
                1,
            )
            .unwrap();
        assert_eq!(strategy.legs.len(), 4);
        let actions: Vec<Action> = strategy.legs.iter().map(|l| l.action).collect();
        assert_eq!(actions, vec![Action::Buy, Action::Sell, Action::Sell, Action::Buy]);
        let kinds: Vec<OptionKind> = strategy.legs.iter().map(|l| l.contract.kind).collect();
        assert_eq!(
            kinds,
            vec![OptionKind::Put, OptionKind::Put, OptionKind::Call, OptionKind::Call]
        );
    }

    #[test]
    fn test_iron_condor_rejects_unsorted_strikes() {
        let result = StrategyBuilder::new("BTC").iron_condor(
            [dec!(45000), dec!(40000), dec!(55000), dec!(60000)],
            expiry(),
            1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_butterfly_center_is_doubled() {
        let strategy = StrategyBuilder::new("BTC")
            .butterfly(
                OptionKind::Call,
                dec!(45000),
                dec!(50000),
                dec!(55000),
                expiry(),
                1,
            )
            .unwrap();
        assert_eq!(strategy.legs.len(), 3);
        assert_eq!(strategy.legs[1].quantity, 2);
        assert_eq!(strategy.legs[1].action, Action::Sell);
    }

    #[test]
    fn test_butterfly_rejects_asymmetric_wings() {
        let result = StrategyBuilder::new("BTC").butterfly(
            OptionKind::Call,
            dec!(45000),
            dec!(50000),
            dec!(56000),
            expiry(),
            1,
        );
        assert!(result.unwrap_err().to_string().contains("symmetric"));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = StrategyBuilder::new("BTC").straddle(Action::Buy, dec!(50000), expiry(), 0);
        assert!(result.is_err());
    }
}
