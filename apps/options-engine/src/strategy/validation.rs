//! Read-only structural validation of strategies.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::OptionKind;

use super::{Action, Strategy, StrategyType};

/// Days to expiry under which a warning is attached.
const NEAR_EXPIRY_DAYS: i64 = 7;

/// Result of strategy validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether validation passed (no errors; warnings are allowed).
    pub is_valid: bool,
    /// Hard violations.
    pub errors: Vec<String>,
    /// Advisory findings that do not block use.
    pub warnings: Vec<String>,
}

/// Validate a strategy against its declared type as of the given date.
///
/// Pure inspection: the strategy is never mutated.
#[must_use]
pub fn validate(strategy: &Strategy, asof: NaiveDate) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if strategy.legs.is_empty() {
        errors.push("strategy has no legs".to_string());
        return ValidationReport {
            is_valid: false,
            errors,
            warnings,
        };
    }

    for (i, leg) in strategy.legs.iter().enumerate() {
        if leg.quantity == 0 {
            errors.push(format!("leg {i}: quantity must be at least 1"));
        }
        if leg.contract.strike <= Decimal::ZERO {
            errors.push(format!(
                "leg {i}: strike must be positive, got {}",
                leg.contract.strike
            ));
        }
        if leg.contract.is_expired(asof) {
            errors.push(format!(
                "leg {i}: contract {} expired on {}",
                leg.contract.instrument_id, leg.contract.expiration
            ));
        } else {
            let days_left = (leg.contract.expiration - asof).num_days();
            if days_left <= NEAR_EXPIRY_DAYS {
                warnings.push(format!(
                    "leg {i}: contract {} expires in {days_left} day(s)",
                    leg.contract.instrument_id
                ));
            }
        }
    }

    match strategy.strategy_type {
        StrategyType::SingleLeg => check_single_leg(strategy, &mut errors),
        StrategyType::Straddle => check_straddle(strategy, &mut errors),
        StrategyType::Strangle => check_strangle(strategy, &mut errors),
        StrategyType::IronCondor => check_iron_condor(strategy, &mut errors),
        StrategyType::Butterfly => check_butterfly(strategy, &mut errors),
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn same_expiry(strategy: &Strategy) -> bool {
    strategy
        .legs
        .windows(2)
        .all(|w| w[0].contract.expiration == w[1].contract.expiration)
}

fn check_single_leg(strategy: &Strategy, errors: &mut Vec<String>) {
    if strategy.legs.len() != 1 {
        errors.push(format!(
            "single-leg strategy must have exactly 1 leg, got {}",
            strategy.legs.len()
        ));
    }
}

fn check_straddle(strategy: &Strategy, errors: &mut Vec<String>) {
    if strategy.legs.len() != 2 {
        errors.push(format!(
            "straddle must have exactly 2 legs, got {}",
            strategy.legs.len()
        ));
        return;
    }
    let (a, b) = (&strategy.legs[0], &strategy.legs[1]);
    if a.contract.kind == b.contract.kind {
        errors.push("straddle requires one call and one put".to_string());
    }
    if a.contract.strike != b.contract.strike {
        errors.push(format!(
            "straddle legs must share a strike, got {} and {}",
            a.contract.strike, b.contract.strike
        ));
    }
    if !same_expiry(strategy) {
        errors.push("straddle legs must share an expiration".to_string());
    }
    if a.action != b.action {
        errors.push("straddle legs must share a direction".to_string());
    }
}

fn check_strangle(strategy: &Strategy, errors: &mut Vec<String>) {
    if strategy.legs.len() != 2 {
        errors.push(format!(
            "strangle must have exactly 2 legs, got {}",
            strategy.legs.len()
        ));
        return;
    }
    let put = strategy
        .legs
        .iter()
        .find(|l| l.contract.kind == OptionKind::Put);
    let call = strategy
        .legs
        .iter()
        .find(|l| l.contract.kind == OptionKind::Call);
    match (put, call) {
        (Some(put), Some(call)) => {
            if put.contract.strike >= call.contract.strike {
                errors.push(format!(
                    "strangle strike ordering violated: put strike {} must be below \
                     call strike {}",
                    put.contract.strike, call.contract.strike
                ));
            }
        }
        _ => errors.push("strangle requires one put and one call".to_string()),
    }
    if !same_expiry(strategy) {
        errors.push("strangle legs must share an expiration".to_string());
    }
}

fn check_iron_condor(strategy: &Strategy, errors: &mut Vec<String>) {
    if strategy.legs.len() != 4 {
        errors.push(format!(
            "iron condor must have exactly 4 legs, got {}",
            strategy.legs.len()
        ));
        return;
    }
    let strikes: Vec<Decimal> = strategy.legs.iter().map(|l| l.contract.strike).collect();
    if !strikes.windows(2).all(|w| w[0] < w[1]) {
        errors.push(format!(
            "iron condor strikes must be strictly ascending, got {strikes:?}"
        ));
    }
    let kinds: Vec<OptionKind> = strategy.legs.iter().map(|l| l.contract.kind).collect();
    if kinds
        != vec![
            OptionKind::Put,
            OptionKind::Put,
            OptionKind::Call,
            OptionKind::Call,
        ]
    {
        errors.push("iron condor must be put/put/call/call from low to high strike".to_string());
    }
    let actions: Vec<Action> = strategy.legs.iter().map(|l| l.action).collect();
    if actions != vec![Action::Buy, Action::Sell, Action::Sell, Action::Buy] {
        errors.push("iron condor must buy the wings and sell the body".to_string());
    }
    if !same_expiry(strategy) {
        errors.push("iron condor legs must share an expiration".to_string());
    }
}

fn check_butterfly(strategy: &Strategy, errors: &mut Vec<String>) {
    if strategy.legs.len() != 3 {
        errors.push(format!(
            "butterfly must have exactly 3 legs, got {}",
            strategy.legs.len()
        ));
        return;
    }
    let (low, center, high) = (&strategy.legs[0], &strategy.legs[1], &strategy.legs[2]);
    let (k_low, k_center, k_high) = (
        low.contract.strike,
        center.contract.strike,
        high.contract.strike,
    );
    if !(k_low < k_center && k_center < k_high) {
        errors.push(format!(
            "butterfly strikes must be ascending, got {k_low}/{k_center}/{k_high}"
        ));
    } else if k_center - k_low != k_high - k_center {
        errors.push(format!(
            "butterfly wings must be symmetric around the center strike \
             ({k_center} - {k_low} != {k_high} - {k_center})"
        ));
    }
    if center.quantity != low.quantity * 2 || low.quantity != high.quantity {
        errors.push("butterfly center quantity must be twice each wing".to_string());
    }
    let kind = low.contract.kind;
    if strategy.legs.iter().any(|l| l.contract.kind != kind) {
        errors.push("butterfly legs must share an option kind".to_string());
    }
    if !same_expiry(strategy) {
        errors.push("butterfly legs must share an expiration".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyBuilder;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn asof() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()
    }

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 26).unwrap()
    }

    #[test]
    fn test_valid_straddle_passes() {
        let strategy = StrategyBuilder::new("BTC")
            .straddle(super::super::Action::Buy, dec!(50000), expiry(), 1)
            .unwrap();
        let report = validate(&strategy, asof());
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_mislabeled_strangle_rejected() {
        // Build a straddle but declare it a strangle: equal strikes violate
        // the put-below-call ordering.
        let mut strategy = StrategyBuilder::new("BTC")
            .straddle(super::super::Action::Sell, dec!(50000), expiry(), 1)
            .unwrap();
        strategy.strategy_type = StrategyType::Strangle;
        let report = validate(&strategy, asof());
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("strike ordering")));
    }

    #[test]
    fn test_expired_contract_rejected() {
        let strategy = StrategyBuilder::new("BTC")
            .single_leg(
                crate::models::OptionKind::Call,
                super::super::Action::Buy,
                dec!(50000),
                NaiveDate::from_ymd_opt(2025, 12, 26).unwrap(),
                1,
            )
            .unwrap();
        let report = validate(&strategy, asof());
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("expired")));
    }

    #[test]
    fn test_near_expiry_warns_but_passes() {
        let strategy = StrategyBuilder::new("BTC")
            .single_leg(
                crate::models::OptionKind::Put,
                super::super::Action::Buy,
                dec!(50000),
                NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
                1,
            )
            .unwrap();
        let report = validate(&strategy, asof());
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("expires in"));
    }

    #[test]
    fn test_empty_strategy_rejected() {
        let strategy = Strategy {
            name: "empty".to_string(),
            description: String::new(),
            strategy_type: StrategyType::SingleLeg,
            legs: Vec::new(),
        };
        let report = validate(&strategy, asof());
        assert!(!report.is_valid);
    }

    #[test_case(StrategyType::Straddle; "straddle needs 2 legs")]
    #[test_case(StrategyType::IronCondor; "iron condor needs 4 legs")]
    #[test_case(StrategyType::Butterfly; "butterfly needs 3 legs")]
    fn test_leg_count_mismatch(declared: StrategyType) {
        let mut strategy = StrategyBuilder::new("BTC")
            .single_leg(
                crate::models::OptionKind::Call,
                super::super::Action::Buy,
                dec!(50000),
                expiry(),
                1,
            )
            .unwrap();
        strategy.strategy_type = declared;
        let report = validate(&strategy, asof());
        assert!(!report.is_valid);
    }

    #[test]
    fn test_valid_iron_condor_passes() {
        let strategy = StrategyBuilder::new("BTC")
            .iron_condor(
                [dec!(40000), dec!(45000), dec!(55000), dec!(60000)],
                expiry(),
                1,
            )
            .unwrap();
        let report = validate(&strategy, asof());
        assert!(report.is_valid, "errors: {:?}", report.errors);
    }

    #[test]
    fn test_valid_butterfly_passes() {
        let strategy = StrategyBuilder::new("BTC")
            .butterfly(
                crate::models::OptionKind::Put,
                dec!(45000),
                dec!(50000),
                dec!(55000),
                expiry(),
                2,
            )
            .unwrap();
        let report = validate(&strategy, asof());
        assert!(report.is_valid, "errors: {:?}", report.errors);
    }

    #[test]
    fn test_validation_does_not_mutate() {
        let strategy = StrategyBuilder::new("BTC")
            .straddle(super::super::Action::Buy, dec!(50000), expiry(), 1)
            .unwrap();
        let before = serde_json::to_string(&strategy).unwrap();
        let _ = validate(&strategy, asof());
        let after = serde_json::to_string(&strategy).unwrap();
        assert_eq!(before, after);
    }
}
