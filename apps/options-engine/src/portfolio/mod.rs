//! Position lifecycle, cash accounting, and equity snapshots.
//!
//! [`PortfolioTracker`] owns the only mutable state in the engine: cash,
//! open positions, and the trade log for one run. Every state change goes
//! through [`PortfolioTracker::add_position`], [`PortfolioTracker::remove_position`],
//! or [`PortfolioTracker::settle_expired`]; violations surface as errors and
//! are never silently clamped.

mod performance;

pub use performance::{PerformanceReport, performance_report};

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Greeks, OptionContract};
use crate::strategy::Action;

// ============================================
// Position Types
// ============================================

/// Lifecycle state of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    /// Holding contracts; partial exits reduce quantity but keep it open.
    Open,
    /// Fully exited through explicit trades.
    Closed,
    /// Force-settled at intrinsic value on the expiration date.
    Expired,
}

/// Why a position (or part of one) was exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    /// Explicit close at a market or model price.
    Close,
    /// Settlement at intrinsic value on expiry.
    Expiry,
    /// American-style early exercise.
    EarlyExercise,
}

/// One open or historical position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Unique position identifier.
    pub id: Uuid,
    /// The contract held.
    pub contract: OptionContract,
    /// Buy or sell.
    pub action: Action,
    /// Remaining open quantity.
    pub quantity: u32,
    /// Entry price per contract.
    pub entry_price: Decimal,
    /// Date the position was opened.
    pub entry_date: NaiveDate,
    /// Lifecycle state.
    pub status: PositionStatus,
    /// Latest mark price per contract, if marked.
    pub mark_price: Option<Decimal>,
}

impl Position {
    /// Signed quantity (positive long, negative short).
    #[must_use]
    pub fn signed_quantity(&self) -> i64 {
        self.action.sign() * i64::from(self.quantity)
    }

    /// Cost basis: entry price x quantity x multiplier, unsigned.
    #[must_use]
    pub fn cost_basis(&self) -> Decimal {
        self.entry_price * Decimal::from(self.quantity) * Decimal::from(self.contract.multiplier)
    }

    /// Current market value, signed by direction. `None` until marked.
    #[must_use]
    pub fn market_value(&self) -> Option<Decimal> {
        let mark = self.mark_price?;
        Some(mark * Decimal::from(self.signed_quantity()) * Decimal::from(self.contract.multiplier))
    }

    /// Unrealized P&L against the entry price. `None` until marked.
    #[must_use]
    pub fn unrealized_pnl(&self) -> Option<Decimal> {
        let mark = self.mark_price?;
        Some(
            (mark - self.entry_price)
                * Decimal::from(self.signed_quantity())
                * Decimal::from(self.contract.multiplier),
        )
    }
}

/// Record of one completed exit (full or partial).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Identifier of the position this exit belongs to.
    pub position_id: Uuid,
    /// Instrument exited.
    pub instrument_id: String,
    /// Direction of the original position.
    pub action: Action,
    /// Quantity exited.
    pub quantity: u32,
    /// Entry price per contract.
    pub entry_price: Decimal,
    /// Exit price per contract.
    pub exit_price: Decimal,
    /// Realized P&L net of commission.
    pub realized_pnl: Decimal,
    /// Commission charged on the exit.
    pub commission: Decimal,
    /// Exit date.
    pub exit_date: NaiveDate,
    /// Why the exit happened.
    pub reason: ExitReason,
}

/// Point-in-time capture of portfolio state. Pure data, no references back
/// into the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Snapshot date.
    pub date: NaiveDate,
    /// Free cash.
    pub cash: Decimal,
    /// Cash plus marked value of open positions.
    pub total_value: Decimal,
    /// Aggregated Greeks over open positions, when any carry Greeks.
    pub greeks: Option<Greeks>,
    /// Per-position marks: (instrument id, signed quantity, mark price).
    pub position_marks: Vec<(String, i64, Option<Decimal>)>,
}

// ============================================
// Portfolio Tracker
// ============================================

/// Mutable portfolio state for one backtest or live session.
///
/// Single-owner: no internal synchronization. Independent portfolios share
/// nothing and may be driven from separate threads freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioTracker {
    /// Capital at inception.
    pub initial_capital: Decimal,
    /// Free cash.
    pub cash: Decimal,
    /// All positions ever opened, including closed and expired ones.
    pub positions: Vec<Position>,
    /// Completed exits in chronological order.
    pub trades: Vec<TradeRecord>,
    /// Total commission paid across entries and exits.
    pub total_commission: Decimal,
}

impl PortfolioTracker {
    /// Start a portfolio with the given capital.
    #[must_use]
    pub const fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: Vec::new(),
            trades: Vec::new(),
            total_commission: Decimal::ZERO,
        }
    }

    /// Open positions only.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions
            .iter()
            .filter(|p| p.status == PositionStatus::Open)
    }

    /// Open a position.
    ///
    /// Buys debit cash by premium plus commission; sells credit the premium
    /// and debit the commission.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] for a zero quantity or negative
    /// price, and [`EngineError::InsufficientFunds`] when cash would go
    /// negative.
    pub fn add_position(
        &mut self,
        contract: OptionContract,
        action: Action,
        quantity: u32,
        price: Decimal,
        commission: Decimal,
        date: NaiveDate,
    ) -> Result<Uuid, EngineError> {
        if quantity == 0 {
            return Err(EngineError::invalid_input("quantity must be at least 1"));
        }
        if price < Decimal::ZERO {
            return Err(EngineError::invalid_input(format!(
                "entry price must be non-negative, got {price}"
            )));
        }

        let notional = price * Decimal::from(quantity) * Decimal::from(contract.multiplier);
        let cash_delta = match action {
            Action::Buy => -notional - commission,
            Action::Sell => notional - commission,
        };
        if self.cash + cash_delta < Decimal::ZERO {
            return Err(EngineError::InsufficientFunds {
                required: -cash_delta,
                available: self.cash,
            });
        }

        let id = Uuid::new_v4();
        debug!(
            position_id = %id,
            instrument = %contract.instrument_id,
            ?action,
            quantity,
            %price,
            "Position opened"
        );
        self.cash += cash_delta;
        self.total_commission += commission;
        self.positions.push(Position {
            id,
            contract,
            action,
            quantity,
            entry_price: price,
            entry_date: date,
            status: PositionStatus::Open,
            mark_price: Some(price),
        });
        Ok(id)
    }

    /// Exit some or all of a position at the given price.
    ///
    /// Realized P&L is `(exit - entry) x quantity x direction - commission`.
    /// Closing a long credits the exit proceeds; closing a short debits the
    /// buy-back cost.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PositionNotFound`] for an unknown or already
    /// closed position and [`EngineError::QuantityExceedsHolding`] when the
    /// requested quantity exceeds the open amount.
    pub fn remove_position(
        &mut self,
        position_id: Uuid,
        quantity: u32,
        price: Decimal,
        commission: Decimal,
        date: NaiveDate,
    ) -> Result<TradeRecord, EngineError> {
        self.exit_position(
            position_id,
            quantity,
            price,
            commission,
            date,
            ExitReason::Close,
        )
    }

    /// Force-settle an expired or exercised position at intrinsic value.
    ///
    /// The only path that produces a cash settlement without an explicit
    /// trade action. No commission is charged on settlement.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PositionNotFound`] for an unknown or already
    /// closed position.
    pub fn settle_expired(
        &mut self,
        position_id: Uuid,
        intrinsic: Decimal,
        date: NaiveDate,
        reason: ExitReason,
    ) -> Result<TradeRecord, EngineError> {
        let quantity = self
            .positions
            .iter()
            .find(|p| p.id == position_id && p.status == PositionStatus::Open)
            .map(|p| p.quantity)
            .ok_or_else(|| EngineError::PositionNotFound {
                position_id: position_id.to_string(),
            })?;
        let record = self.exit_position(
            position_id,
            quantity,
            intrinsic,
            Decimal::ZERO,
            date,
            reason,
        )?;
        // Settlement is a terminal state distinct from an ordinary close.
        if let Some(position) = self.positions.iter_mut().find(|p| p.id == position_id) {
            position.status = PositionStatus::Expired;
        }
        Ok(record)
    }

    fn exit_position(
        &mut self,
        position_id: Uuid,
        quantity: u32,
        price: Decimal,
        commission: Decimal,
        date: NaiveDate,
        reason: ExitReason,
    ) -> Result<TradeRecord, EngineError> {
        if quantity == 0 {
            return Err(EngineError::invalid_input("exit quantity must be at least 1"));
        }
        let position = self
            .positions
            .iter_mut()
            .find(|p| p.id == position_id && p.status == PositionStatus::Open)
            .ok_or_else(|| EngineError::PositionNotFound {
                position_id: position_id.to_string(),
            })?;
        if quantity > position.quantity {
            return Err(EngineError::QuantityExceedsHolding {
                position_id: position_id.to_string(),
                requested: quantity,
                held: position.quantity,
            });
        }

        let multiplier = Decimal::from(position.contract.multiplier);
        let direction = Decimal::from(position.action.sign());
        let realized_pnl =
            (price - position.entry_price) * Decimal::from(quantity) * multiplier * direction
                - commission;
        let cash_delta = match position.action {
            Action::Buy => price * Decimal::from(quantity) * multiplier - commission,
            Action::Sell => -(price * Decimal::from(quantity) * multiplier) - commission,
        };

        let record = TradeRecord {
            position_id,
            instrument_id: position.contract.instrument_id.clone(),
            action: position.action,
            quantity,
            entry_price: position.entry_price,
            exit_price: price,
            realized_pnl,
            commission,
            exit_date: date,
            reason,
        };

        position.quantity -= quantity;
        if position.quantity == 0 {
            position.status = PositionStatus::Closed;
        }
        info!(
            position_id = %position_id,
            instrument = %record.instrument_id,
            quantity,
            %realized_pnl,
            ?reason,
            "Position exited"
        );
        self.cash += cash_delta;
        self.total_commission += commission;
        self.trades.push(record.clone());
        Ok(record)
    }

    /// Refresh mark prices for open positions from a price map keyed by
    /// instrument id. Instruments absent from the map keep their last mark.
    pub fn mark_to_market(&mut self, prices: &HashMap<String, Decimal>) {
        for position in &mut self.positions {
            if position.status != PositionStatus::Open {
                continue;
            }
            if let Some(price) = prices.get(&position.contract.instrument_id) {
                position.mark_price = Some(*price);
            }
        }
    }

    /// Total portfolio value: cash plus marked value of open positions.
    /// Unmarked positions contribute their entry price.
    #[must_use]
    pub fn total_value(&self) -> Decimal {
        let positions_value: Decimal = self
            .open_positions()
            .map(|p| {
                p.market_value().unwrap_or_else(|| {
                    p.entry_price
                        * Decimal::from(p.signed_quantity())
                        * Decimal::from(p.contract.multiplier)
                })
            })
            .sum();
        self.cash + positions_value
    }

    /// Aggregate Greeks across open positions, weighted by signed quantity
    /// and multiplier. `None` when no open position carries Greeks.
    #[must_use]
    pub fn aggregate_greeks(&self) -> Option<Greeks> {
        let mut total = Greeks::zero();
        let mut seen = false;
        for position in self.open_positions() {
            if let Some(g) = position.contract.greeks {
                seen = true;
                let weight =
                    position.signed_quantity() as f64 * f64::from(position.contract.multiplier);
                total = total.add(&g.scale(weight));
            }
        }
        seen.then_some(total)
    }

    /// Capture current state. Pure read: the tracker is not mutated.
    #[must_use]
    pub fn snapshot(&self, date: NaiveDate) -> PortfolioSnapshot {
        PortfolioSnapshot {
            date,
            cash: self.cash,
            total_value: self.total_value(),
            greeks: self.aggregate_greeks(),
            position_marks: self
                .open_positions()
                .map(|p| {
                    (
                        p.contract.instrument_id.clone(),
                        p.signed_quantity(),
                        p.mark_price,
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OptionKind, OptionStyle};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contract(kind: OptionKind, strike: Decimal) -> OptionContract {
        OptionContract::new(
            "BTC",
            kind,
            OptionStyle::European,
            strike,
            date(2026, 6, 26),
            1,
        )
    }

    #[test]
    fn test_buy_debits_cash_and_opens() {
        let mut portfolio = PortfolioTracker::new(dec!(100000));
        let id = portfolio
            .add_position(
                contract(OptionKind::Call, dec!(50000)),
                Action::Buy,
                2,
                dec!(1500),
                dec!(0.9),
                date(2026, 1, 2),
            )
            .unwrap();
        assert_eq!(portfolio.cash, dec!(96999.1));
        let position = portfolio.positions.iter().find(|p| p.id == id).unwrap();
        assert_eq!(position.status, PositionStatus::Open);
        assert_eq!(position.signed_quantity(), 2);
    }

    #[test]
    fn test_sell_credits_premium() {
        let mut portfolio = PortfolioTracker::new(dec!(10000));
        portfolio
            .add_position(
                contract(OptionKind::Put, dec!(45000)),
                Action::Sell,
                1,
                dec!(900),
                dec!(0.27),
                date(2026, 1, 2),
            )
            .unwrap();
        assert_eq!(portfolio.cash, dec!(10899.73));
    }

    #[test]
    fn test_insufficient_funds_rejected() {
        let mut portfolio = PortfolioTracker::new(dec!(1000));
        let err = portfolio
            .add_position(
                contract(OptionKind::Call, dec!(50000)),
                Action::Buy,
                1,
                dec!(1500),
                dec!(0.45),
                date(2026, 1, 2),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));
        // Failed entries leave nothing behind
        assert_eq!(portfolio.cash, dec!(1000));
        assert!(portfolio.positions.is_empty());
    }

    #[test]
    fn test_realized_pnl_on_winning_long() {
        // Entered at 45000, exited at 50000, quantity 1, long: P&L is
        // 5000 minus commissions.
        let mut portfolio = PortfolioTracker::new(dec!(100000));
        let id = portfolio
            .add_position(
                contract(OptionKind::Call, dec!(40000)),
                Action::Buy,
                1,
                dec!(45000),
                dec!(13.5),
                date(2026, 1, 2),
            )
            .unwrap();
        let record = portfolio
            .remove_position(id, 1, dec!(50000), dec!(15), date(2026, 2, 2))
            .unwrap();
        assert_eq!(record.realized_pnl, dec!(4985));
        assert_eq!(
            portfolio.positions[0].status,
            PositionStatus::Closed
        );
        assert_eq!(portfolio.cash, dec!(100000) - dec!(13.5) + dec!(5000) - dec!(15));
    }

    #[test]
    fn test_partial_exit_keeps_position_open() {
        let mut portfolio = PortfolioTracker::new(dec!(100000));
        let id = portfolio
            .add_position(
                contract(OptionKind::Call, dec!(50000)),
                Action::Buy,
                3,
                dec!(1000),
                Decimal::ZERO,
                date(2026, 1, 2),
            )
            .unwrap();
        portfolio
            .remove_position(id, 2, dec!(1200), Decimal::ZERO, date(2026, 1, 10))
            .unwrap();
        let position = &portfolio.positions[0];
        assert_eq!(position.status, PositionStatus::Open);
        assert_eq!(position.quantity, 1);
    }

    #[test]
    fn test_exit_errors() {
        let mut portfolio = PortfolioTracker::new(dec!(100000));
        let id = portfolio
            .add_position(
                contract(OptionKind::Call, dec!(50000)),
                Action::Buy,
                1,
                dec!(1000),
                Decimal::ZERO,
                date(2026, 1, 2),
            )
            .unwrap();

        let missing = portfolio.remove_position(
            Uuid::new_v4(),
            1,
            dec!(1000),
            Decimal::ZERO,
            date(2026, 1, 3),
        );
        assert!(matches!(missing, Err(EngineError::PositionNotFound { .. })));

        let too_many =
            portfolio.remove_position(id, 5, dec!(1000), Decimal::ZERO, date(2026, 1, 3));
        assert!(matches!(
            too_many,
            Err(EngineError::QuantityExceedsHolding {
                requested: 5,
                held: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_short_exit_cash_flow() {
        let mut portfolio = PortfolioTracker::new(dec!(10000));
        let id = portfolio
            .add_position(
                contract(OptionKind::Put, dec!(45000)),
                Action::Sell,
                1,
                dec!(900),
                Decimal::ZERO,
                date(2026, 1, 2),
            )
            .unwrap();
        // Buy back cheaper: profit 400
        let record = portfolio
            .remove_position(id, 1, dec!(500), Decimal::ZERO, date(2026, 2, 2))
            .unwrap();
        assert_eq!(record.realized_pnl, dec!(400));
        assert_eq!(portfolio.cash, dec!(10400));
    }

    #[test]
    fn test_settlement_marks_expired() {
        let mut portfolio = PortfolioTracker::new(dec!(100000));
        let id = portfolio
            .add_position(
                contract(OptionKind::Call, dec!(50000)),
                Action::Buy,
                1,
                dec!(2000),
                Decimal::ZERO,
                date(2026, 1, 2),
            )
            .unwrap();
        let record = portfolio
            .settle_expired(id, dec!(3000), date(2026, 6, 26), ExitReason::Expiry)
            .unwrap();
        assert_eq!(record.reason, ExitReason::Expiry);
        assert_eq!(record.realized_pnl, dec!(1000));
        assert_eq!(portfolio.positions[0].status, PositionStatus::Expired);
        assert_eq!(portfolio.cash, dec!(101000));
    }

    #[test]
    fn test_cost_basis_invariant_before_marking() {
        // cash + sum(cost basis of open longs - credit of shorts) stays at
        // initial capital minus fees through any add/remove sequence.
        let mut portfolio = PortfolioTracker::new(dec!(50000));
        let c = contract(OptionKind::Call, dec!(50000));
        let id1 = portfolio
            .add_position(c.clone(), Action::Buy, 2, dec!(1000), dec!(0.6), date(2026, 1, 2))
            .unwrap();
        portfolio
            .add_position(c, Action::Buy, 1, dec!(1100), dec!(0.33), date(2026, 1, 3))
            .unwrap();
        portfolio
            .remove_position(id1, 1, dec!(1000), dec!(0.3), date(2026, 1, 4))
            .unwrap();

        let open_basis: Decimal = portfolio.open_positions().map(Position::cost_basis).sum();
        assert_eq!(
            portfolio.cash + open_basis,
            dec!(50000) - portfolio.total_commission
        );
    }

    #[test]
    fn test_snapshot_is_pure() {
        let mut portfolio = PortfolioTracker::new(dec!(100000));
        portfolio
            .add_position(
                contract(OptionKind::Call, dec!(50000)),
                Action::Buy,
                1,
                dec!(2000),
                Decimal::ZERO,
                date(2026, 1, 2),
            )
            .unwrap();
        let before = serde_json::to_string(&portfolio).unwrap();
        let snapshot = portfolio.snapshot(date(2026, 1, 2));
        let after = serde_json::to_string(&portfolio).unwrap();
        assert_eq!(before, after);
        assert_eq!(snapshot.total_value, dec!(100000));
        assert_eq!(snapshot.position_marks.len(), 1);
    }

    #[test]
    fn test_mark_to_market_updates_value() {
        let mut portfolio = PortfolioTracker::new(dec!(100000));
        let c = contract(OptionKind::Call, dec!(50000));
        let instrument_id = c.instrument_id.clone();
        portfolio
            .add_position(c, Action::Buy, 1, dec!(2000), Decimal::ZERO, date(2026, 1, 2))
            .unwrap();

        let mut prices = HashMap::new();
        prices.insert(instrument_id, dec!(2500));
        portfolio.mark_to_market(&prices);

        assert_eq!(portfolio.total_value(), dec!(100500));
        assert_eq!(
            portfolio.positions[0].unrealized_pnl(),
            Some(dec!(500))
        );
    }
}
