//! Error taxonomy for the options engine.
//!
//! Every fallible operation in the engine returns `Result<_, EngineError>`.
//! The engine never catches and suppresses its own errors: they propagate to
//! the caller, which decides whether to abort, retry, or substitute a
//! fallback. Data-quality issues (low historical coverage, anomalous
//! volatility points) are *not* errors — they travel as warnings attached to
//! result objects.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors produced by the options engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or out-of-domain numeric input. Always the caller's fault;
    /// retrying with the same arguments will fail again.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the input.
        message: String,
    },

    /// A numerical root-finder failed to converge. The caller may retry with
    /// different bounds or a different seed.
    #[error(
        "Solver failed to converge after {iterations} iterations (last error: {last_error:.6})"
    )]
    Convergence {
        /// Number of iterations attempted.
        iterations: u32,
        /// Absolute price error at the last iterate.
        last_error: f64,
    },

    /// A time series is too short for the requested window.
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData {
        /// Minimum number of points required.
        required: usize,
        /// Number of points supplied.
        actual: usize,
    },

    /// Opening a position would drive the cash balance negative.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Cash required for the entry (cost + commission).
        required: rust_decimal::Decimal,
        /// Cash available.
        available: rust_decimal::Decimal,
    },

    /// The referenced position does not exist in the active book.
    #[error("Position {position_id} not found")]
    PositionNotFound {
        /// Identifier the caller supplied.
        position_id: String,
    },

    /// An exit quantity exceeds the held quantity.
    #[error("Exit quantity {requested} exceeds held quantity {held} for position {position_id}")]
    QuantityExceedsHolding {
        /// Position being reduced.
        position_id: String,
        /// Quantity requested to close.
        requested: u32,
        /// Quantity actually held.
        held: u32,
    },

    /// A performance report was requested on a portfolio with no history.
    #[error("Cannot build a performance report: no closed trades recorded")]
    EmptyPortfolio,

    /// The backtest was cancelled cooperatively between ticks. Partial state
    /// is discarded; a cancelled run is not resumable.
    #[error("Backtest cancelled at {date}")]
    Cancelled {
        /// Simulation date at which cancellation was observed.
        date: NaiveDate,
    },
}

impl EngineError {
    /// Invalid-input error from any displayable message.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Require a strictly positive value, tagging the offending parameter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] when `value <= 0` or is not finite.
    pub fn require_positive(name: &str, value: f64) -> Result<(), Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(Self::invalid_input(format!(
                "{name} must be positive and finite, got {value}"
            )));
        }
        Ok(())
    }

    /// Require a non-negative value, tagging the offending parameter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] when `value < 0` or is not finite.
    pub fn require_non_negative(name: &str, value: f64) -> Result<(), Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(Self::invalid_input(format!(
                "{name} must be non-negative and finite, got {value}"
            )));
        }
        Ok(())
    }
}
