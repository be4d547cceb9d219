//! In-memory historical data handed to the engine by external collaborators.
//!
//! The engine never fetches anything itself: callers resolve market data up
//! front and pass it in as plain bars. Missing fields stay `None`, never
//! zero-as-sentinel.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Bar;

/// Historical bars for one underlying and its option instruments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalDataSource {
    underlying: BTreeMap<NaiveDate, Bar>,
    options: HashMap<String, BTreeMap<NaiveDate, Bar>>,
}

impl HistoricalDataSource {
    /// Empty source; the engine will price everything from the model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load underlying bars, replacing any existing series.
    pub fn set_underlying(&mut self, bars: impl IntoIterator<Item = Bar>) {
        self.underlying = bars.into_iter().map(|b| (b.date, b)).collect();
    }

    /// Load bars for one option instrument, replacing any existing series.
    pub fn set_option(&mut self, instrument_id: impl Into<String>, bars: impl IntoIterator<Item = Bar>) {
        self.options
            .insert(instrument_id.into(), bars.into_iter().map(|b| (b.date, b)).collect());
    }

    /// Underlying close on the given date, if recorded.
    #[must_use]
    pub fn spot_on(&self, date: NaiveDate) -> Option<Decimal> {
        self.underlying.get(&date).map(|b| b.close)
    }

    /// Most recent underlying close at or before the given date. Bridges
    /// weekend and holiday gaps in the series.
    #[must_use]
    pub fn spot_at_or_before(&self, date: NaiveDate) -> Option<Decimal> {
        self.underlying
            .range(..=date)
            .next_back()
            .map(|(_, b)| b.close)
    }

    /// Underlying implied volatility on the given date, if recorded.
    #[must_use]
    pub fn iv_on(&self, date: NaiveDate) -> Option<f64> {
        self.underlying.get(&date).and_then(|b| b.implied_volatility)
    }

    /// Option close for an instrument on the given date, if recorded.
    #[must_use]
    pub fn option_price_on(&self, instrument_id: &str, date: NaiveDate) -> Option<Decimal> {
        self.options
            .get(instrument_id)
            .and_then(|series| series.get(&date))
            .map(|b| b.close)
    }

    /// Underlying closes over an inclusive date range, ascending.
    #[must_use]
    pub fn underlying_closes(&self, start: NaiveDate, end: NaiveDate) -> Vec<Decimal> {
        self.underlying
            .range(start..=end)
            .map(|(_, b)| b.close)
            .collect()
    }

    /// Whether any underlying bars are loaded.
    #[must_use]
    pub fn has_underlying(&self) -> bool {
        !self.underlying.is_empty()
    }
}

/// Ratio of ticks priced from real data versus the model fallback.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DataCoverage {
    /// Option price lookups satisfied from historical bars.
    pub data_hits: u64,
    /// Lookups that fell back to the pricing model.
    pub model_fallbacks: u64,
}

impl DataCoverage {
    /// Fraction of lookups served from real data; 1.0 when nothing was
    /// looked up.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        let total = self.data_hits + self.model_fallbacks;
        if total == 0 {
            return 1.0;
        }
        self.data_hits as f64 / total as f64
    }
}
