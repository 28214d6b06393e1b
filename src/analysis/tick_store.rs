//! Tick Store
//!
//! Holds the bid and ask top-of-book price series for one instrument and
//! answers "price at time T" by linear interpolation between the surrounding
//! ticks.
//!
//! # Lookup Rules
//!
//! 1. Exact timestamp match returns the stored price (first-seen tick wins
//!    when a timestamp repeats; duplicates are never merged).
//! 2. Otherwise interpolate between the nearest preceding and following ticks.
//! 3. Anything before the first tick or after the last tick is an
//!    [`AnalysisError::OutOfRange`]. Prices are never extrapolated.

use serde::{Deserialize, Serialize};

use super::error::AnalysisError;
use super::timestamps::Nanos;

/// Which side of the book a price series belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSide {
    Bid,
    Ask,
}

impl std::fmt::Display for PriceSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bid => write!(f, "bid"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

// =============================================================================
// TICK SERIES
// =============================================================================

/// One side's price history, sorted ascending by timestamp.
#[derive(Debug, Clone, Default)]
pub struct TickSeries {
    timestamps: Vec<Nanos>,
    prices: Vec<f64>,
}

impl TickSeries {
    /// Build a series from parallel columns. Input order does not matter.
    pub fn new(timestamps: Vec<Nanos>, prices: Vec<f64>) -> Result<Self, AnalysisError> {
        if timestamps.len() != prices.len() {
            return Err(AnalysisError::schema(
                "ticks",
                format!(
                    "timestamp/price length mismatch ({} vs {})",
                    timestamps.len(),
                    prices.len()
                ),
            ));
        }

        let already_sorted = timestamps.windows(2).all(|w| w[0] <= w[1]);
        if already_sorted {
            return Ok(Self { timestamps, prices });
        }

        // Stable sort keeps first-seen ordering among equal timestamps.
        let mut pairs: Vec<(Nanos, f64)> = timestamps.into_iter().zip(prices).collect();
        pairs.sort_by_key(|(ts, _)| *ts);
        let (timestamps, prices) = pairs.into_iter().unzip();
        Ok(Self { timestamps, prices })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn first_ts(&self) -> Option<Nanos> {
        self.timestamps.first().copied()
    }

    pub fn last_ts(&self) -> Option<Nanos> {
        self.timestamps.last().copied()
    }

    pub fn timestamps(&self) -> &[Nanos] {
        &self.timestamps
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    /// Price at `ts`, interpolated if `ts` falls between two ticks.
    pub fn price_at(&self, ts: Nanos, side: PriceSide) -> Result<f64, AnalysisError> {
        // Lower bound: first index with timestamp >= ts.
        let idx = self.timestamps.partition_point(|&t| t < ts);

        if idx < self.timestamps.len() && self.timestamps[idx] == ts {
            return Ok(self.prices[idx]);
        }

        if idx == 0 || idx >= self.timestamps.len() {
            return Err(AnalysisError::OutOfRange {
                side,
                timestamp_ns: ts,
                first_ns: self.first_ts(),
                last_ns: self.last_ts(),
            });
        }

        // No exact match, so before_ts < ts < after_ts.
        let before_ts = self.timestamps[idx - 1];
        let after_ts = self.timestamps[idx];
        let before_price = self.prices[idx - 1];
        let after_price = self.prices[idx];

        let ratio = (ts - before_ts) as f64 / (after_ts - before_ts) as f64;
        Ok(before_price + (after_price - before_price) * ratio)
    }
}

// =============================================================================
// TICK STORE
// =============================================================================

/// Bid and ask series for a single instrument. Immutable once built, so a
/// single store can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct TickStore {
    bids: TickSeries,
    asks: TickSeries,
}

impl TickStore {
    pub fn new(bids: TickSeries, asks: TickSeries) -> Self {
        Self { bids, asks }
    }

    /// Build from the four columns of a tick snapshot.
    pub fn from_columns(
        bid_timestamps: Vec<Nanos>,
        bid_prices: Vec<f64>,
        ask_timestamps: Vec<Nanos>,
        ask_prices: Vec<f64>,
    ) -> Result<Self, AnalysisError> {
        let bids = TickSeries::new(bid_timestamps, bid_prices).map_err(|e| e.within("bid"))?;
        let asks = TickSeries::new(ask_timestamps, ask_prices).map_err(|e| e.within("ask"))?;
        Ok(Self::new(bids, asks))
    }

    pub fn series(&self, side: PriceSide) -> &TickSeries {
        match side {
            PriceSide::Bid => &self.bids,
            PriceSide::Ask => &self.asks,
        }
    }

    pub fn price_at(&self, ts: Nanos, side: PriceSide) -> Result<f64, AnalysisError> {
        self.series(side).price_at(ts, side)
    }

    /// Mid price at `ts`. Fails if either side cannot be resolved.
    pub fn mid_at(&self, ts: Nanos) -> Result<f64, AnalysisError> {
        let bid = self.price_at(ts, PriceSide::Bid)?;
        let ask = self.price_at(ts, PriceSide::Ask)?;
        Ok((bid + ask) / 2.0)
    }

    /// Range over which both sides have data, if any.
    pub fn coverage(&self) -> Option<(Nanos, Nanos)> {
        let start = self.bids.first_ts()?.max(self.asks.first_ts()?);
        let end = self.bids.last_ts()?.min(self.asks.last_ts()?);
        (start <= end).then_some((start, end))
    }

    pub fn tick_counts(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }
}
