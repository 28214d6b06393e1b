//! Fill Cost Attribution
//!
//! For every hedge fill, look up the reference mid price at the hedge send
//! time and at two fixed offsets after it, then express the drift as P&L and
//! basis-point costs.
//!
//! # Windows
//!
//! ```text
//!   send ────────── send+20ms ───────────────────── send+100ms
//!    │   t_0_20_bps    │          t_20_100_bps           │
//!    │◄───────────────────── t_0_100_bps ───────────────►│
//! ```
//!
//! # Sign Conventions
//!
//! * `pnl_change` is the P&L the hedge would have gained filling at the
//!   +20ms mid instead, positive when the fill was worse than that mid.
//! * `*_bps` is the raw signed mid drift over the window.
//! * `*_bps_cost` is `+|drift|` when the drift moved against the fill's side
//!   (buy and price rose, sell and price fell), `-|drift|` otherwise.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::AnalysisError;
use super::events::SEND_TIME_OMS;
use super::records::{HedgeGroupRecord, OrderSide, VenueRole};
use super::summary::PnlAttribution;
use super::tick_store::TickStore;
use super::timestamps::{add_millis, diff_millis, serialize_iso8601, Nanos};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Short horizon after hedge send.
pub const SHORT_HORIZON_MS: i64 = 20;
/// Long horizon after hedge send.
pub const LONG_HORIZON_MS: i64 = 100;

const BPS: f64 = 10_000.0;

/// What to do when a fill's lookups fall outside tick coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// The whole group is reported as failed.
    #[default]
    FailGroup,
    /// Drop the fill, keep attributing the rest of the group.
    SkipFill,
}

// =============================================================================
// HEDGE FILL
// =============================================================================

/// A hedge-leg fill paired with the send time of its order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HedgeFill {
    pub transaction_id: String,
    pub hedge_group_id: String,
    pub order_id: String,
    #[serde(serialize_with = "serialize_iso8601")]
    pub send_time: Nanos,
    #[serde(serialize_with = "serialize_iso8601")]
    pub fill_time: Nanos,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
}

/// Collect every fill of every hedge order in the group.
///
/// Each hedge order with fills must carry `send_time_oms`, and no fill may
/// precede it.
pub fn compact_hedge_fills(record: &HedgeGroupRecord) -> Result<Vec<HedgeFill>, AnalysisError> {
    let mut fills = Vec::new();

    for order in record.orders_with_role(VenueRole::Hedge) {
        if order.fills.is_empty() {
            continue;
        }

        let ctx = format!("hedge_group[{}].orders[{}]", record.id, order.order_id);
        let send_time = order.stamp(SEND_TIME_OMS).ok_or_else(|| {
            AnalysisError::schema(&ctx, format!("hedge order with fills has no {}", SEND_TIME_OMS))
        })?;

        for fill in &order.fills {
            if fill.exchange_fill_time < send_time {
                return Err(AnalysisError::schema(
                    &ctx,
                    format!(
                        "fill {} at {} precedes order send at {}",
                        fill.transaction_id, fill.exchange_fill_time, send_time
                    ),
                ));
            }

            fills.push(HedgeFill {
                transaction_id: fill.transaction_id.clone(),
                hedge_group_id: record.id.clone(),
                order_id: order.order_id.clone(),
                send_time,
                fill_time: fill.exchange_fill_time,
                side: order.side,
                price: fill.price,
                quantity: fill.quantity,
            });
        }
    }

    Ok(fills)
}

// =============================================================================
// ATTRIBUTED FILL
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributedFill {
    #[serde(flatten)]
    pub fill: HedgeFill,
    pub mid_price_send_time: f64,
    /// The executed price, not a tick lookup.
    pub mid_price_fill_time: f64,
    pub mid_price_send_time_add_20ms: f64,
    pub mid_price_send_time_add_100ms: f64,
    pub send_to_fill_time_ms: i64,
    pub pnl_change: f64,
    pub t_0_20_bps: f64,
    pub t_0_20_bps_cost: f64,
    pub t_0_100_bps: f64,
    pub t_0_100_bps_cost: f64,
    pub t_20_100_bps: f64,
    pub t_20_100_bps_cost: f64,
}

/// Signed mid drift from `earlier` to `later`, in basis points.
#[inline]
pub fn drift_bps(earlier: f64, later: f64) -> f64 {
    (later - earlier) / earlier * BPS
}

/// Reframe a signed drift as a cost for the given fill side.
#[inline]
pub fn adverse_cost(side: OrderSide, drift: f64) -> f64 {
    let adverse = match side {
        OrderSide::Buy => drift > 0.0,
        OrderSide::Sell => drift < 0.0,
    };
    if adverse {
        drift.abs()
    } else {
        -drift.abs()
    }
}

/// P&L gained had the fill executed at the +20ms mid; positive when the fill
/// was worse than that mid (sold below it, bought above it).
#[inline]
pub fn pnl_change(side: OrderSide, fill_price: f64, mid_short: f64, quantity: f64) -> f64 {
    match side {
        OrderSide::Sell => (mid_short - fill_price) * quantity,
        OrderSide::Buy => (fill_price - mid_short) * quantity,
    }
}

pub fn attribute_fill(fill: &HedgeFill, ticks: &TickStore) -> Result<AttributedFill, AnalysisError> {
    let mid_send = ticks.mid_at(fill.send_time)?;
    let mid_short = ticks.mid_at(add_millis(fill.send_time, SHORT_HORIZON_MS))?;
    let mid_long = ticks.mid_at(add_millis(fill.send_time, LONG_HORIZON_MS))?;

    let t_0_20 = drift_bps(mid_send, mid_short);
    let t_0_100 = drift_bps(mid_send, mid_long);
    let t_20_100 = drift_bps(mid_short, mid_long);

    Ok(AttributedFill {
        fill: fill.clone(),
        mid_price_send_time: mid_send,
        mid_price_fill_time: fill.price,
        mid_price_send_time_add_20ms: mid_short,
        mid_price_send_time_add_100ms: mid_long,
        send_to_fill_time_ms: diff_millis(fill.send_time, fill.fill_time),
        pnl_change: pnl_change(fill.side, fill.price, mid_short, fill.quantity),
        t_0_20_bps: t_0_20,
        t_0_20_bps_cost: adverse_cost(fill.side, t_0_20),
        t_0_100_bps: t_0_100,
        t_0_100_bps_cost: adverse_cost(fill.side, t_0_100),
        t_20_100_bps: t_20_100,
        t_20_100_bps_cost: adverse_cost(fill.side, t_20_100),
    })
}

// =============================================================================
// ATTRIBUTED GROUP
// =============================================================================

/// A fill dropped under [`OutOfRangePolicy::SkipFill`].
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFill {
    pub order_id: String,
    pub transaction_id: String,
    pub error: AnalysisError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributedGroup {
    pub hg_id: String,
    pub pnl_with_fee: f64,
    pub is_win: bool,
    /// Keyed by order id; sorted for diff-friendly output.
    pub orders: BTreeMap<String, Vec<AttributedFill>>,
    #[serde(flatten)]
    pub attribution: PnlAttribution,
}

impl AttributedGroup {
    pub fn fills(&self) -> impl Iterator<Item = &AttributedFill> {
        self.orders.values().flatten()
    }

    pub fn fill_count(&self) -> usize {
        self.orders.values().map(Vec::len).sum()
    }
}

/// Attribute every hedge fill of a group.
pub fn attribute_group(
    record: &HedgeGroupRecord,
    ticks: &TickStore,
    policy: OutOfRangePolicy,
) -> Result<(AttributedGroup, Vec<SkippedFill>), AnalysisError> {
    let mut orders: BTreeMap<String, Vec<AttributedFill>> = BTreeMap::new();
    let mut skipped = Vec::new();

    for fill in compact_hedge_fills(record)? {
        match attribute_fill(&fill, ticks) {
            Ok(attributed) => orders
                .entry(fill.order_id.clone())
                .or_default()
                .push(attributed),
            Err(e @ AnalysisError::OutOfRange { .. }) if policy == OutOfRangePolicy::SkipFill => {
                skipped.push(SkippedFill {
                    order_id: fill.order_id,
                    transaction_id: fill.transaction_id,
                    error: e,
                });
            }
            Err(e) => return Err(e),
        }
    }

    let attribution = PnlAttribution::compute(record.pnl.pnl_with_fee, orders.values().flatten());

    Ok((
        AttributedGroup {
            hg_id: record.id.clone(),
            pnl_with_fee: record.pnl.pnl_with_fee,
            is_win: record.is_win,
            orders,
            attribution,
        },
        skipped,
    ))
}
