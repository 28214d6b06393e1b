//! Hedge Latency Pattern Matcher
//!
//! Hedge latency is the time from the quote leg's strategy notification to
//! the hedge leg's exchange fill.
//!
//! # Matching Tiers
//!
//! 1. **Causal chain**: scan consecutive 4-event windows for the literal
//!    sequence `quote/strategy_notified_time`, `hedge/send_time_oms`,
//!    `hedge/live_time_exchange`, `hedge/exchange_fill_time`. The first
//!    matching window wins; later windows are not considered.
//! 2. **Fallback**: earliest hedge fill minus earliest quote notification.
//!    Interleaved orders can make this misleading; it is an approximation,
//!    reported as such through [`LatencyMethod`].
//!
//! A group with no quote notifications or no hedge fills has no latency.

use serde::{Deserialize, Serialize};

use super::error::AnalysisError;
use super::events::{
    Event, EventSequence, EXCHANGE_FILL_TIME, LIVE_TIME_EXCHANGE, SEND_TIME_OMS,
    STRATEGY_NOTIFIED_TIME,
};
use super::records::VenueRole;
use super::timestamps::{Nanos, NANOS_PER_MILLI, NANOS_PER_SEC};

/// The four steps of the quote-to-hedge causal chain, in order.
const CAUSAL_CHAIN: [(VenueRole, &str); 4] = [
    (VenueRole::Quote, STRATEGY_NOTIFIED_TIME),
    (VenueRole::Hedge, SEND_TIME_OMS),
    (VenueRole::Hedge, LIVE_TIME_EXCHANGE),
    (VenueRole::Hedge, EXCHANGE_FILL_TIME),
];

/// Which tier produced a latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyMethod {
    CausalChain,
    FirstQuoteToFirstFill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeLatency {
    pub latency_ns: Nanos,
    pub method: LatencyMethod,
    /// Quote notification the latency is measured from.
    pub quote_order_id: String,
    /// Hedge fill the latency is measured to.
    pub hedge_order_id: String,
}

impl HedgeLatency {
    pub fn as_secs_f64(&self) -> f64 {
        self.latency_ns as f64 / NANOS_PER_SEC as f64
    }

    pub fn as_millis_f64(&self) -> f64 {
        self.latency_ns as f64 / NANOS_PER_MILLI as f64
    }

    fn between(start: &Event, end: &Event, method: LatencyMethod) -> Self {
        Self {
            latency_ns: end.timestamp_ns - start.timestamp_ns,
            method,
            quote_order_id: start.order_id.clone(),
            hedge_order_id: end.order_id.clone(),
        }
    }
}

/// Compute the hedge latency of one group.
pub fn hedge_latency(sequence: &EventSequence) -> Result<HedgeLatency, AnalysisError> {
    let quote_notifications: Vec<&Event> = sequence
        .matching(VenueRole::Quote, STRATEGY_NOTIFIED_TIME)
        .collect();
    let hedge_fills: Vec<&Event> = sequence
        .matching(VenueRole::Hedge, EXCHANGE_FILL_TIME)
        .collect();

    let (first_quote, first_fill) = match (quote_notifications.first(), hedge_fills.first()) {
        (Some(q), Some(h)) => (*q, *h),
        _ => {
            return Err(AnalysisError::MissingEvents {
                group_id: sequence.group_id.clone(),
                quote_notifications: quote_notifications.len(),
                hedge_fills: hedge_fills.len(),
            })
        }
    };

    if let Some(window) = find_causal_chain(&sequence.events) {
        return Ok(HedgeLatency::between(
            &window[0],
            &window[3],
            LatencyMethod::CausalChain,
        ));
    }

    Ok(HedgeLatency::between(
        first_quote,
        first_fill,
        LatencyMethod::FirstQuoteToFirstFill,
    ))
}

/// First 4-event window that spells out the causal chain literally.
pub fn find_causal_chain(events: &[Event]) -> Option<&[Event]> {
    events.windows(CAUSAL_CHAIN.len()).find(|window| {
        window
            .iter()
            .zip(CAUSAL_CHAIN.iter())
            .all(|(event, (role, name))| event.is(*role, name))
    })
}
