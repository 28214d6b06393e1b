//! Hedge Latency Matcher Tests
//!
//! The causal chain must appear as four adjacent events; anything else falls
//! back to first quote notification to first hedge fill. Cases where the two
//! tiers disagree are pinned here so a change in matching is visible.

use crate::analysis::error::AnalysisError;
use crate::analysis::events::{Event, EventSequence};
use crate::analysis::latency::{find_causal_chain, hedge_latency, LatencyMethod};
use crate::analysis::records::VenueRole;
use crate::analysis::timestamps::{Nanos, NANOS_PER_MILLI};

fn ev(ts: Nanos, order: &str, name: &str, role: VenueRole) -> Event {
    Event {
        timestamp_ns: ts,
        order_id: order.to_string(),
        name: name.to_string(),
        venue_role: role,
    }
}

fn quote(ts: Nanos, order: &str, name: &str) -> Event {
    ev(ts, order, name, VenueRole::Quote)
}

fn hedge(ts: Nanos, order: &str, name: &str) -> Event {
    ev(ts, order, name, VenueRole::Hedge)
}

fn seq(events: Vec<Event>) -> EventSequence {
    EventSequence {
        group_id: "hg_0_1".to_string(),
        events,
    }
}

// =============================================================================
// CAUSAL CHAIN
// =============================================================================

#[test]
fn test_adjacent_chain_measured_end_to_end() {
    let s = seq(vec![
        quote(0, "q", "send_time_oms"),
        quote(10, "q", "exchange_fill_time_1"),
        quote(20, "q", "strategy_notified_time_1"),
        hedge(30, "h", "send_time_oms"),
        hedge(45, "h", "live_time_exchange"),
        hedge(70, "h", "exchange_fill_time_1"),
        hedge(80, "h", "strategy_notified_time_1"),
    ]);

    let latency = hedge_latency(&s).unwrap();
    assert_eq!(latency.method, LatencyMethod::CausalChain);
    assert_eq!(latency.latency_ns, 50);
    assert_eq!(latency.quote_order_id, "q");
    assert_eq!(latency.hedge_order_id, "h");
}

#[test]
fn test_first_matching_window_wins() {
    let s = seq(vec![
        quote(0, "q1", "strategy_notified_time_1"),
        hedge(10, "h1", "send_time_oms"),
        hedge(20, "h1", "live_time_exchange"),
        hedge(30, "h1", "exchange_fill_time_1"),
        quote(100, "q2", "strategy_notified_time_1"),
        hedge(110, "h2", "send_time_oms"),
        hedge(120, "h2", "live_time_exchange"),
        hedge(300, "h2", "exchange_fill_time_1"),
    ]);

    let latency = hedge_latency(&s).unwrap();
    assert_eq!(latency.method, LatencyMethod::CausalChain);
    assert_eq!(latency.latency_ns, 30);
    assert_eq!(latency.hedge_order_id, "h1");
}

#[test]
fn test_chain_roles_must_match() {
    // Right names, but the notification comes from a hedge order.
    let events = vec![
        hedge(0, "h0", "strategy_notified_time_1"),
        hedge(10, "h1", "send_time_oms"),
        hedge(20, "h1", "live_time_exchange"),
        hedge(30, "h1", "exchange_fill_time_1"),
    ];
    assert!(find_causal_chain(&events).is_none());
}

// =============================================================================
// FALLBACK
// =============================================================================

#[test]
fn test_fallback_without_adjacent_chain() {
    let s = seq(vec![
        quote(0, "q", "strategy_notified_time_1"),
        hedge(100, "h", "send_time_oms"),
        hedge(500, "h", "exchange_fill_time_1"),
    ]);

    let latency = hedge_latency(&s).unwrap();
    assert_eq!(latency.method, LatencyMethod::FirstQuoteToFirstFill);
    assert_eq!(latency.latency_ns, 500);
}

#[test]
fn test_interleaved_event_breaks_chain() {
    let s = seq(vec![
        quote(0, "q", "strategy_notified_time_1"),
        hedge(10, "h", "send_time_oms"),
        quote(15, "q", "infra_notified_time_2"),
        hedge(20, "h", "live_time_exchange"),
        hedge(40, "h", "exchange_fill_time_1"),
    ]);

    let latency = hedge_latency(&s).unwrap();
    assert_eq!(latency.method, LatencyMethod::FirstQuoteToFirstFill);
    assert_eq!(latency.latency_ns, 40);
}

/// The tiers disagree: an earlier hedge fill precedes the only complete
/// chain. The chain result is kept.
#[test]
fn test_tiers_diverge_chain_preferred() {
    let s = seq(vec![
        quote(0, "q1", "strategy_notified_time_1"),
        hedge(5 * NANOS_PER_MILLI, "h0", "exchange_fill_time_1"),
        quote(10 * NANOS_PER_MILLI, "q2", "strategy_notified_time_1"),
        hedge(11 * NANOS_PER_MILLI, "h1", "send_time_oms"),
        hedge(12 * NANOS_PER_MILLI, "h1", "live_time_exchange"),
        hedge(19 * NANOS_PER_MILLI, "h1", "exchange_fill_time_1"),
    ]);

    let latency = hedge_latency(&s).unwrap();
    assert_eq!(latency.method, LatencyMethod::CausalChain);
    assert_eq!(latency.latency_ns, 9 * NANOS_PER_MILLI);
    assert!((latency.as_millis_f64() - 9.0).abs() < 1e-12);

    // The fallback alone would have reported 5ms from q1 to h0.
    let first_quote = s.matching(VenueRole::Quote, "strategy_notified_time").next().unwrap();
    let first_fill = s.matching(VenueRole::Hedge, "exchange_fill_time").next().unwrap();
    assert_eq!(first_fill.timestamp_ns - first_quote.timestamp_ns, 5 * NANOS_PER_MILLI);
}

#[test]
fn test_fallback_may_be_negative() {
    // Hedge filled before the quote notification arrived.
    let s = seq(vec![
        hedge(0, "h", "exchange_fill_time_1"),
        quote(30, "q", "strategy_notified_time_1"),
    ]);
    let latency = hedge_latency(&s).unwrap();
    assert_eq!(latency.method, LatencyMethod::FirstQuoteToFirstFill);
    assert_eq!(latency.latency_ns, -30);
}

// =============================================================================
// MISSING EVENTS
// =============================================================================

#[test]
fn test_missing_hedge_fill() {
    let s = seq(vec![
        quote(0, "q", "strategy_notified_time_1"),
        hedge(10, "h", "send_time_oms"),
    ]);
    match hedge_latency(&s) {
        Err(AnalysisError::MissingEvents {
            group_id,
            quote_notifications,
            hedge_fills,
        }) => {
            assert_eq!(group_id, "hg_0_1");
            assert_eq!(quote_notifications, 1);
            assert_eq!(hedge_fills, 0);
        }
        other => panic!("expected MissingEvents, got {:?}", other),
    }
}

#[test]
fn test_empty_sequence_missing_events() {
    let err = hedge_latency(&seq(Vec::new())).unwrap_err();
    assert_eq!(err.kind(), "missing_events");
}
