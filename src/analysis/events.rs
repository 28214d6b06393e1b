//! Event Extractor
//!
//! Flattens one hedge group into a single time-ordered list of lifecycle
//! events. Each order contributes its applicable lifecycle stamps, and each
//! fill contributes three events numbered per order:
//! `exchange_fill_time_<k>`, `infra_notified_time_<k>`,
//! `strategy_notified_time_<k>` (k is 1-based, in fill-list order).
//!
//! Events are sorted ascending by timestamp with a stable sort, so events
//! sharing a timestamp keep extraction order (orders in document order,
//! lifecycle stamps before fills).

use serde::Serialize;

use super::records::{HedgeGroupRecord, VenueRole};
use super::timestamps::Nanos;

pub const EXCHANGE_FILL_TIME: &str = "exchange_fill_time";
pub const INFRA_NOTIFIED_TIME: &str = "infra_notified_time";
pub const STRATEGY_NOTIFIED_TIME: &str = "strategy_notified_time";
pub const SEND_TIME_OMS: &str = "send_time_oms";
pub const LIVE_TIME_EXCHANGE: &str = "live_time_exchange";
pub const CANCEL_TIME: &str = "cancel_time";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub timestamp_ns: Nanos,
    pub order_id: String,
    pub name: String,
    pub venue_role: VenueRole,
}

impl Event {
    /// Role check plus substring match on the event name.
    #[inline]
    pub fn is(&self, role: VenueRole, name_fragment: &str) -> bool {
        self.venue_role == role && self.name.contains(name_fragment)
    }
}

/// Time-ordered events of one hedge group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventSequence {
    pub group_id: String,
    pub events: Vec<Event>,
}

/// An event together with the gap since the previous event in the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry<'a> {
    pub event: &'a Event,
    pub since_previous_ns: Option<Nanos>,
    /// 1-based index of the order within its venue role, in first-seen order.
    pub role_index: usize,
}

impl EventSequence {
    pub fn extract(record: &HedgeGroupRecord) -> Self {
        let capacity = record
            .orders
            .iter()
            .map(|o| o.lifecycle.len() + 3 * o.fills.len())
            .sum();
        let mut events = Vec::with_capacity(capacity);

        for order in &record.orders {
            for stamp in &order.lifecycle {
                events.push(Event {
                    timestamp_ns: stamp.timestamp_ns,
                    order_id: order.order_id.clone(),
                    name: stamp.name.clone(),
                    venue_role: order.venue_role,
                });
            }

            for (i, fill) in order.fills.iter().enumerate() {
                let k = i + 1;
                for (name, ts) in [
                    (EXCHANGE_FILL_TIME, fill.exchange_fill_time),
                    (INFRA_NOTIFIED_TIME, fill.infra_notified_time),
                    (STRATEGY_NOTIFIED_TIME, fill.strategy_notified_time),
                ] {
                    events.push(Event {
                        timestamp_ns: ts,
                        order_id: order.order_id.clone(),
                        name: format!("{}_{}", name, k),
                        venue_role: order.venue_role,
                    });
                }
            }
        }

        events.sort_by_key(|e| e.timestamp_ns);

        Self {
            group_id: record.id.clone(),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Events matching a role and name fragment, in sequence order.
    pub fn matching<'a>(
        &'a self,
        role: VenueRole,
        name_fragment: &'a str,
    ) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| e.is(role, name_fragment))
    }

    /// Events of one order, in sequence order.
    pub fn for_order<'a>(&'a self, order_id: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| e.order_id == order_id)
    }

    /// Per-event gaps, the raw material of the duration report.
    pub fn timeline(&self) -> Vec<TimelineEntry<'_>> {
        let mut quote_ids: Vec<&str> = Vec::new();
        let mut hedge_ids: Vec<&str> = Vec::new();
        let mut reference_ids: Vec<&str> = Vec::new();
        let mut previous: Option<Nanos> = None;

        self.events
            .iter()
            .map(|event| {
                let ids = match event.venue_role {
                    VenueRole::Quote => &mut quote_ids,
                    VenueRole::Hedge => &mut hedge_ids,
                    VenueRole::Reference => &mut reference_ids,
                };
                let role_index = match ids.iter().position(|id| *id == event.order_id) {
                    Some(pos) => pos + 1,
                    None => {
                        ids.push(&event.order_id);
                        ids.len()
                    }
                };

                let entry = TimelineEntry {
                    event,
                    since_previous_ns: previous.map(|p| event.timestamp_ns - p),
                    role_index,
                };
                previous = Some(event.timestamp_ns);
                entry
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a EventSequence {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::records::{FillRecord, LifecycleStamp, OrderRecord, OrderSide, PnlBreakdown};

    fn stamp(name: &str, ts: Nanos) -> LifecycleStamp {
        LifecycleStamp {
            name: name.to_string(),
            timestamp_ns: ts,
        }
    }

    fn fill(ts: Nanos) -> FillRecord {
        FillRecord {
            transaction_id: format!("tx{}", ts),
            price: 100.0,
            quantity: 1.0,
            exchange_fill_time: ts,
            infra_notified_time: ts + 10,
            strategy_notified_time: ts + 20,
        }
    }

    fn group(orders: Vec<OrderRecord>) -> HedgeGroupRecord {
        HedgeGroupRecord {
            id: "hg_0_1".to_string(),
            duration_us: 0,
            pnl: PnlBreakdown::default(),
            is_win: false,
            orders,
        }
    }

    fn order(id: &str, role: VenueRole, lifecycle: Vec<LifecycleStamp>, fills: Vec<FillRecord>) -> OrderRecord {
        OrderRecord {
            order_id: id.to_string(),
            venue_role: role,
            side: OrderSide::Buy,
            filled_quantity: 0.0,
            lifecycle,
            fills,
        }
    }

    #[test]
    fn test_fill_events_numbered_per_order() {
        let record = group(vec![
            order("q", VenueRole::Quote, vec![stamp("send_time_oms", 0)], vec![fill(100), fill(200)]),
            order("h", VenueRole::Hedge, vec![], vec![fill(300)]),
        ]);
        let seq = EventSequence::extract(&record);

        assert_eq!(seq.len(), 1 + 3 * 3);
        let names: Vec<&str> = seq.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "send_time_oms",
                "exchange_fill_time_1",
                "infra_notified_time_1",
                "strategy_notified_time_1",
                "exchange_fill_time_2",
                "infra_notified_time_2",
                "strategy_notified_time_2",
                "exchange_fill_time_1",
                "infra_notified_time_1",
                "strategy_notified_time_1",
            ]
        );
        assert_eq!(seq.events[7].order_id, "h");
    }

    #[test]
    fn test_sorted_ascending_and_stable_on_ties() {
        let record = group(vec![
            order("a", VenueRole::Quote, vec![stamp("send_time_oms", 50), stamp("live_time_exchange", 10)], vec![]),
            order("b", VenueRole::Hedge, vec![stamp("send_time_oms", 10)], vec![]),
        ]);
        let seq = EventSequence::extract(&record);

        let ts: Vec<Nanos> = seq.iter().map(|e| e.timestamp_ns).collect();
        assert_eq!(ts, vec![10, 10, 50]);
        // Tie at 10: order "a" was extracted first.
        assert_eq!(seq.events[0].order_id, "a");
        assert_eq!(seq.events[1].order_id, "b");

        // Deterministic across runs.
        assert_eq!(seq, EventSequence::extract(&record));
    }

    #[test]
    fn test_timeline_gaps_and_role_indices() {
        let record = group(vec![
            order("q1", VenueRole::Quote, vec![stamp("send_time_oms", 0)], vec![]),
            order("h1", VenueRole::Hedge, vec![stamp("send_time_oms", 5)], vec![]),
            order("h2", VenueRole::Hedge, vec![stamp("send_time_oms", 12)], vec![]),
        ]);
        let seq = EventSequence::extract(&record);
        let timeline = seq.timeline();

        assert_eq!(timeline[0].since_previous_ns, None);
        assert_eq!(timeline[1].since_previous_ns, Some(5));
        assert_eq!(timeline[2].since_previous_ns, Some(7));
        assert_eq!(timeline[0].role_index, 1);
        assert_eq!(timeline[1].role_index, 1);
        assert_eq!(timeline[2].role_index, 2);
    }
}
