//! Cancel-to-Fill Durations
//!
//! For orders that were asked to cancel and still filled, measure how long
//! the fill arrived after the cancel request. Split by winning vs. losing
//! hedge groups to see whether slow cancels cost money.

use serde::Serialize;

use super::events::{EventSequence, CANCEL_TIME, EXCHANGE_FILL_TIME};
use super::stats::DistributionStats;
use super::timestamps::{diff_millis_f64, serialize_iso8601, Nanos};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelFillRecord {
    pub hedge_group_id: String,
    pub order_id: String,
    #[serde(serialize_with = "serialize_iso8601")]
    pub cancel_time: Nanos,
    #[serde(serialize_with = "serialize_iso8601")]
    pub fill_time: Nanos,
    pub duration_ms: f64,
    pub is_win: bool,
}

/// One record per order with a cancel followed by a fill.
///
/// Uses the order's earliest cancel and the earliest fill strictly after it.
pub fn cancel_fill_records(sequence: &EventSequence, is_win: bool) -> Vec<CancelFillRecord> {
    let mut order_ids: Vec<&str> = Vec::new();
    for event in sequence {
        if !order_ids.contains(&event.order_id.as_str()) {
            order_ids.push(&event.order_id);
        }
    }

    order_ids
        .into_iter()
        .filter_map(|order_id| {
            // Sequence is time-ordered, so the first hit is the earliest.
            let cancel = sequence
                .for_order(order_id)
                .find(|e| e.name.contains(CANCEL_TIME))?;
            let fill = sequence
                .for_order(order_id)
                .find(|e| e.name.contains(EXCHANGE_FILL_TIME) && e.timestamp_ns > cancel.timestamp_ns)?;

            Some(CancelFillRecord {
                hedge_group_id: sequence.group_id.clone(),
                order_id: order_id.to_string(),
                cancel_time: cancel.timestamp_ns,
                fill_time: fill.timestamp_ns,
                duration_ms: diff_millis_f64(cancel.timestamp_ns, fill.timestamp_ns),
                is_win,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanComparison {
    pub win_mean_ms: f64,
    pub loss_mean_ms: f64,
    pub difference_ms: f64,
    /// Relative to the winning mean; `None` when that mean is not positive.
    pub difference_pct: Option<f64>,
}

impl MeanComparison {
    pub fn losses_slower(&self) -> bool {
        self.loss_mean_ms > self.win_mean_ms
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelFillReport {
    pub records: Vec<CancelFillRecord>,
    pub all: Option<DistributionStats>,
    pub wins: Option<DistributionStats>,
    pub losses: Option<DistributionStats>,
    pub comparison: Option<MeanComparison>,
}

impl CancelFillReport {
    pub fn build(records: Vec<CancelFillRecord>) -> Self {
        let durations = |pred: &dyn Fn(&CancelFillRecord) -> bool| -> Vec<f64> {
            records.iter().filter(|r| pred(r)).map(|r| r.duration_ms).collect()
        };

        let all = DistributionStats::from_values(&durations(&|_| true));
        let wins = DistributionStats::from_values(&durations(&|r| r.is_win));
        let losses = DistributionStats::from_values(&durations(&|r| !r.is_win));

        let comparison = match (&wins, &losses) {
            (Some(w), Some(l)) => Some(MeanComparison {
                win_mean_ms: w.mean,
                loss_mean_ms: l.mean,
                difference_ms: l.mean - w.mean,
                difference_pct: (w.mean > 0.0).then(|| (l.mean - w.mean) / w.mean * 100.0),
            }),
            _ => None,
        };

        Self {
            records,
            all,
            wins,
            losses,
            comparison,
        }
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }
}
