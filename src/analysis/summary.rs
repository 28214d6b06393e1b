//! Group Aggregation
//!
//! Per-group P&L attribution totals and the cross-group summary: win ratios,
//! column totals, and the worst losing groups.

use serde::{Deserialize, Serialize};

use super::attribution::AttributedFill;
use super::records::{HedgeGroupRecord, VenueRole};

// =============================================================================
// PER-GROUP ATTRIBUTION
// =============================================================================

/// P&L a group would have realized had every hedge filled at the +20ms mid.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PnlAttribution {
    pub total_pnl_change: f64,
    pub expected_pnl: f64,
    pub turn_positive: bool,
}

impl PnlAttribution {
    /// Pure function of its inputs; recomputing never accumulates.
    pub fn compute<'a>(pnl_with_fee: f64, fills: impl IntoIterator<Item = &'a AttributedFill>) -> Self {
        let total_pnl_change: f64 = fills.into_iter().map(|f| f.pnl_change).sum();
        let expected_pnl = pnl_with_fee + total_pnl_change;
        Self {
            total_pnl_change,
            expected_pnl,
            turn_positive: expected_pnl > 0.0,
        }
    }
}

// =============================================================================
// SUMMARY ROWS
// =============================================================================

/// One row of the hedge group summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub id: String,
    pub short_id: String,
    pub duration_ms: f64,
    pub is_win: bool,
    pub pnl_with_fee: f64,
    pub pnl_without_fee: f64,
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub total_fee: f64,
    pub n_quote: usize,
    pub n_hedge: usize,
    pub quote_qty: f64,
    pub hedge_qty: f64,
}

impl GroupSummary {
    pub fn from_record(record: &HedgeGroupRecord) -> Self {
        let role_stats = |role: VenueRole| {
            record
                .orders_with_role(role)
                .fold((0usize, 0.0f64), |(n, qty), o| (n + 1, qty + o.filled_quantity))
        };
        let (n_quote, quote_qty) = role_stats(VenueRole::Quote);
        let (n_hedge, hedge_qty) = role_stats(VenueRole::Hedge);

        Self {
            id: record.id.clone(),
            short_id: record.short_id().to_string(),
            duration_ms: record.duration_us as f64 / 1000.0,
            is_win: record.is_win,
            pnl_with_fee: record.pnl.pnl_with_fee,
            pnl_without_fee: record.pnl.pnl_without_fee,
            maker_fee: record.pnl.maker_fee,
            taker_fee: record.pnl.taker_fee,
            total_fee: record.pnl.total_fee,
            n_quote,
            n_hedge,
            quote_qty,
            hedge_qty,
        }
    }
}

/// Overall verdict of the summed P&L.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Win,
    Loss,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SummaryTotals {
    pub pnl_with_fee: f64,
    pub pnl_without_fee: f64,
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub total_fee: f64,
    pub n_quote: usize,
    pub n_hedge: usize,
    pub quote_qty: f64,
    pub hedge_qty: f64,
}

impl SummaryTotals {
    pub fn from_rows(rows: &[GroupSummary]) -> Self {
        rows.iter().fold(Self::default(), |mut t, r| {
            t.pnl_with_fee += r.pnl_with_fee;
            t.pnl_without_fee += r.pnl_without_fee;
            t.maker_fee += r.maker_fee;
            t.taker_fee += r.taker_fee;
            t.total_fee += r.total_fee;
            t.n_quote += r.n_quote;
            t.n_hedge += r.n_hedge;
            t.quote_qty += r.quote_qty;
            t.hedge_qty += r.hedge_qty;
            t
        })
    }

    pub fn verdict(&self) -> Verdict {
        if self.pnl_with_fee > 0.0 {
            Verdict::Win
        } else if self.pnl_with_fee < 0.0 {
            Verdict::Loss
        } else {
            Verdict::Flat
        }
    }
}

// =============================================================================
// CROSS-GROUP METRICS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WinRatios {
    /// wins / total
    pub win_ratio: f64,
    /// winning P&L / (winning P&L + |losing P&L|)
    pub normalized_win_ratio: f64,
}

pub fn win_ratios(rows: &[GroupSummary]) -> WinRatios {
    if rows.is_empty() {
        return WinRatios::default();
    }

    let wins = rows.iter().filter(|r| r.is_win).count();
    let win_pnl: f64 = rows.iter().filter(|r| r.is_win).map(|r| r.pnl_with_fee).sum();
    let loss_pnl: f64 = rows
        .iter()
        .filter(|r| !r.is_win)
        .map(|r| r.pnl_with_fee)
        .sum::<f64>()
        .abs();

    let total_abs = win_pnl + loss_pnl;
    WinRatios {
        win_ratio: wins as f64 / rows.len() as f64,
        normalized_win_ratio: if total_abs > 0.0 { win_pnl / total_abs } else { 0.0 },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossEntry {
    pub rank: usize,
    pub id: String,
    pub short_id: String,
    pub pnl_with_fee: f64,
    /// Share of the summed loss across all losing groups.
    pub relative_loss: f64,
}

/// The `n` worst losing groups, most negative first. Ties keep input order.
pub fn top_losses(rows: &[GroupSummary], n: usize) -> Vec<LossEntry> {
    let mut losses: Vec<&GroupSummary> = rows.iter().filter(|r| !r.is_win).collect();
    losses.sort_by(|a, b| {
        a.pnl_with_fee
            .partial_cmp(&b.pnl_with_fee)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let total_loss = losses.iter().map(|r| r.pnl_with_fee).sum::<f64>().abs();

    losses
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, r)| LossEntry {
            rank: i + 1,
            id: r.id.clone(),
            short_id: r.short_id.clone(),
            pnl_with_fee: r.pnl_with_fee,
            relative_loss: if total_loss > 0.0 {
                r.pnl_with_fee.abs() / total_loss
            } else {
                0.0
            },
        })
        .collect()
}

/// Everything the summary table needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub rows: Vec<GroupSummary>,
    pub totals: SummaryTotals,
    pub verdict: Verdict,
    pub ratios: WinRatios,
    pub top_losses: Vec<LossEntry>,
}

impl SummaryReport {
    pub fn build(rows: Vec<GroupSummary>, top_n: usize) -> Self {
        let totals = SummaryTotals::from_rows(&rows);
        Self {
            verdict: totals.verdict(),
            ratios: win_ratios(&rows),
            top_losses: top_losses(&rows, top_n),
            totals,
            rows,
        }
    }

    pub fn group_count(&self) -> usize {
        self.rows.len()
    }
}
