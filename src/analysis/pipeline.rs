//! Per-group orchestration
//!
//! ```text
//!   HedgeGroupRecord ──► EventSequence ──► HedgeLatency ──┐
//!          │                   │                          ├──► AnalysisReport
//!          │                   └──► CancelFillRecord ─────┤
//!          └──(TickStore)──► AttributedGroup ─────────────┘
//! ```
//!
//! Every group runs end-to-end on its own. A failing stage is recorded as a
//! [`GroupFailure`] and the group keeps whatever the other stages produced.
//! With `parallel` enabled groups fan out over rayon; the tick store is shared
//! read-only and output order always matches input order.

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use super::attribution::{attribute_group, AttributedGroup, SkippedFill};
use super::cancel_fill::{cancel_fill_records, CancelFillReport};
use super::config::AnalysisConfig;
use super::correlation::{latency_pnl_correlation, CorrelationOutcome, LatencyPnlPoint};
use super::error::AnalysisError;
use super::events::EventSequence;
use super::ingest::LoadedGroups;
use super::latency::{hedge_latency, HedgeLatency};
use super::records::HedgeGroupRecord;
use super::summary::{GroupSummary, SummaryReport};
use super::tick_store::TickStore;

// =============================================================================
// FAILURES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Parse,
    Latency,
    Attribution,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Parse => "parse",
            Self::Latency => "latency",
            Self::Attribution => "attribution",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupFailure {
    pub group_id: String,
    pub stage: FailureStage,
    #[serde(serialize_with = "serialize_display")]
    pub reason: AnalysisError,
}

fn serialize_display<S: Serializer>(error: &AnalysisError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

// =============================================================================
// RESULTS
// =============================================================================

/// Everything computed for one hedge group.
#[derive(Debug, Clone)]
pub struct GroupAnalysis {
    pub summary: GroupSummary,
    pub events: EventSequence,
    pub latency: Option<HedgeLatency>,
    /// `None` without ticks or when attribution failed.
    pub attributed: Option<AttributedGroup>,
    pub skipped_fills: Vec<SkippedFill>,
}

impl GroupAnalysis {
    pub fn id(&self) -> &str {
        &self.summary.id
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Input order.
    pub groups: Vec<GroupAnalysis>,
    pub failures: Vec<GroupFailure>,
    pub summary: SummaryReport,
    pub correlation: CorrelationOutcome,
    pub loss_correlation: CorrelationOutcome,
    pub cancel_fill: CancelFillReport,
}

impl AnalysisReport {
    pub fn group(&self, id: &str) -> Option<&GroupAnalysis> {
        self.groups
            .iter()
            .find(|g| g.id() == id || g.summary.short_id == id)
    }

    pub fn attributed_groups(&self) -> impl Iterator<Item = &AttributedGroup> {
        self.groups.iter().filter_map(|g| g.attributed.as_ref())
    }

    pub fn skipped_fill_count(&self) -> usize {
        self.groups.iter().map(|g| g.skipped_fills.len()).sum()
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

pub struct HedgeAnalysis {
    config: AnalysisConfig,
}

impl HedgeAnalysis {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze loaded groups, carrying over their ingest failures.
    pub fn run_loaded(&self, loaded: LoadedGroups, ticks: Option<&TickStore>) -> AnalysisReport {
        let mut report = self.run(&loaded.records, ticks);
        let mut failures = loaded.failures;
        failures.append(&mut report.failures);
        report.failures = failures;
        report
    }

    pub fn run(&self, records: &[HedgeGroupRecord], ticks: Option<&TickStore>) -> AnalysisReport {
        let start = Instant::now();

        let outcomes: Vec<(GroupAnalysis, Vec<GroupFailure>)> = if self.config.parallel {
            records
                .par_iter()
                .map(|record| self.analyze_group(record, ticks))
                .collect()
        } else {
            records
                .iter()
                .map(|record| self.analyze_group(record, ticks))
                .collect()
        };

        let mut groups = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (group, mut group_failures) in outcomes {
            groups.push(group);
            failures.append(&mut group_failures);
        }

        let report = self.aggregate(groups, failures);
        info!(
            "Analyzed {} hedge groups in {:?} ({} failures, {} attributed)",
            report.groups.len(),
            start.elapsed(),
            report.failures.len(),
            report.attributed_groups().count()
        );
        report
    }

    /// Run every stage for one group; never aborts on a stage failure.
    pub fn analyze_group(
        &self,
        record: &HedgeGroupRecord,
        ticks: Option<&TickStore>,
    ) -> (GroupAnalysis, Vec<GroupFailure>) {
        let mut failures = Vec::new();
        let mut fail = |stage: FailureStage, reason: AnalysisError| {
            warn!("Hedge group {} failed at {}: {}", record.id, stage, reason);
            failures.push(GroupFailure {
                group_id: record.id.clone(),
                stage,
                reason,
            });
        };

        let events = EventSequence::extract(record);

        let latency = match hedge_latency(&events) {
            Ok(latency) => Some(latency),
            Err(e) => {
                fail(FailureStage::Latency, e);
                None
            }
        };

        let (attributed, skipped_fills) = match ticks {
            Some(ticks) => match attribute_group(record, ticks, self.config.attribution.out_of_range) {
                Ok((group, skipped)) => {
                    for s in &skipped {
                        debug!(
                            "Skipped fill {} of order {} in {}: {}",
                            s.transaction_id, s.order_id, record.id, s.error
                        );
                    }
                    (Some(group), skipped)
                }
                Err(e) => {
                    fail(FailureStage::Attribution, e);
                    (None, Vec::new())
                }
            },
            None => (None, Vec::new()),
        };

        let analysis = GroupAnalysis {
            summary: GroupSummary::from_record(record),
            events,
            latency,
            attributed,
            skipped_fills,
        };
        (analysis, failures)
    }

    fn aggregate(&self, groups: Vec<GroupAnalysis>, failures: Vec<GroupFailure>) -> AnalysisReport {
        let rows: Vec<GroupSummary> = groups.iter().map(|g| g.summary.clone()).collect();
        let summary = SummaryReport::build(rows, self.config.report.top_losses);

        let points: Vec<LatencyPnlPoint> = groups
            .iter()
            .filter_map(|g| {
                g.latency.as_ref().map(|latency| LatencyPnlPoint {
                    group_id: g.summary.id.clone(),
                    latency_secs: latency.as_secs_f64(),
                    pnl_with_fee: g.summary.pnl_with_fee,
                    is_win: g.summary.is_win,
                })
            })
            .collect();

        let cancel_fill = CancelFillReport::build(
            groups
                .iter()
                .flat_map(|g| cancel_fill_records(&g.events, g.summary.is_win))
                .collect(),
        );

        AnalysisReport {
            correlation: latency_pnl_correlation(&points, false),
            loss_correlation: latency_pnl_correlation(&points, true),
            summary,
            cancel_fill,
            groups,
            failures,
        }
    }
}

/// Write attributed groups as a pretty-printed JSON array.
pub fn write_attributed_groups<'a>(
    path: &Path,
    groups: impl IntoIterator<Item = &'a AttributedGroup>,
) -> anyhow::Result<usize> {
    let groups: Vec<&AttributedGroup> = groups.into_iter().collect();
    let json = serde_json::to_string_pretty(&groups).context("Failed to serialize attributed groups")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(groups.len())
}
