//! Hedge Latency & Cost Attribution
//!
//! Offline analysis of hedge groups: a quote fill on one venue triggers a
//! hedge on another, and the time between the two costs money when the
//! reference price drifts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐          ┌──────────────────┐
//! │ ingest           │          │ ingest           │
//! │ (log / JSON)     │          │ (CSV / snapshot) │
//! └────────┬─────────┘          └────────┬─────────┘
//!          ▼                             ▼
//! ┌──────────────────┐          ┌──────────────────┐
//! │ HedgeGroupRecord │          │ TickStore        │
//! └────────┬─────────┘          │ (bid/ask interp) │
//!          │                    └────────┬─────────┘
//!    ┌─────┴──────────────┐              │
//!    ▼                    ▼              │
//! ┌──────────────┐  ┌──────────────┐     │
//! │ EventSequence│  │ HedgeFill    │◄────┘
//! └──────┬───────┘  │ attribution  │
//!        │          └──────┬───────┘
//!   ┌────┴─────┐           │
//!   ▼          ▼           ▼
//! latency  cancel→fill  AttributedGroup
//!   │          │           │
//!   └──────────┴─────┬─────┘
//!                    ▼
//!         ┌─────────────────────────┐
//!         │ pipeline::HedgeAnalysis │
//!         │ summary / correlation   │
//!         └─────────────────────────┘
//! ```
//!
//! # Time
//!
//! All timestamps are [`Nanos`] since the Unix epoch. ISO-8601 strings are
//! converted at the edges (`timestamps`).

pub mod attribution;
pub mod cancel_fill;
pub mod config;
pub mod correlation;
pub mod error;
pub mod events;
pub mod ingest;
pub mod latency;
pub mod pipeline;
pub mod records;
pub mod stats;
pub mod summary;
pub mod tick_store;
pub mod timestamps;
#[cfg(test)]
mod latency_tests;
#[cfg(test)]
mod tick_store_tests;

// Re-exports for convenience
pub use attribution::{
    attribute_fill, attribute_group, compact_hedge_fills, AttributedFill, AttributedGroup,
    HedgeFill, OutOfRangePolicy, SkippedFill, LONG_HORIZON_MS, SHORT_HORIZON_MS,
};
pub use cancel_fill::{cancel_fill_records, CancelFillRecord, CancelFillReport};
pub use config::{AnalysisConfig, AttributionConfig, InputConfig, ReportConfig};
pub use correlation::{
    latency_pnl_correlation, pearson, CorrelationOutcome, LatencyPnlPoint, PearsonResult,
};
pub use error::AnalysisError;
pub use events::{Event, EventSequence, TimelineEntry};
pub use ingest::{load_groups, load_ticks, LoadedGroups, TickSnapshot};
pub use latency::{hedge_latency, HedgeLatency, LatencyMethod};
pub use pipeline::{
    write_attributed_groups, AnalysisReport, FailureStage, GroupAnalysis, GroupFailure,
    HedgeAnalysis,
};
pub use records::{HedgeGroupRecord, OrderRecord, OrderSide, VenueRole};
pub use stats::DistributionStats;
pub use summary::{GroupSummary, PnlAttribution, SummaryReport};
pub use tick_store::{PriceSide, TickSeries, TickStore};
pub use timestamps::{Nanos, NANOS_PER_MILLI, NANOS_PER_SEC};
