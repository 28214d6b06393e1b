//! Analysis error taxonomy.
//!
//! Every variant is scoped to a single fill or hedge group. Callers decide
//! whether to skip the affected item; none of these abort a whole run.

use super::tick_store::PriceSide;
use super::timestamps::Nanos;

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Timestamp outside the loaded tick coverage. Never extrapolated.
    OutOfRange {
        side: PriceSide,
        timestamp_ns: Nanos,
        first_ns: Option<Nanos>,
        last_ns: Option<Nanos>,
    },
    /// Pattern matcher is missing quote notifications or hedge fills.
    MissingEvents {
        group_id: String,
        quote_notifications: usize,
        hedge_fills: usize,
    },
    /// A value was present but could not be parsed.
    Parse {
        context: String,
        value: String,
        reason: String,
    },
    /// A record is missing a required key or violates a structural invariant.
    Schema { context: String, message: String },
}

impl AnalysisError {
    pub fn schema(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Prefix the context of parse/schema errors with an enclosing location.
    pub fn within(self, outer: &str) -> Self {
        match self {
            Self::Parse {
                context,
                value,
                reason,
            } => Self::Parse {
                context: format!("{}.{}", outer, context),
                value,
                reason,
            },
            Self::Schema { context, message } => Self::Schema {
                context: format!("{}.{}", outer, context),
                message,
            },
            other => other,
        }
    }

    /// Short machine-friendly label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => "out_of_range",
            Self::MissingEvents { .. } => "missing_events",
            Self::Parse { .. } => "parse",
            Self::Schema { .. } => "schema",
        }
    }
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange {
                side,
                timestamp_ns,
                first_ns,
                last_ns,
            } => match (first_ns, last_ns) {
                (Some(first), Some(last)) => write!(
                    f,
                    "Cannot interpolate {} price at {}: coverage is [{}, {}]",
                    side, timestamp_ns, first, last
                ),
                _ => write!(
                    f,
                    "Cannot interpolate {} price at {}: no ticks loaded",
                    side, timestamp_ns
                ),
            },
            Self::MissingEvents {
                group_id,
                quote_notifications,
                hedge_fills,
            } => write!(
                f,
                "Hedge group {} is missing quote notifications or hedge fills \
                 (quote notifications: {}, hedge fills: {})",
                group_id, quote_notifications, hedge_fills
            ),
            Self::Parse {
                context,
                value,
                reason,
            } => write!(f, "Failed to parse {} from {:?}: {}", context, value, reason),
            Self::Schema { context, message } => {
                write!(f, "Schema violation at {}: {}", context, message)
            }
        }
    }
}

impl std::error::Error for AnalysisError {}
