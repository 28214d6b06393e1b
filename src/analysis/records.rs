//! Hedge Group Records
//!
//! Validated, strongly-typed view of one `hedge_group_analysis` record.
//! Raw JSON is checked once here; missing keys become
//! [`AnalysisError::Schema`] and unparseable values become
//! [`AnalysisError::Parse`]. Everything downstream works on these types.
//!
//! Record layout:
//!
//! ```text
//! { id, duration_us, pnl: { pnl_with_fee, pnl_without_fee, maker_fee, taker_fee, total_fee },
//!   orders: { <order_id>: { venue_role, side, filled_quantity,
//!                           events: { <name>: <iso8601 | "N/A"> },
//!                           fills: [ { transaction_id, price, quantity,
//!                                      exchange_fill_time, infra_notified_time,
//!                                      strategy_notified_time } ] } } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::AnalysisError;
use super::timestamps::{parse_iso8601, Nanos};

/// Sentinel the producer writes for lifecycle steps that never happened.
pub const DEFAULT_NOT_APPLICABLE: &str = "N/A";

// =============================================================================
// ENUMS
// =============================================================================

/// Leg of the hedge group an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueRole {
    Quote,
    Hedge,
    Reference,
}

impl VenueRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "quote" => Some(Self::Quote),
            "hedge" => Some(Self::Hedge),
            "reference" => Some(Self::Reference),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Hedge => "hedge",
            Self::Reference => "reference",
        }
    }
}

impl std::fmt::Display for VenueRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }
}

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlBreakdown {
    pub pnl_with_fee: f64,
    pub pnl_without_fee: f64,
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub total_fee: f64,
}

/// A named order-lifecycle timestamp (`send_time_oms`, `cancel_time_oms`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleStamp {
    pub name: String,
    pub timestamp_ns: Nanos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillRecord {
    pub transaction_id: String,
    pub price: f64,
    pub quantity: f64,
    pub exchange_fill_time: Nanos,
    pub infra_notified_time: Nanos,
    pub strategy_notified_time: Nanos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub order_id: String,
    pub venue_role: VenueRole,
    pub side: OrderSide,
    pub filled_quantity: f64,
    /// Applicable lifecycle stamps in document order.
    pub lifecycle: Vec<LifecycleStamp>,
    pub fills: Vec<FillRecord>,
}

impl OrderRecord {
    pub fn stamp(&self, name: &str) -> Option<Nanos> {
        self.lifecycle
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.timestamp_ns)
    }
}

/// One closed hedge group.
#[derive(Debug, Clone, PartialEq)]
pub struct HedgeGroupRecord {
    pub id: String,
    pub duration_us: i64,
    pub pnl: PnlBreakdown,
    /// `pnl_with_fee > 0`, fixed at validation time.
    pub is_win: bool,
    /// Orders in document order.
    pub orders: Vec<OrderRecord>,
}

impl HedgeGroupRecord {
    /// Numeric suffix of ids shaped like `hg_<epoch>_<count>`.
    pub fn short_id(&self) -> &str {
        short_group_id(&self.id)
    }

    pub fn is_loss(&self) -> bool {
        self.pnl.pnl_with_fee < 0.0
    }

    pub fn orders_with_role(&self, role: VenueRole) -> impl Iterator<Item = &OrderRecord> {
        self.orders.iter().filter(move |o| o.venue_role == role)
    }

    pub fn from_json_str(json: &str, not_applicable: &str) -> Result<Self, AnalysisError> {
        let value: Value = serde_json::from_str(json).map_err(|e| AnalysisError::Parse {
            context: "hedge_group".to_string(),
            value: truncate(json, 80),
            reason: e.to_string(),
        })?;
        Self::from_value(&value, not_applicable)
    }

    pub fn from_value(value: &Value, not_applicable: &str) -> Result<Self, AnalysisError> {
        let obj = as_object(value, "hedge_group")?;

        let id = as_str(field(obj, "id", "hedge_group")?, "hedge_group.id")?.to_string();
        let ctx = format!("hedge_group[{}]", id);

        let duration_us = match obj.get("duration_us") {
            Some(v) => as_number(v, &format!("{}.duration_us", ctx))? as i64,
            None => 0,
        };

        let pnl = parse_pnl(field(obj, "pnl", &ctx)?, &format!("{}.pnl", ctx))?;

        let orders_obj = as_object(field(obj, "orders", &ctx)?, &format!("{}.orders", ctx))?;
        let orders = orders_obj
            .iter()
            .map(|(order_id, order)| {
                parse_order(order_id, order, not_applicable, &format!("{}.orders", ctx))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id,
            duration_us,
            is_win: pnl.pnl_with_fee > 0.0,
            pnl,
            orders,
        })
    }
}

pub fn short_group_id(id: &str) -> &str {
    id.rsplit('_').next().unwrap_or(id)
}

// =============================================================================
// PARSING HELPERS
// =============================================================================

fn parse_pnl(value: &Value, ctx: &str) -> Result<PnlBreakdown, AnalysisError> {
    let obj = as_object(value, ctx)?;
    let optional = |key: &str| -> Result<f64, AnalysisError> {
        obj.get(key)
            .map(|v| as_number(v, &format!("{}.{}", ctx, key)))
            .unwrap_or(Ok(0.0))
    };

    Ok(PnlBreakdown {
        pnl_with_fee: as_number(field(obj, "pnl_with_fee", ctx)?, &format!("{}.pnl_with_fee", ctx))?,
        pnl_without_fee: optional("pnl_without_fee")?,
        maker_fee: optional("maker_fee")?,
        taker_fee: optional("taker_fee")?,
        total_fee: optional("total_fee")?,
    })
}

fn parse_order(
    order_id: &str,
    value: &Value,
    not_applicable: &str,
    parent: &str,
) -> Result<OrderRecord, AnalysisError> {
    let ctx = format!("{}[{}]", parent, order_id);
    let obj = as_object(value, &ctx)?;

    let role_str = as_str(field(obj, "venue_role", &ctx)?, &format!("{}.venue_role", ctx))?;
    let venue_role = VenueRole::parse(role_str).ok_or_else(|| {
        AnalysisError::schema(
            format!("{}.venue_role", ctx),
            format!("unknown venue role {:?}", role_str),
        )
    })?;

    let side_str = as_str(field(obj, "side", &ctx)?, &format!("{}.side", ctx))?;
    let side = OrderSide::parse(side_str).ok_or_else(|| {
        AnalysisError::schema(format!("{}.side", ctx), format!("unknown side {:?}", side_str))
    })?;

    let events_ctx = format!("{}.events", ctx);
    let events = as_object(field(obj, "events", &ctx)?, &events_ctx)?;
    let mut lifecycle = Vec::with_capacity(events.len());
    for (name, stamp) in events {
        let stamp_ctx = format!("{}.{}", events_ctx, name);
        let raw = as_str(stamp, &stamp_ctx)?;
        if raw == not_applicable {
            continue;
        }
        let timestamp_ns = parse_iso8601(raw).map_err(|e| e.within(&stamp_ctx))?;
        lifecycle.push(LifecycleStamp {
            name: name.clone(),
            timestamp_ns,
        });
    }

    let fills_ctx = format!("{}.fills", ctx);
    let fills = as_array(field(obj, "fills", &ctx)?, &fills_ctx)?
        .iter()
        .enumerate()
        .map(|(i, fill)| parse_fill(fill, &format!("{}[{}]", fills_ctx, i)))
        .collect::<Result<Vec<_>, _>>()?;

    let filled_quantity = match obj.get("filled_quantity") {
        Some(v) => as_number(v, &format!("{}.filled_quantity", ctx))?,
        None => fills.iter().map(|f| f.quantity).sum(),
    };

    Ok(OrderRecord {
        order_id: order_id.to_string(),
        venue_role,
        side,
        filled_quantity,
        lifecycle,
        fills,
    })
}

fn parse_fill(value: &Value, ctx: &str) -> Result<FillRecord, AnalysisError> {
    let obj = as_object(value, ctx)?;

    let transaction_id = match field(obj, "transaction_id", ctx)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => {
            return Err(AnalysisError::schema(
                format!("{}.transaction_id", ctx),
                "expected string or number",
            ))
        }
    };

    let stamp = |key: &str| -> Result<Nanos, AnalysisError> {
        let key_ctx = format!("{}.{}", ctx, key);
        let raw = as_str(field(obj, key, ctx)?, &key_ctx)?;
        parse_iso8601(raw).map_err(|e| e.within(&key_ctx))
    };

    Ok(FillRecord {
        transaction_id,
        price: as_number(field(obj, "price", ctx)?, &format!("{}.price", ctx))?,
        quantity: as_number(field(obj, "quantity", ctx)?, &format!("{}.quantity", ctx))?,
        exchange_fill_time: stamp("exchange_fill_time")?,
        infra_notified_time: stamp("infra_notified_time")?,
        strategy_notified_time: stamp("strategy_notified_time")?,
    })
}

fn field<'a>(obj: &'a Map<String, Value>, key: &str, ctx: &str) -> Result<&'a Value, AnalysisError> {
    obj.get(key)
        .ok_or_else(|| AnalysisError::schema(ctx, format!("missing key {:?}", key)))
}

fn as_object<'a>(value: &'a Value, ctx: &str) -> Result<&'a Map<String, Value>, AnalysisError> {
    value
        .as_object()
        .ok_or_else(|| AnalysisError::schema(ctx, "expected object"))
}

fn as_array<'a>(value: &'a Value, ctx: &str) -> Result<&'a Vec<Value>, AnalysisError> {
    value
        .as_array()
        .ok_or_else(|| AnalysisError::schema(ctx, "expected array"))
}

fn as_str<'a>(value: &'a Value, ctx: &str) -> Result<&'a str, AnalysisError> {
    value
        .as_str()
        .ok_or_else(|| AnalysisError::schema(ctx, "expected string"))
}

/// Numbers occasionally arrive as strings; accept both.
fn as_number(value: &Value, ctx: &str) -> Result<f64, AnalysisError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| AnalysisError::schema(ctx, "number out of range")),
        Value::String(s) => s.trim().parse::<f64>().map_err(|e| AnalysisError::Parse {
            context: ctx.to_string(),
            value: s.clone(),
            reason: e.to_string(),
        }),
        _ => Err(AnalysisError::schema(ctx, "expected number")),
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
