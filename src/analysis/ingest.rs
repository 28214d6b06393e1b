//! Input loading
//!
//! Hedge-group records come either from a JSON array file or straight from a
//! strategy log, where each matching line ends with the record's JSON.
//! Tick data comes from CSV exports (one row per top-of-book update) or from
//! a columnar JSON snapshot.
//!
//! Record-level problems are collected as [`GroupFailure`]s so one bad record
//! never hides its siblings. File-level problems are `anyhow` errors.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::config::InputConfig;
use super::error::AnalysisError;
use super::pipeline::{FailureStage, GroupFailure};
use super::records::HedgeGroupRecord;
use super::tick_store::{PriceSide, TickStore};
use super::timestamps::Nanos;

// =============================================================================
// HEDGE GROUPS
// =============================================================================

#[derive(Debug, Default)]
pub struct LoadedGroups {
    pub records: Vec<HedgeGroupRecord>,
    pub failures: Vec<GroupFailure>,
    /// Valid records dropped by the `losses_only` filter.
    pub filtered_out: usize,
}

impl LoadedGroups {
    fn push(&mut self, label: String, result: std::result::Result<HedgeGroupRecord, AnalysisError>) {
        match result {
            Ok(record) => self.records.push(record),
            Err(error) => {
                warn!("Skipping hedge group {}: {}", label, error);
                self.failures.push(GroupFailure {
                    group_id: label,
                    stage: FailureStage::Parse,
                    reason: error,
                });
            }
        }
    }

    fn finish(mut self, input: &InputConfig) -> Self {
        if input.losses_only {
            let before = self.records.len();
            self.records.retain(HedgeGroupRecord::is_loss);
            self.filtered_out = before - self.records.len();
        }
        info!(
            "Loaded {} hedge groups ({} rejected, {} filtered out)",
            self.records.len(),
            self.failures.len(),
            self.filtered_out
        );
        self
    }
}

/// Parse a JSON array of hedge-group records.
pub fn parse_group_array(json: &str, input: &InputConfig) -> Result<LoadedGroups> {
    let value: Value = serde_json::from_str(json).context("hedge group file is not valid JSON")?;
    let Value::Array(items) = value else {
        bail!("hedge group file must contain a JSON array");
    };

    let mut loaded = LoadedGroups::default();
    for (i, item) in items.iter().enumerate() {
        let label = item
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("record[{}]", i));
        loaded.push(label, HedgeGroupRecord::from_value(item, &input.not_applicable));
    }
    Ok(loaded.finish(input))
}

/// JSON payload of a strategy log line, if the line carries a hedge group.
///
/// Lines look like `<ts> | <COMPONENT> | <LEVEL> | <message>`. Only the first
/// three separators split fields, so the message may itself contain `|`. The
/// payload runs from the first `{` after the search term to the end of line.
pub fn extract_log_payload<'a>(line: &'a str, search_term: &str) -> Option<&'a str> {
    let message = line.splitn(4, " | ").nth(3)?;
    let after_term = &message[message.find(search_term)? + search_term.len()..];
    let payload = after_term[after_term.find('{')?..].trim_end();
    Some(payload)
}

/// Parse every hedge-group record found in a strategy log.
pub fn parse_group_log(text: &str, input: &InputConfig) -> LoadedGroups {
    let mut loaded = LoadedGroups::default();
    for (line_no, line) in text.lines().enumerate() {
        let Some(payload) = extract_log_payload(line, &input.log_search_term) else {
            continue;
        };
        let result = HedgeGroupRecord::from_json_str(payload, &input.not_applicable);
        let label = match &result {
            Ok(record) => record.id.clone(),
            Err(_) => format!("line {}", line_no + 1),
        };
        loaded.push(label, result);
    }
    loaded.finish(input)
}

/// Load hedge groups; `.json` files are arrays, anything else is a log.
pub fn load_groups(path: &Path, input: &InputConfig) -> Result<LoadedGroups> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read hedge groups from {:?}", path))?;

    if has_extension(path, "json") {
        parse_group_array(&text, input).with_context(|| format!("Invalid hedge group file {:?}", path))
    } else {
        debug!("Scanning {:?} for lines containing {:?}", path, input.log_search_term);
        Ok(parse_group_log(&text, input))
    }
}

// =============================================================================
// TICKS
// =============================================================================

/// Side codes used by the market-data export.
const CSV_SIDE_BID: u8 = 0;
const CSV_SIDE_ASK: u8 = 1;

#[derive(Debug, Deserialize)]
struct TickRow {
    side: u8,
    #[serde(rename = "exchangeTimestamp")]
    exchange_timestamp: Nanos,
    price: f64,
}

/// Columnar tick snapshot, one pair of arrays per side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub ask_timestamps: Vec<Nanos>,
    pub ask_prices: Vec<f64>,
    pub bid_timestamps: Vec<Nanos>,
    pub bid_prices: Vec<f64>,
}

impl TickSnapshot {
    /// Sorted snapshot of a store.
    pub fn from_store(store: &TickStore) -> Self {
        let bids = store.series(PriceSide::Bid);
        let asks = store.series(PriceSide::Ask);
        Self {
            ask_timestamps: asks.timestamps().to_vec(),
            ask_prices: asks.prices().to_vec(),
            bid_timestamps: bids.timestamps().to_vec(),
            bid_prices: bids.prices().to_vec(),
        }
    }

    pub fn into_store(self) -> Result<TickStore> {
        TickStore::from_columns(
            self.bid_timestamps,
            self.bid_prices,
            self.ask_timestamps,
            self.ask_prices,
        )
        .map_err(anyhow::Error::from)
    }

    /// Append rows of a CSV export; rows with an unknown side are ignored.
    pub fn extend_from_csv<R: Read>(&mut self, reader: R) -> Result<usize> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut ignored = 0usize;
        let mut rows = 0usize;

        for row in csv_reader.deserialize::<TickRow>() {
            let row = row.context("Malformed tick row")?;
            rows += 1;
            match row.side {
                CSV_SIDE_BID => {
                    self.bid_timestamps.push(row.exchange_timestamp);
                    self.bid_prices.push(row.price);
                }
                CSV_SIDE_ASK => {
                    self.ask_timestamps.push(row.exchange_timestamp);
                    self.ask_prices.push(row.price);
                }
                _ => ignored += 1,
            }
        }

        if ignored > 0 {
            debug!("Ignored {} tick rows with unknown side", ignored);
        }
        Ok(rows)
    }
}

/// Merge one or more CSV exports into a tick store.
pub fn load_ticks_csv(paths: &[PathBuf]) -> Result<TickStore> {
    let mut snapshot = TickSnapshot::default();
    for path in paths {
        let file = File::open(path).with_context(|| format!("Failed to open tick file {:?}", path))?;
        let rows = snapshot
            .extend_from_csv(BufReader::new(file))
            .with_context(|| format!("Failed to read tick file {:?}", path))?;
        debug!("Read {} tick rows from {:?}", rows, path);
    }
    snapshot.into_store()
}

pub fn load_tick_snapshot(path: &Path) -> Result<TickSnapshot> {
    let file = File::open(path).with_context(|| format!("Failed to open tick snapshot {:?}", path))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid tick snapshot {:?}", path))
}

pub fn write_tick_snapshot(path: &Path, snapshot: &TickSnapshot) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer(std::io::BufWriter::new(file), snapshot)
        .with_context(|| format!("Failed to write tick snapshot {:?}", path))
}

/// Load ticks: a single `.json` path is a snapshot, otherwise CSV exports.
pub fn load_ticks(paths: &[PathBuf]) -> Result<TickStore> {
    let store = match paths {
        [] => bail!("no tick files given"),
        [single] if has_extension(single, "json") => load_tick_snapshot(single)?.into_store()?,
        many => load_ticks_csv(many)?,
    };

    let (bids, asks) = store.tick_counts();
    info!("Loaded ticks: {} bids, {} asks", bids, asks);
    if store.coverage().is_none() {
        warn!("Bid and ask series do not overlap; every mid lookup will fail");
    }
    Ok(store)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{"id":"hg_1_1","pnl":{"pnl_with_fee":-1.0},"orders":{}}"#;
    const WIN_RECORD: &str = r#"{"id":"hg_1_2","pnl":{"pnl_with_fee":2.0},"orders":{}}"#;

    #[test]
    fn test_extract_log_payload() {
        let line = format!(
            "2025-03-10 12:00:00.000001 | STRATEGY | INFO | hedge_group_analysis pass {}",
            RECORD
        );
        assert_eq!(extract_log_payload(&line, "hedge_group_analysis"), Some(RECORD));
        assert_eq!(extract_log_payload("2025 | X | INFO | heartbeat", "hedge_group_analysis"), None);
        assert_eq!(extract_log_payload("hedge_group_analysis done", "hedge_group_analysis"), None);
        assert_eq!(
            extract_log_payload("a | B | INFO | hedge_group_analysis no payload", "hedge_group_analysis"),
            None
        );
    }

    #[test]
    fn test_log_payload_keeps_separators_inside_strings() {
        let record = r#"{"id":"hg_1_1","note":"a|b c | d","pnl":{"pnl_with_fee":-1.0},"orders":{}}"#;
        let line = format!("2025-03-10 12:00:00.000001 | STRATEGY | INFO | hedge_group_analysis {}  ", record);
        assert_eq!(extract_log_payload(&line, "hedge_group_analysis"), Some(record));

        let loaded = parse_group_log(&line, &InputConfig::default());
        assert_eq!(loaded.records.len(), 1);
        assert!(loaded.failures.is_empty());
        assert_eq!(loaded.records[0].id, "hg_1_1");
    }

    #[test]
    fn test_parse_group_log_isolates_bad_lines() {
        let text = format!(
            "a | B | INFO | hedge_group_analysis {}\n\
             a | B | INFO | unrelated line\n\
             a | B | INFO | hedge_group_analysis {{\"id\":\"hg_1_3\"}}\n\
             a | B | INFO | hedge_group_analysis {}\n",
            RECORD, WIN_RECORD
        );
        let loaded = parse_group_log(&text, &InputConfig::default());
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.failures.len(), 1);
        assert_eq!(loaded.failures[0].group_id, "line 3");
        assert_eq!(loaded.failures[0].reason.kind(), "schema");
    }

    #[test]
    fn test_parse_group_array_losses_only() {
        let json = format!("[{}, {}, {{\"pnl\": {{}}}}]", RECORD, WIN_RECORD);
        let input = InputConfig {
            losses_only: true,
            ..InputConfig::default()
        };
        let loaded = parse_group_array(&json, &input).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].id, "hg_1_1");
        assert_eq!(loaded.filtered_out, 1);
        assert_eq!(loaded.failures[0].group_id, "record[2]");
    }

    #[test]
    fn test_parse_group_array_rejects_non_array() {
        assert!(parse_group_array(RECORD, &InputConfig::default()).is_err());
    }

    #[test]
    fn test_csv_rows_split_by_side_and_merged() {
        let first = "side,exchangeTimestamp,price,qty\n1,2000,100.4,1\n0,1000,100.0,1\n1,1000,100.2,1\n";
        let second = "side,exchangeTimestamp,price,qty\n0,2000,102.0,2\n2,1500,0.0,0\n";

        let mut snapshot = TickSnapshot::default();
        assert_eq!(snapshot.extend_from_csv(first.as_bytes()).unwrap(), 3);
        assert_eq!(snapshot.extend_from_csv(second.as_bytes()).unwrap(), 2);
        assert_eq!(snapshot.bid_timestamps, vec![1000, 2000]);
        assert_eq!(snapshot.ask_timestamps, vec![2000, 1000]);

        let store = snapshot.into_store().unwrap();
        let sorted = TickSnapshot::from_store(&store);
        assert_eq!(sorted.ask_timestamps, vec![1000, 2000]);
        assert_eq!(sorted.ask_prices, vec![100.2, 100.4]);
        assert!((store.mid_at(1500).unwrap() - 100.65).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_csv_row_fails() {
        let mut snapshot = TickSnapshot::default();
        let bad = "side,exchangeTimestamp,price\n0,abc,1.0\n";
        assert!(snapshot.extend_from_csv(bad.as_bytes()).is_err());
    }
}
