//! Hedge Analysis CLI
//!
//! Reports over hedge-group records taken from a strategy log (or a JSON
//! array of records), plus fill cost attribution against recorded ticks.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin hedge_analysis -- summary strategy.log --top 20
//! cargo run --release --bin hedge_analysis -- timeline strategy.log --group 1234
//! cargo run --release --bin hedge_analysis -- correlation strategy.log
//! cargo run --release --bin hedge_analysis -- cancel-fill strategy.log
//! cargo run --release --bin hedge_analysis -- attribute strategy.log \
//!   --ticks ticks_0.csv ticks_1.csv --output attributed.json
//! cargo run --release --bin hedge_analysis -- convert-ticks ticks_*.csv --output ticks.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use hedge_analysis::analysis::{
    ingest::{self, TickSnapshot},
    stats::DistributionStats,
    timestamps::format_iso8601,
    write_attributed_groups, AnalysisConfig, AnalysisReport, CorrelationOutcome, HedgeAnalysis,
    OutOfRangePolicy, TickStore, NANOS_PER_MILLI,
};

#[derive(Parser, Debug)]
#[command(name = "hedge_analysis")]
#[command(about = "Hedge latency and fill cost attribution reports")]
struct Cli {
    /// TOML config file (defaults apply when absent)
    #[arg(short, long, env = "HEDGE_ANALYSIS_CONFIG")]
    config: Option<PathBuf>,

    /// Process groups on a single thread
    #[arg(long)]
    sequential: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Strategy log, or a `.json` array of hedge-group records
    input: PathBuf,

    /// Keep only groups with negative pnl_with_fee
    #[arg(long)]
    losses_only: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Per-group table with totals, win ratios and worst losses
    Summary {
        #[command(flatten)]
        input: InputArgs,

        /// Rows in the worst-loss table
        #[arg(long)]
        top: Option<usize>,
    },

    /// Event timeline of one hedge group
    Timeline {
        #[command(flatten)]
        input: InputArgs,

        /// Full group id or its numeric suffix
        #[arg(short, long)]
        group: String,
    },

    /// Hedge latency vs. pnl_with_fee correlation
    Correlation {
        #[command(flatten)]
        input: InputArgs,

        /// Significance level for the p-value
        #[arg(long)]
        level: Option<f64>,
    },

    /// Cancel-to-fill durations for winning and losing groups
    CancelFill {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Attribute hedge fill costs against recorded ticks
    Attribute {
        #[command(flatten)]
        input: InputArgs,

        /// Tick CSV exports, or a single JSON snapshot
        #[arg(short, long, num_args = 1.., required = true)]
        ticks: Vec<PathBuf>,

        /// Output JSON file for attributed groups
        #[arg(short, long)]
        output: PathBuf,

        /// Drop fills outside tick coverage instead of failing their group
        #[arg(long)]
        skip_out_of_range: bool,
    },

    /// Merge tick CSV exports into one JSON snapshot
    ConvertTicks {
        /// Tick CSV exports
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output snapshot path
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => AnalysisConfig::from_env(),
    };
    if cli.sequential {
        config.parallel = false;
    }

    match cli.command {
        Commands::Summary { input, top } => {
            if let Some(top) = top {
                config.report.top_losses = top;
            }
            let report = analyze(&mut config, &input, None)?;
            print_summary(&report);
        }
        Commands::Timeline { input, group } => {
            let report = analyze(&mut config, &input, None)?;
            print_timeline(&report, &group)?;
        }
        Commands::Correlation { input, level } => {
            if let Some(level) = level {
                config.report.significance_level = level;
            }
            let report = analyze(&mut config, &input, None)?;
            print_correlation(&report, config.report.significance_level);
        }
        Commands::CancelFill { input } => {
            let report = analyze(&mut config, &input, None)?;
            print_cancel_fill(&report);
        }
        Commands::Attribute {
            input,
            ticks,
            output,
            skip_out_of_range,
        } => {
            if skip_out_of_range {
                config.attribution.out_of_range = OutOfRangePolicy::SkipFill;
            }
            let store = ingest::load_ticks(&ticks)?;
            let report = analyze(&mut config, &input, Some(&store))?;
            let written = write_attributed_groups(&output, report.attributed_groups())?;
            info!("Wrote {} attributed groups to {:?}", written, output);
            print_attribution(&report, written, &output);
        }
        Commands::ConvertTicks { inputs, output } => convert_ticks(&inputs, &output)?,
    }

    Ok(())
}

fn analyze(
    config: &mut AnalysisConfig,
    input: &InputArgs,
    ticks: Option<&TickStore>,
) -> Result<AnalysisReport> {
    if input.losses_only {
        config.input.losses_only = true;
    }
    let loaded = ingest::load_groups(&input.input, &config.input)?;
    if loaded.records.is_empty() {
        bail!("no hedge groups found in {:?}", input.input);
    }
    let pipeline = HedgeAnalysis::new(config.clone());
    Ok(pipeline.run_loaded(loaded, ticks))
}

fn convert_ticks(inputs: &[PathBuf], output: &Path) -> Result<()> {
    let store = ingest::load_ticks_csv(inputs)?;
    let snapshot = TickSnapshot::from_store(&store);
    ingest::write_tick_snapshot(output, &snapshot)?;
    println!(
        "Wrote {} bid and {} ask ticks to {:?}",
        snapshot.bid_timestamps.len(),
        snapshot.ask_timestamps.len(),
        output
    );
    Ok(())
}

// =============================================================================
// REPORT PRINTING
// =============================================================================

fn print_summary(report: &AnalysisReport) {
    let summary = &report.summary;

    println!("=== Hedge Group Summary ===\n");
    println!(
        "{:>8} {:>10} {:>5} {:>12} {:>12} {:>10} {:>10} {:>4} {:>4} {:>10} {:>10}",
        "ID", "Dur(ms)", "Win", "PnL+Fee", "PnL", "Maker", "Taker", "#Q", "#H", "QuoteQty", "HedgeQty"
    );
    println!("{}", "-".repeat(108));
    for r in &summary.rows {
        println!(
            "{:>8} {:>10.3} {:>5} {:>12.6} {:>12.6} {:>10.6} {:>10.6} {:>4} {:>4} {:>10.4} {:>10.4}",
            r.short_id,
            r.duration_ms,
            if r.is_win { "W" } else { "L" },
            r.pnl_with_fee,
            r.pnl_without_fee,
            r.maker_fee,
            r.taker_fee,
            r.n_quote,
            r.n_hedge,
            r.quote_qty,
            r.hedge_qty
        );
    }
    println!("{}", "-".repeat(108));
    let t = &summary.totals;
    println!(
        "{:>8} {:>10} {:>5} {:>12.6} {:>12.6} {:>10.6} {:>10.6} {:>4} {:>4} {:>10.4} {:>10.4}",
        "TOTAL",
        "",
        format!("{:?}", summary.verdict).to_uppercase(),
        t.pnl_with_fee,
        t.pnl_without_fee,
        t.maker_fee,
        t.taker_fee,
        t.n_quote,
        t.n_hedge,
        t.quote_qty,
        t.hedge_qty
    );

    println!("\nGroups:               {}", summary.group_count());
    println!("Win ratio:            {:.2}%", summary.ratios.win_ratio * 100.0);
    println!(
        "Normalized win ratio: {:.2}%",
        summary.ratios.normalized_win_ratio * 100.0
    );

    if !summary.top_losses.is_empty() {
        println!("\n=== Top {} Losses ===\n", summary.top_losses.len());
        println!("{:>4} {:>28} {:>12} {:>10}", "Rank", "Group", "PnL+Fee", "Share");
        for loss in &summary.top_losses {
            println!(
                "{:>4} {:>28} {:>12.6} {:>9.2}%",
                loss.rank,
                loss.id,
                loss.pnl_with_fee,
                loss.relative_loss * 100.0
            );
        }
    }

    print_failures(report);
}

fn print_timeline(report: &AnalysisReport, group: &str) -> Result<()> {
    let Some(analysis) = report.group(group) else {
        bail!("hedge group {} not found", group);
    };

    println!("=== Hedge Group {} ===\n", analysis.id());
    println!(
        "PnL with fee: {:.6} ({})",
        analysis.summary.pnl_with_fee,
        if analysis.summary.is_win { "win" } else { "loss" }
    );
    match &analysis.latency {
        Some(latency) => println!(
            "Hedge latency: {:.3}ms ({:?}, quote {} -> hedge {})",
            latency.as_millis_f64(),
            latency.method,
            latency.quote_order_id,
            latency.hedge_order_id
        ),
        None => println!("Hedge latency: n/a"),
    }
    println!();

    println!(
        "{:<28} {:>12} {:<10} {:<20} {}",
        "Timestamp", "Delta(ms)", "Leg", "Order", "Event"
    );
    println!("{}", "-".repeat(96));
    for entry in analysis.events.timeline() {
        let delta = entry
            .since_previous_ns
            .map(|ns| format!("+{:.3}", ns as f64 / NANOS_PER_MILLI as f64))
            .unwrap_or_default();
        println!(
            "{:<28} {:>12} {:<10} {:<20} {}",
            format_iso8601(entry.event.timestamp_ns),
            delta,
            format!("{}#{}", entry.event.venue_role, entry.role_index),
            entry.event.order_id,
            entry.event.name
        );
    }
    Ok(())
}

fn print_correlation(report: &AnalysisReport, level: f64) {
    println!("=== Hedge Latency vs. PnL ===\n");
    print_outcome("All groups", &report.correlation, level);
    print_outcome("Losing groups", &report.loss_correlation, level);
    print_failures(report);
}

fn print_outcome(label: &str, outcome: &CorrelationOutcome, level: f64) {
    match outcome {
        CorrelationOutcome::Computed(result) => {
            let interp = result.interpret(level);
            println!(
                "{:<14} r = {:+.4}  p = {:.4}  n = {}  ({:?} {:?}, {})",
                label,
                result.correlation,
                result.p_value,
                result.data_points,
                interp.strength,
                interp.direction,
                if interp.significant {
                    "significant"
                } else {
                    "not significant"
                }
            );
        }
        CorrelationOutcome::InsufficientData { data_points } => {
            println!("{:<14} not enough data ({} points)", label, data_points);
        }
        CorrelationOutcome::ConstantInput { data_points } => {
            println!("{:<14} constant input ({} points)", label, data_points);
        }
    }
}

fn print_cancel_fill(report: &AnalysisReport) {
    let cf = &report.cancel_fill;
    println!("=== Cancel-to-Fill Durations ===\n");
    println!("Orders filled after cancel: {}\n", cf.count());

    println!(
        "{:<8} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Set", "Count", "Mean", "Median", "Std", "Min", "Max", "P25", "P75", "P90", "P95", "P99"
    );
    for (label, stats) in [("all", &cf.all), ("wins", &cf.wins), ("losses", &cf.losses)] {
        print_stats_row(label, stats.as_ref());
    }

    if let Some(cmp) = &cf.comparison {
        println!(
            "\nLosses vs. wins: {:+.3}ms{}",
            cmp.difference_ms,
            cmp.difference_pct
                .map(|pct| format!(" ({:+.1}%)", pct))
                .unwrap_or_default()
        );
    }
}

fn print_stats_row(label: &str, stats: Option<&DistributionStats>) {
    match stats {
        Some(s) => println!(
            "{:<8} {:>6} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
            label, s.count, s.mean, s.median, s.std, s.min, s.max, s.p25, s.p75, s.p90, s.p95, s.p99
        ),
        None => println!("{:<8} {:>6}", label, 0),
    }
}

fn print_attribution(report: &AnalysisReport, written: usize, output: &Path) {
    let turned = report
        .attributed_groups()
        .filter(|g| !g.is_win && g.attribution.turn_positive)
        .count();
    let total_change: f64 = report
        .attributed_groups()
        .map(|g| g.attribution.total_pnl_change)
        .sum();

    println!("=== Fill Cost Attribution ===\n");
    println!("Attributed groups:       {} -> {:?}", written, output);
    println!("Skipped fills:           {}", report.skipped_fill_count());
    println!("Total pnl change:        {:.6}", total_change);
    println!("Losses turned positive:  {}", turned);
    print_failures(report);
}

fn print_failures(report: &AnalysisReport) {
    if report.failures.is_empty() {
        return;
    }
    println!("\n=== Failures ({}) ===\n", report.failures.len());
    for failure in &report.failures {
        println!("{:<28} {:<12} {}", failure.group_id, failure.stage, failure.reason);
    }
}
