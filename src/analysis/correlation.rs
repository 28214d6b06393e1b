//! Latency / P&L Correlation
//!
//! Pearson correlation between per-group hedge latency and `pnl_with_fee`,
//! with a two-sided p-value from Student's t distribution (n - 2 degrees of
//! freedom). Small samples are an expected condition and are reported as
//! [`CorrelationOutcome::InsufficientData`], not as errors.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// One group's contribution to the correlation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyPnlPoint {
    pub group_id: String,
    pub latency_secs: f64,
    pub pnl_with_fee: f64,
    pub is_win: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PearsonResult {
    pub correlation: f64,
    pub p_value: f64,
    pub data_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CorrelationOutcome {
    Computed(PearsonResult),
    /// Fewer than two points.
    InsufficientData { data_points: usize },
    /// One of the inputs has zero variance; r is undefined.
    ConstantInput { data_points: usize },
}

impl CorrelationOutcome {
    pub fn result(&self) -> Option<&PearsonResult> {
        match self {
            Self::Computed(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interpretation {
    pub strength: Strength,
    pub direction: Direction,
    pub significant: bool,
}

impl PearsonResult {
    pub fn interpret(&self, significance_level: f64) -> Interpretation {
        let magnitude = self.correlation.abs();
        Interpretation {
            strength: if magnitude < 0.3 {
                Strength::Weak
            } else if magnitude < 0.7 {
                Strength::Moderate
            } else {
                Strength::Strong
            },
            direction: if self.correlation > 0.0 {
                Direction::Positive
            } else {
                Direction::Negative
            },
            significant: self.p_value < significance_level,
        }
    }
}

/// Pearson correlation with a two-sided p-value.
pub fn pearson(xs: &[f64], ys: &[f64]) -> CorrelationOutcome {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return CorrelationOutcome::InsufficientData { data_points: n };
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return CorrelationOutcome::ConstantInput { data_points: n };
    }

    let r = (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0);

    CorrelationOutcome::Computed(PearsonResult {
        correlation: r,
        p_value: two_sided_p_value(r, n),
        data_points: n,
    })
}

fn two_sided_p_value(r: f64, n: usize) -> f64 {
    // Two points always lie on a line.
    if n == 2 {
        return 1.0;
    }
    if r.abs() >= 1.0 {
        return 0.0;
    }

    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}

/// Correlation over all points, or over losing groups only.
pub fn latency_pnl_correlation(points: &[LatencyPnlPoint], only_losses: bool) -> CorrelationOutcome {
    let (latencies, pnls): (Vec<f64>, Vec<f64>) = points
        .iter()
        .filter(|p| !(only_losses && p.is_win))
        .map(|p| (p.latency_secs, p.pnl_with_fee))
        .unzip();
    pearson(&latencies, &pnls)
}
