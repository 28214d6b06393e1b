//! Analysis configuration
//!
//! Input conventions, attribution policy, and report options. Loaded from
//! TOML; every field has a default so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::attribution::OutOfRangePolicy;
use super::records::DEFAULT_NOT_APPLICABLE;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "HEDGE_ANALYSIS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "hedge_analysis.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Process hedge groups on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub attribution: AttributionConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

fn default_parallel() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            input: InputConfig::default(),
            attribution: AttributionConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from `HEDGE_ANALYSIS_CONFIG` or the default path, else defaults
    pub fn from_env() -> Self {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Using default analysis config ({}): {}", path, e);
            Self::default()
        })
    }

    /// Save to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// How hedge-group records are located and read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Marker identifying hedge-group lines in a strategy log
    #[serde(default = "default_log_search_term")]
    pub log_search_term: String,

    /// Lifecycle timestamp value meaning "did not happen"
    #[serde(default = "default_not_applicable")]
    pub not_applicable: String,

    /// Keep only groups with negative `pnl_with_fee`
    #[serde(default)]
    pub losses_only: bool,
}

fn default_log_search_term() -> String {
    "hedge_group_analysis".to_string()
}

fn default_not_applicable() -> String {
    DEFAULT_NOT_APPLICABLE.to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            log_search_term: default_log_search_term(),
            not_applicable: default_not_applicable(),
            losses_only: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributionConfig {
    /// Fill lookups outside tick coverage: fail the group or skip the fill
    #[serde(default)]
    pub out_of_range: OutOfRangePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Rows in the worst-loss table
    #[serde(default = "default_top_losses")]
    pub top_losses: usize,

    /// p-value below which a correlation counts as significant
    #[serde(default = "default_significance_level")]
    pub significance_level: f64,
}

fn default_top_losses() -> usize {
    10
}

fn default_significance_level() -> f64 {
    0.05
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_losses: default_top_losses(),
            significance_level: default_significance_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            parallel = false

            [attribution]
            out_of_range = "skip_fill"
            "#,
        )
        .unwrap();

        assert!(!config.parallel);
        assert_eq!(config.attribution.out_of_range, OutOfRangePolicy::SkipFill);
        assert_eq!(config.input, InputConfig::default());
        assert_eq!(config.report.top_losses, 10);
        assert_eq!(config.report.significance_level, 0.05);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: AnalysisConfig = toml::from_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.toml");

        let mut config = AnalysisConfig::default();
        config.input.losses_only = true;
        config.report.top_losses = 3;
        config.save(&path).unwrap();

        assert_eq!(AnalysisConfig::load(&path).unwrap(), config);
    }
}
