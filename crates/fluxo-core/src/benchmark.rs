//! Benchmark tier classification for financial metrics
//!
//! Margins and KPIs are graded against five qualitative tiers. Tier
//! ranges are per-metric and externally configured.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/fluxo/config/benchmarks.toml)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/benchmarks.toml");

/// Qualitative benchmark tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkTier {
    Sensational,
    Excellent,
    Good,
    Poor,
    Terrible,
}

impl BenchmarkTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensational => "sensational",
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Poor => "poor",
            Self::Terrible => "terrible",
        }
    }
}

impl std::fmt::Display for BenchmarkTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An inclusive numeric range
#[derive(Debug, Clone, Copy)]
pub struct TierRange {
    pub min: f64,
    pub max: f64,
}

impl TierRange {
    fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Configured ranges for one metric
#[derive(Debug, Clone)]
pub struct MetricBenchmark {
    pub name: String,
    pub unit: String,
    pub sensational: TierRange,
    pub excellent: TierRange,
    pub good: TierRange,
    pub poor: TierRange,
}

impl MetricBenchmark {
    /// Classify a value into exactly one tier.
    ///
    /// Tiers are checked in descending order with inclusive bounds; a
    /// value inside no configured range is terrible. Total over all
    /// finite inputs.
    pub fn classify(&self, value: f64) -> BenchmarkTier {
        if self.sensational.contains(value) {
            BenchmarkTier::Sensational
        } else if self.excellent.contains(value) {
            BenchmarkTier::Excellent
        } else if self.good.contains(value) {
            BenchmarkTier::Good
        } else if self.poor.contains(value) {
            BenchmarkTier::Poor
        } else {
            BenchmarkTier::Terrible
        }
    }
}

/// Benchmark configuration for all metrics
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    metrics: HashMap<String, MetricBenchmark>,
}

// Raw TOML shapes
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    metric: Vec<RawMetric>,
}

#[derive(Deserialize)]
struct RawMetric {
    name: String,
    unit: String,
    sensational: RawRange,
    excellent: RawRange,
    good: RawRange,
    poor: RawRange,
}

#[derive(Deserialize)]
struct RawRange {
    min: f64,
    /// Open-ended upper bound when omitted
    max: Option<f64>,
}

impl From<RawRange> for TierRange {
    fn from(raw: RawRange) -> Self {
        Self {
            min: raw.min,
            max: raw.max.unwrap_or(f64::INFINITY),
        }
    }
}

impl BenchmarkConfig {
    /// Load configuration: data-dir override first, embedded defaults otherwise
    pub fn load() -> Result<Self> {
        if let Some(path) = default_override_path() {
            if path.exists() {
                debug!(path = %path.display(), "loading benchmark config override");
                return Self::load_from_path(&path);
            }
        }
        Self::parse(DEFAULT_CONFIG)
    }

    /// Parse the embedded defaults, skipping any data-dir override
    pub fn embedded() -> Result<Self> {
        Self::parse(DEFAULT_CONFIG)
    }

    /// Load configuration from an explicit file path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a TOML config string
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid benchmark config: {}", e)))?;

        let mut metrics = HashMap::new();
        for metric in raw.metric {
            if metric.name.trim().is_empty() {
                return Err(Error::Config("Metric name must not be empty".to_string()));
            }
            metrics.insert(
                metric.name.clone(),
                MetricBenchmark {
                    name: metric.name,
                    unit: metric.unit,
                    sensational: metric.sensational.into(),
                    excellent: metric.excellent.into(),
                    good: metric.good.into(),
                    poor: metric.poor.into(),
                },
            );
        }

        Ok(Self { metrics })
    }

    pub fn metric(&self, name: &str) -> Option<&MetricBenchmark> {
        self.metrics.get(name)
    }

    /// Classify a value for a metric, or None when the metric carries no
    /// configured ranges (informational metrics stay ungraded)
    pub fn tier_for(&self, metric: &str, value: f64) -> Option<BenchmarkTier> {
        match self.metrics.get(metric) {
            Some(benchmark) => Some(benchmark.classify(value)),
            None => {
                debug!(metric, "no benchmark ranges configured");
                None
            }
        }
    }

    /// Classify a margin metric, treating a missing configuration as terrible
    /// (the DRE margin metrics are always present in the defaults)
    pub fn margin_tier(&self, metric: &str, value: f64) -> BenchmarkTier {
        self.tier_for(metric, value).unwrap_or_else(|| {
            warn!(metric, "margin metric missing from benchmark config");
            BenchmarkTier::Terrible
        })
    }
}

/// Data-dir override location (~/.local/share/fluxo/config/benchmarks.toml)
fn default_override_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("fluxo").join("config").join("benchmarks.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = BenchmarkConfig::parse(DEFAULT_CONFIG).unwrap();
        assert!(config.metric("gross_margin_pct").is_some());
        assert!(config.metric("ebitda_pct").is_some());
        assert!(config.metric("net_margin_pct").is_some());
    }

    #[test]
    fn test_dre_margin_thresholds() {
        let config = BenchmarkConfig::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(
            config.tier_for("gross_margin_pct", 65.0),
            Some(BenchmarkTier::Sensational)
        );
        assert_eq!(
            config.tier_for("gross_margin_pct", 60.0),
            Some(BenchmarkTier::Sensational)
        );
        assert_eq!(
            config.tier_for("gross_margin_pct", 45.0),
            Some(BenchmarkTier::Good)
        );
        assert_eq!(
            config.tier_for("gross_margin_pct", 29.99),
            Some(BenchmarkTier::Terrible)
        );
        assert_eq!(
            config.tier_for("ebitda_pct", 10.0),
            Some(BenchmarkTier::Poor)
        );
        assert_eq!(
            config.tier_for("net_margin_pct", 20.0),
            Some(BenchmarkTier::Sensational)
        );
    }

    #[test]
    fn test_inclusive_upper_bound_wins_over_next_tier() {
        // GOOD [30, 40], EXCELLENT [40.01, 50]: exactly 40 is GOOD
        let config = BenchmarkConfig::parse(
            r#"
            [[metric]]
            name = "custom"
            unit = "percent"
            sensational = { min = 50.01 }
            excellent = { min = 40.01, max = 50.0 }
            good = { min = 30.0, max = 40.0 }
            poor = { min = 20.0, max = 29.99 }
            "#,
        )
        .unwrap();

        assert_eq!(config.tier_for("custom", 40.0), Some(BenchmarkTier::Good));
        assert_eq!(
            config.tier_for("custom", 40.01),
            Some(BenchmarkTier::Excellent)
        );
    }

    #[test]
    fn test_classifier_is_total() {
        let config = BenchmarkConfig::parse(DEFAULT_CONFIG).unwrap();
        let metric = config.metric("net_margin_pct").unwrap();
        // Every finite input lands on exactly one tier (classify always
        // returns; spot-check the full span including negatives)
        for value in [-1e9, -50.0, 0.0, 4.99, 5.0, 9.99, 10.0, 15.0, 19.99, 20.0, 1e9] {
            let _tier = metric.classify(value);
        }
        assert_eq!(metric.classify(-50.0), BenchmarkTier::Terrible);
        assert_eq!(metric.classify(1e9), BenchmarkTier::Sensational);
    }

    #[test]
    fn test_unknown_metric_is_ungraded() {
        let config = BenchmarkConfig::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.tier_for("nonexistent", 10.0), None);
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let err = BenchmarkConfig::parse("not [valid").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_override_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [[metric]]
            name = "gross_margin_pct"
            unit = "percent"
            sensational = {{ min = 80.0 }}
            excellent = {{ min = 70.0, max = 79.99 }}
            good = {{ min = 60.0, max = 69.99 }}
            poor = {{ min = 50.0, max = 59.99 }}
            "#
        )
        .unwrap();

        let config = BenchmarkConfig::load_from_path(file.path()).unwrap();
        assert_eq!(
            config.tier_for("gross_margin_pct", 65.0),
            Some(BenchmarkTier::Good)
        );
    }
}
