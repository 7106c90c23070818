//! Analysis settings: defaults, an optional JSON file, then CLI overrides.

use crate::analyzers::CovariateMetric;
use crate::error::{InsightsError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for one report run.
///
/// Stored as a JSON object on disk; every key is optional:
/// ```json
/// {
///   "as_of": "2022-11-01",
///   "trend_window": 7,
///   "wave_window": 30,
///   "top_n": 10,
///   "min_population": 1000000,
///   "high_threshold": 70.0,
///   "low_threshold": 40.0,
///   "exclude_aggregates": true,
///   "correlation_metrics": ["mortality_rate", "gdp_per_capita"],
///   "focus_countries": ["Kenya"]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Reference date; the latest date in the table when unset.
    pub as_of: Option<NaiveDate>,
    pub trend_window: u32,
    /// Rows in the rolling mean used for wave detection.
    pub wave_window: usize,
    pub top_n: usize,
    pub min_population: f64,
    /// Percent fully vaccinated above which a country is "highly vaccinated".
    pub high_threshold: f64,
    /// Percent fully vaccinated below which a country is "less vaccinated".
    pub low_threshold: f64,
    pub exclude_aggregates: bool,
    pub correlation_metrics: Vec<CovariateMetric>,
    pub focus_countries: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            as_of: None,
            trend_window: 7,
            wave_window: 30,
            top_n: 10,
            min_population: 1_000_000.0,
            high_threshold: 70.0,
            low_threshold: 40.0,
            exclude_aggregates: true,
            correlation_metrics: CovariateMetric::DEFAULT.to_vec(),
            focus_countries: vec![
                "United States".to_string(),
                "India".to_string(),
                "Brazil".to_string(),
                "United Kingdom".to_string(),
                "Kenya".to_string(),
            ],
        }
    }
}

impl AnalysisConfig {
    /// Loads the config from a JSON file at `path`; missing keys keep defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trend_window == 0 {
            return Err(InsightsError::InvalidConfig(
                "trend_window must be at least 1 day".to_string(),
            ));
        }
        if self.wave_window == 0 {
            return Err(InsightsError::InvalidConfig(
                "wave_window must be at least 1 row".to_string(),
            ));
        }
        if self.low_threshold > self.high_threshold {
            return Err(InsightsError::InvalidConfig(format!(
                "low_threshold {} is above high_threshold {}",
                self.low_threshold, self.high_threshold
            )));
        }
        if self.correlation_metrics.is_empty() {
            return Err(InsightsError::InvalidConfig(
                "correlation_metrics must name at least one metric".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.trend_window, 7);
        assert!(config.exclude_aggregates);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let path = env::temp_dir().join("covid_insights_partial_config.json");
        fs::write(
            &path,
            r#"{ "trend_window": 14, "correlation_metrics": ["median_age", "gdp_per_capita"] }"#,
        )
        .unwrap();

        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.trend_window, 14);
        assert_eq!(config.top_n, 10);
        assert_eq!(
            config.correlation_metrics,
            vec![CovariateMetric::MedianAge, CovariateMetric::GdpPerCapita]
        );

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = AnalysisConfig {
            trend_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            wave_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            low_threshold: 80.0,
            high_threshold: 20.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
