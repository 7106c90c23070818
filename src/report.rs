//! Runs every aggregation once and collects the results for rendering.

use crate::analyzers::StatsAggregator;
use crate::analyzers::correlation::CorrelationMatrix;
use crate::analyzers::types::{
    AggregateRow, CountrySnapshot, GlobalTotals, LatestMetricsRow, TrendRow, VaccinationImpact,
    VaccinationLeader, WaveSummary,
};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::table::{DatasetOverview, Table};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

/// Everything the markdown report and the JSON summary are rendered from.
#[derive(Debug, Clone, Serialize)]
pub struct InsightsReport {
    pub as_of: NaiveDate,
    pub trend_window: u32,
    pub wave_window: usize,
    pub min_population: f64,
    pub overview: DatasetOverview,
    pub global_totals: GlobalTotals,
    pub top_affected: Vec<AggregateRow>,
    pub mortality_ranking: Vec<AggregateRow>,
    pub vaccination_leaders: Vec<VaccinationLeader>,
    pub vaccination_impact: VaccinationImpact,
    pub correlation_matrix: CorrelationMatrix,
    pub recent_trends: Vec<TrendRow>,
    pub case_waves: Vec<WaveSummary>,
    pub focus_countries: Vec<CountrySnapshot>,
    #[serde(skip)]
    pub latest_metrics: Vec<LatestMetricsRow>,
}

/// Builds the full report in one pass over `table`.
///
/// # Errors
///
/// Fails when the table has no records at or before the reference date, or
/// when the configuration is invalid.
#[tracing::instrument(skip_all, fields(rows = table.len()))]
pub fn build_report(table: &Table, config: &AnalysisConfig) -> Result<InsightsReport> {
    config.validate()?;

    let mut aggregator =
        StatsAggregator::new(table).with_exclude_aggregates(config.exclude_aggregates);
    if let Some(as_of) = config.as_of {
        aggregator = aggregator.with_as_of(as_of);
    }

    let global_totals = aggregator.global_totals()?;
    let as_of = global_totals.as_of;

    let focus_countries: Vec<CountrySnapshot> = config
        .focus_countries
        .iter()
        .filter_map(|country| {
            let snapshot = aggregator.country_snapshot(country, None);
            if snapshot.is_none() {
                warn!(country = %country, "No data for focus country");
            }
            snapshot
        })
        .collect();

    let mut recent_trends = aggregator.recent_trends(config.trend_window);
    recent_trends.truncate(config.top_n);
    let mut case_waves = aggregator.case_waves(config.wave_window);
    case_waves.truncate(config.top_n);

    let report = InsightsReport {
        as_of,
        trend_window: config.trend_window,
        wave_window: config.wave_window,
        min_population: config.min_population,
        overview: table.overview(),
        top_affected: aggregator.top_affected(config.top_n),
        mortality_ranking: aggregator.mortality_ranking(config.top_n),
        vaccination_leaders: aggregator
            .vaccination_leaders(config.top_n, config.min_population),
        vaccination_impact: aggregator
            .vaccination_impact(config.high_threshold, config.low_threshold)?,
        correlation_matrix: aggregator.correlation_matrix(&config.correlation_metrics),
        recent_trends,
        case_waves,
        focus_countries,
        latest_metrics: aggregator.latest_metrics(),
        global_totals,
    };

    info!(
        as_of = %report.as_of,
        entities = report.global_totals.entities,
        total_cases = report.global_totals.total_cases,
        "Report built"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::Rate;
    use crate::table::tests::{date, record};

    fn sample_table() -> Table {
        let mut kenya = record("Kenya", "2022-11-01");
        kenya.total_cases = Some(343_999.0);
        kenya.total_deaths = Some(5_689.0);
        let mut world = record("World", "2022-11-01");
        world.total_cases = Some(1_000_000.0);
        world.total_deaths = Some(10_000.0);
        Table::new(vec![kenya, world])
    }

    #[test]
    fn test_build_report_collects_sections() {
        let table = sample_table();
        let report = build_report(&table, &AnalysisConfig::default()).unwrap();

        assert_eq!(report.as_of, date("2022-11-01"));
        assert_eq!(report.global_totals.entities, 1);
        assert_eq!(report.top_affected[0].country, "World");
        assert_eq!(report.focus_countries.len(), 1);
        assert_eq!(report.latest_metrics.len(), 2);
        assert_eq!(report.vaccination_impact.highly_vaccinated.members, 0);
        assert_eq!(
            report.correlation_matrix.get(
                crate::analyzers::CovariateMetric::MedianAge,
                crate::analyzers::CovariateMetric::MedianAge
            ),
            Some(Rate::Value(1.0))
        );
    }

    #[test]
    fn test_build_report_rejects_invalid_config() {
        let table = sample_table();
        let config = AnalysisConfig {
            trend_window: 0,
            ..Default::default()
        };
        assert!(build_report(&table, &config).is_err());
    }
}
