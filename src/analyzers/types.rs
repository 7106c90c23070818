//! Data types produced by the aggregation pipeline.

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

/// A ratio that may have no value because its denominator was zero or absent.
///
/// Serializes as a plain number, or as the string `"undefined"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    Value(f64),
    Undefined,
}

impl Rate {
    /// `numerator / denominator`, undefined for a zero denominator or a
    /// non-finite result.
    pub fn ratio(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            return Rate::Undefined;
        }
        let value = numerator / denominator;
        if value.is_finite() {
            Rate::Value(value)
        } else {
            Rate::Undefined
        }
    }

    /// Same as [`Rate::ratio`], undefined when either side is missing.
    pub fn from_options(numerator: Option<f64>, denominator: Option<f64>) -> Self {
        match (numerator, denominator) {
            (Some(n), Some(d)) => Rate::ratio(n, d),
            _ => Rate::Undefined,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Rate::Value(v) => Some(v),
            Rate::Undefined => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        matches!(self, Rate::Undefined)
    }

    /// Scales a fraction to a percentage.
    pub fn percent(self) -> Self {
        match self {
            Rate::Value(v) => Rate::Value(v * 100.0),
            Rate::Undefined => Rate::Undefined,
        }
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rate::Value(v) => serializer.serialize_f64(*v),
            Rate::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

/// Mean over a cohort that may have no members.
///
/// Serializes as a plain number, or as the string `"no data"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TierMean {
    Mean(f64),
    NoData,
}

impl TierMean {
    pub fn value(self) -> Option<f64> {
        match self {
            TierMean::Mean(v) => Some(v),
            TierMean::NoData => None,
        }
    }
}

impl Serialize for TierMean {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TierMean::Mean(v) => serializer.serialize_f64(*v),
            TierMean::NoData => serializer.serialize_str("no data"),
        }
    }
}

/// Sums over the latest values of every entity in scope.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalTotals {
    pub as_of: NaiveDate,
    pub entities: usize,
    pub total_cases: f64,
    pub total_deaths: f64,
    pub total_vaccinations: f64,
    pub mortality_rate: Rate,
}

/// One entity's latest headline numbers, used by the ranking tables.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateRow {
    pub country: String,
    pub aggregate: bool,
    pub total_cases: Option<f64>,
    pub total_deaths: Option<f64>,
    /// Fraction of cases that died.
    pub mortality_rate: Rate,
    /// Percent of population with at least one dose.
    pub vaccinated_pct: Rate,
    pub fully_vaccinated_pct: Rate,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaccinationLeader {
    pub country: String,
    pub population: f64,
    pub at_least_one_dose_pct: Rate,
    /// Passed through unclamped; the source over-counts some doses.
    pub fully_vaccinated_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendRow {
    pub country: String,
    pub mean_new_cases: f64,
    /// Days in the window that reported `new_cases`.
    pub reporting_days: usize,
    pub latest_new_cases: Option<f64>,
    pub growth_factor: Rate,
}

/// Rolling-mean wave count for one entity.
#[derive(Debug, Clone, Serialize)]
pub struct WaveSummary {
    pub country: String,
    /// Rows whose rolling mean of new cases rose above the previous row's.
    pub waves: usize,
    pub moving_average: Option<f64>,
    pub rising: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierSummary {
    pub members: usize,
    pub countries: Vec<String>,
    pub mean_mortality_rate: TierMean,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaccinationImpact {
    pub high_threshold: f64,
    pub low_threshold: f64,
    pub highly_vaccinated: TierSummary,
    pub less_vaccinated: TierSummary,
}

/// A single country on a single day.
#[derive(Debug, Clone, Serialize)]
pub struct CountrySnapshot {
    pub country: String,
    pub date: NaiveDate,
    pub total_cases: Option<f64>,
    pub total_deaths: Option<f64>,
    pub new_cases: Option<f64>,
    pub new_deaths: Option<f64>,
    pub mortality_rate: Rate,
    pub people_fully_vaccinated: Option<f64>,
    pub population: Option<f64>,
    /// Fully vaccinated over population, as a fraction.
    pub vaccination_rate: Rate,
}

/// Flat per-entity row for the latest-metrics CSV export.
#[derive(Debug, Clone, Serialize)]
pub struct LatestMetricsRow {
    pub country: String,
    pub aggregate: bool,
    pub last_date: Option<NaiveDate>,
    pub total_cases: Option<f64>,
    pub total_deaths: Option<f64>,
    pub total_vaccinations: Option<f64>,
    pub people_vaccinated: Option<f64>,
    pub people_fully_vaccinated: Option<f64>,
    pub population: Option<f64>,
    pub mortality_rate: Rate,
    pub vaccinated_pct: Rate,
    pub fully_vaccinated_pct: Rate,
    pub gdp_per_capita: Option<f64>,
    pub population_density: Option<f64>,
    pub life_expectancy: Option<f64>,
    pub median_age: Option<f64>,
    pub human_development_index: Option<f64>,
}
