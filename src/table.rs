//! In-memory representation of the per-country daily time series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Grouping labels that the source publishes alongside real countries.
static AGGREGATE_LABELS: &[&str] = &[
    "World",
    "Africa",
    "Asia",
    "Europe",
    "European Union",
    "European Union (27)",
    "North America",
    "South America",
    "Oceania",
    "International",
    "High income",
    "Upper middle income",
    "Lower middle income",
    "Low income",
];

/// One row of the source table: a single country (or grouping) on a single day.
///
/// Counts are kept as `f64` because the source writes them as `343999.0`.
/// Every metric column may be empty.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Record {
    #[serde(rename = "location")]
    pub country: String,
    #[serde(default)]
    pub iso_code: Option<String>,
    #[serde(default)]
    pub continent: Option<String>,
    pub date: NaiveDate,

    #[serde(default)]
    pub total_cases: Option<f64>,
    #[serde(default)]
    pub new_cases: Option<f64>,
    #[serde(default)]
    pub total_deaths: Option<f64>,
    #[serde(default)]
    pub new_deaths: Option<f64>,

    #[serde(default)]
    pub total_vaccinations: Option<f64>,
    #[serde(default)]
    pub people_vaccinated: Option<f64>,
    #[serde(default)]
    pub people_fully_vaccinated: Option<f64>,

    #[serde(default)]
    pub population: Option<f64>,
    #[serde(default)]
    pub population_density: Option<f64>,
    #[serde(default)]
    pub median_age: Option<f64>,
    #[serde(default)]
    pub gdp_per_capita: Option<f64>,
    #[serde(default)]
    pub life_expectancy: Option<f64>,
    #[serde(default)]
    pub human_development_index: Option<f64>,
}

impl Record {
    /// Returns true for pseudo-countries such as "World" or "High income".
    pub fn is_aggregate(&self) -> bool {
        is_aggregate_entity(&self.country, self.iso_code.as_deref())
    }
}

/// Classifies an entity by its name and, when present, its ISO code.
pub fn is_aggregate_entity(country: &str, iso_code: Option<&str>) -> bool {
    if iso_code.is_some_and(|code| code.starts_with("OWID_")) {
        return true;
    }
    AGGREGATE_LABELS.contains(&country)
}

/// All records for one entity, ordered by date.
#[derive(Debug)]
pub struct Series<'a> {
    pub country: &'a str,
    pub aggregate: bool,
    pub records: Vec<&'a Record>,
}

impl<'a> Series<'a> {
    /// Records dated at or before `as_of`.
    pub fn until(&self, as_of: NaiveDate) -> impl Iterator<Item = &'a Record> + '_ {
        self.records
            .iter()
            .copied()
            .take_while(move |r| r.date <= as_of)
    }

    /// The record for exactly `date`, if the series has one.
    pub fn on(&self, date: NaiveDate) -> Option<&'a Record> {
        self.records.iter().copied().find(|r| r.date == date)
    }
}

/// The full input table, kept in source order.
#[derive(Debug, Default)]
pub struct Table {
    records: Vec<Record>,
}

impl Table {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.iter().map(|r| r.date).min()
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.records.iter().map(|r| r.date).max()
    }

    /// Groups records by entity in order of first appearance.
    ///
    /// Each series is sorted by date. Out-of-order rows are tolerated, and
    /// rows repeating a date collapse to the last one in input order.
    pub fn series(&self) -> Vec<Series<'_>> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut out: Vec<Series<'_>> = Vec::new();

        for record in &self.records {
            let slot = *index.entry(record.country.as_str()).or_insert_with(|| {
                out.push(Series {
                    country: record.country.as_str(),
                    aggregate: false,
                    records: Vec::new(),
                });
                out.len() - 1
            });

            let series = &mut out[slot];
            series.aggregate |= record.is_aggregate();
            series.records.push(record);
        }

        for series in &mut out {
            // Stable sort, then reverse so the last duplicate comes first and survives dedup.
            series.records.sort_by_key(|r| r.date);
            series.records.reverse();
            series.records.dedup_by_key(|r| r.date);
            series.records.reverse();
        }

        out
    }

    /// Row count, entity count, date span and missing cells per tracked column.
    pub fn overview(&self) -> DatasetOverview {
        let series = self.series();
        let mut missing: Vec<MissingCount> = Vec::new();

        macro_rules! count_missing {
            ($field:ident) => {
                let count = self.records.iter().filter(|r| r.$field.is_none()).count();
                missing.push(MissingCount {
                    column: stringify!($field).to_string(),
                    missing: count,
                });
            };
        }

        count_missing!(total_cases);
        count_missing!(new_cases);
        count_missing!(total_deaths);
        count_missing!(new_deaths);
        count_missing!(total_vaccinations);
        count_missing!(people_vaccinated);
        count_missing!(people_fully_vaccinated);
        count_missing!(population);
        count_missing!(population_density);
        count_missing!(median_age);
        count_missing!(gdp_per_capita);
        count_missing!(life_expectancy);
        count_missing!(human_development_index);

        // Highest first; the stable sort keeps column order for equal counts.
        missing.sort_by(|a, b| b.missing.cmp(&a.missing));

        DatasetOverview {
            rows: self.records.len(),
            entities: series.len(),
            aggregate_entities: series.iter().filter(|s| s.aggregate).count(),
            first_date: self.first_date(),
            last_date: self.latest_date(),
            missing,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MissingCount {
    pub column: String,
    pub missing: usize,
}

/// Shape of the loaded table, reported before any statistics.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetOverview {
    pub rows: usize,
    pub entities: usize,
    pub aggregate_entities: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub missing: Vec<MissingCount>,
}
