use crate::analyzers::correlation::{CorrelationMatrix, CovariateMetric};
use crate::analyzers::latest::LatestValues;
use crate::analyzers::trends::{trend_for_series, waves_for_series};
use crate::analyzers::types::{
    AggregateRow, CountrySnapshot, GlobalTotals, LatestMetricsRow, Rate, TierMean, TierSummary,
    TrendRow, VaccinationImpact, VaccinationLeader, WaveSummary,
};
use crate::analyzers::utility::mean;
use crate::error::{InsightsError, Result};
use crate::table::{Series, Table};
use chrono::NaiveDate;
use tracing::debug;

/// Read-only statistics over a loaded [`Table`].
///
/// Every operation recomputes from the table; nothing is cached or mutated,
/// so calling the same operation twice yields the same result.
pub struct StatsAggregator<'a> {
    series: Vec<Series<'a>>,
    as_of: Option<NaiveDate>,
    exclude_aggregates: bool,
}

impl<'a> StatsAggregator<'a> {
    /// Reference date defaults to the latest date in the table; aggregate
    /// rows are excluded from per-country rankings.
    pub fn new(table: &'a Table) -> Self {
        Self {
            series: table.series(),
            as_of: table.latest_date(),
            exclude_aggregates: true,
        }
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn with_exclude_aggregates(mut self, exclude: bool) -> Self {
        self.exclude_aggregates = exclude;
        self
    }

    pub fn as_of(&self) -> Option<NaiveDate> {
        self.as_of
    }

    fn in_scope(&self, aggregate: bool) -> bool {
        !(self.exclude_aggregates && aggregate)
    }

    /// Latest values for every entity with a record at or before the reference date.
    fn latest(&self) -> Vec<LatestValues> {
        let Some(as_of) = self.as_of else {
            return Vec::new();
        };
        self.series
            .iter()
            .filter_map(|s| LatestValues::from_series(s, as_of))
            .collect()
    }

    /// Sums cases, deaths and vaccinations over the latest values per entity.
    ///
    /// # Errors
    ///
    /// [`InsightsError::MissingInput`] when no entity has a record at or
    /// before the reference date.
    pub fn global_totals(&self) -> Result<GlobalTotals> {
        let as_of = self
            .as_of
            .ok_or_else(|| InsightsError::MissingInput("table is empty".to_string()))?;

        let latest: Vec<LatestValues> = self
            .latest()
            .into_iter()
            .filter(|l| self.in_scope(l.aggregate))
            .collect();

        if latest.is_empty() {
            return Err(InsightsError::MissingInput(format!(
                "no records on or before {}",
                as_of
            )));
        }

        let total_cases: f64 = latest.iter().filter_map(|l| l.total_cases).sum();
        let total_deaths: f64 = latest.iter().filter_map(|l| l.total_deaths).sum();
        let total_vaccinations: f64 = latest.iter().filter_map(|l| l.total_vaccinations).sum();

        Ok(GlobalTotals {
            as_of,
            entities: latest.len(),
            total_cases,
            total_deaths,
            total_vaccinations,
            mortality_rate: Rate::ratio(total_deaths, total_cases),
        })
    }

    /// The `n` entities with the most cases, aggregates included.
    ///
    /// Ties keep the order in which entities first appear in the input.
    pub fn top_affected(&self, n: usize) -> Vec<AggregateRow> {
        let mut rows: Vec<(f64, AggregateRow)> = self
            .latest()
            .iter()
            .filter_map(|l| Some((l.total_cases?, l.to_aggregate_row())))
            .collect();

        rows.sort_by(|a, b| b.0.total_cmp(&a.0));
        rows.into_iter().take(n).map(|(_, row)| row).collect()
    }

    /// The `n` countries with the highest mortality rate.
    pub fn mortality_ranking(&self, n: usize) -> Vec<AggregateRow> {
        let mut rows: Vec<(f64, AggregateRow)> = self
            .latest()
            .iter()
            .filter(|l| self.in_scope(l.aggregate))
            .filter_map(|l| Some((l.mortality_rate().value()?, l.to_aggregate_row())))
            .collect();

        rows.sort_by(|a, b| b.0.total_cmp(&a.0));
        rows.into_iter().take(n).map(|(_, row)| row).collect()
    }

    /// The `n` countries of at least `min_population` people with the highest
    /// fully vaccinated share. Aggregates never appear here.
    pub fn vaccination_leaders(&self, n: usize, min_population: f64) -> Vec<VaccinationLeader> {
        let mut leaders: Vec<VaccinationLeader> = self
            .latest()
            .iter()
            .filter(|l| !l.aggregate)
            .filter_map(|l| {
                let population = l.population.filter(|p| *p >= min_population)?;
                Some(VaccinationLeader {
                    country: l.country.clone(),
                    population,
                    at_least_one_dose_pct: l.vaccinated_pct(),
                    fully_vaccinated_pct: l.fully_vaccinated_pct().value()?,
                })
            })
            .collect();

        leaders.sort_by(|a, b| b.fully_vaccinated_pct.total_cmp(&a.fully_vaccinated_pct));
        leaders.truncate(n);
        leaders
    }

    pub fn correlation_matrix(&self, metrics: &[CovariateMetric]) -> CorrelationMatrix {
        let latest = self.latest();
        let cohort: Vec<&LatestValues> = latest
            .iter()
            .filter(|l| self.in_scope(l.aggregate))
            .collect();

        debug!(
            metrics = metrics.len(),
            cohort = cohort.len(),
            "Computing correlation matrix"
        );
        CorrelationMatrix::compute(metrics, &cohort)
    }

    /// Countries ranked by mean daily new cases over the last `window` days.
    pub fn recent_trends(&self, window: u32) -> Vec<TrendRow> {
        let Some(as_of) = self.as_of else {
            return Vec::new();
        };

        let mut rows: Vec<TrendRow> = self
            .series
            .iter()
            .filter(|s| !s.aggregate)
            .filter_map(|s| trend_for_series(s, as_of, window))
            .collect();

        rows.sort_by(|a, b| b.mean_new_cases.total_cmp(&a.mean_new_cases));
        rows
    }

    /// Countries ranked by how often their rolling mean of new cases rose,
    /// using a `window`-row mean.
    pub fn case_waves(&self, window: usize) -> Vec<WaveSummary> {
        let Some(as_of) = self.as_of else {
            return Vec::new();
        };

        let mut rows: Vec<WaveSummary> = self
            .series
            .iter()
            .filter(|s| !s.aggregate)
            .filter_map(|s| waves_for_series(s, as_of, window))
            .collect();

        rows.sort_by(|a, b| b.waves.cmp(&a.waves));
        rows
    }

    /// Mean mortality of countries above `high_threshold` percent fully
    /// vaccinated, against those below `low_threshold`.
    ///
    /// Countries between the two thresholds, or at either threshold, belong
    /// to neither tier.
    ///
    /// # Errors
    ///
    /// [`InsightsError::InvalidConfig`] if `low_threshold` exceeds
    /// `high_threshold`, since the tiers would then overlap.
    pub fn vaccination_impact(
        &self,
        high_threshold: f64,
        low_threshold: f64,
    ) -> Result<VaccinationImpact> {
        if low_threshold > high_threshold {
            return Err(InsightsError::InvalidConfig(format!(
                "low threshold {} is above high threshold {}",
                low_threshold, high_threshold
            )));
        }

        let latest = self.latest();
        let mut high: Vec<(&str, f64)> = Vec::new();
        let mut low: Vec<(&str, f64)> = Vec::new();

        for l in latest.iter().filter(|l| !l.aggregate) {
            let (Some(pct), Some(mortality)) =
                (l.fully_vaccinated_pct().value(), l.mortality_rate().value())
            else {
                continue;
            };

            if pct > high_threshold {
                high.push((l.country.as_str(), mortality));
            } else if pct < low_threshold {
                low.push((l.country.as_str(), mortality));
            }
        }

        Ok(VaccinationImpact {
            high_threshold,
            low_threshold,
            highly_vaccinated: tier_summary(&high),
            less_vaccinated: tier_summary(&low),
        })
    }

    /// The most recent record for `country` at or before `as_of` (or the
    /// aggregator's reference date).
    ///
    /// Daily counts are the change in cumulative totals since the previous
    /// calendar day's record, falling back to the reported daily value when
    /// that record is absent or no delta can be formed.
    pub fn country_snapshot(
        &self,
        country: &str,
        as_of: Option<NaiveDate>,
    ) -> Option<CountrySnapshot> {
        let as_of = as_of.or(self.as_of)?;
        let series = self.series.iter().find(|s| s.country == country)?;

        let mut previous = None;
        let mut current = None;
        for record in series.until(as_of) {
            previous = current;
            current = Some(record);
        }
        let record = current?;
        let previous = previous.filter(|p| Some(p.date) == record.date.pred_opt());

        let delta = |now: Option<f64>, before: Option<f64>| match (now, before) {
            (Some(n), Some(b)) => Some(n - b),
            _ => None,
        };

        let new_cases = delta(record.total_cases, previous.and_then(|p| p.total_cases))
            .or(record.new_cases);
        let new_deaths = delta(record.total_deaths, previous.and_then(|p| p.total_deaths))
            .or(record.new_deaths);

        Some(CountrySnapshot {
            country: record.country.clone(),
            date: record.date,
            total_cases: record.total_cases,
            total_deaths: record.total_deaths,
            new_cases,
            new_deaths,
            mortality_rate: Rate::from_options(record.total_deaths, record.total_cases),
            people_fully_vaccinated: record.people_fully_vaccinated,
            population: record.population,
            vaccination_rate: Rate::from_options(
                record.people_fully_vaccinated,
                record.population,
            ),
        })
    }

    /// Every entity's latest values, in input order, for export.
    pub fn latest_metrics(&self) -> Vec<LatestMetricsRow> {
        self.latest().iter().map(LatestValues::to_metrics_row).collect()
    }
}

fn tier_summary(members: &[(&str, f64)]) -> TierSummary {
    let rates: Vec<f64> = members.iter().map(|(_, rate)| *rate).collect();
    TierSummary {
        members: members.len(),
        countries: members.iter().map(|(c, _)| c.to_string()).collect(),
        mean_mortality_rate: match mean(&rates) {
            Some(m) => TierMean::Mean(m),
            None => TierMean::NoData,
        },
    }
}
