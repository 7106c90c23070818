//! Per-entity "latest values": for every field, the most recent non-null
//! value at or before the reference date.

use crate::analyzers::types::{AggregateRow, LatestMetricsRow, Rate};
use crate::table::Series;
use chrono::NaiveDate;

#[derive(Debug, Clone, Default)]
pub struct LatestValues {
    pub country: String,
    pub aggregate: bool,
    /// Date of the most recent record considered.
    pub last_date: Option<NaiveDate>,

    pub total_cases: Option<f64>,
    pub total_deaths: Option<f64>,
    pub total_vaccinations: Option<f64>,
    pub people_vaccinated: Option<f64>,
    pub people_fully_vaccinated: Option<f64>,
    pub population: Option<f64>,
    pub population_density: Option<f64>,
    pub median_age: Option<f64>,
    pub gdp_per_capita: Option<f64>,
    pub life_expectancy: Option<f64>,
    pub human_development_index: Option<f64>,
}

impl LatestValues {
    /// Folds a series up to `as_of`. Returns `None` if the entity has no
    /// record on or before that date.
    pub fn from_series(series: &Series<'_>, as_of: NaiveDate) -> Option<Self> {
        let mut latest = LatestValues {
            country: series.country.to_string(),
            aggregate: series.aggregate,
            ..Default::default()
        };

        for record in series.until(as_of) {
            latest.last_date = Some(record.date);

            macro_rules! carry {
                ($($field:ident),+ $(,)?) => {
                    $(
                        if record.$field.is_some() {
                            latest.$field = record.$field;
                        }
                    )+
                };
            }

            carry!(
                total_cases,
                total_deaths,
                total_vaccinations,
                people_vaccinated,
                people_fully_vaccinated,
                population,
                population_density,
                median_age,
                gdp_per_capita,
                life_expectancy,
                human_development_index,
            );
        }

        latest.last_date.map(|_| latest)
    }

    pub fn mortality_rate(&self) -> Rate {
        Rate::from_options(self.total_deaths, self.total_cases)
    }

    pub fn vaccinated_pct(&self) -> Rate {
        Rate::from_options(self.people_vaccinated, self.population).percent()
    }

    pub fn fully_vaccinated_pct(&self) -> Rate {
        Rate::from_options(self.people_fully_vaccinated, self.population).percent()
    }

    pub fn to_aggregate_row(&self) -> AggregateRow {
        AggregateRow {
            country: self.country.clone(),
            aggregate: self.aggregate,
            total_cases: self.total_cases,
            total_deaths: self.total_deaths,
            mortality_rate: self.mortality_rate(),
            vaccinated_pct: self.vaccinated_pct(),
            fully_vaccinated_pct: self.fully_vaccinated_pct(),
        }
    }

    pub fn to_metrics_row(&self) -> LatestMetricsRow {
        LatestMetricsRow {
            country: self.country.clone(),
            aggregate: self.aggregate,
            last_date: self.last_date,
            total_cases: self.total_cases,
            total_deaths: self.total_deaths,
            total_vaccinations: self.total_vaccinations,
            people_vaccinated: self.people_vaccinated,
            people_fully_vaccinated: self.people_fully_vaccinated,
            population: self.population,
            mortality_rate: self.mortality_rate(),
            vaccinated_pct: self.vaccinated_pct(),
            fully_vaccinated_pct: self.fully_vaccinated_pct(),
            gdp_per_capita: self.gdp_per_capita,
            population_density: self.population_density,
            life_expectancy: self.life_expectancy,
            median_age: self.median_age,
            human_development_index: self.human_development_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use crate::table::tests::{date, record};

    #[test]
    fn test_carries_last_non_null_value_per_field() {
        let mut day1 = record("Kenya", "2022-01-01");
        day1.total_cases = Some(100.0);
        day1.people_fully_vaccinated = Some(40.0);
        day1.population = Some(1000.0);
        let mut day2 = record("Kenya", "2022-01-02");
        day2.total_cases = Some(120.0);
        // vaccinations not reported on day 2

        let table = Table::new(vec![day1, day2]);
        let series = table.series();
        let latest = LatestValues::from_series(&series[0], date("2022-01-02")).unwrap();

        assert_eq!(latest.last_date, Some(date("2022-01-02")));
        assert_eq!(latest.total_cases, Some(120.0));
        assert_eq!(latest.people_fully_vaccinated, Some(40.0));
        assert_eq!(latest.fully_vaccinated_pct(), Rate::Value(4.0));
    }

    #[test]
    fn test_ignores_records_after_reference_date() {
        let mut day1 = record("Kenya", "2022-01-01");
        day1.total_cases = Some(100.0);
        let mut day2 = record("Kenya", "2022-01-05");
        day2.total_cases = Some(500.0);

        let table = Table::new(vec![day1, day2]);
        let series = table.series();

        let latest = LatestValues::from_series(&series[0], date("2022-01-03")).unwrap();
        assert_eq!(latest.total_cases, Some(100.0));

        assert!(LatestValues::from_series(&series[0], date("2021-12-31")).is_none());
    }

    #[test]
    fn test_mortality_undefined_without_cases() {
        let mut day = record("Nowhere", "2022-01-01");
        day.total_cases = Some(0.0);
        day.total_deaths = Some(0.0);

        let table = Table::new(vec![day]);
        let series = table.series();
        let latest = LatestValues::from_series(&series[0], date("2022-01-01")).unwrap();

        assert!(latest.mortality_rate().is_undefined());
    }
}
