//! Pearson correlation between country-level covariates.

use crate::analyzers::latest::LatestValues;
use crate::analyzers::types::Rate;
use crate::analyzers::utility::pearson;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A per-country quantity that can enter the correlation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovariateMetric {
    MortalityRate,
    VaccinationRate,
    FullyVaccinatedRate,
    MedianAge,
    GdpPerCapita,
    PopulationDensity,
    LifeExpectancy,
    HumanDevelopmentIndex,
}

impl CovariateMetric {
    pub const DEFAULT: &'static [CovariateMetric] = &[
        CovariateMetric::MortalityRate,
        CovariateMetric::VaccinationRate,
        CovariateMetric::MedianAge,
        CovariateMetric::GdpPerCapita,
        CovariateMetric::PopulationDensity,
        CovariateMetric::LifeExpectancy,
        CovariateMetric::HumanDevelopmentIndex,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CovariateMetric::MortalityRate => "mortality_rate",
            CovariateMetric::VaccinationRate => "vaccination_rate",
            CovariateMetric::FullyVaccinatedRate => "fully_vaccinated_rate",
            CovariateMetric::MedianAge => "median_age",
            CovariateMetric::GdpPerCapita => "gdp_per_capita",
            CovariateMetric::PopulationDensity => "population_density",
            CovariateMetric::LifeExpectancy => "life_expectancy",
            CovariateMetric::HumanDevelopmentIndex => "human_development_index",
        }
    }

    /// Column header used in the markdown report.
    pub fn label(self) -> &'static str {
        match self {
            CovariateMetric::MortalityRate => "Mortality Rate",
            CovariateMetric::VaccinationRate => "Vaccination Rate",
            CovariateMetric::FullyVaccinatedRate => "Fully Vaccinated Rate",
            CovariateMetric::MedianAge => "Median Age",
            CovariateMetric::GdpPerCapita => "GDP per Capita",
            CovariateMetric::PopulationDensity => "Population Density",
            CovariateMetric::LifeExpectancy => "Life Expectancy",
            CovariateMetric::HumanDevelopmentIndex => "HDI",
        }
    }

    pub fn value(self, latest: &LatestValues) -> Option<f64> {
        match self {
            CovariateMetric::MortalityRate => latest.mortality_rate().value(),
            CovariateMetric::VaccinationRate => latest.vaccinated_pct().value(),
            CovariateMetric::FullyVaccinatedRate => latest.fully_vaccinated_pct().value(),
            CovariateMetric::MedianAge => latest.median_age,
            CovariateMetric::GdpPerCapita => latest.gdp_per_capita,
            CovariateMetric::PopulationDensity => latest.population_density,
            CovariateMetric::LifeExpectancy => latest.life_expectancy,
            CovariateMetric::HumanDevelopmentIndex => latest.human_development_index,
        }
    }
}

impl fmt::Display for CovariateMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Symmetric matrix of Pearson coefficients, indexed in request order.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    metrics: Vec<CovariateMetric>,
    cells: Vec<Vec<Rate>>,
    /// Number of countries with both values present, per cell.
    samples: Vec<Vec<usize>>,
}

impl CorrelationMatrix {
    /// Computes every unordered pair once and mirrors it.
    ///
    /// Duplicate metrics are dropped, keeping first occurrence, so the
    /// diagonal is always the self-correlation.
    pub fn compute(metrics: &[CovariateMetric], entities: &[&LatestValues]) -> Self {
        let mut unique: Vec<CovariateMetric> = Vec::with_capacity(metrics.len());
        for metric in metrics {
            if !unique.contains(metric) {
                unique.push(*metric);
            }
        }

        let n = unique.len();
        let mut cells = vec![vec![Rate::Undefined; n]; n];
        let mut samples = vec![vec![0usize; n]; n];

        for i in 0..n {
            cells[i][i] = Rate::Value(1.0);
            samples[i][i] = entities
                .iter()
                .filter(|e| unique[i].value(e).is_some())
                .count();

            for j in (i + 1)..n {
                let (xs, ys): (Vec<f64>, Vec<f64>) = entities
                    .iter()
                    .filter_map(|e| Some((unique[i].value(e)?, unique[j].value(e)?)))
                    .unzip();

                let coefficient = match pearson(&xs, &ys) {
                    Some(r) => Rate::Value(r),
                    None => Rate::Undefined,
                };

                cells[i][j] = coefficient;
                cells[j][i] = coefficient;
                samples[i][j] = xs.len();
                samples[j][i] = xs.len();
            }
        }

        Self {
            metrics: unique,
            cells,
            samples,
        }
    }

    pub fn metrics(&self) -> &[CovariateMetric] {
        &self.metrics
    }

    fn index(&self, metric: CovariateMetric) -> Option<usize> {
        self.metrics.iter().position(|m| *m == metric)
    }

    pub fn get(&self, a: CovariateMetric, b: CovariateMetric) -> Option<Rate> {
        Some(self.cells[self.index(a)?][self.index(b)?])
    }

    pub fn sample_size(&self, a: CovariateMetric, b: CovariateMetric) -> Option<usize> {
        Some(self.samples[self.index(a)?][self.index(b)?])
    }
}

struct MatrixRow<'a> {
    matrix: &'a CorrelationMatrix,
    row: usize,
}

impl Serialize for MatrixRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.matrix.metrics.len()))?;
        for (col, metric) in self.matrix.metrics.iter().enumerate() {
            map.serialize_entry(metric.key(), &self.matrix.cells[self.row][col])?;
        }
        map.end()
    }
}

/// Serializes as `{ metric: { metric: coefficient } }` in request order.
impl Serialize for CorrelationMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.metrics.len()))?;
        for (row, metric) in self.metrics.iter().enumerate() {
            map.serialize_entry(metric.key(), &MatrixRow { matrix: self, row })?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(gdp: Option<f64>, life: Option<f64>, age: Option<f64>) -> LatestValues {
        LatestValues {
            gdp_per_capita: gdp,
            life_expectancy: life,
            median_age: age,
            ..Default::default()
        }
    }

    #[test]
    fn test_matrix_is_symmetric_with_unit_diagonal() {
        let entities = vec![
            entity(Some(1000.0), Some(60.0), Some(20.0)),
            entity(Some(5000.0), Some(70.0), Some(35.0)),
            entity(Some(20000.0), Some(78.0), Some(30.0)),
            entity(Some(40000.0), Some(82.0), Some(44.0)),
        ];
        let refs: Vec<&LatestValues> = entities.iter().collect();
        let metrics = [
            CovariateMetric::GdpPerCapita,
            CovariateMetric::LifeExpectancy,
            CovariateMetric::MedianAge,
        ];

        let matrix = CorrelationMatrix::compute(&metrics, &refs);

        for a in metrics {
            assert_eq!(matrix.get(a, a), Some(Rate::Value(1.0)));
            for b in metrics {
                assert_eq!(matrix.get(a, b), matrix.get(b, a));
            }
        }
        let r = matrix
            .get(CovariateMetric::GdpPerCapita, CovariateMetric::LifeExpectancy)
            .and_then(Rate::value)
            .unwrap();
        assert!(r > 0.8 && r <= 1.0);
    }

    #[test]
    fn test_pairs_use_only_complete_entities() {
        let entities = vec![
            entity(Some(1.0), Some(2.0), None),
            entity(Some(2.0), Some(4.0), Some(1.0)),
            entity(Some(3.0), None, Some(2.0)),
        ];
        let refs: Vec<&LatestValues> = entities.iter().collect();
        let metrics = [
            CovariateMetric::GdpPerCapita,
            CovariateMetric::LifeExpectancy,
            CovariateMetric::MedianAge,
        ];

        let matrix = CorrelationMatrix::compute(&metrics, &refs);

        assert_eq!(
            matrix.sample_size(CovariateMetric::GdpPerCapita, CovariateMetric::LifeExpectancy),
            Some(2)
        );
        // only one entity has both life expectancy and median age
        assert_eq!(
            matrix.get(CovariateMetric::LifeExpectancy, CovariateMetric::MedianAge),
            Some(Rate::Undefined)
        );
    }

    #[test]
    fn test_duplicate_metrics_are_collapsed() {
        let entities = vec![entity(Some(1.0), None, None)];
        let refs: Vec<&LatestValues> = entities.iter().collect();
        let matrix = CorrelationMatrix::compute(
            &[CovariateMetric::GdpPerCapita, CovariateMetric::GdpPerCapita],
            &refs,
        );
        assert_eq!(matrix.metrics().len(), 1);
    }

    #[test]
    fn test_serializes_as_nested_map() {
        let matrix = CorrelationMatrix::compute(&[CovariateMetric::MedianAge], &[]);
        let json = serde_json::to_string(&matrix).unwrap();
        assert_eq!(json, r#"{"median_age":{"median_age":1.0}}"#);
    }
}
