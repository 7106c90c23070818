//! Descriptive statistics over the COVID-19 table.
//!
//! [`aggregator::StatsAggregator`] is the entry point: it derives each
//! entity's latest values and builds global totals, ranking tables, the
//! covariate correlation matrix, rolling trends and the vaccination-tier
//! mortality comparison. Rates stay unrounded here; rounding happens only
//! when the report is rendered.

pub mod aggregator;
pub mod correlation;
pub mod latest;
pub mod trends;
pub mod types;
pub mod utility;

pub use aggregator::StatsAggregator;
pub use correlation::{CorrelationMatrix, CovariateMetric};
pub use types::{Rate, TierMean};
