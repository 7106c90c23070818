//! Error type shared by the loader, the aggregator and the report writer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightsError {
    /// The input table is absent, or holds no usable rows.
    #[error("no input data: {0}")]
    MissingInput(String),

    #[error("could not parse {path}: {source}")]
    Unparseable {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InsightsError>;
