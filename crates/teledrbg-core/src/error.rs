//! Error taxonomy for the generator and its collaborators.
//!
//! A single unreadable metric is not an error at all: it becomes `null` in
//! the snapshot. Everything that reaches this enum is fatal for the lineage
//! or run that hit it. Nothing is retried.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The telemetry subsystem as a whole could not be queried.
    #[error("telemetry subsystem unavailable: {0}")]
    TelemetryUnavailable(String),

    /// A telemetry query did not return within its bound.
    #[error("telemetry query did not complete within {0:?}")]
    TelemetryTimeout(Duration),

    /// The OS secure random source failed.
    #[error("secure random source failed: {0}")]
    Random(String),

    /// Writing or reading the output destination failed.
    #[error("output sink failed: {0}")]
    Sink(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A lineage aborted; no record was produced for it.
    #[error("lineage {index} aborted: {source}")]
    Lineage {
        index: usize,
        #[source]
        source: Box<Error>,
    },
}

impl From<getrandom::Error> for Error {
    fn from(err: getrandom::Error) -> Self {
        Self::Random(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
