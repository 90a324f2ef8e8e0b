use thiserror::Error;

/// Errors returned by the RHT aggregator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// A required argument was missing or empty
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
