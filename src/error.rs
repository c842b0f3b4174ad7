//! Error types for trackers, identifier mappers and throttle configuration.
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`LimitTracker`](crate::rate_limit::LimitTracker).
///
/// The in-memory tracker never fails; these variants exist for backends that
/// keep their counters somewhere else.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// The backing store could not be reached or returned an error.
    #[error("tracker backend unavailable: {0}")]
    Unavailable(String),
    /// The backing store answered with data the tracker could not use.
    #[error("tracker backend returned corrupt state for id {id}: {reason}")]
    Corrupt {
        /// Identifier whose state was unreadable.
        id: u64,
        /// What was wrong with it.
        reason: String,
    },
}

/// Failure to derive a throttling identifier from a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MapperError {
    /// A header the mapper keys on was not present.
    #[error("missing header {0}")]
    MissingHeader(String),
    /// The header was present but not valid visible ASCII.
    #[error("header {0} is not valid text")]
    InvalidHeader(String),
    /// Mapper-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Errors produced when validating tracker configuration.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Window length must be at least one millisecond.
    #[error("window length must be >= 1ms (got {0:?})")]
    InvalidWindowLength(Duration),
    /// Purge interval must be at least one millisecond.
    #[error("purge interval must be >= 1ms (got {0:?})")]
    InvalidPurgeInterval(Duration),
}
