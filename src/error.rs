use thiserror::Error;

/// Everything that can go wrong in one refresh cycle.
///
/// None of these are fatal: the scheduler turns them into an error snapshot.
/// The `Display` text is what readers of that snapshot see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    /// Transport failure, timeout, or a non-success status.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// The upstream rejected the time window, and the lifetime fallback did too.
    #[error("upstream rejected the requested date range")]
    InvalidDateRange,
    /// Body not parseable, or not shaped like a list of entries.
    #[error("{0}")]
    MalformedPayload(String),
    #[error("no data found for tag")]
    NoMatchingData,
    #[error("malformed entry: {field}")]
    MalformedEntry { field: &'static str },
}

impl CycleError {
    pub fn invalid_structure() -> Self {
        Self::MalformedPayload("invalid data structure".to_string())
    }

    pub fn malformed_entry(field: &'static str) -> Self {
        Self::MalformedEntry { field }
    }
}
