pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod reporter;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_support;

/// Affiliate statistics API base URL.
pub const DEFAULT_STATS_API_BASE: &str = "https://affiliate.example";

/// Marker the stats API puts in a 400 body when the requested window is rejected.
pub const INVALID_DATE_MARKER: &str = "INVALID_DATE";

/// Environment variable that overrides `upstream.api_key` from the config file.
pub const API_KEY_VAR: &str = "LEADERBOARD_API_KEY";
