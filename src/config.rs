use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::{API_KEY_VAR, DEFAULT_STATS_API_BASE};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Stats API access.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Affiliate API key, embedded in the request path.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Fixed start of the stats window (unix seconds).
    #[serde(default = "default_window_start")]
    pub window_start: i64,
    /// How far behind "now" the window end is placed, so the upstream only
    /// sees windows it has finalized.
    #[serde(default = "default_end_time_margin")]
    pub end_time_margin_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Ranking and ticket rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LeaderboardConfig {
    /// Only entries with exactly this `campaignCode` are ranked.
    #[serde(default = "default_campaign_tag")]
    pub campaign_tag: String,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// One ticket per this many units wagered.
    #[serde(default = "default_ticket_divisor")]
    pub ticket_divisor: u64,
}

/// Runtime settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    /// Pause between the end of one refresh cycle and the start of the next.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_base_url() -> String {
    DEFAULT_STATS_API_BASE.to_string()
}

fn default_window_start() -> i64 {
    1_731_312_060
}

fn default_end_time_margin() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    20
}

fn default_campaign_tag() -> String {
    "Red".to_string()
}

fn default_max_entries() -> usize {
    11
}

fn default_ticket_divisor() -> u64 {
    250
}

fn default_refresh_interval() -> u64 {
    90
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            window_start: default_window_start(),
            end_time_margin_secs: default_end_time_margin(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            campaign_tag: default_campaign_tag(),
            max_entries: default_max_entries(),
            ticket_divisor: default_ticket_divisor(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn end_time_margin(&self) -> Duration {
        Duration::from_secs(self.end_time_margin_secs)
    }
}

impl SettingsConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    ///
    /// A non-empty `LEADERBOARD_API_KEY` in the environment replaces the
    /// file's `upstream.api_key`. The result is validated before returning.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config = Self::parse(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.apply_key_override(std::env::var(API_KEY_VAR).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse config from TOML text without validating it.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Replace `upstream.api_key` with `key` unless it is missing or blank.
    pub fn apply_key_override(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.upstream.api_key = key;
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.upstream.api_key.trim().is_empty() {
            anyhow::bail!("upstream.api_key is empty (set it in the config or via {API_KEY_VAR})");
        }
        Url::parse(&self.upstream.base_url)
            .with_context(|| format!("invalid upstream.base_url {:?}", self.upstream.base_url))?;
        if self.upstream.request_timeout_secs == 0 {
            anyhow::bail!("upstream.request_timeout_secs must be positive");
        }
        if self.leaderboard.ticket_divisor == 0 {
            anyhow::bail!("leaderboard.ticket_divisor must be positive");
        }
        if self.leaderboard.max_entries == 0 {
            anyhow::bail!("leaderboard.max_entries must be positive");
        }
        if self.settings.refresh_interval_secs == 0 {
            anyhow::bail!("settings.refresh_interval_secs must be positive");
        }
        Ok(())
    }
}
