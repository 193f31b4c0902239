use rust_decimal::Decimal;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::error::CycleError;

/// One participant record as returned by the stats API.
///
/// Only exists for the duration of a refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub username: String,
    pub wager_amount: Decimal,
    pub campaign_code: String,
}

/// A ranked participant on the published leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: u32,
    pub username: String,
    pub wager_amount: Decimal,
    /// e.g. `$1,234.50`
    pub wager_formatted: String,
    pub ticket_count: u64,
    pub tickets_formatted: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaderboard {
    /// Descending by wager, at most `max_entries` long.
    pub entries: Vec<LeaderboardEntry>,
    /// Sum of `ticket_count` over `entries`.
    pub total_tickets: u64,
    pub total_tickets_formatted: String,
}

impl Leaderboard {
    /// The placeholder served before the first cycle completes.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            total_tickets: 0,
            total_tickets_formatted: "0".to_string(),
        }
    }
}

/// The published result of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Leaderboard(Leaderboard),
    Error { message: String },
}

impl Snapshot {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn leaderboard(&self) -> Option<&Leaderboard> {
        match self {
            Self::Leaderboard(board) => Some(board),
            Self::Error { .. } => None,
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::Leaderboard(Leaderboard::empty())
    }
}

impl From<Result<Leaderboard, CycleError>> for Snapshot {
    fn from(result: Result<Leaderboard, CycleError>) -> Self {
        match result {
            Ok(board) => Self::Leaderboard(board),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// Wire shape of one ranked row: `{username, wager, tickets}`.
#[derive(Serialize)]
struct WagererView<'a> {
    username: &'a str,
    wager: &'a str,
    tickets: &'a str,
}

/// `top1..topN` in rank order. Serialized by hand so the keys keep rank
/// order instead of sorting as strings (`top10` before `top2`).
struct TopWagerers<'a>(&'a [LeaderboardEntry]);

impl Serialize for TopWagerers<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in self.0 {
            map.serialize_entry(
                &format!("top{}", entry.rank),
                &WagererView {
                    username: &entry.username,
                    wager: &entry.wager_formatted,
                    tickets: &entry.tickets_formatted,
                },
            )?;
        }
        map.end()
    }
}

/// Renders `{"top_wagerers": {...}, "total_tickets": "..."}` or `{"error": "..."}`.
impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Leaderboard(board) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("top_wagerers", &TopWagerers(&board.entries))?;
                map.serialize_entry("total_tickets", &board.total_tickets_formatted)?;
                map.end()
            }
            Self::Error { message } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", message)?;
                map.end()
            }
        }
    }
}
