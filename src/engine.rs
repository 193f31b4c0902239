use std::str::FromStr;

use num_format::{Locale, ToFormattedString};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LeaderboardConfig;
use crate::error::CycleError;
use crate::types::{Leaderboard, LeaderboardEntry, RawEntry, Snapshot};

/// Turn a raw stats payload into the snapshot to publish.
///
/// Never returns a partial leaderboard: any problem with the payload or with
/// a selected entry yields `Snapshot::Error` instead.
pub fn transform(payload: &Value, config: &LeaderboardConfig) -> Snapshot {
    let result = build_leaderboard(payload, config);
    if let Err(e) = &result {
        warn!("Transform failed: {e}");
    }
    Snapshot::from(result)
}

/// Filter, rank and ticket the entries of `payload`.
///
/// Steps: keep entries whose `campaignCode` equals the configured tag exactly,
/// stable-sort by `wagerAmount` descending, keep the first `max_entries`,
/// then assign ranks and `floor(wager / ticket_divisor)` tickets.
pub fn build_leaderboard(
    payload: &Value,
    config: &LeaderboardConfig,
) -> Result<Leaderboard, CycleError> {
    let items = payload.as_array().ok_or_else(CycleError::invalid_structure)?;

    let mut filtered = Vec::new();
    for item in items {
        let obj = item.as_object().ok_or_else(CycleError::invalid_structure)?;
        let tag = obj.get("campaignCode").and_then(Value::as_str);
        if tag == Some(config.campaign_tag.as_str()) {
            filtered.push(parse_entry(item)?);
        }
    }
    debug!(
        "{} of {} entries match campaign tag {:?}",
        filtered.len(),
        items.len(),
        config.campaign_tag
    );

    if filtered.is_empty() {
        return Err(CycleError::NoMatchingData);
    }

    // sort_by is stable: equal wagers keep upstream order
    filtered.sort_by(|a, b| b.wager_amount.cmp(&a.wager_amount));
    filtered.truncate(config.max_entries);

    let mut total_tickets: u64 = 0;
    let entries: Vec<LeaderboardEntry> = filtered
        .into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let tickets = ticket_count(raw.wager_amount, config.ticket_divisor);
            total_tickets = total_tickets.saturating_add(tickets);
            LeaderboardEntry {
                rank: (i + 1) as u32,
                wager_formatted: format_currency(raw.wager_amount),
                wager_amount: raw.wager_amount,
                ticket_count: tickets,
                tickets_formatted: format_count(tickets),
                username: raw.username,
            }
        })
        .collect();

    Ok(Leaderboard {
        entries,
        total_tickets,
        total_tickets_formatted: format_count(total_tickets),
    })
}

/// Extract a `RawEntry` from one element of the payload.
fn parse_entry(item: &Value) -> Result<RawEntry, CycleError> {
    let username = item
        .get("username")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or(CycleError::malformed_entry("username"))?;
    let wager_amount = item
        .get("wagerAmount")
        .and_then(parse_decimal)
        .filter(|amount| !amount.is_sign_negative())
        .ok_or(CycleError::malformed_entry("wagerAmount"))?;
    let campaign_code = item
        .get("campaignCode")
        .and_then(Value::as_str)
        .ok_or(CycleError::malformed_entry("campaignCode"))?;

    Ok(RawEntry {
        username: username.to_string(),
        wager_amount,
        campaign_code: campaign_code.to_string(),
    })
}

/// Read a JSON number or numeric string as a `Decimal`.
///
/// Magnitudes beyond `Decimal`'s range saturate to `Decimal::MAX`/`MIN`
/// instead of being rejected.
fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
        .or_else(|| saturate(&text))
}

fn saturate(text: &str) -> Option<Decimal> {
    let f = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Some(if f.abs() < 1.0 {
        Decimal::ZERO
    } else if f.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    })
}

/// `floor(wager / divisor)`; the fractional remainder is discarded.
pub fn ticket_count(wager: Decimal, divisor: u64) -> u64 {
    if divisor == 0 || wager <= Decimal::ZERO {
        return 0;
    }
    (wager / Decimal::from(divisor))
        .floor()
        .to_u64()
        .unwrap_or(u64::MAX)
}

/// `$` followed by the amount with thousands separators and 2 decimals.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let abs = rounded.abs();
    let whole = abs.trunc();
    let cents = ((abs - whole) * Decimal::ONE_HUNDRED).to_u32().unwrap_or(0);
    let whole = whole.to_u128().unwrap_or(0).to_formatted_string(&Locale::en);
    format!("{sign}${whole}.{cents:02}")
}

/// Integer with thousands separators.
pub fn format_count(n: u64) -> String {
    n.to_formatted_string(&Locale::en)
}
