use crate::types::Snapshot;

/// Emit a snapshot as a single JSON line to stdout.
pub fn report_snapshot(snapshot: &Snapshot) {
    if let Ok(json) = serde_json::to_string(snapshot) {
        println!("{json}");
    }
}

/// Emit a snapshot as pretty-printed JSON to stdout.
pub fn report_snapshot_pretty(snapshot: &Snapshot) {
    if let Ok(json) = serde_json::to_string_pretty(snapshot) {
        println!("{json}");
    }
}
