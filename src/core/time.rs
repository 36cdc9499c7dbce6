//! Shared timestamp/event helpers.

use chrono::{TimeZone, Utc};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Unix-epoch milliseconds; the unit of every timestamp column in the catalog.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// `YYYYMMDD` stamp (UTC) used in provisioned store file names.
pub fn date_stamp(epoch_ms: i64) -> String {
    match Utc.timestamp_millis_opt(epoch_ms).single() {
        Some(dt) => dt.format("%Y%m%d").to_string(),
        None => "00000000".to_string(),
    }
}

/// UTC `YYYY-MM-DD HH:MM:SS` rendering for text output.
pub fn format_epoch_ms(epoch_ms: i64) -> String {
    match Utc.timestamp_millis_opt(epoch_ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => epoch_ms.to_string(),
    }
}

pub fn new_id() -> String {
    Ulid::new().to_string()
}

/// Standard command response envelope shape used by the CLI.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_epoch_ms(),
        "event_id": new_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
