//! Normalization of loosely shaped work-order payloads.
//!
//! Rows written by older clients, board exports and hand-edited JSON disagree
//! on key casing, number encoding and status spelling. [`normalize`] accepts
//! all of them and produces a [`WorkOrder`] whose ledger is well formed:
//!
//! - keys may be `snake_case` or `camelCase`
//! - timer values may be integers, floats or numeric strings; anything else,
//!   and any negative value, reads as 0
//! - unknown timer keys are dropped
//! - a missing `last_status_change` defaults to `created_at`
//! - missing collections default to empty
//!
//! Only a missing `id` or an unparseable `status` is fatal. Every other
//! repair is logged at `warn` and listed in [`Ingested::repairs`].
//!
//! Nothing in here touches ledger arithmetic.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::warn;

use crate::error::ErrorCode;
use crate::ledger::{self, StatusTimers};
use crate::model::{
    CostBreakdown, EditLock, ParseEnumError, PartRequest, PartStatus, Priority, ServiceItem,
    Status, WorkOrder,
};

/// Fatal ingestion failures.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("payload has no `id`")]
    MissingId,

    #[error("work order {order_id}: {source}")]
    UnknownStatus {
        order_id: String,
        #[source]
        source: ParseEnumError,
    },
}

impl IngestError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownStatus { .. } => ErrorCode::InvalidEnumValue,
            Self::Json(_) | Self::NotAnObject | Self::MissingId => ErrorCode::MalformedPayload,
        }
    }
}

/// A normalized order plus the repairs applied to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub order: WorkOrder,
    pub repairs: Vec<String>,
}

/// A number as it shows up in the wild.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LenientNumber {
    Whole(i64),
    Fractional(f64),
    Text(String),
    Other(Value),
}

impl LenientNumber {
    #[must_use]
    pub fn read(value: &Value) -> Self {
        Self::deserialize(value).unwrap_or_else(|_| Self::Other(value.clone()))
    }

    /// Whole seconds, truncating fractions. `None` for non-numeric input.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_seconds(&self) -> Option<i64> {
        match self {
            Self::Whole(n) => Some(*n),
            Self::Fractional(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| Self::Fractional(s.parse().ok()?).as_seconds())
            }
            Self::Fractional(_) | Self::Other(_) => None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Whole(n) => Some(*n as f64),
            Self::Fractional(f) => Some(*f).filter(|f| f.is_finite()),
            Self::Text(s) => s
                .trim()
                .replace(',', ".")
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite()),
            Self::Other(_) => None,
        }
    }
}

/// `vehicleId`, `vehicle-id` and `vehicle_id` all become `vehicle_id`.
#[must_use]
pub fn snake_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.trim().chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c == '-' || c == ' ' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    const fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    fn get(&self, names: &[&str]) -> Option<&'a Value> {
        self.map
            .iter()
            .find(|(k, v)| !v.is_null() && names.contains(&snake_key(k).as_str()))
            .map(|(_, v)| v)
    }

    fn text(&self, names: &[&str]) -> Option<String> {
        self.get(names).and_then(text_of)
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn bool_of(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "sim" | "yes" => Some(true),
            "false" | "0" | "nao" | "não" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// RFC 3339 text, `YYYY-MM-DD HH:MM:SS` (UTC), or a Unix epoch in seconds or
/// milliseconds.
#[must_use]
pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    if let Value::String(s) = value {
        let s = s.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
            return Some(parsed.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Some(naive.and_utc());
        }
    }
    let epoch = LenientNumber::read(value).as_seconds()?;
    if epoch.abs() >= 100_000_000_000 {
        Utc.timestamp_millis_opt(epoch).single()
    } else {
        Utc.timestamp_opt(epoch, 0).single()
    }
}

/// Rebuild a ledger from a loosely shaped timer map.
///
/// Unknown keys are dropped and invalid or negative values read as 0; each
/// repair is appended to `repairs`.
pub fn status_timers_from_value(value: &Value, repairs: &mut Vec<String>) -> StatusTimers {
    let mut timers = StatusTimers::default();
    let Value::Object(map) = value else {
        repairs.push(format!("status_timers: expected an object, got {value}; zeroed"));
        return timers;
    };

    for (key, raw) in map {
        let Ok(status) = Status::from_str(key) else {
            repairs.push(format!("status_timers: dropped unknown key {key:?}"));
            continue;
        };
        match LenientNumber::read(raw).as_seconds() {
            Some(seconds) if seconds >= 0 => timers.set(status, seconds),
            Some(seconds) => {
                repairs.push(format!("status_timers.{status}: negative value {seconds} read as 0"));
            }
            None => repairs.push(format!("status_timers.{status}: invalid value {raw} read as 0")),
        }
    }
    timers
}

fn service_from_value(value: &Value, index: usize, repairs: &mut Vec<String>) -> Option<ServiceItem> {
    let Value::Object(map) = value else {
        repairs.push(format!("services[{index}]: not an object, dropped"));
        return None;
    };
    let fields = Fields::new(map);
    let mut item = ServiceItem::new(
        fields.text(&["id", "service_id"]).unwrap_or_else(|| format!("svc-{}", index + 1)),
        fields.text(&["description", "name"]).unwrap_or_default(),
        fields.text(&["category"]).unwrap_or_default(),
    );
    item.completed = fields.get(&["completed", "done"]).and_then(bool_of).unwrap_or(false);
    item.actual_seconds = fields
        .get(&["actual_seconds", "actual_time"])
        .and_then(|v| LenientNumber::read(v).as_seconds())
        .unwrap_or(0)
        .max(0);
    item.started_at = fields.get(&["started_at", "timer_started_at"]).and_then(parse_instant);
    item.is_timer_active = fields
        .get(&["is_timer_active", "timer_active"])
        .and_then(bool_of)
        .unwrap_or(false)
        && item.started_at.is_some();
    Some(item)
}

fn part_from_value(value: &Value, index: usize, repairs: &mut Vec<String>) -> Option<PartRequest> {
    let Value::Object(map) = value else {
        repairs.push(format!("parts[{index}]: not an object, dropped"));
        return None;
    };
    let fields = Fields::new(map);
    let Some(sku) = fields.text(&["sku", "part_id", "code"]) else {
        repairs.push(format!("parts[{index}]: no sku, dropped"));
        return None;
    };
    let qty = fields
        .get(&["qty", "quantity"])
        .and_then(|v| LenientNumber::read(v).as_seconds())
        .and_then(|q| u32::try_from(q).ok())
        .filter(|q| *q > 0)
        .unwrap_or(1);
    let status = fields
        .text(&["status"])
        .and_then(|s| PartStatus::from_str(&s).ok())
        .unwrap_or_default();
    Some(PartRequest { sku, qty, status })
}

fn list<T>(
    value: Option<&Value>,
    name: &str,
    repairs: &mut Vec<String>,
    each: impl Fn(&Value, usize, &mut Vec<String>) -> Option<T>,
) -> Vec<T> {
    match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, v)| each(v, i, repairs))
            .collect(),
        Some(other) => {
            repairs.push(format!("{name}: expected an array, got {other}; emptied"));
            Vec::new()
        }
    }
}

fn hours(fields: &Fields<'_>, names: &[&str]) -> f64 {
    fields
        .get(names)
        .and_then(|v| LenientNumber::read(v).as_f64())
        .unwrap_or(0.0)
}

/// Parse `raw` as JSON and normalize it.
///
/// # Errors
///
/// See [`normalize`]; additionally fails on invalid JSON.
pub fn normalize_str(raw: &str, now: DateTime<Utc>) -> Result<Ingested, IngestError> {
    let value: Value = serde_json::from_str(raw)?;
    normalize(&value, now)
}

/// Normalize one payload. `now` stands in for a missing `created_at`.
///
/// # Errors
///
/// Returns [`IngestError`] for a non-object payload, a missing `id`, or a
/// status that matches none of the five lifecycle statuses.
pub fn normalize(raw: &Value, now: DateTime<Utc>) -> Result<Ingested, IngestError> {
    let Value::Object(map) = raw else {
        return Err(IngestError::NotAnObject);
    };
    let fields = Fields::new(map);
    let id = fields.text(&["id", "order_id"]).ok_or(IngestError::MissingId)?;
    let mut repairs = Vec::new();

    let status = match fields.text(&["status"]) {
        Some(text) => Status::from_str(&text).map_err(|source| IngestError::UnknownStatus {
            order_id: id.clone(),
            source,
        })?,
        None => {
            repairs.push("status: missing, defaulted to aguardando".to_string());
            Status::Aguardando
        }
    };

    let created_at = fields.get(&["created_at"]).and_then(parse_instant).unwrap_or_else(|| {
        repairs.push("created_at: missing or unreadable, defaulted to ingestion time".to_string());
        now
    });

    let mut order = WorkOrder::new(
        id,
        fields.text(&["vehicle_id", "vehicle"]).unwrap_or_default(),
        fields.text(&["created_by"]).unwrap_or_default(),
        created_at,
    );
    order.status = status;
    order.mechanic_id = fields.text(&["mechanic_id", "mechanic"]);
    order.supervisor_id = fields.text(&["supervisor_id"]);
    order.workshop_unit = fields.text(&["workshop_unit", "unit"]);
    order.category = fields.text(&["category", "service_category"]);
    order.warehouse_id = fields.text(&["warehouse_id"]);

    if let Some(text) = fields.text(&["priority"]) {
        order.priority = Priority::from_str(&text).unwrap_or_else(|_| {
            repairs.push(format!("priority: unknown value {text:?}, defaulted to normal"));
            Priority::Normal
        });
    }

    order.costs = match fields.get(&["costs"]) {
        Some(Value::Object(costs)) => {
            let costs = Fields::new(costs);
            CostBreakdown {
                labor: hours(&costs, &["labor", "labor_cost"]),
                parts: hours(&costs, &["parts", "parts_cost"]),
                other: hours(&costs, &["other", "other_cost"]),
            }
        }
        _ => CostBreakdown {
            labor: hours(&fields, &["labor_cost"]),
            parts: hours(&fields, &["parts_cost"]),
            other: hours(&fields, &["other_cost"]),
        },
    };

    order.estimated_hours = hours(&fields, &["estimated_hours"]);
    order.actual_hours = hours(&fields, &["actual_hours"]);

    order.services = list(fields.get(&["services"]), "services", &mut repairs, service_from_value);
    order.parts = list(fields.get(&["parts"]), "parts", &mut repairs, part_from_value);

    order.status_timers = fields
        .get(&["status_timers", "timers"])
        .map(|v| status_timers_from_value(v, &mut repairs))
        .unwrap_or_default();

    order.last_status_change = fields
        .get(&["last_status_change"])
        .and_then(parse_instant)
        .map_or_else(
            || {
                repairs.push("last_status_change: missing, defaulted to created_at".to_string());
                order.created_at
            },
            ledger::whole_second,
        );
    order.updated_at = fields
        .get(&["updated_at"])
        .and_then(parse_instant)
        .unwrap_or(order.last_status_change.max(order.created_at));

    let holder = fields.text(&["locked_by"]);
    let locked_at = fields.get(&["locked_at"]).and_then(parse_instant);
    order.lock = match (holder, locked_at) {
        (Some(holder), Some(locked_at)) => Some(EditLock { holder, locked_at }),
        (Some(holder), None) => {
            repairs.push(format!("locked_by {holder:?} without locked_at; lock dropped"));
            None
        }
        _ => None,
    };

    order.version = fields
        .get(&["version"])
        .and_then(|v| LenientNumber::read(v).as_seconds())
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or(0);

    if status.is_terminal() {
        order.total_seconds = Some(order.status_timers.sum());
    }

    for repair in &repairs {
        warn!(order_id = %order.id, "ingest: {repair}");
    }

    Ok(Ingested { order, repairs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
    }

    #[test]
    fn snake_key_folds_camel_and_hyphen() {
        assert_eq!(snake_key("vehicleId"), "vehicle_id");
        assert_eq!(snake_key("last-status-change"), "last_status_change");
        assert_eq!(snake_key("status_timers"), "status_timers");
        assert_eq!(snake_key("isTimerActive"), "is_timer_active");
    }

    #[test]
    fn camel_case_payload_normalizes() {
        let raw = json!({
            "id": "os-100",
            "vehicleId": "truck-3",
            "mechanicId": "carla",
            "status": "Em execução",
            "priority": "ALTA",
            "estimatedHours": "2,5",
            "createdAt": "2023-11-14T22:00:00Z",
            "lastStatusChange": "2023-11-14T22:30:00Z",
            "statusTimers": { "aguardando": "1800", "emExecucao": 0 },
            "services": [{ "description": "Freio", "actualSeconds": 12.9, "isTimerActive": true }]
        });

        let Ingested { order, repairs } = normalize(&raw, now()).unwrap();
        assert_eq!(order.status(), Status::EmExecucao);
        assert_eq!(order.priority, Priority::Alta);
        assert_eq!(order.mechanic_id(), Some("carla"));
        assert!((order.estimated_hours - 2.5).abs() < f64::EPSILON);
        assert_eq!(order.status_timers().get(Status::Aguardando), 1_800);
        assert_eq!(order.services.len(), 1);
        assert_eq!(order.services[0].actual_seconds, 12);
        assert!(!order.services[0].is_timer_active, "no started_at, no running timer");
        assert!(order.parts.is_empty());
        assert!(repairs.is_empty(), "unexpected repairs: {repairs:?}");
    }

    #[test]
    fn bad_timers_are_repaired_not_rejected() {
        let raw = json!({
            "id": 42,
            "status": "aguardando-pecas",
            "status_timers": {
                "aguardando": -30,
                "em_execucao": "abc",
                "aguardando_pecas": 600,
                "retrabalho": 99
            }
        });

        let Ingested { order, repairs } = normalize(&raw, now()).unwrap();
        assert_eq!(order.id, "42");
        assert_eq!(order.status_timers().get(Status::Aguardando), 0);
        assert_eq!(order.status_timers().get(Status::EmExecucao), 0);
        assert_eq!(order.status_timers().get(Status::AguardandoPecas), 600);
        assert_eq!(order.status_timers().sum(), 600);
        assert_eq!(order.created_at, now());
        assert_eq!(order.last_status_change(), order.created_at);
        assert!(repairs.iter().any(|r| r.contains("retrabalho")));
        assert!(repairs.iter().any(|r| r.contains("negative")));
    }

    #[test]
    fn missing_id_is_fatal() {
        let err = normalize(&json!({ "status": "aguardando" }), now()).unwrap_err();
        assert!(matches!(err, IngestError::MissingId));
        assert_eq!(err.code(), ErrorCode::MalformedPayload);
    }

    #[test]
    fn unknown_status_is_fatal() {
        let err = normalize(&json!({ "id": "os-1", "status": "em_revisao" }), now()).unwrap_err();
        assert!(matches!(err, IngestError::UnknownStatus { ref order_id, .. } if order_id == "os-1"));
        assert_eq!(err.code(), ErrorCode::InvalidEnumValue);
    }

    #[test]
    fn non_object_and_invalid_json_are_rejected() {
        assert!(matches!(normalize(&json!([1, 2]), now()), Err(IngestError::NotAnObject)));
        assert!(matches!(normalize_str("{oops", now()), Err(IngestError::Json(_))));
    }

    #[test]
    fn terminal_payload_caches_total() {
        let raw = json!({
            "id": "os-9",
            "status": "Finalizada",
            "statusTimers": { "aguardando": 100, "em_execucao": 200 }
        });
        let order = normalize(&raw, now()).unwrap().order;
        assert_eq!(order.total_seconds(), Some(300));
    }

    #[test]
    fn epoch_numbers_parse_as_seconds_or_millis() {
        assert_eq!(parse_instant(&json!(1_700_000_000)), Some(now()));
        assert_eq!(parse_instant(&json!(1_700_000_000_000_i64)), Some(now()));
        assert_eq!(parse_instant(&json!("2023-11-14 22:13:20")), Some(now()));
        assert_eq!(parse_instant(&json!(true)), None);
    }

    #[test]
    fn lock_needs_both_holder_and_timestamp() {
        let raw = json!({ "id": "os-1", "status": "aguardando", "lockedBy": "ana" });
        let Ingested { order, repairs } = normalize(&raw, now()).unwrap();
        assert!(order.lock().is_none());
        assert_eq!(repairs.len(), 3);
    }
}
