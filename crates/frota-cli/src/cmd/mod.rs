pub mod assign;
pub mod completions;
pub mod create;
pub mod import;
pub mod init;
pub mod list;
pub mod lock;
pub mod productivity;
pub mod service;
pub mod show;
pub mod status;
pub mod update;

use chrono::{DateTime, Utc};
use frota_core::config::{FROTA_DIR, load_project_config};
use frota_core::db::{self, STORE_FILE};
use frota_core::error::ErrorCode;
use frota_core::service::SystemClock;
use frota_core::{ServiceError, WorkOrderService};
use std::path::Path;

use crate::actor;
use crate::output::{CliError, OutputMode, fail};

/// Open the project store, refusing to create one implicitly.
pub fn open_service(project_root: &Path, output: OutputMode) -> anyhow::Result<WorkOrderService> {
    let store = project_root.join(FROTA_DIR).join(STORE_FILE);
    if !store.is_file() {
        return Err(fail(
            output,
            &CliError::coded(
                ErrorCode::NotInitialized,
                format!("no work-order store at {}", store.display()),
            ),
        ));
    }
    let config = load_project_config(project_root).map_err(|e| {
        fail(output, &CliError::coded(ErrorCode::ConfigParseError, format!("{e:#}")))
    })?;
    let conn = db::open_store(&store)
        .map_err(|e| fail(output, &CliError::coded(ErrorCode::StoreFailure, format!("{e:#}"))))?;
    Ok(WorkOrderService::new(conn, SystemClock, config))
}

/// Resolve the actor for a mutating command or render the failure.
pub fn require_actor(flag: Option<&str>, output: OutputMode) -> anyhow::Result<String> {
    actor::require_actor(flag).map_err(|e| {
        fail(
            output,
            &CliError::new(e.message).with_suggestion("Pass --actor <name> or export FROTA_ACTOR"),
        )
    })
}

/// Render a service failure and convert it for `main`.
pub fn service_failure(output: OutputMode, err: &ServiceError) -> anyhow::Error {
    fail(output, &CliError::from(err))
}

/// Clap value parser for instants: RFC 3339, `YYYY-MM-DD HH:MM:SS`, a bare
/// date (midnight UTC) or epoch seconds.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    let value = raw.parse::<i64>().map_or_else(
        |_| serde_json::Value::from(raw),
        serde_json::Value::from,
    );
    frota_core::ingest::parse_instant(&value)
        .ok_or_else(|| format!("'{raw}' is not an RFC 3339 timestamp, date or epoch"))
}
