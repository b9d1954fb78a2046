//! `frota status`: move a work order to another status.
//!
//! The running interval is closed at the wall clock's current instant and
//! credited to the status being left. With `--expected-version` the move is
//! refused if anyone else wrote the order since the caller last read it.

use clap::Args;
use frota_core::ledger::DataQualityWarning;
use frota_core::model::Status;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::cmd::{open_service, require_actor, service_failure};
use crate::output::{OutputMode, format_seconds, render_mode};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Work order ID.
    pub id: String,

    /// Target status (`aguardando`, `em_execucao`, `aguardando_pecas`,
    /// `finalizada`, `cancelada`; spaces, hyphens and accents are accepted).
    pub status: Status,

    /// Version the caller last read. The move fails with a conflict if the
    /// order has changed since.
    #[arg(long)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    id: String,
    previous_status: Status,
    new_status: Status,
    /// Seconds credited to `previous_status`.
    elapsed_seconds: i64,
    version: u64,
    actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<DataQualityWarning>,
}

/// # Errors
///
/// Returns an error for invalid edges, fresh locks held by someone else,
/// version conflicts, or rejected clock skew.
pub fn run_status(
    args: &StatusArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let actor = require_actor(actor_flag, output)?;
    let svc = open_service(project_root, output)?;

    let moved = svc
        .transition(&args.id, args.status, &actor, args.expected_version)
        .map_err(|e| service_failure(output, &e))?;

    let result = StatusOutput {
        id: moved.order.id.clone(),
        previous_status: moved.change.from,
        new_status: moved.change.to,
        elapsed_seconds: moved.change.elapsed_seconds,
        version: moved.order.version(),
        actor,
        total_seconds: moved.order.total_seconds(),
        warning: moved.warning,
    };

    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}",
                r.id, r.previous_status, r.new_status, r.elapsed_seconds, r.version
            )
        },
        |r, w| {
            writeln!(
                w,
                "✓ {}: {} -> {} ({} in {})",
                r.id,
                r.previous_status,
                r.new_status,
                format_seconds(r.elapsed_seconds),
                r.previous_status
            )?;
            if let Some(total) = r.total_seconds {
                writeln!(w, "  closed after {}", format_seconds(total))?;
            }
            if let Some(warning) = &r.warning {
                writeln!(w, "  warning: {}", warning.message)?;
            }
            Ok(())
        },
    )
}
