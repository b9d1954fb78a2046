use clap::Args;
use frota_core::productivity::AssignmentEvent;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::cmd::{open_service, require_actor, service_failure};
use crate::output::{OutputMode, format_seconds, render_mode};

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Work order ID.
    pub id: String,

    /// Mechanic taking over the order.
    pub mechanic: String,

    /// Version the caller last read.
    #[arg(long)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AssignOutput {
    id: String,
    mechanic_id: String,
    version: u64,
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<AssignmentEvent>,
}

/// Reassign an order. Records a productivity snapshot of the execution time
/// accumulated under the previous mechanic.
///
/// # Errors
///
/// Lock, version and conflict errors from the service.
pub fn run_assign(
    args: &AssignArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let actor = require_actor(actor_flag, output)?;
    let svc = open_service(project_root, output)?;
    let assignment = svc
        .assign(&args.id, &args.mechanic, &actor, args.expected_version)
        .map_err(|e| service_failure(output, &e))?;

    let result = AssignOutput {
        id: assignment.order.id.clone(),
        mechanic_id: args.mechanic.clone(),
        version: assignment.order.version(),
        changed: assignment.event.is_some(),
        event: assignment.event,
    };

    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "{}\t{}\t{}\t{}", r.id, r.mechanic_id, r.version, r.changed),
        |r, w| match &r.event {
            Some(event) => {
                writeln!(
                    w,
                    "✓ {} assigned to {} (was {})",
                    r.id,
                    r.mechanic_id,
                    event.previous_mechanic_id.as_deref().unwrap_or("unassigned")
                )?;
                writeln!(
                    w,
                    "  execution time so far: {}",
                    format_seconds(event.accumulated_seconds)
                )
            }
            None => writeln!(w, "{} is already assigned to {}", r.id, r.mechanic_id),
        },
    )
}
