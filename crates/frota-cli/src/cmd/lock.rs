use chrono::{DateTime, Utc};
use clap::Args;
use frota_core::lock::Acquired;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::cmd::{open_service, require_actor, service_failure};
use crate::output::{OutputMode, render_mode};

#[derive(Args, Debug)]
pub struct LockArgs {
    /// Work order ID.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct UnlockArgs {
    /// Work order ID.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct LockOutput {
    id: String,
    holder: String,
    locked_at: DateTime<Utc>,
    /// `fresh`, `refreshed` or `taken_over`.
    acquired: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_holder: Option<String>,
}

#[derive(Debug, Serialize)]
struct UnlockOutput {
    id: String,
    released: bool,
}

/// Take the advisory edit lock for the actor.
///
/// # Errors
///
/// Fails with `AlreadyLocked` when someone else holds a fresh lock.
pub fn run_lock(
    args: &LockArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let actor = require_actor(actor_flag, output)?;
    let svc = open_service(project_root, output)?;
    let grant = svc
        .acquire_lock(&args.id, &actor)
        .map_err(|e| service_failure(output, &e))?;

    let locked_at = grant
        .order
        .lock()
        .map_or_else(|| grant.order.updated_at, |l| l.locked_at);
    let (acquired, previous_holder) = match grant.acquired {
        Acquired::Fresh => ("fresh", None),
        Acquired::Refreshed => ("refreshed", None),
        Acquired::TakenOver { previous_holder } => ("taken_over", Some(previous_holder)),
    };
    let result = LockOutput {
        id: grant.order.id,
        holder: actor,
        locked_at,
        acquired,
        previous_holder,
    };

    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "{}\t{}\t{}", r.id, r.holder, r.acquired),
        |r, w| {
            writeln!(w, "✓ {} locked by {}", r.id, r.holder)?;
            if let Some(previous) = &r.previous_holder {
                writeln!(w, "  took over an abandoned lock from {previous}")?;
            }
            Ok(())
        },
    )
}

/// Release the actor's edit lock. Releasing a lock the actor does not hold
/// is a no-op and still succeeds.
///
/// # Errors
///
/// Fails if the order does not exist.
pub fn run_unlock(
    args: &UnlockArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let actor = require_actor(actor_flag, output)?;
    let svc = open_service(project_root, output)?;
    let released = svc
        .release_lock(&args.id, &actor)
        .map_err(|e| service_failure(output, &e))?;

    let result = UnlockOutput {
        id: args.id.clone(),
        released,
    };
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "{}\t{}", r.id, r.released),
        |r, w| {
            if r.released {
                writeln!(w, "✓ {} unlocked", r.id)
            } else {
                writeln!(w, "{} was not locked by you; nothing to do", r.id)
            }
        },
    )
}
