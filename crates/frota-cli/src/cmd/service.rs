//! `frota service`: service lines and their effort timers.

use clap::{Args, Subcommand};
use frota_core::model::ServiceItem;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::cmd::{open_service, require_actor, service_failure};
use crate::output::{OutputMode, format_seconds, render_mode};

#[derive(Subcommand, Debug)]
pub enum ServiceCommand {
    #[command(
        about = "Add a service line",
        after_help = "EXAMPLES:\n    frota service add os-1a2b3c4d \"Replace brake pads\" --category freio"
    )]
    Add(AddArgs),

    #[command(about = "Start a service line's effort timer")]
    Start(ItemArgs),

    #[command(about = "Stop a service line's effort timer")]
    Stop(ItemArgs),

    #[command(about = "Mark a service line done")]
    Done(ItemArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Work order ID.
    pub id: String,

    pub description: String,

    #[arg(long, default_value = "geral")]
    pub category: String,
}

#[derive(Args, Debug)]
pub struct ItemArgs {
    /// Work order ID.
    pub id: String,

    /// Service line ID (`svc-N`).
    pub service_id: String,
}

#[derive(Debug, Serialize)]
struct ServiceOutput {
    order_id: String,
    version: u64,
    service: ServiceItem,
}

/// # Errors
///
/// Fails for unknown orders or service lines, plus the usual edit errors.
pub fn run_service(
    command: &ServiceCommand,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let actor = require_actor(actor_flag, output)?;
    let svc = open_service(project_root, output)?;

    let (verb, outcome) = match command {
        ServiceCommand::Add(args) => (
            "added",
            svc.add_service(&args.id, &args.description, &args.category, &actor),
        ),
        ServiceCommand::Start(args) => (
            "started",
            svc.start_service(&args.id, &args.service_id, &actor),
        ),
        ServiceCommand::Stop(args) => (
            "stopped",
            svc.stop_service(&args.id, &args.service_id, &actor),
        ),
        ServiceCommand::Done(args) => (
            "completed",
            svc.complete_service(&args.id, &args.service_id, &actor),
        ),
    };
    let (order, service) = outcome.map_err(|e| service_failure(output, &e))?;

    let result = ServiceOutput {
        order_id: order.id.clone(),
        version: order.version(),
        service,
    };
    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}",
                r.order_id,
                r.service.id,
                r.service.is_timer_active,
                r.service.completed,
                r.service.actual_seconds
            )
        },
        |r, w| {
            writeln!(w, "✓ {} {verb} on {}: {}", r.service.id, r.order_id, r.service.description)?;
            writeln!(w, "  logged: {}", format_seconds(r.service.actual_seconds))
        },
    )
}
