use clap::Args;
use frota_core::model::{PartRequest, PartStatus, Priority};
use frota_core::service::OrderPatch;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::cmd::{open_service, require_actor, service_failure};
use crate::output::{CliError, OutputMode, fail, render_mode};

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Work order ID.
    pub id: String,

    #[arg(long)]
    pub vehicle: Option<String>,

    #[arg(long)]
    pub supervisor: Option<String>,

    #[arg(long)]
    pub unit: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub priority: Option<Priority>,

    #[arg(long)]
    pub estimated_hours: Option<f64>,

    #[arg(long)]
    pub actual_hours: Option<f64>,

    #[arg(long)]
    pub warehouse: Option<String>,

    #[arg(long)]
    pub labor_cost: Option<f64>,

    #[arg(long)]
    pub parts_cost: Option<f64>,

    #[arg(long)]
    pub other_cost: Option<f64>,

    /// Request a part, as `SKU` or `SKU:QTY`. Repeatable.
    #[arg(long = "part", value_name = "SKU[:QTY]", value_parser = parse_part)]
    pub parts: Vec<PartRequest>,

    /// Version the caller last read.
    #[arg(long)]
    pub expected_version: Option<u64>,
}

fn parse_part(raw: &str) -> Result<PartRequest, String> {
    let (sku, qty) = match raw.split_once(':') {
        Some((sku, qty)) => {
            let qty = qty
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("quantity in '{raw}' must be a positive integer"))?;
            (sku.trim(), qty)
        }
        None => (raw.trim(), 1),
    };
    if sku.is_empty() || qty == 0 {
        return Err(format!("'{raw}' is not a valid part request"));
    }
    Ok(PartRequest {
        sku: sku.to_string(),
        qty,
        status: PartStatus::Pendente,
    })
}

impl UpdateArgs {
    fn patch(&self) -> OrderPatch {
        OrderPatch {
            vehicle_id: self.vehicle.clone(),
            supervisor_id: self.supervisor.clone(),
            workshop_unit: self.unit.clone(),
            category: self.category.clone(),
            priority: self.priority,
            estimated_hours: self.estimated_hours,
            actual_hours: self.actual_hours,
            warehouse_id: self.warehouse.clone(),
            labor_cost: self.labor_cost,
            parts_cost: self.parts_cost,
            other_cost: self.other_cost,
            add_parts: self.parts.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct UpdateOutput {
    id: String,
    version: u64,
}

/// Edit non-ledger fields of an order.
///
/// # Errors
///
/// Fails when no field is given, plus the service's lock, version and
/// conflict errors.
pub fn run_update(
    args: &UpdateArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let patch = args.patch();
    if patch.is_empty() {
        return Err(fail(
            output,
            &CliError::new("nothing to update")
                .with_suggestion("Pass at least one field flag, e.g. --priority alta"),
        ));
    }

    let actor = require_actor(actor_flag, output)?;
    let svc = open_service(project_root, output)?;
    let order = svc
        .update_details(&args.id, patch, &actor, args.expected_version)
        .map_err(|e| service_failure(output, &e))?;

    let result = UpdateOutput {
        id: order.id.clone(),
        version: order.version(),
    };
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "{}\t{}", r.id, r.version),
        |r, w| writeln!(w, "✓ {} updated (version {})", r.id, r.version),
    )
}
