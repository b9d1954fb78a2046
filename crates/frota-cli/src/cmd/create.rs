use clap::Args;
use frota_core::model::{CostBreakdown, Priority};
use frota_core::service::NewOrder;
use std::io::Write;
use std::path::Path;

use crate::cmd::show::{render_view_pretty, render_view_text};
use crate::cmd::{open_service, require_actor, service_failure};
use crate::output::{OutputMode, render_mode};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Vehicle the order is opened for (plate or fleet number).
    #[arg(long)]
    pub vehicle: String,

    /// Explicit order ID. Generated as `os-xxxxxxxx` when omitted.
    #[arg(long)]
    pub id: Option<String>,

    /// Mechanic assigned from the start.
    #[arg(long)]
    pub mechanic: Option<String>,

    #[arg(long)]
    pub supervisor: Option<String>,

    /// Workshop unit handling the order.
    #[arg(long)]
    pub unit: Option<String>,

    /// Service category, used by productivity roll-ups.
    #[arg(long)]
    pub category: Option<String>,

    #[arg(long, default_value = "normal")]
    pub priority: Priority,

    /// Estimated effort in hours. Drives the execution and total alerts.
    #[arg(long, default_value_t = 0.0)]
    pub estimated_hours: f64,

    #[arg(long)]
    pub warehouse: Option<String>,

    #[arg(long, default_value_t = 0.0)]
    pub labor_cost: f64,

    #[arg(long, default_value_t = 0.0)]
    pub parts_cost: f64,

    #[arg(long, default_value_t = 0.0)]
    pub other_cost: f64,
}

impl CreateArgs {
    fn draft(&self) -> NewOrder {
        NewOrder {
            id: self.id.clone(),
            vehicle_id: self.vehicle.clone(),
            mechanic_id: self.mechanic.clone(),
            supervisor_id: self.supervisor.clone(),
            workshop_unit: self.unit.clone(),
            category: self.category.clone(),
            priority: self.priority,
            estimated_hours: self.estimated_hours,
            warehouse_id: self.warehouse.clone(),
            costs: CostBreakdown {
                labor: self.labor_cost,
                parts: self.parts_cost,
                other: self.other_cost,
            },
        }
    }
}

/// Open a new work order in `aguardando`.
///
/// # Errors
///
/// Returns an error if no actor is set, the project is not initialized, or
/// the ID is already taken.
pub fn run_create(
    args: &CreateArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let actor = require_actor(actor_flag, output)?;
    let svc = open_service(project_root, output)?;

    let order = svc
        .create(args.draft(), &actor)
        .map_err(|e| service_failure(output, &e))?;
    let created_at = order.created_at;
    let view = svc.project(order, created_at);

    render_mode(output, &view, render_view_text, |v, w| {
        writeln!(w, "✓ Created {}", v.order.id)?;
        writeln!(w)?;
        render_view_pretty(v, w)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: CreateArgs,
    }

    #[test]
    fn draft_carries_every_flag() {
        let w = Wrapper::parse_from([
            "create",
            "--vehicle",
            "ABC1D23",
            "--mechanic",
            "carla",
            "--priority",
            "Urgente",
            "--estimated-hours",
            "2.5",
            "--labor-cost",
            "120",
        ]);
        let draft = w.args.draft();
        assert_eq!(draft.vehicle_id, "ABC1D23");
        assert_eq!(draft.mechanic_id.as_deref(), Some("carla"));
        assert_eq!(draft.priority, Priority::Urgente);
        assert!((draft.estimated_hours - 2.5).abs() < f64::EPSILON);
        assert!((draft.costs.labor - 120.0).abs() < f64::EPSILON);
        assert!(draft.id.is_none());
    }

    #[test]
    fn unknown_priority_is_rejected() {
        let parsed = Wrapper::try_parse_from(["create", "--vehicle", "x", "--priority", "asap"]);
        assert!(parsed.is_err());
    }
}
