use chrono::{DateTime, Utc};
use clap::Args;
use frota_core::db::OrderFilter;
use frota_core::model::Status;
use frota_core::service::OrderView;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::cmd::{open_service, parse_instant, service_failure};
use crate::output::{OutputMode, format_seconds, pretty_rule, render_mode};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only orders in this status.
    #[arg(long)]
    pub status: Option<Status>,

    /// Only orders assigned to this mechanic.
    #[arg(long)]
    pub mechanic: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    /// Skip finalized and cancelled orders.
    #[arg(long)]
    pub open: bool,

    /// Only orders with at least one alert raised.
    #[arg(long)]
    pub alerts: bool,

    #[arg(long)]
    pub limit: Option<u32>,

    /// Project every order at this instant instead of now.
    #[arg(long, value_parser = parse_instant)]
    pub at: Option<DateTime<Utc>>,
}

impl ListArgs {
    fn filter(&self) -> OrderFilter {
        OrderFilter {
            status: self.status,
            mechanic_id: self.mechanic.clone(),
            category: self.category.clone(),
            open_only: self.open,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Serialize)]
struct ListOutput {
    items: Vec<OrderView>,
    total: usize,
    alerting: usize,
}

/// # Errors
///
/// Returns an error if the project is not initialized or the store fails.
pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let svc = open_service(project_root, output)?;
    let mut items = svc
        .list_views(&args.filter(), args.at)
        .map_err(|e| service_failure(output, &e))?;
    if args.alerts {
        items.retain(|v| v.alerts.has_alert);
    }
    let alerting = items.iter().filter(|v| v.alerts.has_alert).count();
    let result = ListOutput {
        total: items.len(),
        alerting,
        items,
    };

    render_mode(output, &result, render_list_text, render_list_pretty)
}

fn render_list_text(list: &ListOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for view in &list.items {
        let order = &view.order;
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            order.id,
            order.status(),
            order.vehicle_id,
            order.mechanic_id().unwrap_or("-"),
            view.total_elapsed_seconds,
            if view.alerts.has_alert { "alert" } else { "ok" }
        )?;
    }
    Ok(())
}

fn render_list_pretty(list: &ListOutput, w: &mut dyn Write) -> std::io::Result<()> {
    if list.items.is_empty() {
        return writeln!(w, "No work orders match.");
    }
    writeln!(
        w,
        "{:<12} {:<17} {:<10} {:<10} {:>12}  {}",
        "ID", "STATUS", "VEHICLE", "MECHANIC", "ELAPSED", "ALERT"
    )?;
    pretty_rule(w)?;
    for view in &list.items {
        let order = &view.order;
        writeln!(
            w,
            "{:<12} {:<17} {:<10} {:<10} {:>12}  {}",
            order.id,
            order.status().as_str(),
            order.vehicle_id,
            order.mechanic_id().unwrap_or("-"),
            format_seconds(view.total_elapsed_seconds),
            if view.alerts.has_alert { "!" } else { "" }
        )?;
    }
    writeln!(w)?;
    writeln!(w, "{} order(s), {} alerting", list.total, list.alerting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ListArgs,
    }

    #[test]
    fn status_flag_accepts_spaced_spelling() {
        let w = Wrapper::parse_from(["list", "--status", "Em Execução", "--open"]);
        let filter = w.args.filter();
        assert_eq!(filter.status, Some(Status::EmExecucao));
        assert!(filter.open_only);
        assert!(filter.limit.is_none());
    }

    #[test]
    fn empty_list_renders_placeholder() {
        let list = ListOutput {
            items: Vec::new(),
            total: 0,
            alerting: 0,
        };
        let mut buf = Vec::new();
        render_list_pretty(&list, &mut buf).expect("render");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "No work orders match.\n");
    }
}
