//! `frota show`: one work order projected at an instant.

use chrono::{DateTime, Utc};
use clap::Args;
use frota_core::lifecycle::StatusChange;
use frota_core::service::OrderView;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::cmd::{open_service, parse_instant, service_failure};
use crate::output::{OutputMode, format_seconds, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Work order ID.
    pub id: String,

    /// Project the ledger at this instant instead of now.
    #[arg(long, value_parser = parse_instant)]
    pub at: Option<DateTime<Utc>>,

    /// Include the status-change history.
    #[arg(long)]
    pub history: bool,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    #[serde(flatten)]
    view: OrderView,
    #[serde(skip_serializing_if = "Option::is_none")]
    history: Option<Vec<StatusChange>>,
}

/// # Errors
///
/// Returns an error if the project is not initialized or the order is unknown.
pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let svc = open_service(project_root, output)?;
    let view = svc.view(&args.id, args.at).map_err(|e| service_failure(output, &e))?;
    let history = if args.history {
        Some(svc.history(&args.id).map_err(|e| service_failure(output, &e))?)
    } else {
        None
    };

    render_mode(
        output,
        &ShowOutput { view, history },
        |s, w| {
            render_view_text(&s.view, w)?;
            render_history_text(s.history.as_deref(), w)
        },
        |s, w| {
            render_view_pretty(&s.view, w)?;
            render_history_pretty(s.history.as_deref(), w)
        },
    )
}

/// Tab-separated `key\tvalue` lines.
pub fn render_view_text(view: &OrderView, w: &mut dyn Write) -> std::io::Result<()> {
    let order = &view.order;
    writeln!(w, "id\t{}", order.id)?;
    writeln!(w, "status\t{}", order.status())?;
    writeln!(w, "vehicle\t{}", order.vehicle_id)?;
    writeln!(w, "mechanic\t{}", order.mechanic_id().unwrap_or("-"))?;
    writeln!(w, "version\t{}", order.version())?;
    writeln!(w, "cost_total\t{:.2}", order.costs.total())?;
    if let Some(lock) = order.lock() {
        writeln!(w, "locked_by\t{}", lock.holder)?;
    }
    for (status, seconds) in view.displayed_seconds.iter() {
        writeln!(w, "{status}\t{seconds}")?;
    }
    writeln!(w, "total_elapsed\t{}", view.total_elapsed_seconds)?;
    writeln!(w, "alert\t{}", view.alerts.has_alert)?;
    writeln!(w, "overtime\t{}", view.overtime)
}

pub fn render_view_pretty(view: &OrderView, w: &mut dyn Write) -> std::io::Result<()> {
    let order = &view.order;
    pretty_section(w, &format!("Work order {}", order.id))?;
    pretty_kv(w, "Status", order.status().as_str())?;
    pretty_kv(w, "Vehicle", &order.vehicle_id)?;
    pretty_kv(w, "Mechanic", order.mechanic_id().unwrap_or("(unassigned)"))?;
    if let Some(category) = &order.category {
        pretty_kv(w, "Category", category)?;
    }
    pretty_kv(w, "Priority", order.priority.as_str())?;
    pretty_kv(w, "Estimate", format!("{:.1}h", order.estimated_hours))?;
    pretty_kv(w, "Version", order.version().to_string())?;
    if order.costs.total() > 0.0 {
        pretty_kv(
            w,
            "Cost",
            format!(
                "{:.2} (labor {:.2}, parts {:.2}, other {:.2})",
                order.costs.total(),
                order.costs.labor,
                order.costs.parts,
                order.costs.other
            ),
        )?;
    }
    if let Some(lock) = order.lock() {
        pretty_kv(
            w,
            "Locked by",
            format!("{} since {}", lock.holder, lock.locked_at.format("%Y-%m-%d %H:%M:%S")),
        )?;
    }
    writeln!(w)?;

    pretty_section(w, &format!("Time in status (as of {})", view.as_of.format("%Y-%m-%d %H:%M:%S")))?;
    for (status, seconds) in view.displayed_seconds.iter() {
        let marker = if status == order.status() { "*" } else { " " };
        writeln!(w, "{marker} {:<18} {}", status.as_str(), format_seconds(seconds))?;
    }
    pretty_kv(w, "  Total", format_seconds(view.total_elapsed_seconds))?;
    #[allow(clippy::cast_possible_truncation)]
    let effort = view.logged_effort_seconds.round() as i64;
    pretty_kv(w, "  Logged effort", format_seconds(effort))?;

    let flags = alert_labels(view);
    if !flags.is_empty() {
        writeln!(w)?;
        pretty_kv(w, "Alerts", flags.join(", "))?;
    }

    if !order.services.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Services")?;
        for item in &order.services {
            let state = if item.completed {
                "done"
            } else if item.is_timer_active {
                "running"
            } else {
                "open"
            };
            writeln!(
                w,
                "  {:<8} {:<8} {:<10} {}",
                item.id,
                state,
                format_seconds(item.logged_seconds(view.as_of)),
                item.description
            )?;
        }
    }
    Ok(())
}

fn alert_labels(view: &OrderView) -> Vec<&'static str> {
    let alerts = &view.alerts;
    [
        (alerts.waiting_alert, "waiting"),
        (alerts.execution_alert, "execution"),
        (alerts.paused_alert, "paused"),
        (alerts.total_alert, "total"),
        (view.overtime, "overtime"),
    ]
    .into_iter()
    .filter_map(|(on, label)| on.then_some(label))
    .collect()
}

fn render_history_text(history: Option<&[StatusChange]>, w: &mut dyn Write) -> std::io::Result<()> {
    for change in history.unwrap_or_default() {
        writeln!(
            w,
            "change\t{}\t{}\t{}\t{}\t{}",
            change.at.to_rfc3339(),
            change.from,
            change.to,
            change.elapsed_seconds,
            change.actor
        )?;
    }
    Ok(())
}

fn render_history_pretty(history: Option<&[StatusChange]>, w: &mut dyn Write) -> std::io::Result<()> {
    let Some(history) = history else {
        return Ok(());
    };
    writeln!(w)?;
    pretty_section(w, "History")?;
    if history.is_empty() {
        writeln!(w, "  (no status changes yet)")?;
    }
    for change in history {
        let flag = if change.clamped { " (clock skew)" } else { "" };
        writeln!(
            w,
            "  {}  {} -> {}  after {}  by {}{flag}",
            change.at.format("%Y-%m-%d %H:%M:%S"),
            change.from,
            change.to,
            format_seconds(change.elapsed_seconds),
            change.actor
        )?;
    }
    Ok(())
}
