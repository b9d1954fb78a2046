use chrono::{DateTime, Utc};
use clap::Args;
use frota_core::productivity::{ProductivityFilter, ProductivitySummary};
use std::io::Write;
use std::path::Path;

use crate::cmd::{open_service, parse_instant, service_failure};
use crate::output::{OutputMode, format_seconds, pretty_rule, render_mode};

#[derive(Args, Debug)]
pub struct ProductivityArgs {
    #[arg(long)]
    pub mechanic: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    /// Earliest assignment to include (inclusive).
    #[arg(long, value_parser = parse_instant)]
    pub from: Option<DateTime<Utc>>,

    /// Latest assignment to include (inclusive).
    #[arg(long, value_parser = parse_instant)]
    pub to: Option<DateTime<Utc>>,
}

impl ProductivityArgs {
    fn filter(&self) -> ProductivityFilter {
        ProductivityFilter {
            mechanic_id: self.mechanic.clone(),
            category: self.category.clone(),
            from: self.from,
            to: self.to,
        }
    }
}

/// Per-mechanic roll-up of execution time at reassignment.
///
/// # Errors
///
/// Fails if the project is not initialized or the store fails.
pub fn run_productivity(
    args: &ProductivityArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let svc = open_service(project_root, output)?;
    let summary = svc
        .productivity(&args.filter())
        .map_err(|e| service_failure(output, &e))?;
    render_mode(output, &summary, render_text, render_pretty)
}

fn render_text(summary: &ProductivitySummary, w: &mut dyn Write) -> std::io::Result<()> {
    for group in &summary.groups {
        writeln!(
            w,
            "{}\t{}\t{}\t{:.0}",
            group.mechanic_id, group.count, group.total_seconds, group.average_seconds
        )?;
    }
    Ok(())
}

fn render_pretty(summary: &ProductivitySummary, w: &mut dyn Write) -> std::io::Result<()> {
    if summary.groups.is_empty() {
        return writeln!(w, "No assignments recorded for this filter.");
    }
    writeln!(w, "{:<16} {:>6} {:>14} {:>14}", "MECHANIC", "ORDERS", "TOTAL", "AVERAGE")?;
    pretty_rule(w)?;
    for group in &summary.groups {
        writeln!(
            w,
            "{:<16} {:>6} {:>14} {:>14}",
            group.mechanic_id,
            group.count,
            format_seconds(group.total_seconds),
            format_seconds(whole_seconds(group.average_seconds))
        )?;
        for tally in &group.categories {
            writeln!(w, "  {:<14} {:>6} {:>14}", tally.category, tally.count, format_seconds(tally.total_seconds))?;
        }
    }
    pretty_rule(w)?;
    writeln!(
        w,
        "{:<16} {:>6} {:>14} {:>14}",
        "all",
        summary.count,
        format_seconds(summary.total_seconds),
        format_seconds(whole_seconds(summary.average_seconds))
    )
}

#[allow(clippy::cast_possible_truncation)]
fn whole_seconds(seconds: f64) -> i64 {
    seconds.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use frota_core::productivity::{AssignmentEvent, summarize};

    fn event(mechanic: &str, seconds: i64) -> AssignmentEvent {
        AssignmentEvent {
            order_id: format!("os-{mechanic}-{seconds}"),
            previous_mechanic_id: None,
            new_mechanic_id: mechanic.to_string(),
            category: Some("motor".into()),
            accumulated_seconds: seconds,
            recorded_at: Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid"),
        }
    }

    #[test]
    fn pretty_lists_groups_and_totals() {
        let summary = summarize(
            &[event("ana", 3_600), event("ana", 1_800), event("bia", 60)],
            &ProductivityFilter::default(),
        );
        let mut buf = Vec::new();
        render_pretty(&summary, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("ana"));
        assert!(text.contains("45m 00s"), "ana averages 45 minutes: {text}");
        assert!(text.contains("motor"));
        assert!(text.lines().last().is_some_and(|l| l.starts_with("all")));
    }

    #[test]
    fn text_has_one_row_per_mechanic() {
        let summary = summarize(&[event("ana", 10), event("bia", 20)], &ProductivityFilter::default());
        let mut buf = Vec::new();
        render_text(&summary, &mut buf).expect("render");
        assert_eq!(String::from_utf8(buf).expect("utf8").lines().count(), 2);
    }
}
