//! Per-mechanic roll-ups over closed assignment intervals.
//!
//! Input events are historical snapshots taken when an order changed hands,
//! so nothing here ever reads a running timer and the output does not depend
//! on the reader's clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ledger::displayed;
use crate::model::{Status, WorkOrder};

/// Snapshot recorded when an order's mechanic changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentEvent {
    pub order_id: String,
    pub previous_mechanic_id: Option<String>,
    pub new_mechanic_id: String,
    /// Service category of the order at the time of the change.
    pub category: Option<String>,
    /// Seconds the order had spent in `em_execucao` at the change.
    pub accumulated_seconds: i64,
    pub recorded_at: DateTime<Utc>,
}

impl AssignmentEvent {
    /// Capture the reassignment of `order` to `new_mechanic_id` at `now`.
    #[must_use]
    pub fn snapshot(order: &WorkOrder, new_mechanic_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            order_id: order.id.clone(),
            previous_mechanic_id: order.mechanic_id.clone(),
            new_mechanic_id: new_mechanic_id.to_string(),
            category: order.category.clone(),
            accumulated_seconds: displayed(order, Status::EmExecucao, now),
            recorded_at: now,
        }
    }
}

/// Optional filters. All unset means every event counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductivityFilter {
    pub mechanic_id: Option<String>,
    pub category: Option<String>,
    /// Inclusive lower bound on `recorded_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `recorded_at`.
    pub to: Option<DateTime<Utc>>,
}

impl ProductivityFilter {
    #[must_use]
    pub fn matches(&self, event: &AssignmentEvent) -> bool {
        self.mechanic_id
            .as_deref()
            .is_none_or(|m| event.new_mechanic_id == m)
            && self
                .category
                .as_deref()
                .is_none_or(|c| event.category.as_deref() == Some(c))
            && self.from.is_none_or(|from| event.recorded_at >= from)
            && self.to.is_none_or(|to| event.recorded_at <= to)
    }
}

/// Count and seconds for one category inside a mechanic's group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTally {
    pub category: String,
    pub count: usize,
    pub total_seconds: i64,
}

/// One mechanic's share of the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MechanicSummary {
    pub mechanic_id: String,
    pub count: usize,
    pub total_seconds: i64,
    pub average_seconds: f64,
    pub categories: Vec<CategoryTally>,
}

/// Result of [`summarize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductivitySummary {
    pub count: usize,
    pub total_seconds: i64,
    pub average_seconds: f64,
    /// Sorted by `count` descending; ties keep first-seen order.
    pub groups: Vec<MechanicSummary>,
}

/// Category label used for events recorded without one.
pub const UNCATEGORIZED: &str = "sem_categoria";

#[allow(clippy::cast_precision_loss)]
fn average(total: i64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Roll up `events` into per-mechanic and overall totals.
///
/// Negative snapshot seconds (bad historical rows) count as zero.
#[must_use]
pub fn summarize(events: &[AssignmentEvent], filter: &ProductivityFilter) -> ProductivitySummary {
    let mut groups: Vec<MechanicSummary> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut count = 0_usize;
    let mut total_seconds = 0_i64;

    for event in events.iter().filter(|e| filter.matches(e)) {
        let seconds = event.accumulated_seconds.max(0);
        count += 1;
        total_seconds = total_seconds.saturating_add(seconds);

        let slot = *index.entry(event.new_mechanic_id.as_str()).or_insert_with(|| {
            groups.push(MechanicSummary {
                mechanic_id: event.new_mechanic_id.clone(),
                count: 0,
                total_seconds: 0,
                average_seconds: 0.0,
                categories: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        group.count += 1;
        group.total_seconds = group.total_seconds.saturating_add(seconds);

        let category = event.category.as_deref().unwrap_or(UNCATEGORIZED);
        if let Some(tally) = group.categories.iter_mut().find(|c| c.category == category) {
            tally.count += 1;
            tally.total_seconds = tally.total_seconds.saturating_add(seconds);
        } else {
            group.categories.push(CategoryTally {
                category: category.to_string(),
                count: 1,
                total_seconds: seconds,
            });
        }
    }

    for group in &mut groups {
        group.average_seconds = average(group.total_seconds, group.count);
    }
    // `sort_by` is stable, so equal counts keep first-seen order.
    groups.sort_by(|a, b| b.count.cmp(&a.count));

    ProductivitySummary {
        count,
        total_seconds,
        average_seconds: average(total_seconds, count),
        groups,
    }
}
