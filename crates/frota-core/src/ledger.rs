//! Per-status dwell-time ledger and its read-side projection.
//!
//! The ledger stores closed intervals only: `status_timers[s]` is the sum of
//! every finished stay in status `s`, and `last_status_change` marks where the
//! currently running stay began. Live elapsed time is never written back; it
//! is projected on demand as `stored + (t - last_status_change)` for the
//! current, non-terminal status.
//!
//! All durations are whole seconds. Hour-based fields convert through
//! [`hours_to_seconds`] at the edges only.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Status, WorkOrder};

/// Accumulated seconds per status. Serializes as a map keyed by the five
/// status names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StatusTimers {
    pub(crate) aguardando: i64,
    pub(crate) em_execucao: i64,
    pub(crate) aguardando_pecas: i64,
    pub(crate) finalizada: i64,
    pub(crate) cancelada: i64,
}

impl StatusTimers {
    #[must_use]
    pub const fn get(&self, status: Status) -> i64 {
        match status {
            Status::Aguardando => self.aguardando,
            Status::EmExecucao => self.em_execucao,
            Status::AguardandoPecas => self.aguardando_pecas,
            Status::Finalizada => self.finalizada,
            Status::Cancelada => self.cancelada,
        }
    }

    fn slot_mut(&mut self, status: Status) -> &mut i64 {
        match status {
            Status::Aguardando => &mut self.aguardando,
            Status::EmExecucao => &mut self.em_execucao,
            Status::AguardandoPecas => &mut self.aguardando_pecas,
            Status::Finalizada => &mut self.finalizada,
            Status::Cancelada => &mut self.cancelada,
        }
    }

    /// Add a closed interval to `status`. Negative input adds nothing, so
    /// slots never decrease.
    pub(crate) fn credit(&mut self, status: Status, seconds: i64) {
        let slot = self.slot_mut(status);
        *slot = slot.saturating_add(seconds.max(0));
    }

    /// Overwrite a slot during ingestion; negative values are floored at 0.
    pub(crate) fn set(&mut self, status: Status, seconds: i64) {
        *self.slot_mut(status) = seconds.max(0);
    }

    /// Sum over all five slots.
    #[must_use]
    pub fn sum(&self) -> i64 {
        Status::ALL
            .iter()
            .fold(0_i64, |acc, s| acc.saturating_add(self.get(*s)))
    }

    /// `(status, seconds)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (Status, i64)> + '_ {
        Status::ALL.into_iter().map(|s| (s, self.get(s)))
    }
}

/// Emitted when the clock appears to run backwards between two transitions.
///
/// The interval is clamped to zero instead of being subtracted; this is a
/// data-quality signal, never a hard failure (unless the deployment opts into
/// rejecting skewed transitions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQualityWarning {
    pub order_id: String,
    /// Status whose running interval was being closed.
    pub status: Status,
    pub last_status_change: DateTime<Utc>,
    pub now: DateTime<Utc>,
    /// How far `now` lies before `last_status_change`, in seconds.
    pub skew_secs: i64,
    pub message: String,
}

impl DataQualityWarning {
    pub(crate) fn negative_interval(order: &WorkOrder, now: DateTime<Utc>) -> Self {
        let skew_secs = (order.last_status_change - now).num_seconds();
        Self {
            order_id: order.id.clone(),
            status: order.status,
            last_status_change: order.last_status_change,
            now,
            skew_secs,
            message: format!(
                "negative elapsed interval on {}: now is {skew_secs} seconds before the last status change, clamped to 0",
                order.id
            ),
        }
    }
}

/// Seconds from `from` to `to`, clamped at zero.
#[must_use]
pub fn clamped_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().max(0)
}

/// Drop the sub-second part of `t`.
///
/// Instants written into the ledger (`created_at`, `last_status_change`) go
/// through this so that whole-second intervals sum exactly to the order age.
#[must_use]
pub fn whole_second(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(0)
}

/// Convert an hour-based estimate to seconds. Non-finite or negative input
/// reads as zero.
#[must_use]
pub fn hours_to_seconds(hours: f64) -> f64 {
    if hours.is_finite() && hours > 0.0 {
        hours * 3600.0
    } else {
        0.0
    }
}

/// Seconds of the running interval of the current status at `t`.
///
/// Zero for terminal statuses: their ledger is frozen.
#[must_use]
pub fn running_seconds(order: &WorkOrder, t: DateTime<Utc>) -> i64 {
    if order.status.is_terminal() {
        0
    } else {
        clamped_seconds(order.last_status_change, t)
    }
}

/// Displayed dwell time of `status` at time `t`. Never mutates the order.
#[must_use]
pub fn displayed(order: &WorkOrder, status: Status, t: DateTime<Utc>) -> i64 {
    let stored = order.status_timers.get(status).max(0);
    if status == order.status {
        stored.saturating_add(running_seconds(order, t))
    } else {
        stored
    }
}

/// Sum of [`displayed`] over every status.
#[must_use]
pub fn total_elapsed(order: &WorkOrder, t: DateTime<Utc>) -> i64 {
    Status::ALL
        .iter()
        .fold(0_i64, |acc, s| acc.saturating_add(displayed(order, *s, t)))
}

/// All displayed values at `t`, shaped like the persisted ledger so it can be
/// serialized as `displayedSeconds`.
#[must_use]
pub fn project(order: &WorkOrder, t: DateTime<Utc>) -> StatusTimers {
    let mut view = StatusTimers::default();
    for status in Status::ALL {
        view.set(status, displayed(order, status, t));
    }
    view
}

/// Result of closing the running interval at a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedInterval {
    /// Seconds credited to the outgoing status.
    pub seconds: i64,
    /// Present when the raw interval was negative and got clamped.
    pub warning: Option<DataQualityWarning>,
}

/// Measure the running interval of `order` ending at `now`.
#[must_use]
pub fn close_interval(order: &WorkOrder, now: DateTime<Utc>) -> ClosedInterval {
    let raw = (now - order.last_status_change).num_seconds();
    if raw < 0 {
        ClosedInterval {
            seconds: 0,
            warning: Some(DataQualityWarning::negative_interval(order, now)),
        }
    } else {
        ClosedInterval {
            seconds: raw,
            warning: None,
        }
    }
}
