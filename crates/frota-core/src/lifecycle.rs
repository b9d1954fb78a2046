//! Status state machine.
//!
//! [`transition`] is the only code path that moves a work order between
//! statuses. It works on a copy: the caller's order is left untouched, and
//! the returned [`Transition`] carries the fully updated value so the store
//! can persist it in a single write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::ledger::{self, DataQualityWarning};
use crate::model::{InvalidTransition, Status, WorkOrder};

/// What to do when `now` lies before the order's last status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClockSkewPolicy {
    /// Credit zero seconds and log a data-quality warning.
    #[default]
    Clamp,
    /// Refuse the transition; the caller retries once clocks agree.
    Reject,
}

/// Errors from [`transition`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid transition on {order_id}: {source}")]
    InvalidTransition {
        order_id: String,
        #[source]
        source: InvalidTransition,
    },

    #[error("work order {order_id} changed concurrently: expected version {expected}, found {actual}")]
    Conflict {
        order_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("work order {order_id}: transition at {now} precedes last status change at {last_status_change}")]
    ClockSkew {
        order_id: String,
        now: DateTime<Utc>,
        last_status_change: DateTime<Utc>,
    },
}

impl LifecycleError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::Conflict { .. } => ErrorCode::VersionConflict,
            Self::ClockSkew { .. } => ErrorCode::ClockSkewRejected,
        }
    }
}

/// History row for one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub order_id: String,
    pub from: Status,
    pub to: Status,
    /// Seconds credited to `from` by this change.
    pub elapsed_seconds: i64,
    pub actor: String,
    pub at: DateTime<Utc>,
    /// True when a negative interval was clamped to zero.
    pub clamped: bool,
}

/// Outcome of a successful transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// The order after the change, with `version` bumped.
    pub order: WorkOrder,
    pub change: StatusChange,
    pub warning: Option<DataQualityWarning>,
}

/// Move `order` to `to` at `now`.
///
/// `expected_version` is the version the caller last read; when given and
/// different from `order.version()` the call fails with
/// [`LifecycleError::Conflict`].
///
/// # Errors
///
/// - [`LifecycleError::InvalidTransition`] if `to` is not reachable from the
///   current status (any edge out of a terminal status included)
/// - [`LifecycleError::Conflict`] on a stale `expected_version`
/// - [`LifecycleError::ClockSkew`] if `now` precedes the last status change
///   and `policy` is [`ClockSkewPolicy::Reject`]
pub fn transition(
    order: &WorkOrder,
    to: Status,
    now: DateTime<Utc>,
    actor: &str,
    expected_version: Option<u64>,
    policy: ClockSkewPolicy,
) -> Result<Transition, LifecycleError> {
    if let Some(expected) = expected_version {
        if expected != order.version {
            return Err(LifecycleError::Conflict {
                order_id: order.id.clone(),
                expected,
                actual: order.version,
            });
        }
    }

    order
        .status
        .can_transition_to(to)
        .map_err(|source| LifecycleError::InvalidTransition {
            order_id: order.id.clone(),
            source,
        })?;

    let now = ledger::whole_second(now);
    let closed = ledger::close_interval(order, now);
    if let Some(ref warning) = closed.warning {
        if policy == ClockSkewPolicy::Reject {
            return Err(LifecycleError::ClockSkew {
                order_id: order.id.clone(),
                now,
                last_status_change: order.last_status_change,
            });
        }
        warn!(
            order_id = %warning.order_id,
            status = %warning.status,
            skew_secs = warning.skew_secs,
            "data quality: {}",
            warning.message
        );
    }

    let from = order.status;
    let mut next = order.clone();
    next.status_timers.credit(from, closed.seconds);
    next.status = to;
    next.last_status_change = now;
    next.updated_at = now;
    next.version = order.version.saturating_add(1);
    if to.is_terminal() {
        next.total_seconds = Some(next.status_timers.sum());
    }

    debug!(
        order_id = %order.id,
        %from,
        %to,
        elapsed = closed.seconds,
        version = next.version,
        "status transition"
    );

    Ok(Transition {
        change: StatusChange {
            order_id: order.id.clone(),
            from,
            to,
            elapsed_seconds: closed.seconds,
            actor: actor.to_string(),
            at: now,
            clamped: closed.warning.is_some(),
        },
        order: next,
        warning: closed.warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{displayed, total_elapsed};
    use chrono::TimeZone;

    const T0: i64 = 1_700_000_000;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(T0 + secs, 0).single().unwrap()
    }

    fn step(order: &WorkOrder, to: Status, at: i64) -> WorkOrder {
        transition(order, to, t(at), "ana", None, ClockSkewPolicy::Clamp)
            .unwrap()
            .order
    }

    #[test]
    fn fractional_instants_do_not_leak_time() {
        let ms = |n: i64| t(0) + chrono::Duration::milliseconds(n);
        let mut order = WorkOrder::new("os-1", "truck-9", "ana", ms(600));
        for (i, to) in [Status::EmExecucao, Status::AguardandoPecas, Status::EmExecucao]
            .into_iter()
            .enumerate()
        {
            let at = ms(600 + 900 * (i64::try_from(i).unwrap() + 1));
            order = transition(&order, to, at, "ana", None, ClockSkewPolicy::Clamp)
                .unwrap()
                .order;
        }
        assert_eq!(order.created_at, t(0));
        assert_eq!(order.last_status_change(), t(3));
        assert_eq!(total_elapsed(&order, ms(4_500)), 4);
    }

    #[test]
    fn finalize_freezes_the_ledger() {
        let order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        let order = step(&order, Status::EmExecucao, 3_600);
        let order = step(&order, Status::Finalizada, 7_200);

        assert_eq!(order.status_timers().get(Status::Aguardando), 3_600);
        assert_eq!(order.status_timers().get(Status::EmExecucao), 3_600);
        assert_eq!(displayed(&order, Status::EmExecucao, t(10_000)), 3_600);
        assert_eq!(total_elapsed(&order, t(10_000)), 7_200);
        assert_eq!(order.total_seconds(), Some(7_200));
        assert_eq!(order.version(), 2);
    }

    #[test]
    fn finalized_order_rejects_every_target() {
        let order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        let order = step(&order, Status::Finalizada, 60);
        for to in Status::ALL {
            let err = transition(&order, to, t(120), "ana", None, ClockSkewPolicy::Clamp)
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidTransition);
        }
    }

    #[test]
    fn stale_version_is_a_conflict_and_leaves_order_untouched() {
        let order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        let before = order.clone();
        let err = transition(
            &order,
            Status::EmExecucao,
            t(10),
            "ana",
            Some(7),
            ClockSkewPolicy::Clamp,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::Conflict {
                expected: 7,
                actual: 0,
                ..
            }
        ));
        assert_eq!(order, before);
    }

    #[test]
    fn matching_version_is_accepted() {
        let order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        let next = transition(
            &order,
            Status::EmExecucao,
            t(10),
            "ana",
            Some(0),
            ClockSkewPolicy::Clamp,
        )
        .unwrap();
        assert_eq!(next.order.version(), 1);
        assert_eq!(next.change.elapsed_seconds, 10);
        assert_eq!(next.change.actor, "ana");
    }

    #[test]
    fn negative_interval_is_clamped_and_flagged() {
        let order = WorkOrder::new("os-1", "truck-9", "ana", t(500));
        let next = transition(
            &order,
            Status::EmExecucao,
            t(400),
            "ana",
            None,
            ClockSkewPolicy::Clamp,
        )
        .unwrap();

        assert_eq!(next.order.status_timers().sum(), 0);
        assert_eq!(next.order.last_status_change(), t(400));
        assert!(next.change.clamped);
        assert_eq!(next.warning.map(|w| w.skew_secs), Some(100));
    }

    #[test]
    fn reject_policy_refuses_skewed_transition() {
        let order = WorkOrder::new("os-1", "truck-9", "ana", t(500));
        let err = transition(
            &order,
            Status::EmExecucao,
            t(400),
            "ana",
            None,
            ClockSkewPolicy::Reject,
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ClockSkewRejected);
    }

    #[test]
    fn pause_and_resume_accumulates_per_status() {
        let order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        let order = step(&order, Status::EmExecucao, 100);
        let order = step(&order, Status::AguardandoPecas, 400);
        let order = step(&order, Status::EmExecucao, 1_000);
        let order = step(&order, Status::AguardandoPecas, 1_050);

        assert_eq!(order.status_timers().get(Status::Aguardando), 100);
        assert_eq!(order.status_timers().get(Status::EmExecucao), 350);
        assert_eq!(order.status_timers().get(Status::AguardandoPecas), 600);
        assert_eq!(total_elapsed(&order, t(2_000)), 2_000);
    }
}
