//! Escalation flags derived from the ledger projection.
//!
//! Everything here is a pure function of `(order, now)`. Boundaries are
//! strict: a dwell exactly equal to its limit is not yet in alert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{displayed, hours_to_seconds, total_elapsed};
use crate::model::{Status, WorkOrder};

/// Limits used by [`evaluate`]. Hours, converted at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Maximum dwell in `aguardando`.
    pub waiting_hours: f64,
    /// Lower bound of the `em_execucao` limit.
    pub execution_floor_hours: f64,
    /// `em_execucao` limit as a multiple of the estimate.
    pub execution_factor: f64,
    /// Maximum dwell in `aguardando_pecas`.
    pub paused_hours: f64,
    /// Total age limit as a multiple of the estimate.
    pub total_factor: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            waiting_hours: 4.0,
            execution_floor_hours: 2.0,
            execution_factor: 1.2,
            paused_hours: 6.0,
            total_factor: 2.0,
        }
    }
}

/// Escalation flags for one order at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct Alerts {
    pub waiting_alert: bool,
    pub execution_alert: bool,
    pub paused_alert: bool,
    pub total_alert: bool,
    pub has_alert: bool,
}

#[allow(clippy::cast_precision_loss)]
fn secs_f64(seconds: i64) -> f64 {
    seconds as f64
}

/// Evaluate the four escalation flags at `now`.
#[must_use]
pub fn evaluate(order: &WorkOrder, now: DateTime<Utc>, limits: &AlertThresholds) -> Alerts {
    let estimate = hours_to_seconds(order.estimated_hours);

    let waiting = secs_f64(displayed(order, Status::Aguardando, now));
    let executing = secs_f64(displayed(order, Status::EmExecucao, now));
    let paused = secs_f64(displayed(order, Status::AguardandoPecas, now));
    let total = secs_f64(total_elapsed(order, now));

    let execution_limit =
        hours_to_seconds(limits.execution_floor_hours).max(estimate * limits.execution_factor);

    let waiting_alert = waiting > hours_to_seconds(limits.waiting_hours);
    let execution_alert = executing > execution_limit;
    let paused_alert = paused > hours_to_seconds(limits.paused_hours);
    let total_alert = estimate > 0.0 && total > estimate * limits.total_factor;

    Alerts {
        waiting_alert,
        execution_alert,
        paused_alert,
        total_alert,
        has_alert: waiting_alert || execution_alert || paused_alert || total_alert,
    }
}

/// Logged mechanic effort at `now`: the sum of service sub-timers, or
/// `actual_hours` when the order has no service lines.
#[must_use]
pub fn logged_effort_seconds(order: &WorkOrder, now: DateTime<Utc>) -> f64 {
    if order.services.is_empty() {
        hours_to_seconds(order.actual_hours)
    } else {
        order
            .services
            .iter()
            .map(|s| secs_f64(s.logged_seconds(now)))
            .sum()
    }
}

/// Logged effort exceeds the estimate.
///
/// Deliberately independent of the status ledger: this answers "did the
/// mechanics spend more than planned", not "has the order waited too long".
#[must_use]
pub fn overtime(order: &WorkOrder, now: DateTime<Utc>) -> bool {
    let estimate = hours_to_seconds(order.estimated_hours);
    estimate > 0.0 && logged_effort_seconds(order, now) > estimate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{ClockSkewPolicy, transition};
    use crate::model::ServiceItem;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn executing_since(start: i64, estimated_hours: f64) -> WorkOrder {
        let mut order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        order.estimated_hours = estimated_hours;
        transition(&order, Status::EmExecucao, t(start), "ana", None, ClockSkewPolicy::Clamp)
            .unwrap()
            .order
    }

    #[test]
    fn execution_alert_boundary_is_strict() {
        let order = executing_since(0, 2.0);
        let limits = AlertThresholds::default();

        let at_limit = evaluate(&order, t(2 * 3600 + 24 * 60), &limits);
        assert!(!at_limit.execution_alert);

        let past_limit = evaluate(&order, t(2 * 3600 + 24 * 60 + 1), &limits);
        assert!(past_limit.execution_alert);
        assert!(past_limit.has_alert);
    }

    #[test]
    fn execution_limit_never_drops_below_floor() {
        let order = executing_since(0, 0.5);
        let limits = AlertThresholds::default();
        assert!(!evaluate(&order, t(7_200), &limits).execution_alert);
        assert!(evaluate(&order, t(7_201), &limits).execution_alert);
    }

    #[test]
    fn waiting_alert_after_four_hours() {
        let order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        let limits = AlertThresholds::default();
        assert!(!evaluate(&order, t(4 * 3600), &limits).waiting_alert);
        let alerts = evaluate(&order, t(4 * 3600 + 1), &limits);
        assert!(alerts.waiting_alert);
        assert!(!alerts.total_alert, "no estimate means no total alert");
    }

    #[test]
    fn paused_alert_after_six_hours() {
        let order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        let order = transition(&order, Status::AguardandoPecas, t(0), "ana", None, ClockSkewPolicy::Clamp)
            .unwrap()
            .order;
        let limits = AlertThresholds::default();
        assert!(!evaluate(&order, t(6 * 3600), &limits).paused_alert);
        assert!(evaluate(&order, t(6 * 3600 + 1), &limits).paused_alert);
    }

    #[test]
    fn total_alert_uses_double_the_estimate() {
        let mut order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        order.estimated_hours = 1.0;
        let limits = AlertThresholds::default();
        assert!(!evaluate(&order, t(7_200), &limits).total_alert);
        assert!(evaluate(&order, t(7_201), &limits).total_alert);
    }

    #[test]
    fn garbage_estimate_reads_as_zero() {
        let mut order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        order.estimated_hours = f64::NAN;
        let alerts = evaluate(&order, t(100_000), &AlertThresholds::default());
        assert!(!alerts.total_alert);
        assert!(!overtime(&order, t(100_000)));
    }

    #[test]
    fn overtime_sums_service_timers() {
        let mut order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        order.estimated_hours = 1.0;
        let mut oil = ServiceItem::new("s1", "Óleo", "motor");
        oil.actual_seconds = 1_800;
        let mut brakes = ServiceItem::new("s2", "Freio", "freio");
        brakes.start_timer(t(0));
        order.services = vec![oil, brakes];

        assert!(!overtime(&order, t(1_800)));
        assert!(overtime(&order, t(1_801)));
    }

    #[test]
    fn overtime_falls_back_to_actual_hours() {
        let mut order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        order.estimated_hours = 2.0;
        order.actual_hours = 2.0;
        assert!(!overtime(&order, t(0)));
        order.actual_hours = 2.5;
        assert!(overtime(&order, t(0)));
    }
}
