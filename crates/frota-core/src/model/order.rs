use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::status::{PartStatus, Priority, Status};
use crate::ledger::{self, StatusTimers};

/// Labor/parts/other cost split of a work order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CostBreakdown {
    pub labor: f64,
    pub parts: f64,
    pub other: f64,
}

impl CostBreakdown {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.labor + self.parts + self.other
    }
}

/// One line of service work on an order.
///
/// The sub-timer measures a mechanic's logged effort on this line. It is
/// independent of the order-level status ledger: effort and latency answer
/// different questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceItem {
    pub id: String,
    pub description: String,
    pub category: String,
    pub completed: bool,
    pub actual_seconds: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub is_timer_active: bool,
}

impl Default for ServiceItem {
    fn default() -> Self {
        Self {
            id: String::new(),
            description: String::new(),
            category: String::new(),
            completed: false,
            actual_seconds: 0,
            started_at: None,
            is_timer_active: false,
        }
    }
}

impl ServiceItem {
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            category: category.into(),
            ..Self::default()
        }
    }

    /// Start the effort timer. Starting a running timer is a no-op.
    pub fn start_timer(&mut self, now: DateTime<Utc>) {
        if self.is_timer_active {
            return;
        }
        self.started_at = Some(now);
        self.is_timer_active = true;
    }

    /// Stop the effort timer and bank the running interval.
    ///
    /// Returns the seconds banked. Stopping an idle timer banks nothing.
    pub fn stop_timer(&mut self, now: DateTime<Utc>) -> i64 {
        let banked = self.running_seconds(now);
        self.actual_seconds = self.actual_seconds.max(0).saturating_add(banked);
        self.started_at = None;
        self.is_timer_active = false;
        banked
    }

    /// Mark the line as done, banking any running interval first.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.stop_timer(now);
        self.completed = true;
    }

    /// Logged effort at `now`, including a running interval.
    #[must_use]
    pub fn logged_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.actual_seconds.max(0).saturating_add(self.running_seconds(now))
    }

    fn running_seconds(&self, now: DateTime<Utc>) -> i64 {
        match (self.is_timer_active, self.started_at) {
            (true, Some(started)) => ledger::clamped_seconds(started, now),
            _ => 0,
        }
    }
}

/// A part needed to complete the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartRequest {
    pub sku: String,
    pub qty: u32,
    pub status: PartStatus,
}

impl Default for PartRequest {
    fn default() -> Self {
        Self {
            sku: String::new(),
            qty: 1,
            status: PartStatus::Pendente,
        }
    }
}

/// Advisory edit lock: who is editing and since when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLock {
    pub holder: String,
    pub locked_at: DateTime<Utc>,
}

impl EditLock {
    /// Age of the lock at `now`. Never negative.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.locked_at).max(Duration::zero())
    }

    /// A lock at least `max_age` old is treated as abandoned.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) >= max_age
    }
}

/// A fleet maintenance work order (OS).
///
/// Ledger fields (`status`, `status_timers`, `last_status_change`,
/// `total_seconds`) and the concurrency fields (`lock`, `version`) are only
/// writable inside this crate; status changes go through
/// [`crate::lifecycle::transition`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkOrder {
    pub id: String,
    pub vehicle_id: String,
    pub(crate) mechanic_id: Option<String>,
    pub supervisor_id: Option<String>,
    pub workshop_unit: Option<String>,
    pub category: Option<String>,
    pub(crate) status: Status,
    pub priority: Priority,
    pub costs: CostBreakdown,
    pub services: Vec<ServiceItem>,
    pub parts: Vec<PartRequest>,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub created_by: String,
    pub warehouse_id: Option<String>,
    pub(crate) lock: Option<EditLock>,
    pub(crate) status_timers: StatusTimers,
    pub(crate) last_status_change: DateTime<Utc>,
    pub(crate) total_seconds: Option<i64>,
    pub(crate) version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    /// Create a fresh order in `aguardando` with a zeroed ledger.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        vehicle_id: impl Into<String>,
        created_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let created_at = crate::ledger::whole_second(created_at);
        Self {
            id: id.into(),
            vehicle_id: vehicle_id.into(),
            mechanic_id: None,
            supervisor_id: None,
            workshop_unit: None,
            category: None,
            status: Status::Aguardando,
            priority: Priority::Normal,
            costs: CostBreakdown::default(),
            services: Vec::new(),
            parts: Vec::new(),
            estimated_hours: 0.0,
            actual_hours: 0.0,
            created_by: created_by.into(),
            warehouse_id: None,
            lock: None,
            status_timers: StatusTimers::default(),
            last_status_change: created_at,
            total_seconds: None,
            version: 0,
            created_at,
            updated_at: created_at,
        }
    }

    /// Assign the initial mechanic before the order is first persisted.
    #[must_use]
    pub fn with_mechanic(mut self, mechanic_id: impl Into<String>) -> Self {
        self.mechanic_id = Some(mechanic_id.into());
        self
    }

    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn mechanic_id(&self) -> Option<&str> {
        self.mechanic_id.as_deref()
    }

    #[must_use]
    pub const fn status_timers(&self) -> &StatusTimers {
        &self.status_timers
    }

    #[must_use]
    pub const fn last_status_change(&self) -> DateTime<Utc> {
        self.last_status_change
    }

    /// Cached ledger total, written when the order entered a terminal status.
    #[must_use]
    pub const fn total_seconds(&self) -> Option<i64> {
        self.total_seconds
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub const fn lock(&self) -> Option<&EditLock> {
        self.lock.as_ref()
    }

    #[must_use]
    pub fn service(&self, service_id: &str) -> Option<&ServiceItem> {
        self.services.iter().find(|s| s.id == service_id)
    }

    pub fn service_mut(&mut self, service_id: &str) -> Option<&mut ServiceItem> {
        self.services.iter_mut().find(|s| s.id == service_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{EditLock, ServiceItem, WorkOrder};
    use crate::model::status::Status;
    use chrono::{Duration, TimeZone, Utc};

    fn t(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    #[test]
    fn new_order_starts_waiting_with_zero_ledger() {
        let order = WorkOrder::new("os-1", "truck-9", "ana", t(0));
        assert_eq!(order.status(), Status::Aguardando);
        assert_eq!(order.status_timers().sum(), 0);
        assert_eq!(order.last_status_change(), order.created_at);
        assert_eq!(order.version(), 0);
        assert!(order.lock().is_none());
        assert!(order.total_seconds().is_none());
    }

    #[test]
    fn service_timer_banks_running_interval() {
        let mut item = ServiceItem::new("s1", "Trocar óleo", "motor");
        item.start_timer(t(0));
        item.start_timer(t(50));
        assert_eq!(item.logged_seconds(t(120)), 120);
        assert_eq!(item.stop_timer(t(300)), 300);
        assert!(!item.is_timer_active);
        assert_eq!(item.stop_timer(t(400)), 0);
        assert_eq!(item.logged_seconds(t(1_000)), 300);
    }

    #[test]
    fn service_timer_clamps_backwards_clock() {
        let mut item = ServiceItem::new("s1", "Freios", "freio");
        item.start_timer(t(100));
        assert_eq!(item.stop_timer(t(40)), 0);
        assert_eq!(item.actual_seconds, 0);
    }

    #[test]
    fn complete_stops_running_timer() {
        let mut item = ServiceItem::new("s1", "Alinhamento", "suspensao");
        item.start_timer(t(0));
        item.complete(t(90));
        assert!(item.completed);
        assert_eq!(item.actual_seconds, 90);
    }

    #[test]
    fn lock_staleness_uses_max_age_boundary() {
        let lock = EditLock {
            holder: "ana".into(),
            locked_at: t(0),
        };
        let max_age = Duration::minutes(30);
        assert!(!lock.is_stale(t(29 * 60), max_age));
        assert!(lock.is_stale(t(30 * 60), max_age));
        assert_eq!(lock.age(t(-60)), Duration::zero());
    }
}
