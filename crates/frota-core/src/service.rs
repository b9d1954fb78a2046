//! `WorkOrderService`: the surface an API layer or the CLI calls.
//!
//! Every mutating call follows the same shape:
//!
//! 1. take the per-order [`KeyedMutex`] guard
//! 2. load the order
//! 3. apply the pure core function with `now` from the service [`Clock`]
//! 4. write back conditionally on the version read in step 2
//!
//! Step 1 serializes callers inside this process; step 4 catches writers in
//! other processes. Read projections accept a caller-supplied instant.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use crate::alerts::{self, Alerts};
use crate::config::{FROTA_DIR, ProjectConfig, load_project_config};
use crate::db::{self, OrderFilter, SaveOutcome, Store};
use crate::error::ErrorCode;
use crate::ingest::{self, IngestError, Ingested};
use crate::ledger::{self, StatusTimers};
use crate::lifecycle::{self, LifecycleError, StatusChange, Transition};
use crate::lock::{Acquired, KeyGuard, KeyedMutex, LockError, LockPolicy};
use crate::model::{CostBreakdown, PartRequest, Priority, ServiceItem, Status, WorkOrder};
use crate::productivity::{self, AssignmentEvent, ProductivityFilter, ProductivitySummary};

/// Source of "now" for mutating operations.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        ledger::whole_second(Utc::now())
    }
}

/// Clock that only moves when told to. Used by tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += chrono::Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Errors surfaced by [`WorkOrderService`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("work order {0} not found")]
    NotFound(String),

    #[error("work order {order_id} has no service item {service_id}")]
    ServiceItemNotFound { order_id: String, service_id: String },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("work order {order_id} changed concurrently: read version {expected}, stored version {actual}")]
    Conflict {
        order_id: String,
        expected: u64,
        actual: u64,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ServiceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::OrderNotFound,
            Self::ServiceItemNotFound { .. } => ErrorCode::ServiceItemNotFound,
            Self::Lifecycle(e) => e.code(),
            Self::Lock(e) => e.code(),
            Self::Ingest(e) => e.code(),
            Self::Conflict { .. } => ErrorCode::VersionConflict,
            Self::Store(_) => ErrorCode::StoreFailure,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Fields accepted when opening a new order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewOrder {
    /// Generated as `os-xxxxxxxx` when absent.
    pub id: Option<String>,
    pub vehicle_id: String,
    pub mechanic_id: Option<String>,
    pub supervisor_id: Option<String>,
    pub workshop_unit: Option<String>,
    pub category: Option<String>,
    pub priority: Priority,
    pub estimated_hours: f64,
    pub warehouse_id: Option<String>,
    pub costs: CostBreakdown,
}

/// Partial update of non-ledger fields. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
    pub vehicle_id: Option<String>,
    pub supervisor_id: Option<String>,
    pub workshop_unit: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub warehouse_id: Option<String>,
    pub labor_cost: Option<f64>,
    pub parts_cost: Option<f64>,
    pub other_cost: Option<f64>,
    pub add_parts: Vec<PartRequest>,
}

impl OrderPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply(self, order: &mut WorkOrder) {
        if let Some(v) = self.vehicle_id {
            order.vehicle_id = v;
        }
        if let Some(v) = self.supervisor_id {
            order.supervisor_id = Some(v);
        }
        if let Some(v) = self.workshop_unit {
            order.workshop_unit = Some(v);
        }
        if let Some(v) = self.category {
            order.category = Some(v);
        }
        if let Some(v) = self.priority {
            order.priority = v;
        }
        if let Some(v) = self.estimated_hours {
            order.estimated_hours = v;
        }
        if let Some(v) = self.actual_hours {
            order.actual_hours = v;
        }
        if let Some(v) = self.warehouse_id {
            order.warehouse_id = Some(v);
        }
        if let Some(v) = self.labor_cost {
            order.costs.labor = v;
        }
        if let Some(v) = self.parts_cost {
            order.costs.parts = v;
        }
        if let Some(v) = self.other_cost {
            order.costs.other = v;
        }
        order.parts.extend(self.add_parts);
    }
}

/// Read-side projection of one order at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: WorkOrder,
    pub as_of: DateTime<Utc>,
    pub displayed_seconds: StatusTimers,
    pub total_elapsed_seconds: i64,
    pub logged_effort_seconds: f64,
    pub alerts: Alerts,
    pub overtime: bool,
}

/// Outcome of [`WorkOrderService::acquire_lock`].
#[derive(Debug, Clone, PartialEq)]
pub struct LockGrant {
    pub order: WorkOrder,
    pub acquired: Acquired,
}

/// Outcome of [`WorkOrderService::assign`]. `event` is `None` when the
/// mechanic did not change.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub order: WorkOrder,
    pub event: Option<AssignmentEvent>,
}

fn generate_order_id() -> String {
    format!("os-{:08x}", rand::random::<u32>())
}

/// Facade over the store, the clock and the per-order mutex table.
///
/// Orders are serialized per key by `keys`. The single connection is only
/// held for the duration of one store call: SQLite admits one writer per
/// database file, so a pool would queue on the file lock anyway. Different
/// orders interleave between store calls and never wait on each other's
/// ledger work.
pub struct WorkOrderService<C: Clock = SystemClock> {
    conn: Mutex<rusqlite::Connection>,
    clock: C,
    keys: KeyedMutex,
    config: ProjectConfig,
    locks: LockPolicy,
}

impl WorkOrderService<SystemClock> {
    /// Open the store under `project_root/.frota/` with the project config.
    ///
    /// # Errors
    ///
    /// Fails if the config cannot be parsed or the store cannot be opened.
    pub fn open(project_root: &Path) -> anyhow::Result<Self> {
        let config = load_project_config(project_root)?;
        let conn = db::open_store(&project_root.join(FROTA_DIR).join(db::STORE_FILE))?;
        Ok(Self::new(conn, SystemClock, config))
    }
}

impl<C: Clock> WorkOrderService<C> {
    #[must_use]
    pub fn new(conn: rusqlite::Connection, clock: C, config: ProjectConfig) -> Self {
        let locks = config.locks.policy();
        Self {
            conn: Mutex::new(conn),
            clock,
            keys: KeyedMutex::new(),
            config,
            locks,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ProjectConfig {
        &self.config
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    fn with_store<T>(&self, f: impl FnOnce(&Store<'_>) -> anyhow::Result<T>) -> ServiceResult<T> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&Store::new(&conn))?)
    }

    /// Per-order guard. A zero `busy_timeout_ms` fails fast instead of waiting.
    fn guard(&self, order_id: &str) -> ServiceResult<KeyGuard<'_>> {
        let timeout = self.config.locks.busy_timeout();
        let guard = if timeout.is_zero() {
            self.keys.try_lock(order_id)
        } else {
            self.keys.lock(order_id, timeout)
        };
        Ok(guard?)
    }

    fn load(&self, order_id: &str) -> ServiceResult<WorkOrder> {
        self.with_store(|s| s.get(order_id))?
            .ok_or_else(|| ServiceError::NotFound(order_id.to_string()))
    }

    fn check_saved(outcome: SaveOutcome, order_id: &str, expected: u64) -> ServiceResult<()> {
        match outcome {
            SaveOutcome::Saved => Ok(()),
            SaveOutcome::Conflict { actual: None } => Err(ServiceError::NotFound(order_id.to_string())),
            SaveOutcome::Conflict {
                actual: Some(actual),
            } => Err(ServiceError::Conflict {
                order_id: order_id.to_string(),
                expected,
                actual,
            }),
        }
    }

    fn ensure_editable(&self, order: &WorkOrder, actor: &str, now: DateTime<Utc>) -> ServiceResult<()> {
        match order.lock() {
            Some(lock) if !self.locks.is_editable(order, actor, now) => {
                Err(ServiceError::Lock(LockError::AlreadyLocked {
                    order_id: order.id.clone(),
                    holder: lock.holder.clone(),
                    locked_at: lock.locked_at,
                }))
            }
            _ => Ok(()),
        }
    }

    fn ensure_version(order: &WorkOrder, expected_version: Option<u64>) -> ServiceResult<()> {
        match expected_version {
            Some(expected) if expected != order.version() => Err(ServiceError::Conflict {
                order_id: order.id.clone(),
                expected,
                actual: order.version(),
            }),
            _ => Ok(()),
        }
    }

    /// Open a new order in `aguardando`.
    ///
    /// # Errors
    ///
    /// Fails if the id is taken or the store write fails.
    pub fn create(&self, draft: NewOrder, actor: &str) -> ServiceResult<WorkOrder> {
        let now = self.clock.now();
        let id = draft.id.unwrap_or_else(generate_order_id);
        let mut order = WorkOrder::new(id, draft.vehicle_id, actor, now);
        order.mechanic_id = draft.mechanic_id;
        order.supervisor_id = draft.supervisor_id;
        order.workshop_unit = draft.workshop_unit;
        order.category = draft.category;
        order.priority = draft.priority;
        order.estimated_hours = draft.estimated_hours;
        order.warehouse_id = draft.warehouse_id;
        order.costs = draft.costs;

        self.with_store(|s| s.insert(&order))?;
        info!(order_id = %order.id, vehicle_id = %order.vehicle_id, actor, "work order created");
        Ok(order)
    }

    /// Normalize a loosely shaped payload and store it as a new order.
    ///
    /// # Errors
    ///
    /// Fails on an [`IngestError`] or if the id is taken.
    pub fn import(&self, raw: &serde_json::Value) -> ServiceResult<Ingested> {
        let ingested = ingest::normalize(raw, self.clock.now())?;
        self.with_store(|s| s.insert(&ingested.order))?;
        info!(
            order_id = %ingested.order.id,
            repairs = ingested.repairs.len(),
            "work order imported"
        );
        Ok(ingested)
    }

    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown id.
    pub fn get(&self, order_id: &str) -> ServiceResult<WorkOrder> {
        self.load(order_id)
    }

    /// Move an order to `to`, closing the running interval at the clock's
    /// current instant.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Lock`] if another user holds a fresh edit lock, or
    ///   the order is busy with another call past the configured wait
    /// - [`ServiceError::Lifecycle`] for invalid edges, stale
    ///   `expected_version`, or rejected clock skew
    /// - [`ServiceError::Conflict`] if another process wrote first
    pub fn transition(
        &self,
        order_id: &str,
        to: Status,
        actor: &str,
        expected_version: Option<u64>,
    ) -> ServiceResult<Transition> {
        let _guard = self.guard(order_id)?;
        let order = self.load(order_id)?;
        let now = self.clock.now();
        self.ensure_editable(&order, actor, now)?;

        let outcome = lifecycle::transition(
            &order,
            to,
            now,
            actor,
            expected_version,
            self.config.ledger.clock_skew_policy,
        )?;
        let saved = self.with_store(|s| {
            s.save(&outcome.order, order.version(), Some(&outcome.change), None)
        })?;
        Self::check_saved(saved, order_id, order.version())?;
        Ok(outcome)
    }

    /// Take (or refresh, or take over) the edit lock for `user_id`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Lock`] when another user holds a fresh lock.
    pub fn acquire_lock(&self, order_id: &str, user_id: &str) -> ServiceResult<LockGrant> {
        let _guard = self.guard(order_id)?;
        let mut order = self.load(order_id)?;
        let previous = order.lock().cloned();
        let acquired = self.locks.acquire(&mut order, user_id, self.clock.now())?;

        let saved = self.with_store(|s| s.save_lock(&order, order.version(), previous.as_ref()))?;
        Self::check_saved(saved, order_id, order.version())?;
        debug!(order_id, user_id, ?acquired, "edit lock acquired");
        Ok(LockGrant { order, acquired })
    }

    /// Release the edit lock if `user_id` holds it. Returns whether a lock was
    /// cleared; releasing twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown id.
    pub fn release_lock(&self, order_id: &str, user_id: &str) -> ServiceResult<bool> {
        let _guard = self.guard(order_id)?;
        let mut order = self.load(order_id)?;
        let previous = order.lock().cloned();
        if !self.locks.release(&mut order, user_id) {
            return Ok(false);
        }
        let saved = self.with_store(|s| s.save_lock(&order, order.version(), previous.as_ref()))?;
        Self::check_saved(saved, order_id, order.version())?;
        debug!(order_id, user_id, "edit lock released");
        Ok(true)
    }

    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown id.
    pub fn is_editable(&self, order_id: &str, user_id: &str) -> ServiceResult<bool> {
        let order = self.load(order_id)?;
        Ok(self.locks.is_editable(&order, user_id, self.clock.now()))
    }

    /// Run a structural edit: lock check, version check, `f`, version bump
    /// and conditional write.
    fn edit<T>(
        &self,
        order_id: &str,
        actor: &str,
        expected_version: Option<u64>,
        f: impl FnOnce(&mut WorkOrder, DateTime<Utc>) -> ServiceResult<(T, Option<AssignmentEvent>)>,
    ) -> ServiceResult<(WorkOrder, T, Option<AssignmentEvent>)> {
        let _guard = self.guard(order_id)?;
        let order = self.load(order_id)?;
        let now = self.clock.now();
        self.ensure_editable(&order, actor, now)?;
        Self::ensure_version(&order, expected_version)?;

        let mut next = order.clone();
        let (value, event) = f(&mut next, now)?;
        next.version = order.version().saturating_add(1);
        next.updated_at = now;

        let saved = self.with_store(|s| s.save(&next, order.version(), None, event.as_ref()))?;
        Self::check_saved(saved, order_id, order.version())?;
        Ok((next, value, event))
    }

    /// Hand the order to `mechanic_id`, recording an [`AssignmentEvent`] with
    /// the execution dwell accumulated so far.
    ///
    /// # Errors
    ///
    /// Same lock, version and conflict errors as [`Self::transition`].
    pub fn assign(
        &self,
        order_id: &str,
        mechanic_id: &str,
        actor: &str,
        expected_version: Option<u64>,
    ) -> ServiceResult<Assignment> {
        let current = self.load(order_id)?;
        if current.mechanic_id() == Some(mechanic_id) {
            Self::ensure_version(&current, expected_version)?;
            return Ok(Assignment {
                order: current,
                event: None,
            });
        }

        let (order, (), event) = self.edit(order_id, actor, expected_version, |order, now| {
            if order.mechanic_id() == Some(mechanic_id) {
                return Ok(((), None));
            }
            let event = AssignmentEvent::snapshot(order, mechanic_id, now);
            order.mechanic_id = Some(mechanic_id.to_string());
            Ok(((), Some(event)))
        })?;
        info!(order_id, mechanic_id, actor, "work order reassigned");
        Ok(Assignment { order, event })
    }

    /// Apply a partial update of non-ledger fields.
    ///
    /// # Errors
    ///
    /// Same lock, version and conflict errors as [`Self::transition`].
    pub fn update_details(
        &self,
        order_id: &str,
        patch: OrderPatch,
        actor: &str,
        expected_version: Option<u64>,
    ) -> ServiceResult<WorkOrder> {
        let (order, (), _) = self.edit(order_id, actor, expected_version, |order, _| {
            patch.apply(order);
            Ok(((), None))
        })?;
        Ok(order)
    }

    /// Append a service line.
    ///
    /// # Errors
    ///
    /// Same lock and conflict errors as [`Self::transition`].
    pub fn add_service(
        &self,
        order_id: &str,
        description: &str,
        category: &str,
        actor: &str,
    ) -> ServiceResult<(WorkOrder, ServiceItem)> {
        let (order, item, _) = self.edit(order_id, actor, None, |order, _| {
            let item = ServiceItem::new(
                format!("svc-{}", order.services.len() + 1),
                description,
                category,
            );
            order.services.push(item.clone());
            Ok((item, None))
        })?;
        Ok((order, item))
    }

    fn service_op(
        &self,
        order_id: &str,
        service_id: &str,
        actor: &str,
        op: impl FnOnce(&mut ServiceItem, DateTime<Utc>),
    ) -> ServiceResult<(WorkOrder, ServiceItem)> {
        let (order, item, _) = self.edit(order_id, actor, None, |order, now| {
            let item = order.service_mut(service_id).ok_or_else(|| {
                ServiceError::ServiceItemNotFound {
                    order_id: order_id.to_string(),
                    service_id: service_id.to_string(),
                }
            })?;
            op(item, now);
            Ok((item.clone(), None))
        })?;
        Ok((order, item))
    }

    /// Start a service line's effort timer. A running timer is left alone.
    ///
    /// # Errors
    ///
    /// [`ServiceError::ServiceItemNotFound`] plus the usual edit errors.
    pub fn start_service(&self, order_id: &str, service_id: &str, actor: &str) -> ServiceResult<(WorkOrder, ServiceItem)> {
        self.service_op(order_id, service_id, actor, ServiceItem::start_timer)
    }

    /// Stop a service line's effort timer and bank the interval.
    ///
    /// # Errors
    ///
    /// [`ServiceError::ServiceItemNotFound`] plus the usual edit errors.
    pub fn stop_service(&self, order_id: &str, service_id: &str, actor: &str) -> ServiceResult<(WorkOrder, ServiceItem)> {
        self.service_op(order_id, service_id, actor, |item, now| {
            item.stop_timer(now);
        })
    }

    /// Mark a service line done, banking a running timer first.
    ///
    /// # Errors
    ///
    /// [`ServiceError::ServiceItemNotFound`] plus the usual edit errors.
    pub fn complete_service(&self, order_id: &str, service_id: &str, actor: &str) -> ServiceResult<(WorkOrder, ServiceItem)> {
        self.service_op(order_id, service_id, actor, ServiceItem::complete)
    }

    /// Project `order` at `at`. Pure.
    #[must_use]
    pub fn project(&self, order: WorkOrder, at: DateTime<Utc>) -> OrderView {
        OrderView {
            displayed_seconds: ledger::project(&order, at),
            total_elapsed_seconds: ledger::total_elapsed(&order, at),
            logged_effort_seconds: alerts::logged_effort_seconds(&order, at),
            alerts: alerts::evaluate(&order, at, &self.config.alerts),
            overtime: alerts::overtime(&order, at),
            as_of: at,
            order,
        }
    }

    /// One order projected at `at`, or at the clock's now.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown id.
    pub fn view(&self, order_id: &str, at: Option<DateTime<Utc>>) -> ServiceResult<OrderView> {
        let order = self.load(order_id)?;
        Ok(self.project(order, at.unwrap_or_else(|| self.clock.now())))
    }

    /// Every order matching `filter`, projected at one shared instant.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn list_views(&self, filter: &OrderFilter, at: Option<DateTime<Utc>>) -> ServiceResult<Vec<OrderView>> {
        let at = at.unwrap_or_else(|| self.clock.now());
        let orders = self.with_store(|s| s.list(filter))?;
        Ok(orders.into_iter().map(|o| self.project(o, at)).collect())
    }

    /// Status changes of one order, oldest first.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown id.
    pub fn history(&self, order_id: &str) -> ServiceResult<Vec<StatusChange>> {
        self.load(order_id)?;
        self.with_store(|s| s.history(order_id))
    }

    /// Per-mechanic roll-up of assignment snapshots.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn productivity(&self, filter: &ProductivityFilter) -> ServiceResult<ProductivitySummary> {
        let events = self.with_store(|s| s.assignment_events(filter))?;
        Ok(productivity::summarize(&events, filter))
    }
}
