//! Typed reads and compare-and-swap writes against the work-order tables.
//!
//! Every write runs in a single `BEGIN IMMEDIATE` transaction: the order row,
//! its child rows and any history rows land together or not at all. Order
//! writes are conditional on the `version` and edit-lock columns the caller
//! read, so a writer that slipped in between read and write turns the second
//! write into [`SaveOutcome::Conflict`] instead of a lost update.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{
    Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params,
    params_from_iter, types::Type,
};
use std::str::FromStr;
use tracing::warn;

use crate::ingest;
use crate::ledger::StatusTimers;
use crate::lifecycle::StatusChange;
use crate::model::{
    CostBreakdown, EditLock, PartRequest, PartStatus, Priority, ServiceItem, Status, WorkOrder,
};
use crate::productivity::{AssignmentEvent, ProductivityFilter};

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The row changed since it was read. `actual` is the stored version, or
    /// `None` if the order no longer exists.
    Conflict { actual: Option<u64> },
}

/// Filters for [`Store::list`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<Status>,
    pub mechanic_id: Option<String>,
    pub category: Option<String>,
    /// Skip `finalizada` and `cancelada` orders.
    pub open_only: bool,
    pub limit: Option<u32>,
}

const ORDER_COLUMNS: &str = "order_id, vehicle_id, mechanic_id, supervisor_id, workshop_unit, \
     category, status, priority, cost_labor, cost_parts, cost_other, estimated_hours, \
     actual_hours, created_by, warehouse_id, locked_by, locked_at_us, status_timers, \
     last_status_change_us, total_seconds, version, created_at_us, updated_at_us";

fn to_us(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_us(us: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(us).single().unwrap_or_default()
}

fn version_to_sql(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

fn parse_column<T: FromStr>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

fn timers_from_column(order_id: &str, raw: &str) -> StatusTimers {
    let mut repairs = Vec::new();
    let timers = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => ingest::status_timers_from_value(&value, &mut repairs),
        Err(error) => {
            repairs.push(format!("status_timers column is not JSON ({error}); zeroed"));
            StatusTimers::default()
        }
    };
    for repair in repairs {
        warn!(order_id, "stored ledger repaired on read: {repair}");
    }
    timers
}

fn row_to_order(row: &Row<'_>) -> rusqlite::Result<WorkOrder> {
    let id: String = row.get(0)?;
    let status: String = row.get(6)?;
    let priority: String = row.get(7)?;
    let locked_by: Option<String> = row.get(15)?;
    let locked_at_us: Option<i64> = row.get(16)?;
    let timers: String = row.get(17)?;
    let version: i64 = row.get(20)?;

    let status_timers = timers_from_column(&id, &timers);
    Ok(WorkOrder {
        vehicle_id: row.get(1)?,
        mechanic_id: row.get(2)?,
        supervisor_id: row.get(3)?,
        workshop_unit: row.get(4)?,
        category: row.get(5)?,
        status: parse_column::<Status>(6, &status)?,
        priority: parse_column::<Priority>(7, &priority)?,
        costs: CostBreakdown {
            labor: row.get(8)?,
            parts: row.get(9)?,
            other: row.get(10)?,
        },
        services: Vec::new(),
        parts: Vec::new(),
        estimated_hours: row.get(11)?,
        actual_hours: row.get(12)?,
        created_by: row.get(13)?,
        warehouse_id: row.get(14)?,
        lock: locked_by.zip(locked_at_us).map(|(holder, at)| EditLock {
            holder,
            locked_at: from_us(at),
        }),
        status_timers,
        last_status_change: from_us(row.get(18)?),
        total_seconds: row.get(19)?,
        version: u64::try_from(version).unwrap_or(0),
        created_at: from_us(row.get(21)?),
        updated_at: from_us(row.get(22)?),
        id,
    })
}

fn load_children(conn: &Connection, order: &mut WorkOrder) -> Result<()> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT service_id, description, category, completed, actual_seconds, \
             started_at_us, is_timer_active \
             FROM service_items WHERE order_id = ?1 ORDER BY position ASC",
        )
        .context("prepare service_items query")?;
    order.services = stmt
        .query_map(params![order.id], |row| {
            let started_at: Option<i64> = row.get(5)?;
            Ok(ServiceItem {
                id: row.get(0)?,
                description: row.get(1)?,
                category: row.get(2)?,
                completed: row.get(3)?,
                actual_seconds: row.get::<_, i64>(4)?.max(0),
                started_at: started_at.map(from_us),
                is_timer_active: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("load services of {}", order.id))?;

    let mut stmt = conn
        .prepare_cached(
            "SELECT sku, qty, status FROM part_requests WHERE order_id = ?1 ORDER BY position ASC",
        )
        .context("prepare part_requests query")?;
    order.parts = stmt
        .query_map(params![order.id], |row| {
            let status: String = row.get(2)?;
            Ok(PartRequest {
                sku: row.get(0)?,
                qty: row.get(1)?,
                status: parse_column::<PartStatus>(2, &status)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("load parts of {}", order.id))?;
    Ok(())
}

fn replace_children(conn: &Connection, order: &WorkOrder) -> Result<()> {
    conn.execute("DELETE FROM service_items WHERE order_id = ?1", params![order.id])
        .context("clear service_items")?;
    conn.execute("DELETE FROM part_requests WHERE order_id = ?1", params![order.id])
        .context("clear part_requests")?;

    let mut insert_service = conn
        .prepare_cached(
            "INSERT INTO service_items (order_id, service_id, position, description, category, \
             completed, actual_seconds, started_at_us, is_timer_active) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .context("prepare service insert")?;
    for (position, item) in order.services.iter().enumerate() {
        insert_service
            .execute(params![
                order.id,
                item.id,
                i64::try_from(position).unwrap_or(i64::MAX),
                item.description,
                item.category,
                item.completed,
                item.actual_seconds.max(0),
                item.started_at.map(to_us),
                item.is_timer_active,
            ])
            .with_context(|| format!("insert service {} of {}", item.id, order.id))?;
    }

    let mut insert_part = conn
        .prepare_cached(
            "INSERT INTO part_requests (order_id, position, sku, qty, status) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .context("prepare part insert")?;
    for (position, part) in order.parts.iter().enumerate() {
        insert_part
            .execute(params![
                order.id,
                i64::try_from(position).unwrap_or(i64::MAX),
                part.sku,
                part.qty.max(1),
                part.status.as_str(),
            ])
            .with_context(|| format!("insert part {} of {}", part.sku, order.id))?;
    }
    Ok(())
}

fn insert_change(conn: &Connection, change: &StatusChange) -> Result<()> {
    conn.execute(
        "INSERT INTO status_history (order_id, from_status, to_status, elapsed_seconds, actor, \
         clamped, at_us) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            change.order_id,
            change.from.as_str(),
            change.to.as_str(),
            change.elapsed_seconds.max(0),
            change.actor,
            change.clamped,
            to_us(change.at),
        ],
    )
    .with_context(|| format!("record status change of {}", change.order_id))?;
    Ok(())
}

fn insert_assignment(conn: &Connection, event: &AssignmentEvent) -> Result<()> {
    conn.execute(
        "INSERT INTO assignment_events (order_id, previous_mechanic_id, new_mechanic_id, \
         category, accumulated_seconds, recorded_at_us) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.order_id,
            event.previous_mechanic_id,
            event.new_mechanic_id,
            event.category,
            event.accumulated_seconds,
            to_us(event.recorded_at),
        ],
    )
    .with_context(|| format!("record assignment of {}", event.order_id))?;
    Ok(())
}

fn stored_version(conn: &Connection, order_id: &str) -> Result<Option<u64>> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM work_orders WHERE order_id = ?1",
            params![order_id],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("read version of {order_id}"))?;
    Ok(version.map(|v| u64::try_from(v).unwrap_or(0)))
}

/// Work-order persistence on a borrowed connection.
pub struct Store<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Store<'conn> {
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn begin(&self) -> Result<Transaction<'conn>> {
        Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .context("begin immediate transaction")
    }

    /// Insert a new order with its child rows.
    ///
    /// # Errors
    ///
    /// Fails if the id is taken or the write fails.
    pub fn insert(&self, order: &WorkOrder) -> Result<()> {
        let tx = self.begin()?;
        tx.execute(
            &format!(
                "INSERT INTO work_orders ({ORDER_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
                 ?18, ?19, ?20, ?21, ?22, ?23)"
            ),
            params![
                order.id,
                order.vehicle_id,
                order.mechanic_id,
                order.supervisor_id,
                order.workshop_unit,
                order.category,
                order.status.as_str(),
                order.priority.as_str(),
                order.costs.labor,
                order.costs.parts,
                order.costs.other,
                order.estimated_hours,
                order.actual_hours,
                order.created_by,
                order.warehouse_id,
                order.lock.as_ref().map(|l| l.holder.as_str()),
                order.lock.as_ref().map(|l| to_us(l.locked_at)),
                serde_json::to_string(&order.status_timers).context("encode status_timers")?,
                to_us(order.last_status_change),
                order.total_seconds,
                version_to_sql(order.version),
                to_us(order.created_at),
                to_us(order.updated_at),
            ],
        )
        .with_context(|| format!("insert work order {}", order.id))?;
        replace_children(&tx, order)?;
        tx.commit().context("commit insert")?;
        Ok(())
    }

    /// Fetch one order with its services and parts.
    ///
    /// # Errors
    ///
    /// Fails on query errors or a row whose status/priority text is unknown.
    pub fn get(&self, order_id: &str) -> Result<Option<WorkOrder>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {ORDER_COLUMNS} FROM work_orders WHERE order_id = ?1"))
            .context("prepare get query")?;
        let Some(mut order) = stmt
            .query_row(params![order_id], row_to_order)
            .optional()
            .with_context(|| format!("get work order '{order_id}'"))?
        else {
            return Ok(None);
        };
        load_children(self.conn, &mut order)?;
        Ok(Some(order))
    }

    /// Orders matching `filter`, oldest first.
    ///
    /// # Errors
    ///
    /// Fails on query errors.
    pub fn list(&self, filter: &OrderFilter) -> Result<Vec<WorkOrder>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            values.push(status.as_str().to_string());
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(mechanic) = &filter.mechanic_id {
            values.push(mechanic.clone());
            clauses.push(format!("mechanic_id = ?{}", values.len()));
        }
        if let Some(category) = &filter.category {
            values.push(category.clone());
            clauses.push(format!("category = ?{}", values.len()));
        }
        if filter.open_only {
            clauses.push("status NOT IN ('finalizada', 'cancelada')".to_string());
        }

        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM work_orders");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at_us ASC, order_id ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = self.conn.prepare(&sql).context("prepare list query")?;
        let mut orders = stmt
            .query_map(params_from_iter(values.iter()), row_to_order)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list work orders")?;
        for order in &mut orders {
            load_children(self.conn, order)?;
        }
        Ok(orders)
    }

    /// Persist `order` if the stored row still carries `expected_version` and
    /// the edit lock `order` was read with.
    ///
    /// Lock columns are never written here; see [`Self::save_lock`]. The
    /// history rows are inserted in the same transaction.
    ///
    /// # Errors
    ///
    /// Fails on database errors. A lost race is not an error but
    /// [`SaveOutcome::Conflict`].
    pub fn save(
        &self,
        order: &WorkOrder,
        expected_version: u64,
        change: Option<&StatusChange>,
        assignment: Option<&AssignmentEvent>,
    ) -> Result<SaveOutcome> {
        let tx = self.begin()?;
        let updated = tx
            .execute(
                "UPDATE work_orders SET vehicle_id = ?2, mechanic_id = ?3, supervisor_id = ?4, \
                 workshop_unit = ?5, category = ?6, status = ?7, priority = ?8, cost_labor = ?9, \
                 cost_parts = ?10, cost_other = ?11, estimated_hours = ?12, actual_hours = ?13, \
                 warehouse_id = ?14, status_timers = ?15, last_status_change_us = ?16, \
                 total_seconds = ?17, version = ?18, updated_at_us = ?19 \
                 WHERE order_id = ?1 AND version = ?20 AND locked_by IS ?21 AND locked_at_us IS ?22",
                params![
                    order.id,
                    order.vehicle_id,
                    order.mechanic_id,
                    order.supervisor_id,
                    order.workshop_unit,
                    order.category,
                    order.status.as_str(),
                    order.priority.as_str(),
                    order.costs.labor,
                    order.costs.parts,
                    order.costs.other,
                    order.estimated_hours,
                    order.actual_hours,
                    order.warehouse_id,
                    serde_json::to_string(&order.status_timers).context("encode status_timers")?,
                    to_us(order.last_status_change),
                    order.total_seconds,
                    version_to_sql(order.version),
                    to_us(order.updated_at),
                    version_to_sql(expected_version),
                    order.lock.as_ref().map(|l| l.holder.as_str()),
                    order.lock.as_ref().map(|l| to_us(l.locked_at)),
                ],
            )
            .with_context(|| format!("update work order {}", order.id))?;

        if updated == 0 {
            let actual = stored_version(&tx, &order.id)?;
            return Ok(SaveOutcome::Conflict { actual });
        }

        replace_children(&tx, order)?;
        if let Some(change) = change {
            insert_change(&tx, change)?;
        }
        if let Some(event) = assignment {
            insert_assignment(&tx, event)?;
        }
        tx.commit().context("commit save")?;
        Ok(SaveOutcome::Saved)
    }

    /// Write only the edit-lock columns of `order`, conditional on the
    /// version and the lock (`previous`) the caller read.
    ///
    /// # Errors
    ///
    /// Fails on database errors.
    pub fn save_lock(
        &self,
        order: &WorkOrder,
        expected_version: u64,
        previous: Option<&EditLock>,
    ) -> Result<SaveOutcome> {
        let tx = self.begin()?;
        let updated = tx
            .execute(
                "UPDATE work_orders SET locked_by = ?2, locked_at_us = ?3 \
                 WHERE order_id = ?1 AND version = ?4 AND locked_by IS ?5 AND locked_at_us IS ?6",
                params![
                    order.id,
                    order.lock.as_ref().map(|l| l.holder.as_str()),
                    order.lock.as_ref().map(|l| to_us(l.locked_at)),
                    version_to_sql(expected_version),
                    previous.map(|l| l.holder.as_str()),
                    previous.map(|l| to_us(l.locked_at)),
                ],
            )
            .with_context(|| format!("update edit lock of {}", order.id))?;

        if updated == 0 {
            let actual = stored_version(&tx, &order.id)?;
            return Ok(SaveOutcome::Conflict { actual });
        }
        tx.commit().context("commit lock")?;
        Ok(SaveOutcome::Saved)
    }

    /// Status changes of one order, oldest first.
    ///
    /// # Errors
    ///
    /// Fails on query errors.
    pub fn history(&self, order_id: &str) -> Result<Vec<StatusChange>> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT order_id, from_status, to_status, elapsed_seconds, actor, at_us, clamped \
                 FROM status_history WHERE order_id = ?1 ORDER BY at_us ASC, change_id ASC",
            )
            .context("prepare history query")?;
        stmt.query_map(params![order_id], |row| {
            let from: String = row.get(1)?;
            let to: String = row.get(2)?;
            Ok(StatusChange {
                order_id: row.get(0)?,
                from: parse_column(1, &from)?,
                to: parse_column(2, &to)?,
                elapsed_seconds: row.get(3)?,
                actor: row.get(4)?,
                at: from_us(row.get(5)?),
                clamped: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("load history of {order_id}"))
    }

    /// Assignment events matching `filter`, in recording order.
    ///
    /// # Errors
    ///
    /// Fails on query errors.
    pub fn assignment_events(&self, filter: &ProductivityFilter) -> Result<Vec<AssignmentEvent>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(mechanic) = &filter.mechanic_id {
            values.push(mechanic.clone().into());
            clauses.push(format!("new_mechanic_id = ?{}", values.len()));
        }
        if let Some(category) = &filter.category {
            values.push(category.clone().into());
            clauses.push(format!("category = ?{}", values.len()));
        }
        if let Some(from) = filter.from {
            values.push(to_us(from).into());
            clauses.push(format!("recorded_at_us >= ?{}", values.len()));
        }
        if let Some(to) = filter.to {
            values.push(to_us(to).into());
            clauses.push(format!("recorded_at_us <= ?{}", values.len()));
        }

        let mut sql = "SELECT order_id, previous_mechanic_id, new_mechanic_id, category, \
                       accumulated_seconds, recorded_at_us FROM assignment_events"
            .to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY recorded_at_us ASC, event_id ASC");

        let mut stmt = self.conn.prepare(&sql).context("prepare assignment query")?;
        stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(AssignmentEvent {
                order_id: row.get(0)?,
                previous_mechanic_id: row.get(1)?,
                new_mechanic_id: row.get(2)?,
                category: row.get(3)?,
                accumulated_seconds: row.get(4)?,
                recorded_at: from_us(row.get(5)?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("load assignment events")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::lifecycle::{ClockSkewPolicy, transition};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn sample() -> WorkOrder {
        let mut order = WorkOrder::new("os-1", "truck-9", "ana", t(0)).with_mechanic("carla");
        order.category = Some("motor".into());
        order.estimated_hours = 2.0;
        order.services = vec![ServiceItem::new("s1", "Trocar óleo", "motor")];
        order.parts = vec![PartRequest {
            sku: "FLT-01".into(),
            qty: 2,
            status: PartStatus::Solicitada,
        }];
        order
    }

    #[test]
    fn insert_then_get_round_trips_children_and_ledger() {
        let conn = open_in_memory().unwrap();
        let store = Store::new(&conn);
        let order = transition(&sample(), Status::EmExecucao, t(90), "ana", None, ClockSkewPolicy::Clamp)
            .unwrap()
            .order;
        store.insert(&order).unwrap();

        let loaded = store.get("os-1").unwrap().expect("stored order");
        assert_eq!(loaded, order);
        assert!(store.get("os-missing").unwrap().is_none());
    }

    #[test]
    fn save_with_stale_version_is_a_conflict() {
        let conn = open_in_memory().unwrap();
        let store = Store::new(&conn);
        let order = sample();
        store.insert(&order).unwrap();

        let first = transition(&order, Status::EmExecucao, t(60), "ana", None, ClockSkewPolicy::Clamp).unwrap();
        assert_eq!(
            store.save(&first.order, 0, Some(&first.change), None).unwrap(),
            SaveOutcome::Saved
        );

        let second = transition(&order, Status::Cancelada, t(61), "bia", None, ClockSkewPolicy::Clamp).unwrap();
        assert_eq!(
            store.save(&second.order, 0, Some(&second.change), None).unwrap(),
            SaveOutcome::Conflict { actual: Some(1) }
        );

        let stored = store.get("os-1").unwrap().unwrap();
        assert_eq!(stored.status(), Status::EmExecucao);
        assert_eq!(store.history("os-1").unwrap().len(), 1);
    }

    #[test]
    fn save_of_missing_order_reports_no_version() {
        let conn = open_in_memory().unwrap();
        let store = Store::new(&conn);
        assert_eq!(
            store.save(&sample(), 0, None, None).unwrap(),
            SaveOutcome::Conflict { actual: None }
        );
    }

    #[test]
    fn lock_write_is_conditional_on_the_lock_read() {
        let conn = open_in_memory().unwrap();
        let store = Store::new(&conn);
        let mut order = sample();
        store.insert(&order).unwrap();

        order.lock = Some(EditLock {
            holder: "ana".into(),
            locked_at: t(10),
        });
        assert_eq!(store.save_lock(&order, 0, None).unwrap(), SaveOutcome::Saved);

        let mut rival = sample();
        rival.lock = Some(EditLock {
            holder: "bia".into(),
            locked_at: t(11),
        });
        assert_eq!(
            store.save_lock(&rival, 0, None).unwrap(),
            SaveOutcome::Conflict { actual: Some(0) }
        );

        let stored = store.get("os-1").unwrap().unwrap();
        assert_eq!(stored.lock().map(|l| l.holder.as_str()), Some("ana"));
        assert_eq!(stored.version(), 0);
    }

    #[test]
    fn malformed_ledger_column_is_repaired_on_read() {
        let conn = open_in_memory().unwrap();
        let store = Store::new(&conn);
        store.insert(&sample()).unwrap();
        conn.execute(
            "UPDATE work_orders SET status_timers = '{\"aguardando\": -5, \"em_execucao\": \"120\", \"bogus\": 1}'",
            [],
        )
        .unwrap();

        let order = store.get("os-1").unwrap().unwrap();
        assert_eq!(order.status_timers().get(Status::Aguardando), 0);
        assert_eq!(order.status_timers().get(Status::EmExecucao), 120);
        assert_eq!(order.status_timers().sum(), 120);
    }

    #[test]
    fn list_filters_by_status_mechanic_and_openness() {
        let conn = open_in_memory().unwrap();
        let store = Store::new(&conn);
        store.insert(&sample()).unwrap();
        let other = WorkOrder::new("os-2", "van-1", "ana", t(5)).with_mechanic("bruno");
        let done = transition(&other, Status::Finalizada, t(20), "ana", None, ClockSkewPolicy::Clamp)
            .unwrap()
            .order;
        store.insert(&done).unwrap();

        assert_eq!(store.list(&OrderFilter::default()).unwrap().len(), 2);

        let open = store
            .list(&OrderFilter {
                open_only: true,
                ..OrderFilter::default()
            })
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, "os-1");

        let bruno = store
            .list(&OrderFilter {
                mechanic_id: Some("bruno".into()),
                status: Some(Status::Finalizada),
                ..OrderFilter::default()
            })
            .unwrap();
        assert_eq!(bruno.len(), 1);
        assert_eq!(bruno[0].total_seconds(), Some(15));
    }

    #[test]
    fn assignment_events_filter_in_sql() {
        let conn = open_in_memory().unwrap();
        let store = Store::new(&conn);
        let order = sample();
        store.insert(&order).unwrap();

        let mut current = order;
        for (at, mechanic) in [(100, "bruno"), (200, "davi"), (300, "bruno")] {
            let event = AssignmentEvent::snapshot(&current, mechanic, t(at));
            let mut next = current.clone();
            next.mechanic_id = Some(mechanic.to_string());
            next.version += 1;
            assert_eq!(
                store.save(&next, current.version(), None, Some(&event)).unwrap(),
                SaveOutcome::Saved
            );
            current = next;
        }

        let all = store.assignment_events(&ProductivityFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].previous_mechanic_id.as_deref(), Some("carla"));

        let windowed = store
            .assignment_events(&ProductivityFilter {
                mechanic_id: Some("bruno".into()),
                from: Some(t(150)),
                ..ProductivityFilter::default()
            })
            .unwrap();
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].recorded_at, t(300));
    }
}
