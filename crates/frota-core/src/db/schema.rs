//! SQLite schema for the work-order store.
//!
//! - `work_orders` holds one row per order; the ledger lives in
//!   `status_timers` as a JSON map keyed by the five status names
//! - `service_items` and `part_requests` are ordered child rows
//! - `status_history` and `assignment_events` are append-only logs written in
//!   the same transaction as the order row they describe
//! - `store_meta` tracks the schema version
//!
//! Timestamps are Unix microseconds in `*_us` columns.

/// Migration v1: orders, child rows and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS work_orders (
    order_id TEXT PRIMARY KEY CHECK (length(trim(order_id)) > 0),
    vehicle_id TEXT NOT NULL,
    mechanic_id TEXT,
    supervisor_id TEXT,
    workshop_unit TEXT,
    category TEXT,
    status TEXT NOT NULL CHECK (status IN (
        'aguardando', 'em_execucao', 'aguardando_pecas', 'finalizada', 'cancelada'
    )),
    priority TEXT NOT NULL DEFAULT 'normal'
        CHECK (priority IN ('baixa', 'normal', 'alta', 'urgente')),
    cost_labor REAL NOT NULL DEFAULT 0,
    cost_parts REAL NOT NULL DEFAULT 0,
    cost_other REAL NOT NULL DEFAULT 0,
    estimated_hours REAL NOT NULL DEFAULT 0,
    actual_hours REAL NOT NULL DEFAULT 0,
    created_by TEXT NOT NULL,
    warehouse_id TEXT,
    locked_by TEXT,
    locked_at_us INTEGER,
    status_timers TEXT NOT NULL DEFAULT '{}',
    last_status_change_us INTEGER NOT NULL,
    total_seconds INTEGER,
    version INTEGER NOT NULL DEFAULT 0 CHECK (version >= 0),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK ((locked_by IS NULL) = (locked_at_us IS NULL))
);

CREATE TABLE IF NOT EXISTS service_items (
    order_id TEXT NOT NULL REFERENCES work_orders(order_id) ON DELETE CASCADE,
    service_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    completed INTEGER NOT NULL DEFAULT 0 CHECK (completed IN (0, 1)),
    actual_seconds INTEGER NOT NULL DEFAULT 0,
    started_at_us INTEGER,
    is_timer_active INTEGER NOT NULL DEFAULT 0 CHECK (is_timer_active IN (0, 1)),
    PRIMARY KEY (order_id, service_id)
);

CREATE TABLE IF NOT EXISTS part_requests (
    order_id TEXT NOT NULL REFERENCES work_orders(order_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    sku TEXT NOT NULL,
    qty INTEGER NOT NULL DEFAULT 1 CHECK (qty > 0),
    status TEXT NOT NULL DEFAULT 'pendente'
        CHECK (status IN ('pendente', 'solicitada', 'recebida', 'cancelada')),
    PRIMARY KEY (order_id, position)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    initialized_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, initialized_at_us)
VALUES (1, 1, CAST(strftime('%s', 'now') AS INTEGER) * 1000000);
";

/// Migration v2: history logs and read-path indexes.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS status_history (
    change_id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id TEXT NOT NULL REFERENCES work_orders(order_id) ON DELETE CASCADE,
    from_status TEXT NOT NULL,
    to_status TEXT NOT NULL,
    elapsed_seconds INTEGER NOT NULL CHECK (elapsed_seconds >= 0),
    actor TEXT NOT NULL,
    clamped INTEGER NOT NULL DEFAULT 0 CHECK (clamped IN (0, 1)),
    at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS assignment_events (
    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id TEXT NOT NULL REFERENCES work_orders(order_id) ON DELETE CASCADE,
    previous_mechanic_id TEXT,
    new_mechanic_id TEXT NOT NULL,
    category TEXT,
    accumulated_seconds INTEGER NOT NULL,
    recorded_at_us INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_work_orders_status_updated
    ON work_orders(status, updated_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_work_orders_mechanic
    ON work_orders(mechanic_id, status);

CREATE INDEX IF NOT EXISTS idx_status_history_order_at
    ON status_history(order_id, at_us);

CREATE INDEX IF NOT EXISTS idx_assignment_events_mechanic_recorded
    ON assignment_events(new_mechanic_id, recorded_at_us);

CREATE INDEX IF NOT EXISTS idx_assignment_events_recorded
    ON assignment_events(recorded_at_us);
";

/// Indexes expected by list, history and productivity queries.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_work_orders_status_updated",
    "idx_work_orders_mechanic",
    "idx_status_history_order_at",
    "idx_assignment_events_mechanic_recorded",
    "idx_assignment_events_recorded",
];
